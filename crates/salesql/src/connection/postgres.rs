use super::{Connector, DbHandle};
use crate::config::DbConfig;
use crate::error::{SqlError, SqlResult};
use crate::row::Record;
use crate::value::Value;
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, NoTls};

/// tokio-postgres connector without TLS.
#[derive(Debug, Clone, Copy, Default)]
pub struct PgConnector;

impl Connector for PgConnector {
    type Handle = PgHandle;

    async fn connect(&self, config: &DbConfig) -> SqlResult<PgHandle> {
        let (client, connection) = config
            .pg_config()
            .connect(NoTls)
            .await
            .map_err(SqlError::from_db_error)?;

        let host = config.host.clone();
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::warn!(
                    target: "salesql.connection",
                    host = %host,
                    error = %e,
                    "database connection closed with error"
                );
            }
        });

        Ok(PgHandle { client })
    }
}

/// A tokio-postgres client whose connection task runs in the background.
pub struct PgHandle {
    client: Client,
}

impl PgHandle {
    pub fn client(&self) -> &Client {
        &self.client
    }
}

impl std::fmt::Debug for PgHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgHandle")
            .field("closed", &self.client.is_closed())
            .finish()
    }
}

impl DbHandle for PgHandle {
    fn is_healthy(&self) -> bool {
        !self.client.is_closed()
    }

    async fn query(&self, sql: &str, params: &[Value]) -> SqlResult<Vec<Record>> {
        let refs: Vec<&(dyn ToSql + Sync)> =
            params.iter().map(|v| v as &(dyn ToSql + Sync)).collect();
        let rows = self
            .client
            .query(sql, &refs)
            .await
            .map_err(SqlError::from_db_error)?;
        rows.iter().map(Record::from_row).collect()
    }
}
