use super::args::ReportArgs;
use super::builtin;
use super::Report;
use crate::error::{SqlError, SqlResult};
use std::collections::BTreeMap;
use std::fmt;

/// Constructor stored in the registry. Must not perform I/O.
pub type ReportCtor = fn(&ReportArgs) -> SqlResult<Box<dyn Report>>;

/// Registry entry: tag, argument schema and constructor.
#[derive(Clone, Copy)]
pub struct ReportDescriptor {
    pub tag: &'static str,
    pub description: &'static str,
    pub required: &'static [&'static str],
    pub optional: &'static [&'static str],
    pub build: ReportCtor,
}

impl ReportDescriptor {
    pub fn accepts(&self, field: &str) -> bool {
        self.required.contains(&field) || self.optional.contains(&field)
    }

    /// Check `args` against the schema, then construct.
    fn create(&self, args: &ReportArgs) -> SqlResult<Box<dyn Report>> {
        let missing: Vec<String> = self
            .required
            .iter()
            .filter(|f| !args.contains(f))
            .map(|f| f.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(SqlError::MissingArgument(missing));
        }

        // Null-valued keys count as absent, as they do for `required`.
        let unexpected: Vec<&str> = args
            .names()
            .filter(|n| args.contains(n) && !self.accepts(n))
            .collect();
        if !unexpected.is_empty() {
            return Err(SqlError::invalid_argument(format!(
                "unexpected argument(s) for '{}' report: {}",
                self.tag,
                unexpected.join(", ")
            )));
        }

        (self.build)(args)
    }
}

impl fmt::Debug for ReportDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReportDescriptor")
            .field("tag", &self.tag)
            .field("required", &self.required)
            .field("optional", &self.optional)
            .finish()
    }
}

/// Tag → report constructor registry.
///
/// `create` never changes when a report type is added; new types only need
/// [`ReportFactory::register`].
#[derive(Debug, Clone, Default)]
pub struct ReportFactory {
    registry: BTreeMap<&'static str, ReportDescriptor>,
}

impl ReportFactory {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in report.
    pub fn with_builtin_reports() -> Self {
        let mut factory = Self::new();
        for descriptor in builtin::descriptors() {
            factory.register(descriptor);
        }
        factory
    }

    /// Add or replace a report type. Returns the replaced descriptor.
    pub fn register(&mut self, descriptor: ReportDescriptor) -> Option<ReportDescriptor> {
        tracing::debug!(target: "salesql.report", tag = descriptor.tag, "report registered");
        self.registry.insert(descriptor.tag, descriptor)
    }

    pub fn descriptor(&self, tag: &str) -> Option<&ReportDescriptor> {
        self.registry.get(tag)
    }

    /// Registered descriptors in tag order.
    pub fn descriptors(&self) -> impl Iterator<Item = &ReportDescriptor> {
        self.registry.values()
    }

    pub fn tags(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.registry.keys().copied()
    }

    /// Build the report registered under `tag`.
    ///
    /// Errors name the offending tag or fields:
    /// [`SqlError::UnknownReportType`], [`SqlError::MissingArgument`] (every
    /// missing required field), [`SqlError::InvalidArgument`] for unexpected
    /// or mistyped arguments, or the builder error the arguments trigger.
    pub fn create(&self, tag: &str, args: &ReportArgs) -> SqlResult<Box<dyn Report>> {
        let descriptor = self
            .registry
            .get(tag)
            .ok_or_else(|| SqlError::UnknownReportType(tag.to_string()))?;
        descriptor.create(args)
    }
}
