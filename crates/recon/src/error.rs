use std::fmt;

/// A required canonical field has no matching column in a dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaError {
    /// Dataset label, e.g. "stock" or "listing".
    pub dataset: String,
    /// Canonical field name, e.g. "product_key".
    pub field: String,
    /// Header names that would have been accepted.
    pub aliases: Vec<String>,
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "dataset '{}': missing required column for '{}'",
            self.dataset, self.field
        )?;
        if !self.aliases.is_empty() {
            write!(f, " (expected one of: {})", self.aliases.join(", "))?;
        }
        Ok(())
    }
}

impl std::error::Error for SchemaError {}

#[derive(Debug)]
pub enum ReconError {
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config validation error (bad rule list, unknown region, etc.).
    ConfigValidation(String),
    /// Required column missing from an input dataset.
    Schema(SchemaError),
}

impl fmt::Display for ReconError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
            Self::Schema(err) => write!(f, "schema error: {err}"),
        }
    }
}

impl std::error::Error for ReconError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Schema(err) => Some(err),
            _ => None,
        }
    }
}

impl From<SchemaError> for ReconError {
    fn from(err: SchemaError) -> Self {
        Self::Schema(err)
    }
}
