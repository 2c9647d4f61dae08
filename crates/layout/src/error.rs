#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Parse(String),
    Invalid { field: &'static str, reason: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Parse(msg) => write!(f, "layout config parse error: {msg}"),
            ConfigError::Invalid { field, reason } => {
                write!(f, "invalid layout config `{field}`: {reason}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Parse(e.to_string())
    }
}

/// Failure reported by a host cluster generator.
///
/// Never fatal: the cluster still reserves its fallback footprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClusterError {
    /// The generator produced no usable footprint.
    EmptyContent,
    Generator(String),
}

impl std::fmt::Display for ClusterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClusterError::EmptyContent => write!(f, "cluster generator produced no content"),
            ClusterError::Generator(msg) => write!(f, "cluster generator failed: {msg}"),
        }
    }
}

impl std::error::Error for ClusterError {}
