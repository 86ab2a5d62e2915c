use std::fmt;

/// Error types for the infrastructure import pipeline
#[derive(Debug)]
pub enum ImportError {
    /// A provider advertised a service it has no generator for (programming defect)
    NotImplemented { provider: String, service: String },

    /// Requested service is not supported by the provider
    UnsupportedService { provider: String, service: String },

    /// No provider registered under this name
    UnknownProvider(String),

    /// Enumerating resources from the provider failed
    Discovery { service: String, message: String },

    /// Refreshing resources against the provider failed
    Refresh { service: String, message: String },

    /// Ignore-key / schema lookup failed
    Lookup(String),

    /// A service was driven through its lifecycle out of order (programming defect)
    Lifecycle { service: String, message: String },

    /// Service-specific post conversion step failed
    Conversion { service: String, message: String },

    /// Invalid input or parameter
    InvalidInput(String),

    /// Configuration file parsing error
    ConfigParse(String),

    /// Writing generated output failed
    Write(String),

    /// General I/O error
    Io(std::io::Error),

    /// Serialization error
    Serialization(String),
}

impl ImportError {
    /// Whether this error signals a bug rather than a runtime or user condition
    pub fn is_defect(&self) -> bool {
        matches!(
            self,
            ImportError::NotImplemented { .. } | ImportError::Lifecycle { .. }
        )
    }
}

impl fmt::Display for ImportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportError::NotImplemented { provider, service } => {
                write!(
                    f,
                    "Service '{}' of provider '{}' is advertised but not implemented",
                    service, provider
                )
            }
            ImportError::UnsupportedService { provider, service } => {
                write!(
                    f,
                    "Unsupported service '{}' for provider '{}'",
                    service, provider
                )
            }
            ImportError::UnknownProvider(name) => {
                write!(f, "Unknown provider: {}", name)
            }
            ImportError::Discovery { service, message } => {
                write!(f, "Failed to discover '{}' resources: {}", service, message)
            }
            ImportError::Refresh { service, message } => {
                write!(f, "Failed to refresh '{}' resources: {}", service, message)
            }
            ImportError::Lookup(msg) => {
                write!(f, "Ignore key lookup failed: {}", msg)
            }
            ImportError::Lifecycle { service, message } => {
                write!(f, "Lifecycle of '{}' run out of order: {}", service, message)
            }
            ImportError::Conversion { service, message } => {
                write!(f, "Post conversion of '{}' failed: {}", service, message)
            }
            ImportError::InvalidInput(msg) => {
                write!(f, "Invalid input: {}", msg)
            }
            ImportError::ConfigParse(msg) => {
                write!(f, "Failed to parse configuration: {}", msg)
            }
            ImportError::Write(msg) => {
                write!(f, "Failed to write output: {}", msg)
            }
            ImportError::Io(err) => {
                write!(f, "I/O error: {}", err)
            }
            ImportError::Serialization(msg) => {
                write!(f, "Serialization error: {}", msg)
            }
        }
    }
}

impl std::error::Error for ImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ImportError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        ImportError::Io(err)
    }
}

impl From<serde_yaml::Error> for ImportError {
    fn from(err: serde_yaml::Error) -> Self {
        ImportError::ConfigParse(err.to_string())
    }
}

impl From<serde_json::Error> for ImportError {
    fn from(err: serde_json::Error) -> Self {
        ImportError::Serialization(err.to_string())
    }
}

/// Result type for import operations
pub type ImportResult<T> = Result<T, ImportError>;
