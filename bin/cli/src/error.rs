//! Errors raised while starting or running the terminal front end.

use std::fmt;

/// CLI errors.
#[derive(Debug)]
pub enum CliError {
    /// Configuration could not be loaded or is invalid.
    Config { details: String },
    /// A backend could not be constructed.
    Backend { provider: &'static str },
    /// Reading input or writing output failed.
    Io { details: String },
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config { details } => write!(f, "configuration error: {details}"),
            Self::Backend { provider } => write!(f, "failed to set up the {provider} backend"),
            Self::Io { details } => write!(f, "terminal I/O failed: {details}"),
        }
    }
}

impl std::error::Error for CliError {}

impl From<config::ConfigError> for CliError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config {
            details: err.to_string(),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            details: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_error_names_provider() {
        let err = CliError::Backend { provider: "Gemini" };
        assert_eq!(err.to_string(), "failed to set up the Gemini backend");
    }

    #[test]
    fn io_error_converts() {
        let err: CliError = std::io::Error::other("closed").into();
        assert!(matches!(err, CliError::Io { .. }));
    }
}
