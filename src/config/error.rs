//! Configuration error types.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read `{}`", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid sprig.toml")]
    Parse(#[from] toml::de::Error),

    /// A value serde accepted but the site cannot use.
    #[error("[{field}] {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    pub(super) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error, ErrorKind};

    #[test]
    fn test_config_error_display() {
        let read = ConfigError::Read {
            path: PathBuf::from("sprig.toml"),
            source: Error::new(ErrorKind::PermissionDenied, "denied"),
        };
        assert_eq!(read.to_string(), "cannot read `sprig.toml`");

        let invalid = ConfigError::invalid("serve.port", "must differ from [serve.reload_port]");
        assert_eq!(
            invalid.to_string(),
            "[serve.port] must differ from [serve.reload_port]"
        );
    }
}
