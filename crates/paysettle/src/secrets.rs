//! Credentials referenced from the config file.
//!
//! The exchange-rate API key and the alert webhook URL may each be written
//! inline, read from a file (container secrets) or taken from an environment
//! variable. The first source that is set wins, in that order.

use std::fs;
use std::path::PathBuf;

use secrecy::SecretString;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SecretError {
    #[error("no value, file or environment variable configured")]
    NoSourceProvided,

    #[error("cannot read '{}': {source}", .path.display())]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("environment variable '{name}' is not set")]
    EnvVarNotSet { name: String },

    #[error("environment variable '{name}' is not valid UTF-8")]
    EnvVarNotUnicode { name: String },
}

/// The three places one secret may come from. Empty strings count as unset.
#[derive(Debug, Clone, Copy, Default)]
pub struct SecretRef<'a> {
    pub value: Option<&'a str>,
    pub file: Option<&'a str>,
    pub env: Option<&'a str>,
}

fn set(source: Option<&str>) -> Option<&str> {
    source.filter(|s| !s.is_empty())
}

impl SecretRef<'_> {
    pub fn is_configured(&self) -> bool {
        set(self.value).is_some() || set(self.file).is_some() || set(self.env).is_some()
    }

    /// Resolves the secret; surrounding whitespace is dropped from file and
    /// environment values.
    pub fn resolve(&self) -> Result<SecretString, SecretError> {
        if let Some(value) = set(self.value) {
            return Ok(SecretString::from(value));
        }

        if let Some(file) = set(self.file) {
            let path = PathBuf::from(expand_home(file));
            let content = fs::read_to_string(&path)
                .map_err(|source| SecretError::FileReadError { path, source })?;
            return Ok(SecretString::from(content.trim()));
        }

        if let Some(name) = set(self.env) {
            return match std::env::var(name) {
                Ok(value) => Ok(SecretString::from(value.trim())),
                Err(std::env::VarError::NotPresent) => Err(SecretError::EnvVarNotSet {
                    name: name.to_string(),
                }),
                Err(std::env::VarError::NotUnicode(_)) => Err(SecretError::EnvVarNotUnicode {
                    name: name.to_string(),
                }),
            };
        }

        Err(SecretError::NoSourceProvided)
    }

    /// `None` when nothing is configured; a configured but unreadable
    /// source is still an error.
    pub fn resolve_optional(&self) -> Result<Option<SecretString>, SecretError> {
        if !self.is_configured() {
            return Ok(None);
        }
        self.resolve().map(Some)
    }
}

/// Expands a leading `~` to the user's home directory.
pub(crate) fn expand_home(path: &str) -> String {
    let rest = match path.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
        _ => return path.to_string(),
    };
    match dirs::home_dir() {
        Some(home) => format!("{}{}", home.to_string_lossy(), rest),
        None => path.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use serial_test::serial;
    use std::io::Write;

    #[test]
    fn test_inline_value_beats_other_sources() {
        let secret = SecretRef {
            value: Some("inline"),
            file: Some("/nonexistent"),
            env: Some("PAYSETTLE_TEST_UNSET"),
        }
        .resolve()
        .unwrap();
        assert_eq!(secret.expose_secret(), "inline");
    }

    #[test]
    fn test_file_source_is_trimmed() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "  fx-key  ").unwrap();
        let path = file.path().to_string_lossy().into_owned();

        let secret = SecretRef {
            value: Some(""),
            file: Some(&path),
            ..SecretRef::default()
        }
        .resolve()
        .unwrap();
        assert_eq!(secret.expose_secret(), "fx-key");
    }

    #[test]
    fn test_unreadable_file_is_an_error_even_when_optional() {
        let source = SecretRef {
            file: Some("/definitely/not/here"),
            ..SecretRef::default()
        };
        assert!(matches!(
            source.resolve_optional(),
            Err(SecretError::FileReadError { .. })
        ));
    }

    #[test]
    #[serial]
    fn test_env_source() {
        std::env::set_var("PAYSETTLE_TEST_SECRET", "hook-url\n");
        let source = SecretRef {
            env: Some("PAYSETTLE_TEST_SECRET"),
            ..SecretRef::default()
        };
        assert_eq!(source.resolve().unwrap().expose_secret(), "hook-url");

        std::env::remove_var("PAYSETTLE_TEST_SECRET");
        assert!(matches!(
            source.resolve(),
            Err(SecretError::EnvVarNotSet { .. })
        ));
    }

    #[test]
    fn test_nothing_configured() {
        let empty = SecretRef {
            value: Some(""),
            ..SecretRef::default()
        };
        assert!(!empty.is_configured());
        assert!(matches!(empty.resolve(), Err(SecretError::NoSourceProvided)));
        assert!(empty.resolve_optional().unwrap().is_none());
    }

    #[test]
    fn test_expand_home_only_touches_leading_tilde() {
        assert_eq!(expand_home("/var/lib/paysettle"), "/var/lib/paysettle");
        assert_eq!(expand_home("~other/data"), "~other/data");
        if let Some(home) = dirs::home_dir() {
            let home = home.to_string_lossy().into_owned();
            assert_eq!(expand_home("~/data"), format!("{}/data", home));
            assert_eq!(expand_home("~"), home);
        }
    }
}
