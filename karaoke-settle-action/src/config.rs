//! Action server configuration.
//!
//! Loads configuration from a TOML file with support for environment variable
//! expansion in string values. Variables use `$VAR` or `${VAR}` syntax.
//!
//! # Example Configuration
//!
//! ```toml
//! host = "0.0.0.0"
//! port = 4030
//! signing_timeout_secs = 30
//! sig_name = "settlementSig"
//!
//! [signer]
//! kind = "local"
//!
//! [[signer.keys]]
//! private_key = "$PKP_KEY"
//! ```
//!
//! or, to delegate to a signing node:
//!
//! ```toml
//! [signer]
//! kind = "remote"
//! url = "https://signer.example/sign"
//! ```
//!
//! # Environment Variables
//!
//! - `CONFIG` - Path to configuration file (default: `config.toml`)
//! - `HOST` - Override server bind address
//! - `PORT` - Override server port
//! - Key shares referenced by `$VAR` in the config file

use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;

use karaoke_settle::signer::DEFAULT_SIG_NAME;
use serde::Deserialize;
use url::Url;

/// Failure to load the configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file exists but could not be read.
    #[error("cannot read {path}: {source}")]
    Read {
        /// Path that was read.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The file is not valid configuration TOML.
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level action server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ActionConfig {
    /// Server bind address (default: `0.0.0.0`).
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Server port (default: `4030`).
    #[serde(default = "default_port")]
    pub port: u16,

    /// Upper bound on one signing round, in seconds (default: `30`).
    #[serde(default = "default_signing_timeout_secs")]
    pub signing_timeout_secs: u64,

    /// Name attached to signature requests (default: `settlementSig`).
    #[serde(default = "default_sig_name")]
    pub sig_name: String,

    /// Signing backend.
    #[serde(default)]
    pub signer: SignerConfig,
}

/// Which threshold signer backs the action.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SignerConfig {
    /// In-process key shares. For development and tests.
    Local {
        /// Key shares, one per PKP.
        #[serde(default)]
        keys: Vec<KeyShareConfig>,
    },
    /// A signing node reached over HTTP.
    Remote {
        /// Signing endpoint.
        url: Url,
    },
}

impl Default for SignerConfig {
    fn default() -> Self {
        Self::Local { keys: Vec::new() }
    }
}

/// A single local key share.
#[derive(Clone, Deserialize)]
pub struct KeyShareConfig {
    /// Private key (hex, with or without `0x` prefix).
    /// Supports `$VAR` / `${VAR}` for environment variable expansion.
    pub private_key: String,
}

impl KeyShareConfig {
    /// Returns `true` if the key still holds an unexpanded `$VAR` reference.
    #[must_use]
    pub fn is_unresolved(&self) -> bool {
        let key = self.private_key.trim();
        key.is_empty() || key.starts_with('$')
    }
}

impl std::fmt::Debug for KeyShareConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyShareConfig")
            .field("private_key", &"<redacted>")
            .finish()
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(std::net::Ipv4Addr::new(0, 0, 0, 0))
}

const fn default_port() -> u16 {
    4030
}

const fn default_signing_timeout_secs() -> u64 {
    30
}

fn default_sig_name() -> String {
    DEFAULT_SIG_NAME.to_owned()
}

impl ActionConfig {
    /// Loads configuration from the path given by the `CONFIG` environment
    /// variable, falling back to `config.toml` in the current directory.
    ///
    /// After loading, all string values with `$VAR` / `${VAR}` references
    /// are expanded from the process environment. `HOST` and `PORT` env vars
    /// override the file values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("CONFIG").unwrap_or_else(|_| "config.toml".to_owned());
        Self::load_from(&path)
    }

    /// Loads configuration from a specific file path.
    ///
    /// A missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    pub fn load_from(path: &str) -> Result<Self, ConfigError> {
        let content = if Path::new(path).exists() {
            std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                path: path.to_owned(),
                source,
            })?
        } else {
            String::new()
        };

        let mut config = Self::from_toml_str(&content, |name| std::env::var(name).ok())?;

        if let Ok(host) = std::env::var("HOST") {
            if let Ok(addr) = host.parse() {
                config.host = addr;
            }
        }
        if let Ok(port) = std::env::var("PORT") {
            if let Ok(p) = port.parse() {
                config.port = p;
            }
        }

        Ok(config)
    }

    /// Parses TOML after expanding `$VAR` references with `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if the expanded text is not valid.
    pub fn from_toml_str(
        content: &str,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let expanded = expand_vars(content, lookup);
        Ok(toml::from_str(&expanded)?)
    }

    /// Signing timeout as a [`Duration`].
    #[must_use]
    pub const fn signing_timeout(&self) -> Duration {
        Duration::from_secs(self.signing_timeout_secs)
    }
}

/// Expands `$VAR` and `${VAR}` patterns using `lookup`.
///
/// Unresolved variables are left as-is.
fn expand_vars(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '$' {
            result.push(ch);
            continue;
        }

        let braced = chars.peek() == Some(&'{');
        if braced {
            chars.next();
        }

        let mut var_name = String::new();
        while let Some(&c) = chars.peek() {
            if braced {
                if c == '}' {
                    chars.next();
                    break;
                }
            } else if !c.is_ascii_alphanumeric() && c != '_' {
                break;
            }
            var_name.push(c);
            chars.next();
        }

        match (var_name.is_empty(), lookup(&var_name)) {
            (true, _) => {
                result.push('$');
                if braced {
                    result.push('{');
                }
            }
            (false, Some(val)) => result.push_str(&val),
            (false, None) => {
                result.push('$');
                if braced {
                    result.push('{');
                }
                result.push_str(&var_name);
                if braced {
                    result.push('}');
                }
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(name: &str) -> Option<String> {
        match name {
            "PKP_KEY" => Some("0xabc".to_owned()),
            "SIGNER_HOST" => Some("signer.example".to_owned()),
            _ => None,
        }
    }

    #[test]
    fn test_defaults_from_empty_file() {
        let config = ActionConfig::from_toml_str("", env).unwrap();
        assert_eq!(config.port, 4030);
        assert_eq!(config.signing_timeout(), Duration::from_secs(30));
        assert_eq!(config.sig_name, "settlementSig");
        assert!(matches!(config.signer, SignerConfig::Local { ref keys } if keys.is_empty()));
    }

    #[test]
    fn test_local_keys_are_expanded() {
        let config = ActionConfig::from_toml_str(
            r#"
            [signer]
            kind = "local"

            [[signer.keys]]
            private_key = "$PKP_KEY"

            [[signer.keys]]
            private_key = "${MISSING_KEY}"
            "#,
            env,
        )
        .unwrap();
        let SignerConfig::Local { keys } = config.signer else {
            panic!("expected local signer");
        };
        assert_eq!(keys[0].private_key, "0xabc");
        assert!(!keys[0].is_unresolved());
        assert_eq!(keys[1].private_key, "${MISSING_KEY}");
        assert!(keys[1].is_unresolved());
    }

    #[test]
    fn test_remote_signer() {
        let config = ActionConfig::from_toml_str(
            r#"
            signing_timeout_secs = 5

            [signer]
            kind = "remote"
            url = "https://${SIGNER_HOST}/sign"
            "#,
            env,
        )
        .unwrap();
        assert_eq!(config.signing_timeout(), Duration::from_secs(5));
        let SignerConfig::Remote { url } = config.signer else {
            panic!("expected remote signer");
        };
        assert_eq!(url.as_str(), "https://signer.example/sign");
    }

    #[test]
    fn test_unknown_signer_kind_is_rejected() {
        let err = ActionConfig::from_toml_str("[signer]\nkind = \"hsm\"\n", env).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_key_share_debug_is_redacted() {
        let share = KeyShareConfig {
            private_key: "0xdeadbeef".to_owned(),
        };
        assert!(!format!("{share:?}").contains("deadbeef"));
    }

    #[test]
    fn test_expand_vars_edge_cases() {
        assert_eq!(expand_vars("cost: $", env), "cost: $");
        assert_eq!(expand_vars("a${PKP_KEY}b", env), "a0xabcb");
        assert_eq!(expand_vars("$PKP_KEY-x", env), "0xabc-x");
        assert_eq!(expand_vars("$NOPE", env), "$NOPE");
    }
}
