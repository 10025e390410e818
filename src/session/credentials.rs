use crate::error::CredentialError;
use crate::store::write_atomic;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One session cookie as exported by the messaging account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookieRecord {
    #[serde(alias = "name")]
    pub key: String,
    pub value: String,
    /// Domain, path, expiry and whatever else the exporter wrote.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Durable credential state: an ordered sequence of cookie records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credentials {
    pub records: Vec<CookieRecord>,
}

impl Credentials {
    pub fn new(records: Vec<CookieRecord>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Reads and validates the credential file. Every failure here is fatal:
    /// no credentials, no login.
    pub fn load(path: &Path) -> Result<Self, CredentialError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CredentialError::Missing {
                    path: path.to_path_buf(),
                });
            }
            Err(source) => {
                return Err(CredentialError::Unreadable {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        Self::parse(path, &raw)
    }

    fn parse(path: &Path, raw: &str) -> Result<Self, CredentialError> {
        let value: serde_json::Value =
            serde_json::from_str(raw).map_err(|e| CredentialError::Malformed {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        if !value.is_array() {
            return Err(CredentialError::NotAnArray {
                path: path.to_path_buf(),
            });
        }
        serde_json::from_value(value).map_err(|e| CredentialError::Malformed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Writes the records atomically (pretty JSON array).
    pub async fn save(&self, path: &Path) -> Result<()> {
        let data = serde_json::to_vec_pretty(self).context("serialize credentials")?;
        write_atomic(path, &data)
            .await
            .with_context(|| format!("write credential backup {}", path.display()))
    }
}
