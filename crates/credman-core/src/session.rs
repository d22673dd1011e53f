//! Session handles and manager identifiers.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Ephemeral authentication handle for a session-based backend.
///
/// A session is either fully authenticated or absent: construction rejects
/// empty tokens, and managers model "no session" as `Option<ManagerSession>`.
/// The token lives in memory only and is never serialized by this layer.
pub struct ManagerSession {
    token: String,
}

impl ManagerSession {
    pub fn new(token: impl Into<String>) -> Result<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(Error::Authentication(
                "Received an empty session token".to_string(),
            ));
        }
        Ok(Self { token })
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

impl fmt::Debug for ManagerSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The token must never leak through logs.
        f.debug_struct("ManagerSession")
            .field("token", &"***")
            .finish()
    }
}

/// The backend implementations the factory can construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerKind {
    Bitwarden,
    Aws,
    Hashicorp,
}

impl ManagerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ManagerKind::Bitwarden => "bitwarden",
            ManagerKind::Aws => "aws",
            ManagerKind::Hashicorp => "hashicorp",
        }
    }
}

impl fmt::Display for ManagerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ManagerKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "bitwarden" => Ok(ManagerKind::Bitwarden),
            "aws" => Ok(ManagerKind::Aws),
            "hashicorp" => Ok(ManagerKind::Hashicorp),
            _ => Err(Error::UnsupportedManager(s.to_string())),
        }
    }
}

/// One credential query: which backend, which item, which field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialSpec {
    pub kind: ManagerKind,
    pub service: String,
    pub field: String,
}

impl CredentialSpec {
    pub fn new(kind: ManagerKind, service: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            kind,
            service: service.into(),
            field: field.into(),
        }
    }
}
