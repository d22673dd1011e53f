//! Canonical secret data model.
//!
//! Every backend maps its raw response into a [`Secret`] so that field
//! lookup behaves identically regardless of where the item came from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One named unit of stored credential data, produced fresh on every query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Secret {
    /// Item name; matched case-insensitively against the queried service.
    pub name: String,
    /// Backend-defined name/value pairs, in backend order.
    pub fields: Vec<CustomField>,
    /// Structured username/password/totp sub-record, when present.
    pub login: Option<LoginBlock>,
    /// Opaque timestamps carried through from the backend.
    pub metadata: SecretMetadata,
}

/// A custom field attached to an item, distinct from the login block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomField {
    pub name: String,
    pub value: Option<String>,
}

/// The structured login sub-record some backends attach to an item.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoginBlock {
    pub username: Option<String>,
    pub password: Option<String>,
    pub totp: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecretMetadata {
    pub revision_date: Option<DateTime<Utc>>,
}

impl Secret {
    /// Look up a field value by name.
    ///
    /// Precedence is fixed: an exact, case-sensitive match among the custom
    /// fields wins (first match if duplicates exist); only when no custom
    /// field matches is the login block consulted for the `username`,
    /// `password` and `totp` aliases. An empty string is never a valid
    /// value, so blank entries are treated as absent.
    pub fn field(&self, name: &str) -> Option<&str> {
        let custom = self
            .fields
            .iter()
            .find(|f| f.name == name)
            .and_then(|f| non_empty(f.value.as_deref()));
        if custom.is_some() {
            return custom;
        }

        let login = self.login.as_ref()?;
        match name {
            "username" => non_empty(login.username.as_deref()),
            "password" => non_empty(login.password.as_deref()),
            "totp" => non_empty(login.totp.as_deref()),
            _ => None,
        }
    }

    /// Whether this item's name matches `service`, ignoring ASCII case.
    pub fn matches_service(&self, service: &str) -> bool {
        self.name.eq_ignore_ascii_case(service)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}
