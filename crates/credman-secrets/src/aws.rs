//! AWS Secrets Manager backend.
//!
//! Stateless: the SDK reads its own credential and config files, so there
//! is no session to open. `login()` only checks that some ambient identity
//! material exists locally and never makes a network call.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_secretsmanager::error::DisplayErrorContext;
use credman_core::{Error, ManagerKind, Result};
use serde_json::Value;
use std::path::PathBuf;
use tracing::{debug, info};

use crate::manager::SecretsManager;

/// Reserved field name addressing a plain-string secret as a whole.
const PLAIN_VALUE_FIELD: &str = "value";

/// Secrets manager backed by the AWS Secrets Manager service.
pub struct AwsSecretsManager;

impl AwsSecretsManager {
    pub fn new() -> Self {
        Self
    }
}

impl Default for AwsSecretsManager {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SecretsManager for AwsSecretsManager {
    async fn login(&mut self) -> Result<()> {
        if !has_ambient_credentials() {
            return Err(Error::Authentication(
                "No AWS credentials found: set AWS_ACCESS_KEY_ID or configure \
                 ~/.aws/credentials"
                    .to_string(),
            ));
        }
        debug!("Ambient AWS credentials present");
        Ok(())
    }

    async fn logout(&mut self) -> Result<()> {
        // Stateless backend, no session to invalidate.
        Ok(())
    }

    async fn get_secret(&self, service: &str, field: &str) -> Result<String> {
        let config = aws_config::load_defaults(BehaviorVersion::latest()).await;
        let client = aws_sdk_secretsmanager::Client::new(&config);

        info!(secret_id = service, "Fetching secret from AWS Secrets Manager");
        let response = client
            .get_secret_value()
            .secret_id(service)
            .send()
            .await
            .map_err(|err| {
                let not_found = err
                    .as_service_error()
                    .map(|e| e.is_resource_not_found_exception())
                    .unwrap_or(false);
                if not_found {
                    Error::SecretNotFound(service.to_string())
                } else {
                    Error::ExternalTool(format!(
                        "AWS Secrets Manager request failed: {}",
                        DisplayErrorContext(&err)
                    ))
                }
            })?;

        let raw = response.secret_string().ok_or_else(|| {
            Error::ExternalTool(format!("Secret '{}' has no string value", service))
        })?;

        extract_field(service, raw, field)
    }

    fn kind(&self) -> ManagerKind {
        ManagerKind::Aws
    }
}

/// Extract `field` from a stored secret value.
///
/// A JSON object is treated as a field map. Anything else is a plain
/// string, addressable only through the reserved `"value"` field name.
fn extract_field(service: &str, raw: &str, field: &str) -> Result<String> {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(raw) {
        return match map.get(field) {
            Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
            Some(Value::Null) | Some(Value::String(_)) | None => {
                Err(Error::field_not_found(service, field))
            }
            Some(other) => Ok(other.to_string()),
        };
    }

    if field == PLAIN_VALUE_FIELD && !raw.is_empty() {
        Ok(raw.to_string())
    } else {
        Err(Error::field_not_found(service, field))
    }
}

fn has_ambient_credentials() -> bool {
    ambient_credentials_present(
        std::env::var("AWS_ACCESS_KEY_ID").ok(),
        default_aws_file("AWS_SHARED_CREDENTIALS_FILE", "credentials"),
        default_aws_file("AWS_CONFIG_FILE", "config"),
    )
}

fn ambient_credentials_present(
    access_key: Option<String>,
    credentials_file: Option<PathBuf>,
    config_file: Option<PathBuf>,
) -> bool {
    access_key.map(|v| !v.trim().is_empty()).unwrap_or(false)
        || credentials_file.map(|p| p.is_file()).unwrap_or(false)
        || config_file.map(|p| p.is_file()).unwrap_or(false)
}

fn default_aws_file(override_var: &str, name: &str) -> Option<PathBuf> {
    if let Ok(path) = std::env::var(override_var) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }
    directories::UserDirs::new().map(|dirs| dirs.home_dir().join(".aws").join(name))
}
