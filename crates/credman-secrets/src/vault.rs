//! HashiCorp Vault backend (KV v2 over HTTP).
//!
//! Session-based: login resolves the server address, an access token and an
//! optional CA certificate path, validates the token against the server and
//! keeps the authenticated HTTP client as the session. The token is
//! caller-owned ambient material, so logout drops the session locally
//! without revoking anything remotely.

use async_trait::async_trait;
use credman_core::{Error, ManagerKind, ManagerSession, Result};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::manager::SecretsManager;
use crate::resolver::CredentialResolver;

const VAULT_ADDR_ENV: &str = "CREDMAN_VAULT_ADDR";
const VAULT_TOKEN_ENV: &str = "CREDMAN_VAULT_TOKEN";
const VAULT_CACERT_ENV: &str = "CREDMAN_VAULT_CACERT";

const VAULT_TOKEN_HEADER: &str = "X-Vault-Token";
const KV_MOUNT: &str = "secret";

/// Secrets manager backed by a HashiCorp Vault KV v2 store.
pub struct HashicorpVaultManager {
    resolver: CredentialResolver,
    session: Option<VaultSession>,
}

struct VaultSession {
    client: reqwest::Client,
    address: String,
    session: ManagerSession,
}

impl HashicorpVaultManager {
    pub fn new() -> Self {
        Self::with_resolver(CredentialResolver::new())
    }

    /// Build with an explicit resolver, the seam tests use to supply the
    /// server address and token deterministically.
    pub fn with_resolver(resolver: CredentialResolver) -> Self {
        Self {
            resolver,
            session: None,
        }
    }

    fn session(&self) -> Result<&VaultSession> {
        self.session.as_ref().ok_or_else(|| {
            Error::Authentication("No active Vault session, call login() first".to_string())
        })
    }
}

impl Default for HashicorpVaultManager {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SecretsManager for HashicorpVaultManager {
    async fn login(&mut self) -> Result<()> {
        // Each value resolves independently; partial availability is fine
        // (address from the environment, token from a prompt).
        let address = self.resolver.resolve(VAULT_ADDR_ENV, "Vault server address")?;
        let token = self.resolver.resolve_secret(VAULT_TOKEN_ENV, "Vault token")?;
        let ca_cert = self.resolver.resolve_optional(VAULT_CACERT_ENV);

        let mut builder = reqwest::Client::builder();
        if let Some(path) = &ca_cert {
            let pem = std::fs::read(path)?;
            let certificate = reqwest::Certificate::from_pem(&pem).map_err(|e| {
                Error::ExternalTool(format!("Invalid CA certificate '{}': {}", path, e))
            })?;
            builder = builder.add_root_certificate(certificate);
        }
        let client = builder
            .build()
            .map_err(|e| Error::ExternalTool(format!("Failed to build HTTP client: {}", e)))?;

        let address = address.trim_end_matches('/').to_string();
        debug!(address = %address, "Validating Vault token");
        let response = client
            .get(format!("{}/v1/auth/token/lookup-self", address))
            .header(VAULT_TOKEN_HEADER, &token)
            .send()
            .await
            .map_err(connection_error)?;

        match response.status() {
            status if status.is_success() => {}
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(Error::Authentication(
                    "Vault rejected the provided token".to_string(),
                ));
            }
            status => {
                return Err(Error::ExternalTool(format!(
                    "Vault token lookup failed with status {}",
                    status
                )));
            }
        }

        self.session = Some(VaultSession {
            client,
            address: address.clone(),
            session: ManagerSession::new(token)?,
        });
        info!(address = %address, "Vault session established");
        Ok(())
    }

    async fn logout(&mut self) -> Result<()> {
        if self.session.take().is_some() {
            info!("Vault session closed");
        } else {
            debug!("No active Vault session, nothing to close");
        }
        Ok(())
    }

    async fn get_secret(&self, service: &str, field: &str) -> Result<String> {
        let vault = self.session()?;

        info!(path = service, "Reading secret from Vault");
        let url = format!("{}/v1/{}/data/{}", vault.address, KV_MOUNT, service);
        let response = vault
            .client
            .get(url)
            .header(VAULT_TOKEN_HEADER, vault.session.token())
            .send()
            .await
            .map_err(connection_error)?;

        match response.status() {
            StatusCode::NOT_FOUND => return Err(Error::SecretNotFound(service.to_string())),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(Error::Authentication(
                    "Vault denied access to the secret".to_string(),
                ));
            }
            status if !status.is_success() => {
                return Err(Error::ExternalTool(format!(
                    "Vault read failed with status {}",
                    status
                )));
            }
            _ => {}
        }

        let body: KvResponse = response
            .json()
            .await
            .map_err(|e| Error::ExternalTool(format!("Invalid Vault response: {}", e)))?;

        match body.data.data.get(field) {
            Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
            Some(Value::Null) | Some(Value::String(_)) | None => {
                Err(Error::field_not_found(service, field))
            }
            Some(other) => Ok(other.to_string()),
        }
    }

    fn kind(&self) -> ManagerKind {
        ManagerKind::Hashicorp
    }
}

fn connection_error(err: reqwest::Error) -> Error {
    Error::ExternalTool(format!("Vault request failed: {}", err))
}

/// KV v2 read response; the payload proper sits under `data.data`.
#[derive(Debug, Deserialize)]
struct KvResponse {
    data: KvData,
}

#[derive(Debug, Deserialize)]
struct KvData {
    data: serde_json::Map<String, Value>,
}
