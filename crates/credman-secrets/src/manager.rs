//! The secrets manager capability trait.

use async_trait::async_trait;
use credman_core::{ManagerKind, Result};

/// Uniform capability surface over the secret store backends.
///
/// Construction never logs in. Session-based backends (Bitwarden, Vault)
/// require an explicit [`login`](SecretsManager::login) before
/// [`get_secret`](SecretsManager::get_secret) and fail with
/// `Error::Authentication` otherwise. The stateless AWS backend accepts
/// `get_secret` without a login; its `login` only validates that ambient
/// credentials are present.
///
/// Every `get_secret` call queries the backend fresh — nothing is cached,
/// trading latency for correctness under secret rotation.
#[async_trait]
pub trait SecretsManager: Send + Sync {
    /// Establish a session with the backend.
    async fn login(&mut self) -> Result<()>;

    /// Invalidate and clear the session. Idempotent: calling this on an
    /// already-unauthenticated manager is a no-op.
    async fn logout(&mut self) -> Result<()>;

    /// Retrieve the value of `field` from the item named `service`.
    async fn get_secret(&self, service: &str, field: &str) -> Result<String>;

    /// Which backend this manager drives, for logging and dispatch.
    fn kind(&self) -> ManagerKind;
}
