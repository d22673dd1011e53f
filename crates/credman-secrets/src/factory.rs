//! Backend selection by manager kind.

use credman_core::{ManagerKind, Result};
use tracing::debug;

use crate::aws::AwsSecretsManager;
use crate::bitwarden::BitwardenManager;
use crate::manager::SecretsManager;
use crate::vault::HashicorpVaultManager;

/// Constructs the manager implementation for a requested backend kind.
///
/// Construction is lazy: no `login()` happens here, the caller drives the
/// session lifecycle (see [`SecretsManager`]).
pub struct SecretsManagerFactory;

impl SecretsManagerFactory {
    /// Build a manager from a kind string, matched case-insensitively.
    pub fn create(kind: &str) -> Result<Box<dyn SecretsManager>> {
        let kind: ManagerKind = kind.parse()?;
        Ok(Self::create_kind(kind))
    }

    /// Build a manager from an already-parsed kind.
    pub fn create_kind(kind: ManagerKind) -> Box<dyn SecretsManager> {
        debug!(%kind, "Creating secrets manager");
        match kind {
            ManagerKind::Bitwarden => Box::new(BitwardenManager::new()),
            ManagerKind::Aws => Box::new(AwsSecretsManager::new()),
            ManagerKind::Hashicorp => Box::new(HashicorpVaultManager::new()),
        }
    }
}
