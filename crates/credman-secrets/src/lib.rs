//! Multi-backend secret retrieval for credman.
//!
//! Backends are selected by name through [`SecretsManagerFactory`] and share
//! the [`SecretsManager`] capability surface: `login`, `get_secret`,
//! `logout`. The [`get_secret`] convenience function wraps one query in the
//! full session lifecycle.

pub mod aws;
pub mod bitwarden;
pub mod factory;
pub mod manager;
pub mod resolver;
pub mod runner;
pub mod vault;

pub use aws::AwsSecretsManager;
pub use bitwarden::BitwardenManager;
pub use factory::SecretsManagerFactory;
pub use manager::SecretsManager;
pub use resolver::{CredentialResolver, PromptInput, TerminalPrompt};
pub use runner::{BwCli, CommandOutput, CommandRunner};
pub use vault::HashicorpVaultManager;

use credman_core::{CredentialSpec, ManagerKind, Result};
use tracing::warn;

/// Retrieve one credential, running the whole session lifecycle.
///
/// Creates the manager for `kind`, logs in, queries `field` of `service`,
/// and logs out again on both the success and the error path so no
/// authenticated external session is left open.
pub async fn get_secret(kind: &str, service: &str, field: &str) -> Result<String> {
    let kind: ManagerKind = kind.parse()?;
    let spec = CredentialSpec::new(kind, service, field);
    let mut manager = SecretsManagerFactory::create_kind(spec.kind);

    manager.login().await?;
    let result = manager.get_secret(&spec.service, &spec.field).await;
    if let Err(err) = manager.logout().await {
        warn!(kind = %manager.kind(), error = %err, "Logout failed after retrieval");
    }

    result
}
