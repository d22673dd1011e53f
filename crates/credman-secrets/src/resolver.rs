//! Credential resolution: environment first, interactive prompt second.

use credman_core::{Error, Result};
use dialoguer::{Input, Password};
use tracing::debug;

/// Reads one value from the user.
///
/// Session-based managers gather their authentication material through
/// this trait so tests can supply deterministic values instead of real
/// terminal input.
pub trait PromptInput: Send + Sync {
    /// Read a non-secret value, echoing input.
    fn read_input(&self, label: &str) -> Result<String>;

    /// Read a secret value with masked input.
    fn read_secret(&self, label: &str) -> Result<String>;
}

/// Interactive terminal prompt.
pub struct TerminalPrompt;

impl PromptInput for TerminalPrompt {
    fn read_input(&self, label: &str) -> Result<String> {
        Input::<String>::new()
            .with_prompt(label)
            .allow_empty(true)
            .interact_text()
            .map_err(|e| Error::ExternalTool(format!("Terminal prompt failed: {}", e)))
    }

    fn read_secret(&self, label: &str) -> Result<String> {
        Password::new()
            .with_prompt(label)
            .allow_empty_password(true)
            .interact()
            .map_err(|e| Error::ExternalTool(format!("Terminal prompt failed: {}", e)))
    }
}

/// Resolves required authentication material for a backend.
///
/// Each credential is looked up in its designated environment variable
/// first; a missing or blank variable falls through to an interactive
/// prompt, which repeats until the entry is non-blank. A required value is
/// therefore never resolved to an empty string.
pub struct CredentialResolver {
    prompt: Box<dyn PromptInput>,
}

impl CredentialResolver {
    pub fn new() -> Self {
        Self {
            prompt: Box::new(TerminalPrompt),
        }
    }

    pub fn with_prompt(prompt: Box<dyn PromptInput>) -> Self {
        Self { prompt }
    }

    /// Resolve a required non-secret value.
    pub fn resolve(&self, env_var: &str, label: &str) -> Result<String> {
        if let Some(value) = env_value(env_var) {
            return Ok(value);
        }
        debug!(env_var, "Environment variable unset or blank, prompting");
        loop {
            let value = self.prompt.read_input(label)?;
            if !value.trim().is_empty() {
                return Ok(value);
            }
        }
    }

    /// Resolve a required secret value, masking interactive input.
    pub fn resolve_secret(&self, env_var: &str, label: &str) -> Result<String> {
        if let Some(value) = env_value(env_var) {
            return Ok(value);
        }
        debug!(env_var, "Environment variable unset or blank, prompting");
        loop {
            let value = self.prompt.read_secret(label)?;
            if !value.trim().is_empty() {
                return Ok(value);
            }
        }
    }

    /// Resolve an optional value from the environment only, never prompting.
    pub fn resolve_optional(&self, env_var: &str) -> Option<String> {
        env_value(env_var)
    }
}

impl Default for CredentialResolver {
    fn default() -> Self {
        Self::new()
    }
}

fn env_value(env_var: &str) -> Option<String> {
    std::env::var(env_var)
        .ok()
        .filter(|v| !v.trim().is_empty())
}
