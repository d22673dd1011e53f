//! Bitwarden CLI backend.
//!
//! Session-based manager driving the `bw` command-line tool. Login is a
//! two-phase handshake: authenticating the account with an API key and
//! unlocking the vault are independent states in `bw`, so both steps run
//! every time and only the unlock yields a usable session token.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use credman_core::{
    CustomField, Error, LoginBlock, ManagerKind, ManagerSession, Result, Secret, SecretMetadata,
};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::manager::SecretsManager;
use crate::resolver::CredentialResolver;
use crate::runner::{BwCli, CommandOutput, CommandRunner};

const BW_CLIENT_ID_ENV: &str = "CREDMAN_BW_CLIENT_ID";
const BW_CLIENT_SECRET_ENV: &str = "CREDMAN_BW_CLIENT_SECRET";
const BW_PASSWORD_ENV: &str = "CREDMAN_BW_PASSWORD";

/// Secrets manager backed by the Bitwarden CLI.
pub struct BitwardenManager {
    runner: Box<dyn CommandRunner>,
    resolver: CredentialResolver,
    session: Option<ManagerSession>,
}

impl BitwardenManager {
    pub fn new() -> Self {
        Self::with_parts(Box::new(BwCli::new()), CredentialResolver::new())
    }

    /// Build with an explicit runner and resolver, the seam tests use to
    /// script CLI output and prompt entries.
    pub fn with_parts(runner: Box<dyn CommandRunner>, resolver: CredentialResolver) -> Self {
        Self {
            runner,
            resolver,
            session: None,
        }
    }

    fn session(&self) -> Result<&ManagerSession> {
        self.session.as_ref().ok_or_else(|| {
            Error::Authentication("No active Bitwarden session, call login() first".to_string())
        })
    }

    /// Find the single vault item whose name matches `service`.
    async fn find_item(&self, service: &str) -> Result<BwItem> {
        let session = self.session()?;
        let list = self
            .runner
            .run(
                &["list", "items", "--search", service, "--session", session.token()],
                &[],
            )
            .await?;
        if !list.success {
            return Err(Error::ExternalTool(format!(
                "bw list items failed: {}",
                list.stderr.trim()
            )));
        }

        let items: Vec<BwItem> = serde_json::from_str(list.stdout_trimmed())?;
        // The search is fuzzy; only exact (case-insensitive) names count.
        let mut matches = items
            .into_iter()
            .filter(|item| item.name.eq_ignore_ascii_case(service));

        match (matches.next(), matches.next()) {
            (Some(item), None) => Ok(item),
            (Some(_), Some(_)) => Err(Error::AmbiguousItem(service.to_string())),
            (None, _) => Err(Error::SecretNotFound(service.to_string())),
        }
    }
}

impl Default for BitwardenManager {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SecretsManager for BitwardenManager {
    async fn login(&mut self) -> Result<()> {
        let client_id = self
            .resolver
            .resolve(BW_CLIENT_ID_ENV, "Bitwarden API client id")?;
        let client_secret = self
            .resolver
            .resolve_secret(BW_CLIENT_SECRET_ENV, "Bitwarden API client secret")?;
        let password = self
            .resolver
            .resolve_secret(BW_PASSWORD_ENV, "Bitwarden master password")?;

        // Phase one: authenticate the account. The session this grants is
        // not usable yet; the vault still has to be unlocked.
        debug!("Authenticating with the Bitwarden CLI");
        let login = self
            .runner
            .run(
                &["login", "--apikey"],
                &[
                    ("BW_CLIENTID", client_id.as_str()),
                    ("BW_CLIENTSECRET", client_secret.as_str()),
                ],
            )
            .await?;
        if !login.success && !already_logged_in(&login) {
            return Err(auth_failure("login", &login.stderr));
        }

        // Phase two: unlock the vault to obtain the session token.
        debug!("Unlocking the Bitwarden vault");
        let unlock = self.runner.run(&["unlock", &password, "--raw"], &[]).await?;
        if !unlock.success {
            return Err(auth_failure("unlock", &unlock.stderr));
        }
        let token = unlock.stdout_trimmed();
        if token.is_empty() {
            return Err(Error::ExternalTool(
                "Empty session token received from 'bw unlock'".to_string(),
            ));
        }
        let session = ManagerSession::new(token)?;

        // Best-effort sync so queries see a current vault.
        match self
            .runner
            .run(&["sync", "--session", session.token()], &[])
            .await
        {
            Ok(sync) if !sync.success => {
                debug!(stderr = %sync.stderr.trim(), "Vault sync failed, continuing")
            }
            Err(err) => debug!(error = %err, "Vault sync failed, continuing"),
            Ok(_) => debug!("Vault synced"),
        }

        self.session = Some(session);
        info!("Bitwarden session established");
        Ok(())
    }

    async fn logout(&mut self) -> Result<()> {
        // Drop the local token first: even a failed remote logout must not
        // leave it in memory.
        let Some(_session) = self.session.take() else {
            debug!("No active Bitwarden session, nothing to log out");
            return Ok(());
        };

        match self.runner.run(&["logout"], &[]).await {
            Ok(out) if !out.success => {
                warn!(stderr = %out.stderr.trim(), "bw logout failed, local session cleared anyway")
            }
            Err(err) => warn!(error = %err, "bw logout failed, local session cleared anyway"),
            Ok(_) => info!("Logged out of Bitwarden"),
        }
        Ok(())
    }

    async fn get_secret(&self, service: &str, field: &str) -> Result<String> {
        info!(service, "Retrieving item from the Bitwarden vault");
        let item = self.find_item(service).await?;

        let session = self.session()?;
        let get = self
            .runner
            .run(&["get", "item", &item.id, "--session", session.token()], &[])
            .await?;
        if !get.success {
            return Err(Error::ExternalTool(format!(
                "bw get item failed: {}",
                get.stderr.trim()
            )));
        }

        let item: BwItem = serde_json::from_str(get.stdout_trimmed())?;
        let secret = item.into_secret();
        if !secret.matches_service(service) {
            // The item changed between the list and the get.
            return Err(Error::SecretNotFound(service.to_string()));
        }
        secret
            .field(field)
            .map(str::to_string)
            .ok_or_else(|| Error::field_not_found(service, field))
    }

    fn kind(&self) -> ManagerKind {
        ManagerKind::Bitwarden
    }
}

fn already_logged_in(output: &CommandOutput) -> bool {
    let combined = format!("{} {}", output.stdout, output.stderr).to_lowercase();
    combined.contains("already logged in")
}

fn auth_failure(phase: &str, stderr: &str) -> Error {
    let stderr = stderr.trim();
    let lowered = stderr.to_lowercase();
    if lowered.contains("invalid") || lowered.contains("incorrect") || lowered.contains("unauthorized")
    {
        Error::Authentication(format!("Bitwarden {} rejected the credentials: {}", phase, stderr))
    } else {
        Error::ExternalTool(format!("bw {} failed: {}", phase, stderr))
    }
}

/// Raw `bw` item JSON, canonicalized into [`Secret`] after retrieval.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BwItem {
    id: String,
    name: String,
    #[serde(default)]
    login: Option<BwLogin>,
    #[serde(default)]
    fields: Vec<BwField>,
    #[serde(default)]
    revision_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct BwLogin {
    username: Option<String>,
    password: Option<String>,
    totp: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BwField {
    name: Option<String>,
    value: Option<String>,
}

impl BwItem {
    fn into_secret(self) -> Secret {
        Secret {
            name: self.name,
            fields: self
                .fields
                .into_iter()
                .filter_map(|f| {
                    f.name.map(|name| CustomField {
                        name,
                        value: f.value,
                    })
                })
                .collect(),
            login: self.login.map(|l| LoginBlock {
                username: l.username,
                password: l.password,
                totp: l.totp,
            }),
            metadata: SecretMetadata {
                revision_date: self.revision_date,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::tests::ScriptedPrompt;
    use std::sync::Mutex;

    /// Runner replaying a fixed sequence of CLI outputs and recording the
    /// argument vectors it was invoked with.
    struct ScriptedBw {
        outputs: Mutex<Vec<CommandOutput>>,
        calls: Mutex<Vec<Vec<String>>>,
    }

    impl ScriptedBw {
        fn new(outputs: Vec<CommandOutput>) -> Self {
            Self {
                outputs: Mutex::new(outputs.into_iter().rev().collect()),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<Vec<String>> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CommandRunner for ScriptedBw {
        async fn run(&self, args: &[&str], _env: &[(&str, &str)]) -> Result<CommandOutput> {
            self.calls
                .lock()
                .unwrap()
                .push(args.iter().map(|s| s.to_string()).collect());
            self.outputs
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| Error::ExternalTool("unexpected CLI invocation".to_string()))
        }
    }

    fn ok(stdout: &str) -> CommandOutput {
        CommandOutput {
            success: true,
            stdout: stdout.to_string(),
            stderr: String::new(),
        }
    }

    fn fail(stderr: &str) -> CommandOutput {
        CommandOutput {
            success: false,
            stdout: String::new(),
            stderr: stderr.to_string(),
        }
    }

    fn scripted_resolver() -> CredentialResolver {
        CredentialResolver::with_prompt(Box::new(ScriptedPrompt::new(&[
            "client-id",
            "client-secret",
            "master-password",
        ])))
    }

    fn manager_with(outputs: Vec<CommandOutput>) -> (BitwardenManager, std::sync::Arc<ScriptedBw>) {
        let runner = std::sync::Arc::new(ScriptedBw::new(outputs));
        let manager = BitwardenManager::with_parts(
            Box::new(SharedRunner(runner.clone())),
            scripted_resolver(),
        );
        (manager, runner)
    }

    /// Lets the test keep a handle on the runner the manager owns.
    struct SharedRunner(std::sync::Arc<ScriptedBw>);

    #[async_trait]
    impl CommandRunner for SharedRunner {
        async fn run(&self, args: &[&str], env: &[(&str, &str)]) -> Result<CommandOutput> {
            self.0.run(args, env).await
        }
    }

    fn logged_in_manager(outputs: Vec<CommandOutput>) -> BitwardenManager {
        let mut manager =
            BitwardenManager::with_parts(Box::new(ScriptedBw::new(outputs)), scripted_resolver());
        manager.session = Some(ManagerSession::new("test-session-key").unwrap());
        manager
    }

    const GITHUB_ITEM: &str = r#"{
        "id": "item-1",
        "name": "github",
        "login": {"username": "u1", "password": "p1", "totp": null},
        "fields": [{"name": "api-token", "value": "T1", "type": 1}],
        "revisionDate": "2024-11-23T12:20:59.985Z"
    }"#;

    fn github_list() -> String {
        format!("[{}]", GITHUB_ITEM)
    }

    #[tokio::test]
    async fn test_login_performs_both_handshake_phases() {
        let (mut manager, runner) = manager_with(vec![
            ok("Logged in!"),
            ok("test-session-key\n"),
            ok("Syncing complete."),
        ]);

        manager.login().await.unwrap();

        assert_eq!(manager.session.as_ref().unwrap().token(), "test-session-key");
        let calls = runner.calls();
        assert_eq!(calls[0], vec!["login", "--apikey"]);
        assert_eq!(calls[1], vec!["unlock", "master-password", "--raw"]);
        assert_eq!(calls[2], vec!["sync", "--session", "test-session-key"]);
    }

    #[tokio::test]
    async fn test_login_with_rejected_credentials() {
        let (mut manager, _runner) = manager_with(vec![fail("Invalid credentials.")]);

        let err = manager.login().await.unwrap_err();
        assert!(matches!(err, Error::Authentication(_)), "got {err:?}");
        assert!(manager.session.is_none());
    }

    #[tokio::test]
    async fn test_login_accepts_already_logged_in() {
        let (mut manager, _runner) = manager_with(vec![
            fail("You are already logged in as user@example.com."),
            ok("test-session-key"),
            ok(""),
        ]);

        manager.login().await.unwrap();
        assert!(manager.session.is_some());
    }

    #[tokio::test]
    async fn test_unlock_failure_is_external_tool_error() {
        let (mut manager, _runner) =
            manager_with(vec![ok("Logged in!"), fail("Unlock failed")]);

        let err = manager.login().await.unwrap_err();
        assert!(matches!(err, Error::ExternalTool(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn test_empty_session_token_is_rejected() {
        let (mut manager, _runner) = manager_with(vec![ok("Logged in!"), ok("\n")]);

        let err = manager.login().await.unwrap_err();
        assert!(matches!(err, Error::ExternalTool(_)), "got {err:?}");
        assert!(manager.session.is_none());
    }

    #[tokio::test]
    async fn test_sync_failure_does_not_fail_login() {
        let (mut manager, _runner) = manager_with(vec![
            ok("Logged in!"),
            ok("test-session-key"),
            fail("Sync is unavailable"),
        ]);

        manager.login().await.unwrap();
        assert!(manager.session.is_some());
    }

    #[tokio::test]
    async fn test_get_secret_requires_session() {
        let manager =
            BitwardenManager::with_parts(Box::new(ScriptedBw::new(vec![])), scripted_resolver());

        let err = manager.get_secret("github", "api-token").await.unwrap_err();
        assert!(matches!(err, Error::Authentication(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn test_get_secret_custom_field() {
        let manager = logged_in_manager(vec![ok(&github_list()), ok(GITHUB_ITEM)]);

        let value = manager.get_secret("github", "api-token").await.unwrap();
        assert_eq!(value, "T1");
    }

    #[tokio::test]
    async fn test_get_secret_login_alias() {
        let manager = logged_in_manager(vec![ok(&github_list()), ok(GITHUB_ITEM)]);

        let value = manager.get_secret("github", "username").await.unwrap();
        assert_eq!(value, "u1");
    }

    #[tokio::test]
    async fn test_get_secret_unknown_field() {
        let manager = logged_in_manager(vec![ok(&github_list()), ok(GITHUB_ITEM)]);

        let err = manager.get_secret("github", "unknown").await.unwrap_err();
        match err {
            Error::FieldNotFound { service, field } => {
                assert_eq!(service, "github");
                assert_eq!(field, "unknown");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_item_name_matched_case_insensitively() {
        let manager = logged_in_manager(vec![ok(&github_list()), ok(GITHUB_ITEM)]);

        let value = manager.get_secret("GitHub", "api-token").await.unwrap();
        assert_eq!(value, "T1");
    }

    #[tokio::test]
    async fn test_no_matching_item() {
        let manager = logged_in_manager(vec![ok("[]")]);

        let err = manager.get_secret("missing", "password").await.unwrap_err();
        match err {
            Error::SecretNotFound(service) => assert_eq!(service, "missing"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fuzzy_search_hits_are_not_matches() {
        // The bw search also returns partial-name hits; they must not count.
        let list = r#"[{"id": "item-9", "name": "github-backup", "fields": []}]"#;
        let manager = logged_in_manager(vec![ok(list)]);

        let err = manager.get_secret("github", "password").await.unwrap_err();
        assert!(matches!(err, Error::SecretNotFound(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn test_duplicate_item_names_are_ambiguous() {
        let list = format!(
            "[{},{}]",
            GITHUB_ITEM,
            GITHUB_ITEM.replace("item-1", "item-2")
        );
        let manager = logged_in_manager(vec![ok(&list)]);

        let err = manager.get_secret("github", "username").await.unwrap_err();
        match err {
            Error::AmbiguousItem(service) => assert_eq!(service, "github"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_malformed_list_output() {
        let manager = logged_in_manager(vec![ok("not valid json")]);

        let err = manager.get_secret("github", "password").await.unwrap_err();
        assert!(matches!(err, Error::ExternalTool(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn test_logout_clears_session() {
        let mut manager = logged_in_manager(vec![ok("You have logged out.")]);

        manager.logout().await.unwrap();
        assert!(manager.session.is_none());

        let err = manager.get_secret("github", "password").await.unwrap_err();
        assert!(matches!(err, Error::Authentication(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn test_logout_twice_is_a_noop() {
        let mut manager = logged_in_manager(vec![ok("You have logged out.")]);

        manager.logout().await.unwrap();
        // Second call must not touch the CLI (the script is exhausted).
        manager.logout().await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_logout_still_clears_session() {
        let mut manager = logged_in_manager(vec![fail("Logout failed")]);

        manager.logout().await.unwrap();
        assert!(manager.session.is_none());
    }
}
