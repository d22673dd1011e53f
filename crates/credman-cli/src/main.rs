//! Credman CLI entrypoint.
//!
//! `credman <manager> <service> <credential>` prints the requested secret
//! value on stdout and exits 0; any failure goes to stderr with a non-zero
//! exit. Logs are written to stderr so stdout stays machine-consumable.

use clap::Parser;
use credman_core::Error;
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "credman")]
#[command(author, version, about = "Retrieve a secret from a configured secrets manager", long_about = None)]
struct Cli {
    /// Secrets manager to use: bitwarden, aws or hashicorp
    manager: String,

    /// Name of the service (item, secret id or path) to look up
    service: String,

    /// Name of the credential to retrieve
    credential: String,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_level = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_writer(std::io::stderr)
        .init();

    match credman_secrets::get_secret(&cli.manager, &cli.service, &cli.credential).await {
        Ok(secret) => println!("{}", secret),
        Err(err) => {
            error!(manager = %cli.manager, service = %cli.service, "Failed to retrieve secret");
            eprintln!("error: {}", err);
            std::process::exit(exit_code(&err));
        }
    }
}

/// Map each failure class to a distinct exit code so callers can tell
/// bad credentials apart from a missing secret without parsing stderr.
fn exit_code(err: &Error) -> i32 {
    match err {
        Error::ExternalTool(_) | Error::Io(_) => 1,
        Error::Authentication(_) => 2,
        Error::SecretNotFound(_) => 3,
        Error::FieldNotFound { .. } => 4,
        Error::AmbiguousItem(_) => 5,
        Error::UnsupportedManager(_) => 6,
    }
}
