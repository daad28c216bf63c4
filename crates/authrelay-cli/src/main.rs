//! authrelay - command-line access to an API session.
//!
//! Logs in against the configured API, keeps the session on disk (or in the
//! OS keychain) and issues authenticated requests that refresh expired
//! tokens on their own.

use std::io;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use authrelay_core::config::APP_NAME;
use authrelay_core::{
    ClientConfig, Clients, Dispatch, FileStorage, KeyringStorage, TokenStore,
};

/// Environment variable holding the password for non-interactive logins
const ENV_PASSWORD: &str = "AUTHRELAY_PASSWORD";

/// Set to `keychain` to keep the session in the OS keychain instead of files
const ENV_STORAGE: &str = "AUTHRELAY_STORAGE";

const USAGE: &str = "\
Usage: authrelay <command>

Commands:
  login <email>   Log in and store the session
  logout          Revoke the refresh token and forget the session
  status          Show whether the stored session is usable
  whoami          Print the logged-in user
  refresh         Renew the access token now
  get <path>      Authenticated GET, printing the JSON response";

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

fn open_store(config: &ClientConfig) -> Result<TokenStore> {
    let keychain = std::env::var(ENV_STORAGE)
        .map(|v| v.eq_ignore_ascii_case("keychain"))
        .unwrap_or(false);

    if keychain {
        return Ok(TokenStore::new(KeyringStorage::new(APP_NAME)));
    }

    let dir = config.storage_dir()?;
    let storage = FileStorage::new(&dir)
        .with_context(|| format!("Failed to open session directory {}", dir.display()))?;
    Ok(TokenStore::new(storage))
}

fn read_password() -> Result<String> {
    if let Ok(password) = std::env::var(ENV_PASSWORD) {
        return Ok(password);
    }
    rpassword::prompt_password("Password: ").context("Failed to read password")
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first() else {
        eprintln!("{}", USAGE);
        return Ok(());
    };

    let config = ClientConfig::from_env()?;
    let store = Arc::new(open_store(&config)?);
    store.init().context("Failed to load stored session")?;

    let clients = Clients::new(&config, store)?;
    let auth = clients.auth();
    info!(api = %config.base_url, command = %command, "authrelay starting");

    match (command.as_str(), args.get(1)) {
        ("login", Some(email)) => {
            let password = read_password()?;
            let user = auth.login(email, &password).await?;
            println!("Logged in as {}", user.display_name());
        }
        ("logout", None) => {
            auth.logout().await?;
            println!("Logged out");
        }
        ("status", None) => {
            let session = auth.session()?;
            let expiry = clients.expiry();
            match session.access_token {
                Some(ref token) if expiry.is_valid(Some(token)) => println!(
                    "Logged in; access token expires in {}m",
                    expiry.minutes_until_expiry(token)
                ),
                Some(_) => println!("Access token expired; it will be refreshed on next use"),
                None => println!("Not logged in"),
            }
        }
        ("whoami", None) => match auth.current_user()? {
            Some(user) => println!("{} <{}>", user.display_name(), user.email),
            None => println!("Not logged in"),
        },
        ("refresh", None) => {
            let session = auth.refresh_login().await?;
            match session.access_token {
                Some(token) => println!("Access token renewed until {}", token.expires_at()),
                None => bail!("Refresh succeeded but no access token was stored"),
            }
        }
        ("get", Some(path)) => {
            let body: serde_json::Value = clients.private().get(path).await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        _ => {
            eprintln!("{}", USAGE);
            bail!("Unknown or incomplete command: {}", args.join(" "));
        }
    }

    Ok(())
}
