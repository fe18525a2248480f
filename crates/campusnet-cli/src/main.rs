//! campusnet - command-line access to the campus API.
//!
//! A thin front end over `campusnet-core`: store tokens obtained elsewhere,
//! issue authenticated requests (refreshing tokens as needed), and sign out.

use std::io;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use campusnet_core::{ClientConfig, NetworkClient, RequestDescriptor, TokenPair};
use chrono::Utc;
use tracing::{debug, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Overrides `base_url` from the config file
const BASE_URL_ENV: &str = "CAMPUSNET_BASE_URL";

const USAGE: &str = "\
Usage: campusnet <command>

Commands:
  status               Show whether tokens are stored
  login                Store an access/refresh token pair (prompted)
  logout               Forget stored tokens
  get <path>           GET a resource
  delete <path>        DELETE a resource
  post <path> <json>   POST a JSON body
  put <path> <json>    PUT a JSON body

Set RUST_LOG=debug to see token refresh activity.";

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
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

    let mut config = ClientConfig::load().context("Failed to load configuration")?;
    if let Ok(base_url) = std::env::var(BASE_URL_ENV) {
        debug!(base_url = %base_url, "Base URL overridden from environment");
        config.base_url = base_url;
    }
    info!(base_url = %config.base_url, storage = ?config.token_storage, "campusnet starting");

    let store = Arc::new(
        config
            .open_token_store()
            .context("Failed to open token store")?,
    );
    let client = NetworkClient::new(config, store)?;

    match (command.as_str(), &args[1..]) {
        ("status", []) => status(&client).await,
        ("login", []) => login(&client).await,
        ("logout", []) => {
            client.logout().await?;
            println!("Signed out");
            Ok(())
        }
        ("get", [path]) => send(&client, RequestDescriptor::get(path)).await,
        ("delete", [path]) => send(&client, RequestDescriptor::delete(path)).await,
        ("post", [path, body]) => {
            let body = parse_body(body)?;
            send(&client, RequestDescriptor::post_json(path, &body)?).await
        }
        ("put", [path, body]) => {
            let body = parse_body(body)?;
            send(&client, RequestDescriptor::put_json(path, &body)?).await
        }
        _ => bail!("Unrecognized command line\n\n{}", USAGE),
    }
}

fn parse_body(body: &str) -> Result<serde_json::Value> {
    serde_json::from_str(body).context("Request body must be valid JSON")
}

async fn status(client: &NetworkClient) -> Result<()> {
    if !client.is_logged_in().await {
        println!("Signed out");
        return Ok(());
    }
    match client.token_store().saved_at().await {
        Some(saved_at) => println!(
            "Signed in (tokens saved {})",
            age_display((Utc::now() - saved_at).num_minutes())
        ),
        None => println!("Signed in"),
    }
    Ok(())
}

async fn login(client: &NetworkClient) -> Result<()> {
    let access = rpassword::prompt_password("Access token: ").context("Failed to read access token")?;
    let refresh =
        rpassword::prompt_password("Refresh token: ").context("Failed to read refresh token")?;
    let (access, refresh) = (access.trim(), refresh.trim());
    if access.is_empty() || refresh.is_empty() {
        bail!("Both tokens are required");
    }

    client.set_tokens(TokenPair::new(access, refresh)).await?;
    println!("Signed in");
    Ok(())
}

async fn send(client: &NetworkClient, descriptor: RequestDescriptor) -> Result<()> {
    let response = match client.request(&descriptor).await {
        Ok(response) => response,
        Err(e) if e.requires_login() => {
            bail!("{}\nRun `campusnet login` to sign in again.", e)
        }
        Err(e) => return Err(e.into()),
    };

    eprintln!("HTTP {}", response.status);
    match serde_json::from_slice::<serde_json::Value>(&response.body) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{}", response.text()),
    }

    if !response.is_success() {
        bail!("Request failed with status {}", response.status);
    }
    Ok(())
}

/// Human-friendly age for a number of minutes
fn age_display(minutes: i64) -> String {
    if minutes < 1 {
        // Negative values mean clock skew
        "just now".to_string()
    } else if minutes < 60 {
        format!("{}m ago", minutes)
    } else if minutes < 1440 {
        format!("{}h ago", minutes / 60)
    } else {
        format!("{}d ago", minutes / 1440)
    }
}
