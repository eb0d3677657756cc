//! # blam-feed
//!
//! Prints the current feed as JSON.
//!
//! Usage: `blam-feed [email]`. With an email the feed is loaded as that user,
//! so each post carries the user's own vote.

use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use blam_client::{init_tracing, BlamClient, ClientConfig};
use blam_store::{RemoteStore, SqliteStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = ClientConfig::from_env();
    info!(?config, "Loaded configuration");

    let store = match &config.db_path {
        Some(path) => SqliteStore::open_at(path)
            .with_context(|| format!("failed to open database at {}", path.display()))?,
        None => SqliteStore::open_default().context("failed to open default database")?,
    };
    if let Some(path) = store.path() {
        info!(path = %path.display(), "Database opened");
    }
    let store: Arc<dyn RemoteStore> = Arc::new(store);

    let client = BlamClient::start(store, config).await?;

    if let Some(email) = std::env::args().nth(1) {
        let user = client
            .sign_in(&email)
            .await
            .with_context(|| format!("failed to sign in as {email}"))?;
        info!(user = %user.username, "Signed in");
    }

    client.reload().await.context("failed to load feed")?;
    let posts = client.feed().all_posts();
    println!("{}", serde_json::to_string_pretty(&posts)?);

    client.shutdown().await;
    Ok(())
}
