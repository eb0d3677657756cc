//! Client core for the Blam music feed: session, feed projection, votes,
//! optimistic mutations, memberships, track search and realtime sync on top
//! of a [`blam_store::RemoteStore`].

pub mod client;
pub mod config;
pub mod directory;
pub mod error;
pub mod membership;
pub mod mutations;
pub mod optimistic;
pub mod projection;
pub mod search;
pub mod session;
pub mod sync;
pub mod votes;

use tracing_subscriber::{fmt, EnvFilter};

pub use client::BlamClient;
pub use config::ClientConfig;
pub use error::{ClientError, Result};
pub use votes::{SkipReason, VoteChange, VoteOutcome};

/// Install the global tracing subscriber. `RUST_LOG` overrides the default
/// filter. Calling it twice is harmless.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("blam_client=debug,blam_store=info,warn"));

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init();
}
