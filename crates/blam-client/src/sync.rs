//! Realtime sync loop.
//!
//! One forwarder task per watched table pushes change markers into a single
//! queue. The consumer drains a batch, waits out the coalescing window,
//! folds whatever else arrived in the meantime, and reloads the projection
//! once per batch.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use blam_store::{RemoteStore, Table};

use crate::projection::FeedProjection;
use crate::session::Session;

/// Tables whose changes invalidate the projection.
pub const WATCHED_TABLES: [Table; 4] = [
    Table::Posts,
    Table::Comments,
    Table::Votes,
    Table::Communities,
];

/// Running sync loop. Dropping the handle aborts it.
pub struct SyncHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
    forwarders: Vec<JoinHandle<()>>,
    reloads: Arc<AtomicU64>,
}

impl SyncHandle {
    /// Number of batches that triggered a reload so far.
    pub fn reload_count(&self) -> u64 {
        self.reloads.load(Ordering::SeqCst)
    }

    /// Stop the loop and wait for an in-progress reload to finish.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        for forwarder in self.forwarders.drain(..) {
            forwarder.abort();
        }
    }
}

impl Drop for SyncHandle {
    fn drop(&mut self) {
        for forwarder in &self.forwarders {
            forwarder.abort();
        }
        if let Some(task) = &self.task {
            task.abort();
        }
    }
}

pub fn spawn_sync_loop(
    store: Arc<dyn RemoteStore>,
    feed: Arc<FeedProjection>,
    session: Arc<Session>,
    coalesce: Duration,
) -> SyncHandle {
    let (tx, mut rx) = mpsc::channel::<Table>(256);
    let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
    let reloads = Arc::new(AtomicU64::new(0));

    let forwarders = WATCHED_TABLES
        .iter()
        .map(|&table| {
            let mut subscription = store.subscribe(table);
            let tx = tx.clone();
            tokio::spawn(async move {
                while let Some(event) = subscription.recv().await {
                    match tx.try_send(event.table) {
                        // A full queue already guarantees a pending reload.
                        Ok(()) | Err(TrySendError::Full(_)) => {}
                        Err(TrySendError::Closed(_)) => break,
                    }
                }
            })
        })
        .collect();
    drop(tx);

    let counter = reloads.clone();
    let task = tokio::spawn(async move {
        info!(tables = ?WATCHED_TABLES, "sync loop started");
        loop {
            tokio::select! {
                _ = &mut shutdown_rx => break,
                first = rx.recv() => {
                    let Some(first) = first else { break };
                    let mut tables = HashSet::from([first]);

                    let window = tokio::time::sleep(coalesce);
                    tokio::pin!(window);
                    loop {
                        tokio::select! {
                            _ = &mut window => break,
                            next = rx.recv() => match next {
                                Some(table) => {
                                    tables.insert(table);
                                }
                                None => break,
                            },
                        }
                    }
                    while let Ok(table) = rx.try_recv() {
                        tables.insert(table);
                    }

                    counter.fetch_add(1, Ordering::SeqCst);
                    debug!(tables = ?tables, "remote changes, reloading feed");
                    // Failures are logged by the projection, which keeps its
                    // last known state.
                    let _ = feed.reload(store.as_ref(), session.user_id()).await;
                }
            }
        }
        info!("sync loop stopped");
    });

    SyncHandle {
        shutdown: Some(shutdown_tx),
        task: Some(task),
        forwarders,
        reloads,
    }
}
