//! Attachment / SyncMode coordinator (C10): one instance per attached
//! document, driving the watch loop and its reconnect backoff.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinHandle;

use crate::change_pack::ChangePack;
use crate::document::{Document, DocumentOptions};
use crate::error::{Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncMode {
    Manual,
    Realtime,
    RealtimePushOnly,
    RealtimeSyncOff,
}

impl SyncMode {
    fn is_realtime(self) -> bool {
        matches!(self, SyncMode::Realtime | SyncMode::RealtimePushOnly | SyncMode::RealtimeSyncOff)
    }
}

/// Network boundary; left for the embedding application to implement against
/// its own transport. Out of scope beyond this seam.
#[async_trait]
pub trait NetworkAdapter: Send + Sync {
    async fn push_pull(&self, outgoing: ChangePack) -> Result<ChangePack>;
    async fn watch(&self, doc_key: &str) -> Result<ChangePack>;
    async fn broadcast(&self, doc_key: &str, topic: &str, payload: Vec<u8>) -> Result<()>;
}

struct Inner {
    sync_mode: SyncMode,
    remote_change_event_received: bool,
    watch_task: Option<JoinHandle<()>>,
    cancelled: bool,
}

/// Coordinates one attached document's sync mode, watch loop, and
/// reconnect-on-error backoff. Mutation of `Inner` is cheap and local;
/// the expensive work (network I/O) happens outside the lock, in the
/// spawned watch task.
pub struct Attachment<N: NetworkAdapter + 'static> {
    doc_key: String,
    doc: Arc<Document>,
    adapter: Arc<N>,
    options: DocumentOptions,
    sync_semaphore: Arc<Semaphore>,
    inner: Mutex<Inner>,
}

impl<N: NetworkAdapter + 'static> Attachment<N> {
    pub fn new(doc_key: impl Into<String>, doc: Arc<Document>, adapter: Arc<N>, options: DocumentOptions) -> Self {
        Self {
            doc_key: doc_key.into(),
            doc,
            adapter,
            options,
            sync_semaphore: Arc::new(Semaphore::new(1)),
            inner: Mutex::new(Inner {
                sync_mode: SyncMode::Manual,
                remote_change_event_received: false,
                watch_task: None,
                cancelled: false,
            }),
        }
    }

    pub async fn sync_mode(&self) -> SyncMode {
        self.inner.lock().await.sync_mode
    }

    /// `needRealtimeSync()`: true if the sync mode asks for a realtime
    /// stream, or push-only with local changes queued, or a pending remote
    /// change nudge.
    pub async fn need_realtime_sync(&self) -> bool {
        let sync_mode = self.inner.lock().await.sync_mode;
        match sync_mode {
            SyncMode::Realtime => true,
            SyncMode::RealtimePushOnly => self.doc.has_local_changes().await,
            SyncMode::RealtimeSyncOff | SyncMode::Manual => false,
        }
    }

    /// Drives the `manual -> realtime -> manual` transitions of §4.10's
    /// table; starts or stops the watch loop as a side effect.
    pub async fn change_sync_mode(self: &Arc<Self>, mode: SyncMode) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.cancelled {
            return Err(Error::InvalidArgument("attachment already terminal".into()));
        }

        let was_manual = inner.sync_mode == SyncMode::Manual;
        inner.sync_mode = mode;

        if was_manual && mode.is_realtime() {
            inner.remote_change_event_received = true;
            log::info!("doc {}: starting watch loop ({:?})", self.doc_key, mode);
            let handle = self.clone().spawn_watch_loop();
            inner.watch_task = Some(handle);
        } else if !was_manual && mode == SyncMode::Manual {
            log::info!("doc {}: stopping watch loop", self.doc_key);
            if let Some(task) = inner.watch_task.take() {
                task.abort();
            }
        }

        Ok(())
    }

    /// Terminal transition shared by detach/remove/deactivate: cancels
    /// timers and releases the stream. Idempotent.
    pub async fn terminate(&self) {
        let mut inner = self.inner.lock().await;
        inner.cancelled = true;
        if let Some(task) = inner.watch_task.take() {
            task.abort();
        }
        log::info!("doc {}: attachment terminated", self.doc_key);
    }

    fn spawn_watch_loop(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                {
                    let inner = self.inner.lock().await;
                    if inner.cancelled || inner.sync_mode == SyncMode::Manual {
                        return;
                    }
                }

                match self.adapter.watch(&self.doc_key).await {
                    Ok(pack) => {
                        if let Err(err) = self.doc.apply_change_pack(pack).await {
                            log::warn!("doc {}: failed applying watched pack: {err}", self.doc_key);
                        }
                        tokio::time::sleep(self.options.sync_loop_duration).await;
                    }
                    Err(err) => {
                        log::warn!(
                            "doc {}: watch stream error, reconnecting in {:?}: {err}",
                            self.doc_key,
                            self.options.reconnect_stream_delay
                        );
                        tokio::time::sleep(self.options.reconnect_stream_delay).await;
                    }
                }
            }
        })
    }

    /// `sync(doc)`: serialized through the binary `syncSemaphore` so at
    /// most one `pushPull` is ever in flight for this document.
    pub async fn sync(&self) -> Result<()> {
        let _permit = self
            .sync_semaphore
            .acquire()
            .await
            .map_err(|_| Error::Canceled)?;

        let outgoing = self.doc.create_change_pack(false).await;
        let incoming = self.adapter.push_pull(outgoing).await?;
        self.doc.apply_change_pack(incoming).await?;

        let mut inner = self.inner.lock().await;
        inner.remote_change_event_received = false;
        Ok(())
    }

    /// Broadcasts with exponential backoff: `interval = min(initial*2^k, maxBackoff)`.
    pub async fn broadcast(&self, topic: &str, payload: Vec<u8>) -> Result<()> {
        let mut attempt: u32 = 0;
        loop {
            match self.adapter.broadcast(&self.doc_key, topic, payload.clone()).await {
                Ok(()) => return Ok(()),
                Err(err) => {
                    if let Some(max) = self.options.max_retries {
                        if attempt >= max {
                            return Err(err);
                        }
                    }
                    let backoff = self
                        .options
                        .initial_retry_interval
                        .saturating_mul(1 << attempt.min(16))
                        .min(self.options.max_backoff);
                    log::warn!("doc {}: broadcast failed, retrying in {:?}: {err}", self.doc_key, backoff);
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
            }
        }
    }
}
