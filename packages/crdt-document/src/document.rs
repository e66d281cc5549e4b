//! `Document` (C9): the update transaction, local/remote apply, GC driver,
//! and subscription fan-out, serialized through a single logical mailbox
//! (§5) so CRDT mutation is always atomic with respect to other document
//! operations.

use std::time::Duration;

use tokio::sync::Mutex;

use crate::change::{Change, ChangeContext, ChangeID};
use crate::change_pack::ChangePack;
use crate::checkpoint::Checkpoint;
use crate::error::{Error, Result};
use crate::ops::OperationInfo;
use crate::root::CRDTRoot;
use crate::time::ActorID;
use crate::version_vector::VersionVector;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DocStatus {
    Detached,
    Attached,
    Removed,
}

/// Environment/config tunables (§6.4), shared by `Document` and the
/// attachment coordinator that drives its sync loop.
#[derive(Clone, Debug)]
pub struct DocumentOptions {
    pub sync_loop_duration: Duration,
    pub reconnect_stream_delay: Duration,
    pub maximum_attachment_timeout: Duration,
    pub disable_gc: bool,
    pub max_retries: Option<u32>,
    pub initial_retry_interval: Duration,
    pub max_backoff: Duration,
}

impl Default for DocumentOptions {
    fn default() -> Self {
        Self {
            sync_loop_duration: Duration::from_millis(50),
            reconnect_stream_delay: Duration::from_millis(1000),
            maximum_attachment_timeout: Duration::from_millis(5000),
            disable_gc: false,
            max_retries: None,
            initial_retry_interval: Duration::from_millis(1000),
            max_backoff: Duration::from_millis(20000),
        }
    }
}

enum ChangeEvent {
    Local(Vec<OperationInfo>),
    Remote(Vec<OperationInfo>),
}

type Subscriber = Box<dyn Fn(&ChangeEvent) + Send + Sync>;

struct Inner {
    status: DocStatus,
    root: CRDTRoot,
    change_id: ChangeID,
    checkpoint: Checkpoint,
    local_changes: Vec<Change>,
    /// Remote changes received out of causal order, held here until the
    /// version vector catches up to their dependencies (§4.6).
    pending_changes: Vec<Change>,
    subscribers: Vec<(Option<String>, Subscriber)>,
    options: DocumentOptions,
}

/// A document's per-instance mailbox: `update`, `apply_change_pack`, and
/// `garbage_collect` all take this lock, so CRDT mutation never overlaps
/// with another mailbox operation; the only suspension points are network
/// I/O in the (out-of-scope) adapter and waiting for this lock itself.
pub struct Document {
    key: String,
    inner: Mutex<Inner>,
}

impl Document {
    pub fn new(key: impl Into<String>, actor: ActorID) -> Self {
        let root = CRDTRoot::new(crate::time::TimeTicket::INITIAL);
        Self {
            key: key.into(),
            inner: Mutex::new(Inner {
                status: DocStatus::Detached,
                root,
                change_id: ChangeID::initial(actor),
                checkpoint: Checkpoint::INITIAL,
                local_changes: Vec::new(),
                pending_changes: Vec::new(),
                subscribers: Vec::new(),
                options: DocumentOptions::default(),
            }),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub async fn status(&self) -> DocStatus {
        self.inner.lock().await.status
    }

    pub async fn set_status(&self, status: DocStatus) {
        self.inner.lock().await.status = status;
    }

    /// Subscribes to change events under `path_prefix` (`None` = whole
    /// root). The callback runs synchronously inside the mailbox, so it
    /// must not block.
    pub async fn subscribe(&self, path_prefix: Option<String>, callback: Subscriber) {
        self.inner.lock().await.subscribers.push((path_prefix, callback));
    }

    /// Runs one transaction: clones the root, lets `f` mutate the clone
    /// through typed mutators on `ChangeContext`, and commits only if at
    /// least one operation was queued. A `Err` from `f` discards the clone
    /// entirely — the live root is untouched and no event fires.
    pub async fn update<F>(&self, message: Option<String>, f: F) -> Result<Vec<OperationInfo>>
    where
        F: FnOnce(&mut CRDTRoot, &mut ChangeContext) -> Result<()>,
    {
        let mut inner = self.inner.lock().await;
        if inner.status == DocStatus::Removed {
            return Err(Error::DocumentRemoved);
        }

        let mut clone = inner.root.clone();
        let next_id = inner.change_id.next();
        let mut ctx = ChangeContext::new(next_id.actor, next_id.lamport);
        if let Some(msg) = &message {
            ctx.set_message(msg.clone());
        }

        f(&mut clone, &mut ctx)?;

        if !ctx.has_operations() {
            return Ok(Vec::new());
        }

        let infos = ctx.infos().to_vec();
        let change = ctx.into_change(next_id.clone());

        inner.root = clone;
        inner.change_id = next_id;
        inner.local_changes.push(change);

        let event = ChangeEvent::Local(infos.clone());
        for (_, cb) in &inner.subscribers {
            cb(&event);
        }

        Ok(infos)
    }

    /// Advances lamport, applies incoming changes in causal order, fans
    /// out `RemoteChange` events, and (unless `disableGC`) runs GC if the
    /// pack carries a GC hint.
    ///
    /// A change whose operations aren't yet causally ready (its actor's
    /// prior history hasn't all arrived) is buffered in `pending_changes`
    /// rather than applied with some of its operations silently skipped;
    /// it's retried whenever the vector advances, including against
    /// changes buffered by earlier calls (§4.6).
    pub async fn apply_change_pack(&self, pack: ChangePack) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if pack.is_snapshot() {
            inner.root = CRDTRoot::new(crate::time::TimeTicket::INITIAL);
            inner.pending_changes.clear();
        }

        let mut queue: Vec<Change> = std::mem::take(&mut inner.pending_changes);
        queue.extend(pack.changes.iter().cloned());

        loop {
            let mut made_progress = false;
            let mut still_pending = Vec::new();

            for change in queue {
                if !change.is_causally_ready(&inner.change_id.vector) {
                    still_pending.push(change);
                    continue;
                }

                inner.change_id.sync_clocks(&change.id);
                let vv = inner.change_id.vector.clone();
                let mut root = inner.root.clone();
                let infos = change.apply_to(&mut root, &vv)?;
                inner.root = root;
                made_progress = true;

                let event = ChangeEvent::Remote(infos);
                for (_, cb) in &inner.subscribers {
                    cb(&event);
                }
            }

            queue = still_pending;
            if !made_progress || queue.is_empty() {
                break;
            }
        }
        inner.pending_changes = queue;

        inner.checkpoint = inner.checkpoint.forward(&pack.checkpoint);
        if pack.is_removed {
            inner.status = DocStatus::Removed;
        }

        if !inner.options.disable_gc {
            if let Some(min_synced) = pack.min_synced_ticket {
                let mut min_vector = VersionVector::new();
                min_vector.set(min_synced.actor, min_synced.lamport);
                inner.root.garbage_collect(&min_vector);
            }
        }

        Ok(())
    }

    /// Drains the local change buffer starting at the pack's `clientSeq`.
    pub async fn create_change_pack(&self, force_remove: bool) -> ChangePack {
        let mut inner = self.inner.lock().await;
        let mut pack = ChangePack::new(self.key.clone(), inner.checkpoint);
        pack.is_removed = force_remove || inner.status == DocStatus::Removed;
        pack.version_vector = inner.change_id.vector.clone();
        pack.changes = std::mem::take(&mut inner.local_changes);
        pack
    }

    pub async fn garbage_collect(&self, min_vector: &VersionVector) -> u64 {
        let mut inner = self.inner.lock().await;
        if inner.options.disable_gc {
            return 0;
        }
        inner.root.garbage_collect(min_vector)
    }

    pub async fn set_options(&self, options: DocumentOptions) {
        self.inner.lock().await.options = options;
    }

    pub async fn has_local_changes(&self) -> bool {
        !self.inner.lock().await.local_changes.is_empty()
    }

    /// Number of remote changes buffered pending causal readiness (§4.6).
    pub async fn pending_change_count(&self) -> usize {
        self.inner.lock().await.pending_changes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::ElementValue;
    use crate::primitive::Primitive;

    #[tokio::test]
    async fn update_commits_only_when_operations_were_queued() {
        let doc = Document::new("doc-1", ActorID(1));
        let root_id = {
            let inner = doc.inner.lock().await;
            inner.root.object().created_at()
        };

        doc.update(None, |root, ctx| {
            ctx.set(root, root_id, "k", ElementValue::Primitive(Primitive::Str("v".into())))?;
            Ok(())
        })
        .await
        .unwrap();

        let inner = doc.inner.lock().await;
        assert_eq!(inner.local_changes.len(), 1);
        assert!(inner.root.object().get("k").is_some());
    }

    #[tokio::test]
    async fn update_rolls_back_on_error() {
        let doc = Document::new("doc-1", ActorID(1));
        let root_id = {
            let inner = doc.inner.lock().await;
            inner.root.object().created_at()
        };

        let result = doc
            .update(None, |root, ctx| {
                ctx.set(root, root_id, "k", ElementValue::Primitive(Primitive::Str("v".into())))?;
                Err(Error::InvalidArgument("abort".into()))
            })
            .await;

        assert!(result.is_err());
        let inner = doc.inner.lock().await;
        assert!(inner.local_changes.is_empty());
        assert!(inner.root.object().get("k").is_none());
    }

    #[tokio::test]
    async fn remote_change_with_unmet_dependency_is_buffered_then_applied_on_retry() {
        use crate::ops::{Operation, SetOperation};
        use crate::time::TimeTicket;

        let doc = Document::new("doc-1", ActorID(1));
        let root_id = {
            let inner = doc.inner.lock().await;
            inner.root.object().created_at()
        };
        let actor_b = ActorID(2);

        let mut vector_after_first = VersionVector::new();
        vector_after_first.set(actor_b, 1);
        let change_1 = Change {
            id: ChangeID {
                client_seq: 1,
                lamport: 1,
                actor: actor_b,
                vector: vector_after_first.clone(),
            },
            operations: vec![Operation::Set(SetOperation {
                parent: root_id,
                key: "a".into(),
                value: ElementValue::Primitive(Primitive::Str("a".into())),
                executed_at: TimeTicket::new(1, 0, actor_b),
            })],
            presence_change: None,
            message: None,
        };

        let mut vector_after_second = vector_after_first.clone();
        vector_after_second.set(actor_b, 2);
        let change_2 = Change {
            id: ChangeID {
                client_seq: 2,
                lamport: 2,
                actor: actor_b,
                vector: vector_after_second,
            },
            operations: vec![Operation::Set(SetOperation {
                parent: root_id,
                key: "b".into(),
                value: ElementValue::Primitive(Primitive::Str("b".into())),
                executed_at: TimeTicket::new(2, 0, actor_b),
            })],
            presence_change: None,
            message: None,
        };

        // change_2 depends on change_1 (same actor, next lamport) but arrives
        // first: it must be buffered, not applied with data loss.
        let mut pack_2 = ChangePack::new("doc-1", Checkpoint::INITIAL);
        pack_2.changes = vec![change_2];
        doc.apply_change_pack(pack_2).await.unwrap();
        assert_eq!(doc.pending_change_count().await, 1);
        assert!(doc.inner.lock().await.root.object().get("b").is_none());

        let mut pack_1 = ChangePack::new("doc-1", Checkpoint::INITIAL);
        pack_1.changes = vec![change_1];
        doc.apply_change_pack(pack_1).await.unwrap();
        assert_eq!(doc.pending_change_count().await, 0);
        let inner = doc.inner.lock().await;
        assert!(inner.root.object().get("a").is_some());
        assert!(inner.root.object().get("b").is_some());
    }
}
