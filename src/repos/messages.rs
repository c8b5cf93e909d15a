//! Message synchronization.
//!
//! Messages are keyed per mailbox; folder narrowing happens at delivery.
//! The mailbox list itself is cheap to fetch but needed by every message
//! call, so callers hold an explicit [`MailboxCache`] scoped to their
//! session/request context and invalidate it themselves - the repository
//! keeps no mutable state of its own.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::debug;

use crate::key::{CacheKey, ResourceKind};
use crate::models::{Mailbox, Message, MessageFolder};
use crate::notify::NotificationScheduler;
use crate::remote::MessageProvider;
use crate::store::CollectionStore;
use crate::sync::{reconcile, ResourceRequest, ResourceSnapshot, SyncEngine, SyncError};

/// Short-lived mailbox list cache, owned by the caller context.
#[derive(Debug, Default)]
pub struct MailboxCache {
    mailboxes: Option<Vec<Mailbox>>,
}

impl MailboxCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<&[Mailbox]> {
        self.mailboxes.as_deref()
    }

    pub fn fill(&mut self, mailboxes: Vec<Mailbox>) {
        self.mailboxes = Some(mailboxes);
    }

    /// Forget the cached list; the next lookup refetches.
    pub fn invalidate(&mut self) {
        self.mailboxes = None;
    }
}

pub struct MessageRepository {
    engine: Arc<SyncEngine>,
    store: Arc<CollectionStore<Message>>,
    provider: Arc<dyn MessageProvider>,
    scheduler: Arc<dyn NotificationScheduler<Message>>,
    ttl: chrono::Duration,
}

impl MessageRepository {
    pub fn new(
        engine: Arc<SyncEngine>,
        store: Arc<CollectionStore<Message>>,
        provider: Arc<dyn MessageProvider>,
        scheduler: Arc<dyn NotificationScheduler<Message>>,
        ttl: chrono::Duration,
    ) -> Self {
        Self {
            engine,
            store,
            provider,
            scheduler,
            ttl,
        }
    }

    /// Mailboxes for the account, served from the caller's cache when
    /// filled.
    pub async fn get_mailboxes(
        &self,
        cache: &mut MailboxCache,
        account_id: &str,
    ) -> Result<Vec<Mailbox>, SyncError> {
        if let Some(mailboxes) = cache.get() {
            debug!(count = mailboxes.len(), "Serving mailboxes from context cache");
            return Ok(mailboxes.to_vec());
        }
        let mailboxes = self.provider.fetch_mailboxes(account_id).await?;
        cache.fill(mailboxes.clone());
        Ok(mailboxes)
    }

    /// Orchestrated read of one folder of one mailbox.
    pub fn get_messages(
        &self,
        mailbox: &Mailbox,
        folder: MessageFolder,
        force_refresh: bool,
        notify: bool,
    ) -> mpsc::Receiver<ResourceSnapshot<Vec<Message>>> {
        let key = CacheKey::new(ResourceKind::Messages, mailbox.global_key.clone());

        let query_store = Arc::clone(&self.store);
        let query_key = key.clone();

        let tracker = Arc::clone(self.engine.tracker());
        let policy_key = key.clone();
        let ttl = self.ttl;

        let provider = Arc::clone(&self.provider);
        let fetch_mailbox = mailbox.global_key.clone();

        let save_store = Arc::clone(&self.store);
        let save_key = key.clone();
        let scheduler = Arc::clone(&self.scheduler);

        self.engine.resource(ResourceRequest {
            cache_key: key,
            query_local: Box::new(move || {
                Ok(query_store.observe(&query_key).map_err(SyncError::from)?)
            }),
            is_result_empty: Box::new(move |messages: &Vec<Message>| {
                !messages.iter().any(|m| m.folder == folder)
            }),
            should_fetch: Box::new(move |messages| {
                force_refresh
                    || messages.is_empty()
                    || tracker.should_be_refreshed(&policy_key, ttl)
            }),
            fetch: Box::pin(async move {
                let messages = provider.fetch_messages(&fetch_mailbox).await?;
                Ok(messages)
            }),
            save_fetch_result: Box::new(move |old, new| {
                Box::pin(async move {
                    let mut plan = reconcile(&old, &new);
                    for message in &mut plan.to_add {
                        message.is_notified = !notify || message.is_read;
                    }
                    debug!(
                        added = plan.to_add.len(),
                        removed = plan.to_remove.len(),
                        "Reconciling messages"
                    );
                    save_store.apply_plan(&save_key, &plan)?;

                    let to_notify: Vec<Message> = plan
                        .to_add
                        .iter()
                        .filter(|m| !m.is_notified && m.folder == MessageFolder::Received)
                        .cloned()
                        .collect();
                    if !to_notify.is_empty() {
                        scheduler.schedule(&to_notify);
                    }
                    Ok(())
                })
            }),
            filter_result: Box::new(move |messages: Vec<Message>| {
                messages.into_iter().filter(|m| m.folder == folder).collect()
            }),
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::NoopScheduler;
    use crate::remote::RemoteError;
    use crate::sync::{to_terminal, RefreshTracker};
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeMessages {
        mailboxes: Vec<Mailbox>,
        messages: Vec<Message>,
        mailbox_fetches: AtomicUsize,
    }

    #[async_trait]
    impl MessageProvider for FakeMessages {
        async fn fetch_mailboxes(&self, _account_id: &str) -> Result<Vec<Mailbox>, RemoteError> {
            self.mailbox_fetches.fetch_add(1, Ordering::SeqCst);
            Ok(self.mailboxes.clone())
        }

        async fn fetch_messages(&self, _mailbox_key: &str) -> Result<Vec<Message>, RemoteError> {
            Ok(self.messages.clone())
        }
    }

    fn mailbox() -> Mailbox {
        Mailbox {
            global_key: "mbx-1".to_string(),
            owner: "Jan Kowalski".to_string(),
            school: "SP 1".to_string(),
        }
    }

    fn message(key: &str, folder: MessageFolder) -> Message {
        Message {
            global_key: key.to_string(),
            mailbox_key: "mbx-1".to_string(),
            folder,
            subject: format!("Subject {}", key),
            correspondents: "Dyrekcja".to_string(),
            date: Utc.with_ymd_and_hms(2023, 1, 10, 12, 0, 0).unwrap(),
            has_attachments: false,
            content: None,
            is_read: false,
            is_notified: false,
        }
    }

    fn repository(provider: Arc<FakeMessages>) -> (tempfile::TempDir, MessageRepository) {
        let dir = tempfile::tempdir().unwrap();
        let tracker = Arc::new(RefreshTracker::new(dir.path().to_path_buf()).unwrap());
        let engine = Arc::new(SyncEngine::new(tracker));
        let store = Arc::new(CollectionStore::new(dir.path().to_path_buf()).unwrap());
        let repo = MessageRepository::new(
            engine,
            store,
            provider,
            Arc::new(NoopScheduler),
            chrono::Duration::minutes(30),
        );
        (dir, repo)
    }

    #[tokio::test]
    async fn test_mailbox_cache_collapses_fetches_until_invalidated() {
        let provider = Arc::new(FakeMessages {
            mailboxes: vec![mailbox()],
            messages: vec![],
            mailbox_fetches: AtomicUsize::new(0),
        });
        let (_dir, repo) = repository(Arc::clone(&provider));
        let mut cache = MailboxCache::new();

        repo.get_mailboxes(&mut cache, "acc").await.unwrap();
        repo.get_mailboxes(&mut cache, "acc").await.unwrap();
        assert_eq!(provider.mailbox_fetches.load(Ordering::SeqCst), 1);

        cache.invalidate();
        repo.get_mailboxes(&mut cache, "acc").await.unwrap();
        assert_eq!(provider.mailbox_fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_delivery_is_narrowed_to_the_requested_folder() {
        let provider = Arc::new(FakeMessages {
            mailboxes: vec![mailbox()],
            messages: vec![
                message("a", MessageFolder::Received),
                message("b", MessageFolder::Sent),
                message("c", MessageFolder::Received),
            ],
            mailbox_fetches: AtomicUsize::new(0),
        });
        let (_dir, repo) = repository(provider);

        let mut rx = repo.get_messages(&mailbox(), MessageFolder::Received, true, false);
        let terminal = to_terminal(&mut rx).await.unwrap();

        let delivered = terminal.into_data().unwrap();
        assert_eq!(delivered.len(), 2);
        assert!(delivered.iter().all(|m| m.folder == MessageFolder::Received));
    }
}
