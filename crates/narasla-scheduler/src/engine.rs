//! Digest engine: ticks on a tokio interval, sends due pages, reschedules.
//! Sleeps between ticks, so an idle scheduler costs nothing.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use narasla_core::cancel::cancellable;
use narasla_core::config::SchedulerConfig;
use narasla_core::error::{NaraslaError, Result};
use narasla_core::retry::{self, RetryPolicy};
use narasla_core::traits::{SchedulerStorage, Sender};
use narasla_core::types::User;
use rand::Rng;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::eligibility::should_send_now;

/// Shortest interval between two steps.
pub const MIN_TICK: Duration = Duration::from_secs(1);

/// Hours (inclusive) from which the next send time is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendWindow {
    pub first_hour: u32,
    pub last_hour: u32,
}

impl Default for SendWindow {
    fn default() -> Self {
        Self {
            first_hour: 9,
            last_hour: 23,
        }
    }
}

impl SendWindow {
    /// Random `(hour, minute)` inside the window.
    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> (u32, u32) {
        let last = self.last_hour.min(23);
        let first = self.first_hour.min(last);
        (rng.gen_range(first..=last), rng.gen_range(0..=59))
    }
}

/// The digest scheduler. Shares nothing with the consumer except storage.
pub struct DigestScheduler {
    storage: Arc<dyn SchedulerStorage>,
    sender: Arc<dyn Sender>,
    tick: Duration,
    window: SendWindow,
    retry: RetryPolicy,
}

impl DigestScheduler {
    /// `tick` is raised to at least [`MIN_TICK`].
    pub fn new(storage: Arc<dyn SchedulerStorage>, sender: Arc<dyn Sender>, tick: Duration) -> Self {
        Self {
            storage,
            sender,
            tick: tick.max(MIN_TICK),
            window: SendWindow::default(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn from_config(
        storage: Arc<dyn SchedulerStorage>,
        sender: Arc<dyn Sender>,
        config: &SchedulerConfig,
    ) -> Self {
        Self::new(storage, sender, config.tick())
            .with_window(SendWindow {
                first_hour: config.send_window_start,
                last_hour: config.send_window_end,
            })
            .with_retry(config.retry_policy())
    }

    pub fn with_window(mut self, window: SendWindow) -> Self {
        self.window = window;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Tick until `cancel` fires. Always ends with `Cancelled`.
    pub async fn run(&self, cancel: CancellationToken) -> Result<()> {
        tracing::info!("⏰ Digest scheduler started (tick every {:?})", self.tick);
        let mut interval = tokio::time::interval(self.tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!("⏰ Digest scheduler stopped");
                    return Err(NaraslaError::Cancelled);
                }
                _ = interval.tick() => {}
            }

            match self.step(&cancel, Utc::now()).await {
                Ok(()) => {}
                Err(e) if e.is_cancellation() => return Err(e),
                Err(e) => tracing::warn!("digest step failed: {e}"),
            }
        }
    }

    /// One pass over enabled users. Returns the last non-trivial failure.
    pub async fn step(&self, cancel: &CancellationToken, now: DateTime<Utc>) -> Result<()> {
        let users = self
            .retry
            .run(cancel, move || cancellable(cancel, self.storage.list_enabled_users()), retry::classify)
            .await?;

        let mut last_err = None;
        for user in &users {
            if !should_send_now(user, now) {
                continue;
            }

            match self.send_one(cancel, user, now).await {
                Ok(()) => tracing::info!("📬 Digest sent to owner={}", user.owner_id),
                Err(NaraslaError::NoSavedPages) => {
                    tracing::debug!("owner={} has nothing saved", user.owner_id);
                }
                Err(e) if e.is_cancellation() => return Err(e),
                Err(e) => {
                    tracing::warn!("digest for owner={} failed: {e}", user.owner_id);
                    last_err = Some(e);
                }
            }
        }

        last_err.map_or(Ok(()), Err)
    }

    async fn send_one(&self, cancel: &CancellationToken, user: &User, now: DateTime<Utc>) -> Result<()> {
        let page = self
            .retry
            .run(cancel, move || cancellable(cancel, self.storage.pick_random(user.owner_id)), retry::classify)
            .await?;
        let page = &page;

        self.retry
            .run(
                cancel,
                move || cancellable(cancel, self.sender.send_message(user.chat_id, &page.url)),
                retry::classify,
            )
            .await?;

        // Delivered: the page is consumed and today counts as sent, even if removal fails.
        let removed = self
            .retry
            .run(cancel, move || cancellable(cancel, self.storage.remove(page)), retry::classify)
            .await;
        if let Err(e) = &removed
            && e.is_cancellation()
        {
            return removed;
        }

        let (hour, minute) = self.window.draw(&mut rand::thread_rng());
        self.retry
            .run(
                cancel,
                move || cancellable(cancel, self.storage.update_last_send_at(user.owner_id, now, hour, minute)),
                retry::classify,
            )
            .await?;
        tracing::debug!("owner={} next digest at {:02}:{:02}", user.owner_id, hour, minute);

        match removed {
            Ok(()) | Err(NaraslaError::PageNotFound) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use narasla_core::traits::Storage;
    use narasla_core::types::Page;
    use narasla_memory::InMemoryStorage;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Default)]
    struct RecordingSender {
        sent: Mutex<Vec<(i64, String)>>,
        failing: HashSet<i64>,
        /// Calls that fail before the sender starts delivering.
        transient: AtomicU32,
    }

    impl RecordingSender {
        fn failing(chats: &[i64]) -> Self {
            Self {
                failing: chats.iter().copied().collect(),
                ..Default::default()
            }
        }

        fn flaky(failures: u32) -> Self {
            Self {
                transient: AtomicU32::new(failures),
                ..Default::default()
            }
        }

        fn sent(&self) -> Vec<(i64, String)> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Sender for RecordingSender {
        async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
            if self.failing.contains(&chat_id) {
                return Err(NaraslaError::Channel("chat unreachable".into()));
            }
            if self
                .transient
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(NaraslaError::Channel("502 bad gateway".into()));
            }
            self.sent.lock().unwrap().push((chat_id, text.to_string()));
            Ok(())
        }
    }

    /// In-memory storage whose `remove` always fails with `remove_error`.
    struct StuckRemoval {
        inner: Arc<InMemoryStorage>,
        remove_error: fn() -> NaraslaError,
    }

    #[async_trait]
    impl SchedulerStorage for StuckRemoval {
        async fn list_enabled_users(&self) -> Result<Vec<User>> {
            self.inner.list_enabled_users().await
        }

        async fn pick_random(&self, owner_id: i64) -> Result<Page> {
            self.inner.pick_random(owner_id).await
        }

        async fn remove(&self, _page: &Page) -> Result<()> {
            Err((self.remove_error)())
        }

        async fn update_last_send_at(&self, owner_id: i64, at: DateTime<Utc>, new_hour: u32, new_minute: u32) -> Result<()> {
            self.inner.update_last_send_at(owner_id, at, new_hour, new_minute).await
        }
    }

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 1, 12, 0, 0).unwrap()
    }

    async fn seed(storage: &InMemoryStorage, owner_id: i64, urls: &[&str]) {
        storage.update_user_info(owner_id, owner_id * 10, "u").await.unwrap();
        for url in urls {
            storage.save(&Page::new(*url, owner_id, owner_id * 10, "u")).await.unwrap();
        }
    }

    fn scheduler(storage: &Arc<InMemoryStorage>, sender: &Arc<RecordingSender>) -> DigestScheduler {
        DigestScheduler::new(storage.clone(), sender.clone(), Duration::from_secs(60))
            .with_retry(RetryPolicy::new(Duration::from_millis(1), 2))
    }

    #[test]
    fn test_window_draw_bounds() {
        let window = SendWindow::default();
        let mut rng = rand::thread_rng();
        for _ in 0..1000 {
            let (h, m) = window.draw(&mut rng);
            assert!((9..=23).contains(&h));
            assert!(m <= 59);
        }
        let single = SendWindow { first_hour: 12, last_hour: 12 };
        assert_eq!(single.draw(&mut rng).0, 12);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delivery_consumes_page_and_reschedules() {
        let storage = Arc::new(InMemoryStorage::new());
        let sender = Arc::new(RecordingSender::default());
        seed(&storage, 1, &["https://a.example"]).await;

        let sched = scheduler(&storage, &sender);
        sched.step(&CancellationToken::new(), noon()).await.unwrap();

        assert_eq!(sender.sent(), vec![(10, "https://a.example".to_string())]);
        assert_eq!(storage.count(1).await.unwrap(), 0);
        let user = storage.get_user_info(1).await.unwrap();
        assert_eq!(user.last_send_at, Some(noon()));
        assert!((9..=23).contains(&user.send_hour));
        assert!(user.send_minute <= 59);
    }

    #[tokio::test(start_paused = true)]
    async fn test_step_is_idempotent_within_a_day() {
        let storage = Arc::new(InMemoryStorage::new());
        let sender = Arc::new(RecordingSender::default());
        seed(&storage, 1, &["https://a.example", "https://b.example"]).await;

        let sched = scheduler(&storage, &sender);
        let cancel = CancellationToken::new();
        sched.step(&cancel, noon()).await.unwrap();
        sched.step(&cancel, noon() + chrono::TimeDelta::minutes(5)).await.unwrap();

        assert_eq!(sender.sent().len(), 1);
        assert_eq!(storage.count(1).await.unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_delivery_keeps_page_and_schedule() {
        let storage = Arc::new(InMemoryStorage::new());
        let sender = Arc::new(RecordingSender::failing(&[10]));
        seed(&storage, 1, &["https://a.example"]).await;
        seed(&storage, 2, &["https://b.example"]).await;

        let sched = scheduler(&storage, &sender);
        let res = sched.step(&CancellationToken::new(), noon()).await;

        assert!(matches!(res, Err(NaraslaError::Channel(_))));
        assert_eq!(storage.count(1).await.unwrap(), 1);
        assert_eq!(storage.get_user_info(1).await.unwrap().last_send_at, None);
        // Other users are still served
        assert_eq!(sender.sent(), vec![(20, "https://b.example".to_string())]);
        assert_eq!(storage.count(2).await.unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_saved_pages_is_not_an_error() {
        let storage = Arc::new(InMemoryStorage::new());
        let sender = Arc::new(RecordingSender::default());
        seed(&storage, 1, &[]).await;
        seed(&storage, 2, &["https://b.example"]).await;

        let sched = scheduler(&storage, &sender);
        sched.step(&CancellationToken::new(), noon()).await.unwrap();

        assert_eq!(sender.sent().len(), 1);
        assert_eq!(storage.get_user_info(1).await.unwrap().last_send_at, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_and_not_due_users_are_skipped() {
        let storage = Arc::new(InMemoryStorage::new());
        let sender = Arc::new(RecordingSender::default());
        seed(&storage, 1, &["https://a.example"]).await;
        seed(&storage, 2, &["https://b.example"]).await;
        storage.switch_enable(1, false).await.unwrap();
        let mut late = storage.get_user_info(2).await.unwrap();
        late.send_hour = 18;
        storage.put_user(late).unwrap();

        let sched = scheduler(&storage, &sender);
        sched.step(&CancellationToken::new(), noon()).await.unwrap();
        assert!(sender.sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_ends_on_cancel() {
        let storage = Arc::new(InMemoryStorage::new());
        let sender = Arc::new(RecordingSender::default());
        let sched = Arc::new(scheduler(&storage, &sender));
        let cancel = CancellationToken::new();

        let handle = tokio::spawn({
            let sched = sched.clone();
            let cancel = cancel.clone();
            async move { sched.run(cancel).await }
        });
        tokio::time::sleep(Duration::from_secs(150)).await;
        cancel.cancel();

        let res = handle.await.unwrap();
        assert!(matches!(res, Err(NaraslaError::Cancelled)));
    }

    #[tokio::test]
    async fn test_step_cancelled_before_start() {
        let storage = Arc::new(InMemoryStorage::new());
        let sender = Arc::new(RecordingSender::default());
        seed(&storage, 1, &["https://a.example"]).await;
        let cancel = CancellationToken::new();
        cancel.cancel();

        let res = scheduler(&storage, &sender).step(&cancel, noon()).await;
        assert!(matches!(res, Err(NaraslaError::Cancelled)));
        assert!(sender.sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_removal_still_advances_schedule() {
        let inner = Arc::new(InMemoryStorage::new());
        let sender = Arc::new(RecordingSender::default());
        seed(&inner, 1, &["https://a.example"]).await;
        seed(&inner, 2, &["https://b.example"]).await;
        let storage = Arc::new(StuckRemoval {
            inner: inner.clone(),
            remove_error: || NaraslaError::Storage("locked".into()),
        });

        let sched = DigestScheduler::new(storage, sender.clone(), Duration::from_secs(60))
            .with_retry(RetryPolicy::new(Duration::from_millis(1), 2));
        let res = sched.step(&CancellationToken::new(), noon()).await;

        assert!(matches!(res, Err(NaraslaError::Storage(ref m)) if m == "locked"));
        assert_eq!(sender.sent().len(), 2);
        for owner in [1, 2] {
            let user = inner.get_user_info(owner).await.unwrap();
            assert_eq!(user.last_send_at, Some(noon()), "owner {owner} is done for today");
            assert_eq!(inner.count(owner).await.unwrap(), 1);
        }

        // Already delivered today, so the next tick leaves them alone
        sched.step(&CancellationToken::new(), noon() + chrono::TimeDelta::minutes(1)).await.unwrap();
        assert_eq!(sender.sent().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_removal_of_missing_page_is_tolerated() {
        let inner = Arc::new(InMemoryStorage::new());
        let sender = Arc::new(RecordingSender::default());
        seed(&inner, 1, &["https://a.example"]).await;
        let storage = Arc::new(StuckRemoval {
            inner: inner.clone(),
            remove_error: || NaraslaError::PageNotFound,
        });

        let sched = DigestScheduler::new(storage, sender.clone(), Duration::from_secs(60))
            .with_retry(RetryPolicy::new(Duration::from_millis(1), 2));
        sched.step(&CancellationToken::new(), noon()).await.unwrap();

        assert_eq!(sender.sent().len(), 1);
        assert_eq!(inner.get_user_info(1).await.unwrap().last_send_at, Some(noon()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_send_failure_is_retried() {
        let storage = Arc::new(InMemoryStorage::new());
        let sender = Arc::new(RecordingSender::flaky(1));
        seed(&storage, 1, &["https://a.example"]).await;

        let sched = DigestScheduler::new(storage.clone(), sender.clone(), Duration::from_secs(60))
            .with_retry(RetryPolicy::new(Duration::from_millis(100), 3));
        let start = tokio::time::Instant::now();
        sched.step(&CancellationToken::new(), noon()).await.unwrap();

        assert_eq!(start.elapsed(), Duration::from_millis(100), "one backoff wait");
        assert_eq!(sender.sent(), vec![(10, "https://a.example".to_string())]);
        assert_eq!(storage.count(1).await.unwrap(), 0);
        assert_eq!(storage.get_user_info(1).await.unwrap().last_send_at, Some(noon()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_tick_is_clamped() {
        let storage = Arc::new(InMemoryStorage::new());
        let sender = Arc::new(RecordingSender::default());
        let sched = Arc::new(DigestScheduler::new(storage, sender, Duration::ZERO));
        let cancel = CancellationToken::new();

        let handle = tokio::spawn({
            let sched = sched.clone();
            let cancel = cancel.clone();
            async move { sched.run(cancel).await }
        });
        tokio::time::sleep(Duration::from_secs(3)).await;
        cancel.cancel();

        assert!(matches!(handle.await.unwrap(), Err(NaraslaError::Cancelled)));
    }
}
