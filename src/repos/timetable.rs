//! Timetable synchronization.
//!
//! The register serves timetables in whole weeks, so the cache key and the
//! fetch both cover the full weeks around the requested window, and
//! `filter_result` narrows back to the exact dates the caller asked for.
//! Lesson-change notifications are scheduled for added entries and cancelled
//! for removed ones - never recomputed from the full dataset.

use std::sync::Arc;

use chrono::{Datelike, Duration, NaiveDate};
use tokio::sync::mpsc;
use tracing::debug;

use crate::key::{CacheKey, ResourceKind};
use crate::models::Lesson;
use crate::notify::NotificationScheduler;
use crate::remote::TimetableProvider;
use crate::store::CollectionStore;
use crate::sync::{reconcile, ResourceRequest, ResourceSnapshot, SyncEngine, SyncError};

/// Monday of the week containing `date`.
pub fn monday(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

/// Sunday of the week containing `date`.
pub fn sunday(date: NaiveDate) -> NaiveDate {
    monday(date) + Duration::days(6)
}

pub struct TimetableRepository {
    engine: Arc<SyncEngine>,
    store: Arc<CollectionStore<Lesson>>,
    provider: Arc<dyn TimetableProvider>,
    scheduler: Arc<dyn NotificationScheduler<Lesson>>,
    ttl: chrono::Duration,
}

impl TimetableRepository {
    pub fn new(
        engine: Arc<SyncEngine>,
        store: Arc<CollectionStore<Lesson>>,
        provider: Arc<dyn TimetableProvider>,
        scheduler: Arc<dyn NotificationScheduler<Lesson>>,
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

    pub fn get_timetable(
        &self,
        student_id: &str,
        start: NaiveDate,
        end: NaiveDate,
        force_refresh: bool,
        notify: bool,
    ) -> mpsc::Receiver<ResourceSnapshot<Vec<Lesson>>> {
        let week_start = monday(start);
        let week_end = sunday(end);
        let key = CacheKey::with_range(ResourceKind::Timetable, student_id, week_start, week_end);

        let query_store = Arc::clone(&self.store);
        let query_key = key.clone();

        let tracker = Arc::clone(self.engine.tracker());
        let policy_key = key.clone();
        let ttl = self.ttl;

        let provider = Arc::clone(&self.provider);
        let fetch_student = student_id.to_string();

        let save_store = Arc::clone(&self.store);
        let save_key = key.clone();
        let scheduler = Arc::clone(&self.scheduler);

        self.engine.resource(ResourceRequest {
            cache_key: key,
            query_local: Box::new(move || {
                Ok(query_store.observe(&query_key).map_err(SyncError::from)?)
            }),
            is_result_empty: Box::new(|lessons: &Vec<Lesson>| lessons.is_empty()),
            should_fetch: Box::new(move |lessons| {
                force_refresh
                    || lessons.is_empty()
                    || tracker.should_be_refreshed(&policy_key, ttl)
            }),
            fetch: Box::pin(async move {
                let lessons = provider
                    .fetch_timetable(&fetch_student, week_start, week_end)
                    .await?;
                Ok(lessons)
            }),
            save_fetch_result: Box::new(move |old, new| {
                Box::pin(async move {
                    let mut plan = reconcile(&old, &new);
                    for lesson in &mut plan.to_add {
                        lesson.is_notified = !notify;
                    }
                    debug!(
                        added = plan.to_add.len(),
                        removed = plan.to_remove.len(),
                        "Reconciling timetable"
                    );
                    save_store.apply_plan(&save_key, &plan)?;

                    scheduler.cancel(&plan.to_remove);
                    scheduler.schedule(&plan.to_add);
                    Ok(())
                })
            }),
            filter_result: Box::new(move |lessons: Vec<Lesson>| {
                lessons
                    .into_iter()
                    .filter(|l| l.date >= start && l.date <= end)
                    .collect()
            }),
        })
    }

    /// Last successful refresh of the given window, for display.
    pub fn last_refresh(
        &self,
        student_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Option<chrono::DateTime<chrono::Utc>> {
        let key = CacheKey::with_range(
            ResourceKind::Timetable,
            student_id,
            monday(start),
            sunday(end),
        );
        self.engine.tracker().last_refresh(&key)
    }
}

// ============================================================================
// Tests
// ============================================================================
