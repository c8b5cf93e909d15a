//! Grade synchronization.
//!
//! On first sync, grades dated on or before the account's registration date
//! arrive already marked read - a first sync must not flood the user with
//! months of "unread" history. On later syncs the boundary is the newest
//! cached grade, and only grades strictly older than it are read; a new
//! grade sharing that day is still news. Unread grades are handed to the
//! scheduler when the caller asks for notifications.

use std::sync::Arc;

use chrono::NaiveDate;
use tokio::sync::mpsc;
use tracing::debug;

use crate::key::{CacheKey, ResourceKind};
use crate::models::Grade;
use crate::notify::NotificationScheduler;
use crate::remote::GradeProvider;
use crate::store::CollectionStore;
use crate::sync::{reconcile, ResourceRequest, ResourceSnapshot, SyncEngine, SyncError};

pub struct GradeRepository {
    engine: Arc<SyncEngine>,
    store: Arc<CollectionStore<Grade>>,
    provider: Arc<dyn GradeProvider>,
    scheduler: Arc<dyn NotificationScheduler<Grade>>,
    ttl: chrono::Duration,
}

impl GradeRepository {
    pub fn new(
        engine: Arc<SyncEngine>,
        store: Arc<CollectionStore<Grade>>,
        provider: Arc<dyn GradeProvider>,
        scheduler: Arc<dyn NotificationScheduler<Grade>>,
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

    /// Orchestrated read of one semester's grades.
    ///
    /// `registration` is the account registration date, used as the read
    /// boundary on first sync.
    pub fn get_grades(
        &self,
        student_id: &str,
        semester_id: i64,
        registration: NaiveDate,
        force_refresh: bool,
        notify: bool,
    ) -> mpsc::Receiver<ResourceSnapshot<Vec<Grade>>> {
        let key = CacheKey::new(ResourceKind::Grades, format!("{}_{}", student_id, semester_id));

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
            is_result_empty: Box::new(|grades: &Vec<Grade>| grades.is_empty()),
            should_fetch: Box::new(move |grades| {
                force_refresh
                    || grades.is_empty()
                    || tracker.should_be_refreshed(&policy_key, ttl)
            }),
            fetch: Box::pin(async move {
                let grades = provider.fetch_grades(&fetch_student, semester_id).await?;
                Ok(grades)
            }),
            save_fetch_result: Box::new(move |old, new| {
                Box::pin(async move {
                    // First sync: everything up to and including registration
                    // day is old news. Afterwards the boundary is the newest
                    // cached grade, and a new grade from that same day is
                    // genuinely new, so the comparison turns strict.
                    let boundary = old.iter().map(|g| g.date).max();
                    let mut plan = reconcile(&old, &new);
                    for grade in &mut plan.to_add {
                        grade.is_read = match boundary {
                            Some(newest) => grade.date < newest,
                            None => grade.date <= registration,
                        };
                        grade.is_notified = !notify || grade.is_read;
                    }
                    debug!(
                        boundary = ?boundary,
                        added = plan.to_add.len(),
                        removed = plan.to_remove.len(),
                        "Reconciling grades"
                    );
                    save_store.apply_plan(&save_key, &plan)?;

                    let to_notify: Vec<Grade> = plan
                        .to_add
                        .iter()
                        .filter(|g| !g.is_notified)
                        .cloned()
                        .collect();
                    if !to_notify.is_empty() {
                        scheduler.schedule(&to_notify);
                    }
                    Ok(())
                })
            }),
            filter_result: Box::new(|grades| grades),
        })
    }

    /// Mark a batch of grades as read in the cache.
    ///
    /// A separate local write path: replaces each grade with its read copy,
    /// identity unchanged.
    pub fn mark_as_read(&self, student_id: &str, semester_id: i64, grades: &[Grade]) -> Result<(), SyncError> {
        let key = CacheKey::new(ResourceKind::Grades, format!("{}_{}", student_id, semester_id));
        let read: Vec<Grade> = grades
            .iter()
            .map(|g| {
                let mut g = g.clone();
                g.is_read = true;
                g
            })
            .collect();
        let plan = crate::sync::ReconciliationPlan {
            to_remove: grades.to_vec(),
            to_add: read,
        };
        // Identity-equal removal matches the unread copies 1:1.
        self.store.apply_plan(&key, &plan)?;
        Ok(())
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
    use std::sync::Mutex;

    struct FakeGrades {
        grades: Vec<Grade>,
    }

    #[async_trait]
    impl GradeProvider for FakeGrades {
        async fn fetch_grades(&self, _student_id: &str, _semester_id: i64) -> Result<Vec<Grade>, RemoteError> {
            Ok(self.grades.clone())
        }
    }

    #[derive(Default)]
    struct RecordingScheduler {
        scheduled: Mutex<Vec<Grade>>,
    }

    impl NotificationScheduler<Grade> for RecordingScheduler {
        fn schedule(&self, added: &[Grade]) {
            self.scheduled.lock().unwrap().extend_from_slice(added);
        }

        fn cancel(&self, _removed: &[Grade]) {}
    }

    fn grade(day: u32, description: &str) -> Grade {
        Grade {
            semester_id: 1,
            subject: "Matematyka".to_string(),
            entry: "4".to_string(),
            value: 4.0,
            modifier: 0.0,
            weight: 1.0,
            comment: String::new(),
            description: description.to_string(),
            date: NaiveDate::from_ymd_opt(2019, 2, day).unwrap(),
            teacher: "Jan Kowalski".to_string(),
            is_read: false,
            is_notified: false,
        }
    }

    fn repository(
        remote: Vec<Grade>,
        scheduler: Arc<dyn NotificationScheduler<Grade>>,
    ) -> (tempfile::TempDir, GradeRepository, Arc<CollectionStore<Grade>>) {
        let dir = tempfile::tempdir().unwrap();
        let tracker = Arc::new(RefreshTracker::new(dir.path().to_path_buf()).unwrap());
        let engine = Arc::new(SyncEngine::new(tracker));
        let store = Arc::new(CollectionStore::new(dir.path().to_path_buf()).unwrap());
        let repo = GradeRepository::new(
            engine,
            Arc::clone(&store),
            Arc::new(FakeGrades { grades: remote }),
            scheduler,
            chrono::Duration::minutes(60),
        );
        (dir, repo, store)
    }

    #[tokio::test]
    async fn test_first_sync_marks_grades_up_to_registration_as_read() {
        // Registration boundary 2019-02-27; remote has grades two days
        // before, one day before, on, and one day after the boundary.
        let remote = vec![
            grade(25, "appeared before first login"),
            grade(26, "also before first login"),
            grade(27, "grade from the registration day"),
            grade(28, "newer than registration"),
        ];
        let (_dir, repo, store) = repository(remote.clone(), Arc::new(NoopScheduler));
        let registration = NaiveDate::from_ymd_opt(2019, 2, 27).unwrap();

        let mut rx = repo.get_grades("1", 1, registration, true, false);
        let terminal = to_terminal(&mut rx).await.unwrap();

        let delivered = terminal.into_data().unwrap();
        assert_eq!(delivered.len(), 4);
        // Original remote order is preserved.
        let key = CacheKey::new(ResourceKind::Grades, "1_1");
        let stored = store.read_once(&key).unwrap();
        assert_eq!(stored.len(), 4);
        for (stored, remote) in stored.iter().zip(&remote) {
            assert_eq!(stored.description, remote.description);
        }
        assert!(stored[0].is_read);
        assert!(stored[1].is_read);
        assert!(stored[2].is_read);
        assert!(!stored[3].is_read);
    }

    #[tokio::test]
    async fn test_unchanged_grade_keeps_read_flag() {
        let (_dir, repo, store) = repository(vec![grade(25, "old one")], Arc::new(NoopScheduler));
        let key = CacheKey::new(ResourceKind::Grades, "1_1");
        let mut seeded = grade(25, "old one");
        seeded.is_read = true;
        store.apply_plan(&key, &reconcile(&[], &[seeded])).unwrap();

        let mut rx = repo.get_grades("1", 1, NaiveDate::from_ymd_opt(2019, 1, 1).unwrap(), true, true);
        to_terminal(&mut rx).await.unwrap();

        let stored = store.read_once(&key).unwrap();
        assert_eq!(stored.len(), 1);
        assert!(stored[0].is_read);
    }

    #[tokio::test]
    async fn test_new_grade_on_newest_cached_day_stays_unread() {
        // Cache already holds a read grade from Feb 27. The remote adds a
        // second grade from that same day plus an older backfill.
        let remote = vec![
            grade(27, "already cached"),
            grade(27, "same day, new"),
            grade(26, "older backfill"),
        ];
        let (_dir, repo, store) = repository(remote, Arc::new(NoopScheduler));
        let key = CacheKey::new(ResourceKind::Grades, "1_1");
        let mut seeded = grade(27, "already cached");
        seeded.is_read = true;
        store.apply_plan(&key, &reconcile(&[], &[seeded])).unwrap();

        let registration = NaiveDate::from_ymd_opt(2019, 1, 1).unwrap();
        let mut rx = repo.get_grades("1", 1, registration, true, false);
        to_terminal(&mut rx).await.unwrap();

        let stored = store.read_once(&key).unwrap();
        assert_eq!(stored.len(), 3);
        let by_description = |d: &str| stored.iter().find(|g| g.description == d).unwrap();
        assert!(by_description("already cached").is_read);
        assert!(!by_description("same day, new").is_read);
        assert!(by_description("older backfill").is_read);
    }

    #[tokio::test]
    async fn test_notify_schedules_only_new_unread_grades() {
        let scheduler = Arc::new(RecordingScheduler::default());
        let remote = vec![grade(25, "within history"), grade(28, "fresh grade")];
        let (_dir, repo, _store) = repository(remote, Arc::clone(&scheduler) as Arc<dyn NotificationScheduler<Grade>>);
        let registration = NaiveDate::from_ymd_opt(2019, 2, 27).unwrap();

        let mut rx = repo.get_grades("1", 1, registration, true, true);
        to_terminal(&mut rx).await.unwrap();

        let scheduled = scheduler.scheduled.lock().unwrap();
        assert_eq!(scheduled.len(), 1);
        assert_eq!(scheduled[0].description, "fresh grade");
    }

    #[tokio::test]
    async fn test_silent_backfill_schedules_nothing() {
        let scheduler = Arc::new(RecordingScheduler::default());
        let remote = vec![grade(28, "fresh grade")];
        let (_dir, repo, _store) = repository(remote, Arc::clone(&scheduler) as Arc<dyn NotificationScheduler<Grade>>);
        let registration = NaiveDate::from_ymd_opt(2019, 2, 27).unwrap();

        let mut rx = repo.get_grades("1", 1, registration, true, false);
        to_terminal(&mut rx).await.unwrap();

        assert!(scheduler.scheduled.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_mark_as_read_flips_flag_in_store() {
        let (_dir, repo, store) = repository(vec![grade(28, "fresh")], Arc::new(NoopScheduler));
        let registration = NaiveDate::from_ymd_opt(2019, 2, 27).unwrap();
        let mut rx = repo.get_grades("1", 1, registration, true, false);
        to_terminal(&mut rx).await.unwrap();

        let key = CacheKey::new(ResourceKind::Grades, "1_1");
        let unread = store.read_once(&key).unwrap();
        assert!(!unread[0].is_read);

        repo.mark_as_read("1", 1, &unread).unwrap();
        let stored = store.read_once(&key).unwrap();
        assert_eq!(stored.len(), 1);
        assert!(stored[0].is_read);
    }
}
