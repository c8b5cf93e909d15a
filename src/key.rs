//! Cache keys addressing one cached collection and its staleness record.
//!
//! A `CacheKey` combines the resource kind with its scoping parameters
//! (account id, optional date window). Its `Display` form is stable and
//! file-safe, so it doubles as the cache file name and the refresh-record
//! key.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// The data domains the client mirrors from the e-register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    Grades,
    GradeSummaries,
    Timetable,
    CompletedLessons,
    Attendance,
    AttendanceSummary,
    Exams,
    Homework,
    Notes,
    Messages,
    Mailboxes,
    LuckyNumber,
    SchoolAnnouncements,
    Conferences,
    Semesters,
    Teachers,
    MobileDevices,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Grades => "grades",
            ResourceKind::GradeSummaries => "grade_summaries",
            ResourceKind::Timetable => "timetable",
            ResourceKind::CompletedLessons => "completed_lessons",
            ResourceKind::Attendance => "attendance",
            ResourceKind::AttendanceSummary => "attendance_summary",
            ResourceKind::Exams => "exams",
            ResourceKind::Homework => "homework",
            ResourceKind::Notes => "notes",
            ResourceKind::Messages => "messages",
            ResourceKind::Mailboxes => "mailboxes",
            ResourceKind::LuckyNumber => "lucky_number",
            ResourceKind::SchoolAnnouncements => "school_announcements",
            ResourceKind::Conferences => "conferences",
            ResourceKind::Semesters => "semesters",
            ResourceKind::Teachers => "teachers",
            ResourceKind::MobileDevices => "mobile_devices",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifier for one cached collection.
///
/// Two invocations with equal keys contend on the same single-flight lock
/// and share one staleness record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    kind: ResourceKind,
    /// Account/session scope, e.g. a student or mailbox id.
    scope: String,
    /// Optional date window for range-scoped resources (timetable, attendance).
    range: Option<(NaiveDate, NaiveDate)>,
}

impl CacheKey {
    pub fn new(kind: ResourceKind, scope: impl Into<String>) -> Self {
        Self {
            kind,
            scope: scope.into(),
            range: None,
        }
    }

    pub fn with_range(kind: ResourceKind, scope: impl Into<String>, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            kind,
            scope: scope.into(),
            range: Some((start, end)),
        }
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn range(&self) -> Option<(NaiveDate, NaiveDate)> {
        self.range
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.kind, self.scope)?;
        if let Some((start, end)) = self.range {
            write!(f, "_{}_{}", start, end)?;
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_key_display_without_range() {
        let key = CacheKey::new(ResourceKind::Grades, "123");
        assert_eq!(key.to_string(), "grades_123");
    }

    #[test]
    fn test_key_display_with_range() {
        let start = NaiveDate::from_ymd_opt(2019, 2, 25).unwrap();
        let end = NaiveDate::from_ymd_opt(2019, 3, 3).unwrap();
        let key = CacheKey::with_range(ResourceKind::Timetable, "123", start, end);
        assert_eq!(key.to_string(), "timetable_123_2019-02-25_2019-03-03");
    }

    #[test]
    fn test_keys_with_different_ranges_are_distinct() {
        let start = NaiveDate::from_ymd_opt(2019, 2, 25).unwrap();
        let end = NaiveDate::from_ymd_opt(2019, 3, 3).unwrap();
        let a = CacheKey::with_range(ResourceKind::Timetable, "123", start, end);
        let b = CacheKey::new(ResourceKind::Timetable, "123");
        assert_ne!(a, b);
    }
}
