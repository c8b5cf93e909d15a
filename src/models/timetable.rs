use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::sync::Identifiable;

/// One timetable entry (a lesson slot on a given day).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lesson {
    pub number: i32,
    pub date: NaiveDate,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub subject: String,
    pub group: String,
    pub room: String,
    pub teacher: String,
    /// Substitution/cancellation note from the register.
    pub info: String,
    pub canceled: bool,
    pub changed: bool,
    /// Soft flag: whether a change notification was already delivered.
    #[serde(default)]
    pub is_notified: bool,
}

impl Identifiable for Lesson {
    type Id = (
        i32,
        NaiveDate,
        DateTime<Utc>,
        DateTime<Utc>,
        String,
        String,
        String,
        String,
        String,
        bool,
        bool,
    );

    fn identity(&self) -> Self::Id {
        (
            self.number,
            self.date,
            self.start,
            self.end,
            self.subject.clone(),
            self.group.clone(),
            self.room.clone(),
            self.teacher.clone(),
            self.info.clone(),
            self.canceled,
            self.changed,
        )
    }
}
