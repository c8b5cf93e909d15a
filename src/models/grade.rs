use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::sync::Identifiable;

/// A single grade entry for one subject.
///
/// `is_read` and `is_notified` are soft flags: excluded from the identity so
/// a refresh never resets them on an unchanged grade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grade {
    pub semester_id: i64,
    pub subject: String,
    /// Display entry as recorded by the register, e.g. "4+".
    pub entry: String,
    pub value: f64,
    pub modifier: f64,
    pub weight: f64,
    pub comment: String,
    pub description: String,
    pub date: NaiveDate,
    pub teacher: String,
    #[serde(default)]
    pub is_read: bool,
    #[serde(default)]
    pub is_notified: bool,
}

impl Identifiable for Grade {
    type Id = (i64, String, String, u64, u64, u64, String, String, NaiveDate, String);

    fn identity(&self) -> Self::Id {
        (
            self.semester_id,
            self.subject.clone(),
            self.entry.clone(),
            // f64 is not Hash/Eq; grades compare bit-for-bit.
            self.value.to_bits(),
            self.modifier.to_bits(),
            self.weight.to_bits(),
            self.comment.clone(),
            self.description.clone(),
            self.date,
            self.teacher.clone(),
        )
    }
}
