//! Remote provider boundary.
//!
//! The engine treats the e-register backend as an opaque provider: one
//! fetch per refresh cycle, stateless from the engine's perspective. The
//! concrete transport (REST client, HTML scraper) lives behind these traits
//! and owns its own timeout/cancellation policy - the orchestrator imposes
//! none.

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use crate::models::{Grade, Lesson, Mailbox, Message};

#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("network unavailable: {0}")]
    NetworkUnavailable(String),

    #[error("authentication expired")]
    AuthenticationExpired,

    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

#[async_trait]
pub trait GradeProvider: Send + Sync {
    async fn fetch_grades(&self, student_id: &str, semester_id: i64) -> Result<Vec<Grade>, RemoteError>;
}

#[async_trait]
pub trait TimetableProvider: Send + Sync {
    /// Fetch lessons for the full weeks covering `start..=end`.
    async fn fetch_timetable(
        &self,
        student_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Lesson>, RemoteError>;
}

#[async_trait]
pub trait MessageProvider: Send + Sync {
    async fn fetch_mailboxes(&self, account_id: &str) -> Result<Vec<Mailbox>, RemoteError>;

    async fn fetch_messages(&self, mailbox_key: &str) -> Result<Vec<Message>, RemoteError>;
}
