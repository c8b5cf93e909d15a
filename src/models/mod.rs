//! Domain records mirrored from the e-register.
//!
//! Each record carries a stable natural identity (the business fields used
//! to match items across refreshes) plus soft flags (`is_read`,
//! `is_notified`) that live outside the identity and survive reconciliation.

pub mod grade;
pub mod message;
pub mod timetable;

pub use grade::Grade;
pub use message::{Mailbox, Message, MessageFolder};
pub use timetable::Lesson;
