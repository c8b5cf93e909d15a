//! Domain repositories: the engine's callers.
//!
//! Each repository wires one data domain to the orchestrator - cache key
//! construction, the `force || empty || stale` fetch policy, the
//! reconciliation with domain-specific soft-flag stamping, and the
//! notification side effects keyed off the diff.

pub mod grades;
pub mod messages;
pub mod timetable;

pub use grades::GradeRepository;
pub use messages::{MailboxCache, MessageRepository};
pub use timetable::TimetableRepository;
