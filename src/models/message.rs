use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::sync::Identifiable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageFolder {
    Received,
    Sent,
    Trashed,
}

impl fmt::Display for MessageFolder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageFolder::Received => write!(f, "Received"),
            MessageFolder::Sent => write!(f, "Sent"),
            MessageFolder::Trashed => write!(f, "Trashed"),
        }
    }
}

/// A mailbox the account can read (own, parent, employee view).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mailbox {
    /// Stable key assigned by the register.
    pub global_key: String,
    pub owner: String,
    pub school: String,
}

impl Identifiable for Mailbox {
    type Id = String;

    fn identity(&self) -> Self::Id {
        self.global_key.clone()
    }
}

/// A message header as listed by the register.
///
/// Messages are the one domain where the remote assigns a stable global key,
/// so the identity is that key rather than a field tuple. Content is fetched
/// lazily and is not part of the identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub global_key: String,
    pub mailbox_key: String,
    pub folder: MessageFolder,
    pub subject: String,
    pub correspondents: String,
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub has_attachments: bool,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub is_read: bool,
    #[serde(default)]
    pub is_notified: bool,
}

impl Identifiable for Message {
    type Id = (String, String, MessageFolder);

    fn identity(&self) -> Self::Id {
        (self.mailbox_key.clone(), self.global_key.clone(), self.folder)
    }
}
