//! Message entity definitions

use serde::{Deserialize, Serialize};

/// One entry in a conversation's append-only history.
///
/// Messages are never edited or removed; `to` is only stamped for direct
/// conversations, `filename`/`filesize` only for file messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: i64,
    pub kind: MessageKind,
    pub from: i64,
    pub to: Option<i64>,
    pub content: String,
    pub filename: Option<String>,
    pub filesize: Option<i64>,
    pub timestamp: String,
}

/// A message as handed to the store for appending; the id is assigned on
/// insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMessage {
    pub kind: MessageKind,
    pub from: i64,
    pub to: Option<i64>,
    pub content: String,
    pub filename: Option<String>,
    pub filesize: Option<i64>,
    pub timestamp: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Chat,
    File,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Chat => "chat",
            MessageKind::File => "file",
        }
    }
}

impl std::str::FromStr for MessageKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "chat" => Ok(MessageKind::Chat),
            "file" => Ok(MessageKind::File),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
