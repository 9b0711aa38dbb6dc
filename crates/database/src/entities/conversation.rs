//! Conversation entity definitions

use serde::{Deserialize, Serialize};

/// A chat thread: direct (two participants) or group (N participants,
/// usually bound to a team).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: i64,
    pub public_id: String,
    pub name: Option<String>,
    pub team_id: Option<i64>,
    pub is_group: bool,
    pub participants: Vec<i64>,
    pub created_at: String,
}

impl Conversation {
    /// The single counterpart of `user_id` in a direct conversation.
    ///
    /// Meaningless for group conversations; returns the first participant
    /// that is not `user_id`, or `None` if there is none.
    pub fn other_participant(&self, user_id: i64) -> Option<i64> {
        self.participants.iter().copied().find(|id| *id != user_id)
    }

    pub fn is_participant(&self, user_id: i64) -> bool {
        self.participants.contains(&user_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateConversationRequest {
    pub name: Option<String>,
    pub team_id: Option<i64>,
    pub is_group: bool,
    pub participants: Vec<i64>,
}

impl CreateConversationRequest {
    /// A direct conversation between two users; the pair is stored sorted
    /// so lookups by participants are canonical.
    pub fn direct(user_a: i64, user_b: i64) -> Self {
        let mut participants = vec![user_a, user_b];
        participants.sort_unstable();
        Self {
            name: None,
            team_id: None,
            is_group: false,
            participants,
        }
    }

    /// A group conversation, optionally bound to a team.
    pub fn group(name: Option<String>, team_id: Option<i64>, participants: Vec<i64>) -> Self {
        Self {
            name,
            team_id,
            is_group: true,
            participants,
        }
    }
}
