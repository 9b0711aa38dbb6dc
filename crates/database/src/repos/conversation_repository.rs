//! Repository for conversation and message history access.

use crate::entities::{ChatMessage, Conversation, CreateConversationRequest, MessageKind, NewMessage};
use crate::types::{ConversationError, ConversationResult};
use once_cell::sync::Lazy;
use cuid2::CuidConstructor;
use sqlx::{Row, SqlitePool};

static CUID: Lazy<CuidConstructor> = Lazy::new(CuidConstructor::new);

/// Repository for conversation database operations.
///
/// Conversations are referenced by their opaque public id everywhere
/// outside this crate; messages are append-only.
#[derive(Clone)]
pub struct ConversationRepository {
    pool: SqlitePool,
}

impl ConversationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a conversation together with its participant set.
    pub async fn create(&self, request: &CreateConversationRequest) -> ConversationResult<Conversation> {
        let now = chrono::Utc::now().to_rfc3339();
        let public_id = CUID.create_id();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| ConversationError::DatabaseError(e.to_string()))?;

        let result = sqlx::query(
            "INSERT INTO conversations (public_id, name, team_id, is_group, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&public_id)
        .bind(request.name.as_deref())
        .bind(request.team_id)
        .bind(request.is_group)
        .bind(&now)
        .execute(&mut *tx)
        .await
        .map_err(|e| ConversationError::DatabaseError(e.to_string()))?;

        let conversation_id = result.last_insert_rowid();

        for &user_id in &request.participants {
            sqlx::query(
                "INSERT INTO conversation_participants (conversation_id, user_id, joined_at)
                 VALUES (?, ?, ?)",
            )
            .bind(conversation_id)
            .bind(user_id)
            .bind(&now)
            .execute(&mut *tx)
            .await
            .map_err(|e| ConversationError::DatabaseError(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| ConversationError::DatabaseError(e.to_string()))?;

        Ok(Conversation {
            id: conversation_id,
            public_id,
            name: request.name.clone(),
            team_id: request.team_id,
            is_group: request.is_group,
            participants: request.participants.clone(),
            created_at: now,
        })
    }

    /// Find a conversation by its opaque public id.
    pub async fn find_by_public_id(&self, public_id: &str) -> ConversationResult<Option<Conversation>> {
        let row = sqlx::query(
            "SELECT id, public_id, name, team_id, is_group, created_at
             FROM conversations WHERE public_id = ?",
        )
        .bind(public_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| ConversationError::DatabaseError(e.to_string()))?;

        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    /// Find a conversation by public id, scoped to a participant.
    ///
    /// Returns `None` both when the conversation does not exist and when
    /// the user is not among its participants; callers use this as their
    /// combined exists-and-authorized probe.
    pub async fn find_for_participant(
        &self,
        public_id: &str,
        user_id: i64,
    ) -> ConversationResult<Option<Conversation>> {
        let conversation = self.find_by_public_id(public_id).await?;
        Ok(conversation.filter(|c| c.is_participant(user_id)))
    }

    /// Find the direct conversation between exactly these two users.
    pub async fn find_direct_by_participants(
        &self,
        user_a: i64,
        user_b: i64,
    ) -> ConversationResult<Option<Conversation>> {
        let row = sqlx::query(
            "SELECT c.id, c.public_id, c.name, c.team_id, c.is_group, c.created_at
             FROM conversations c
             WHERE c.is_group = false
               AND EXISTS (SELECT 1 FROM conversation_participants p
                           WHERE p.conversation_id = c.id AND p.user_id = ?)
               AND EXISTS (SELECT 1 FROM conversation_participants p
                           WHERE p.conversation_id = c.id AND p.user_id = ?)
               AND (SELECT COUNT(*) FROM conversation_participants p
                    WHERE p.conversation_id = c.id) = 2",
        )
        .bind(user_a)
        .bind(user_b)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| ConversationError::DatabaseError(e.to_string()))?;

        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    /// Find the group conversation bound to a team.
    pub async fn find_by_team(&self, team_id: i64) -> ConversationResult<Option<Conversation>> {
        let row = sqlx::query(
            "SELECT id, public_id, name, team_id, is_group, created_at
             FROM conversations WHERE team_id = ? AND is_group = true",
        )
        .bind(team_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| ConversationError::DatabaseError(e.to_string()))?;

        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    /// Append one message to a conversation's history.
    ///
    /// A single insert; either the whole message is recorded or nothing is.
    pub async fn append_message(
        &self,
        conversation_id: i64,
        message: &NewMessage,
    ) -> ConversationResult<ChatMessage> {
        let result = sqlx::query(
            "INSERT INTO messages (conversation_id, kind, sender_id, recipient_id, content, filename, filesize, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(conversation_id)
        .bind(message.kind.as_str())
        .bind(message.from)
        .bind(message.to)
        .bind(&message.content)
        .bind(message.filename.as_deref())
        .bind(message.filesize)
        .bind(&message.timestamp)
        .execute(&self.pool)
        .await
        .map_err(|e| ConversationError::DatabaseError(e.to_string()))?;

        Ok(ChatMessage {
            id: result.last_insert_rowid(),
            kind: message.kind,
            from: message.from,
            to: message.to,
            content: message.content.clone(),
            filename: message.filename.clone(),
            filesize: message.filesize,
            timestamp: message.timestamp.clone(),
        })
    }

    /// List a conversation's messages in append order.
    pub async fn list_messages(&self, conversation_id: i64) -> ConversationResult<Vec<ChatMessage>> {
        let rows = sqlx::query(
            "SELECT id, kind, sender_id, recipient_id, content, filename, filesize, created_at
             FROM messages WHERE conversation_id = ? ORDER BY id ASC",
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ConversationError::DatabaseError(e.to_string()))?;

        let mut messages = Vec::with_capacity(rows.len());
        for row in rows {
            let kind_str: String = row
                .try_get("kind")
                .map_err(|e| ConversationError::DatabaseError(e.to_string()))?;
            let kind: MessageKind = kind_str
                .parse()
                .map_err(|_| ConversationError::InvalidMessageKind(kind_str))?;

            messages.push(ChatMessage {
                id: row
                    .try_get("id")
                    .map_err(|e| ConversationError::DatabaseError(e.to_string()))?,
                kind,
                from: row
                    .try_get("sender_id")
                    .map_err(|e| ConversationError::DatabaseError(e.to_string()))?,
                to: row
                    .try_get("recipient_id")
                    .map_err(|e| ConversationError::DatabaseError(e.to_string()))?,
                content: row
                    .try_get("content")
                    .map_err(|e| ConversationError::DatabaseError(e.to_string()))?,
                filename: row
                    .try_get("filename")
                    .map_err(|e| ConversationError::DatabaseError(e.to_string()))?,
                filesize: row
                    .try_get("filesize")
                    .map_err(|e| ConversationError::DatabaseError(e.to_string()))?,
                timestamp: row
                    .try_get("created_at")
                    .map_err(|e| ConversationError::DatabaseError(e.to_string()))?,
            });
        }

        Ok(messages)
    }

    async fn hydrate(&self, row: sqlx::sqlite::SqliteRow) -> ConversationResult<Conversation> {
        let id: i64 = row
            .try_get("id")
            .map_err(|e| ConversationError::DatabaseError(e.to_string()))?;

        let participants = self.load_participants(id).await?;

        Ok(Conversation {
            id,
            public_id: row
                .try_get("public_id")
                .map_err(|e| ConversationError::DatabaseError(e.to_string()))?,
            name: row
                .try_get("name")
                .map_err(|e| ConversationError::DatabaseError(e.to_string()))?,
            team_id: row
                .try_get("team_id")
                .map_err(|e| ConversationError::DatabaseError(e.to_string()))?,
            is_group: row
                .try_get("is_group")
                .map_err(|e| ConversationError::DatabaseError(e.to_string()))?,
            participants,
            created_at: row
                .try_get("created_at")
                .map_err(|e| ConversationError::DatabaseError(e.to_string()))?,
        })
    }

    async fn load_participants(&self, conversation_id: i64) -> ConversationResult<Vec<i64>> {
        let rows = sqlx::query(
            "SELECT user_id FROM conversation_participants
             WHERE conversation_id = ? ORDER BY user_id ASC",
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ConversationError::DatabaseError(e.to_string()))?;

        rows.into_iter()
            .map(|row| {
                row.try_get("user_id")
                    .map_err(|e| ConversationError::DatabaseError(e.to_string()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::run_migrations;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn create_test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        run_migrations(&pool).await.unwrap();
        pool
    }

    fn new_message(from: i64, to: Option<i64>, content: &str) -> NewMessage {
        NewMessage {
            kind: MessageKind::Chat,
            from,
            to,
            content: content.to_string(),
            filename: None,
            filesize: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    #[tokio::test]
    async fn create_and_find_by_public_id() {
        let pool = create_test_pool().await;
        let repo = ConversationRepository::new(pool);

        let created = repo
            .create(&CreateConversationRequest::direct(7, 3))
            .await
            .unwrap();

        let found = repo.find_by_public_id(&created.public_id).await.unwrap().unwrap();
        assert_eq!(found.id, created.id);
        assert!(!found.is_group);
        // Direct pairs are stored sorted.
        assert_eq!(found.participants, vec![3, 7]);
    }

    #[tokio::test]
    async fn find_for_participant_scopes_to_membership() {
        let pool = create_test_pool().await;
        let repo = ConversationRepository::new(pool);

        let created = repo
            .create(&CreateConversationRequest::direct(1, 2))
            .await
            .unwrap();

        assert!(repo
            .find_for_participant(&created.public_id, 1)
            .await
            .unwrap()
            .is_some());
        assert!(repo
            .find_for_participant(&created.public_id, 99)
            .await
            .unwrap()
            .is_none());
        assert!(repo.find_for_participant("missing", 1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn find_direct_by_participants_matches_exact_pair() {
        let pool = create_test_pool().await;
        let repo = ConversationRepository::new(pool);

        repo.create(&CreateConversationRequest::direct(1, 2)).await.unwrap();
        repo.create(&CreateConversationRequest::group(
            Some("Team".to_string()),
            Some(10),
            vec![1, 2, 3],
        ))
        .await
        .unwrap();

        let direct = repo.find_direct_by_participants(2, 1).await.unwrap().unwrap();
        assert_eq!(direct.participants, vec![1, 2]);

        assert!(repo.find_direct_by_participants(1, 3).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn find_by_team_returns_group_conversation() {
        let pool = create_test_pool().await;
        let repo = ConversationRepository::new(pool);

        let created = repo
            .create(&CreateConversationRequest::group(
                Some("Lions".to_string()),
                Some(42),
                vec![1, 2, 3],
            ))
            .await
            .unwrap();

        let found = repo.find_by_team(42).await.unwrap().unwrap();
        assert_eq!(found.id, created.id);
        assert_eq!(found.name.as_deref(), Some("Lions"));

        assert!(repo.find_by_team(43).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn append_preserves_order_and_fields() {
        let pool = create_test_pool().await;
        let repo = ConversationRepository::new(pool);

        let conversation = repo
            .create(&CreateConversationRequest::direct(1, 2))
            .await
            .unwrap();

        repo.append_message(conversation.id, &new_message(1, Some(2), "first"))
            .await
            .unwrap();
        repo.append_message(conversation.id, &new_message(2, Some(1), "second"))
            .await
            .unwrap();

        let file = NewMessage {
            kind: MessageKind::File,
            from: 1,
            to: Some(2),
            content: "/files/roster.pdf".to_string(),
            filename: Some("roster.pdf".to_string()),
            filesize: Some(52_133),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };
        repo.append_message(conversation.id, &file).await.unwrap();

        let messages = repo.list_messages(conversation.id).await.unwrap();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].content, "first");
        assert_eq!(messages[1].content, "second");
        assert_eq!(messages[2].kind, MessageKind::File);
        assert_eq!(messages[2].filename.as_deref(), Some("roster.pdf"));
        assert_eq!(messages[2].filesize, Some(52_133));
    }
}
