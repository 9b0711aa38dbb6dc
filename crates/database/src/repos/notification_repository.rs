//! Notification repository for database operations.

use crate::entities::{CreateNotificationRequest, Notification};
use crate::types::{NotificationError, NotificationResult};
use sqlx::{Row, SqlitePool};

/// Repository for notification database operations
#[derive(Clone)]
pub struct NotificationRepository {
    pool: SqlitePool,
}

impl NotificationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new notification (unread by default).
    pub async fn create(&self, request: &CreateNotificationRequest) -> NotificationResult<Notification> {
        let now = chrono::Utc::now().to_rfc3339();

        let result = sqlx::query(
            "INSERT INTO notifications (user_id, title, content, url, is_read, created_at)
             VALUES (?, ?, ?, ?, false, ?)",
        )
        .bind(request.user_id)
        .bind(&request.title)
        .bind(&request.content)
        .bind(&request.url)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| NotificationError::DatabaseError(e.to_string()))?;

        Ok(Notification {
            id: result.last_insert_rowid(),
            user_id: request.user_id,
            title: request.title.clone(),
            content: request.content.clone(),
            url: request.url.clone(),
            is_read: false,
            created_at: now,
        })
    }

    /// List a user's notifications, newest first.
    pub async fn list_for_user(&self, user_id: i64) -> NotificationResult<Vec<Notification>> {
        let rows = sqlx::query(
            "SELECT id, user_id, title, content, url, is_read, created_at
             FROM notifications WHERE user_id = ?
             ORDER BY created_at DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| NotificationError::DatabaseError(e.to_string()))?;

        rows.into_iter().map(Self::from_row).collect()
    }

    /// Mark one of a user's notifications as read.
    pub async fn mark_as_read(&self, id: i64, user_id: i64) -> NotificationResult<Notification> {
        let result = sqlx::query("UPDATE notifications SET is_read = true WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| NotificationError::DatabaseError(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(NotificationError::NotFound);
        }

        let row = sqlx::query(
            "SELECT id, user_id, title, content, url, is_read, created_at
             FROM notifications WHERE id = ?",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| NotificationError::DatabaseError(e.to_string()))?;

        Self::from_row(row)
    }

    /// Mark all of a user's notifications as read; returns how many changed.
    pub async fn mark_all_as_read(&self, user_id: i64) -> NotificationResult<u32> {
        let result = sqlx::query(
            "UPDATE notifications SET is_read = true WHERE user_id = ? AND is_read = false",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(|e| NotificationError::DatabaseError(e.to_string()))?;

        Ok(result.rows_affected() as u32)
    }

    /// Count a user's unread notifications.
    pub async fn unread_count(&self, user_id: i64) -> NotificationResult<i64> {
        let row = sqlx::query(
            "SELECT COUNT(*) as count FROM notifications WHERE user_id = ? AND is_read = false",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| NotificationError::DatabaseError(e.to_string()))?;

        row.try_get("count")
            .map_err(|e| NotificationError::DatabaseError(e.to_string()))
    }

    fn from_row(row: sqlx::sqlite::SqliteRow) -> NotificationResult<Notification> {
        Ok(Notification {
            id: row
                .try_get("id")
                .map_err(|e| NotificationError::DatabaseError(e.to_string()))?,
            user_id: row
                .try_get("user_id")
                .map_err(|e| NotificationError::DatabaseError(e.to_string()))?,
            title: row
                .try_get("title")
                .map_err(|e| NotificationError::DatabaseError(e.to_string()))?,
            content: row
                .try_get("content")
                .map_err(|e| NotificationError::DatabaseError(e.to_string()))?,
            url: row
                .try_get("url")
                .map_err(|e| NotificationError::DatabaseError(e.to_string()))?,
            is_read: row
                .try_get("is_read")
                .map_err(|e| NotificationError::DatabaseError(e.to_string()))?,
            created_at: row
                .try_get("created_at")
                .map_err(|e| NotificationError::DatabaseError(e.to_string()))?,
        })
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

    fn request(user_id: i64, title: &str) -> CreateNotificationRequest {
        CreateNotificationRequest {
            user_id,
            title: title.to_string(),
            content: "match tonight at 8".to_string(),
            url: "/chats/abc123".to_string(),
        }
    }

    #[tokio::test]
    async fn create_defaults_to_unread() {
        let pool = create_test_pool().await;
        let repo = NotificationRepository::new(pool);

        let notification = repo.create(&request(1, "Message received")).await.unwrap();

        assert_eq!(notification.user_id, 1);
        assert_eq!(notification.title, "Message received");
        assert!(!notification.is_read);
    }

    #[tokio::test]
    async fn list_for_user_is_newest_first_and_scoped() {
        let pool = create_test_pool().await;
        let repo = NotificationRepository::new(pool);

        repo.create(&request(1, "first")).await.unwrap();
        repo.create(&request(1, "second")).await.unwrap();
        repo.create(&request(2, "other user")).await.unwrap();

        let notifications = repo.list_for_user(1).await.unwrap();

        assert_eq!(notifications.len(), 2);
        assert_eq!(notifications[0].title, "second");
        assert_eq!(notifications[1].title, "first");
    }

    #[tokio::test]
    async fn mark_as_read_requires_matching_owner() {
        let pool = create_test_pool().await;
        let repo = NotificationRepository::new(pool);

        let notification = repo.create(&request(1, "Message received")).await.unwrap();

        assert!(matches!(
            repo.mark_as_read(notification.id, 2).await,
            Err(NotificationError::NotFound)
        ));

        let updated = repo.mark_as_read(notification.id, 1).await.unwrap();
        assert!(updated.is_read);
    }

    #[tokio::test]
    async fn mark_all_and_unread_count() {
        let pool = create_test_pool().await;
        let repo = NotificationRepository::new(pool);

        repo.create(&request(1, "a")).await.unwrap();
        repo.create(&request(1, "b")).await.unwrap();

        assert_eq!(repo.unread_count(1).await.unwrap(), 2);
        assert_eq!(repo.mark_all_as_read(1).await.unwrap(), 2);
        assert_eq!(repo.unread_count(1).await.unwrap(), 0);
        // Second pass has nothing left to flip.
        assert_eq!(repo.mark_all_as_read(1).await.unwrap(), 0);
    }
}
