use ead_core::model::{Notification, NotificationId, UserId};

use super::SqliteRepository;
use super::mapping::{conn, map_notification_row, ser};
use crate::repository::{NotificationRepository, StorageError};

#[async_trait::async_trait]
impl NotificationRepository for SqliteRepository {
    async fn list_notifications(&self, user: &UserId) -> Result<Vec<Notification>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, kind, title, message, link, read, created_at, metadata
            FROM notifications
            WHERE user_id = ?1
            ORDER BY created_at DESC, id ASC
            ",
        )
        .bind(user.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_notification_row).collect()
    }

    async fn upsert_notification(
        &self,
        user: &UserId,
        notification: &Notification,
    ) -> Result<(), StorageError> {
        let metadata = serde_json::to_string(notification.metadata()).map_err(ser)?;
        sqlx::query(
            r"
            INSERT INTO notifications (id, user_id, kind, title, message, link, read, created_at, metadata)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(user_id, id) DO UPDATE SET
                kind = excluded.kind,
                title = excluded.title,
                message = excluded.message,
                link = excluded.link,
                read = excluded.read,
                metadata = excluded.metadata
            ",
        )
        .bind(notification.id().as_str())
        .bind(user.as_str())
        .bind(notification.kind().as_str())
        .bind(notification.title())
        .bind(notification.message())
        .bind(notification.link())
        .bind(i64::from(notification.is_read()))
        .bind(notification.created_at())
        .bind(metadata)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }

    async fn delete_notification(
        &self,
        user: &UserId,
        id: &NotificationId,
    ) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM notifications WHERE user_id = ?1 AND id = ?2")
            .bind(user.as_str())
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(conn)?;
        Ok(())
    }

    async fn clear_notifications(&self, user: &UserId) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM notifications WHERE user_id = ?1")
            .bind(user.as_str())
            .execute(&self.pool)
            .await
            .map_err(conn)?;
        Ok(())
    }
}
