use std::sync::Arc;

use ead_core::model::{
    Notification, NotificationDraft, NotificationId, NotificationInbox, UserId,
};
use storage::repository::{NotificationRepository, StorageError};
use tracing::{debug, warn};

use crate::Clock;
use crate::error::NotificationServiceError;

/// One learner's notification inbox, loaded once and saved on every change.
///
/// The in-memory inbox is authoritative: a failed save is logged and
/// returned, but the local change is kept.
pub struct NotificationService {
    clock: Clock,
    user: UserId,
    inbox: NotificationInbox,
    notifications: Arc<dyn NotificationRepository>,
}

impl NotificationService {
    /// # Errors
    ///
    /// Returns `NotificationServiceError::Storage` if the inbox cannot be read.
    pub async fn load(
        clock: Clock,
        user: UserId,
        notifications: Arc<dyn NotificationRepository>,
    ) -> Result<Self, NotificationServiceError> {
        let items = notifications.list_notifications(&user).await?;
        debug!(user = %user, count = items.len(), "notifications loaded");
        Ok(Self {
            clock,
            user,
            inbox: NotificationInbox::from_items(items),
            notifications,
        })
    }

    #[must_use]
    pub fn user(&self) -> &UserId {
        &self.user
    }

    #[must_use]
    pub fn inbox(&self) -> &NotificationInbox {
        &self.inbox
    }

    #[must_use]
    pub fn unread_count(&self) -> usize {
        self.inbox.unread_count()
    }

    /// Add a new unread notification on top of the inbox.
    ///
    /// # Errors
    ///
    /// Returns `NotificationServiceError::Notification` for invalid drafts
    /// (nothing is added), or `Storage` if the save fails.
    pub async fn push(
        &mut self,
        draft: NotificationDraft,
    ) -> Result<Notification, NotificationServiceError> {
        let notification = Notification::new(NotificationId::generate(), draft, self.clock.now())?;
        self.inbox.add(notification.clone());
        self.save(&notification).await?;
        Ok(notification)
    }

    /// Returns `true` if the notification was unread.
    ///
    /// # Errors
    ///
    /// Returns `NotificationServiceError::NotFound` for unknown ids.
    pub async fn mark_read(&mut self, id: &NotificationId) -> Result<bool, NotificationServiceError> {
        if !self.inbox.mark_read(id) {
            return match self.inbox.get(id) {
                Some(_) => Ok(false),
                None => Err(NotificationServiceError::NotFound(id.clone())),
            };
        }
        if let Some(notification) = self.inbox.get(id).cloned() {
            self.save(&notification).await?;
        }
        Ok(true)
    }

    /// Returns how many notifications changed.
    ///
    /// # Errors
    ///
    /// Returns `NotificationServiceError::Storage` on the first failed save.
    pub async fn mark_all_read(&mut self) -> Result<usize, NotificationServiceError> {
        let unread: Vec<NotificationId> = self
            .inbox
            .items()
            .iter()
            .filter(|n| !n.is_read())
            .map(|n| n.id().clone())
            .collect();
        let changed = self.inbox.mark_all_read();

        for id in &unread {
            if let Some(notification) = self.inbox.get(id).cloned() {
                self.save(&notification).await?;
            }
        }
        Ok(changed)
    }

    /// # Errors
    ///
    /// Returns `NotificationServiceError::NotFound` for unknown ids.
    pub async fn remove(
        &mut self,
        id: &NotificationId,
    ) -> Result<Notification, NotificationServiceError> {
        let removed = self
            .inbox
            .remove(id)
            .ok_or_else(|| NotificationServiceError::NotFound(id.clone()))?;
        let result = self.notifications.delete_notification(&self.user, id).await;
        self.check(result)?;
        Ok(removed)
    }

    /// # Errors
    ///
    /// Returns `NotificationServiceError::Storage` if the save fails.
    pub async fn clear(&mut self) -> Result<(), NotificationServiceError> {
        self.inbox.clear();
        let result = self.notifications.clear_notifications(&self.user).await;
        self.check(result)
    }

    async fn save(&self, notification: &Notification) -> Result<(), NotificationServiceError> {
        let result = self
            .notifications
            .upsert_notification(&self.user, notification)
            .await;
        self.check(result)
    }

    fn check(&self, result: Result<(), StorageError>) -> Result<(), NotificationServiceError> {
        result.map_err(|err| {
            warn!(user = %self.user, error = %err, "failed to save notifications");
            err.into()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use ead_core::model::{NotificationError, NotificationKind};
    use ead_core::time::fixed_now;
    use storage::repository::InMemoryRepository;

    async fn load(repo: &Arc<InMemoryRepository>) -> NotificationService {
        NotificationService::load(Clock::fixed(fixed_now()), UserId::new("ana"), repo.clone())
            .await
            .unwrap()
    }

    fn news(title: &str) -> NotificationDraft {
        NotificationDraft::new(NotificationKind::News, title, "Confira as novidades")
    }

    #[tokio::test]
    async fn changes_survive_a_reload() {
        let repo = Arc::new(InMemoryRepository::new());
        let mut service = load(&repo).await;
        let first = service.push(news("Primeiro")).await.unwrap();
        service.push(news("Segundo")).await.unwrap();
        assert!(service.mark_read(first.id()).await.unwrap());
        assert!(!service.mark_read(first.id()).await.unwrap());

        let reloaded = load(&repo).await;
        assert_eq!(reloaded.inbox().len(), 2);
        assert_eq!(reloaded.unread_count(), 1);
        assert!(reloaded.inbox().get(first.id()).unwrap().is_read());
    }

    #[tokio::test]
    async fn mark_all_read_and_clear() {
        let repo = Arc::new(InMemoryRepository::new());
        let mut service = load(&repo).await;
        service.push(news("A")).await.unwrap();
        service.push(news("B")).await.unwrap();

        assert_eq!(service.mark_all_read().await.unwrap(), 2);
        assert_eq!(load(&repo).await.unread_count(), 0);

        service.clear().await.unwrap();
        assert!(service.inbox().is_empty());
        assert!(load(&repo).await.inbox().is_empty());
    }

    #[tokio::test]
    async fn remove_and_unknown_ids() {
        let repo = Arc::new(InMemoryRepository::new());
        let mut service = load(&repo).await;
        let item = service.push(news("Aviso")).await.unwrap();

        service.remove(item.id()).await.unwrap();
        assert_eq!(service.unread_count(), 0);
        assert!(matches!(
            service.remove(item.id()).await,
            Err(NotificationServiceError::NotFound(_))
        ));
        assert!(matches!(
            service.mark_read(item.id()).await,
            Err(NotificationServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn invalid_draft_is_not_added() {
        let repo = Arc::new(InMemoryRepository::new());
        let mut service = load(&repo).await;
        let err = service.push(news("")).await.unwrap_err();
        assert!(matches!(
            err,
            NotificationServiceError::Notification(NotificationError::Validation(_))
        ));
        assert!(service.inbox().is_empty());
    }
}
