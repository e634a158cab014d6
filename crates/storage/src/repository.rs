use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ead_core::model::{
    Certificate, CourseId, ExamId, ExamResult, Group, GroupId, LessonId, LessonProgress, ModuleId,
    Notification, NotificationId, UserId,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Persisted outcome of one submitted exam attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct ExamAttemptRecord {
    pub id: Option<i64>,
    pub user_id: UserId,
    pub course_id: CourseId,
    pub module_id: ModuleId,
    pub exam_id: ExamId,
    pub score: f64,
    pub passed: bool,
    pub correct: u32,
    pub total: u32,
    pub submitted_at: DateTime<Utc>,
}

impl ExamAttemptRecord {
    /// Build an unsaved record from a submission result.
    #[must_use]
    pub fn from_result(
        user_id: UserId,
        course_id: CourseId,
        module_id: ModuleId,
        result: &ExamResult,
    ) -> Self {
        Self {
            id: None,
            user_id,
            course_id,
            module_id,
            exam_id: result.exam_id.clone(),
            score: result.score,
            passed: result.passed,
            correct: u32::try_from(result.correct).unwrap_or(u32::MAX),
            total: u32::try_from(result.total).unwrap_or(u32::MAX),
            submitted_at: result.submitted_at,
        }
    }
}

/// Lesson watch state per learner, keyed by `(user, course, lesson)`.
#[async_trait]
pub trait LessonProgressRepository: Send + Sync {
    /// Insert or replace the progress of one lesson.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the progress cannot be stored.
    async fn upsert_progress(
        &self,
        user: &UserId,
        progress: &LessonProgress,
    ) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on connection or mapping failures.
    async fn get_progress(
        &self,
        user: &UserId,
        course: &CourseId,
        lesson: &LessonId,
    ) -> Result<Option<LessonProgress>, StorageError>;

    /// Every lesson of `course` the learner has opened.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on connection or mapping failures.
    async fn list_course_progress(
        &self,
        user: &UserId,
        course: &CourseId,
    ) -> Result<Vec<LessonProgress>, StorageError>;
}

#[async_trait]
pub trait ExamAttemptRepository: Send + Sync {
    /// Append a submitted attempt and return its row id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the attempt cannot be stored.
    async fn append_attempt(&self, attempt: &ExamAttemptRecord) -> Result<i64, StorageError>;

    /// Attempts of one learner in one course, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on connection or mapping failures.
    async fn list_attempts(
        &self,
        user: &UserId,
        course: &CourseId,
    ) -> Result<Vec<ExamAttemptRecord>, StorageError>;
}

#[async_trait]
pub trait GroupRepository: Send + Sync {
    /// Persist or update a group together with its access selection.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the group cannot be stored.
    async fn upsert_group(&self, group: &Group) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on connection or mapping failures.
    async fn get_group(&self, id: &GroupId) -> Result<Option<Group>, StorageError>;

    /// Groups ordered by name.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on connection or mapping failures.
    async fn list_groups(&self) -> Result<Vec<Group>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if no such group exists.
    async fn delete_group(&self, id: &GroupId) -> Result<(), StorageError>;
}

#[async_trait]
pub trait NotificationRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` on connection or mapping failures.
    async fn list_notifications(&self, user: &UserId) -> Result<Vec<Notification>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the notification cannot be stored.
    async fn upsert_notification(
        &self,
        user: &UserId,
        notification: &Notification,
    ) -> Result<(), StorageError>;

    /// Removing a missing notification is not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on connection failures.
    async fn delete_notification(
        &self,
        user: &UserId,
        id: &NotificationId,
    ) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on connection failures.
    async fn clear_notifications(&self, user: &UserId) -> Result<(), StorageError>;
}

#[async_trait]
pub trait CertificateRepository: Send + Sync {
    /// Store a new certificate. One certificate per `(user, course)`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the learner already holds one for
    /// the course.
    async fn insert_certificate(&self, certificate: &Certificate) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on connection or mapping failures.
    async fn get_certificate(
        &self,
        user: &UserId,
        course: &CourseId,
    ) -> Result<Option<Certificate>, StorageError>;

    /// Newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on connection or mapping failures.
    async fn list_certificates(&self, user: &UserId) -> Result<Vec<Certificate>, StorageError>;
}

//
// ─── IN-MEMORY ─────────────────────────────────────────────────────────────────
//

type ProgressKey = (UserId, CourseId, LessonId);

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    progress: Arc<Mutex<HashMap<ProgressKey, LessonProgress>>>,
    attempts: Arc<Mutex<Vec<ExamAttemptRecord>>>,
    groups: Arc<Mutex<HashMap<GroupId, Group>>>,
    notifications: Arc<Mutex<HashMap<UserId, Vec<Notification>>>>,
    certificates: Arc<Mutex<Vec<Certificate>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, StorageError> {
    mutex
        .lock()
        .map_err(|e| StorageError::Connection(e.to_string()))
}

#[async_trait]
impl LessonProgressRepository for InMemoryRepository {
    async fn upsert_progress(
        &self,
        user: &UserId,
        progress: &LessonProgress,
    ) -> Result<(), StorageError> {
        let location = progress.location();
        let key = (
            user.clone(),
            location.course_id.clone(),
            location.lesson_id.clone(),
        );
        lock(&self.progress)?.insert(key, progress.clone());
        Ok(())
    }

    async fn get_progress(
        &self,
        user: &UserId,
        course: &CourseId,
        lesson: &LessonId,
    ) -> Result<Option<LessonProgress>, StorageError> {
        let key = (user.clone(), course.clone(), lesson.clone());
        Ok(lock(&self.progress)?.get(&key).cloned())
    }

    async fn list_course_progress(
        &self,
        user: &UserId,
        course: &CourseId,
    ) -> Result<Vec<LessonProgress>, StorageError> {
        let guard = lock(&self.progress)?;
        let mut found: Vec<_> = guard
            .iter()
            .filter(|((u, c, _), _)| u == user && c == course)
            .map(|(_, p)| p.clone())
            .collect();
        found.sort_by(|a, b| a.location().lesson_id.cmp(&b.location().lesson_id));
        Ok(found)
    }
}

#[async_trait]
impl ExamAttemptRepository for InMemoryRepository {
    async fn append_attempt(&self, attempt: &ExamAttemptRecord) -> Result<i64, StorageError> {
        let mut guard = lock(&self.attempts)?;
        let id = i64::try_from(guard.len() + 1)
            .map_err(|_| StorageError::Serialization("attempt id overflow".into()))?;
        let mut stored = attempt.clone();
        stored.id = Some(id);
        guard.push(stored);
        Ok(id)
    }

    async fn list_attempts(
        &self,
        user: &UserId,
        course: &CourseId,
    ) -> Result<Vec<ExamAttemptRecord>, StorageError> {
        let guard = lock(&self.attempts)?;
        let mut found: Vec<_> = guard
            .iter()
            .filter(|a| &a.user_id == user && &a.course_id == course)
            .cloned()
            .collect();
        found.sort_by_key(|a| a.submitted_at);
        Ok(found)
    }
}

#[async_trait]
impl GroupRepository for InMemoryRepository {
    async fn upsert_group(&self, group: &Group) -> Result<(), StorageError> {
        lock(&self.groups)?.insert(group.id().clone(), group.clone());
        Ok(())
    }

    async fn get_group(&self, id: &GroupId) -> Result<Option<Group>, StorageError> {
        Ok(lock(&self.groups)?.get(id).cloned())
    }

    async fn list_groups(&self) -> Result<Vec<Group>, StorageError> {
        let mut groups: Vec<_> = lock(&self.groups)?.values().cloned().collect();
        groups.sort_by(|a, b| a.name().cmp(b.name()).then_with(|| a.id().cmp(b.id())));
        Ok(groups)
    }

    async fn delete_group(&self, id: &GroupId) -> Result<(), StorageError> {
        lock(&self.groups)?
            .remove(id)
            .map(|_| ())
            .ok_or(StorageError::NotFound)
    }
}

#[async_trait]
impl NotificationRepository for InMemoryRepository {
    async fn list_notifications(&self, user: &UserId) -> Result<Vec<Notification>, StorageError> {
        Ok(lock(&self.notifications)?
            .get(user)
            .cloned()
            .unwrap_or_default())
    }

    async fn upsert_notification(
        &self,
        user: &UserId,
        notification: &Notification,
    ) -> Result<(), StorageError> {
        let mut guard = lock(&self.notifications)?;
        let items = guard.entry(user.clone()).or_default();
        match items.iter_mut().find(|n| n.id() == notification.id()) {
            Some(existing) => *existing = notification.clone(),
            None => items.push(notification.clone()),
        }
        Ok(())
    }

    async fn delete_notification(
        &self,
        user: &UserId,
        id: &NotificationId,
    ) -> Result<(), StorageError> {
        if let Some(items) = lock(&self.notifications)?.get_mut(user) {
            items.retain(|n| n.id() != id);
        }
        Ok(())
    }

    async fn clear_notifications(&self, user: &UserId) -> Result<(), StorageError> {
        lock(&self.notifications)?.remove(user);
        Ok(())
    }
}

#[async_trait]
impl CertificateRepository for InMemoryRepository {
    async fn insert_certificate(&self, certificate: &Certificate) -> Result<(), StorageError> {
        let mut guard = lock(&self.certificates)?;
        let taken = guard.iter().any(|c| {
            c.user_id() == certificate.user_id() && c.course_id() == certificate.course_id()
        });
        if taken {
            return Err(StorageError::Conflict);
        }
        guard.push(certificate.clone());
        Ok(())
    }

    async fn get_certificate(
        &self,
        user: &UserId,
        course: &CourseId,
    ) -> Result<Option<Certificate>, StorageError> {
        Ok(lock(&self.certificates)?
            .iter()
            .find(|c| c.user_id() == user && c.course_id() == course)
            .cloned())
    }

    async fn list_certificates(&self, user: &UserId) -> Result<Vec<Certificate>, StorageError> {
        let mut found: Vec<_> = lock(&self.certificates)?
            .iter()
            .filter(|c| c.user_id() == user)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.completion_date().cmp(&a.completion_date()));
        Ok(found)
    }
}

/// Aggregates the repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub progress: Arc<dyn LessonProgressRepository>,
    pub exam_attempts: Arc<dyn ExamAttemptRepository>,
    pub groups: Arc<dyn GroupRepository>,
    pub notifications: Arc<dyn NotificationRepository>,
    pub certificates: Arc<dyn CertificateRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        Self {
            progress: Arc::new(repo.clone()),
            exam_attempts: Arc::new(repo.clone()),
            groups: Arc::new(repo.clone()),
            notifications: Arc::new(repo.clone()),
            certificates: Arc::new(repo),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ead_core::model::{
        CertificateId, Course, CourseLevel, GroupDraft, Instructor, LessonLocation,
        NotificationDraft, NotificationKind,
    };
    use ead_core::time::fixed_now;

    fn location(lesson: &str) -> LessonLocation {
        LessonLocation::new(CourseId::new("1"), ModuleId::new("1-1"), LessonId::new(lesson))
    }

    fn course() -> Course {
        Course {
            id: CourseId::new("1"),
            title: "Boas práticas".into(),
            description: String::new(),
            category: "gestao".into(),
            level: CourseLevel::Beginner,
            duration_minutes: 90,
            instructor: Instructor {
                name: "Ana Souza".into(),
                bio: None,
            },
            modules: Vec::new(),
        }
    }

    #[tokio::test]
    async fn progress_is_scoped_per_user() {
        let repo = InMemoryRepository::new();
        let progress = LessonProgress::from_persisted(
            location("1-1-1"),
            120.0,
            Some(600.0),
            false,
            fixed_now(),
        )
        .unwrap();
        repo.upsert_progress(&UserId::new("ana"), &progress)
            .await
            .unwrap();

        let fetched = repo
            .get_progress(
                &UserId::new("ana"),
                &CourseId::new("1"),
                &LessonId::new("1-1-1"),
            )
            .await
            .unwrap();
        assert_eq!(fetched, Some(progress));

        let other = repo
            .list_course_progress(&UserId::new("bruno"), &CourseId::new("1"))
            .await
            .unwrap();
        assert!(other.is_empty());
    }

    #[tokio::test]
    async fn attempts_get_sequential_ids() {
        let repo = InMemoryRepository::new();
        let record = ExamAttemptRecord {
            id: None,
            user_id: UserId::new("ana"),
            course_id: CourseId::new("1"),
            module_id: ModuleId::new("1-1"),
            exam_id: ExamId::new("e1"),
            score: 5.0,
            passed: false,
            correct: 1,
            total: 2,
            submitted_at: fixed_now(),
        };
        assert_eq!(repo.append_attempt(&record).await.unwrap(), 1);
        assert_eq!(repo.append_attempt(&record).await.unwrap(), 2);

        let listed = repo
            .list_attempts(&UserId::new("ana"), &CourseId::new("1"))
            .await
            .unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, Some(1));
    }

    #[tokio::test]
    async fn deleting_missing_group_is_not_found() {
        let repo = InMemoryRepository::new();
        let group = Group::create(GroupId::new("g1"), GroupDraft::new("Vendas"), fixed_now())
            .unwrap();
        repo.upsert_group(&group).await.unwrap();
        repo.delete_group(group.id()).await.unwrap();
        assert!(matches!(
            repo.delete_group(group.id()).await,
            Err(StorageError::NotFound)
        ));
    }

    #[tokio::test]
    async fn notification_upsert_replaces_by_id() {
        let repo = InMemoryRepository::new();
        let user = UserId::new("ana");
        let n = Notification::new(
            NotificationId::new("n1"),
            NotificationDraft::new(NotificationKind::News, "Aviso", "Texto"),
            fixed_now(),
        )
        .unwrap();
        repo.upsert_notification(&user, &n).await.unwrap();
        repo.upsert_notification(&user, &n).await.unwrap();
        assert_eq!(repo.list_notifications(&user).await.unwrap().len(), 1);

        repo.clear_notifications(&user).await.unwrap();
        assert!(repo.list_notifications(&user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn second_certificate_for_course_conflicts() {
        let repo = InMemoryRepository::new();
        let issue = |id: &str| {
            Certificate::issue(
                CertificateId::new(id),
                UserId::new("ana"),
                "Ana",
                &course(),
                9.0,
                fixed_now(),
                None,
            )
            .unwrap()
        };
        repo.insert_certificate(&issue("c1")).await.unwrap();
        assert!(matches!(
            repo.insert_certificate(&issue("c2")).await,
            Err(StorageError::Conflict)
        ));
    }
}
