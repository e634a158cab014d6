use std::sync::Arc;

use async_trait::async_trait;
use ead_core::model::{
    Catalog, CourseId, LessonId, LessonLocation, LessonProgress, ModuleId, UserId,
};
use storage::repository::LessonProgressRepository;
use tracing::info;

use crate::Clock;
use crate::error::ProgressServiceError;

/// Receives lesson progress from a playback session.
#[async_trait]
pub trait CompletionRecorder: Send + Sync {
    /// Record the latest position and completion state of a lesson.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError` if the progress could not be recorded.
    async fn record_progress(
        &self,
        user: &UserId,
        progress: &LessonProgress,
    ) -> Result<(), ProgressServiceError>;
}

/// Recorder that drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRecorder;

#[async_trait]
impl CompletionRecorder for NoopRecorder {
    async fn record_progress(
        &self,
        _user: &UserId,
        _progress: &LessonProgress,
    ) -> Result<(), ProgressServiceError> {
        Ok(())
    }
}

/// Completed versus required lessons of a course.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CourseCompletion {
    pub completed_lessons: usize,
    pub required_lessons: usize,
}

impl CourseCompletion {
    /// Rounded percentage; a course without required lessons counts as done.
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn percent(&self) -> u8 {
        if self.required_lessons == 0 {
            return 100;
        }
        let ratio = self.completed_lessons as f64 / self.required_lessons as f64;
        (ratio * 100.0).round().clamp(0.0, 100.0) as u8
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.completed_lessons >= self.required_lessons
    }
}

/// Lesson progress per learner: load on demand, save on every change.
#[derive(Clone)]
pub struct ProgressService {
    clock: Clock,
    catalog: Arc<Catalog>,
    progress: Arc<dyn LessonProgressRepository>,
}

impl ProgressService {
    #[must_use]
    pub fn new(
        clock: Clock,
        catalog: Arc<Catalog>,
        progress: Arc<dyn LessonProgressRepository>,
    ) -> Self {
        Self {
            clock,
            catalog,
            progress,
        }
    }

    #[must_use]
    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// Resolve a lesson to its full location.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::UnknownLesson` if the catalog has no such lesson.
    pub fn locate(
        &self,
        course: &CourseId,
        lesson: &LessonId,
    ) -> Result<LessonLocation, ProgressServiceError> {
        self.catalog
            .lesson_location(course, lesson)
            .ok_or_else(|| ProgressServiceError::UnknownLesson {
                course: course.clone(),
                lesson: lesson.clone(),
            })
    }

    /// Stored progress of a lesson, or fresh progress if never opened.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError` for unknown lessons or storage failures.
    pub async fn lesson_progress(
        &self,
        user: &UserId,
        course: &CourseId,
        lesson: &LessonId,
    ) -> Result<LessonProgress, ProgressServiceError> {
        let location = self.locate(course, lesson)?;
        let stored = self.progress.get_progress(user, course, lesson).await?;
        Ok(stored.unwrap_or_else(|| LessonProgress::new(location, self.clock.now())))
    }

    /// Persist `progress`, stamped with the current time.
    ///
    /// A lesson that was completed once stays completed, so re-watching from
    /// the start cannot undo it.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if persistence fails.
    pub async fn record_progress(
        &self,
        user: &UserId,
        progress: &LessonProgress,
    ) -> Result<(), ProgressServiceError> {
        let location = progress.location();
        let already_completed = self
            .progress
            .get_progress(user, &location.course_id, &location.lesson_id)
            .await?
            .is_some_and(|p| p.is_completed());

        let completed = progress.is_completed() || already_completed;
        let mut to_store = if completed && !progress.is_completed() {
            LessonProgress::from_persisted(
                location.clone(),
                progress.watched_seconds(),
                progress.duration_seconds(),
                true,
                progress.updated_at(),
            )
            .unwrap_or_else(|_| progress.clone())
        } else {
            progress.clone()
        };
        to_store.touch(self.clock.now());

        self.progress.upsert_progress(user, &to_store).await?;
        if progress.is_completed() && !already_completed {
            info!(
                user = %user,
                course = %location.course_id,
                lesson = %location.lesson_id,
                "lesson completed"
            );
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if the lookup fails.
    pub async fn is_lesson_completed(
        &self,
        user: &UserId,
        course: &CourseId,
        lesson: &LessonId,
    ) -> Result<bool, ProgressServiceError> {
        Ok(self
            .progress
            .get_progress(user, course, lesson)
            .await?
            .is_some_and(|p| p.is_completed()))
    }

    /// Lessons of `module` the learner has not completed yet, in course order.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError` for unknown modules or storage failures.
    pub async fn remaining_lessons(
        &self,
        user: &UserId,
        course: &CourseId,
        module: &ModuleId,
    ) -> Result<Vec<LessonId>, ProgressServiceError> {
        let module_entry = self.catalog.module(course, module).ok_or_else(|| {
            ProgressServiceError::UnknownModule {
                course: course.clone(),
                module: module.clone(),
            }
        })?;
        let done = self.completed_lessons(user, course).await?;
        Ok(module_entry
            .lessons
            .iter()
            .filter(|l| !done.contains(&l.id))
            .map(|l| l.id.clone())
            .collect())
    }

    /// A module exam opens once every lesson of the module is completed.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError` for unknown modules or storage failures.
    pub async fn can_take_exam(
        &self,
        user: &UserId,
        course: &CourseId,
        module: &ModuleId,
    ) -> Result<bool, ProgressServiceError> {
        Ok(self
            .remaining_lessons(user, course, module)
            .await?
            .is_empty())
    }

    /// # Errors
    ///
    /// Returns `ProgressServiceError` for unknown courses or storage failures.
    pub async fn course_completion(
        &self,
        user: &UserId,
        course: &CourseId,
    ) -> Result<CourseCompletion, ProgressServiceError> {
        let course_entry = self
            .catalog
            .course(course)
            .ok_or_else(|| ProgressServiceError::UnknownCourse(course.clone()))?;
        let done = self.completed_lessons(user, course).await?;

        let mut completion = CourseCompletion {
            completed_lessons: 0,
            required_lessons: 0,
        };
        for (_, lesson) in course_entry.required_lessons() {
            completion.required_lessons += 1;
            if done.contains(&lesson.id) {
                completion.completed_lessons += 1;
            }
        }
        Ok(completion)
    }

    async fn completed_lessons(
        &self,
        user: &UserId,
        course: &CourseId,
    ) -> Result<Vec<LessonId>, ProgressServiceError> {
        Ok(self
            .progress
            .list_course_progress(user, course)
            .await?
            .into_iter()
            .filter(LessonProgress::is_completed)
            .map(|p| p.location().lesson_id.clone())
            .collect())
    }
}

#[async_trait]
impl CompletionRecorder for ProgressService {
    async fn record_progress(
        &self,
        user: &UserId,
        progress: &LessonProgress,
    ) -> Result<(), ProgressServiceError> {
        ProgressService::record_progress(self, user, progress).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use ead_core::time::fixed_now;
    use storage::repository::InMemoryRepository;

    use crate::catalog::demo_catalog;

    fn service() -> ProgressService {
        ProgressService::new(
            Clock::fixed(fixed_now()),
            Arc::new(demo_catalog().unwrap()),
            Arc::new(InMemoryRepository::new()),
        )
    }

    fn completed(location: LessonLocation) -> LessonProgress {
        LessonProgress::from_persisted(location, 900.0, Some(900.0), true, fixed_now()).unwrap()
    }

    #[tokio::test]
    async fn unopened_lesson_starts_fresh() {
        let service = service();
        let user = UserId::new("ana");
        let progress = service
            .lesson_progress(&user, &CourseId::new("1"), &LessonId::new("1-1-2"))
            .await
            .unwrap();
        assert_eq!(progress.location().module_id, ModuleId::new("1-1"));
        assert!(!progress.is_completed());

        let err = service
            .lesson_progress(&user, &CourseId::new("1"), &LessonId::new("9-9-9"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProgressServiceError::UnknownLesson { .. }));
    }

    #[tokio::test]
    async fn exam_opens_only_after_every_module_lesson() {
        let service = service();
        let user = UserId::new("ana");
        let course = CourseId::new("1");
        let module = ModuleId::new("1-1");

        assert!(!service.can_take_exam(&user, &course, &module).await.unwrap());

        let first = service.locate(&course, &LessonId::new("1-1-1")).unwrap();
        service.record_progress(&user, &completed(first)).await.unwrap();
        assert_eq!(
            service
                .remaining_lessons(&user, &course, &module)
                .await
                .unwrap(),
            vec![LessonId::new("1-1-2")]
        );

        let second = service.locate(&course, &LessonId::new("1-1-2")).unwrap();
        service.record_progress(&user, &completed(second)).await.unwrap();
        assert!(service.can_take_exam(&user, &course, &module).await.unwrap());
        assert!(
            !service
                .can_take_exam(&user, &course, &ModuleId::new("1-2"))
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn rewatching_does_not_undo_completion() {
        let service = service();
        let user = UserId::new("ana");
        let location = service
            .locate(&CourseId::new("2"), &LessonId::new("2-1-1"))
            .unwrap();
        service
            .record_progress(&user, &completed(location.clone()))
            .await
            .unwrap();

        let rewatch = LessonProgress::from_persisted(location, 12.0, Some(900.0), false, fixed_now())
            .unwrap();
        service.record_progress(&user, &rewatch).await.unwrap();

        let stored = service
            .lesson_progress(&user, &CourseId::new("2"), &LessonId::new("2-1-1"))
            .await
            .unwrap();
        assert!(stored.is_completed());
        assert_eq!(stored.watched_seconds(), 12.0);
    }

    #[tokio::test]
    async fn optional_lessons_do_not_count_towards_completion() {
        let service = service();
        let user = UserId::new("ana");
        let course = CourseId::new("2");

        let before = service.course_completion(&user, &course).await.unwrap();
        assert_eq!(before.required_lessons, 1);
        assert_eq!(before.percent(), 0);

        let location = service.locate(&course, &LessonId::new("2-1-1")).unwrap();
        service
            .record_progress(&user, &completed(location))
            .await
            .unwrap();

        let after = service.course_completion(&user, &course).await.unwrap();
        assert!(after.is_complete());
        assert_eq!(after.percent(), 100);
    }
}
