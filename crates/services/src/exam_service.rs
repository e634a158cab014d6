use std::sync::Arc;

use ead_core::model::{
    CourseId, Exam, ExamAttempt, MAX_SCORE, ModuleId, Notification, NotificationDraft,
    NotificationId, NotificationKind, UserId,
};
use storage::repository::{ExamAttemptRecord, ExamAttemptRepository, NotificationRepository};
use tracing::info;

use crate::Clock;
use crate::error::ExamServiceError;
use crate::playback::{NavigationRequest, Navigator};
use crate::progress_service::ProgressService;

/// Module exams: gating, submission and attempt history.
#[derive(Clone)]
pub struct ExamService {
    clock: Clock,
    progress: ProgressService,
    attempts: Arc<dyn ExamAttemptRepository>,
    notifications: Arc<dyn NotificationRepository>,
}

impl ExamService {
    #[must_use]
    pub fn new(
        clock: Clock,
        progress: ProgressService,
        attempts: Arc<dyn ExamAttemptRepository>,
        notifications: Arc<dyn NotificationRepository>,
    ) -> Self {
        Self {
            clock,
            progress,
            attempts,
            notifications,
        }
    }

    fn exam(&self, course: &CourseId, module: &ModuleId) -> Result<&Exam, ExamServiceError> {
        self.progress
            .catalog()
            .exam(course, module)
            .ok_or_else(|| ExamServiceError::UnknownExam {
                course: course.clone(),
                module: module.clone(),
            })
    }

    async fn ensure_unlocked(
        &self,
        user: &UserId,
        course: &CourseId,
        module: &ModuleId,
    ) -> Result<(), ExamServiceError> {
        let remaining = self
            .progress
            .remaining_lessons(user, course, module)
            .await?
            .len();
        if remaining > 0 {
            return Err(ExamServiceError::LessonsIncomplete { remaining });
        }
        Ok(())
    }

    /// Start a fresh attempt at the module exam.
    ///
    /// # Errors
    ///
    /// Returns `ExamServiceError::LessonsIncomplete` while lessons of the
    /// module are unwatched, `AttemptsExhausted` once `max_attempts` is used
    /// up, or `UnknownExam` if the module has no exam.
    pub async fn open_exam(
        &self,
        user: &UserId,
        course: &CourseId,
        module: &ModuleId,
    ) -> Result<ExamAttempt, ExamServiceError> {
        let exam = self.exam(course, module)?;
        self.ensure_unlocked(user, course, module).await?;

        if let Some(max) = exam.max_attempts() {
            let used = self.attempt_history(user, course, module).await?.len();
            if used >= max as usize {
                return Err(ExamServiceError::AttemptsExhausted { max });
            }
        }
        Ok(ExamAttempt::new(exam.clone(), self.clock.now()))
    }

    /// Submit `attempt` and persist the outcome.
    ///
    /// On an unanswered question the attempt stays open and nothing is
    /// stored. A perfect score also drops an achievement notification.
    ///
    /// # Errors
    ///
    /// Returns `ExamServiceError::Attempt` if the attempt cannot be submitted,
    /// `ExamMismatch` if it belongs to another module, or `Storage`.
    pub async fn submit(
        &self,
        user: &UserId,
        course: &CourseId,
        module: &ModuleId,
        attempt: &mut ExamAttempt,
    ) -> Result<ExamAttemptRecord, ExamServiceError> {
        if self.exam(course, module)?.id() != attempt.exam().id() {
            return Err(ExamServiceError::ExamMismatch);
        }

        let result = attempt.submit(self.clock.now())?;
        let mut record =
            ExamAttemptRecord::from_result(user.clone(), course.clone(), module.clone(), &result);
        record.id = Some(self.attempts.append_attempt(&record).await?);

        info!(
            user = %user,
            exam = %result.exam_id,
            score = result.score,
            passed = result.passed,
            "exam submitted"
        );

        if result.score >= MAX_SCORE {
            let draft = NotificationDraft::new(
                NotificationKind::Achievement,
                "Nota máxima!",
                format!("Você gabaritou a avaliação \"{}\".", attempt.exam().title()),
            )
            .with_link(format!("/courses/{course}"))
            .with_metadata("exam_id", result.exam_id.as_str());
            let notification = Notification::new(NotificationId::generate(), draft, result.submitted_at)?;
            self.notifications
                .upsert_notification(user, &notification)
                .await?;
        }
        Ok(record)
    }

    /// Ask the router for the exam screen once the module is unlocked.
    ///
    /// # Errors
    ///
    /// Returns `ExamServiceError::LessonsIncomplete` or `UnknownExam`; no
    /// request is emitted in that case.
    pub async fn request_exam(
        &self,
        user: &UserId,
        course: &CourseId,
        module: &ModuleId,
        navigator: &dyn Navigator,
    ) -> Result<(), ExamServiceError> {
        self.exam(course, module)?;
        self.ensure_unlocked(user, course, module).await?;
        navigator.navigate(NavigationRequest::Exam {
            course_id: course.clone(),
            module_id: module.clone(),
        });
        Ok(())
    }

    /// Submitted attempts at the module exam, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `ExamServiceError::Storage` if the lookup fails.
    pub async fn attempt_history(
        &self,
        user: &UserId,
        course: &CourseId,
        module: &ModuleId,
    ) -> Result<Vec<ExamAttemptRecord>, ExamServiceError> {
        Ok(self
            .attempts
            .list_attempts(user, course)
            .await?
            .into_iter()
            .filter(|a| &a.module_id == module)
            .collect())
    }

    /// # Errors
    ///
    /// Returns `ExamServiceError::Storage` if the lookup fails.
    pub async fn best_score(
        &self,
        user: &UserId,
        course: &CourseId,
        module: &ModuleId,
    ) -> Result<Option<f64>, ExamServiceError> {
        Ok(self
            .attempt_history(user, course, module)
            .await?
            .iter()
            .map(|a| a.score)
            .reduce(f64::max))
    }

    /// Attempts left, or `None` when the exam is unlimited.
    ///
    /// # Errors
    ///
    /// Returns `ExamServiceError` for unknown exams or storage failures.
    pub async fn remaining_attempts(
        &self,
        user: &UserId,
        course: &CourseId,
        module: &ModuleId,
    ) -> Result<Option<u32>, ExamServiceError> {
        let Some(max) = self.exam(course, module)?.max_attempts() else {
            return Ok(None);
        };
        let used = self.attempt_history(user, course, module).await?.len();
        let used = u32::try_from(used).unwrap_or(u32::MAX);
        Ok(Some(max.saturating_sub(used)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use ead_core::model::{LessonId, LessonProgress};
    use ead_core::time::fixed_now;
    use storage::repository::InMemoryRepository;

    use crate::catalog::demo_catalog;
    use crate::playback::ChannelNavigator;

    struct Fixture {
        exams: ExamService,
        progress: ProgressService,
        repo: Arc<InMemoryRepository>,
    }

    fn fixture() -> Fixture {
        let repo = Arc::new(InMemoryRepository::new());
        let clock = Clock::fixed(fixed_now());
        let progress = ProgressService::new(clock, Arc::new(demo_catalog().unwrap()), repo.clone());
        let exams = ExamService::new(clock, progress.clone(), repo.clone(), repo.clone());
        Fixture {
            exams,
            progress,
            repo,
        }
    }

    async fn finish_module_one(f: &Fixture, user: &UserId) {
        for lesson in ["1-1-1", "1-1-2"] {
            let location = f
                .progress
                .locate(&CourseId::new("1"), &LessonId::new(lesson))
                .unwrap();
            let done = LessonProgress::from_persisted(location, 10.0, Some(10.0), true, fixed_now())
                .unwrap();
            f.progress.record_progress(user, &done).await.unwrap();
        }
    }

    #[tokio::test]
    async fn exam_is_locked_until_lessons_are_watched() {
        let f = fixture();
        let user = UserId::new("ana");
        let (course, module) = (CourseId::new("1"), ModuleId::new("1-1"));
        let (navigator, mut rx) = ChannelNavigator::new();

        let err = f.exams.open_exam(&user, &course, &module).await.unwrap_err();
        assert!(matches!(
            err,
            ExamServiceError::LessonsIncomplete { remaining: 2 }
        ));
        assert!(
            f.exams
                .request_exam(&user, &course, &module, &navigator)
                .await
                .is_err()
        );
        assert!(rx.try_recv().is_err());

        finish_module_one(&f, &user).await;
        f.exams
            .request_exam(&user, &course, &module, &navigator)
            .await
            .unwrap();
        assert_eq!(
            rx.try_recv().unwrap(),
            NavigationRequest::Exam {
                course_id: course,
                module_id: module,
            }
        );
    }

    #[tokio::test]
    async fn module_without_exam_is_reported() {
        let f = fixture();
        let err = f
            .exams
            .open_exam(&UserId::new("ana"), &CourseId::new("2"), &ModuleId::new("2-1"))
            .await
            .unwrap_err();
        assert!(matches!(err, ExamServiceError::UnknownExam { .. }));
    }

    #[tokio::test]
    async fn failed_attempts_count_towards_the_limit() {
        let f = fixture();
        let user = UserId::new("ana");
        let (course, module) = (CourseId::new("1"), ModuleId::new("1-1"));
        finish_module_one(&f, &user).await;

        for _ in 0..3 {
            let mut attempt = f.exams.open_exam(&user, &course, &module).await.unwrap();
            attempt.select_option(0, 1).unwrap();
            attempt.select_option(1, 3).unwrap();
            let record = f
                .exams
                .submit(&user, &course, &module, &mut attempt)
                .await
                .unwrap();
            assert_eq!(record.score, 5.0);
            assert!(!record.passed);
        }

        assert_eq!(
            f.exams
                .remaining_attempts(&user, &course, &module)
                .await
                .unwrap(),
            Some(0)
        );
        let err = f.exams.open_exam(&user, &course, &module).await.unwrap_err();
        assert!(matches!(err, ExamServiceError::AttemptsExhausted { max: 3 }));
    }

    #[tokio::test]
    async fn unanswered_submission_stores_nothing() {
        let f = fixture();
        let user = UserId::new("ana");
        let (course, module) = (CourseId::new("1"), ModuleId::new("1-1"));
        finish_module_one(&f, &user).await;

        let mut attempt = f.exams.open_exam(&user, &course, &module).await.unwrap();
        attempt.select_option(0, 1).unwrap();
        let err = f
            .exams
            .submit(&user, &course, &module, &mut attempt)
            .await
            .unwrap_err();
        assert!(matches!(err, ExamServiceError::Attempt(_)));
        assert!(!attempt.is_submitted());
        assert!(
            f.exams
                .attempt_history(&user, &course, &module)
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn perfect_score_earns_an_achievement() {
        let f = fixture();
        let user = UserId::new("ana");
        let (course, module) = (CourseId::new("1"), ModuleId::new("1-1"));
        finish_module_one(&f, &user).await;

        let mut attempt = f.exams.open_exam(&user, &course, &module).await.unwrap();
        attempt.select_option(0, 1).unwrap();
        attempt.select_option(1, 0).unwrap();
        let record = f
            .exams
            .submit(&user, &course, &module, &mut attempt)
            .await
            .unwrap();
        assert_eq!(record.score, 10.0);
        assert!(record.passed);
        assert!(record.id.is_some());

        assert_eq!(
            f.exams.best_score(&user, &course, &module).await.unwrap(),
            Some(10.0)
        );
        let inbox = f.repo.list_notifications(&user).await.unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].kind(), NotificationKind::Achievement);
    }

    #[tokio::test]
    async fn attempt_from_another_module_is_rejected() {
        let f = fixture();
        let user = UserId::new("ana");
        finish_module_one(&f, &user).await;

        let mut attempt = f
            .exams
            .open_exam(&user, &CourseId::new("1"), &ModuleId::new("1-1"))
            .await
            .unwrap();
        let err = f
            .exams
            .submit(&user, &CourseId::new("1"), &ModuleId::new("1-2"), &mut attempt)
            .await
            .unwrap_err();
        assert!(matches!(err, ExamServiceError::ExamMismatch));
    }
}
