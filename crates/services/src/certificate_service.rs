use std::sync::Arc;

use chrono::Duration;
use ead_core::model::{
    Certificate, CertificateId, CourseId, LessonId, MAX_SCORE, ModuleId, Notification,
    NotificationDraft, NotificationId, NotificationKind, UserId,
};
use storage::repository::{
    CertificateRepository, ExamAttemptRepository, NotificationRepository, StorageError,
};
use tracing::info;

use crate::Clock;
use crate::error::CertificateServiceError;
use crate::progress_service::ProgressService;

/// Result of asking for a course certificate.
#[derive(Debug, Clone, PartialEq)]
pub enum CertificateOutcome {
    Issued(Certificate),
    AlreadyIssued(Certificate),
    NotEligible {
        missing_lessons: Vec<LessonId>,
        failed_exams: Vec<ModuleId>,
    },
}

/// Issues course certificates once a learner has finished everything.
#[derive(Clone)]
pub struct CertificateService {
    clock: Clock,
    progress: ProgressService,
    attempts: Arc<dyn ExamAttemptRepository>,
    certificates: Arc<dyn CertificateRepository>,
    notifications: Arc<dyn NotificationRepository>,
    validity: Option<Duration>,
}

impl CertificateService {
    #[must_use]
    pub fn new(
        clock: Clock,
        progress: ProgressService,
        attempts: Arc<dyn ExamAttemptRepository>,
        certificates: Arc<dyn CertificateRepository>,
        notifications: Arc<dyn NotificationRepository>,
    ) -> Self {
        Self {
            clock,
            progress,
            attempts,
            certificates,
            notifications,
            validity: None,
        }
    }

    /// Certificates expire `validity` after completion. Default: never.
    #[must_use]
    pub fn with_validity(mut self, validity: Duration) -> Self {
        self.validity = Some(validity);
        self
    }

    /// Issue the certificate for `course` if every required lesson is
    /// watched and every required exam is passed by its best attempt.
    ///
    /// The grade is the mean of the best exam scores, or the maximum score
    /// for a course without exams. At most one certificate exists per
    /// learner and course.
    ///
    /// # Errors
    ///
    /// Returns `CertificateServiceError::UnknownCourse`, `Certificate` for a
    /// blank learner name, or `Storage`.
    pub async fn issue_if_eligible(
        &self,
        user: &UserId,
        user_name: &str,
        course: &CourseId,
    ) -> Result<CertificateOutcome, CertificateServiceError> {
        if let Some(existing) = self.certificates.get_certificate(user, course).await? {
            return Ok(CertificateOutcome::AlreadyIssued(existing));
        }
        let course_entry = self
            .progress
            .catalog()
            .course(course)
            .ok_or_else(|| CertificateServiceError::UnknownCourse(course.clone()))?;

        let mut missing_lessons = Vec::new();
        for (_, lesson) in course_entry.required_lessons() {
            if !self
                .progress
                .is_lesson_completed(user, course, &lesson.id)
                .await?
            {
                missing_lessons.push(lesson.id.clone());
            }
        }

        let attempts = self.attempts.list_attempts(user, course).await?;
        let mut failed_exams = Vec::new();
        let mut best_scores = Vec::new();
        for (module, exam) in course_entry.required_exams() {
            let best = attempts
                .iter()
                .filter(|a| a.module_id == module.id && &a.exam_id == exam.id())
                .map(|a| a.score)
                .reduce(f64::max);
            match best {
                Some(score) if score >= exam.min_score() => best_scores.push(score),
                _ => failed_exams.push(module.id.clone()),
            }
        }

        if !missing_lessons.is_empty() || !failed_exams.is_empty() {
            return Ok(CertificateOutcome::NotEligible {
                missing_lessons,
                failed_exams,
            });
        }

        let grade = mean(&best_scores).unwrap_or(MAX_SCORE);
        let now = self.clock.now();
        let certificate = Certificate::issue(
            CertificateId::generate(),
            user.clone(),
            user_name,
            course_entry,
            grade,
            now,
            self.validity,
        )?;

        match self.certificates.insert_certificate(&certificate).await {
            Ok(()) => {}
            Err(StorageError::Conflict) => {
                if let Some(existing) = self.certificates.get_certificate(user, course).await? {
                    return Ok(CertificateOutcome::AlreadyIssued(existing));
                }
                return Err(StorageError::Conflict.into());
            }
            Err(err) => return Err(err.into()),
        }
        info!(user = %user, course = %course, grade, "certificate issued");

        let draft = NotificationDraft::new(
            NotificationKind::CourseCompleted,
            "Curso concluído!",
            format!(
                "Parabéns! Você concluiu o curso \"{}\".",
                certificate.course_title()
            ),
        )
        .with_link(format!("/certificates/{}", certificate.id()))
        .with_metadata("course_id", course.as_str());
        let notification = Notification::new(NotificationId::generate(), draft, now)?;
        self.notifications
            .upsert_notification(user, &notification)
            .await?;

        Ok(CertificateOutcome::Issued(certificate))
    }

    /// The learner's certificates, newest first.
    ///
    /// # Errors
    ///
    /// Returns `CertificateServiceError::Storage` if the lookup fails.
    pub async fn list(&self, user: &UserId) -> Result<Vec<Certificate>, CertificateServiceError> {
        Ok(self.certificates.list_certificates(user).await?)
    }
}

#[allow(clippy::cast_precision_loss)]
fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    use ead_core::model::LessonProgress;
    use ead_core::time::fixed_now;
    use storage::repository::InMemoryRepository;

    use crate::catalog::demo_catalog;
    use crate::exam_service::ExamService;

    struct Fixture {
        certificates: CertificateService,
        exams: ExamService,
        progress: ProgressService,
        repo: Arc<InMemoryRepository>,
    }

    fn fixture() -> Fixture {
        let repo = Arc::new(InMemoryRepository::new());
        let clock = Clock::fixed(fixed_now());
        let progress = ProgressService::new(clock, Arc::new(demo_catalog().unwrap()), repo.clone());
        Fixture {
            certificates: CertificateService::new(
                clock,
                progress.clone(),
                repo.clone(),
                repo.clone(),
                repo.clone(),
            ),
            exams: ExamService::new(clock, progress.clone(), repo.clone(), repo.clone()),
            progress,
            repo,
        }
    }

    async fn watch(f: &Fixture, user: &UserId, course: &str, lesson: &str) {
        let location = f
            .progress
            .locate(&CourseId::new(course), &LessonId::new(lesson))
            .unwrap();
        let done =
            LessonProgress::from_persisted(location, 60.0, Some(60.0), true, fixed_now()).unwrap();
        f.progress.record_progress(user, &done).await.unwrap();
    }

    async fn take_exam(f: &Fixture, user: &UserId, module: &str, answers: [usize; 2]) {
        let (course, module) = (CourseId::new("1"), ModuleId::new(module));
        let mut attempt = f.exams.open_exam(user, &course, &module).await.unwrap();
        for (question, option) in answers.into_iter().enumerate() {
            attempt.select_option(question, option).unwrap();
        }
        f.exams
            .submit(user, &course, &module, &mut attempt)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn course_without_exams_grades_full_marks() {
        let f = fixture();
        let user = UserId::new("ana");
        let course = CourseId::new("2");

        let outcome = f
            .certificates
            .issue_if_eligible(&user, "Ana Lima", &course)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            CertificateOutcome::NotEligible {
                missing_lessons: vec![LessonId::new("2-1-1")],
                failed_exams: vec![],
            }
        );

        watch(&f, &user, "2", "2-1-1").await;
        let CertificateOutcome::Issued(cert) = f
            .certificates
            .issue_if_eligible(&user, "Ana Lima", &course)
            .await
            .unwrap()
        else {
            panic!("expected a new certificate");
        };
        assert_eq!(cert.grade(), 10.0);
        assert_eq!(cert.instructor_name(), "Carla Mendes");

        let again = f
            .certificates
            .issue_if_eligible(&user, "Ana Lima", &course)
            .await
            .unwrap();
        assert_eq!(again, CertificateOutcome::AlreadyIssued(cert));

        let inbox = f.repo.list_notifications(&user).await.unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].kind(), NotificationKind::CourseCompleted);
    }

    #[tokio::test]
    async fn grade_averages_best_exam_scores() {
        let f = fixture();
        let user = UserId::new("ana");
        for lesson in ["1-1-1", "1-1-2", "1-2-1"] {
            watch(&f, &user, "1", lesson).await;
        }

        // module 1-1: 5.0 then 10.0; module 1-2: 5.0 only
        take_exam(&f, &user, "1-1", [1, 3]).await;
        take_exam(&f, &user, "1-1", [1, 0]).await;
        take_exam(&f, &user, "1-2", [1, 1]).await;

        let outcome = f
            .certificates
            .issue_if_eligible(&user, "Ana Lima", &CourseId::new("1"))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            CertificateOutcome::NotEligible {
                missing_lessons: vec![],
                failed_exams: vec![ModuleId::new("1-2")],
            }
        );

        take_exam(&f, &user, "1-2", [1, 0]).await;
        let CertificateOutcome::Issued(cert) = f
            .certificates
            .issue_if_eligible(&user, "Ana Lima", &CourseId::new("1"))
            .await
            .unwrap()
        else {
            panic!("expected a new certificate");
        };
        assert_eq!(cert.grade(), 10.0);
        assert_eq!(cert.duration_hours(), 40);
        assert_eq!(f.certificates.list(&user).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn blank_learner_name_is_rejected() {
        let f = fixture();
        let user = UserId::new("ana");
        watch(&f, &user, "2", "2-1-1").await;
        let err = f
            .certificates
            .issue_if_eligible(&user, "  ", &CourseId::new("2"))
            .await
            .unwrap_err();
        assert!(matches!(err, CertificateServiceError::Certificate(_)));
    }

    #[test]
    fn mean_of_nothing_is_undefined() {
        assert_eq!(mean(&[]), None);
        assert_eq!(mean(&[7.0, 9.0]), Some(8.0));
    }
}
