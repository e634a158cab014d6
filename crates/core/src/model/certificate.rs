use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::catalog::Course;
use crate::model::exam::MAX_SCORE;
use crate::model::ids::{CertificateId, CourseId, UserId};

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum CertificateError {
    #[error("grade must be within 0..=10, got {0}")]
    InvalidGrade(f64),

    #[error("learner name cannot be empty")]
    EmptyUserName,

    #[error("valid_until precedes the completion date")]
    InvalidValidity,
}

/// Proof that a learner finished a course.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Certificate {
    id: CertificateId,
    user_id: UserId,
    course_id: CourseId,
    completion_date: DateTime<Utc>,
    grade: f64,
    duration_minutes: u32,
    valid_until: Option<DateTime<Utc>>,
    course_title: String,
    user_name: String,
    instructor_name: String,
}

impl Certificate {
    /// Issues a certificate for `course`, copying the course title,
    /// instructor and workload so later catalog edits do not change it.
    ///
    /// # Errors
    ///
    /// Returns `CertificateError` for a grade outside 0–10, a blank learner
    /// name, or a non-positive validity period.
    pub fn issue(
        id: CertificateId,
        user_id: UserId,
        user_name: &str,
        course: &Course,
        grade: f64,
        completion_date: DateTime<Utc>,
        validity: Option<Duration>,
    ) -> Result<Self, CertificateError> {
        let valid_until = validity.map(|v| completion_date + v);
        Self::from_persisted(
            id,
            user_id,
            course.id.clone(),
            completion_date,
            grade,
            course.duration_minutes,
            valid_until,
            course.title.clone(),
            user_name.trim().to_owned(),
            course.instructor.name.clone(),
        )
    }

    /// # Errors
    ///
    /// Same checks as [`Certificate::issue`].
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        id: CertificateId,
        user_id: UserId,
        course_id: CourseId,
        completion_date: DateTime<Utc>,
        grade: f64,
        duration_minutes: u32,
        valid_until: Option<DateTime<Utc>>,
        course_title: String,
        user_name: String,
        instructor_name: String,
    ) -> Result<Self, CertificateError> {
        if !grade.is_finite() || !(0.0..=MAX_SCORE).contains(&grade) {
            return Err(CertificateError::InvalidGrade(grade));
        }
        if user_name.trim().is_empty() {
            return Err(CertificateError::EmptyUserName);
        }
        if valid_until.is_some_and(|until| until <= completion_date) {
            return Err(CertificateError::InvalidValidity);
        }
        Ok(Self {
            id,
            user_id,
            course_id,
            completion_date,
            grade,
            duration_minutes,
            valid_until,
            course_title,
            user_name,
            instructor_name,
        })
    }

    #[must_use]
    pub fn id(&self) -> &CertificateId {
        &self.id
    }

    #[must_use]
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    #[must_use]
    pub fn course_id(&self) -> &CourseId {
        &self.course_id
    }

    #[must_use]
    pub fn completion_date(&self) -> DateTime<Utc> {
        self.completion_date
    }

    #[must_use]
    pub fn grade(&self) -> f64 {
        self.grade
    }

    #[must_use]
    pub fn duration_minutes(&self) -> u32 {
        self.duration_minutes
    }

    /// Workload in whole hours, rounded up.
    #[must_use]
    pub fn duration_hours(&self) -> u32 {
        self.duration_minutes.div_ceil(60)
    }

    #[must_use]
    pub fn valid_until(&self) -> Option<DateTime<Utc>> {
        self.valid_until
    }

    /// Certificates without an expiry never lapse.
    #[must_use]
    pub fn is_valid_at(&self, at: DateTime<Utc>) -> bool {
        self.valid_until.is_none_or(|until| at < until)
    }

    #[must_use]
    pub fn course_title(&self) -> &str {
        &self.course_title
    }

    #[must_use]
    pub fn user_name(&self) -> &str {
        &self.user_name
    }

    #[must_use]
    pub fn instructor_name(&self) -> &str {
        &self.instructor_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::catalog::tests::two_by_two_course;
    use crate::time::fixed_now;

    #[test]
    fn issue_copies_course_details() {
        let course = two_by_two_course();
        let cert = Certificate::issue(
            CertificateId::new("c1"),
            UserId::new("u1"),
            " Maria Lima ",
            &course,
            9.5,
            fixed_now(),
            Some(Duration::days(365)),
        )
        .unwrap();

        assert_eq!(cert.course_title(), "Course 1");
        assert_eq!(cert.instructor_name(), "Ana Souza");
        assert_eq!(cert.user_name(), "Maria Lima");
        assert_eq!(cert.duration_hours(), 3);
        assert!(cert.is_valid_at(fixed_now() + Duration::days(364)));
        assert!(!cert.is_valid_at(fixed_now() + Duration::days(365)));
    }

    #[test]
    fn grade_must_be_on_exam_scale() {
        let err = Certificate::issue(
            CertificateId::new("c1"),
            UserId::new("u1"),
            "Maria",
            &two_by_two_course(),
            10.5,
            fixed_now(),
            None,
        )
        .unwrap_err();
        assert_eq!(err, CertificateError::InvalidGrade(10.5));
    }

    #[test]
    fn zero_validity_is_rejected() {
        let err = Certificate::issue(
            CertificateId::new("c1"),
            UserId::new("u1"),
            "Maria",
            &two_by_two_course(),
            8.0,
            fixed_now(),
            Some(Duration::zero()),
        )
        .unwrap_err();
        assert_eq!(err, CertificateError::InvalidValidity);
    }
}
