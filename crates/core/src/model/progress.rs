use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::catalog::LessonLocation;

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum ProgressError {
    #[error("watched seconds must be finite and >= 0, got {0}")]
    InvalidWatchedSeconds(f64),

    #[error("duration must be finite and > 0, got {0}")]
    InvalidDuration(f64),
}

/// Watch state of one lesson for one learner.
#[derive(Debug, Clone, PartialEq)]
pub struct LessonProgress {
    location: LessonLocation,
    watched_seconds: f64,
    duration_seconds: Option<f64>,
    completed: bool,
    updated_at: DateTime<Utc>,
}

impl LessonProgress {
    /// Fresh, unwatched progress for a lesson view that just mounted.
    #[must_use]
    pub fn new(location: LessonLocation, updated_at: DateTime<Utc>) -> Self {
        Self {
            location,
            watched_seconds: 0.0,
            duration_seconds: None,
            completed: false,
            updated_at,
        }
    }

    /// Rehydrate progress from storage.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError` if the stored numbers are negative or not finite.
    pub fn from_persisted(
        location: LessonLocation,
        watched_seconds: f64,
        duration_seconds: Option<f64>,
        completed: bool,
        updated_at: DateTime<Utc>,
    ) -> Result<Self, ProgressError> {
        if !watched_seconds.is_finite() || watched_seconds < 0.0 {
            return Err(ProgressError::InvalidWatchedSeconds(watched_seconds));
        }
        if let Some(d) = duration_seconds
            && (!d.is_finite() || d <= 0.0)
        {
            return Err(ProgressError::InvalidDuration(d));
        }
        Ok(Self {
            location,
            watched_seconds,
            duration_seconds,
            completed,
            updated_at,
        })
    }

    #[must_use]
    pub fn location(&self) -> &LessonLocation {
        &self.location
    }

    /// Last confirmed playback position.
    #[must_use]
    pub fn watched_seconds(&self) -> f64 {
        self.watched_seconds
    }

    #[must_use]
    pub fn duration_seconds(&self) -> Option<f64> {
        self.duration_seconds
    }

    /// `watched / duration * 100`, capped at 100. `None` while the duration is unknown.
    #[must_use]
    pub fn watched_percent(&self) -> Option<f64> {
        let duration = self.duration_seconds?;
        Some((self.watched_seconds * 100.0 / duration).min(100.0))
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.completed
    }

    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub(crate) fn set_watched_seconds(&mut self, seconds: f64) {
        self.watched_seconds = seconds;
    }

    /// Zero and non-finite durations are treated as unknown.
    pub(crate) fn set_duration(&mut self, duration: Option<f64>) {
        if let Some(d) = duration.filter(|d| d.is_finite() && *d > 0.0) {
            self.duration_seconds = Some(d);
        }
    }

    pub(crate) fn mark_completed(&mut self) {
        self.completed = true;
    }

    /// Stamp the progress with the time it is handed to persistence.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ids::{CourseId, LessonId, ModuleId};
    use crate::time::fixed_now;

    fn location() -> LessonLocation {
        LessonLocation::new(CourseId::new("1"), ModuleId::new("1-1"), LessonId::new("1-1-1"))
    }

    #[test]
    fn percent_is_undefined_without_duration() {
        let mut p = LessonProgress::new(location(), fixed_now());
        p.set_watched_seconds(30.0);
        assert_eq!(p.watched_percent(), None);

        p.set_duration(Some(0.0));
        assert_eq!(p.watched_percent(), None);

        p.set_duration(Some(120.0));
        assert_eq!(p.watched_percent(), Some(25.0));
    }

    #[test]
    fn percent_is_capped() {
        let p = LessonProgress::from_persisted(location(), 130.0, Some(120.0), true, fixed_now())
            .unwrap();
        assert_eq!(p.watched_percent(), Some(100.0));
    }

    #[test]
    fn from_persisted_rejects_negative_position() {
        let err =
            LessonProgress::from_persisted(location(), -1.0, None, false, fixed_now()).unwrap_err();
        assert_eq!(err, ProgressError::InvalidWatchedSeconds(-1.0));
    }
}
