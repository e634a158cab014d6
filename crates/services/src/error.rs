//! Shared error types for the services crate.

use std::path::PathBuf;

use thiserror::Error;

use ead_core::model::{
    AttemptError, CatalogError, CertificateError, CourseId, GroupError, GroupId, LessonId,
    ModuleId, NotificationError, NotificationId,
};
use ead_core::playback::TrackerSettingsError;
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by `ProgressService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressServiceError {
    #[error("unknown course: {0}")]
    UnknownCourse(CourseId),
    #[error("unknown module {module} in course {course}")]
    UnknownModule { course: CourseId, module: ModuleId },
    #[error("unknown lesson {lesson} in course {course}")]
    UnknownLesson { course: CourseId, lesson: LessonId },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `ExamService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ExamServiceError {
    #[error("module {module} of course {course} has no exam")]
    UnknownExam { course: CourseId, module: ModuleId },
    #[error("{remaining} lesson(s) of the module are not completed yet")]
    LessonsIncomplete { remaining: usize },
    #[error("all {max} attempts have been used")]
    AttemptsExhausted { max: u32 },
    #[error("attempt belongs to a different exam")]
    ExamMismatch,
    #[error(transparent)]
    Attempt(#[from] AttemptError),
    #[error(transparent)]
    Progress(#[from] ProgressServiceError),
    #[error(transparent)]
    Notification(#[from] NotificationError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `GroupService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GroupServiceError {
    #[error("group not found: {0}")]
    NotFound(GroupId),
    #[error("unknown course: {0}")]
    UnknownCourse(CourseId),
    #[error(transparent)]
    Group(#[from] GroupError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `NotificationService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum NotificationServiceError {
    #[error("notification not found: {0}")]
    NotFound(NotificationId),
    #[error(transparent)]
    Notification(#[from] NotificationError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `CertificateService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CertificateServiceError {
    #[error("unknown course: {0}")]
    UnknownCourse(CourseId),
    #[error(transparent)]
    Certificate(#[from] CertificateError),
    #[error(transparent)]
    Notification(#[from] NotificationError),
    #[error(transparent)]
    Progress(#[from] ProgressServiceError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by a lesson playback session.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PlaybackError {
    #[error("playback session is closed")]
    SessionClosed,
    #[error(transparent)]
    Progress(#[from] ProgressServiceError),
}

/// Errors emitted while loading a catalog fixture.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CatalogLoadError {
    #[error("failed to read catalog {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid catalog JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// Errors emitted while reading configuration.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("{var} must be a number, got {raw:?}")]
    InvalidNumber { var: &'static str, raw: String },
    #[error(transparent)]
    Tracker(#[from] TrackerSettingsError),
}

/// Errors emitted while bootstrapping portal services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PortalServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Catalog(#[from] CatalogLoadError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}
