use thiserror::Error;

use crate::model::{
    AttemptError, CatalogError, CertificateError, ExamError, GroupError, NotificationError,
    ParseIdError, ProgressError,
};
use crate::permissions::PermissionError;
use crate::playback::TrackerSettingsError;
use crate::validation::ValidationErrors;

/// Any domain error raised by this crate.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Exam(#[from] ExamError),
    #[error(transparent)]
    Attempt(#[from] AttemptError),
    #[error(transparent)]
    Progress(#[from] ProgressError),
    #[error(transparent)]
    Permission(#[from] PermissionError),
    #[error(transparent)]
    Group(#[from] GroupError),
    #[error(transparent)]
    Notification(#[from] NotificationError),
    #[error(transparent)]
    Certificate(#[from] CertificateError),
    #[error(transparent)]
    TrackerSettings(#[from] TrackerSettingsError),
    #[error(transparent)]
    Validation(#[from] ValidationErrors),
    #[error(transparent)]
    InvalidId(#[from] ParseIdError),
}
