#![forbid(unsafe_code)]

pub mod app_services;
pub mod catalog;
pub mod certificate_service;
pub mod config;
pub mod error;
pub mod exam_service;
pub mod group_service;
pub mod notification_service;
pub mod playback;
pub mod progress_service;

pub use ead_core::Clock;

pub use app_services::PortalServices;
pub use certificate_service::{CertificateOutcome, CertificateService};
pub use config::PortalConfig;
pub use error::{
    CatalogLoadError, CertificateServiceError, ConfigError, ExamServiceError, GroupServiceError,
    NotificationServiceError, PlaybackError, PortalServicesError, ProgressServiceError,
};
pub use exam_service::ExamService;
pub use group_service::{GroupEditor, GroupService};
pub use notification_service::NotificationService;
pub use progress_service::{CompletionRecorder, CourseCompletion, NoopRecorder, ProgressService};
