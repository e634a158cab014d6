use std::sync::Arc;

use ead_core::model::{Catalog, CourseId, LessonId, UserId};
use ead_core::playback::TrackerSettings;
use storage::repository::Storage;

use crate::Clock;
use crate::catalog::load_or_demo;
use crate::certificate_service::CertificateService;
use crate::config::PortalConfig;
use crate::error::{NotificationServiceError, PlaybackError, PortalServicesError};
use crate::exam_service::ExamService;
use crate::group_service::GroupService;
use crate::notification_service::NotificationService;
use crate::playback::{LessonPlaybackSession, Navigator, VideoPlayer};
use crate::progress_service::ProgressService;

/// Assembles the portal services over one storage backend and catalog.
#[derive(Clone)]
pub struct PortalServices {
    clock: Clock,
    catalog: Arc<Catalog>,
    tracker: TrackerSettings,
    storage: Storage,
    progress: Arc<ProgressService>,
    exams: Arc<ExamService>,
    groups: Arc<GroupService>,
    certificates: Arc<CertificateService>,
}

impl PortalServices {
    /// Build services backed by `SQLite` storage, using the catalog and
    /// tracker settings from `config`.
    ///
    /// # Errors
    ///
    /// Returns `PortalServicesError` if the catalog cannot be loaded or
    /// storage initialization fails.
    pub async fn new_sqlite(config: &PortalConfig, clock: Clock) -> Result<Self, PortalServicesError> {
        let catalog = load_or_demo(config.catalog_path.as_deref())?;
        let storage = Storage::sqlite(&config.db_url).await?;
        Ok(Self::from_parts(storage, catalog, config.tracker, clock))
    }

    /// Services over in-memory repositories.
    #[must_use]
    pub fn in_memory(catalog: Catalog, clock: Clock) -> Self {
        Self::from_parts(
            Storage::in_memory(),
            catalog,
            TrackerSettings::default_for_training(),
            clock,
        )
    }

    #[must_use]
    pub fn from_parts(
        storage: Storage,
        catalog: Catalog,
        tracker: TrackerSettings,
        clock: Clock,
    ) -> Self {
        let catalog = Arc::new(catalog);
        let progress = ProgressService::new(
            clock,
            Arc::clone(&catalog),
            Arc::clone(&storage.progress),
        );
        let exams = ExamService::new(
            clock,
            progress.clone(),
            Arc::clone(&storage.exam_attempts),
            Arc::clone(&storage.notifications),
        );
        let groups = GroupService::new(clock, Arc::clone(&catalog), Arc::clone(&storage.groups));
        let certificates = CertificateService::new(
            clock,
            progress.clone(),
            Arc::clone(&storage.exam_attempts),
            Arc::clone(&storage.certificates),
            Arc::clone(&storage.notifications),
        );

        Self {
            clock,
            catalog,
            tracker,
            storage,
            progress: Arc::new(progress),
            exams: Arc::new(exams),
            groups: Arc::new(groups),
            certificates: Arc::new(certificates),
        }
    }

    #[must_use]
    pub fn catalog(&self) -> Arc<Catalog> {
        Arc::clone(&self.catalog)
    }

    #[must_use]
    pub fn tracker_settings(&self) -> TrackerSettings {
        self.tracker
    }

    #[must_use]
    pub fn progress(&self) -> Arc<ProgressService> {
        Arc::clone(&self.progress)
    }

    #[must_use]
    pub fn exams(&self) -> Arc<ExamService> {
        Arc::clone(&self.exams)
    }

    #[must_use]
    pub fn groups(&self) -> Arc<GroupService> {
        Arc::clone(&self.groups)
    }

    #[must_use]
    pub fn certificates(&self) -> Arc<CertificateService> {
        Arc::clone(&self.certificates)
    }

    /// Load the inbox of `user`.
    ///
    /// # Errors
    ///
    /// Returns `NotificationServiceError::Storage` if loading fails.
    pub async fn notifications(
        &self,
        user: UserId,
    ) -> Result<NotificationService, NotificationServiceError> {
        NotificationService::load(self.clock, user, Arc::clone(&self.storage.notifications)).await
    }

    /// Start a playback session for `lesson` with the configured tracker settings.
    ///
    /// # Errors
    ///
    /// Returns `PlaybackError::Progress` for unknown lessons or storage failures.
    pub async fn open_lesson(
        &self,
        user: UserId,
        course: &CourseId,
        lesson: &LessonId,
        player: Arc<dyn VideoPlayer>,
        navigator: Arc<dyn Navigator>,
    ) -> Result<LessonPlaybackSession, PlaybackError> {
        LessonPlaybackSession::open(
            &self.progress,
            user,
            course,
            lesson,
            self.tracker,
            player,
            navigator,
        )
        .await
    }
}
