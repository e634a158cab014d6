#![forbid(unsafe_code)]

pub mod repository;
pub mod sqlite;

pub use repository::{
    CertificateRepository, ExamAttemptRecord, ExamAttemptRepository, GroupRepository,
    InMemoryRepository, LessonProgressRepository, NotificationRepository, Storage, StorageError,
};
pub use sqlite::{SqliteInitError, SqliteRepository};
