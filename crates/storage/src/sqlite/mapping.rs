use std::collections::{BTreeMap, BTreeSet};

use ead_core::model::{
    Certificate, CertificateId, CourseId, ExamId, Feature, LessonId, LessonLocation,
    LessonProgress, ModuleId, Notification, NotificationId, NotificationKind, UserId,
};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::repository::{ExamAttemptRecord, StorageError};

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn(e: sqlx::Error) -> StorageError {
    StorageError::Connection(e.to_string())
}

fn i64_to_u32(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} out of range: {v}")))
}

pub(crate) fn map_progress_row(row: &SqliteRow) -> Result<LessonProgress, StorageError> {
    let location = LessonLocation::new(
        CourseId::new(row.try_get::<String, _>("course_id").map_err(ser)?),
        ModuleId::new(row.try_get::<String, _>("module_id").map_err(ser)?),
        LessonId::new(row.try_get::<String, _>("lesson_id").map_err(ser)?),
    );
    LessonProgress::from_persisted(
        location,
        row.try_get("watched_seconds").map_err(ser)?,
        row.try_get("duration_seconds").map_err(ser)?,
        row.try_get::<i64, _>("completed").map_err(ser)? != 0,
        row.try_get("updated_at").map_err(ser)?,
    )
    .map_err(ser)
}

pub(crate) fn map_attempt_row(row: &SqliteRow) -> Result<ExamAttemptRecord, StorageError> {
    Ok(ExamAttemptRecord {
        id: Some(row.try_get("id").map_err(ser)?),
        user_id: UserId::new(row.try_get::<String, _>("user_id").map_err(ser)?),
        course_id: CourseId::new(row.try_get::<String, _>("course_id").map_err(ser)?),
        module_id: ModuleId::new(row.try_get::<String, _>("module_id").map_err(ser)?),
        exam_id: ExamId::new(row.try_get::<String, _>("exam_id").map_err(ser)?),
        score: row.try_get("score").map_err(ser)?,
        passed: row.try_get::<i64, _>("passed").map_err(ser)? != 0,
        correct: i64_to_u32("correct", row.try_get("correct").map_err(ser)?)?,
        total: i64_to_u32("total", row.try_get("total").map_err(ser)?)?,
        submitted_at: row.try_get("submitted_at").map_err(ser)?,
    })
}

/// Features are stored as a JSON array of names.
pub(crate) fn features_to_json(features: &BTreeSet<Feature>) -> Result<String, StorageError> {
    serde_json::to_string(features).map_err(ser)
}

pub(crate) fn features_from_json(raw: &str) -> Result<BTreeSet<Feature>, StorageError> {
    serde_json::from_str(raw).map_err(ser)
}

pub(crate) fn map_notification_row(row: &SqliteRow) -> Result<Notification, StorageError> {
    let kind: NotificationKind = row
        .try_get::<String, _>("kind")
        .map_err(ser)?
        .parse()
        .map_err(ser)?;
    let metadata: BTreeMap<String, String> =
        serde_json::from_str(&row.try_get::<String, _>("metadata").map_err(ser)?).map_err(ser)?;
    Ok(Notification::from_persisted(
        NotificationId::new(row.try_get::<String, _>("id").map_err(ser)?),
        kind,
        row.try_get("title").map_err(ser)?,
        row.try_get("message").map_err(ser)?,
        row.try_get("link").map_err(ser)?,
        row.try_get::<i64, _>("read").map_err(ser)? != 0,
        row.try_get("created_at").map_err(ser)?,
        metadata,
    ))
}

pub(crate) fn map_certificate_row(row: &SqliteRow) -> Result<Certificate, StorageError> {
    Certificate::from_persisted(
        CertificateId::new(row.try_get::<String, _>("id").map_err(ser)?),
        UserId::new(row.try_get::<String, _>("user_id").map_err(ser)?),
        CourseId::new(row.try_get::<String, _>("course_id").map_err(ser)?),
        row.try_get("completion_date").map_err(ser)?,
        row.try_get("grade").map_err(ser)?,
        i64_to_u32("duration_minutes", row.try_get("duration_minutes").map_err(ser)?)?,
        row.try_get("valid_until").map_err(ser)?,
        row.try_get("course_title").map_err(ser)?,
        row.try_get("user_name").map_err(ser)?,
        row.try_get("instructor_name").map_err(ser)?,
    )
    .map_err(ser)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn features_json_uses_snake_case_names() {
        let features = BTreeSet::from([Feature::News, Feature::Certificates]);
        let raw = features_to_json(&features).unwrap();
        assert_eq!(raw, r#"["certificates","news"]"#);
        assert_eq!(features_from_json(&raw).unwrap(), features);
    }

    #[test]
    fn unknown_feature_is_a_serialization_error() {
        assert!(matches!(
            features_from_json(r#"["chat"]"#),
            Err(StorageError::Serialization(_))
        ));
    }
}
