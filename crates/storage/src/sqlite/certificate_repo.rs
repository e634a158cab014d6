use ead_core::model::{Certificate, CourseId, UserId};

use super::SqliteRepository;
use super::mapping::{conn, map_certificate_row};
use crate::repository::{CertificateRepository, StorageError};

const COLUMNS: &str = "id, user_id, course_id, completion_date, grade, duration_minutes, valid_until, course_title, user_name, instructor_name";

#[async_trait::async_trait]
impl CertificateRepository for SqliteRepository {
    async fn insert_certificate(&self, certificate: &Certificate) -> Result<(), StorageError> {
        let res = sqlx::query(
            r"
            INSERT INTO certificates (id, user_id, course_id, completion_date, grade, duration_minutes, valid_until, course_title, user_name, instructor_name)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ",
        )
        .bind(certificate.id().as_str())
        .bind(certificate.user_id().as_str())
        .bind(certificate.course_id().as_str())
        .bind(certificate.completion_date())
        .bind(certificate.grade())
        .bind(i64::from(certificate.duration_minutes()))
        .bind(certificate.valid_until())
        .bind(certificate.course_title())
        .bind(certificate.user_name())
        .bind(certificate.instructor_name())
        .execute(&self.pool)
        .await;

        match res {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(StorageError::Conflict)
            }
            Err(e) => Err(conn(e)),
        }
    }

    async fn get_certificate(
        &self,
        user: &UserId,
        course: &CourseId,
    ) -> Result<Option<Certificate>, StorageError> {
        let sql = format!("SELECT {COLUMNS} FROM certificates WHERE user_id = ?1 AND course_id = ?2");
        let row = sqlx::query(&sql)
            .bind(user.as_str())
            .bind(course.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;

        row.as_ref().map(map_certificate_row).transpose()
    }

    async fn list_certificates(&self, user: &UserId) -> Result<Vec<Certificate>, StorageError> {
        let sql = format!(
            "SELECT {COLUMNS} FROM certificates WHERE user_id = ?1 ORDER BY completion_date DESC"
        );
        let rows = sqlx::query(&sql)
            .bind(user.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?;

        rows.iter().map(map_certificate_row).collect()
    }
}
