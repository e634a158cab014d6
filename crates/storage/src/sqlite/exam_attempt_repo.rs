use ead_core::model::{CourseId, UserId};

use super::SqliteRepository;
use super::mapping::{conn, map_attempt_row};
use crate::repository::{ExamAttemptRecord, ExamAttemptRepository, StorageError};

#[async_trait::async_trait]
impl ExamAttemptRepository for SqliteRepository {
    async fn append_attempt(&self, attempt: &ExamAttemptRecord) -> Result<i64, StorageError> {
        let res = sqlx::query(
            r"
            INSERT INTO exam_attempts (user_id, course_id, module_id, exam_id, score, passed, correct, total, submitted_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ",
        )
        .bind(attempt.user_id.as_str())
        .bind(attempt.course_id.as_str())
        .bind(attempt.module_id.as_str())
        .bind(attempt.exam_id.as_str())
        .bind(attempt.score)
        .bind(i64::from(attempt.passed))
        .bind(i64::from(attempt.correct))
        .bind(i64::from(attempt.total))
        .bind(attempt.submitted_at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(res.last_insert_rowid())
    }

    async fn list_attempts(
        &self,
        user: &UserId,
        course: &CourseId,
    ) -> Result<Vec<ExamAttemptRecord>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, user_id, course_id, module_id, exam_id, score, passed, correct, total, submitted_at
            FROM exam_attempts
            WHERE user_id = ?1 AND course_id = ?2
            ORDER BY submitted_at ASC, id ASC
            ",
        )
        .bind(user.as_str())
        .bind(course.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_attempt_row).collect()
    }
}
