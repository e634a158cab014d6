use ead_core::model::{CourseId, LessonId, LessonProgress, UserId};

use super::SqliteRepository;
use super::mapping::{conn, map_progress_row};
use crate::repository::{LessonProgressRepository, StorageError};

#[async_trait::async_trait]
impl LessonProgressRepository for SqliteRepository {
    async fn upsert_progress(
        &self,
        user: &UserId,
        progress: &LessonProgress,
    ) -> Result<(), StorageError> {
        let location = progress.location();
        sqlx::query(
            r"
            INSERT INTO lesson_progress (user_id, course_id, module_id, lesson_id, watched_seconds, duration_seconds, completed, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(user_id, course_id, lesson_id) DO UPDATE SET
                module_id = excluded.module_id,
                watched_seconds = excluded.watched_seconds,
                duration_seconds = excluded.duration_seconds,
                completed = excluded.completed,
                updated_at = excluded.updated_at
            ",
        )
        .bind(user.as_str())
        .bind(location.course_id.as_str())
        .bind(location.module_id.as_str())
        .bind(location.lesson_id.as_str())
        .bind(progress.watched_seconds())
        .bind(progress.duration_seconds())
        .bind(i64::from(progress.is_completed()))
        .bind(progress.updated_at())
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }

    async fn get_progress(
        &self,
        user: &UserId,
        course: &CourseId,
        lesson: &LessonId,
    ) -> Result<Option<LessonProgress>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT course_id, module_id, lesson_id, watched_seconds, duration_seconds, completed, updated_at
            FROM lesson_progress
            WHERE user_id = ?1 AND course_id = ?2 AND lesson_id = ?3
            ",
        )
        .bind(user.as_str())
        .bind(course.as_str())
        .bind(lesson.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(map_progress_row).transpose()
    }

    async fn list_course_progress(
        &self,
        user: &UserId,
        course: &CourseId,
    ) -> Result<Vec<LessonProgress>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT course_id, module_id, lesson_id, watched_seconds, duration_seconds, completed, updated_at
            FROM lesson_progress
            WHERE user_id = ?1 AND course_id = ?2
            ORDER BY lesson_id ASC
            ",
        )
        .bind(user.as_str())
        .bind(course.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_progress_row).collect()
    }
}
