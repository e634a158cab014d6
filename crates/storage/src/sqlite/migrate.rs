use chrono::Utc;
use sqlx::SqlitePool;
use tracing::info;

use super::SqliteInitError;

const SCHEMA_V1: &[&str] = &[
    r"
        CREATE TABLE IF NOT EXISTS lesson_progress (
            user_id TEXT NOT NULL,
            course_id TEXT NOT NULL,
            module_id TEXT NOT NULL,
            lesson_id TEXT NOT NULL,
            watched_seconds REAL NOT NULL CHECK (watched_seconds >= 0),
            duration_seconds REAL CHECK (duration_seconds IS NULL OR duration_seconds > 0),
            completed INTEGER NOT NULL CHECK (completed IN (0, 1)),
            updated_at TEXT NOT NULL,
            PRIMARY KEY (user_id, course_id, lesson_id)
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS exam_attempts (
            id INTEGER PRIMARY KEY,
            user_id TEXT NOT NULL,
            course_id TEXT NOT NULL,
            module_id TEXT NOT NULL,
            exam_id TEXT NOT NULL,
            score REAL NOT NULL CHECK (score BETWEEN 0 AND 10),
            passed INTEGER NOT NULL CHECK (passed IN (0, 1)),
            correct INTEGER NOT NULL CHECK (correct >= 0),
            total INTEGER NOT NULL CHECK (total > 0),
            submitted_at TEXT NOT NULL
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS learner_groups (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            description TEXT NOT NULL,
            features TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS group_access (
            group_id TEXT NOT NULL,
            kind TEXT NOT NULL CHECK (kind IN ('course', 'module', 'lesson')),
            target_id TEXT NOT NULL,
            selected INTEGER NOT NULL CHECK (selected IN (0, 1)),
            PRIMARY KEY (group_id, kind, target_id),
            FOREIGN KEY (group_id) REFERENCES learner_groups(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS notifications (
            id TEXT NOT NULL,
            user_id TEXT NOT NULL,
            kind TEXT NOT NULL,
            title TEXT NOT NULL,
            message TEXT NOT NULL,
            link TEXT,
            read INTEGER NOT NULL CHECK (read IN (0, 1)),
            created_at TEXT NOT NULL,
            metadata TEXT NOT NULL,
            PRIMARY KEY (user_id, id)
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS certificates (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            course_id TEXT NOT NULL,
            completion_date TEXT NOT NULL,
            grade REAL NOT NULL CHECK (grade BETWEEN 0 AND 10),
            duration_minutes INTEGER NOT NULL CHECK (duration_minutes >= 0),
            valid_until TEXT,
            course_title TEXT NOT NULL,
            user_name TEXT NOT NULL,
            instructor_name TEXT NOT NULL,
            UNIQUE (user_id, course_id)
        );
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_exam_attempts_user_course
            ON exam_attempts (user_id, course_id, submitted_at);
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_notifications_user_created
            ON notifications (user_id, created_at);
    ",
];

/// Runs a single, consolidated migration for the current schema.
///
/// Creates lesson progress, exam attempts, groups with their access rows,
/// notifications and certificates.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    // Version 1: full schema.
    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        for statement in SCHEMA_V1 {
            sqlx::query(*statement).execute(&mut *tx).await?;
        }

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(1_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        info!(version = 1, "applied schema migration");
    }

    Ok(())
}
