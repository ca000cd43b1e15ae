use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use course_core::model::{CourseId, CourseProgress, LessonId, User, UserId};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;
use tracing::debug;

use super::SqliteRepository;
use super::mapping::ser;
use crate::repository::{NewUserRecord, StorageError, UserRepository};

fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Unavailable(e.to_string())
}

impl SqliteRepository {
    async fn user_exists(&self, id: &UserId) -> Result<bool, StorageError> {
        let row = sqlx::query("SELECT 1 FROM users WHERE id = ?1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;
        Ok(row.is_some())
    }

    async fn require_user(&self, id: &UserId) -> Result<(), StorageError> {
        if self.user_exists(id).await? {
            Ok(())
        } else {
            Err(StorageError::NotFound)
        }
    }

    async fn completed_for(
        &self,
        user_id: &UserId,
        course_id: &CourseId,
    ) -> Result<Vec<LessonId>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT lesson_id FROM completed_lessons
            WHERE user_id = ?1 AND course_id = ?2
            ORDER BY id ASC
            ",
        )
        .bind(user_id.as_str())
        .bind(course_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut lessons = Vec::with_capacity(rows.len());
        for row in rows {
            lessons.push(LessonId::new(
                row.try_get::<String, _>("lesson_id").map_err(ser)?,
            ));
        }
        Ok(lessons)
    }
}

fn progress_from_row(
    row: &SqliteRow,
    completed: Vec<LessonId>,
) -> Result<CourseProgress, StorageError> {
    let last_accessed_lesson = row
        .try_get::<Option<String>, _>("last_accessed_lesson")
        .map_err(ser)?
        .map(LessonId::new);
    let last_accessed_at: Option<DateTime<Utc>> =
        row.try_get("last_accessed_at").map_err(ser)?;
    let enrolled_at: Option<DateTime<Utc>> = row.try_get("enrolled_at").map_err(ser)?;

    CourseProgress::from_persisted(completed, last_accessed_lesson, last_accessed_at, enrolled_at)
        .map_err(ser)
}

#[async_trait::async_trait]
impl UserRepository for SqliteRepository {
    async fn insert_user(&self, user: &NewUserRecord) -> Result<(), StorageError> {
        sqlx::query("INSERT INTO users (id, created_at) VALUES (?1, ?2)")
            .bind(user.id.as_str())
            .bind(user.created_at)
            .execute(&self.pool)
            .await
            .map_err(conn)?;
        Ok(())
    }

    async fn get_user(&self, id: &UserId) -> Result<Option<User>, StorageError> {
        let user_row = sqlx::query("SELECT id, created_at FROM users WHERE id = ?1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;
        let Some(user_row) = user_row else {
            return Ok(None);
        };
        let created_at: DateTime<Utc> = user_row.try_get("created_at").map_err(ser)?;

        let progress_rows = sqlx::query(
            r"
            SELECT course_id, enrolled, enrolled_at, last_accessed_lesson, last_accessed_at
            FROM course_progress
            WHERE user_id = ?1
            ORDER BY course_id ASC
            ",
        )
        .bind(id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut enrolled_courses = Vec::new();
        let mut progress = BTreeMap::new();
        for row in progress_rows {
            let course_id = CourseId::new(row.try_get::<String, _>("course_id").map_err(ser)?);
            let completed = self.completed_for(id, &course_id).await?;
            if row.try_get::<i64, _>("enrolled").map_err(ser)? != 0 {
                enrolled_courses.push(course_id.clone());
            }
            progress.insert(course_id, progress_from_row(&row, completed)?);
        }

        User::from_persisted(id.clone(), enrolled_courses, progress, created_at)
            .map(Some)
            .map_err(ser)
    }

    async fn get_progress(
        &self,
        user_id: &UserId,
        course_id: &CourseId,
    ) -> Result<Option<CourseProgress>, StorageError> {
        self.require_user(user_id).await?;

        let row = sqlx::query(
            r"
            SELECT enrolled_at, last_accessed_lesson, last_accessed_at
            FROM course_progress
            WHERE user_id = ?1 AND course_id = ?2
            ",
        )
        .bind(user_id.as_str())
        .bind(course_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        match row {
            Some(row) => {
                let completed = self.completed_for(user_id, course_id).await?;
                progress_from_row(&row, completed).map(Some)
            }
            None => Ok(None),
        }
    }

    async fn enroll(
        &self,
        user_id: &UserId,
        course_id: &CourseId,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        self.require_user(user_id).await?;

        let mut tx = self.pool.begin().await.map_err(conn)?;

        // The WHERE clause makes a repeat call change nothing. A first-time
        // enroll writes a fresh record, clearing last-accessed fields a
        // merge-write may have left behind.
        let res = sqlx::query(
            r"
            INSERT INTO course_progress (user_id, course_id, enrolled, enrolled_at, last_accessed_lesson, last_accessed_at)
            VALUES (?1, ?2, 1, ?3, NULL, NULL)
            ON CONFLICT(user_id, course_id) DO UPDATE SET
                enrolled = 1,
                enrolled_at = excluded.enrolled_at,
                last_accessed_lesson = NULL,
                last_accessed_at = NULL
            WHERE course_progress.enrolled = 0
            ",
        )
        .bind(user_id.as_str())
        .bind(course_id.as_str())
        .bind(at)
        .execute(&mut *tx)
        .await
        .map_err(conn)?;

        // Stray completions recorded before enrollment go with the entry
        // they belonged to.
        if res.rows_affected() == 1 {
            sqlx::query(
                "DELETE FROM completed_lessons WHERE user_id = ?1 AND course_id = ?2",
            )
            .bind(user_id.as_str())
            .bind(course_id.as_str())
            .execute(&mut *tx)
            .await
            .map_err(conn)?;
        }

        tx.commit().await.map_err(conn)?;

        debug!(user = %user_id, course = %course_id, "enrolled");
        Ok(())
    }

    async fn record_access(
        &self,
        user_id: &UserId,
        course_id: &CourseId,
        lesson_id: &LessonId,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        self.require_user(user_id).await?;

        sqlx::query(
            r"
            INSERT INTO course_progress (user_id, course_id, enrolled, last_accessed_lesson, last_accessed_at)
            VALUES (?1, ?2, 0, ?3, ?4)
            ON CONFLICT(user_id, course_id) DO UPDATE SET
                last_accessed_lesson = excluded.last_accessed_lesson,
                last_accessed_at = excluded.last_accessed_at
            ",
        )
        .bind(user_id.as_str())
        .bind(course_id.as_str())
        .bind(lesson_id.as_str())
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }

    async fn add_completed(
        &self,
        user_id: &UserId,
        course_id: &CourseId,
        lesson_id: &LessonId,
        at: DateTime<Utc>,
    ) -> Result<bool, StorageError> {
        self.require_user(user_id).await?;

        let mut tx = self.pool.begin().await.map_err(conn)?;

        // The unique index makes this a set-add: a duplicate completion
        // changes no rows instead of clobbering a concurrent writer.
        let res = sqlx::query(
            r"
            INSERT OR IGNORE INTO completed_lessons (user_id, course_id, lesson_id, completed_at)
            VALUES (?1, ?2, ?3, ?4)
            ",
        )
        .bind(user_id.as_str())
        .bind(course_id.as_str())
        .bind(lesson_id.as_str())
        .bind(at)
        .execute(&mut *tx)
        .await
        .map_err(conn)?;
        let added = res.rows_affected() == 1;

        // Only a new completion counts as an access; a duplicate leaves the
        // last-accessed fields exactly as they were.
        if added {
            sqlx::query(
                r"
                INSERT INTO course_progress (user_id, course_id, enrolled, last_accessed_lesson, last_accessed_at)
                VALUES (?1, ?2, 0, ?3, ?4)
                ON CONFLICT(user_id, course_id) DO UPDATE SET
                    last_accessed_lesson = excluded.last_accessed_lesson,
                    last_accessed_at = excluded.last_accessed_at
                ",
            )
            .bind(user_id.as_str())
            .bind(course_id.as_str())
            .bind(lesson_id.as_str())
            .bind(at)
            .execute(&mut *tx)
            .await
            .map_err(conn)?;
        }

        tx.commit().await.map_err(conn)?;

        debug!(user = %user_id, course = %course_id, lesson = %lesson_id, added, "lesson completion");
        Ok(added)
    }
}
