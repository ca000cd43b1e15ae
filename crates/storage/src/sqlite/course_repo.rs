use course_core::model::{Course, CourseId, Lesson};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{map_course_row, map_lesson_row, ser};
use crate::repository::{CourseRecord, CourseRepository, LessonRecord, StorageError};

fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Unavailable(e.to_string())
}

impl SqliteRepository {
    async fn lessons_for(&self, course_id: &CourseId) -> Result<Vec<Lesson>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, course_id, title, description, content, video_url, duration, ord
            FROM lessons
            WHERE course_id = ?1
            ORDER BY ord ASC
            ",
        )
        .bind(course_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut lessons = Vec::with_capacity(rows.len());
        for row in rows {
            lessons.push(map_lesson_row(&row)?);
        }
        Ok(lessons)
    }
}

#[async_trait::async_trait]
impl CourseRepository for SqliteRepository {
    async fn upsert_course(&self, course: &CourseRecord) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO courses (id, title, description, level, instructor, image_url, duration, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                description = excluded.description,
                level = excluded.level,
                instructor = excluded.instructor,
                image_url = excluded.image_url,
                duration = excluded.duration,
                updated_at = excluded.updated_at
            ",
        )
        .bind(course.id.as_str())
        .bind(&course.title)
        .bind(&course.description)
        .bind(&course.level)
        .bind(&course.instructor)
        .bind(&course.image_url)
        .bind(&course.duration)
        .bind(course.created_at)
        .bind(course.updated_at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }

    async fn upsert_lesson(&self, lesson: &LessonRecord) -> Result<(), StorageError> {
        let order = i64::from(lesson.order);
        sqlx::query(
            r"
            INSERT INTO lessons (id, course_id, title, description, content, video_url, duration, ord)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(id, course_id) DO UPDATE SET
                title = excluded.title,
                description = excluded.description,
                content = excluded.content,
                video_url = excluded.video_url,
                duration = excluded.duration,
                ord = excluded.ord
            ",
        )
        .bind(lesson.id.as_str())
        .bind(lesson.course_id.as_str())
        .bind(&lesson.title)
        .bind(&lesson.description)
        .bind(&lesson.content)
        .bind(&lesson.video_url)
        .bind(&lesson.duration)
        .bind(order)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }

    async fn get_course(&self, id: &CourseId) -> Result<Option<Course>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, title, description, level, instructor, image_url, duration, created_at, updated_at
            FROM courses WHERE id = ?1
            ",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let record = map_course_row(&row)?;
        let lessons = self.lessons_for(id).await?;
        record.into_course(lessons).map(Some).map_err(ser)
    }

    async fn list_courses(&self, limit: u32) -> Result<Vec<Course>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id FROM courses
            ORDER BY id ASC
            LIMIT ?1
            ",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut courses = Vec::with_capacity(rows.len());
        for row in rows {
            let id = CourseId::new(row.try_get::<String, _>("id").map_err(ser)?);
            if let Some(course) = self.get_course(&id).await? {
                courses.push(course);
            }
        }
        Ok(courses)
    }
}
