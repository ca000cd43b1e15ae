use course_core::model::{CourseId, Lesson, LessonId};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::repository::{CourseRecord, LessonRecord, StorageError};

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn order_from_i64(v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid lesson order: {v}")))
}

pub(crate) fn map_course_row(row: &SqliteRow) -> Result<CourseRecord, StorageError> {
    Ok(CourseRecord {
        id: CourseId::new(row.try_get::<String, _>("id").map_err(ser)?),
        title: row.try_get("title").map_err(ser)?,
        description: row.try_get("description").map_err(ser)?,
        level: row.try_get("level").map_err(ser)?,
        instructor: row.try_get("instructor").map_err(ser)?,
        image_url: row.try_get("image_url").map_err(ser)?,
        duration: row.try_get("duration").map_err(ser)?,
        created_at: row.try_get("created_at").map_err(ser)?,
        updated_at: row.try_get("updated_at").map_err(ser)?,
    })
}

pub(crate) fn map_lesson_row(row: &SqliteRow) -> Result<Lesson, StorageError> {
    let record = LessonRecord {
        id: LessonId::new(row.try_get::<String, _>("id").map_err(ser)?),
        course_id: CourseId::new(row.try_get::<String, _>("course_id").map_err(ser)?),
        title: row.try_get("title").map_err(ser)?,
        description: row.try_get("description").map_err(ser)?,
        content: row.try_get("content").map_err(ser)?,
        video_url: row.try_get("video_url").map_err(ser)?,
        duration: row.try_get("duration").map_err(ser)?,
        order: order_from_i64(row.try_get::<i64, _>("ord").map_err(ser)?)?,
    };
    record.into_lesson().map_err(ser)
}
