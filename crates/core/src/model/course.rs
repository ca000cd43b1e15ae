use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::ids::{CourseId, LessonId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CourseError {
    #[error("course title cannot be empty")]
    EmptyTitle,

    #[error("lesson title cannot be empty")]
    EmptyLessonTitle,

    #[error("duplicate lesson order: {order}")]
    DuplicateLessonOrder { order: u32 },

    #[error("updated_at is before created_at")]
    InvalidTimeRange,
}

//
// ─── LESSON ────────────────────────────────────────────────────────────────────
//

/// A single lesson within a course.
///
/// `duration` is an opaque display string (e.g. "12 min") and takes no part
/// in any calculation. `order` positions the lesson within its course; orders
/// are expected to be unique but not necessarily contiguous.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lesson {
    id: LessonId,
    title: String,
    description: String,
    content: String,
    video_url: String,
    duration: String,
    order: u32,
}

impl Lesson {
    /// Creates a new lesson.
    ///
    /// # Errors
    ///
    /// Returns `CourseError::EmptyLessonTitle` if the title is blank.
    pub fn new(
        id: LessonId,
        title: impl Into<String>,
        description: impl Into<String>,
        content: impl Into<String>,
        video_url: impl Into<String>,
        duration: impl Into<String>,
        order: u32,
    ) -> Result<Self, CourseError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(CourseError::EmptyLessonTitle);
        }
        Ok(Self {
            id,
            title,
            description: description.into(),
            content: content.into(),
            video_url: video_url.into(),
            duration: duration.into(),
            order,
        })
    }

    #[must_use]
    pub fn id(&self) -> &LessonId {
        &self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    #[must_use]
    pub fn video_url(&self) -> &str {
        &self.video_url
    }

    #[must_use]
    pub fn duration(&self) -> &str {
        &self.duration
    }

    #[must_use]
    pub fn order(&self) -> u32 {
        self.order
    }
}

//
// ─── COURSE ────────────────────────────────────────────────────────────────────
//

/// A course and its ordered lessons.
///
/// Lessons are always held sorted strictly ascending by `order`, no matter
/// how the storage layer returned them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Course {
    id: CourseId,
    title: String,
    description: String,
    level: String,
    instructor: String,
    image_url: String,
    duration: String,
    lessons: Vec<Lesson>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Course {
    /// Creates a new course with no lessons yet.
    ///
    /// # Errors
    ///
    /// Returns `CourseError::EmptyTitle` if the title is blank.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: CourseId,
        title: impl Into<String>,
        description: impl Into<String>,
        level: impl Into<String>,
        instructor: impl Into<String>,
        image_url: impl Into<String>,
        duration: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<Self, CourseError> {
        Self::from_persisted(
            id,
            title,
            description,
            level,
            instructor,
            image_url,
            duration,
            Vec::new(),
            now,
            now,
        )
    }

    /// Rehydrates a course from persisted storage.
    ///
    /// Sorts `lessons` ascending by order on the way in.
    ///
    /// # Errors
    ///
    /// Returns `CourseError::DuplicateLessonOrder` if two lessons share an
    /// order value, `CourseError::EmptyTitle` for a blank title, or
    /// `CourseError::InvalidTimeRange` if the timestamps are inverted.
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        id: CourseId,
        title: impl Into<String>,
        description: impl Into<String>,
        level: impl Into<String>,
        instructor: impl Into<String>,
        image_url: impl Into<String>,
        duration: impl Into<String>,
        mut lessons: Vec<Lesson>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Result<Self, CourseError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(CourseError::EmptyTitle);
        }
        if updated_at < created_at {
            return Err(CourseError::InvalidTimeRange);
        }

        lessons.sort_by_key(Lesson::order);
        for pair in lessons.windows(2) {
            if pair[0].order == pair[1].order {
                return Err(CourseError::DuplicateLessonOrder {
                    order: pair[0].order,
                });
            }
        }

        Ok(Self {
            id,
            title,
            description: description.into(),
            level: level.into(),
            instructor: instructor.into(),
            image_url: image_url.into(),
            duration: duration.into(),
            lessons,
            created_at,
            updated_at,
        })
    }

    #[must_use]
    pub fn id(&self) -> &CourseId {
        &self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    #[must_use]
    pub fn level(&self) -> &str {
        &self.level
    }

    #[must_use]
    pub fn instructor(&self) -> &str {
        &self.instructor
    }

    #[must_use]
    pub fn image_url(&self) -> &str {
        &self.image_url
    }

    #[must_use]
    pub fn duration(&self) -> &str {
        &self.duration
    }

    /// Lessons sorted ascending by order.
    #[must_use]
    pub fn lessons(&self) -> &[Lesson] {
        &self.lessons
    }

    /// Looks up a lesson of this course by ID.
    #[must_use]
    pub fn lesson(&self, id: &LessonId) -> Option<&Lesson> {
        self.lessons.iter().find(|l| l.id() == id)
    }

    /// Returns true if the given lesson belongs to this course.
    #[must_use]
    pub fn contains_lesson(&self, id: &LessonId) -> bool {
        self.lesson(id).is_some()
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

// ─── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    fn lesson(id: &str, order: u32) -> Lesson {
        Lesson::new(
            LessonId::new(id),
            format!("Lesson {order}"),
            "",
            "content",
            "https://example.com/video.mp4",
            "10 min",
            order,
        )
        .unwrap()
    }

    #[test]
    fn lessons_are_sorted_on_construction() {
        let course = Course::from_persisted(
            CourseId::new("course-A"),
            "German A1",
            "Beginner German",
            "A1",
            "Frau M.",
            "https://example.com/cover.png",
            "6 weeks",
            vec![lesson("l3", 3), lesson("l1", 1), lesson("l2", 2)],
            fixed_now(),
            fixed_now(),
        )
        .unwrap();

        let orders: Vec<u32> = course.lessons().iter().map(Lesson::order).collect();
        assert_eq!(orders, vec![1, 2, 3]);
        assert_eq!(course.lessons()[0].id(), &LessonId::new("l1"));
    }

    #[test]
    fn duplicate_order_is_rejected() {
        let result = Course::from_persisted(
            CourseId::new("course-A"),
            "German A1",
            "",
            "A1",
            "Frau M.",
            "",
            "",
            vec![lesson("l1", 1), lesson("l2", 1)],
            fixed_now(),
            fixed_now(),
        );
        assert_eq!(
            result.unwrap_err(),
            CourseError::DuplicateLessonOrder { order: 1 }
        );
    }

    #[test]
    fn empty_title_is_rejected() {
        let result = Course::new(
            CourseId::new("course-A"),
            "  ",
            "",
            "A1",
            "Frau M.",
            "",
            "",
            fixed_now(),
        );
        assert_eq!(result.unwrap_err(), CourseError::EmptyTitle);
    }

    #[test]
    fn lesson_lookup_by_id() {
        let course = Course::from_persisted(
            CourseId::new("course-A"),
            "German A1",
            "",
            "A1",
            "Frau M.",
            "",
            "",
            vec![lesson("l1", 1), lesson("l2", 2)],
            fixed_now(),
            fixed_now(),
        )
        .unwrap();

        assert!(course.contains_lesson(&LessonId::new("l2")));
        assert!(course.lesson(&LessonId::new("l9")).is_none());
        assert_eq!(course.lesson(&LessonId::new("l1")).unwrap().order(), 1);
    }

    #[test]
    fn non_contiguous_orders_are_allowed() {
        let course = Course::from_persisted(
            CourseId::new("course-A"),
            "German A1",
            "",
            "A1",
            "Frau M.",
            "",
            "",
            vec![lesson("l10", 10), lesson("l5", 5)],
            fixed_now(),
            fixed_now(),
        )
        .unwrap();
        let orders: Vec<u32> = course.lessons().iter().map(Lesson::order).collect();
        assert_eq!(orders, vec![5, 10]);
    }
}
