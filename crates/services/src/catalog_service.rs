use std::sync::Arc;

use course_core::model::{Course, CourseId, Lesson, LessonId};
use storage::repository::{CourseRecord, CourseRepository, LessonRecord};

use crate::Clock;
use crate::error::CatalogError;

/// Read access to the course catalog, plus the write pass-throughs the
/// admin collaborator uses to author courses.
#[derive(Clone)]
pub struct CatalogService {
    clock: Clock,
    courses: Arc<dyn CourseRepository>,
}

impl CatalogService {
    #[must_use]
    pub fn new(clock: Clock, courses: Arc<dyn CourseRepository>) -> Self {
        Self { clock, courses }
    }

    /// Fetch a course with its lessons sorted ascending by order.
    ///
    /// Returns `Ok(None)` when the course does not exist; a missing course
    /// is not an error.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Storage` if repository access fails.
    pub async fn get_course(&self, course_id: &CourseId) -> Result<Option<Course>, CatalogError> {
        let course = self.courses.get_course(course_id).await?;
        Ok(course)
    }

    /// List courses ordered by ID, up to the given limit.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Storage` if repository access fails.
    pub async fn list_courses(&self, limit: u32) -> Result<Vec<Course>, CatalogError> {
        let courses = self.courses.list_courses(limit).await?;
        Ok(courses)
    }

    /// Create a new course with a generated ID and no lessons.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Course` for validation failures.
    /// Returns `CatalogError::Storage` if persistence fails.
    pub async fn create_course(
        &self,
        title: String,
        description: String,
        level: String,
        instructor: String,
        image_url: String,
        duration: String,
    ) -> Result<CourseId, CatalogError> {
        let now = self.clock.now();
        let course = Course::new(
            CourseId::generate(),
            title,
            description,
            level,
            instructor,
            image_url,
            duration,
            now,
        )?;
        self.courses
            .upsert_course(&CourseRecord::from_course(&course))
            .await?;
        Ok(course.id().clone())
    }

    /// Add a lesson to a course with a generated ID.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Course` for validation failures.
    /// Returns `CatalogError::Storage` if persistence fails.
    #[allow(clippy::too_many_arguments)]
    pub async fn add_lesson(
        &self,
        course_id: &CourseId,
        title: String,
        description: String,
        content: String,
        video_url: String,
        duration: String,
        order: u32,
    ) -> Result<LessonId, CatalogError> {
        let lesson = Lesson::new(
            LessonId::generate(),
            title,
            description,
            content,
            video_url,
            duration,
            order,
        )?;
        self.courses
            .upsert_lesson(&LessonRecord::from_lesson(course_id, &lesson))
            .await?;
        Ok(lesson.id().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use course_core::time::fixed_now;
    use storage::repository::InMemoryRepository;

    fn service() -> CatalogService {
        CatalogService::new(
            Clock::fixed(fixed_now()),
            Arc::new(InMemoryRepository::new()),
        )
    }

    #[tokio::test]
    async fn missing_course_is_none_not_error() {
        let service = service();
        let fetched = service.get_course(&CourseId::new("missing")).await.unwrap();
        assert!(fetched.is_none());
    }

    #[tokio::test]
    async fn created_course_round_trips_with_lessons_in_order() {
        let service = service();
        let course_id = service
            .create_course(
                "German A1".to_string(),
                "Beginner German".to_string(),
                "A1".to_string(),
                "Frau M.".to_string(),
                "https://example.com/cover.png".to_string(),
                "6 weeks".to_string(),
            )
            .await
            .unwrap();

        // Authored out of order on purpose.
        for order in [2_u32, 1] {
            service
                .add_lesson(
                    &course_id,
                    format!("Lesson {order}"),
                    String::new(),
                    "content".to_string(),
                    "https://example.com/video.mp4".to_string(),
                    "10 min".to_string(),
                    order,
                )
                .await
                .unwrap();
        }

        let course = service.get_course(&course_id).await.unwrap().unwrap();
        assert_eq!(course.title(), "German A1");
        let orders: Vec<u32> = course.lessons().iter().map(Lesson::order).collect();
        assert_eq!(orders, vec![1, 2]);

        let listed = service.list_courses(10).await.unwrap();
        assert_eq!(listed.len(), 1);
    }

    #[tokio::test]
    async fn blank_title_is_rejected() {
        let service = service();
        let result = service
            .create_course(
                "  ".to_string(),
                String::new(),
                "A1".to_string(),
                "Frau M.".to_string(),
                String::new(),
                String::new(),
            )
            .await;
        assert!(matches!(result, Err(CatalogError::Course(_))));
    }
}
