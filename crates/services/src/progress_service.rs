use std::sync::Arc;

use course_core::model::{CourseId, CourseProgress, LessonId, UserId};
use storage::repository::UserRepository;
use tracing::debug;

use crate::Clock;
use crate::error::ProgressServiceError;

/// Reads and updates one user's progress for one course.
///
/// The store handle and the user identity are explicit parameters; there is
/// no ambient database client or implicit "current user" session.
#[derive(Clone)]
pub struct ProgressService {
    clock: Clock,
    users: Arc<dyn UserRepository>,
}

impl ProgressService {
    #[must_use]
    pub fn new(clock: Clock, users: Arc<dyn UserRepository>) -> Self {
        Self { clock, users }
    }

    /// Fetch the user's progress for a course.
    ///
    /// A user with no persisted entry gets a detached default (empty
    /// completed set, no enrollment timestamp). The default is a read-time
    /// convenience and is never written back.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the user does not exist, or other
    /// storage errors unchanged.
    pub async fn get_progress(
        &self,
        user_id: &UserId,
        course_id: &CourseId,
    ) -> Result<CourseProgress, ProgressServiceError> {
        let progress = self.users.get_progress(user_id, course_id).await?;
        Ok(progress.unwrap_or_else(CourseProgress::detached))
    }

    /// Record that the user opened a lesson. Last write wins.
    ///
    /// No enrollment or lesson-membership check is made: the lesson ID is
    /// accepted as-is, and a progress entry is created if none exists yet.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the user does not exist.
    pub async fn record_lesson_access(
        &self,
        user_id: &UserId,
        course_id: &CourseId,
        lesson_id: &LessonId,
    ) -> Result<(), ProgressServiceError> {
        self.users
            .record_access(user_id, course_id, lesson_id, self.clock.now())
            .await?;
        Ok(())
    }

    /// Mark a lesson completed. A new completion also updates the
    /// last-accessed fields.
    ///
    /// Idempotent: completing the same lesson again is a full no-op that
    /// leaves both the completed set and the last-accessed fields unchanged.
    /// The set-add is atomic in the repository, so two overlapping
    /// completions of different lessons both survive.
    ///
    /// Lesson IDs are not validated against the course's lesson list; the
    /// derived queries on `CourseProgress` ignore IDs that do not belong to
    /// the course, so a stray ID cannot distort completion percentages.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the user does not exist.
    pub async fn mark_lesson_completed(
        &self,
        user_id: &UserId,
        course_id: &CourseId,
        lesson_id: &LessonId,
    ) -> Result<(), ProgressServiceError> {
        let added = self
            .users
            .add_completed(user_id, course_id, lesson_id, self.clock.now())
            .await?;
        if !added {
            debug!(user = %user_id, course = %course_id, lesson = %lesson_id, "already completed");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use course_core::time::fixed_now;
    use storage::repository::{InMemoryRepository, NewUserRecord, StorageError, UserRepository};

    async fn service_with_user(id: &str) -> (ProgressService, UserId) {
        let repo = InMemoryRepository::new();
        let user_id = UserId::new(id);
        repo.insert_user(&NewUserRecord {
            id: user_id.clone(),
            created_at: fixed_now(),
        })
        .await
        .unwrap();
        let service = ProgressService::new(Clock::fixed(fixed_now()), Arc::new(repo));
        (service, user_id)
    }

    #[tokio::test]
    async fn get_progress_synthesizes_default_without_persisting() {
        let (service, user_id) = service_with_user("u1").await;
        let course = CourseId::new("course-A");

        let progress = service.get_progress(&user_id, &course).await.unwrap();
        assert!(progress.completed_lessons().is_empty());
        assert!(progress.enrolled_at().is_none());

        // A second read still sees no persisted entry.
        let progress = service.get_progress(&user_id, &course).await.unwrap();
        assert!(!progress.is_enrolled());
    }

    #[tokio::test]
    async fn get_progress_for_missing_user_fails() {
        let (service, _) = service_with_user("u1").await;
        let result = service
            .get_progress(&UserId::new("ghost"), &CourseId::new("course-A"))
            .await;
        assert!(matches!(
            result,
            Err(ProgressServiceError::Storage(StorageError::NotFound))
        ));
    }

    #[tokio::test]
    async fn completion_updates_last_access() {
        let (service, user_id) = service_with_user("u1").await;
        let course = CourseId::new("course-A");
        let lesson = LessonId::new("lessonA1");

        service
            .mark_lesson_completed(&user_id, &course, &lesson)
            .await
            .unwrap();

        let progress = service.get_progress(&user_id, &course).await.unwrap();
        assert_eq!(progress.last_accessed_lesson(), Some(&lesson));
        assert_eq!(progress.last_accessed_at(), Some(fixed_now()));
    }

    struct UnavailableRepo;

    #[async_trait::async_trait]
    impl UserRepository for UnavailableRepo {
        async fn insert_user(&self, _user: &NewUserRecord) -> Result<(), StorageError> {
            Err(StorageError::Unavailable("store down".into()))
        }

        async fn get_user(
            &self,
            _id: &UserId,
        ) -> Result<Option<course_core::model::User>, StorageError> {
            Err(StorageError::Unavailable("store down".into()))
        }

        async fn get_progress(
            &self,
            _user_id: &UserId,
            _course_id: &CourseId,
        ) -> Result<Option<CourseProgress>, StorageError> {
            Err(StorageError::Unavailable("store down".into()))
        }

        async fn enroll(
            &self,
            _user_id: &UserId,
            _course_id: &CourseId,
            _at: chrono::DateTime<chrono::Utc>,
        ) -> Result<(), StorageError> {
            Err(StorageError::Unavailable("store down".into()))
        }

        async fn record_access(
            &self,
            _user_id: &UserId,
            _course_id: &CourseId,
            _lesson_id: &LessonId,
            _at: chrono::DateTime<chrono::Utc>,
        ) -> Result<(), StorageError> {
            Err(StorageError::Unavailable("store down".into()))
        }

        async fn add_completed(
            &self,
            _user_id: &UserId,
            _course_id: &CourseId,
            _lesson_id: &LessonId,
            _at: chrono::DateTime<chrono::Utc>,
        ) -> Result<bool, StorageError> {
            Err(StorageError::Unavailable("store down".into()))
        }
    }

    #[tokio::test]
    async fn store_failures_propagate_unchanged() {
        let service = ProgressService::new(Clock::fixed(fixed_now()), Arc::new(UnavailableRepo));
        let result = service
            .get_progress(&UserId::new("u1"), &CourseId::new("course-A"))
            .await;
        assert!(matches!(
            result,
            Err(ProgressServiceError::Storage(StorageError::Unavailable(_)))
        ));
    }

    #[tokio::test]
    async fn access_does_not_require_enrollment() {
        let (service, user_id) = service_with_user("u1").await;
        let course = CourseId::new("course-A");

        service
            .record_lesson_access(&user_id, &course, &LessonId::new("l1"))
            .await
            .unwrap();

        let progress = service.get_progress(&user_id, &course).await.unwrap();
        assert_eq!(progress.last_accessed_lesson(), Some(&LessonId::new("l1")));
        assert!(progress.enrolled_at().is_none());
    }
}
