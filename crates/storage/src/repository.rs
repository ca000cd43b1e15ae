use async_trait::async_trait;
use chrono::{DateTime, Utc};
use course_core::model::{
    Course, CourseError, CourseId, CourseProgress, Lesson, LessonId, User, UserId,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
///
/// Failures propagate to callers unchanged; this layer performs no retry,
/// backoff, or circuit breaking.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Persisted shape for a new user account.
///
/// Account creation itself (signup, auth) happens in an external
/// collaborator; this record exists so tests and seeding can provision
/// users directly.
#[derive(Debug, Clone)]
pub struct NewUserRecord {
    pub id: UserId,
    pub created_at: DateTime<Utc>,
}

impl NewUserRecord {
    #[must_use]
    pub fn from_user(user: &User) -> Self {
        Self {
            id: user.id().clone(),
            created_at: user.created_at(),
        }
    }
}

/// Persisted shape for a course's own fields, without its lessons.
///
/// Lessons live in their own collection keyed by course, mirroring the
/// document layout this was designed against.
#[derive(Debug, Clone)]
pub struct CourseRecord {
    pub id: CourseId,
    pub title: String,
    pub description: String,
    pub level: String,
    pub instructor: String,
    pub image_url: String,
    pub duration: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CourseRecord {
    #[must_use]
    pub fn from_course(course: &Course) -> Self {
        Self {
            id: course.id().clone(),
            title: course.title().to_owned(),
            description: course.description().to_owned(),
            level: course.level().to_owned(),
            instructor: course.instructor().to_owned(),
            image_url: course.image_url().to_owned(),
            duration: course.duration().to_owned(),
            created_at: course.created_at(),
            updated_at: course.updated_at(),
        }
    }

    /// Convert the record back into a domain `Course` with the given lessons.
    ///
    /// # Errors
    ///
    /// Returns `CourseError` if validation fails (blank title, duplicate
    /// lesson order, inverted timestamps).
    pub fn into_course(self, lessons: Vec<Lesson>) -> Result<Course, CourseError> {
        Course::from_persisted(
            self.id,
            self.title,
            self.description,
            self.level,
            self.instructor,
            self.image_url,
            self.duration,
            lessons,
            self.created_at,
            self.updated_at,
        )
    }
}

/// Persisted shape for a lesson, carrying its owning course.
#[derive(Debug, Clone)]
pub struct LessonRecord {
    pub id: LessonId,
    pub course_id: CourseId,
    pub title: String,
    pub description: String,
    pub content: String,
    pub video_url: String,
    pub duration: String,
    pub order: u32,
}

impl LessonRecord {
    #[must_use]
    pub fn from_lesson(course_id: &CourseId, lesson: &Lesson) -> Self {
        Self {
            id: lesson.id().clone(),
            course_id: course_id.clone(),
            title: lesson.title().to_owned(),
            description: lesson.description().to_owned(),
            content: lesson.content().to_owned(),
            video_url: lesson.video_url().to_owned(),
            duration: lesson.duration().to_owned(),
            order: lesson.order(),
        }
    }

    /// Convert the record back into a domain `Lesson`.
    ///
    /// # Errors
    ///
    /// Returns `CourseError` if the lesson fails validation.
    pub fn into_lesson(self) -> Result<Lesson, CourseError> {
        Lesson::new(
            self.id,
            self.title,
            self.description,
            self.content,
            self.video_url,
            self.duration,
            self.order,
        )
    }
}

/// Repository contract for user accounts and their per-course progress.
///
/// The per-user record is shared mutable state with no client-side locking;
/// implementations must make `enroll` and `add_completed` atomic so that
/// concurrent writers cannot lose each other's updates.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Persist a new user account.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the user cannot be stored.
    async fn insert_user(&self, user: &NewUserRecord) -> Result<(), StorageError>;

    /// Fetch a user with all enrollment and progress state.
    ///
    /// Returns `Ok(None)` when no such user exists.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on store failure or if the persisted state
    /// fails validation.
    async fn get_user(&self, id: &UserId) -> Result<Option<User>, StorageError>;

    /// Fetch one persisted progress entry.
    ///
    /// Returns `Ok(None)` when the user has no entry for the course; the
    /// caller decides whether to synthesize a default.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on store failure.
    async fn get_progress(
        &self,
        user_id: &UserId,
        course_id: &CourseId,
    ) -> Result<Option<CourseProgress>, StorageError>;

    /// Atomically enroll the user: course membership and the initial
    /// progress record become visible together, never one without the other.
    ///
    /// The initial record is fresh — empty completed set, no last-accessed
    /// fields, `enrolled_at = at` — and replaces any entry a merge-write
    /// created earlier. Idempotent: repeat calls leave `enrolled_at` and
    /// completed lessons untouched.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on store failure.
    async fn enroll(
        &self,
        user_id: &UserId,
        course_id: &CourseId,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError>;

    /// Set the last-accessed lesson unconditionally. Last write wins.
    ///
    /// Creates the progress entry when none exists (merge semantics); the
    /// entry created this way carries no enrollment timestamp.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on store failure.
    async fn record_access(
        &self,
        user_id: &UserId,
        course_id: &CourseId,
        lesson_id: &LessonId,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError>;

    /// Atomic set-add of a completed lesson. A new completion also updates
    /// the last-accessed fields. Returns whether the lesson was newly added.
    ///
    /// Two overlapping calls for different lessons both take effect; a
    /// repeat call for the same lesson is a full no-op returning `false`,
    /// leaving the last-accessed fields untouched.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on store failure.
    async fn add_completed(
        &self,
        user_id: &UserId,
        course_id: &CourseId,
        lesson_id: &LessonId,
        at: DateTime<Utc>,
    ) -> Result<bool, StorageError>;
}

/// Repository contract for the course catalog.
#[async_trait]
pub trait CourseRepository: Send + Sync {
    /// Persist or update a course's own fields. Lessons are unaffected.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the course cannot be stored.
    async fn upsert_course(&self, course: &CourseRecord) -> Result<(), StorageError>;

    /// Persist or update a lesson under its course.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the lesson cannot be stored.
    async fn upsert_lesson(&self, lesson: &LessonRecord) -> Result<(), StorageError>;

    /// Fetch a course with its lessons, sorted ascending by order.
    ///
    /// Returns `Ok(None)` when the course does not exist.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on store failure or validation failure.
    async fn get_course(&self, id: &CourseId) -> Result<Option<Course>, StorageError>;

    /// List courses ordered by ID, up to the given limit.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on store failure.
    async fn list_courses(&self, limit: u32) -> Result<Vec<Course>, StorageError>;
}

#[derive(Debug, Clone, Default)]
struct UserState {
    created_at: DateTime<Utc>,
    enrolled: Vec<CourseId>,
    progress: BTreeMap<CourseId, CourseProgress>,
}

/// Simple in-memory repository implementation for testing and prototyping.
///
/// The interior mutex serializes every mutation, so the atomicity the
/// traits require falls out for free.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    users: Arc<Mutex<HashMap<UserId, UserState>>>,
    courses: Arc<Mutex<HashMap<CourseId, CourseRecord>>>,
    lessons: Arc<Mutex<HashMap<(CourseId, LessonId), LessonRecord>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock_err<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Unavailable(e.to_string())
}

#[async_trait]
impl UserRepository for InMemoryRepository {
    async fn insert_user(&self, user: &NewUserRecord) -> Result<(), StorageError> {
        let mut guard = self.users.lock().map_err(lock_err)?;
        guard.insert(
            user.id.clone(),
            UserState {
                created_at: user.created_at,
                ..UserState::default()
            },
        );
        Ok(())
    }

    async fn get_user(&self, id: &UserId) -> Result<Option<User>, StorageError> {
        let guard = self.users.lock().map_err(lock_err)?;
        let Some(state) = guard.get(id) else {
            return Ok(None);
        };
        let user = User::from_persisted(
            id.clone(),
            state.enrolled.clone(),
            state.progress.clone(),
            state.created_at,
        )
        .map_err(|e| StorageError::Serialization(e.to_string()))?;
        Ok(Some(user))
    }

    async fn get_progress(
        &self,
        user_id: &UserId,
        course_id: &CourseId,
    ) -> Result<Option<CourseProgress>, StorageError> {
        let guard = self.users.lock().map_err(lock_err)?;
        let state = guard.get(user_id).ok_or(StorageError::NotFound)?;
        Ok(state.progress.get(course_id).cloned())
    }

    async fn enroll(
        &self,
        user_id: &UserId,
        course_id: &CourseId,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let mut guard = self.users.lock().map_err(lock_err)?;
        let state = guard.get_mut(user_id).ok_or(StorageError::NotFound)?;
        if state.enrolled.contains(course_id) {
            return Ok(());
        }
        state.enrolled.push(course_id.clone());
        // A fresh record replaces anything a merge-write created earlier.
        state
            .progress
            .insert(course_id.clone(), CourseProgress::enrolled(at));
        Ok(())
    }

    async fn record_access(
        &self,
        user_id: &UserId,
        course_id: &CourseId,
        lesson_id: &LessonId,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let mut guard = self.users.lock().map_err(lock_err)?;
        let state = guard.get_mut(user_id).ok_or(StorageError::NotFound)?;
        state
            .progress
            .entry(course_id.clone())
            .or_insert_with(CourseProgress::detached)
            .record_access(lesson_id.clone(), at);
        Ok(())
    }

    async fn add_completed(
        &self,
        user_id: &UserId,
        course_id: &CourseId,
        lesson_id: &LessonId,
        at: DateTime<Utc>,
    ) -> Result<bool, StorageError> {
        let mut guard = self.users.lock().map_err(lock_err)?;
        let state = guard.get_mut(user_id).ok_or(StorageError::NotFound)?;
        let progress = state
            .progress
            .entry(course_id.clone())
            .or_insert_with(CourseProgress::detached);
        Ok(progress.mark_completed(lesson_id.clone(), at))
    }
}

#[async_trait]
impl CourseRepository for InMemoryRepository {
    async fn upsert_course(&self, course: &CourseRecord) -> Result<(), StorageError> {
        let mut guard = self.courses.lock().map_err(lock_err)?;
        guard.insert(course.id.clone(), course.clone());
        Ok(())
    }

    async fn upsert_lesson(&self, lesson: &LessonRecord) -> Result<(), StorageError> {
        let mut guard = self.lessons.lock().map_err(lock_err)?;
        guard.insert(
            (lesson.course_id.clone(), lesson.id.clone()),
            lesson.clone(),
        );
        Ok(())
    }

    async fn get_course(&self, id: &CourseId) -> Result<Option<Course>, StorageError> {
        let courses = self.courses.lock().map_err(lock_err)?;
        let Some(record) = courses.get(id).cloned() else {
            return Ok(None);
        };
        let lessons_guard = self.lessons.lock().map_err(lock_err)?;
        let mut lessons = Vec::new();
        for ((course_id, _), lesson) in lessons_guard.iter() {
            if course_id == id {
                lessons.push(
                    lesson
                        .clone()
                        .into_lesson()
                        .map_err(|e| StorageError::Serialization(e.to_string()))?,
                );
            }
        }
        record
            .into_course(lessons)
            .map(Some)
            .map_err(|e| StorageError::Serialization(e.to_string()))
    }

    async fn list_courses(&self, limit: u32) -> Result<Vec<Course>, StorageError> {
        let ids: Vec<CourseId> = {
            let courses = self.courses.lock().map_err(lock_err)?;
            let mut ids: Vec<CourseId> = courses.keys().cloned().collect();
            ids.sort();
            ids.truncate(limit as usize);
            ids
        };
        let mut out = Vec::with_capacity(ids.len());
        for id in &ids {
            if let Some(course) = self.get_course(id).await? {
                out.push(course);
            }
        }
        Ok(out)
    }
}

/// Aggregates user and course repositories behind trait objects for easy
/// backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub users: Arc<dyn UserRepository>,
    pub courses: Arc<dyn CourseRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let users: Arc<dyn UserRepository> = Arc::new(repo.clone());
        let courses: Arc<dyn CourseRepository> = Arc::new(repo);
        Self { users, courses }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use course_core::time::fixed_now;

    fn new_user(id: &str) -> NewUserRecord {
        NewUserRecord {
            id: UserId::new(id),
            created_at: fixed_now(),
        }
    }

    #[tokio::test]
    async fn enroll_creates_membership_and_progress_together() {
        let repo = InMemoryRepository::new();
        repo.insert_user(&new_user("u1")).await.unwrap();

        let course = CourseId::new("course-A");
        repo.enroll(&UserId::new("u1"), &course, fixed_now())
            .await
            .unwrap();

        let user = repo.get_user(&UserId::new("u1")).await.unwrap().unwrap();
        assert!(user.is_enrolled(&course));
        let progress = user.progress_for(&course);
        assert_eq!(progress.enrolled_at(), Some(fixed_now()));
        assert!(progress.completed_lessons().is_empty());
    }

    #[tokio::test]
    async fn repeated_add_completed_is_a_no_op() {
        let repo = InMemoryRepository::new();
        repo.insert_user(&new_user("u1")).await.unwrap();

        let user = UserId::new("u1");
        let course = CourseId::new("course-A");
        let lesson = LessonId::new("lessonA1");
        repo.enroll(&user, &course, fixed_now()).await.unwrap();

        assert!(repo
            .add_completed(&user, &course, &lesson, fixed_now())
            .await
            .unwrap());
        assert!(!repo
            .add_completed(&user, &course, &lesson, fixed_now())
            .await
            .unwrap());

        let progress = repo.get_progress(&user, &course).await.unwrap().unwrap();
        assert_eq!(progress.completed_lessons(), &[lesson]);
    }

    #[tokio::test]
    async fn duplicate_completion_leaves_last_access_untouched() {
        let repo = InMemoryRepository::new();
        repo.insert_user(&new_user("u1")).await.unwrap();

        let user = UserId::new("u1");
        let course = CourseId::new("course-A");
        repo.enroll(&user, &course, fixed_now()).await.unwrap();

        repo.add_completed(&user, &course, &LessonId::new("l1"), fixed_now())
            .await
            .unwrap();
        repo.record_access(&user, &course, &LessonId::new("l2"), fixed_now())
            .await
            .unwrap();
        // Completing l1 again must not steal the last-accessed slot back.
        assert!(!repo
            .add_completed(&user, &course, &LessonId::new("l1"), fixed_now())
            .await
            .unwrap());

        let progress = repo.get_progress(&user, &course).await.unwrap().unwrap();
        assert_eq!(progress.last_accessed_lesson(), Some(&LessonId::new("l2")));
    }

    #[tokio::test]
    async fn enroll_replaces_merge_created_progress() {
        let repo = InMemoryRepository::new();
        repo.insert_user(&new_user("u1")).await.unwrap();

        let user = UserId::new("u1");
        let course = CourseId::new("course-A");
        repo.add_completed(&user, &course, &LessonId::new("l1"), fixed_now())
            .await
            .unwrap();

        repo.enroll(&user, &course, fixed_now()).await.unwrap();

        let progress = repo.get_progress(&user, &course).await.unwrap().unwrap();
        assert_eq!(progress.enrolled_at(), Some(fixed_now()));
        assert!(progress.completed_lessons().is_empty());
        assert!(progress.last_accessed_lesson().is_none());
    }

    #[tokio::test]
    async fn progress_ops_for_missing_user_are_not_found() {
        let repo = InMemoryRepository::new();
        let result = repo
            .get_progress(&UserId::new("ghost"), &CourseId::new("course-A"))
            .await;
        assert!(matches!(result, Err(StorageError::NotFound)));
    }

    #[tokio::test]
    async fn course_round_trips_with_sorted_lessons() {
        let repo = InMemoryRepository::new();
        let course_id = CourseId::new("course-A");
        let course = Course::new(
            course_id.clone(),
            "German A1",
            "Beginner German",
            "A1",
            "Frau M.",
            "https://example.com/cover.png",
            "6 weeks",
            fixed_now(),
        )
        .unwrap();
        repo.upsert_course(&CourseRecord::from_course(&course))
            .await
            .unwrap();

        for (id, order) in [("l2", 2_u32), ("l1", 1)] {
            let lesson = Lesson::new(
                LessonId::new(id),
                format!("Lesson {order}"),
                "",
                "",
                "",
                "10 min",
                order,
            )
            .unwrap();
            repo.upsert_lesson(&LessonRecord::from_lesson(&course_id, &lesson))
                .await
                .unwrap();
        }

        let fetched = repo.get_course(&course_id).await.unwrap().unwrap();
        assert_eq!(fetched.lessons().len(), 2);
        assert_eq!(fetched.lessons()[0].id(), &LessonId::new("l1"));
        assert!(repo
            .get_course(&CourseId::new("missing"))
            .await
            .unwrap()
            .is_none());
    }
}
