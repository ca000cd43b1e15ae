use std::sync::Arc;

use course_core::model::{CourseId, LessonId, UserId};
use course_core::time::fixed_now;
use services::{Clock, EnrollmentService, ProgressService};
use storage::repository::{NewUserRecord, Storage, UserRepository as _};

async fn storage_with_user(db: &str, user: &str) -> (Storage, UserId) {
    let storage = Storage::sqlite(&format!("sqlite:file:{db}?mode=memory&cache=shared"))
        .await
        .expect("connect sqlite");
    let user_id = UserId::new(user);
    storage
        .users
        .insert_user(&NewUserRecord {
            id: user_id.clone(),
            created_at: fixed_now(),
        })
        .await
        .expect("insert user");
    (storage, user_id)
}

#[tokio::test]
async fn enrollment_creates_membership_and_progress_together() {
    let (storage, user_id) = storage_with_user("memdb_enroll_flow", "u1").await;
    let clock = Clock::fixed(fixed_now());
    let enrollment = EnrollmentService::new(clock, Arc::clone(&storage.users));
    let course = CourseId::new("course-A");

    enrollment.enroll(&user_id, &course).await.expect("enroll");

    let user = storage
        .users
        .get_user(&user_id)
        .await
        .expect("get user")
        .expect("user exists");
    assert!(user.is_enrolled(&course));
    let progress = user.progress_for(&course);
    assert_eq!(progress.enrolled_at(), Some(fixed_now()));
    assert!(progress.completed_lessons().is_empty());
    assert!(progress.last_accessed_lesson().is_none());
}

#[tokio::test]
async fn second_enrollment_does_not_reset_progress() {
    let (storage, user_id) = storage_with_user("memdb_reenroll_flow", "u1").await;
    let clock = Clock::fixed(fixed_now());
    let enrollment = EnrollmentService::new(clock, Arc::clone(&storage.users));
    let progress_service = ProgressService::new(clock, Arc::clone(&storage.users));
    let course = CourseId::new("course-A");

    enrollment.enroll(&user_id, &course).await.expect("enroll");
    progress_service
        .mark_lesson_completed(&user_id, &course, &LessonId::new("lessonA1"))
        .await
        .expect("complete");

    let later = Clock::fixed(fixed_now() + chrono::Duration::days(5));
    let enrollment = EnrollmentService::new(later, Arc::clone(&storage.users));
    enrollment
        .enroll(&user_id, &course)
        .await
        .expect("re-enroll");

    let progress = progress_service
        .get_progress(&user_id, &course)
        .await
        .expect("get progress");
    assert_eq!(progress.enrolled_at(), Some(fixed_now()));
    assert_eq!(progress.completed_lessons(), &[LessonId::new("lessonA1")]);
}

#[tokio::test]
async fn default_read_is_safe_and_never_persists() {
    let (storage, user_id) = storage_with_user("memdb_default_read", "u1").await;
    let clock = Clock::fixed(fixed_now());
    let progress_service = ProgressService::new(clock, Arc::clone(&storage.users));
    let course = CourseId::new("course-A");

    let progress = progress_service
        .get_progress(&user_id, &course)
        .await
        .expect("get progress");
    assert!(progress.completed_lessons().is_empty());
    assert!(progress.enrolled_at().is_none());

    // A raw read of the store shows no entry was created.
    let raw = storage
        .users
        .get_progress(&user_id, &course)
        .await
        .expect("raw read");
    assert!(raw.is_none());
}
