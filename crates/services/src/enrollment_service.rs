use std::sync::Arc;

use course_core::model::{CourseId, UserId};
use storage::repository::{StorageError, UserRepository};
use tracing::info;

use crate::Clock;
use crate::error::EnrollmentError;

/// First-time registration of a user into a course.
#[derive(Clone)]
pub struct EnrollmentService {
    clock: Clock,
    users: Arc<dyn UserRepository>,
}

impl EnrollmentService {
    #[must_use]
    pub fn new(clock: Clock, users: Arc<dyn UserRepository>) -> Self {
        Self { clock, users }
    }

    /// Enroll the user in a course.
    ///
    /// Idempotent: if the user is already enrolled this returns without
    /// modification. Otherwise one atomic repository write establishes
    /// course membership and a fresh initial progress record together —
    /// empty completed set, no last-accessed lesson, `enrolled_at` stamped
    /// now, replacing anything a merge-write created earlier. No caller can
    /// observe membership without the record, and a repeat call never
    /// resets `enrolled_at` or the completed set.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the user does not exist, or other
    /// storage errors unchanged.
    pub async fn enroll(
        &self,
        user_id: &UserId,
        course_id: &CourseId,
    ) -> Result<(), EnrollmentError> {
        let user = self
            .users
            .get_user(user_id)
            .await?
            .ok_or(StorageError::NotFound)?;

        if user.is_enrolled(course_id) {
            return Ok(());
        }

        self.users
            .enroll(user_id, course_id, self.clock.now())
            .await?;
        info!(user = %user_id, course = %course_id, "user enrolled");
        Ok(())
    }
}
