use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::ids::{CourseId, UserId};
use crate::model::progress::CourseProgress;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum UserError {
    #[error("duplicate enrolled course: {0}")]
    DuplicateEnrollment(CourseId),

    #[error("enrolled course {0} has no progress record")]
    MissingProgress(CourseId),
}

//
// ─── USER ──────────────────────────────────────────────────────────────────────
//

/// A user account as read from the store.
///
/// Every enrolled course has a progress entry. The reverse does not hold:
/// recording access or completion for a course the user never enrolled in
/// creates a progress entry without enrollment, matching the merge-write
/// semantics of the backing document store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    id: UserId,
    enrolled_courses: Vec<CourseId>,
    progress: BTreeMap<CourseId, CourseProgress>,
    created_at: DateTime<Utc>,
}

impl User {
    /// Creates a brand-new user with no enrollments.
    #[must_use]
    pub fn new(id: UserId, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            enrolled_courses: Vec::new(),
            progress: BTreeMap::new(),
            created_at,
        }
    }

    /// Rehydrates a user from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `UserError::DuplicateEnrollment` if a course appears twice in
    /// the enrolled set, or `UserError::MissingProgress` if an enrolled
    /// course lacks a progress entry.
    pub fn from_persisted(
        id: UserId,
        enrolled_courses: Vec<CourseId>,
        progress: BTreeMap<CourseId, CourseProgress>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, UserError> {
        for (i, course) in enrolled_courses.iter().enumerate() {
            if enrolled_courses[..i].contains(course) {
                return Err(UserError::DuplicateEnrollment(course.clone()));
            }
            if !progress.contains_key(course) {
                return Err(UserError::MissingProgress(course.clone()));
            }
        }
        Ok(Self {
            id,
            enrolled_courses,
            progress,
            created_at,
        })
    }

    #[must_use]
    pub fn id(&self) -> &UserId {
        &self.id
    }

    #[must_use]
    pub fn enrolled_courses(&self) -> &[CourseId] {
        &self.enrolled_courses
    }

    #[must_use]
    pub fn is_enrolled(&self, course: &CourseId) -> bool {
        self.enrolled_courses.contains(course)
    }

    /// All persisted progress entries, keyed by course.
    #[must_use]
    pub fn progress(&self) -> &BTreeMap<CourseId, CourseProgress> {
        &self.progress
    }

    /// Progress for one course: the persisted entry, or a detached default
    /// when none exists. The default is never written back.
    #[must_use]
    pub fn progress_for(&self, course: &CourseId) -> CourseProgress {
        self.progress
            .get(course)
            .cloned()
            .unwrap_or_else(CourseProgress::detached)
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

// ─── Tests ─────────────────────────────────────────────────────────────────────
