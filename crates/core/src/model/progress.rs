use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::course::{Course, Lesson};
use crate::model::ids::LessonId;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProgressError {
    #[error("last_accessed_lesson and last_accessed_at must be set together")]
    AccessFieldsMismatch,

    #[error("duplicate completed lesson: {0}")]
    DuplicateCompletedLesson(LessonId),
}

//
// ─── COURSE PROGRESS ───────────────────────────────────────────────────────────
//

/// Per-user, per-course progress state.
///
/// `completed_lessons` has set semantics (a lesson appears at most once) but
/// preserves insertion order, so the last element is the most recently
/// completed lesson. `enrolled_at` is `None` only on a detached record that
/// was synthesized for a read and never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseProgress {
    completed_lessons: Vec<LessonId>,
    last_accessed_lesson: Option<LessonId>,
    last_accessed_at: Option<DateTime<Utc>>,
    enrolled_at: Option<DateTime<Utc>>,
}

impl CourseProgress {
    /// Creates the initial progress record written at enrollment time.
    #[must_use]
    pub fn enrolled(at: DateTime<Utc>) -> Self {
        Self {
            completed_lessons: Vec::new(),
            last_accessed_lesson: None,
            last_accessed_at: None,
            enrolled_at: Some(at),
        }
    }

    /// Creates the read-time default for a user with no persisted entry.
    ///
    /// This value is a convenience for callers and is never written back;
    /// its presence does not prove enrollment.
    #[must_use]
    pub fn detached() -> Self {
        Self {
            completed_lessons: Vec::new(),
            last_accessed_lesson: None,
            last_accessed_at: None,
            enrolled_at: None,
        }
    }

    /// Rehydrates a progress record from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::AccessFieldsMismatch` if exactly one of the
    /// last-accessed fields is present, or
    /// `ProgressError::DuplicateCompletedLesson` if a lesson appears twice.
    pub fn from_persisted(
        completed_lessons: Vec<LessonId>,
        last_accessed_lesson: Option<LessonId>,
        last_accessed_at: Option<DateTime<Utc>>,
        enrolled_at: Option<DateTime<Utc>>,
    ) -> Result<Self, ProgressError> {
        if last_accessed_lesson.is_some() != last_accessed_at.is_some() {
            return Err(ProgressError::AccessFieldsMismatch);
        }
        for (i, lesson) in completed_lessons.iter().enumerate() {
            if completed_lessons[..i].contains(lesson) {
                return Err(ProgressError::DuplicateCompletedLesson(lesson.clone()));
            }
        }
        Ok(Self {
            completed_lessons,
            last_accessed_lesson,
            last_accessed_at,
            enrolled_at,
        })
    }

    /// Records that the user opened a lesson. Last write wins.
    pub fn record_access(&mut self, lesson: LessonId, now: DateTime<Utc>) {
        self.last_accessed_lesson = Some(lesson);
        self.last_accessed_at = Some(now);
    }

    /// Marks a lesson completed and records the access.
    ///
    /// Returns `false` if the lesson was already completed; the completed
    /// set is unchanged in that case.
    pub fn mark_completed(&mut self, lesson: LessonId, now: DateTime<Utc>) -> bool {
        if self.completed_lessons.contains(&lesson) {
            return false;
        }
        self.completed_lessons.push(lesson.clone());
        self.record_access(lesson, now);
        true
    }

    #[must_use]
    pub fn completed_lessons(&self) -> &[LessonId] {
        &self.completed_lessons
    }

    #[must_use]
    pub fn completed_count(&self) -> usize {
        self.completed_lessons.len()
    }

    #[must_use]
    pub fn is_completed(&self, lesson: &LessonId) -> bool {
        self.completed_lessons.contains(lesson)
    }

    /// The most recently completed lesson, if any.
    #[must_use]
    pub fn last_completed_lesson(&self) -> Option<&LessonId> {
        self.completed_lessons.last()
    }

    #[must_use]
    pub fn last_accessed_lesson(&self) -> Option<&LessonId> {
        self.last_accessed_lesson.as_ref()
    }

    #[must_use]
    pub fn last_accessed_at(&self) -> Option<DateTime<Utc>> {
        self.last_accessed_at
    }

    #[must_use]
    pub fn enrolled_at(&self) -> Option<DateTime<Utc>> {
        self.enrolled_at
    }

    /// Returns true if this record was created by an enrollment.
    #[must_use]
    pub fn is_enrolled(&self) -> bool {
        self.enrolled_at.is_some()
    }

    // ─── Derived queries (UI layers render these, never compute them) ──────

    /// Completion percentage for the given course, rounded to the nearest
    /// whole percent. Only lessons that actually belong to the course are
    /// counted, so a stray completed ID can never push this past 100.
    #[must_use]
    pub fn percent_complete(&self, course: &Course) -> u8 {
        let total = course.lessons().len();
        if total == 0 {
            return 0;
        }
        let completed = self
            .completed_lessons
            .iter()
            .filter(|id| course.contains_lesson(id))
            .count();
        #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
        let percent = ((completed as f64 / total as f64) * 100.0).round() as u8;
        percent
    }

    /// The first lesson, in course order, not yet completed.
    #[must_use]
    pub fn next_incomplete_lesson<'a>(&self, course: &'a Course) -> Option<&'a Lesson> {
        course
            .lessons()
            .iter()
            .find(|lesson| !self.is_completed(lesson.id()))
    }
}

// ─── Tests ─────────────────────────────────────────────────────────────────────
