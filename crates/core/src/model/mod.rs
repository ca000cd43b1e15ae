mod course;
mod ids;
mod progress;
mod user;

pub use ids::{CourseId, LessonId, ParseIdError, UserId};

pub use course::{Course, CourseError, Lesson};
pub use progress::{CourseProgress, ProgressError};
pub use user::{User, UserError};
