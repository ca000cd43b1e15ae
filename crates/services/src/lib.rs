#![forbid(unsafe_code)]

pub mod catalog_service;
pub mod enrollment_service;
pub mod error;
pub mod progress_service;

pub use course_core::Clock;

pub use catalog_service::CatalogService;
pub use enrollment_service::EnrollmentService;
pub use error::{CatalogError, EnrollmentError, ProgressServiceError};
pub use progress_service::ProgressService;
