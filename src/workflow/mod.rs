//! The student–class–payment consistency workflow and the online-test
//! grading core. Handlers in `api` stay thin and delegate here; every
//! multi-entity mutation runs inside one SQLite transaction.

pub mod assign;
pub mod enrollment;
pub mod grading;
pub mod placement;

pub use enrollment::EnrollmentError;
pub use grading::GradingError;
