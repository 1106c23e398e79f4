//! Database models split into domain-specific modules.

pub mod account;
pub mod class;
pub mod exam;
pub mod payment;
pub mod reminder;
pub mod student;

pub use account::*;
pub use class::*;
pub use exam::*;
pub use payment::*;
pub use reminder::*;
pub use student::*;
pub use test::*;
