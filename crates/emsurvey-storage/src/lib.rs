//! Persistence layer for the survey service.
//!
//! All management data (users, roles, dictionaries, regions, surveys,
//! products, messages and operation logs) lives in one SeaORM-backed
//! database accessed through [`store::SurveyStore`]. Schema changes are
//! applied by the `migration` crate when the store is opened.

pub mod auth;
pub mod entities;
pub mod error;
pub mod store;


pub use error::{is_unique_violation, StorageError};
pub use store::SurveyStore;
