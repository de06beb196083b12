//! Shared types for the EMS pre-sales survey service.
//!
//! Holds the request/response DTOs exchanged between the storage layer and
//! the HTTP API, snowflake id generation, and the static reference data
//! (questionnaire template, region presets) the service is built around.

pub mod id;
pub mod region;
pub mod template;
pub mod types;
