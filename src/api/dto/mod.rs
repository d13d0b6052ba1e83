//! Data Transfer Objects for REST request/response serialization.
//!
//! Timestamps are RFC 3339 strings in UTC; marketplaces and priorities are
//! their lower-case slugs.

pub mod common_dto;
pub mod outcome_dto;
pub mod sync_dto;
pub mod webhook_dto;

pub use common_dto::*;
pub use outcome_dto::*;
pub use sync_dto::*;
pub use webhook_dto::*;
