//! Data Transfer Objects for REST request/response serialization.
//!
//! Checkpoint kinds travel as their display labels (`"Exit Factory"`);
//! snake_case aliases are accepted on input.

pub mod admin_dto;
pub mod common_dto;
pub mod history_dto;
pub mod trip_dto;

pub use admin_dto::*;
pub use common_dto::*;
pub use history_dto::*;
pub use trip_dto::*;
