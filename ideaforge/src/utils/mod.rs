//! Utility functions for identifiers and timestamps.

mod ids;
pub mod timestamps;

pub use ids::{generate_uuid, generate_uuid_v7, is_valid_project_id, MAX_PROJECT_ID_LEN};
pub use timestamps::{elapsed_ms, iso_timestamp, now_utc, Timestamp};
