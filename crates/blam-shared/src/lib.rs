//! Domain types shared by the Blam store gateway and client core.

pub mod catalog;
pub mod constants;
pub mod error;
pub mod models;
pub mod types;

pub use catalog::{builtin_communities, builtin_community};
pub use error::ValidationError;
pub use models::*;
pub use types::{CommentId, CommunityId, PostId, UserId};
