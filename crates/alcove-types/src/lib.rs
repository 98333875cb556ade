pub mod access;
pub mod api;
pub mod error;
pub mod models;

pub use access::{AccessMode, OperationKind};
pub use error::{Error, Result};
pub use models::{ContentItem, ContentKind, ItemMetadata, Payload, Room, RoomTtl};
