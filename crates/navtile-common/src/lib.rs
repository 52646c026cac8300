//! Common math and error types shared by the navtile crates

mod geometry;
mod vector;

pub use geometry::*;
pub use vector::*;

/// Represents a 3D position
pub type Vec3 = glam::Vec3;

/// Error types for the library
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("unknown agent type id: {0}")]
    UnknownAgentType(u32),

    #[error("no navigable surface found near the requested point")]
    SnapFailed,

    #[error("path endpoints resolve under the terrain surface")]
    PathInvalid,

    #[error("path is incomplete and a full path was required")]
    PathPartialRejected,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("navigation backend error: {0}")]
    Backend(String),
}

impl Error {
    /// Whether retrying the same request on a later tick can succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::SnapFailed | Error::PathPartialRejected | Error::Backend(_)
        )
    }
}

/// Result type for navtile operations
pub type Result<T> = std::result::Result<T, Error>;
