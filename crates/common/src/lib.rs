//! osmatch Common - Shared taxonomy, types and traits
//!
//! This crate provides the test-group catalogue, the data types and the
//! error type used across the osmatch workspace.

pub mod error;
pub mod taxonomy;
pub mod traits;
pub mod types;

// Re-export commonly used types
pub use error::{OsMatchError, OsMatchResult};
pub use taxonomy::{is_exception, TestGroup, EXCEPTION_TESTS};
pub use traits::Matcher;
pub use types::{
    MatchOptions, MatchPoints, ProbeGroup, QueryEvent, RankedMatch, NO_RESPONSE,
    RESPONSIVENESS_TEST,
};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
