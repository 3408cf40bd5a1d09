//! Crate-wide result alias.

use crate::errors::Error;

/// Result type used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;
