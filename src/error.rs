use std::{error, fmt, result};

use crate::stamps::Timestamp;

/// Result alias to reduce redundency in function return types
pub type Result<T> = result::Result<T, Error>;

/// Possible set error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A mutation carried a stamp of zero or below.
    ///
    /// Stamps are strictly positive so that an element the set has
    /// never seen can sit below every real stamp. Rejected mutations
    /// leave the set exactly as it was.
    InvalidTimestamp {
        /// The stamp that was rejected.
        stamp: Timestamp,
    },
}

impl error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::InvalidTimestamp { stamp } => {
                write!(f, "stamps must be strictly positive, got {}", stamp)
            }
        }
    }
}
