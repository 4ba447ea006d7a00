//! Error types for tree construction and exchange.

use std::fmt;

/// Errors that can occur while building, exchanging or querying a partition tree.
#[derive(Debug)]
pub enum Error {
    /// An argument violates a precondition, e.g. an empty load profile
    /// or fewer grid cells than processes.
    InvalidArgument(String),

    /// An index into a rank or a local array is out of range.
    IndexOutOfRange {
        /// The offending index.
        index: usize,
        /// The number of valid entries.
        len: usize,
    },

    /// A serialized tree could not be decoded.
    Decode(String),

    /// A tree violates the structural invariants of a partition.
    InvalidTree(String),

    /// A collective operation failed on another rank.
    Collective(String),

    /// Writing a VTK file failed.
    Export(vtkio::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidArgument(msg) => write!(f, "invalid argument: {}", msg),
            Error::IndexOutOfRange { index, len } => {
                write!(f, "index {} out of range for length {}", index, len)
            }
            Error::Decode(msg) => write!(f, "decode error: {}", msg),
            Error::InvalidTree(msg) => write!(f, "invalid partition tree: {}", msg),
            Error::Collective(msg) => write!(f, "collective operation failed: {}", msg),
            Error::Export(err) => write!(f, "vtk export failed: {:?}", err),
        }
    }
}

impl std::error::Error for Error {}

impl From<vtkio::Error> for Error {
    fn from(err: vtkio::Error) -> Self {
        Self::Export(err)
    }
}

/// Result type of this crate.
pub type Result<T> = std::result::Result<T, Error>;
