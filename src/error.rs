//! Error type for composite space construction.
use crate::element::DofKey;
use std::fmt;
use std::fmt::{Display, Formatter};

/// Library-wide error type.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// A rebuild was attempted without any configured source spaces.
    NoSourceSpaces,
    /// A merged basis was requested for an empty contributor list.
    EmptySituation {
        /// The cell for which the merged basis was requested.
        cell: usize,
    },
    /// The contributors on a cell are structurally incompatible with each other or with the
    /// geometry of the cell.
    StructuralMismatch { cell: usize, reason: String },
    /// Smart global dof linking was requested, but the dof identities reported by the
    /// contributors can not be linked consistently.
    UnsupportedLinking { cell: usize, key: DofKey },
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoSourceSpaces => write!(f, "Composite space has no source spaces"),
            Self::EmptySituation { cell } => {
                write!(f, "No contributing bases on cell {}", cell)
            }
            Self::StructuralMismatch { cell, reason } => {
                write!(f, "Structural mismatch on cell {}: {}", cell, reason)
            }
            Self::UnsupportedLinking { cell, key } => write!(
                f,
                "Can not link global dof (family {}, index {}) on cell {}",
                key.family, key.index, cell
            ),
        }
    }
}

impl std::error::Error for Error {}
