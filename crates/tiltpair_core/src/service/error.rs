//! Picker error taxonomy.
//!
//! Every variant keeps its underlying cause reachable through
//! [`Error::source`].

use crate::metadata::{MdLocation, MetadataError};
use crate::model::family::FamilyError;
use crate::model::micrograph::{MicrographId, ParticleError};
use crate::repo::record_store::StoreError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type PickerResult<T> = Result<T, PickerError>;

/// Why the top-level pair list could not be loaded.
#[derive(Debug)]
pub enum ConfigurationCause {
    Store(StoreError),
    Field(MetadataError),
    NoMicrographs,
    DuplicateMicrograph(String),
    /// Two images share a stem, so their picks would land in one sidecar.
    SidecarClash {
        sidecar: String,
        first: String,
        second: String,
    },
}

impl Display for ConfigurationCause {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Store(err) => write!(f, "{err}"),
            Self::Field(err) => write!(f, "{err}"),
            Self::NoMicrographs => write!(f, "no micrographs specified"),
            Self::DuplicateMicrograph(file) => {
                write!(f, "micrograph `{file}` is listed more than once")
            }
            Self::SidecarClash {
                sidecar,
                first,
                second,
            } => write!(
                f,
                "micrographs `{first}` and `{second}` both map to sidecar `{sidecar}`"
            ),
        }
    }
}

/// Failures surfaced by picker construction, mutation and save.
#[derive(Debug)]
pub enum PickerError {
    /// The selfile is unreadable, incomplete or empty; the picker cannot exist.
    Configuration {
        selfile: MdLocation,
        cause: ConfigurationCause,
    },
    /// A tilted sidecar holds more records than its untilted sidecar.
    OutOfRange {
        micrograph: String,
        untilted: usize,
        tilted: usize,
    },
    /// A pair's image path has no record in the selfile at save time.
    InconsistentStore {
        micrograph: String,
        selfile: MdLocation,
    },
    /// I/O failure while committing; the commit stopped at `location`.
    Persistence {
        location: MdLocation,
        source: StoreError,
    },
    UnknownMicrograph(usize),
    Particle {
        micrograph: String,
        source: ParticleError,
    },
    InvalidFamily(FamilyError),
}

impl Display for PickerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Configuration { selfile, cause } => {
                write!(f, "invalid tilt pair selfile {selfile}: {cause}")
            }
            Self::OutOfRange {
                micrograph,
                untilted,
                tilted,
            } => write!(
                f,
                "micrograph `{micrograph}` has {tilted} tilted particles but only {untilted} untilted particles"
            ),
            Self::InconsistentStore {
                micrograph,
                selfile,
            } => write!(f, "micrograph `{micrograph}` has no record in {selfile}"),
            Self::Persistence { location, source } => {
                write!(f, "failed to save {location}: {source}")
            }
            Self::UnknownMicrograph(index) => write!(f, "no micrograph at position {index}"),
            Self::Particle { micrograph, source } => {
                write!(f, "invalid particle operation on `{micrograph}`: {source}")
            }
            Self::InvalidFamily(err) => write!(f, "{err}"),
        }
    }
}

impl Error for PickerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Configuration { cause, .. } => match cause {
                ConfigurationCause::Store(err) => Some(err),
                ConfigurationCause::Field(err) => Some(err),
                ConfigurationCause::NoMicrographs
                | ConfigurationCause::DuplicateMicrograph(_)
                | ConfigurationCause::SidecarClash { .. } => None,
            },
            Self::Persistence { source, .. } => Some(source),
            Self::Particle { source, .. } => Some(source),
            Self::InvalidFamily(err) => Some(err),
            Self::OutOfRange { .. } | Self::InconsistentStore { .. } | Self::UnknownMicrograph(_) => {
                None
            }
        }
    }
}

impl From<FamilyError> for PickerError {
    fn from(value: FamilyError) -> Self {
        Self::InvalidFamily(value)
    }
}

/// Underlying reason a pair's sidecar could not be read.
#[derive(Debug)]
pub enum PairLoadCause {
    Store(StoreError),
    Field(MetadataError),
}

impl From<StoreError> for PairLoadCause {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

impl From<MetadataError> for PairLoadCause {
    fn from(value: MetadataError) -> Self {
        Self::Field(value)
    }
}

/// Recoverable per-pair load failure; the pair is left without data.
#[derive(Debug)]
pub struct PairLoadError {
    pub micrograph: MicrographId,
    pub location: MdLocation,
    pub cause: PairLoadCause,
}

impl Display for PairLoadError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.cause {
            PairLoadCause::Store(err) => write!(f, "cannot read {}: {err}", self.location),
            PairLoadCause::Field(err) => write!(f, "bad record in {}: {err}", self.location),
        }
    }
}

impl Error for PairLoadError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.cause {
            PairLoadCause::Store(err) => Some(err),
            PairLoadCause::Field(err) => Some(err),
        }
    }
}
