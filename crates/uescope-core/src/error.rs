use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("No process attached")]
    NotAttached,

    #[error("Failed to read {len} bytes at {address:#x} while resolving {field}")]
    ReadFault {
        address: u64,
        len: usize,
        field: String,
    },

    #[error("{component} is not initialized yet")]
    NotReady { component: &'static str },

    #[error("{component} is already initialized")]
    AlreadyInitialized { component: &'static str },

    #[error("{what} not found: {key}")]
    NotFound { what: &'static str, key: String },

    #[error("Corrupt layout in {location}")]
    CorruptLayout { location: String },

    #[error("No layout profile for UE major version {major}")]
    UnsupportedVersion { major: u32 },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Process error: {0}")]
    Process(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a ReadFault for a single failed remote read
    pub fn read_fault(address: u64, len: usize, field: impl Into<String>) -> Self {
        Self::ReadFault {
            address,
            len,
            field: field.into(),
        }
    }

    /// Relabel the field of a ReadFault; other variants pass through unchanged
    pub fn with_field(self, field: impl Into<String>) -> Self {
        match self {
            Self::ReadFault { address, len, .. } => Self::ReadFault {
                address,
                len,
                field: field.into(),
            },
            other => other,
        }
    }

    /// Create a NotFound error
    pub fn not_found(what: &'static str, key: impl Into<String>) -> Self {
        Self::NotFound {
            what,
            key: key.into(),
        }
    }

    /// Create a CorruptLayout error
    pub fn corrupt_layout(location: impl Into<String>) -> Self {
        Self::CorruptLayout {
            location: location.into(),
        }
    }

    /// Check whether this error came from a failed or rejected remote read
    pub fn is_read_fault(&self) -> bool {
        matches!(self, Self::ReadFault { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_field_relabels_read_fault() {
        let err = Error::read_fault(0x1000, 8, "memory").with_field("RootComponent");
        match err {
            Error::ReadFault { address, field, .. } => {
                assert_eq!(address, 0x1000);
                assert_eq!(field, "RootComponent");
            }
            other => panic!("unexpected variant: {other}"),
        }
    }

    #[test]
    fn test_with_field_passes_other_variants() {
        let err = Error::NotAttached.with_field("anything");
        assert!(matches!(err, Error::NotAttached));
    }

    #[test]
    fn test_not_ready_names_component() {
        let err = Error::NotReady {
            component: "NamePool",
        };
        assert!(err.to_string().contains("NamePool"));
    }
}
