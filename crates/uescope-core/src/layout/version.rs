use std::fmt;

use serde::{Deserialize, Serialize};

/// File-version quad read from the primary module's version resource.
///
/// For UE games the major component tracks the engine generation; the rest is
/// a weak signal and is never used for layout decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileVersion {
    pub major: u32,
    pub minor: u32,
    pub build: u32,
    pub revision: u32,
}

impl FileVersion {
    /// The UE major version as reported to callers.
    pub fn ue_major(&self) -> u32 {
        self.major
    }
}

impl fmt::Display for FileVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.major, self.minor, self.build, self.revision
        )
    }
}
