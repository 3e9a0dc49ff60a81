//! Write-once storage for everything parsed out of the target.
//!
//! Each parsed artifact sits behind a `Latch`: absent until its single
//! writer installs it, then immutable for the rest of the attach. Install is
//! an atomic publish, so readers take no locks and see either "absent" or
//! the fully built snapshot.

use std::sync::{Mutex, OnceLock};

use crate::error::{Error, Result};
use crate::layout::{FileVersion, LayoutProfile};
use crate::names::NameTable;
use crate::objects::{ObjectIndex, ObjectTable, PackageIndex};

/// A write-once slot guarding one parsed artifact.
pub struct Latch<T> {
    name: &'static str,
    slot: OnceLock<std::sync::Arc<T>>,
}

impl<T> Latch<T> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            slot: OnceLock::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_initialized(&self) -> bool {
        self.slot.get().is_some()
    }

    /// The installed snapshot, or `NotReady` naming this latch.
    pub fn get(&self) -> Result<std::sync::Arc<T>> {
        self.slot
            .get()
            .cloned()
            .ok_or(Error::NotReady {
                component: self.name,
            })
    }

    pub fn peek(&self) -> Option<std::sync::Arc<T>> {
        self.slot.get().cloned()
    }

    /// Install the snapshot. Fails if a writer already installed one.
    pub fn set(&self, value: T) -> Result<std::sync::Arc<T>> {
        let arc = std::sync::Arc::new(value);
        self.slot
            .set(std::sync::Arc::clone(&arc))
            .map_err(|_| Error::AlreadyInitialized {
                component: self.name,
            })?;
        Ok(arc)
    }
}

/// All per-attach state. Constructed on attach, dropped on detach; nothing
/// survives across attaches.
pub struct Storage {
    pub version: Latch<FileVersion>,
    pub profile: Latch<LayoutProfile>,
    pub name_pool_base: Latch<u64>,
    pub object_array_base: Latch<u64>,
    pub gworld_base: Latch<u64>,
    pub names: Latch<NameTable>,
    pub objects: Latch<ObjectTable>,
    pub object_index: Latch<ObjectIndex>,
    pub packages: Latch<PackageIndex>,

    // Coalescing guards: concurrent invocations of the same parser serialize
    // here, and the second caller observes the first one's latch.
    pub(crate) name_parse_guard: Mutex<()>,
    pub(crate) object_parse_guard: Mutex<()>,
}

impl Storage {
    pub fn new() -> Self {
        Self {
            version: Latch::new("UEVersion"),
            profile: Latch::new("LayoutProfile"),
            name_pool_base: Latch::new("NamePool"),
            object_array_base: Latch::new("GUObjectArray"),
            gworld_base: Latch::new("GWorld"),
            names: Latch::new("NameTable"),
            objects: Latch::new("ObjectTable"),
            object_index: Latch::new("ObjectIndex"),
            packages: Latch::new("PackageIndex"),
            name_parse_guard: Mutex::new(()),
            object_parse_guard: Mutex::new(()),
        }
    }
}

impl Default for Storage {
    fn default() -> Self {
        Self::new()
    }
}
