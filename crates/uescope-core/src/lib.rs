//! Live-memory object-graph inspector for processes embedding an Unreal
//! Engine-style reflection runtime.
//!
//! Given a process id, the core attaches read-only, locates the NamePool and
//! GUObjectArray registries behind the target's module base, parses them into
//! immutable per-attach snapshots, and answers package/search/instance
//! queries that re-enter the remote reader for live values.

pub mod cancel;
pub mod discovery;
pub mod error;
pub mod events;
pub mod layout;
pub mod memory;
pub mod names;
pub mod objects;
pub mod query;
pub mod reflect;
pub mod session;
pub mod store;

#[cfg(test)]
pub mod fixture;

pub use cancel::CancelToken;
pub use error::{Error, Result};
pub use events::{EventBus, NamePoolProgress, ObjectArrayProgress, ProgressEvent};
pub use layout::{FileVersion, LayoutProfile, UeGeneration};
pub use memory::{list_processes, ModuleInfo, ModuleMap, ProcessHandle, ProcessInfo, ReadMemory};
pub use names::{NamePoolReader, NameTable};
pub use objects::{ObjectRecord, ObjectTable};
pub use session::Session;
pub use store::{Latch, Storage};
