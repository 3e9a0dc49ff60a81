use serde::Serialize;
use sysinfo::System;

use crate::error::{Error, Result};
use crate::layout::FileVersion;
use crate::memory::modules::{ModuleInfo, ModuleMap};
use crate::memory::reader::ReadMemory;

#[cfg(unix)]
use crate::memory::unix as os;
#[cfg(windows)]
use crate::memory::windows as os;

/// One row of the system process listing.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessInfo {
    pub pid: u32,
    pub name: String,
}

/// Enumerate running processes that have a backing executable, sorted by
/// name. Kernel threads and the like are dropped.
pub fn list_processes() -> Vec<ProcessInfo> {
    let mut sys = System::new_all();
    sys.refresh_processes();

    let mut processes: Vec<ProcessInfo> = sys
        .processes()
        .iter()
        .filter(|(_, process)| process.exe().is_some())
        .map(|(pid, process)| ProcessInfo {
            pid: pid.as_u32(),
            name: process.name().to_string(),
        })
        .collect();

    processes.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
    processes
}

/// An attached target process: OS read handle plus the module map captured
/// at attach time. Dropped on detach, which closes the handle.
#[derive(Debug)]
pub struct ProcessHandle {
    pub pid: u32,
    pub name: String,
    pub exe_path: String,
    memory: os::ProcessMemory,
    modules: ModuleMap,
}

impl ProcessHandle {
    /// Open the target for reading and snapshot its loaded modules.
    pub fn attach(pid: u32, name: &str) -> Result<Self> {
        let memory = os::ProcessMemory::open(pid)?;
        let modules = os::snapshot_modules(pid)?;

        let mut sys = System::new_all();
        sys.refresh_processes();
        let exe_path = sys
            .process(sysinfo::Pid::from_u32(pid))
            .and_then(|p| p.exe())
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(Self {
            pid,
            name: name.to_string(),
            exe_path,
            memory,
            modules,
        })
    }

    pub fn modules(&self) -> &ModuleMap {
        &self.modules
    }

    /// The primary module (the executable itself).
    pub fn main_module(&self) -> Result<&ModuleInfo> {
        self.modules
            .main()
            .ok_or_else(|| Error::Process("Module map is empty".to_string()))
    }

    /// Read the file-version quad of the primary module.
    ///
    /// Only Windows executables carry a version resource; elsewhere the
    /// caller falls back to a degraded layout profile.
    pub fn file_version(&self) -> Result<FileVersion> {
        #[cfg(windows)]
        {
            os::read_file_version(&self.exe_path)
        }
        #[cfg(not(windows))]
        {
            Err(Error::Process(
                "File version metadata is only available for Windows targets".to_string(),
            ))
        }
    }
}

impl ReadMemory for ProcessHandle {
    fn read_bytes(&self, address: u64, len: usize) -> Result<Vec<u8>> {
        self.memory.read_bytes(address, len)
    }
}
