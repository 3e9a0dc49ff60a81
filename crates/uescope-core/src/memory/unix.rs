//! Unix backend: memory reads through `/proc/<pid>/mem` and module
//! enumeration from `/proc/<pid>/maps`.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::os::unix::fs::FileExt;
use std::path::Path;

use crate::error::{Error, Result};
use crate::memory::modules::{ModuleInfo, ModuleMap};
use crate::memory::reader::{short_read, ReadMemory};

#[derive(Debug)]
pub struct ProcessMemory {
    mem: File,
}

impl ProcessMemory {
    pub fn open(pid: u32) -> Result<Self> {
        let path = format!("/proc/{pid}/mem");
        let mem = File::open(&path)
            .map_err(|e| Error::Process(format!("Failed to open {path}: {e}")))?;
        Ok(Self { mem })
    }
}

impl ReadMemory for ProcessMemory {
    fn read_bytes(&self, address: u64, len: usize) -> Result<Vec<u8>> {
        let mut buffer = vec![0u8; len];
        self.mem
            .read_exact_at(&mut buffer, address)
            .map_err(|_| short_read(address, len))?;
        Ok(buffer)
    }
}

/// Build the module map from `/proc/<pid>/maps`. Contiguous file-backed
/// mappings of the same path collapse into one module; the first path seen is
/// the main executable.
pub fn snapshot_modules(pid: u32) -> Result<ModuleMap> {
    let maps_path = format!("/proc/{pid}/maps");
    let file = File::open(&maps_path)
        .map_err(|e| Error::Process(format!("Failed to open {maps_path}: {e}")))?;

    let reader = BufReader::new(file);
    let mut modules: Vec<ModuleInfo> = Vec::new();

    for line in reader.lines() {
        let line = line.map_err(|e| Error::Process(format!("Failed to read maps: {e}")))?;
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 6 {
            continue;
        }

        let path = parts[5];
        if path.starts_with('[') {
            continue;
        }

        let (start, end) = match parts[0].split_once('-') {
            Some((s, e)) => (
                u64::from_str_radix(s, 16).unwrap_or(0),
                u64::from_str_radix(e, 16).unwrap_or(0),
            ),
            None => continue,
        };

        if let Some(module) = modules.iter_mut().find(|m| m.path == path) {
            // Extend an already-seen module over its later mappings.
            if end > module.base + module.size {
                module.size = end - module.base;
            }
            continue;
        }

        let name = Path::new(path)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("")
            .to_string();

        modules.push(ModuleInfo {
            name,
            path: path.to_string(),
            base: start,
            size: end - start,
        });
    }

    if modules.is_empty() {
        return Err(Error::Process(format!("No modules found for PID {pid}")));
    }
    Ok(ModuleMap::from_modules(modules))
}
