//! Win32 backend: process handle, memory reads, module snapshot and
//! file-version metadata.

use std::ffi::c_void;
use std::os::windows::ffi::OsStrExt;

use windows::core::PCWSTR;
use windows::Win32::Foundation::{CloseHandle, HANDLE};
use windows::Win32::Storage::FileSystem::{
    GetFileVersionInfoSizeW, GetFileVersionInfoW, VerQueryValueW, VS_FIXEDFILEINFO,
};
use windows::Win32::System::Diagnostics::Debug::ReadProcessMemory;
use windows::Win32::System::Diagnostics::ToolHelp::{
    CreateToolhelp32Snapshot, Module32FirstW, Module32NextW, MODULEENTRY32W, TH32CS_SNAPMODULE,
    TH32CS_SNAPMODULE32,
};
use windows::Win32::System::Threading::{OpenProcess, PROCESS_QUERY_INFORMATION, PROCESS_VM_READ};

use crate::error::{Error, Result};
use crate::layout::FileVersion;
use crate::memory::modules::{ModuleInfo, ModuleMap};
use crate::memory::reader::{short_read, ReadMemory};

#[derive(Debug)]
pub struct ProcessMemory {
    handle: HANDLE,
}

// Win32 process handles used for memory reading are thread-safe.
unsafe impl Send for ProcessMemory {}
unsafe impl Sync for ProcessMemory {}

impl ProcessMemory {
    /// Open a read-only handle to the target process.
    pub fn open(pid: u32) -> Result<Self> {
        let handle = unsafe { OpenProcess(PROCESS_VM_READ | PROCESS_QUERY_INFORMATION, false, pid) }
            .map_err(|e| Error::Process(format!("Failed to open process PID {pid}: {e}")))?;

        if handle.is_invalid() {
            return Err(Error::Process(format!("Invalid handle for PID {pid}")));
        }

        Ok(Self { handle })
    }
}

impl ReadMemory for ProcessMemory {
    fn read_bytes(&self, address: u64, len: usize) -> Result<Vec<u8>> {
        let mut buffer = vec![0u8; len];
        let mut bytes_read = 0usize;

        let status = unsafe {
            ReadProcessMemory(
                self.handle,
                address as *const c_void,
                buffer.as_mut_ptr() as *mut c_void,
                len,
                Some(&mut bytes_read),
            )
        };

        if status.is_ok() && bytes_read == len {
            Ok(buffer)
        } else {
            Err(short_read(address, len))
        }
    }
}

impl Drop for ProcessMemory {
    fn drop(&mut self) {
        if !self.handle.is_invalid() {
            unsafe {
                let _ = CloseHandle(self.handle);
            }
        }
    }
}

fn wide_to_string(wide: &[u16]) -> String {
    let end = wide.iter().position(|&c| c == 0).unwrap_or(wide.len());
    String::from_utf16_lossy(&wide[..end])
}

/// Snapshot the loaded modules of a process. The first module returned by the
/// Toolhelp enumeration is always the main executable.
pub fn snapshot_modules(pid: u32) -> Result<ModuleMap> {
    unsafe {
        let snapshot = CreateToolhelp32Snapshot(TH32CS_SNAPMODULE | TH32CS_SNAPMODULE32, pid)
            .map_err(|e| Error::Process(format!("Failed to create toolhelp snapshot: {e}")))?;

        if snapshot.is_invalid() {
            return Err(Error::Process(
                "Invalid handle for toolhelp snapshot".to_string(),
            ));
        }

        let mut entry = MODULEENTRY32W {
            dwSize: std::mem::size_of::<MODULEENTRY32W>() as u32,
            ..Default::default()
        };

        let mut modules = Vec::new();
        if Module32FirstW(snapshot, &mut entry).is_ok() {
            loop {
                modules.push(ModuleInfo {
                    name: wide_to_string(&entry.szModule),
                    path: wide_to_string(&entry.szExePath),
                    base: entry.modBaseAddr as u64,
                    size: entry.modBaseSize as u64,
                });
                if Module32NextW(snapshot, &mut entry).is_err() {
                    break;
                }
            }
        }

        let _ = CloseHandle(snapshot);

        if modules.is_empty() {
            return Err(Error::Process(format!("No modules found for PID {pid}")));
        }
        Ok(ModuleMap::from_modules(modules))
    }
}

/// Read the VS_FIXEDFILEINFO version quad of an executable on disk.
pub fn read_file_version(exe_path: &str) -> Result<FileVersion> {
    if exe_path.is_empty() {
        return Err(Error::Process("Executable path is unknown".to_string()));
    }

    unsafe {
        let path: Vec<u16> = std::ffi::OsStr::new(exe_path)
            .encode_wide()
            .chain(std::iter::once(0))
            .collect();
        let pcwstr = PCWSTR::from_raw(path.as_ptr());

        let mut dummy = 0;
        let size = GetFileVersionInfoSizeW(pcwstr, Some(&mut dummy));
        if size == 0 {
            return Err(Error::Process("Failed to get version info size".to_string()));
        }

        let mut buffer = vec![0u8; size as usize];
        if GetFileVersionInfoW(pcwstr, 0, size, buffer.as_mut_ptr() as *mut c_void).is_err() {
            return Err(Error::Process("Failed to get file version info".to_string()));
        }

        let mut info_ptr = std::ptr::null_mut();
        let mut len = 0;
        let root = windows::core::w!("\\");
        if !VerQueryValueW(buffer.as_ptr() as *const c_void, root, &mut info_ptr, &mut len).as_bool()
        {
            return Err(Error::Process("Failed to query version info".to_string()));
        }

        if info_ptr.is_null() || len == 0 {
            return Err(Error::Process("Invalid version info pointer".to_string()));
        }

        let fixed_info = &*(info_ptr as *const VS_FIXEDFILEINFO);
        Ok(FileVersion {
            major: fixed_info.dwFileVersionMS >> 16,
            minor: fixed_info.dwFileVersionMS & 0xFFFF,
            build: fixed_info.dwFileVersionLS >> 16,
            revision: fixed_info.dwFileVersionLS & 0xFFFF,
        })
    }
}
