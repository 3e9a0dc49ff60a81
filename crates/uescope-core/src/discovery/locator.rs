//! Locators for the three engine globals.
//!
//! Each locator runs the same kernel: scan the curated signatures against
//! the main module, resolve the RIP-relative operand, and validate the
//! candidate against a small structural fingerprint. When every signature
//! fails, a bounded proximity walk around a pivot address tries the same
//! fingerprint at a fixed stride.

use tracing::{debug, warn};

use crate::discovery::probe::walk_window;
use crate::discovery::scanner::{resolve_rip, scan_range};
use crate::discovery::signature::SignatureSet;
use crate::error::{Error, Result};
use crate::layout::{LayoutProfile, OBJECTS_PER_CHUNK};
use crate::memory::{ModuleInfo, ReadMemory};
use crate::names::NamePoolReader;

/// Half-width of the fallback probe window.
const FALLBACK_WINDOW: u64 = 0x10_0000;
/// Stride of the fallback probe (globals are pointer-aligned).
const FALLBACK_STRIDE: u64 = 8;
/// Longest name accepted when fingerprinting the first pool entry.
const MAX_FIRST_ENTRY_LEN: u16 = 64;

pub struct Discovery<'a, R: ReadMemory + ?Sized> {
    reader: &'a R,
    profile: &'a LayoutProfile,
    module: &'a ModuleInfo,
    signatures: &'a SignatureSet,
    fallback_pivot: Option<u64>,
}

impl<'a, R: ReadMemory + ?Sized> Discovery<'a, R> {
    pub fn new(
        reader: &'a R,
        profile: &'a LayoutProfile,
        module: &'a ModuleInfo,
        signatures: &'a SignatureSet,
    ) -> Self {
        Self {
            reader,
            profile,
            module,
            signatures,
            fallback_pivot: None,
        }
    }

    /// Override the pivot of the proximity fallback (defaults to the module
    /// base).
    pub fn with_fallback_pivot(mut self, pivot: u64) -> Self {
        self.fallback_pivot = Some(pivot);
        self
    }

    /// Locate the NamePool allocator.
    pub fn locate_name_pool(&self) -> Result<u64> {
        self.locate("NamePool", |cand| self.validate_name_pool(cand))
    }

    /// Locate the global object array. `name_pool_base`, when already
    /// known, strengthens validation by resolving the first object's class
    /// name through the pool.
    pub fn locate_object_array(&self, name_pool_base: Option<u64>) -> Result<u64> {
        self.locate("GUObjectArray", |cand| {
            self.validate_object_array(cand, name_pool_base)
        })
    }

    /// Locate the GWorld global slot.
    pub fn locate_gworld(&self, name_pool_base: Option<u64>) -> Result<u64> {
        let entry = self
            .signatures
            .entry("GWorld")
            .ok_or_else(|| Error::not_found("GWorld", "no signatures for target"))?;

        // Signature path accepts a null slot (no world loaded yet).
        for (idx, sig) in entry.signatures.iter().enumerate() {
            if let Some(found) = self.try_signature("GWorld", idx, sig, |cand| {
                self.reader
                    .read_ptr(cand)
                    .is_ok_and(|v| v == 0 || self.reader.is_pointer(v))
            }) {
                return Ok(found);
            }
        }

        // The fallback cannot accept nulls; it demands a live World.
        if let Some(found) = self.fallback_walk(|cand| self.validate_gworld(cand, name_pool_base)) {
            warn!("GWorld located by proximity fallback at {found:#x}");
            return Ok(found);
        }

        Err(Error::not_found("GWorld", "all signatures failed"))
    }

    fn locate(&self, target: &'static str, validate: impl Fn(u64) -> bool) -> Result<u64> {
        let entry = self
            .signatures
            .entry(target)
            .ok_or_else(|| Error::not_found(target, "no signatures for target"))?;

        for (idx, sig) in entry.signatures.iter().enumerate() {
            if let Some(found) = self.try_signature(target, idx, sig, &validate) {
                return Ok(found);
            }
        }

        if let Some(found) = self.fallback_walk(&validate) {
            warn!("{target} located by proximity fallback at {found:#x}");
            return Ok(found);
        }

        Err(Error::not_found(target, "all signatures failed"))
    }

    fn try_signature(
        &self,
        target: &str,
        idx: usize,
        sig: &crate::discovery::signature::CodeSignature,
        validate: impl Fn(u64) -> bool,
    ) -> Option<u64> {
        let pattern = match sig.pattern_bytes() {
            Ok(pattern) => pattern,
            Err(e) => {
                warn!("{target}: signature {idx} unparsable: {e}");
                return None;
            }
        };

        let matches = scan_range(self.reader, self.module.base, self.module.size, &pattern);
        if matches.is_empty() {
            debug!("{target}: signature {idx} not found");
            return None;
        }

        for m in matches {
            match resolve_rip(self.reader, m, sig.disp_offset, sig.instr_len) {
                Ok(cand) if validate(cand) => {
                    debug!("{target}: signature {idx} resolved {cand:#x}");
                    return Some(cand);
                }
                Ok(cand) => {
                    debug!("{target}: signature {idx} candidate {cand:#x} failed validation");
                }
                Err(e) => {
                    debug!("{target}: signature {idx} displacement unreadable: {e}");
                }
            }
        }
        None
    }

    fn fallback_walk(&self, validate: impl Fn(u64) -> bool) -> Option<u64> {
        let pivot = self.fallback_pivot.unwrap_or(self.module.base);
        walk_window(
            pivot.saturating_sub(FALLBACK_WINDOW),
            pivot.saturating_add(FALLBACK_WINDOW),
            FALLBACK_STRIDE,
            validate,
        )
    }

    /// NamePool fingerprint: the first block pointer is live and its first
    /// entry header describes a short printable ASCII name.
    fn validate_name_pool(&self, cand: u64) -> bool {
        let Ok(block0) = self.reader.read_ptr(cand + self.profile.name_pool_blocks) else {
            return false;
        };
        if !self.reader.is_pointer(block0) {
            return false;
        }

        let Ok(header) = self.reader.read_u16(block0) else {
            return false;
        };
        let len = header >> 6;
        if len == 0 || len > MAX_FIRST_ENTRY_LEN {
            return false;
        }

        let data = block0 + self.profile.name_entry_header_size;
        match self.reader.read_bytes(data, len as usize) {
            Ok(bytes) => bytes.iter().all(|b| b.is_ascii_graphic()),
            Err(_) => false,
        }
    }

    /// GUObjectArray fingerprint: chunk table and first chunk are live, the
    /// first element's object is a valid pointer whose class pointer is
    /// itself valid, the element stride holds, and the first object's
    /// InternalIndex is zero.
    fn validate_object_array(&self, cand: u64, name_pool_base: Option<u64>) -> bool {
        let p = self.profile;

        let Ok(objects_ptr) = self.reader.read_ptr(cand) else {
            return false;
        };
        if !self.reader.is_pointer(objects_ptr) {
            return false;
        }

        let (Ok(max_chunks), Ok(num_chunks)) = (
            self.reader.read_u32(cand + 0x18),
            self.reader.read_u32(cand + 0x1C),
        ) else {
            return false;
        };
        if num_chunks == 0 || max_chunks == 0 || num_chunks > max_chunks {
            return false;
        }
        let Ok(num_elements) = self.reader.read_u32(cand + 0x14) else {
            return false;
        };
        if u64::from(num_elements) > u64::from(num_chunks) * OBJECTS_PER_CHUNK {
            return false;
        }

        let Ok(chunk0) = self.reader.read_ptr(objects_ptr) else {
            return false;
        };
        if !self.reader.is_pointer(chunk0) {
            return false;
        }

        let Ok(first_object) = self.reader.read_ptr(chunk0 + p.uobject_item_object_offset) else {
            return false;
        };
        if !self.reader.is_pointer(first_object) {
            return false;
        }
        // Element stride check: the second item slot must also decode as
        // null-or-pointer.
        if let Ok(second) = self.reader.read_ptr(chunk0 + p.uobject_item_size) {
            if second != 0 && !self.reader.is_pointer(second) {
                return false;
            }
        }

        let Ok(index) = self.reader.read_i32(first_object + p.uobject_index) else {
            return false;
        };
        if index != 0 {
            return false;
        }

        let Ok(class_ptr) = self.reader.read_ptr(first_object + p.uobject_class) else {
            return false;
        };
        if !self.reader.is_pointer(class_ptr) {
            return false;
        }

        // Cross-validate through the pool when it is already located: the
        // class's name id must resolve to a non-empty string.
        if let Some(pool) = name_pool_base {
            let names = NamePoolReader::new(self.reader, self.profile, pool);
            let Ok(name_id) = self.reader.read_u32(class_ptr + p.uobject_name_id) else {
                return false;
            };
            if !names.read_name(name_id).is_ok_and(|n| !n.is_empty()) {
                return false;
            }
        }

        true
    }

    /// GWorld fallback fingerprint: the slot holds a pointer to an object
    /// whose class name resolves to `World`.
    fn validate_gworld(&self, cand: u64, name_pool_base: Option<u64>) -> bool {
        let Some(pool) = name_pool_base else {
            return false;
        };
        let Ok(world) = self.reader.read_ptr(cand) else {
            return false;
        };
        if !self.reader.is_pointer(world) {
            return false;
        }
        let p = self.profile;
        let Ok(class_ptr) = self.reader.read_ptr(world + p.uobject_class) else {
            return false;
        };
        if !self.reader.is_pointer(class_ptr) {
            return false;
        }
        let Ok(name_id) = self.reader.read_u32(class_ptr + p.uobject_name_id) else {
            return false;
        };
        let names = NamePoolReader::new(self.reader, self.profile, pool);
        names.read_name(name_id).is_ok_and(|n| n == "World")
    }
}
