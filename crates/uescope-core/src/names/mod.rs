//! NamePool access: direct id-to-string reads and the chunked block parser.
//!
//! The pool is a list of blocks; each block is a contiguous slab of
//! variable-length entries. An entry starts with a 16-bit header encoding
//! the string length (`header >> 6`) and the wide-character bit
//! (`header & 1`). A name id is `(block_index << 16) | (byte_offset / stride)`.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::cancel::CancelToken;
use crate::error::{Error, Result};
use crate::events::{EventBus, NamePoolProgress, ProgressEvent};
use crate::layout::LayoutProfile;
use crate::memory::ReadMemory;

/// Longest plausible name entry; headers past this are treated as corrupt.
const MAX_NAME_LEN: usize = 1023;

/// Immutable id → string map installed into Storage after a full parse.
#[derive(Debug, Default)]
pub struct NameTable {
    entries: HashMap<u32, String>,
    skipped_blocks: u32,
}

impl NameTable {
    /// Resolve an id; missing ids resolve to `"None"`.
    pub fn resolve(&self, id: u32) -> &str {
        self.entries.get(&id).map(String::as_str).unwrap_or("None")
    }

    pub fn get(&self, id: u32) -> Option<&str> {
        self.entries.get(&id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Blocks abandoned because of malformed headers or failed reads.
    pub fn skipped_blocks(&self) -> u32 {
        self.skipped_blocks
    }
}

/// Reads names straight out of the target's pool.
pub struct NamePoolReader<'a, R: ReadMemory + ?Sized> {
    reader: &'a R,
    profile: &'a LayoutProfile,
    base: u64,
}

impl<'a, R: ReadMemory + ?Sized> NamePoolReader<'a, R> {
    pub fn new(reader: &'a R, profile: &'a LayoutProfile, base: u64) -> Self {
        Self {
            reader,
            profile,
            base,
        }
    }

    fn block_ptr(&self, block: u64) -> Result<u64> {
        self.reader
            .read_ptr(self.base + self.profile.name_pool_blocks + block * 8)
            .map_err(|e| e.with_field("NamePool block pointer"))
    }

    /// Resolve one name id with a single-shot remote read.
    ///
    /// Used by discovery validation and the raw analyzer before the full
    /// table exists.
    pub fn read_name(&self, id: u32) -> Result<String> {
        let block = (id >> 16) as u64;
        let offset = (id & 0xFFFF) as u64 * self.profile.name_block_stride;

        let block_ptr = self.block_ptr(block)?;
        let entry = block_ptr + offset;

        let header = self
            .reader
            .read_u16(entry)
            .map_err(|e| e.with_field("NameEntry header"))?;
        let len = (header >> 6) as usize;
        let wide = header & 1 == 1;

        if len == 0 || len > MAX_NAME_LEN {
            return Err(Error::corrupt_layout(format!(
                "NameEntry {id:#x}: length {len} out of range"
            )));
        }

        let data = entry + self.profile.name_entry_header_size;
        if wide {
            self.reader.read_utf16(data, len)
        } else {
            let bytes = self.reader.read_bytes(data, len)?;
            Ok(String::from_utf8_lossy(&bytes).into_owned())
        }
    }

    /// Walk every block and build the full name table.
    ///
    /// Emits one `fname-pool-progress` event per block. A malformed header
    /// stops its block and the walk continues with the next one; the final
    /// table reports how many blocks were cut short.
    pub fn parse(&self, events: &EventBus, cancel: &CancelToken) -> Result<NameTable> {
        let current_block = self
            .reader
            .read_u32(self.base + self.profile.name_pool_current_block)
            .map_err(|e| e.with_field("NamePool current block"))? as u64;
        let current_cursor = self
            .reader
            .read_u32(self.base + self.profile.name_pool_current_cursor)
            .map_err(|e| e.with_field("NamePool byte cursor"))? as u64;

        let total_blocks = current_block + 1;
        let block_size = self.profile.name_block_size();
        if current_cursor > block_size {
            return Err(Error::corrupt_layout(format!(
                "NamePool byte cursor {current_cursor:#x} exceeds block size"
            )));
        }

        let mut table = NameTable::default();

        for block in 0..total_blocks {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let used = if block == current_block {
                current_cursor
            } else {
                block_size
            };

            match self.block_ptr(block) {
                Ok(ptr) if ptr != 0 => self.walk_block(block, ptr, used, &mut table),
                _ => {
                    warn!("NamePool block {} unreadable, skipping", block);
                    table.skipped_blocks += 1;
                }
            }

            let current_names = table.len() as u32;
            let total_names = if block + 1 == total_blocks {
                current_names
            } else {
                // Estimate scales the density seen so far to the full pool.
                (current_names as u64 * total_blocks / (block + 1)) as u32
            };
            events.emit(ProgressEvent::NamePool(NamePoolProgress {
                current_chunk: (block + 1) as u32,
                total_chunks: total_blocks as u32,
                current_names,
                total_names,
            }));
        }

        debug!(
            "NamePool parse complete: {} names, {} skipped blocks",
            table.len(),
            table.skipped_blocks
        );
        Ok(table)
    }

    fn walk_block(&self, block: u64, block_ptr: u64, used: u64, table: &mut NameTable) {
        let buffer = match self.reader.read_bytes(block_ptr, used as usize) {
            Ok(buffer) => buffer,
            Err(_) => {
                warn!("NamePool block {} read failed at {:#x}", block, block_ptr);
                table.skipped_blocks += 1;
                return;
            }
        };

        let stride = self.profile.name_block_stride as usize;
        let header_size = self.profile.name_entry_header_size as usize;
        let mut offset = 0usize;

        while offset + header_size <= buffer.len() {
            let header = u16::from_le_bytes([buffer[offset], buffer[offset + 1]]);
            let len = (header >> 6) as usize;
            let wide = header & 1 == 1;

            // A zero length marks the end of the used part of the block.
            if len == 0 {
                break;
            }

            let payload = if wide { len * 2 } else { len };
            if len > MAX_NAME_LEN || offset + header_size + payload > buffer.len() {
                warn!(
                    "NamePool block {}: corrupt entry header at offset {:#x} (len {})",
                    block, offset, len
                );
                table.skipped_blocks += 1;
                break;
            }

            let id = ((block as u32) << 16) | (offset / stride) as u32;
            let data = &buffer[offset + header_size..offset + header_size + payload];
            let string = if wide {
                let units: Vec<u16> = data
                    .chunks_exact(2)
                    .map(|c| u16::from_le_bytes([c[0], c[1]]))
                    .collect();
                String::from_utf16_lossy(&units)
            } else {
                String::from_utf8_lossy(data).into_owned()
            };
            table.entries.insert(id, string);

            let aligned = payload.div_ceil(stride) * stride;
            offset += header_size + aligned;
        }
    }
}
