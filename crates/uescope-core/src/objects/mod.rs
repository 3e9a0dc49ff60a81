//! GUObjectArray traversal and the enriched object graph.
//!
//! The registry is a chunked pointer table: `Objects` points at an array of
//! chunk pointers, each chunk holding 64Ki `FUObjectItem`s. The raw pass
//! records every live slot; the enrichment pass resolves type names, dotted
//! full names and package grouping once the name table exists.

use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, warn};

use crate::cancel::CancelToken;
use crate::error::{Error, Result};
use crate::events::{EventBus, ObjectArrayProgress, ProgressEvent};
use crate::layout::{LayoutProfile, OBJECTS_PER_CHUNK};
use crate::memory::ReadMemory;
use crate::names::NameTable;

pub type ObjectId = u32;

/// Longest outer chain followed when building a full name.
const MAX_OUTER_DEPTH: usize = 16;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectRecord {
    pub id: ObjectId,
    pub address: u64,
    pub class_ptr: u64,
    pub outer_ptr: u64,
    pub name_id: u32,
    pub flags: u32,
    /// Resolved by the enrichment pass; empty until then.
    pub name: String,
    pub type_name: String,
    pub full_name: String,
    pub package: String,
}

/// Every slot of the target's array, in slot order. Ids equal the target's
/// `InternalIndex`, so they are stable within one attach.
#[derive(Debug, Default, PartialEq)]
pub struct ObjectTable {
    slots: Vec<Option<ObjectRecord>>,
    live: u32,
    skipped: u32,
}

impl ObjectTable {
    pub fn get(&self, id: ObjectId) -> Option<&ObjectRecord> {
        self.slots.get(id as usize).and_then(Option::as_ref)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ObjectRecord> {
        self.slots.iter().filter_map(Option::as_ref)
    }

    /// Total slots, including empty and unresolved ones.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn live_count(&self) -> u32 {
        self.live
    }

    /// Slots dropped by cross-validation or failed reads.
    pub fn skipped_count(&self) -> u32 {
        self.skipped
    }
}

/// Address → id lookup over the parsed table.
#[derive(Debug, Default)]
pub struct ObjectIndex {
    by_address: HashMap<u64, ObjectId>,
}

impl ObjectIndex {
    pub fn id_of(&self, address: u64) -> Option<ObjectId> {
        self.by_address.get(&address).copied()
    }

    pub fn contains(&self, address: u64) -> bool {
        self.by_address.contains_key(&address)
    }

    pub fn len(&self) -> usize {
        self.by_address.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_address.is_empty()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Package {
    pub name: String,
    pub object_ids: Vec<ObjectId>,
}

/// Packages sorted ascending by name.
#[derive(Debug, Default)]
pub struct PackageIndex {
    packages: Vec<Package>,
}

impl PackageIndex {
    pub fn iter(&self) -> impl Iterator<Item = &Package> {
        self.packages.iter()
    }

    pub fn get(&self, name: &str) -> Option<&Package> {
        self.packages
            .binary_search_by(|p| p.name.as_str().cmp(name))
            .ok()
            .map(|i| &self.packages[i])
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

fn is_field_like(type_name: &str) -> bool {
    type_name.contains("Property") || type_name.contains("Function")
}

pub struct ObjectArrayParser<'a, R: ReadMemory + ?Sized> {
    reader: &'a R,
    profile: &'a LayoutProfile,
    base: u64,
}

impl<'a, R: ReadMemory + ?Sized> ObjectArrayParser<'a, R> {
    pub fn new(reader: &'a R, profile: &'a LayoutProfile, base: u64) -> Self {
        Self {
            reader,
            profile,
            base,
        }
    }

    /// Raw pass: walk every chunk and record live slots.
    ///
    /// Slot-level faults (unreadable headers, index mismatches, bad
    /// pointers) are logged and skipped; the walk always covers the whole
    /// table. One `guobject-array-progress` event per chunk.
    pub fn parse(&self, events: &EventBus, cancel: &CancelToken) -> Result<ObjectTable> {
        let objects_ptr = self
            .reader
            .read_ptr(self.base)
            .map_err(|e| e.with_field("GUObjectArray chunk table"))?;
        let num_elements = self
            .reader
            .read_u32(self.base + 0x14)
            .map_err(|e| e.with_field("GUObjectArray NumElements"))?;
        let max_chunks = self
            .reader
            .read_u32(self.base + 0x18)
            .map_err(|e| e.with_field("GUObjectArray MaxChunks"))?;
        let num_chunks = self
            .reader
            .read_u32(self.base + 0x1C)
            .map_err(|e| e.with_field("GUObjectArray NumChunks"))?;

        if num_chunks == 0 || num_chunks > max_chunks {
            return Err(Error::corrupt_layout(format!(
                "GUObjectArray chunk count {num_chunks} out of range (max {max_chunks})"
            )));
        }
        if u64::from(num_elements) > u64::from(num_chunks) * OBJECTS_PER_CHUNK {
            return Err(Error::corrupt_layout(format!(
                "GUObjectArray element count {num_elements} exceeds {num_chunks} chunks"
            )));
        }

        let mut table = ObjectTable {
            slots: vec![None; num_elements as usize],
            live: 0,
            skipped: 0,
        };

        for chunk in 0..num_chunks as u64 {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let first = chunk * OBJECTS_PER_CHUNK;
            if first >= num_elements as u64 {
                break;
            }
            let count = OBJECTS_PER_CHUNK.min(num_elements as u64 - first);

            let chunk_ptr = self.reader.read_ptr(objects_ptr + chunk * 8).unwrap_or(0);
            if chunk_ptr == 0 {
                warn!("GUObjectArray chunk {} pointer is null, skipping", chunk);
                table.skipped += count as u32;
            } else {
                self.walk_chunk(chunk_ptr, first, count, &mut table);
            }

            events.emit(ProgressEvent::ObjectArray(ObjectArrayProgress {
                current_chunk: (chunk + 1) as u32,
                total_chunks: num_chunks,
                current_objects: table.live,
                total_objects: num_elements,
            }));
        }

        debug!(
            "GUObjectArray parse complete: {} live objects, {} skipped slots",
            table.live, table.skipped
        );
        Ok(table)
    }

    fn walk_chunk(&self, chunk_ptr: u64, first: u64, count: u64, table: &mut ObjectTable) {
        let p = self.profile;
        let bytes = match self
            .reader
            .read_bytes(chunk_ptr, (count * p.uobject_item_size) as usize)
        {
            Ok(bytes) => bytes,
            Err(_) => {
                warn!("GUObjectArray chunk at {:#x} unreadable", chunk_ptr);
                table.skipped += count as u32;
                return;
            }
        };

        for i in 0..count {
            let global = first + i;
            let item = &bytes[(i * p.uobject_item_size) as usize..];
            let slot = p.uobject_item_object_offset as usize;
            let address = u64::from_le_bytes(item[slot..slot + 8].try_into().unwrap());
            if address == 0 {
                continue; // empty slot, counter still advances
            }

            match self.read_object(address, global as u32) {
                Ok(record) => {
                    table.slots[global as usize] = Some(record);
                    table.live += 1;
                }
                Err(_) => {
                    table.skipped += 1;
                }
            }
        }
    }

    /// Read and cross-validate one UObject header.
    fn read_object(&self, address: u64, expected_index: u32) -> Result<ObjectRecord> {
        let p = self.profile;

        let flags = self
            .reader
            .read_u32(address + p.uobject_flags)
            .map_err(|e| e.with_field("UObject flags"))?;
        let index = self
            .reader
            .read_i32(address + p.uobject_index)
            .map_err(|e| e.with_field("UObject InternalIndex"))?;
        let class_ptr = self
            .reader
            .read_ptr(address + p.uobject_class)
            .map_err(|e| e.with_field("UObject class pointer"))?;
        let name_id = self
            .reader
            .read_u32(address + p.uobject_name_id)
            .map_err(|e| e.with_field("UObject name id"))?;
        let outer_ptr = self
            .reader
            .read_ptr(address + p.uobject_outer)
            .map_err(|e| e.with_field("UObject outer pointer"))?;

        if index != expected_index as i32 {
            return Err(Error::corrupt_layout(format!(
                "UObject at {address:#x}: InternalIndex {index} != slot {expected_index}"
            )));
        }
        if class_ptr != 0 && !self.reader.is_pointer(class_ptr) {
            return Err(Error::read_fault(class_ptr, 1, "UObject class pointer"));
        }
        if outer_ptr != 0 && !self.reader.is_pointer(outer_ptr) {
            return Err(Error::read_fault(outer_ptr, 1, "UObject outer pointer"));
        }

        Ok(ObjectRecord {
            id: expected_index,
            address,
            class_ptr,
            outer_ptr,
            name_id,
            flags,
            name: String::new(),
            type_name: String::new(),
            full_name: String::new(),
            package: String::new(),
        })
    }

    /// Enrichment pass: resolve names, type names, full names and group by
    /// package. Runs after the NamePool parse.
    pub fn enrich(&self, table: &mut ObjectTable, names: &NameTable) -> (ObjectIndex, PackageIndex) {
        let p = self.profile;

        let mut index = ObjectIndex::default();
        for record in table.iter() {
            index.by_address.insert(record.address, record.id);
        }

        // First sub-pass: own name and class-chain leaf name.
        let class_name_ids: HashMap<u64, u32> = table
            .iter()
            .map(|r| (r.address, r.name_id))
            .collect();

        for slot in table.slots.iter_mut().flatten() {
            slot.name = names.resolve(slot.name_id).to_string();
            if slot.name.is_empty() {
                slot.name = "InvalidName".to_string();
            }
            slot.type_name = if slot.class_ptr == 0 {
                "None".to_string()
            } else if let Some(&class_name_id) = class_name_ids.get(&slot.class_ptr) {
                names.resolve(class_name_id).to_string()
            } else {
                // Class outside the table; fall back to a direct read.
                self.reader
                    .read_u32(slot.class_ptr + p.uobject_name_id)
                    .map(|id| names.resolve(id).to_string())
                    .unwrap_or_else(|_| "None".to_string())
            };
        }

        // Second sub-pass: outer chains, now that every record has names.
        let shallow: HashMap<u64, (String, String, u64)> = table
            .iter()
            .map(|r| {
                (
                    r.address,
                    (r.name.clone(), r.type_name.clone(), r.outer_ptr),
                )
            })
            .collect();

        for slot in table.slots.iter_mut().flatten() {
            let (full_name, package) = build_full_name(slot, &shallow);
            slot.full_name = full_name;
            slot.package = package;
        }

        // Package grouping, ordered by id within a package.
        let mut groups: HashMap<String, Vec<ObjectId>> = HashMap::new();
        for record in table.iter() {
            if !record.package.is_empty() {
                groups.entry(record.package.clone()).or_default().push(record.id);
            }
        }
        let mut packages: Vec<Package> = groups
            .into_iter()
            .map(|(name, mut object_ids)| {
                object_ids.sort_unstable();
                Package { name, object_ids }
            })
            .collect();
        packages.sort_by(|a, b| a.name.cmp(&b.name));

        (index, PackageIndex { packages })
    }
}

/// Reverse outer walk joined with `.` (`:` when a Property/Function leaf
/// joins its owner). The package is the root outer whose class is `Package`.
fn build_full_name(
    record: &ObjectRecord,
    shallow: &HashMap<u64, (String, String, u64)>,
) -> (String, String) {
    let mut result = record.name.clone();
    let mut prev_type = record.type_name.clone();
    let mut root: Option<&(String, String, u64)> = None;

    let mut outer = record.outer_ptr;
    let mut depth = 0;
    while outer != 0 && depth < MAX_OUTER_DEPTH {
        let Some(entry) = shallow.get(&outer) else {
            break;
        };
        let sep = if is_field_like(&prev_type) && !is_field_like(&entry.1) {
            ":"
        } else {
            "."
        };
        result = format!("{}{}{}", entry.0, sep, result);
        prev_type = entry.1.clone();
        root = Some(entry);
        outer = entry.2;
        depth += 1;
    }

    let package = match root {
        Some((name, type_name, _)) if type_name == "Package" => name.clone(),
        None if record.type_name == "Package" => record.name.clone(),
        _ => String::new(),
    };

    (result, package)
}
