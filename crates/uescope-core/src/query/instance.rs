//! Live-instance resolution: hierarchy unfolding, typed property decoding,
//! container element expansion and instance hunting.

use std::collections::HashMap;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::memory::ReadMemory;
use crate::query::{hex, Workbench};
use crate::reflect::{InstanceHierarchyNode, InstancePropertySample, PropertyInfo};

/// Hard cap on expanded container elements.
const MAX_ARRAY_ELEMENTS: i32 = 9999;
/// Largest container count accepted as sane.
const MAX_CONTAINER_COUNT: i32 = 99_999;
/// Longest FString read, in UTF-16 units.
const MAX_STRING_UNITS: i32 = 0x10000;
/// Depth bound for class-chain containment checks.
const MAX_SUPER_DEPTH: usize = 64;

#[derive(Debug, Clone, Serialize)]
pub struct InstanceMatch {
    pub instance_address: String,
    pub object_name: String,
}

/// Render a float with at most six fractional digits, trimmed.
fn format_float(value: f64) -> String {
    let s = format!("{value:.6}");
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s.is_empty() || s == "-" {
        "0".to_string()
    } else {
        s.to_string()
    }
}

impl<'a, R: ReadMemory + ?Sized> Workbench<'a, R> {
    /// Unfold the inheritance chain above a live instance: its concrete
    /// class first, ending at the root class.
    pub fn add_inspector(&self, instance_address: u64) -> Result<Vec<InstanceHierarchyNode>> {
        let class_ptr = self
            .reader
            .read_ptr(instance_address + self.profile.uobject_class)
            .map_err(|e| e.with_field("instance class pointer"))?;
        if class_ptr == 0 {
            return Err(Error::not_found("Class", hex(instance_address)));
        }

        let r = self.reflector();
        let mut nodes = vec![self.hierarchy_node(class_ptr)];
        for item in r.super_chain(class_ptr) {
            nodes.push(self.hierarchy_node(item.address));
        }
        Ok(nodes)
    }

    fn hierarchy_node(&self, class_address: u64) -> InstanceHierarchyNode {
        let record = self
            .index
            .id_of(class_address)
            .and_then(|id| self.objects.get(id));
        InstanceHierarchyNode {
            class_name: record
                .map(|r| r.name.clone())
                .unwrap_or_else(|| self.reflector().object_name(class_address)),
            class_address,
            type_name: record.map(|r| r.type_name.clone()).unwrap_or_default(),
        }
    }

    /// Read every property of `class_address` off the live instance at
    /// `instance_address`. A faulted sub-read aborts the whole query.
    pub fn get_instance_details(
        &self,
        instance_address: u64,
        class_address: u64,
    ) -> Result<Vec<InstancePropertySample>> {
        if !self.index.contains(class_address) {
            return Err(Error::not_found("Class", hex(class_address)));
        }

        let r = self.reflector();
        let mut samples = Vec::new();
        for field in r.fields(class_address) {
            let Some(prop) = r.read_property(field) else {
                continue;
            };
            if !prop.property_type.contains("Property") {
                continue;
            }
            samples.push(self.decode_sample(&prop, instance_address)?);
        }
        Ok(samples)
    }

    /// Decode one property against a base address.
    fn decode_sample(
        &self,
        prop: &PropertyInfo,
        base_address: u64,
    ) -> Result<InstancePropertySample> {
        let address = base_address + prop.offset as u64;
        let fault = |e: Error| e.with_field(prop.name.clone());
        let t = prop.property_type.as_str();

        let mut sample = InstancePropertySample {
            property_name: prop.name.clone(),
            property_type: prop.property_type.clone(),
            sub_type: prop.sub_type.clone(),
            offset: prop.offset_display(),
            memory_address: hex(address),
            live_value: String::new(),
            is_object: false,
            object_instance_address: String::new(),
            object_class_address: String::new(),
        };

        if t.contains("BoolProperty") {
            let byte = self.reader.read_u8(address).map_err(&fault)?;
            let set = if prop.bit_mask != 0 {
                byte & prop.bit_mask != 0
            } else {
                byte != 0
            };
            sample.live_value = if set { "True" } else { "False" }.to_string();
        } else if t.contains("NameProperty") {
            let id = self.reader.read_u32(address).map_err(&fault)?;
            sample.live_value = self.names.resolve(id).to_string();
        } else if t.contains("StrProperty") {
            let data = self.reader.read_ptr(address).map_err(&fault)?;
            let count = self.reader.read_i32(address + 8).map_err(&fault)?;
            if data != 0 && (1..MAX_STRING_UNITS).contains(&count) {
                sample.live_value = self.reader.read_utf16(data, count as usize).map_err(&fault)?;
            }
        } else if t.contains("ArrayProperty") {
            let data = self.reader.read_ptr(address).map_err(&fault)?;
            let count = self.reader.read_i32(address + 8).map_err(&fault)?;
            let capacity = self.reader.read_i32(address + 0xC).map_err(&fault)?;
            if data != 0 && count >= 0 && count <= capacity && capacity < MAX_CONTAINER_COUNT {
                sample.live_value = format!("Elements: {count}");
                sample.is_object = true;
                sample.object_instance_address = hex(data);
                if prop.sub_type_address != 0 {
                    sample.object_class_address = hex(prop.sub_type_address);
                }
            } else {
                sample.live_value = "Empty Array".to_string();
            }
        } else if t.contains("MapProperty") || t.contains("SetProperty") {
            let data = self.reader.read_ptr(address).map_err(&fault)?;
            let count = self.reader.read_i32(address + 0x18).map_err(&fault)?;
            if data != 0 && (0..MAX_CONTAINER_COUNT).contains(&count) {
                sample.live_value = format!("Elements: {count}");
                sample.is_object = true;
                sample.object_instance_address = hex(data);
                if prop.sub_type_address != 0 {
                    sample.object_class_address = hex(prop.sub_type_address);
                }
            } else if t.contains("MapProperty") {
                sample.live_value = "Empty Map".to_string();
            } else {
                sample.live_value = "Empty Set".to_string();
            }
        } else if t.contains("StructProperty") {
            // Synthetic sample the caller can expand with the struct type.
            sample.live_value = prop.sub_type.clone();
            sample.is_object = true;
            sample.object_instance_address = hex(address);
            if prop.sub_type_address != 0 {
                sample.object_class_address = hex(prop.sub_type_address);
            }
        } else if t.contains("ObjectProperty")
            || t.contains("ClassProperty")
            || t.contains("InterfaceProperty")
            || t.contains("WeakObjectProperty")
        {
            let ptr = self.reader.read_ptr(address).map_err(&fault)?;
            sample.live_value = hex(ptr);
            if ptr != 0 {
                if let Some(record) = self.index.id_of(ptr).and_then(|id| self.objects.get(id)) {
                    sample.is_object = true;
                    sample.object_instance_address = hex(ptr);
                    sample.object_class_address = hex(record.class_ptr);
                }
            }
        } else if t.contains("FloatProperty") {
            let value = self.reader.read_f32(address).map_err(&fault)?;
            sample.live_value = format_float(value as f64);
        } else if t.contains("DoubleProperty") {
            let value = self.reader.read_f64(address).map_err(&fault)?;
            sample.live_value = format_float(value);
        } else if t.contains("Int64Property") {
            sample.live_value = self.reader.read_i64(address).map_err(&fault)?.to_string();
        } else if t.contains("UInt64Property") {
            sample.live_value = self.reader.read_u64(address).map_err(&fault)?.to_string();
        } else if t.contains("UInt32Property") {
            sample.live_value = self.reader.read_u32(address).map_err(&fault)?.to_string();
        } else if t.contains("UInt16Property") {
            sample.live_value = self.reader.read_u16(address).map_err(&fault)?.to_string();
        } else if t.contains("Int16Property") {
            let value = self.reader.read_u16(address).map_err(&fault)? as i16;
            sample.live_value = value.to_string();
        } else if t.contains("Int8Property") {
            let value = self.reader.read_u8(address).map_err(&fault)? as i8;
            sample.live_value = value.to_string();
        } else if t.contains("ByteProperty") || t.contains("EnumProperty") {
            sample.live_value = self.reader.read_u8(address).map_err(&fault)?.to_string();
        } else if t.contains("IntProperty") {
            sample.live_value = self.reader.read_i32(address).map_err(&fault)?.to_string();
        } else {
            let value = self.reader.read_ptr(address).map_err(&fault)?;
            sample.live_value = hex(value);
        }

        Ok(sample)
    }

    /// Expand `count` container elements starting at `array_address`,
    /// decoding each with the inner type descriptor at its natural stride.
    pub fn get_array_elements(
        &self,
        array_address: u64,
        inner_type: &str,
        count: i32,
    ) -> Result<Vec<InstancePropertySample>> {
        let safe_count = count.clamp(0, MAX_ARRAY_ELEMENTS);
        let tl = inner_type.to_lowercase();

        let stride: u64 = if tl.contains("int64")
            || tl.contains("uint64")
            || tl.contains("double")
            || tl.contains("name")
            || tl.contains("str")
        {
            8
        } else if tl.contains("byte") || tl.contains("bool") {
            1
        } else if tl.contains("int") || tl.contains("float") {
            4
        } else {
            8
        };

        let mut samples = Vec::with_capacity(safe_count as usize);
        for i in 0..safe_count as u64 {
            let address = array_address + i * stride;
            let fault = |e: Error| e.with_field(format!("{inner_type}[{i}]"));

            let mut sample = InstancePropertySample {
                property_name: format!("[{i}]"),
                property_type: inner_type.to_string(),
                sub_type: String::new(),
                offset: format!("{:X}", i * stride),
                memory_address: hex(address),
                live_value: String::new(),
                is_object: false,
                object_instance_address: String::new(),
                object_class_address: String::new(),
            };

            if tl.contains("object") || tl.contains("class") {
                let ptr = self.reader.read_ptr(address).map_err(&fault)?;
                sample.live_value = hex(ptr);
                if ptr != 0 {
                    if let Some(record) = self.index.id_of(ptr).and_then(|id| self.objects.get(id))
                    {
                        sample.is_object = true;
                        sample.object_instance_address = hex(ptr);
                        sample.object_class_address = hex(record.class_ptr);
                    }
                }
            } else if tl.contains("name") {
                let id = self.reader.read_u32(address).map_err(&fault)?;
                sample.live_value = self.names.resolve(id).to_string();
            } else if tl.contains("bool") {
                let byte = self.reader.read_u8(address).map_err(&fault)?;
                sample.live_value = if byte != 0 { "True" } else { "False" }.to_string();
            } else if tl.contains("byte") {
                sample.live_value = self.reader.read_u8(address).map_err(&fault)?.to_string();
            } else if tl.contains("double") {
                let value = self.reader.read_f64(address).map_err(&fault)?;
                sample.live_value = format_float(value);
            } else if tl.contains("float") {
                let value = self.reader.read_f32(address).map_err(&fault)?;
                sample.live_value = format_float(value as f64);
            } else if tl.contains("int64") {
                sample.live_value = self.reader.read_i64(address).map_err(&fault)?.to_string();
            } else if tl.contains("int") {
                sample.live_value = self.reader.read_i32(address).map_err(&fault)?.to_string();
            } else {
                let value = self.reader.read_ptr(address).map_err(&fault)?;
                sample.live_value = hex(value);
            }

            samples.push(sample);
        }
        Ok(samples)
    }

    /// Every record whose class is `class_address` or inherits from it.
    pub fn search_object_instances(&self, class_address: u64) -> Result<Vec<InstanceMatch>> {
        if !self.index.contains(class_address) {
            return Err(Error::not_found("Class", hex(class_address)));
        }

        // Memoized per concrete class: does its super chain reach the
        // target?
        let mut chain_hits: HashMap<u64, bool> = HashMap::new();
        let mut matches = Vec::new();

        for record in self.objects.iter() {
            if record.class_ptr == 0 {
                continue;
            }
            let hit = record.class_ptr == class_address
                || *chain_hits
                    .entry(record.class_ptr)
                    .or_insert_with(|| self.chain_contains(record.class_ptr, class_address));
            if hit {
                matches.push(InstanceMatch {
                    instance_address: hex(record.address),
                    object_name: record.name.clone(),
                });
            }
        }
        Ok(matches)
    }

    fn chain_contains(&self, class_ptr: u64, target: u64) -> bool {
        let p = self.profile;
        let mut current = self
            .reader
            .read_ptr(class_ptr + p.ustruct_super_offset)
            .unwrap_or(0);
        let mut depth = 0;
        while current != 0 && depth < MAX_SUPER_DEPTH {
            if current == target {
                return true;
            }
            current = self
                .reader
                .read_ptr(current + p.ustruct_super_offset)
                .unwrap_or(0);
            depth += 1;
        }
        false
    }
}
