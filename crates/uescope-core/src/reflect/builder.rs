//! Field-list walkers for both engine generations.
//!
//! Pre-4.25 targets keep class members as UObjects on the `Children` list;
//! newer ones use lightweight FFields on `ChildProperties`. The profile
//! decides which list is walked and where the links live; the decoding of a
//! single field is shared.

use tracing::debug;

use crate::error::{Error, Result};
use crate::layout::{LayoutProfile, PROP_FLAG_PARM, PROP_FLAG_RETURN_PARM};
use crate::memory::ReadMemory;
use crate::names::NameTable;
use crate::objects::{ObjectIndex, ObjectTable};
use crate::reflect::{
    DetailedObjectInfo, EnumValueEntry, FunctionInfo, FunctionParam, InheritanceItem, PropertyInfo,
};

/// Safety bound on any linked-list walk.
const MAX_FIELDS: usize = 2000;
/// Largest plausible enum entry count.
const MAX_ENUM_ENTRIES: i32 = 10_000;

pub struct ReflectionReader<'a, R: ReadMemory + ?Sized> {
    reader: &'a R,
    profile: &'a LayoutProfile,
    names: &'a NameTable,
    objects: &'a ObjectTable,
    index: &'a ObjectIndex,
}

impl<'a, R: ReadMemory + ?Sized> ReflectionReader<'a, R> {
    pub fn new(
        reader: &'a R,
        profile: &'a LayoutProfile,
        names: &'a NameTable,
        objects: &'a ObjectTable,
        index: &'a ObjectIndex,
    ) -> Self {
        Self {
            reader,
            profile,
            names,
            objects,
            index,
        }
    }

    /// Name of the object at `address`, preferring the parsed table and
    /// falling back to a direct name-id read.
    pub fn object_name(&self, address: u64) -> String {
        if let Some(record) = self.index.id_of(address).and_then(|id| self.objects.get(id)) {
            if !record.name.is_empty() && record.name != "None" {
                return record.name.clone();
            }
        }
        self.reader
            .read_u32(address + self.profile.uobject_name_id)
            .map(|id| self.names.resolve(id).to_string())
            .unwrap_or_default()
    }

    /// Addresses of the fields on a struct's member list, walk order.
    pub fn fields(&self, struct_addr: u64) -> Vec<u64> {
        let p = self.profile;
        let head_offset = if p.uobject_fields_are_fproperty {
            p.ustruct_children_props_offset
        } else {
            p.ustruct_children_offset
        };

        let mut fields = Vec::new();
        let mut current = self.reader.read_ptr(struct_addr + head_offset).unwrap_or(0);
        while current != 0 && fields.len() < MAX_FIELDS {
            fields.push(current);
            current = self
                .reader
                .read_ptr(current + p.ffield_next_offset)
                .unwrap_or(0);
        }
        fields
    }

    /// A field's own name.
    pub fn field_name(&self, field: u64) -> (u32, String) {
        let id = self
            .reader
            .read_u32(field + self.profile.ffield_name_offset)
            .unwrap_or(0);
        (id, self.names.resolve(id).to_string())
    }

    /// A field's meta-class name (`IntProperty`, `BoolProperty`, ...).
    pub fn field_type_name(&self, field: u64) -> String {
        let p = self.profile;
        let Ok(class_ptr) = self.reader.read_ptr(field + p.ffield_class_offset) else {
            return String::new();
        };
        if class_ptr == 0 {
            return String::new();
        }
        self.reader
            .read_u32(class_ptr + p.ffield_class_name_offset)
            .map(|id| self.names.resolve(id).to_string())
            .unwrap_or_default()
    }

    /// Decode one field into a `PropertyInfo`. Returns `None` for fields
    /// with unresolvable names or types.
    pub fn read_property(&self, field: u64) -> Option<PropertyInfo> {
        let p = self.profile;
        let (name_id, name) = self.field_name(field);
        let property_type = self.field_type_name(field);
        if name.is_empty() || property_type.is_empty() || property_type == "None" {
            return None;
        }

        let offset = self
            .reader
            .read_i32(field + p.fproperty_offset_internal)
            .unwrap_or(0) as u32;
        let element_size = self
            .reader
            .read_i32(field + p.fproperty_element_size)
            .unwrap_or(0) as u32;
        let array_dim = self
            .reader
            .read_i32(field + p.fproperty_array_dim)
            .unwrap_or(1) as u32;

        let mut info = PropertyInfo {
            name_id,
            name,
            property_type,
            offset,
            element_size,
            array_dim,
            sub_type: String::new(),
            sub_type_address: 0,
            bit_mask: 0,
        };
        self.resolve_sub_type(field, &mut info);
        Some(info)
    }

    /// Fill the cross-reference slot of a property according to its kind.
    fn resolve_sub_type(&self, field: u64, info: &mut PropertyInfo) {
        let p = self.profile;
        let t = info.property_type.as_str();
        let sub = self.reader.read_ptr(field + p.fproperty_sub_object).unwrap_or(0);

        if t.contains("BoolProperty") {
            info.bit_mask = self
                .reader
                .read_u8(field + p.fproperty_bool_byte_mask)
                .unwrap_or(0);
        } else if t.contains("ObjectProperty")
            || t.contains("ClassProperty")
            || t.contains("InterfaceProperty")
            || t.contains("SoftObjectProperty")
            || t.contains("SoftClassProperty")
            || t.contains("WeakObjectProperty")
            || t.contains("StructProperty")
        {
            if sub != 0 {
                let name = self.object_name(sub);
                if !name.is_empty() {
                    info.sub_type = name;
                    info.sub_type_address = sub;
                }
            }
        } else if t.contains("ArrayProperty") || t.contains("SetProperty") {
            // `sub` is the inner property; record its type, and for
            // object-like inners the element class it points at.
            if sub != 0 {
                let inner_type = self.field_type_name(sub);
                if !inner_type.is_empty() {
                    info.sub_type = inner_type.clone();
                    if inner_type.contains("Object") || inner_type.contains("Class") {
                        let inner_class = self
                            .reader
                            .read_ptr(sub + p.fproperty_sub_object)
                            .unwrap_or(0);
                        if inner_class != 0 {
                            info.sub_type_address = inner_class;
                        }
                    }
                }
            }
        } else if t.contains("MapProperty") {
            let value = self.reader.read_ptr(field + p.fproperty_map_value).unwrap_or(0);
            let mut parts = Vec::new();
            for inner in [sub, value] {
                if inner != 0 {
                    let inner_type = self.field_type_name(inner);
                    if !inner_type.is_empty() {
                        parts.push(inner_type);
                    }
                }
            }
            info.sub_type = parts.join(", ");
        } else if t.contains("ByteProperty") || t.contains("EnumProperty") {
            if sub != 0 {
                let name = self.object_name(sub);
                if !name.is_empty() {
                    info.sub_type = name;
                    info.sub_type_address = sub;
                }
            }
        }
    }

    /// Walk `Super` from a class-like object; nearest ancestor first. The
    /// walk is bounded by the number of live objects, so inheritance cycles
    /// cannot hang it.
    pub fn super_chain(&self, struct_addr: u64) -> Vec<InheritanceItem> {
        let p = self.profile;
        let bound = self.objects.live_count() as usize + 1;
        let mut chain = Vec::new();

        let mut current = self
            .reader
            .read_ptr(struct_addr + p.ustruct_super_offset)
            .unwrap_or(0);
        while current != 0 && chain.len() < bound {
            let name = self.object_name(current);
            if name.is_empty() {
                break;
            }
            chain.push(InheritanceItem {
                name,
                address: current,
            });
            current = self
                .reader
                .read_ptr(current + p.ustruct_super_offset)
                .unwrap_or(0);
        }
        chain
    }

    /// The `(NameId, value)` pairs of an enum, in declaration order.
    pub fn enum_entries(&self, enum_addr: u64) -> Vec<EnumValueEntry> {
        let p = self.profile;
        let Ok(pairs) = self.reader.read_ptr(enum_addr + p.uenum_names_array_offset) else {
            return Vec::new();
        };
        let count = self
            .reader
            .read_i32(enum_addr + p.uenum_names_array_offset + 8)
            .unwrap_or(0);
        if pairs == 0 || count <= 0 || count > MAX_ENUM_ENTRIES {
            return Vec::new();
        }

        let mut entries = Vec::with_capacity(count as usize);
        for i in 0..count as u64 {
            let entry = pairs + i * p.uenum_pair_stride;
            let Ok(name_id) = self.reader.read_u32(entry) else {
                break;
            };
            let value = self.reader.read_i64(entry + 8).unwrap_or(0);
            let name = self.names.resolve(name_id).to_string();
            if name.is_empty() {
                continue;
            }
            entries.push(EnumValueEntry {
                name_id,
                name,
                value,
            });
        }
        entries
    }

    /// The enum's underlying numeric type name; `Byte` when unreadable.
    pub fn enum_underlying(&self, enum_addr: u64) -> String {
        let p = self.profile;
        let type_ptr = self
            .reader
            .read_ptr(enum_addr + p.uenum_underlying_offset)
            .unwrap_or(0);
        if type_ptr != 0 {
            let name = self.object_name(type_ptr);
            if !name.is_empty() && name != "None" {
                return name;
            }
        }
        "Byte".to_string()
    }

    /// Signature of a function object: parameters are its fields with the
    /// `Parm` flag, the return value the one flagged `ReturnParm`.
    pub fn function_info(&self, function_addr: u64, module_base: u64) -> FunctionInfo {
        let p = self.profile;

        let func_ptr = self
            .reader
            .read_ptr(function_addr + p.ufunction_func_ptr_offset)
            .unwrap_or(0);
        let exec_offset = func_ptr.saturating_sub(module_base);

        let outer = self
            .reader
            .read_ptr(function_addr + p.uobject_outer)
            .unwrap_or(0);
        let owner_object_id = self.index.id_of(outer);
        let owner = if outer != 0 {
            self.object_name(outer)
        } else {
            String::new()
        };

        let mut info = FunctionInfo {
            owner_object_id,
            owner,
            owner_address: outer,
            return_type: String::new(),
            return_type_address: 0,
            params: Vec::new(),
            exec_offset,
        };

        for field in self.fields(function_addr) {
            let (name_id, name) = self.field_name(field);
            let type_name = self.field_type_name(field);
            if name.is_empty() || type_name.is_empty() {
                continue;
            }
            let flags = self.reader.read_u64(field + p.fproperty_flags).unwrap_or(0);
            if flags & PROP_FLAG_PARM == 0 {
                continue;
            }

            let sub = self.reader.read_ptr(field + p.fproperty_sub_object).unwrap_or(0);
            let type_address = if sub != 0 && self.index.contains(sub) {
                sub
            } else {
                0
            };

            if flags & PROP_FLAG_RETURN_PARM != 0 || name == "ReturnValue" {
                info.return_type = type_name;
                info.return_type_address = type_address;
            } else {
                info.params.push(FunctionParam {
                    name_id,
                    name,
                    type_name,
                    type_address,
                    flags,
                });
            }
        }
        info
    }

    /// Assemble the full detail view for one parsed object.
    pub fn build_details(&self, id: u32, module_base: u64) -> Result<DetailedObjectInfo> {
        let record = self
            .objects
            .get(id)
            .ok_or_else(|| Error::not_found("Object", format!("id {id}")))?;

        let mut details = DetailedObjectInfo {
            address: record.address,
            name: record.name.clone(),
            full_name: record.full_name.clone(),
            type_name: record.type_name.clone(),
            inheritance: Vec::new(),
            properties: Vec::new(),
            properties_size: 0,
            enum_values: Vec::new(),
            enum_underlying_type: String::new(),
            function: None,
        };

        let t = record.type_name.as_str();
        if t.contains("Function") {
            details.function = Some(self.function_info(record.address, module_base));
        } else if t.contains("Class") || t.contains("Struct") {
            let mut chain = self.super_chain(record.address);
            chain.reverse(); // root first
            details.inheritance = chain;
            details.properties_size = self
                .reader
                .read_i32(record.address + self.profile.ustruct_properties_size_offset)
                .unwrap_or(0);
            details.properties = self
                .fields(record.address)
                .iter()
                .filter_map(|&f| self.read_property(f))
                .collect();
            debug!(
                "details for {}: {} properties",
                record.name,
                details.properties.len()
            );
        } else if t.contains("Enum") {
            details.enum_values = self.enum_entries(record.address);
            details.enum_underlying_type = self.enum_underlying(record.address);
        }

        Ok(details)
    }
}
