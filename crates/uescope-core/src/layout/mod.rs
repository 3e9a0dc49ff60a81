//! Structure layouts per engine generation.
//!
//! All offsets the parsers and walkers need live in one `LayoutProfile`,
//! selected once per attach from the target's UE major version. Only the
//! major is trusted: a 4.x target is always walked with UField-style field
//! lists, a 5.x target with FField-style lists.

mod version;

pub use version::FileVersion;

use serde::Serialize;

use crate::error::{Error, Result};

/// Property flag bit: the field is a function parameter.
pub const PROP_FLAG_PARM: u64 = 0x80;
/// Property flag bit: the field is the function's return parameter.
pub const PROP_FLAG_RETURN_PARM: u64 = 0x400;

/// Elements per GUObjectArray chunk.
pub const OBJECTS_PER_CHUNK: u64 = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UeGeneration {
    Ue4,
    Ue5,
}

/// Concrete structure offsets for one engine generation.
///
/// Field-list walking comes in two shapes: pre-4.25 keeps properties as
/// UObjects on a `Children` list (field header is a full UObject), 4.25+
/// moves them to lightweight FFields on `ChildProperties`. The profile
/// carries both sets of offsets; `uobject_fields_are_fproperty` picks the
/// walker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LayoutProfile {
    pub generation: UeGeneration,
    pub ue_major: u32,
    /// Set when the major version had no exact profile and the nearest
    /// neighbor was substituted.
    pub degraded: bool,

    // NamePool
    pub name_block_stride: u64,
    pub name_entry_header_size: u64,
    pub name_header_encodes_length: bool,
    pub name_pool_current_block: u64,
    pub name_pool_current_cursor: u64,
    pub name_pool_blocks: u64,

    // GUObjectArray
    pub uobject_item_size: u64,
    pub uobject_item_object_offset: u64,

    // UObject header
    pub uobject_flags: u64,
    pub uobject_index: u64,
    pub uobject_class: u64,
    pub uobject_name_id: u64,
    pub uobject_outer: u64,

    // UStruct
    pub uobject_fields_are_fproperty: bool,
    pub ustruct_super_offset: u64,
    pub ustruct_children_offset: u64,
    pub ustruct_children_props_offset: u64,
    pub ustruct_properties_size_offset: u64,

    // Field list links (FField offsets in FField mode, UObject-relative in
    // UField mode)
    pub ffield_class_offset: u64,
    /// Where the meta-class keeps its own name id (0 inside FFieldClass,
    /// the UObject name slot in UField mode).
    pub ffield_class_name_offset: u64,
    pub ffield_next_offset: u64,
    pub ffield_name_offset: u64,

    // FProperty / UProperty
    pub fproperty_array_dim: u64,
    pub fproperty_element_size: u64,
    pub fproperty_flags: u64,
    pub fproperty_offset_internal: u64,
    /// PropertyClass / Struct / Inner / Enum / Key cross-reference slot.
    pub fproperty_sub_object: u64,
    /// Second cross-reference slot (map value property).
    pub fproperty_map_value: u64,
    pub fproperty_bool_byte_mask: u64,

    // UEnum
    pub uenum_names_array_offset: u64,
    pub uenum_pair_stride: u64,
    pub uenum_underlying_offset: u64,

    // UFunction
    pub ufunction_func_ptr_offset: u64,
}

impl LayoutProfile {
    /// Payload bytes per NamePool block.
    pub fn name_block_size(&self) -> u64 {
        self.name_block_stride << 16
    }

    const fn ue5() -> Self {
        Self {
            generation: UeGeneration::Ue5,
            ue_major: 5,
            degraded: false,

            name_block_stride: 2,
            name_entry_header_size: 2,
            name_header_encodes_length: true,
            name_pool_current_block: 0x08,
            name_pool_current_cursor: 0x0C,
            name_pool_blocks: 0x10,

            uobject_item_size: 0x18,
            uobject_item_object_offset: 0x00,

            uobject_flags: 0x08,
            uobject_index: 0x0C,
            uobject_class: 0x10,
            uobject_name_id: 0x18,
            uobject_outer: 0x20,

            uobject_fields_are_fproperty: true,
            ustruct_super_offset: 0x40,
            ustruct_children_offset: 0x48,
            ustruct_children_props_offset: 0x50,
            ustruct_properties_size_offset: 0x58,

            ffield_class_offset: 0x08,
            ffield_class_name_offset: 0x00,
            ffield_next_offset: 0x20,
            ffield_name_offset: 0x28,

            fproperty_array_dim: 0x38,
            fproperty_element_size: 0x3C,
            fproperty_flags: 0x40,
            fproperty_offset_internal: 0x4C,
            fproperty_sub_object: 0x78,
            fproperty_map_value: 0x80,
            fproperty_bool_byte_mask: 0x7A,

            uenum_names_array_offset: 0x40,
            uenum_pair_stride: 0x10,
            uenum_underlying_offset: 0x70,

            ufunction_func_ptr_offset: 0xD8,
        }
    }

    const fn ue4() -> Self {
        Self {
            generation: UeGeneration::Ue4,
            ue_major: 4,
            degraded: false,

            name_block_stride: 2,
            name_entry_header_size: 2,
            name_header_encodes_length: true,
            name_pool_current_block: 0x08,
            name_pool_current_cursor: 0x0C,
            name_pool_blocks: 0x10,

            uobject_item_size: 0x18,
            uobject_item_object_offset: 0x00,

            uobject_flags: 0x08,
            uobject_index: 0x0C,
            uobject_class: 0x10,
            uobject_name_id: 0x18,
            uobject_outer: 0x20,

            uobject_fields_are_fproperty: false,
            ustruct_super_offset: 0x40,
            ustruct_children_offset: 0x48,
            ustruct_children_props_offset: 0x50,
            ustruct_properties_size_offset: 0x50,

            // UField links are UObject-relative: the meta class is the
            // object's own class, the name its own FName slot.
            ffield_class_offset: 0x10,
            ffield_class_name_offset: 0x18,
            ffield_next_offset: 0x28,
            ffield_name_offset: 0x18,

            fproperty_array_dim: 0x30,
            fproperty_element_size: 0x34,
            fproperty_flags: 0x38,
            fproperty_offset_internal: 0x44,
            fproperty_sub_object: 0x70,
            fproperty_map_value: 0x78,
            fproperty_bool_byte_mask: 0x72,

            uenum_names_array_offset: 0x40,
            uenum_pair_stride: 0x10,
            uenum_underlying_offset: 0x70,

            ufunction_func_ptr_offset: 0xB0,
        }
    }

    /// Select the profile for a UE major version.
    ///
    /// With `allow_fallback`, unknown majors clamp to the nearest known
    /// generation and the result is flagged `degraded`; without it they are
    /// refused.
    pub fn select(ue_major: u32, allow_fallback: bool) -> Result<Self> {
        let profile = match ue_major {
            4 => Self::ue4(),
            5 => Self::ue5(),
            other if allow_fallback => {
                let mut nearest = if other < 4 { Self::ue4() } else { Self::ue5() };
                nearest.ue_major = other;
                nearest.degraded = true;
                nearest
            }
            other => return Err(Error::UnsupportedVersion { major: other }),
        };
        Ok(profile)
    }
}
