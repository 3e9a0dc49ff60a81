//! The reflection model: properties, enums, functions and the detailed
//! object view assembled from them.

mod builder;

pub use builder::ReflectionReader;

use serde::Serialize;

/// One reflected field of a class or script struct.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertyInfo {
    pub name_id: u32,
    pub name: String,
    pub property_type: String,
    pub offset: u32,
    pub element_size: u32,
    pub array_dim: u32,
    /// Container element type, object class name, struct type name or
    /// byte-enum name; empty when the property has none.
    pub sub_type: String,
    /// Resolved cross-reference behind `sub_type`, if any.
    pub sub_type_address: u64,
    /// BoolProperty byte mask; 0 if not a bitfield.
    pub bit_mask: u8,
}

impl PropertyInfo {
    /// Offset rendered for the wire: bare hex, with the bit index appended
    /// for bitfield bools (`F4:2`).
    pub fn offset_display(&self) -> String {
        if self.property_type.contains("BoolProperty") && self.bit_mask != 0 {
            format!("{:X}:{}", self.offset, self.bit_mask.trailing_zeros())
        } else {
            format!("{:X}", self.offset)
        }
    }
}

/// One declared enum constant, in declaration order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnumValueEntry {
    pub name_id: u32,
    pub name: String,
    pub value: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FunctionParam {
    pub name_id: u32,
    pub name: String,
    pub type_name: String,
    pub type_address: u64,
    pub flags: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FunctionInfo {
    pub owner_object_id: Option<u32>,
    pub owner: String,
    pub owner_address: u64,
    pub return_type: String,
    pub return_type_address: u64,
    pub params: Vec<FunctionParam>,
    /// Native entry point relative to the module base.
    pub exec_offset: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct InheritanceItem {
    pub name: String,
    pub address: u64,
}

/// Everything known about one reflected object.
#[derive(Debug, Clone, Serialize)]
pub struct DetailedObjectInfo {
    pub address: u64,
    pub name: String,
    pub full_name: String,
    pub type_name: String,
    /// Root-most ancestor first; empty for root classes.
    pub inheritance: Vec<InheritanceItem>,
    pub properties: Vec<PropertyInfo>,
    pub properties_size: i32,
    pub enum_values: Vec<EnumValueEntry>,
    pub enum_underlying_type: String,
    pub function: Option<FunctionInfo>,
}

/// One class of the inheritance chain above a live instance.
#[derive(Debug, Clone, Serialize)]
pub struct InstanceHierarchyNode {
    pub class_name: String,
    pub class_address: u64,
    pub type_name: String,
}

/// One property of a class resolved against a live instance address.
#[derive(Debug, Clone, Serialize)]
pub struct InstancePropertySample {
    pub property_name: String,
    pub property_type: String,
    pub sub_type: String,
    /// Offset relative to the owning class, bare hex (`1A0`, bools `F4:2`).
    pub offset: String,
    /// Absolute address in the target, `0x`-prefixed lowercase hex.
    pub memory_address: String,
    pub live_value: String,
    pub is_object: bool,
    pub object_instance_address: String,
    pub object_class_address: String,
}
