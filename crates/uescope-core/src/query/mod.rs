//! Read-side queries over the parsed snapshots.
//!
//! A `Workbench` bundles the immutable snapshots with the remote reader so
//! package browsing, global search and detail resolution can re-enter the
//! target for live values. A fault inside a query aborts that query only;
//! Storage is never touched.

mod instance;

pub use instance::InstanceMatch;

use std::str::FromStr;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::layout::LayoutProfile;
use crate::memory::ReadMemory;
use crate::names::NameTable;
use crate::objects::{ObjectIndex, ObjectRecord, ObjectTable, PackageIndex};
use crate::reflect::{DetailedObjectInfo, ReflectionReader};

/// Cap on global search hits.
const SEARCH_LIMIT: usize = 500;
/// Depth bound for the raw analyzer's outer walk.
const ANALYZE_OUTER_DEPTH: usize = 10;

pub(crate) fn hex(value: u64) -> String {
    format!("{value:#x}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Class,
    Struct,
    Enum,
    Function,
}

impl Category {
    pub fn matches(&self, type_name: &str) -> bool {
        match self {
            Self::Class => type_name.contains("Class") && !type_name.contains("Function"),
            Self::Struct => type_name.contains("Struct") && !type_name.contains("Function"),
            Self::Enum => type_name.contains("Enum"),
            Self::Function => type_name.contains("Function"),
        }
    }

    /// The category a type name falls into, if any.
    pub fn of(type_name: &str) -> Option<Self> {
        [Self::Class, Self::Struct, Self::Enum, Self::Function]
            .into_iter()
            .find(|c| c.matches(type_name))
    }
}

impl FromStr for Category {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            _ if s.eq_ignore_ascii_case("class") => Ok(Self::Class),
            _ if s.eq_ignore_ascii_case("struct") => Ok(Self::Struct),
            _ if s.eq_ignore_ascii_case("enum") => Ok(Self::Enum),
            _ if s.eq_ignore_ascii_case("function") => Ok(Self::Function),
            other => Err(Error::not_found("Category", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    Object,
    Member,
}

impl FromStr for SearchMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            _ if s.eq_ignore_ascii_case("object") => Ok(Self::Object),
            _ if s.eq_ignore_ascii_case("member") => Ok(Self::Member),
            other => Err(Error::not_found("SearchMode", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PackageSummary {
    pub name: String,
    pub object_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ObjectSummary {
    pub address: u64,
    pub name: String,
    pub full_name: String,
    pub type_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GlobalSearchResult {
    pub package_name: String,
    pub object_name: String,
    pub type_name: String,
    pub address: u64,
    pub member_name: Option<String>,
}

/// Unfiltered per-offset reads of one object, for the raw analyzer.
#[derive(Debug, Clone, Serialize)]
pub struct RawObjectInfo {
    pub object_id: i32,
    pub type_name: String,
    pub name: String,
    pub full_name: String,
    pub address: String,
    pub class_ptr: String,
    pub outer_ptr: String,
    pub super_ptr: String,
    pub properties_size: String,
    pub sub_object_ptr: String,
    pub map_value_ptr: String,
    pub function_ptr: String,
    pub members_head: String,
    pub bit_mask: String,
}

/// The immutable snapshots plus the live reader, assembled per query batch.
pub struct Workbench<'a, R: ReadMemory + ?Sized> {
    pub reader: &'a R,
    pub profile: &'a LayoutProfile,
    pub names: &'a NameTable,
    pub objects: &'a ObjectTable,
    pub index: &'a ObjectIndex,
    pub packages: &'a PackageIndex,
    pub module_base: u64,
}

impl<'a, R: ReadMemory + ?Sized> Workbench<'a, R> {
    pub(crate) fn reflector(&self) -> ReflectionReader<'a, R> {
        ReflectionReader::new(self.reader, self.profile, self.names, self.objects, self.index)
    }

    /// Packages sorted ascending by name, with their object counts.
    pub fn list_packages(&self) -> Vec<PackageSummary> {
        self.packages
            .iter()
            .map(|p| PackageSummary {
                name: p.name.clone(),
                object_count: p.object_ids.len(),
            })
            .collect()
    }

    /// Objects of one category inside a package, ordered by name.
    pub fn list_objects(&self, package: &str, category: Category) -> Result<Vec<ObjectSummary>> {
        let pkg = self
            .packages
            .get(package)
            .ok_or_else(|| Error::not_found("Package", package))?;

        let mut results: Vec<ObjectSummary> = pkg
            .object_ids
            .iter()
            .filter_map(|&id| self.objects.get(id))
            .filter(|record| category.matches(&record.type_name))
            .map(|record| ObjectSummary {
                address: record.address,
                name: record.name.clone(),
                full_name: record.full_name.clone(),
                type_name: record.type_name.clone(),
            })
            .collect();

        results.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(results)
    }

    /// Case-insensitive substring search over object names or member names.
    ///
    /// Hits are ordered by package, then object name, then member ordinal,
    /// and capped at 500.
    pub fn global_search(&self, query: &str, mode: SearchMode) -> Vec<GlobalSearchResult> {
        let needle = query.to_lowercase();
        // (package, object name lowered, member ordinal, result)
        let mut hits: Vec<(String, String, usize, GlobalSearchResult)> = Vec::new();

        match mode {
            SearchMode::Object => {
                for record in self.objects.iter() {
                    if Category::of(&record.type_name).is_none() {
                        continue;
                    }
                    if record.name.to_lowercase().contains(&needle) {
                        hits.push(self.object_hit(record, 0, None));
                    }
                }
            }
            SearchMode::Member => {
                let r = self.reflector();
                for record in self.objects.iter() {
                    match Category::of(&record.type_name) {
                        Some(Category::Class) | Some(Category::Struct) => {
                            for (ordinal, field) in r.fields(record.address).iter().enumerate() {
                                let (_, member) = r.field_name(*field);
                                if member.to_lowercase().contains(&needle) {
                                    hits.push(self.object_hit(record, ordinal, Some(member)));
                                }
                            }
                        }
                        Some(Category::Enum) => {
                            for (ordinal, entry) in
                                r.enum_entries(record.address).into_iter().enumerate()
                            {
                                if entry.name.to_lowercase().contains(&needle) {
                                    hits.push(self.object_hit(record, ordinal, Some(entry.name)));
                                }
                            }
                        }
                        _ => {}
                    }
                }
            }
        }

        hits.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)).then(a.2.cmp(&b.2)));
        hits.truncate(SEARCH_LIMIT);
        hits.into_iter().map(|(_, _, _, result)| result).collect()
    }

    fn object_hit(
        &self,
        record: &ObjectRecord,
        ordinal: usize,
        member_name: Option<String>,
    ) -> (String, String, usize, GlobalSearchResult) {
        (
            record.package.clone(),
            record.name.to_lowercase(),
            ordinal,
            GlobalSearchResult {
                package_name: record.package.clone(),
                object_name: record.name.clone(),
                type_name: record.type_name.clone(),
                address: record.address,
                member_name,
            },
        )
    }

    /// Full detail view of one parsed object.
    pub fn get_object_details(&self, address: u64) -> Result<DetailedObjectInfo> {
        let id = self
            .index
            .id_of(address)
            .ok_or_else(|| Error::not_found("Object", hex(address)))?;
        self.reflector().build_details(id, self.module_base)
    }

    /// Resolve one name id against the parsed table.
    pub fn analyze_fname(&self, id: u32) -> Result<String> {
        self.names
            .get(id)
            .map(str::to_string)
            .ok_or_else(|| Error::not_found("NameId", id.to_string()))
    }

    /// Dump every interesting per-offset read of an arbitrary address.
    ///
    /// Diagnostic command: unreadable slots render as zero instead of
    /// failing the whole dump.
    pub fn analyze_object(&self, address: u64) -> RawObjectInfo {
        let p = self.profile;
        let reader = self.reader;

        let object_id = reader.read_i32(address + p.uobject_index).unwrap_or(0);
        let class_ptr = reader.read_ptr(address + p.uobject_class).unwrap_or(0);
        let outer_ptr = reader.read_ptr(address + p.uobject_outer).unwrap_or(0);
        let name_id = reader.read_u32(address + p.uobject_name_id).unwrap_or(0);

        let name = self.names.resolve(name_id).to_string();
        let type_name = if class_ptr != 0 {
            reader
                .read_u32(class_ptr + p.uobject_name_id)
                .map(|id| self.names.resolve(id).to_string())
                .unwrap_or_else(|_| "None".to_string())
        } else {
            "None".to_string()
        };

        // Bounded outer walk for the dotted path.
        let mut path = vec![name.clone()];
        let mut outer = outer_ptr;
        let mut depth = 0;
        while outer != 0 && depth < ANALYZE_OUTER_DEPTH {
            if let Ok(id) = reader.read_u32(outer + p.uobject_name_id) {
                let n = self.names.resolve(id);
                if !n.is_empty() && n != "None" {
                    path.push(n.to_string());
                }
            }
            outer = reader.read_ptr(outer + p.uobject_outer).unwrap_or(0);
            depth += 1;
        }
        path.reverse();
        let full_name = path.join(".");

        let super_ptr = reader.read_ptr(address + p.ustruct_super_offset).unwrap_or(0);
        let properties_size = reader
            .read_i32(address + p.ustruct_properties_size_offset)
            .unwrap_or(0);
        let sub_object = reader.read_ptr(address + p.fproperty_sub_object).unwrap_or(0);
        let map_value = reader.read_ptr(address + p.fproperty_map_value).unwrap_or(0);
        let function_ptr = reader
            .read_ptr(address + p.ufunction_func_ptr_offset)
            .unwrap_or(0);
        let members_head = if p.uobject_fields_are_fproperty {
            reader
                .read_ptr(address + p.ustruct_children_props_offset)
                .unwrap_or(0)
        } else {
            reader.read_ptr(address + p.ustruct_children_offset).unwrap_or(0)
        };
        let bit_mask = reader.read_u8(address + p.fproperty_bool_byte_mask).unwrap_or(0);

        RawObjectInfo {
            object_id,
            type_name,
            name,
            full_name,
            address: hex(address),
            class_ptr: hex(class_ptr),
            outer_ptr: hex(outer_ptr),
            super_ptr: hex(super_ptr),
            properties_size: format!("{properties_size:#x} ({properties_size})"),
            sub_object_ptr: hex(sub_object),
            map_value_ptr: hex(map_value),
            function_ptr: hex(function_ptr),
            members_head: hex(members_head),
            bit_mask: format!("{bit_mask:#04x}"),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testutil::{parse, workbench};
    use super::*;
    use crate::fixture::TargetFixture;

    #[test]
    fn test_list_packages_sorted_with_counts() {
        let fx = TargetFixture::ue5();
        let parsed = parse(&fx);
        let wb = workbench(&fx, &parsed);

        let packages = wb.list_packages();
        let names: Vec<&str> = packages.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["/Script/CoreUObject", "/Script/Engine"]);
        assert!(packages.iter().all(|p| p.object_count > 0));
    }

    #[test]
    fn test_list_objects_by_category() {
        let fx = TargetFixture::ue5();
        let parsed = parse(&fx);
        let wb = workbench(&fx, &parsed);

        let classes = wb
            .list_objects("/Script/CoreUObject", Category::Class)
            .unwrap();
        assert!(classes
            .iter()
            .any(|o| o.name == "Object" && o.type_name == "Class"));
        // Ordered by name.
        let mut sorted = classes.clone();
        sorted.sort_by(|a, b| a.name.cmp(&b.name));
        assert_eq!(
            classes.iter().map(|o| &o.name).collect::<Vec<_>>(),
            sorted.iter().map(|o| &o.name).collect::<Vec<_>>()
        );

        let structs = wb
            .list_objects("/Script/CoreUObject", Category::Struct)
            .unwrap();
        assert!(structs.iter().any(|o| o.name == "Vector"));
        assert!(!structs.iter().any(|o| o.name == "Object"));

        let enums = wb.list_objects("/Script/Engine", Category::Enum).unwrap();
        assert!(enums.iter().any(|o| o.name == "EMobility"));

        let functions = wb
            .list_objects("/Script/Engine", Category::Function)
            .unwrap();
        assert!(functions
            .iter()
            .any(|o| o.full_name == "/Script/Engine.Actor:ReceiveTick"));

        assert!(wb.list_objects("/Script/Missing", Category::Class).is_err());
    }

    #[test]
    fn test_global_search_object_mode() {
        let fx = TargetFixture::ue5();
        let parsed = parse(&fx);
        let wb = workbench(&fx, &parsed);

        let hits = wb.global_search("Vector", SearchMode::Object);
        assert!(hits.iter().any(|h| {
            h.package_name == "/Script/CoreUObject"
                && h.object_name == "Vector"
                && h.type_name == "ScriptStruct"
                && h.member_name.is_none()
        }));

        // Case-insensitive substring.
        let hits = wb.global_search("vecT", SearchMode::Object);
        assert!(hits.iter().any(|h| h.object_name == "Vector"));

        // Instances are not part of object search.
        let hits = wb.global_search("Actor_1", SearchMode::Object);
        assert!(hits.is_empty());
    }

    #[test]
    fn test_global_search_hits_appear_in_their_package_listing() {
        let fx = TargetFixture::ue5();
        let parsed = parse(&fx);
        let wb = workbench(&fx, &parsed);

        for hit in wb.global_search("o", SearchMode::Object) {
            let category = Category::of(&hit.type_name).unwrap();
            let listed = wb.list_objects(&hit.package_name, category).unwrap();
            assert!(
                listed.iter().any(|o| o.address == hit.address),
                "{} missing from {}",
                hit.object_name,
                hit.package_name
            );
        }
    }

    #[test]
    fn test_global_search_member_mode() {
        let fx = TargetFixture::ue5();
        let parsed = parse(&fx);
        let wb = workbench(&fx, &parsed);

        let hits = wb.global_search("X", SearchMode::Member);
        assert!(hits
            .iter()
            .any(|h| h.object_name == "Vector" && h.member_name.as_deref() == Some("X")));

        // Enum values are searchable members too.
        let hits = wb.global_search("Movable", SearchMode::Member);
        assert!(hits
            .iter()
            .any(|h| h.object_name == "EMobility"
                && h.member_name.as_deref() == Some("EMobility::Movable")));
    }

    #[test]
    fn test_global_search_ordering() {
        let fx = TargetFixture::ue5();
        let parsed = parse(&fx);
        let wb = workbench(&fx, &parsed);

        let hits = wb.global_search("e", SearchMode::Object);
        let keys: Vec<(String, String)> = hits
            .iter()
            .map(|h| (h.package_name.clone(), h.object_name.to_lowercase()))
            .collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }

    #[test]
    fn test_get_object_details_not_found() {
        let fx = TargetFixture::ue5();
        let parsed = parse(&fx);
        let wb = workbench(&fx, &parsed);

        let err = wb.get_object_details(0xDEAD_BEEF).unwrap_err();
        assert!(matches!(err, Error::NotFound { what: "Object", .. }));
    }

    #[test]
    fn test_analyze_fname() {
        let fx = TargetFixture::ue5();
        let parsed = parse(&fx);
        let wb = workbench(&fx, &parsed);

        assert_eq!(wb.analyze_fname(0).unwrap(), "None");
        assert!(wb.analyze_fname(0xFFFF_0000).is_err());
    }

    #[test]
    fn test_analyze_object_raw_reads() {
        let fx = TargetFixture::ue5();
        let parsed = parse(&fx);
        let wb = workbench(&fx, &parsed);

        let raw = wb.analyze_object(fx.addr("Actor"));
        assert_eq!(raw.name, "Actor");
        assert_eq!(raw.type_name, "Class");
        assert_eq!(raw.full_name, "/Script/Engine.Actor");
        assert_eq!(raw.super_ptr, format!("{:#x}", fx.addr("Object")));
        assert!(raw.address.starts_with("0x"));
    }

    #[test]
    fn test_queries_are_pure() {
        let fx = TargetFixture::ue5();
        let parsed = parse(&fx);
        let wb = workbench(&fx, &parsed);

        let first = wb.global_search("Actor", SearchMode::Object);
        let second = wb.global_search("Actor", SearchMode::Object);
        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.address, b.address);
            assert_eq!(a.object_name, b.object_name);
        }
    }
}
