//! Synthetic process images for tests.
//!
//! `TargetFixture::ue5()` lays out a miniature but structurally faithful
//! target: a NamePool with real entry headers, a chunked GUObjectArray, a
//! small class/struct/enum/function graph with FField property chains, live
//! instances with decodable values, and module bytes carrying scannable
//! signatures. `TargetFixture::ue4()` builds a minimal UField-generation
//! image for the legacy walker.

use std::collections::HashMap;

use crate::layout::LayoutProfile;
use crate::memory::mock::MockMemoryReader;
use crate::memory::{ModuleInfo, ModuleMap};

pub const MODULE_BASE: u64 = 0x1_4000_0000;
pub const MODULE_SIZE: u64 = 0x10000;
pub const NAME_POOL_BASE: u64 = 0x1_5000_0000;
pub const NAME_BLOCK_BASE: u64 = 0x1_5100_0000;
pub const OBJECT_ARRAY_BASE: u64 = 0x1_6000_0000;
pub const CHUNK_TABLE_BASE: u64 = 0x1_6100_0000;
pub const CHUNK0_BASE: u64 = 0x1_6200_0000;
pub const OBJECT_BASE: u64 = 0x1_7000_0000;
pub const GWORLD_SLOT: u64 = MODULE_BASE + 0x8000;

const OBJECT_STRIDE: u64 = 0x200;

pub struct TargetFixture {
    pub mem: MockMemoryReader,
    pub profile: LayoutProfile,
    pub module_base: u64,
    pub modules: ModuleMap,
    pub name_pool_base: u64,
    pub object_array_base: u64,
    pub gworld_base: u64,

    name_ids: HashMap<String, u32>,
    name_cursor: u64,
    addrs: HashMap<String, u64>,
    slots: u32,
    aux_cursor: u64,
}

impl TargetFixture {
    /// Full UE5-generation image.
    pub fn ue5() -> Self {
        let mut fx = Self::empty(LayoutProfile::select(5, false).unwrap());
        fx.build_graph();
        fx.finish_object_array();
        fx.write_signatures();
        fx
    }

    /// Minimal UE4-generation image: one class with a UField property chain.
    pub fn ue4() -> Self {
        let mut fx = Self::empty(LayoutProfile::select(4, false).unwrap());
        fx.build_ue4_graph();
        fx.finish_object_array();
        fx
    }

    fn empty(profile: LayoutProfile) -> Self {
        let mem = MockMemoryReader::new();
        mem.region(MODULE_BASE, MODULE_SIZE as usize);
        mem.region(NAME_POOL_BASE, 0x1000);
        mem.region(NAME_BLOCK_BASE, profile.name_block_size() as usize);
        mem.region(OBJECT_ARRAY_BASE, 0x100);
        mem.region(CHUNK_TABLE_BASE, 0x100);
        mem.region(CHUNK0_BASE, 0x10000);
        mem.region(OBJECT_BASE, 0x20_0000);

        // Blocks array: one block.
        mem.write_ptr(NAME_POOL_BASE + profile.name_pool_blocks, NAME_BLOCK_BASE);
        mem.write_u32(NAME_POOL_BASE + profile.name_pool_current_block, 0);

        // Chunk table: one chunk.
        mem.write_ptr(OBJECT_ARRAY_BASE, CHUNK_TABLE_BASE);
        mem.write_ptr(CHUNK_TABLE_BASE, CHUNK0_BASE);

        let modules = ModuleMap::from_modules(vec![ModuleInfo {
            name: "Game.exe".to_string(),
            path: "C:/Game/Game.exe".to_string(),
            base: MODULE_BASE,
            size: MODULE_SIZE,
        }]);

        let mut fx = Self {
            mem,
            profile,
            module_base: MODULE_BASE,
            modules,
            name_pool_base: NAME_POOL_BASE,
            object_array_base: OBJECT_ARRAY_BASE,
            gworld_base: GWORLD_SLOT,
            name_ids: HashMap::new(),
            name_cursor: 0,
            addrs: HashMap::new(),
            slots: 0,
            aux_cursor: OBJECT_BASE + 0x10_0000,
        };
        // Entry 0 must decode to "None".
        fx.add_name("None");
        fx
    }

    // ─── names ───────────────────────────────────────────────────────

    /// Append one entry to block 0 and return its composite id.
    pub fn add_name(&mut self, name: &str) -> u32 {
        if let Some(&id) = self.name_ids.get(name) {
            return id;
        }
        let stride = self.profile.name_block_stride;
        let header_size = self.profile.name_entry_header_size;
        let wide = !name.is_ascii();
        let id = (self.name_cursor / stride) as u32;
        let entry = NAME_BLOCK_BASE + self.name_cursor;

        let payload: Vec<u8> = if wide {
            name.encode_utf16().flat_map(|u| u.to_le_bytes()).collect()
        } else {
            name.as_bytes().to_vec()
        };
        let len = if wide { name.encode_utf16().count() } else { payload.len() };
        let header = ((len as u16) << 6) | u16::from(wide);

        self.mem.write_u16(entry, header);
        self.mem.write(entry + header_size, &payload);

        let aligned = (payload.len() as u64).div_ceil(stride) * stride;
        self.name_cursor += header_size + aligned;
        self.mem.write_u32(
            NAME_POOL_BASE + self.profile.name_pool_current_cursor,
            self.name_cursor as u32,
        );

        self.name_ids.insert(name.to_string(), id);
        id
    }

    pub fn name_id(&self, name: &str) -> u32 {
        self.name_ids[name]
    }

    pub fn name_count(&self) -> usize {
        self.name_ids.len()
    }

    pub fn name_entry_address(&self, id: u32) -> u64 {
        NAME_BLOCK_BASE + (id & 0xFFFF) as u64 * self.profile.name_block_stride
    }

    // ─── objects ─────────────────────────────────────────────────────

    fn object_addr_for_slot(slot: u32) -> u64 {
        OBJECT_BASE + slot as u64 * OBJECT_STRIDE
    }

    /// Address of a named fixture object (or auxiliary allocation).
    pub fn addr(&self, key: &str) -> u64 {
        self.addrs[key]
    }

    pub fn object_count(&self) -> u32 {
        self.slots
    }

    fn alloc_aux(&mut self, size: u64) -> u64 {
        let addr = self.aux_cursor;
        self.aux_cursor += size.div_ceil(0x10) * 0x10;
        addr
    }

    /// Create a UObject in the next array slot.
    fn add_object(&mut self, key: &str, name: &str, class: u64, outer: u64) -> u64 {
        let slot = self.slots;
        self.slots += 1;
        let addr = Self::object_addr_for_slot(slot);
        let name_id = self.add_name(name);
        let p = self.profile;

        self.mem.write_ptr(addr, MODULE_BASE + 0x400); // vtable
        self.mem.write_u32(addr + p.uobject_flags, 1);
        self.mem.write_i32(addr + p.uobject_index, slot as i32);
        self.mem.write_ptr(addr + p.uobject_class, class);
        self.mem.write_u32(addr + p.uobject_name_id, name_id);
        self.mem.write_ptr(addr + p.uobject_outer, outer);

        let item = CHUNK0_BASE + slot as u64 * p.uobject_item_size;
        self.mem.write_ptr(item + p.uobject_item_object_offset, addr);
        self.mem.write_u32(item + 8, 0);

        self.addrs.insert(key.to_string(), addr);
        addr
    }

    /// Leave the next array slot empty.
    fn skip_slot(&mut self) {
        self.slots += 1;
    }

    fn finish_object_array(&mut self) {
        self.mem.write_u32(OBJECT_ARRAY_BASE + 0x10, 0x1000); // MaxElements
        self.mem.write_u32(OBJECT_ARRAY_BASE + 0x14, self.slots); // NumElements
        self.mem.write_u32(OBJECT_ARRAY_BASE + 0x18, 16); // MaxChunks
        self.mem.write_u32(OBJECT_ARRAY_BASE + 0x1C, 1); // NumChunks
    }

    // ─── fields ──────────────────────────────────────────────────────

    /// FFieldClass (UE5) carrying the property type name.
    fn field_class(&mut self, type_name: &str) -> u64 {
        let key = format!("ffc:{type_name}");
        if let Some(&addr) = self.addrs.get(&key) {
            return addr;
        }
        let addr = self.alloc_aux(0x20);
        let name_id = self.add_name(type_name);
        self.mem.write_u32(addr, name_id);
        self.addrs.insert(key, addr);
        addr
    }

    /// Allocate one FField/FProperty and fill the common slots.
    #[allow(clippy::too_many_arguments)]
    fn add_field(
        &mut self,
        name: &str,
        type_name: &str,
        offset: i32,
        element_size: i32,
        array_dim: i32,
        flags: u64,
        sub_object: u64,
    ) -> u64 {
        let p = self.profile;
        let addr = self.alloc_aux(0x100);
        let name_id = self.add_name(name);
        let class = self.field_class(type_name);

        self.mem.write_ptr(addr + p.ffield_class_offset, class);
        self.mem.write_u32(addr + p.ffield_name_offset, name_id);
        self.mem.write_i32(addr + p.fproperty_array_dim, array_dim);
        self.mem.write_i32(addr + p.fproperty_element_size, element_size);
        self.mem.write_u64(addr + p.fproperty_flags, flags);
        self.mem.write_i32(addr + p.fproperty_offset_internal, offset);
        if sub_object != 0 {
            self.mem.write_ptr(addr + p.fproperty_sub_object, sub_object);
        }
        addr
    }

    fn chain_fields(&mut self, struct_addr: u64, fields: &[u64]) {
        let p = self.profile;
        if let Some(&head) = fields.first() {
            self.mem.write_ptr(struct_addr + p.ustruct_children_props_offset, head);
        }
        for pair in fields.windows(2) {
            self.mem.write_ptr(pair[0] + p.ffield_next_offset, pair[1]);
        }
    }

    // ─── the UE5 graph ───────────────────────────────────────────────

    fn build_graph(&mut self) {
        let p = self.profile;

        // Core classes. "Class" is its own class.
        let class_class = self.add_object("Class", "Class", 0, 0);
        self.mem.write_ptr(class_class + p.uobject_class, class_class);
        let class_package = self.add_object("Package", "Package", class_class, 0);
        let pkg_core = self.add_object(
            "/Script/CoreUObject",
            "/Script/CoreUObject",
            class_package,
            0,
        );
        // Core classes live in the CoreUObject package.
        self.mem.write_ptr(class_class + p.uobject_outer, pkg_core);
        self.mem.write_ptr(class_package + p.uobject_outer, pkg_core);

        let class_scriptstruct = self.add_object("ScriptStruct", "ScriptStruct", class_class, pkg_core);
        let class_enum = self.add_object("Enum", "Enum", class_class, pkg_core);
        let class_function = self.add_object("Function", "Function", class_class, pkg_core);

        // UObject root class with its reflected Name property.
        let class_object = self.add_object("Object", "Object", class_class, pkg_core);
        let f_name = self.add_field("Name", "NameProperty", 0x18, 8, 1, 0, 0);
        self.chain_fields(class_object, &[f_name]);
        self.mem.write_i32(class_object + p.ustruct_properties_size_offset, 0x28);

        // Vector script struct: X/Y/Z floats.
        let vector = self.add_object("Vector", "Vector", class_scriptstruct, pkg_core);
        let f_x = self.add_field("X", "FloatProperty", 0x0, 4, 1, 0, 0);
        let f_y = self.add_field("Y", "FloatProperty", 0x4, 4, 1, 0, 0);
        let f_z = self.add_field("Z", "FloatProperty", 0x8, 4, 1, 0, 0);
        self.chain_fields(vector, &[f_x, f_y, f_z]);
        self.mem.write_i32(vector + p.ustruct_properties_size_offset, 0xC);

        // Engine package and its classes.
        let pkg_engine = self.add_object("/Script/Engine", "/Script/Engine", class_package, 0);
        let class_actor = self.add_object("Actor", "Actor", class_class, pkg_engine);
        let class_scene = self.add_object("SceneComponent", "SceneComponent", class_class, pkg_engine);
        self.mem.write_ptr(class_actor + p.ustruct_super_offset, class_object);
        self.mem.write_ptr(class_scene + p.ustruct_super_offset, class_object);

        // EMobility enum with two entries.
        let enum_mobility = self.add_object("EMobility", "EMobility", class_enum, pkg_engine);
        let pairs = self.alloc_aux(2 * p.uenum_pair_stride);
        let id_static = self.add_name("EMobility::Static");
        let id_movable = self.add_name("EMobility::Movable");
        self.mem.write_u32(pairs, id_static);
        self.mem.write_i64(pairs + 8, 0);
        self.mem.write_u32(pairs + p.uenum_pair_stride, id_movable);
        self.mem.write_i64(pairs + p.uenum_pair_stride + 8, 1);
        self.mem.write_ptr(enum_mobility + p.uenum_names_array_offset, pairs);
        self.mem.write_i32(enum_mobility + p.uenum_names_array_offset + 8, 2);

        // Actor's property chain.
        let f_hidden = self.add_field("bHidden", "BoolProperty", 0x60, 1, 1, 0, 0);
        self.mem.write_u8(f_hidden + p.fproperty_bool_byte_mask, 0x4);
        let f_root = self.add_field("RootComponent", "ObjectProperty", 0x130, 8, 1, 0, class_scene);
        let inner_tags = self.add_field("Tags_Inner", "NameProperty", 0, 8, 1, 0, 0);
        let f_tags = self.add_field("Tags", "ArrayProperty", 0x140, 0x10, 1, 0, inner_tags);
        let f_damage = self.add_field("Damage", "FloatProperty", 0x150, 4, 1, 0, 0);
        let f_title = self.add_field("Title", "StrProperty", 0x158, 0x10, 1, 0, 0);
        let f_health = self.add_field("Health", "IntProperty", 0x168, 4, 1, 0, 0);
        let f_mobility = self.add_field("Mobility", "ByteProperty", 0x16C, 1, 1, 0, enum_mobility);
        let map_key = self.add_field("Attributes_Key", "NameProperty", 0, 8, 1, 0, 0);
        let map_value = self.add_field("Attributes_Value", "IntProperty", 0, 4, 1, 0, 0);
        let f_attrs = self.add_field("Attributes", "MapProperty", 0x170, 0x50, 1, 0, map_key);
        self.mem.write_ptr(f_attrs + p.fproperty_map_value, map_value);
        let f_velocity = self.add_field("Velocity", "StructProperty", 0x1C0, 0xC, 1, 0, vector);
        self.chain_fields(
            class_actor,
            &[
                f_hidden, f_root, f_tags, f_damage, f_title, f_health, f_mobility, f_attrs,
                f_velocity,
            ],
        );
        self.mem.write_i32(class_actor + p.ustruct_properties_size_offset, 0x1D0);

        // ReceiveTick function owned by Actor.
        let func_tick = self.add_object("ReceiveTick", "ReceiveTick", class_function, class_actor);
        let f_delta = self.add_field(
            "DeltaSeconds",
            "FloatProperty",
            0x0,
            4,
            1,
            crate::layout::PROP_FLAG_PARM,
            0,
        );
        let f_ret = self.add_field(
            "ReturnValue",
            "BoolProperty",
            0x4,
            1,
            1,
            crate::layout::PROP_FLAG_PARM | crate::layout::PROP_FLAG_RETURN_PARM,
            0,
        );
        self.mem.write_u8(f_ret + p.fproperty_bool_byte_mask, 0x1);
        self.chain_fields(func_tick, &[f_delta, f_ret]);
        self.mem
            .write_ptr(func_tick + p.ufunction_func_ptr_offset, MODULE_BASE + 0x1234);

        let class_world = self.add_object("World", "World", class_class, pkg_engine);
        self.mem.write_ptr(class_world + p.ustruct_super_offset, class_object);

        // Live instances.
        let actor = self.add_object("Actor_1", "Actor_1", class_actor, pkg_engine);
        let root_comp = self.add_object("RootComp_1", "RootComp_1", class_scene, pkg_engine);
        self.skip_slot();
        let world = self.add_object("World_1", "World_1", class_world, pkg_engine);

        // Actor_1 live values.
        self.mem.write_u8(actor + 0x60, 0x4); // bHidden set
        self.mem.write_ptr(actor + 0x130, root_comp);
        let tags_data = self.alloc_aux(0x20);
        let id_alpha = self.add_name("Alpha");
        let id_beta = self.add_name("Beta");
        self.mem.write_u32(tags_data, id_alpha);
        self.mem.write_u32(tags_data + 8, id_beta);
        self.addrs.insert("Tags_Data".to_string(), tags_data);
        self.mem.write_ptr(actor + 0x140, tags_data);
        self.mem.write_i32(actor + 0x148, 2); // Tags num
        self.mem.write_i32(actor + 0x14C, 4); // Tags max
        self.mem.write_u32(actor + 0x150, 42.5f32.to_bits());
        let title_data = self.alloc_aux(0x20);
        let wide: Vec<u8> = "Hello\0".encode_utf16().flat_map(|u| u.to_le_bytes()).collect();
        self.mem.write(title_data, &wide);
        self.mem.write_ptr(actor + 0x158, title_data);
        self.mem.write_i32(actor + 0x160, 6); // FString num, incl. NUL
        self.mem.write_i32(actor + 0x164, 8);
        self.mem.write_i32(actor + 0x168, 99);
        self.mem.write_u8(actor + 0x16C, 1);
        let map_data = self.alloc_aux(0x40);
        self.mem.write_ptr(actor + 0x170, map_data);
        self.mem.write_i32(actor + 0x170 + 0x18, 3); // pair count
        self.mem.write_u32(actor + 0x1C0, 1.0f32.to_bits()); // Velocity.X
        self.mem.write_u32(actor + 0x1C4, 2.0f32.to_bits());
        self.mem.write_u32(actor + 0x1C8, 3.0f32.to_bits());

        // GWorld global slot.
        self.mem.write_ptr(GWORLD_SLOT, world);

        // One wide entry keeps the UTF-16 decode path honest.
        self.add_name("日本語");
    }

    // ─── the UE4 graph ───────────────────────────────────────────────

    fn build_ue4_graph(&mut self) {
        let p = self.profile;

        let class_class = self.add_object("Class", "Class", 0, 0);
        self.mem.write_ptr(class_class + p.uobject_class, class_class);
        let class_package = self.add_object("Package", "Package", class_class, 0);
        let pkg_core = self.add_object(
            "/Script/CoreUObject",
            "/Script/CoreUObject",
            class_package,
            0,
        );
        self.mem.write_ptr(class_class + p.uobject_outer, pkg_core);
        self.mem.write_ptr(class_package + p.uobject_outer, pkg_core);

        let class_int_prop = self.add_object("IntProperty", "IntProperty", class_class, pkg_core);
        let class_bool_prop = self.add_object("BoolProperty", "BoolProperty", class_class, pkg_core);
        let class_object = self.add_object("Object", "Object", class_class, pkg_core);

        // UField-generation property chain: property fields are UObjects.
        let f_health = self.add_object("Health", "Health", class_int_prop, class_object);
        self.mem.write_i32(f_health + p.fproperty_offset_internal, 0x30);
        self.mem.write_i32(f_health + p.fproperty_element_size, 4);
        self.mem.write_i32(f_health + p.fproperty_array_dim, 1);

        let f_visible = self.add_object("bVisible", "bVisible", class_bool_prop, class_object);
        self.mem.write_i32(f_visible + p.fproperty_offset_internal, 0x34);
        self.mem.write_i32(f_visible + p.fproperty_element_size, 1);
        self.mem.write_i32(f_visible + p.fproperty_array_dim, 1);
        self.mem.write_u8(f_visible + p.fproperty_bool_byte_mask, 0x2);

        self.mem.write_ptr(class_object + p.ustruct_children_offset, f_health);
        self.mem.write_ptr(f_health + p.ffield_next_offset, f_visible);
        self.mem.write_i32(class_object + p.ustruct_properties_size_offset, 0x38);
    }

    // ─── discovery bytes ─────────────────────────────────────────────

    /// Plant one known signature per locator inside the module image.
    fn write_signatures(&mut self) {
        // NamePool: "48 8D 0D ? ? ? ? E8 ? ? ? ? ? 8B ? C6", disp 3, len 7
        self.write_rip_site(
            MODULE_BASE + 0x100,
            &[0x48, 0x8D, 0x0D],
            3,
            7,
            &[0xE8, 0, 0, 0, 0, 0, 0x8B, 0, 0xC6],
            NAME_POOL_BASE,
        );
        // GUObjectArray: "4C 8B 05 ? ? ? ? 45 3B 88", disp 3, len 7
        self.write_rip_site(
            MODULE_BASE + 0x200,
            &[0x4C, 0x8B, 0x05],
            3,
            7,
            &[0x45, 0x3B, 0x88],
            OBJECT_ARRAY_BASE,
        );
        // GWorld: "48 8B 1D ? ? ? ? 48 85 DB 74 33 41 B0 01", disp 3, len 7
        self.write_rip_site(
            MODULE_BASE + 0x300,
            &[0x48, 0x8B, 0x1D],
            3,
            7,
            &[0x48, 0x85, 0xDB, 0x74, 0x33, 0x41, 0xB0, 0x01],
            GWORLD_SLOT,
        );
    }

    fn write_rip_site(
        &mut self,
        site: u64,
        prefix: &[u8],
        disp_offset: u64,
        instr_len: u64,
        tail: &[u8],
        target: u64,
    ) {
        let disp = (target as i64 - (site + instr_len) as i64) as i32;
        self.mem.write(site, prefix);
        self.mem.write(site + disp_offset, &disp.to_le_bytes());
        self.mem.write(site + instr_len, tail);
    }
}

/// Adapter exposing a shared fixture as a `'static` reader for the session
/// facade.
pub struct SharedImage(pub std::sync::Arc<TargetFixture>);

impl crate::memory::ReadMemory for SharedImage {
    fn read_bytes(&self, address: u64, len: usize) -> crate::error::Result<Vec<u8>> {
        crate::memory::ReadMemory::read_bytes(&self.0.mem, address, len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::ReadMemory;

    #[test]
    fn test_fixture_names_decode() {
        let fx = TargetFixture::ue5();
        assert_eq!(fx.name_id("None"), 0);
        let header = fx.mem.read_u16(fx.name_entry_address(0)).unwrap();
        assert_eq!(header >> 6, 4); // "None"
    }

    #[test]
    fn test_fixture_object_slots_match_index() {
        let fx = TargetFixture::ue5();
        let p = &fx.profile;
        let actor = fx.addr("Actor");
        let index = fx.mem.read_i32(actor + p.uobject_index).unwrap();
        let item = CHUNK0_BASE + index as u64 * p.uobject_item_size;
        assert_eq!(fx.mem.read_ptr(item).unwrap(), actor);
    }

    #[test]
    fn test_fixture_gworld_points_at_world_instance() {
        let fx = TargetFixture::ue5();
        let world = fx.mem.read_ptr(fx.gworld_base).unwrap();
        assert_eq!(world, fx.addr("World_1"));
    }
}
