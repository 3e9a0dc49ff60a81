//! The command facade the UI invokes.
//!
//! A `Session` owns at most one attached target at a time. Attaching builds
//! the per-attach context (reader, module map, storage latches); detaching
//! drops it, invalidating everything parsed. Parser commands offload their
//! walks to a worker thread and coalesce concurrent invocations; read-side
//! commands fail fast with `NotReady` until their latches are installed.

use std::sync::{Arc, Mutex};
use std::thread;

use tracing::info;

use crate::cancel::CancelToken;
use crate::discovery::{builtin_signatures, Discovery, SignatureSet};
use crate::error::{Error, Result};
use crate::events::{EventBus, ProgressEvent};
use crate::layout::{FileVersion, LayoutProfile};
use crate::memory::{list_processes, ModuleInfo, ModuleMap, ProcessHandle, ProcessInfo, ReadMemory};
use crate::names::NamePoolReader;
use crate::objects::ObjectArrayParser;
use crate::query::{
    Category, GlobalSearchResult, InstanceMatch, ObjectSummary, PackageSummary, RawObjectInfo,
    SearchMode, Workbench,
};
use crate::reflect::{DetailedObjectInfo, InstanceHierarchyNode, InstancePropertySample};
use crate::store::Storage;

/// Per-attach context: everything dropped on detach.
struct AttachedTarget {
    pid: u32,
    name: String,
    reader: Arc<dyn ReadMemory>,
    modules: ModuleMap,
    file_version: Option<FileVersion>,
    storage: Storage,
}

impl AttachedTarget {
    fn main_module(&self) -> Result<&ModuleInfo> {
        self.modules
            .main()
            .ok_or_else(|| Error::Process("Module map is empty".to_string()))
    }
}

/// Parse a `0x`-prefixed (or bare) hex address.
pub fn parse_hex_address(s: &str) -> Result<u64> {
    let trimmed = s.trim().trim_start_matches("0x").trim_start_matches("0X");
    u64::from_str_radix(trimmed, 16)
        .map_err(|_| Error::not_found("Address", format!("invalid hex '{s}'")))
}

pub struct Session {
    target: Mutex<Option<Arc<AttachedTarget>>>,
    events: Arc<EventBus>,
    cancel: Arc<CancelToken>,
    signatures: SignatureSet,
}

impl Session {
    pub fn new() -> Self {
        Self::with_signatures(builtin_signatures())
    }

    pub fn with_signatures(signatures: SignatureSet) -> Self {
        Self {
            target: Mutex::new(None),
            events: Arc::new(EventBus::new()),
            cancel: Arc::new(CancelToken::new()),
            signatures,
        }
    }

    /// Subscribe to progress events.
    pub fn events(&self) -> std::sync::mpsc::Receiver<ProgressEvent> {
        self.events.subscribe()
    }

    /// Cancel in-flight parser work. Cancelled parsers do not install their
    /// latches.
    pub fn cancel_parsing(&self) {
        self.cancel.cancel();
    }

    pub fn is_attached(&self) -> bool {
        self.target.lock().unwrap().is_some()
    }

    // ─── lifecycle ───────────────────────────────────────────────────

    /// Enumerate running processes, sorted by name.
    pub fn fetch_system_processes(&self) -> Vec<ProcessInfo> {
        list_processes()
    }

    /// Open the target read-only and build the per-attach context.
    pub fn attach_to_process(&self, pid: u32, name: &str) -> Result<String> {
        let process = ProcessHandle::attach(pid, name)?;
        let file_version = process.file_version().ok();
        let modules = process.modules().clone();
        self.install(AttachedTarget {
            pid,
            name: name.to_string(),
            reader: Arc::new(process),
            modules,
            file_version,
            storage: Storage::new(),
        });
        Ok(format!("Successfully attached to {name}"))
    }

    /// Attach over an arbitrary reader (a replayed image, a non-live
    /// target). Same lifecycle as a live attach.
    pub fn attach_with_reader(
        &self,
        pid: u32,
        name: &str,
        reader: Arc<dyn ReadMemory>,
        modules: ModuleMap,
        file_version: Option<FileVersion>,
    ) -> Result<String> {
        self.install(AttachedTarget {
            pid,
            name: name.to_string(),
            reader,
            modules,
            file_version,
            storage: Storage::new(),
        });
        Ok(format!("Successfully attached to {name}"))
    }

    fn install(&self, target: AttachedTarget) {
        let event = ProgressEvent::ProcessSelected {
            process_name: target.name.clone(),
            pid: target.pid,
        };
        info!("Attached to {} (pid {})", target.name, target.pid);
        self.cancel.reset();
        *self.target.lock().unwrap() = Some(Arc::new(target));
        self.events.emit(event);
    }

    /// Drop the attached context. Pending parsers are cancelled and never
    /// install their latches.
    pub fn detach(&self) {
        self.cancel.cancel();
        *self.target.lock().unwrap() = None;
    }

    fn target(&self) -> Result<Arc<AttachedTarget>> {
        self.target
            .lock()
            .unwrap()
            .clone()
            .ok_or(Error::NotAttached)
    }

    // ─── version & discovery ─────────────────────────────────────────

    fn ensure_profile(&self, target: &AttachedTarget) -> Result<Arc<LayoutProfile>> {
        if let Some(profile) = target.storage.profile.peek() {
            return Ok(profile);
        }
        let profile = match target.file_version {
            Some(version) => {
                let _ = target.storage.version.set(version);
                LayoutProfile::select(version.ue_major(), true)?
            }
            None => {
                // No version resource on this target; take the newest
                // profile and mark it degraded.
                let mut fallback = LayoutProfile::select(5, false)?;
                fallback.degraded = true;
                fallback
            }
        };
        match target.storage.profile.set(profile) {
            Ok(profile) => Ok(profile),
            Err(_) => target.storage.profile.get(),
        }
    }

    /// The target's UE major version, as a string.
    pub fn get_ue_version(&self) -> Result<String> {
        let target = self.target()?;
        if let Some(version) = target.storage.version.peek() {
            return Ok(version.ue_major().to_string());
        }
        let version = target.file_version.ok_or_else(|| {
            Error::Process("File version metadata unavailable for this target".to_string())
        })?;
        let _ = target.storage.version.set(version);
        Ok(version.ue_major().to_string())
    }

    /// The selected layout profile (resolving it on first use).
    pub fn layout_profile(&self) -> Result<LayoutProfile> {
        let target = self.target()?;
        self.ensure_profile(&target).map(|p| *p)
    }

    pub fn get_fname_pool_address(&self) -> Result<u64> {
        let target = self.target()?;
        if let Some(addr) = target.storage.name_pool_base.peek() {
            return Ok(*addr);
        }
        let profile = self.ensure_profile(&target)?;
        let discovery = Discovery::new(
            target.reader.as_ref(),
            &profile,
            target.main_module()?,
            &self.signatures,
        );
        let addr = discovery.locate_name_pool()?;
        match target.storage.name_pool_base.set(addr) {
            Ok(_) => Ok(addr),
            Err(_) => target.storage.name_pool_base.get().map(|a| *a),
        }
    }

    pub fn get_guobject_array_address(&self) -> Result<u64> {
        let target = self.target()?;
        if let Some(addr) = target.storage.object_array_base.peek() {
            return Ok(*addr);
        }
        let profile = self.ensure_profile(&target)?;
        let pool_hint = target.storage.name_pool_base.peek().map(|a| *a);
        let discovery = Discovery::new(
            target.reader.as_ref(),
            &profile,
            target.main_module()?,
            &self.signatures,
        );
        let addr = discovery.locate_object_array(pool_hint)?;
        match target.storage.object_array_base.set(addr) {
            Ok(_) => Ok(addr),
            Err(_) => target.storage.object_array_base.get().map(|a| *a),
        }
    }

    pub fn get_gworld_address(&self) -> Result<u64> {
        let target = self.target()?;
        if let Some(addr) = target.storage.gworld_base.peek() {
            return Ok(*addr);
        }
        let profile = self.ensure_profile(&target)?;
        let pool_hint = target.storage.name_pool_base.peek().map(|a| *a);
        let discovery = Discovery::new(
            target.reader.as_ref(),
            &profile,
            target.main_module()?,
            &self.signatures,
        );
        let addr = discovery.locate_gworld(pool_hint)?;
        match target.storage.gworld_base.set(addr) {
            Ok(_) => Ok(addr),
            Err(_) => target.storage.gworld_base.get().map(|a| *a),
        }
    }

    /// Resolve all three registry bases and format them as a text block.
    pub fn show_base_address(&self) -> Result<String> {
        let fname = self.get_fname_pool_address()?;
        let guobject = self.get_guobject_array_address()?;
        let gworld = self.get_gworld_address()?;
        Ok(format!(
            "[ FNamePool ] {fname:#x}\n[ GUObject  ] {guobject:#x}\n[ GWorld    ] {gworld:#x}"
        ))
    }

    // ─── parsers ─────────────────────────────────────────────────────

    /// Parse the NamePool on a worker thread; returns the name count.
    ///
    /// Concurrent invocations coalesce: the second caller blocks on the
    /// parse guard and then observes the first one's table.
    pub fn parse_fname_pool(&self) -> Result<u32> {
        let target = self.target()?;
        let base = *target.storage.name_pool_base.get()?;
        let profile = self.ensure_profile(&target)?;

        let _guard = target.storage.name_parse_guard.lock().unwrap();
        if let Some(table) = target.storage.names.peek() {
            return Ok(table.len() as u32);
        }

        let reader = Arc::clone(&target.reader);
        let events = Arc::clone(&self.events);
        let cancel = Arc::clone(&self.cancel);
        let worker = thread::spawn(move || {
            NamePoolReader::new(reader.as_ref(), &profile, base).parse(&events, &cancel)
        });
        let table = worker
            .join()
            .map_err(|_| Error::Process("NamePool parser worker panicked".to_string()))??;

        let count = table.len() as u32;
        info!("NamePool parsed: {count} names");
        target.storage.names.set(table)?;
        Ok(count)
    }

    /// Parse the GUObjectArray on a worker thread; returns the live object
    /// count. Requires the name table for the enrichment pass.
    pub fn parse_guobject_array(&self) -> Result<u32> {
        let target = self.target()?;
        let base = *target.storage.object_array_base.get()?;
        let profile = self.ensure_profile(&target)?;
        let names = target.storage.names.get()?;

        let _guard = target.storage.object_parse_guard.lock().unwrap();
        if let Some(table) = target.storage.objects.peek() {
            return Ok(table.live_count());
        }

        let reader = Arc::clone(&target.reader);
        let events = Arc::clone(&self.events);
        let cancel = Arc::clone(&self.cancel);
        let worker = thread::spawn(move || {
            let parser = ObjectArrayParser::new(reader.as_ref(), &profile, base);
            let mut table = parser.parse(&events, &cancel)?;
            let (index, packages) = parser.enrich(&mut table, &names);
            Ok::<_, Error>((table, index, packages))
        });
        let (table, index, packages) = worker
            .join()
            .map_err(|_| Error::Process("GUObjectArray parser worker panicked".to_string()))??;

        let count = table.live_count();
        info!("GUObjectArray parsed: {count} objects");
        target.storage.objects.set(table)?;
        target.storage.object_index.set(index)?;
        target.storage.packages.set(packages)?;
        Ok(count)
    }

    // ─── queries ─────────────────────────────────────────────────────

    fn with_workbench<T>(
        &self,
        f: impl FnOnce(&Workbench<'_, dyn ReadMemory>) -> Result<T>,
    ) -> Result<T> {
        let target = self.target()?;
        let profile = target.storage.profile.get()?;
        let names = target.storage.names.get()?;
        let objects = target.storage.objects.get()?;
        let index = target.storage.object_index.get()?;
        let packages = target.storage.packages.get()?;
        let module_base = target.modules.main().map(|m| m.base).unwrap_or(0);

        let workbench = Workbench {
            reader: target.reader.as_ref(),
            profile: &profile,
            names: &names,
            objects: &objects,
            index: &index,
            packages: &packages,
            module_base,
        };
        f(&workbench)
    }

    pub fn get_packages(&self) -> Result<Vec<PackageSummary>> {
        self.with_workbench(|wb| Ok(wb.list_packages()))
    }

    pub fn get_objects(&self, package: &str, category: &str) -> Result<Vec<ObjectSummary>> {
        let category: Category = category.parse()?;
        self.with_workbench(|wb| wb.list_objects(package, category))
    }

    pub fn global_search(&self, query: &str, mode: &str) -> Result<Vec<GlobalSearchResult>> {
        let mode: SearchMode = mode.parse()?;
        self.with_workbench(|wb| Ok(wb.global_search(query, mode)))
    }

    pub fn get_object_details(&self, address: u64) -> Result<DetailedObjectInfo> {
        self.with_workbench(|wb| wb.get_object_details(address))
    }

    pub fn analyze_fname(&self, id: u32) -> Result<String> {
        let target = self.target()?;
        let names = target.storage.names.get()?;
        names
            .get(id)
            .map(str::to_string)
            .ok_or_else(|| Error::not_found("NameId", id.to_string()))
    }

    pub fn analyze_object(&self, address_hex: &str) -> Result<RawObjectInfo> {
        let address = parse_hex_address(address_hex)?;
        self.with_workbench(|wb| Ok(wb.analyze_object(address)))
    }

    pub fn add_inspector(&self, instance_address: u64) -> Result<Vec<InstanceHierarchyNode>> {
        self.with_workbench(|wb| wb.add_inspector(instance_address))
    }

    pub fn get_instance_details(
        &self,
        instance_address: u64,
        class_address: u64,
    ) -> Result<Vec<InstancePropertySample>> {
        self.with_workbench(|wb| wb.get_instance_details(instance_address, class_address))
    }

    pub fn get_array_elements(
        &self,
        array_address: u64,
        inner_type: &str,
        count: i32,
    ) -> Result<Vec<InstancePropertySample>> {
        self.with_workbench(|wb| wb.get_array_elements(array_address, inner_type, count))
    }

    pub fn search_object_instances(&self, class_address: u64) -> Result<Vec<InstanceMatch>> {
        self.with_workbench(|wb| wb.search_object_instances(class_address))
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{SharedImage, TargetFixture};

    fn attach(fx: &Arc<TargetFixture>, major: u32) -> Session {
        let session = Session::new();
        session
            .attach_with_reader(
                4242,
                "Game.exe",
                Arc::new(SharedImage(Arc::clone(fx))),
                fx.modules.clone(),
                Some(FileVersion {
                    major,
                    minor: 27,
                    build: 2,
                    revision: 0,
                }),
            )
            .unwrap();
        session
    }

    #[test]
    fn test_commands_require_attach() {
        let session = Session::new();
        assert!(matches!(session.get_ue_version(), Err(Error::NotAttached)));
        assert!(matches!(session.get_packages(), Err(Error::NotAttached)));
    }

    #[test]
    fn test_version_gating_major_4() {
        let fx = Arc::new(TargetFixture::ue4());
        let session = attach(&fx, 4);

        assert_eq!(session.get_ue_version().unwrap(), "4");
        let profile = session.layout_profile().unwrap();
        assert!(!profile.uobject_fields_are_fproperty);
        assert!(!profile.degraded);
    }

    #[test]
    fn test_queries_fail_fast_before_parse() {
        let fx = Arc::new(TargetFixture::ue5());
        let session = attach(&fx, 5);

        assert!(matches!(
            session.get_packages(),
            Err(Error::NotReady { .. })
        ));
        assert!(matches!(
            session.parse_fname_pool(),
            Err(Error::NotReady {
                component: "NamePool"
            })
        ));
    }

    #[test]
    fn test_full_pipeline() {
        let fx = Arc::new(TargetFixture::ue5());
        let session = attach(&fx, 5);

        assert_eq!(session.get_ue_version().unwrap(), "5");
        assert_eq!(session.get_fname_pool_address().unwrap(), fx.name_pool_base);
        assert_eq!(
            session.get_guobject_array_address().unwrap(),
            fx.object_array_base
        );
        assert_eq!(session.get_gworld_address().unwrap(), fx.gworld_base);

        let names = session.parse_fname_pool().unwrap();
        assert_eq!(names as usize, fx.name_count());
        let objects = session.parse_guobject_array().unwrap();
        assert_eq!(objects, fx.object_count() - 1);

        // S-style checks across the whole surface.
        assert_eq!(session.analyze_fname(0).unwrap(), "None");

        let packages = session.get_packages().unwrap();
        assert_eq!(packages.len(), 2);

        let classes = session
            .get_objects("/Script/CoreUObject", "Class")
            .unwrap();
        assert!(classes.iter().any(|o| o.name == "Object"));

        let hits = session.global_search("Vector", "Object").unwrap();
        assert!(hits.iter().any(|h| h.type_name == "ScriptStruct"));

        let details = session.get_object_details(fx.addr("Object")).unwrap();
        assert!(details.inheritance.is_empty());
        assert!(details
            .properties
            .iter()
            .any(|p| p.name == "Name" && p.property_type == "NameProperty"));

        let hierarchy = session.add_inspector(fx.addr("Actor_1")).unwrap();
        assert_eq!(hierarchy.last().unwrap().class_name, "Object");

        let samples = session
            .get_instance_details(fx.addr("Actor_1"), fx.addr("Actor"))
            .unwrap();
        let root = samples
            .iter()
            .find(|s| s.property_name == "RootComponent")
            .unwrap();
        assert!(root.is_object);
        assert_ne!(root.object_instance_address, "0x0");
        assert!(!root.object_instance_address.is_empty());

        let matches = session
            .search_object_instances(fx.addr("Actor"))
            .unwrap();
        assert_eq!(matches.len(), 1);

        let raw = session
            .analyze_object(&format!("{:#x}", fx.addr("Actor")))
            .unwrap();
        assert_eq!(raw.name, "Actor");
    }

    #[test]
    fn test_show_base_address_formats_all_three() {
        let fx = Arc::new(TargetFixture::ue5());
        let session = attach(&fx, 5);

        let block = session.show_base_address().unwrap();
        assert!(block.contains("FNamePool"));
        assert!(block.contains(&format!("{:#x}", fx.name_pool_base)));
        assert!(block.contains(&format!("{:#x}", fx.gworld_base)));
    }

    #[test]
    fn test_parsers_are_idempotent_and_coalesced() {
        let fx = Arc::new(TargetFixture::ue5());
        let session = attach(&fx, 5);

        session.get_fname_pool_address().unwrap();
        session.get_guobject_array_address().unwrap();

        let first = session.parse_fname_pool().unwrap();
        let second = session.parse_fname_pool().unwrap();
        assert_eq!(first, second);

        let objects_first = session.parse_guobject_array().unwrap();
        let objects_second = session.parse_guobject_array().unwrap();
        assert_eq!(objects_first, objects_second);

        // Discovery latches are idempotent too.
        assert_eq!(session.get_fname_pool_address().unwrap(), fx.name_pool_base);
    }

    #[test]
    fn test_cancelled_parser_does_not_install_latch() {
        let fx = Arc::new(TargetFixture::ue5());
        let session = attach(&fx, 5);
        session.get_fname_pool_address().unwrap();

        session.cancel_parsing();
        assert!(matches!(
            session.parse_fname_pool(),
            Err(Error::Cancelled)
        ));
        assert!(matches!(
            session.analyze_fname(0),
            Err(Error::NotReady { .. })
        ));
    }

    #[test]
    fn test_detach_invalidates_everything() {
        let fx = Arc::new(TargetFixture::ue5());
        let session = attach(&fx, 5);
        session.get_fname_pool_address().unwrap();
        session.parse_fname_pool().unwrap();

        session.detach();
        assert!(!session.is_attached());
        assert!(matches!(session.get_packages(), Err(Error::NotAttached)));

        // Re-attach starts from scratch: nothing parsed survives.
        let session2 = attach(&fx, 5);
        assert!(matches!(
            session2.analyze_fname(0),
            Err(Error::NotReady { .. })
        ));
    }

    #[test]
    fn test_progress_events_reach_subscribers() {
        let fx = Arc::new(TargetFixture::ue5());
        let session = attach(&fx, 5);
        let rx = session.events();

        session.get_fname_pool_address().unwrap();
        session.get_guobject_array_address().unwrap();
        session.parse_fname_pool().unwrap();
        session.parse_guobject_array().unwrap();

        let events: Vec<ProgressEvent> = rx.try_iter().collect();
        assert!(events
            .iter()
            .any(|e| e.channel() == "fname-pool-progress"));
        assert!(events
            .iter()
            .any(|e| e.channel() == "guobject-array-progress"));
    }
}
