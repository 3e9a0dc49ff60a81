use serde::Serialize;

/// A loaded module of the attached process.
#[derive(Debug, Clone, Serialize)]
pub struct ModuleInfo {
    pub name: String,
    pub path: String,
    pub base: u64,
    pub size: u64,
}

impl ModuleInfo {
    pub fn contains(&self, address: u64) -> bool {
        address >= self.base && address < self.base + self.size
    }
}

/// Base + size per loaded module, acquired on attach and rebuilt only on
/// re-attach. The first entry is the main executable.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ModuleMap {
    modules: Vec<ModuleInfo>,
}

impl ModuleMap {
    pub fn from_modules(modules: Vec<ModuleInfo>) -> Self {
        Self { modules }
    }

    pub fn main(&self) -> Option<&ModuleInfo> {
        self.modules.first()
    }

    pub fn base(&self, name: &str) -> Option<u64> {
        self.modules
            .iter()
            .find(|m| m.name.eq_ignore_ascii_case(name))
            .map(|m| m.base)
    }

    /// Whether the address lies inside any module's `[base, base+size)`.
    pub fn contains(&self, address: u64) -> bool {
        self.modules.iter().any(|m| m.contains(address))
    }

    pub fn find(&self, address: u64) -> Option<&ModuleInfo> {
        self.modules.iter().find(|m| m.contains(address))
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModuleInfo> {
        self.modules.iter()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}
