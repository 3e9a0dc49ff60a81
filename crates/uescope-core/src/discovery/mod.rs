//! Locating the engine globals behind the module base.
//!
//! Three locators run in order — NamePool, GUObjectArray, GWorld — each
//! scanning curated byte signatures, resolving the RIP-relative operand and
//! validating the candidate structurally before a bounded proximity probe
//! takes over as last resort.

mod locator;
mod probe;
mod scanner;
mod signature;

pub use locator::Discovery;
pub use probe::{walk_window, ProbeTarget, ProximityProbe};
pub use scanner::{find_pattern_in_buffer, resolve_rip, scan_range};
pub use signature::{
    builtin_signatures, format_pattern, load_signatures, parse_pattern, save_signatures,
    CodeSignature, SignatureEntry, SignatureSet,
};
