//! Proximity probing: a bounded stride walk around a pivot address looking
//! for a value. Used when every signature for a target fails.
//!
//! Two match families: numeric equality/range, and a name id whose resolved
//! string matches a sentinel (equality or substring, selected per probe —
//! there is no range syntax for strings).

use crate::memory::ReadMemory;

/// What a probe is looking for at each candidate address.
pub enum ProbeTarget<'a> {
    U32(u32),
    U32Range(u32, u32),
    U64(u64),
    Name {
        expected: &'a str,
        substring: bool,
    },
}

impl ProbeTarget<'_> {
    fn matches<R, F>(&self, reader: &R, address: u64, resolve_name: &F) -> bool
    where
        R: ReadMemory + ?Sized,
        F: Fn(u32) -> Option<String>,
    {
        match self {
            Self::U32(expected) => reader.read_u32(address).is_ok_and(|v| v == *expected),
            Self::U32Range(lo, hi) => reader
                .read_u32(address)
                .is_ok_and(|v| (*lo..=*hi).contains(&v)),
            Self::U64(expected) => reader.read_u64(address).is_ok_and(|v| v == *expected),
            Self::Name {
                expected,
                substring,
            } => {
                let Ok(id) = reader.read_u32(address) else {
                    return false;
                };
                match resolve_name(id) {
                    Some(name) if *substring => name.contains(expected),
                    Some(name) => name == *expected,
                    None => false,
                }
            }
        }
    }
}

/// A bounded window walked at a fixed stride, centred on `pivot`.
pub struct ProximityProbe {
    pub pivot: u64,
    pub window: u64,
    pub stride: u64,
}

impl ProximityProbe {
    pub fn new(pivot: u64, window: u64, stride: u64) -> Self {
        Self {
            pivot,
            window,
            stride,
        }
    }

    /// First address in the window matching the target, scanning forward
    /// from the window start. Unreadable addresses are skipped.
    pub fn run<R, F>(&self, reader: &R, target: &ProbeTarget<'_>, resolve_name: F) -> Option<u64>
    where
        R: ReadMemory + ?Sized,
        F: Fn(u32) -> Option<String>,
    {
        walk_window(
            self.pivot.saturating_sub(self.window),
            self.pivot.saturating_add(self.window),
            self.stride,
            |address| target.matches(reader, address, &resolve_name),
        )
    }
}

/// The probe kernel: step `[start, end)` by `stride`, return the first
/// address the predicate accepts.
pub fn walk_window<F>(start: u64, end: u64, stride: u64, pred: F) -> Option<u64>
where
    F: Fn(u64) -> bool,
{
    if stride == 0 {
        return None;
    }
    let mut address = start;
    while address < end {
        if pred(address) {
            return Some(address);
        }
        address = address.saturating_add(stride);
    }
    None
}
