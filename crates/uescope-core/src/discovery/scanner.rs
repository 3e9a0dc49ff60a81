//! Pattern scanning over remote memory.

use rayon::prelude::*;

use crate::error::Result;
use crate::memory::ReadMemory;

/// Bytes read per scan chunk.
const SCAN_CHUNK: u64 = 0x10_0000;

/// Find every match of a masked pattern inside a local buffer.
///
/// Tight loop with a first-byte fast skip; wildcard positions are `None`.
pub fn find_pattern_in_buffer(buffer: &[u8], pattern: &[Option<u8>]) -> Vec<usize> {
    let mut matches = Vec::new();
    if pattern.is_empty() || buffer.len() < pattern.len() {
        return matches;
    }

    let first_byte = pattern[0];
    let mut i = 0;
    let end = buffer.len() - pattern.len();

    while i <= end {
        if let Some(b) = first_byte {
            let mut found = false;
            while i <= end {
                if buffer[i] == b {
                    found = true;
                    break;
                }
                i += 1;
            }
            if !found {
                break;
            }
        }

        let mut matched = true;
        for (j, p) in pattern.iter().enumerate().skip(1) {
            if let Some(p) = p {
                if buffer[i + j] != *p {
                    matched = false;
                    break;
                }
            }
        }

        if matched {
            matches.push(i);
        }
        i += 1;
    }

    matches
}

/// Scan `[start, start+size)` of the target for a pattern, reading in
/// overlapping chunks so matches crossing a chunk boundary are not lost.
/// Unreadable stretches are skipped.
pub fn scan_range<R: ReadMemory + ?Sized>(
    reader: &R,
    start: u64,
    size: u64,
    pattern: &[Option<u8>],
) -> Vec<u64> {
    if pattern.is_empty() || size == 0 {
        return Vec::new();
    }
    let overlap = (pattern.len() - 1) as u64;

    let mut chunks = Vec::new();
    let mut offset = 0u64;
    while offset < size {
        let len = (SCAN_CHUNK + overlap).min(size - offset);
        chunks.push((start + offset, len));
        offset += SCAN_CHUNK;
    }

    let mut results: Vec<u64> = chunks
        .into_par_iter()
        .flat_map(|(base, len)| {
            if let Ok(buffer) = reader.read_bytes(base, len as usize) {
                find_pattern_in_buffer(&buffer, pattern)
                    .into_iter()
                    .map(move |offset| base + offset as u64)
                    .collect::<Vec<u64>>()
            } else {
                Vec::new()
            }
        })
        .collect();

    results.sort_unstable();
    results.dedup();
    results
}

/// Resolve an RIP-relative operand: the target of
/// `instruction_address + instruction_length + displacement`.
pub fn resolve_rip<R: ReadMemory + ?Sized>(
    reader: &R,
    instr_addr: u64,
    disp_offset: usize,
    instr_len: usize,
) -> Result<u64> {
    let disp = reader.read_i32(instr_addr + disp_offset as u64)?;
    Ok((instr_addr + instr_len as u64).wrapping_add_signed(disp as i64))
}
