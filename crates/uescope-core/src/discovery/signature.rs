use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;

use crate::error::{Error, Result};

/// One masked byte signature with an RIP-relative operand slot.
///
/// `disp_offset` is where the 32-bit displacement sits inside the matched
/// instruction, `instr_len` the full instruction length; the located global
/// is `match_address + instr_len + displacement`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeSignature {
    pub pattern: String,
    pub disp_offset: usize,
    pub instr_len: usize,
}

impl CodeSignature {
    pub fn new(pattern: &str, disp_offset: usize, instr_len: usize) -> Self {
        Self {
            pattern: pattern.to_string(),
            disp_offset,
            instr_len,
        }
    }

    pub fn pattern_bytes(&self) -> Result<Vec<Option<u8>>> {
        parse_pattern(&self.pattern)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignatureEntry {
    pub name: String,
    pub signatures: Vec<CodeSignature>,
}

/// A curated set of signatures keyed by locator target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignatureSet {
    pub entries: Vec<SignatureEntry>,
}

impl SignatureSet {
    pub fn entry(&self, name: &str) -> Option<&SignatureEntry> {
        self.entries
            .iter()
            .find(|entry| entry.name.eq_ignore_ascii_case(name))
    }
}

pub fn load_signatures<P: AsRef<Path>>(path: P) -> Result<SignatureSet> {
    let file = fs::File::open(path)?;
    Ok(serde_json::from_reader(io::BufReader::new(file))?)
}

pub fn save_signatures<P: AsRef<Path>>(path: P, signatures: &SignatureSet) -> Result<()> {
    let file = fs::File::create(path)?;
    serde_json::to_writer_pretty(io::BufWriter::new(file), signatures)?;
    Ok(())
}

/// Convert an AOB string like `48 8D 0D ?? ?? ?? ?? E8` into masked bytes.
pub fn parse_pattern(pattern: &str) -> Result<Vec<Option<u8>>> {
    fn masked_byte(token: &str) -> Result<Option<u8>> {
        match token {
            "?" | "??" => Ok(None),
            byte => u8::from_str_radix(byte, 16)
                .map(Some)
                .map_err(|_| Error::corrupt_layout(format!("Bad byte '{byte}' in AOB pattern"))),
        }
    }

    let masked = pattern
        .split_whitespace()
        .map(masked_byte)
        .collect::<Result<Vec<_>>>()?;
    if masked.is_empty() {
        return Err(Error::corrupt_layout("AOB pattern has no bytes"));
    }
    Ok(masked)
}

pub fn format_pattern(bytes: &[Option<u8>]) -> String {
    use std::fmt::Write;

    let mut out = String::with_capacity(bytes.len() * 3);
    for byte in bytes {
        if !out.is_empty() {
            out.push(' ');
        }
        match byte {
            Some(value) => {
                let _ = write!(out, "{value:02X}");
            }
            None => out.push_str("??"),
        }
    }
    out
}

/// The compiled-in signature set covering the three locator targets.
pub fn builtin_signatures() -> SignatureSet {
    let name_pool = vec![
        CodeSignature::new("4C 8D 05 ? ? ? ? EB 16 48 8D 0D ? ? ? ? E8", 3, 7),
        CodeSignature::new("48 8D 0D ? ? ? ? E8 ? ? ? ? ? 8B ? C6", 3, 7),
        CodeSignature::new(
            "48 83 EC 28 48 8B 05 ? ? ? ? 48 85 C0 75 ? B9 ? ? 00 00 48 89 5C 24 20 E8",
            7,
            11,
        ),
        CodeSignature::new("C3 ? DB 48 89 1D ? ? ? ? ? ? 48 8B 5C 24 20", 6, 10),
        CodeSignature::new("33 F6 89 35 ? ? ? ? 8B C6 5E", 4, 8),
        CodeSignature::new("8B 07 8B 0D ? ? ? ? 8B 04 81", 4, 8),
    ];

    let object_array = vec![
        CodeSignature::new("44 8B ? ? ? 48 8D 05 ? ? ? ? ? ? ? ? ? 48 89 71 10", 8, 12),
        CodeSignature::new("40 53 48 83 EC 20 48 8B D9 48 85 D2 74 ? 8B", 22, 26),
        CodeSignature::new("4C 8B 05 ? ? ? ? 45 3B 88", 3, 7),
        CodeSignature::new("4C 8B 44 24 60 8B 44 24 78 ? ? ? 48 8D", 15, 19),
        CodeSignature::new("8B 44 24 04 56 8B F1 85 C0 74 17 8B 40 08", 16, 20),
        CodeSignature::new("8B 15 ? ? ? ? 8B 04 82 85", 2, 6),
        CodeSignature::new("56 48 83 ? ? 48 89 ? ? ? 48 89 ? 48 8D", 16, 20),
    ];

    let gworld = vec![CodeSignature::new(
        "48 8B 1D ? ? ? ? 48 85 DB 74 33 41 B0 01",
        3,
        7,
    )];

    SignatureSet {
        entries: vec![
            SignatureEntry {
                name: "NamePool".to_string(),
                signatures: name_pool,
            },
            SignatureEntry {
                name: "GUObjectArray".to_string(),
                signatures: object_array,
            },
            SignatureEntry {
                name: "GWorld".to_string(),
                signatures: gworld,
            },
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pattern_with_wildcards() {
        // The first curated NamePool signature.
        let masked = parse_pattern("4C 8D 05 ? ? ? ? EB 16 48 8D 0D ? ? ? ? E8").unwrap();
        assert_eq!(masked.len(), 17);
        assert_eq!(masked[0], Some(0x4C));
        assert_eq!(masked[3], None);
        assert_eq!(masked[6], None);
        assert_eq!(masked[7], Some(0xEB));
        assert_eq!(masked[16], Some(0xE8));
    }

    #[test]
    fn test_single_question_mark_wildcard() {
        let masked = parse_pattern("8B 15 ? ? ? ? 8B 04 82 85").unwrap();
        assert_eq!(masked.len(), 10);
        assert_eq!(masked[2], None);
        assert_eq!(masked[9], Some(0x85));
    }

    #[test]
    fn test_format_pattern_roundtrip() {
        // Every curated pattern must survive format → parse unchanged.
        // (`?` renders as `??`, so compare the decoded forms.)
        for entry in &builtin_signatures().entries {
            for sig in &entry.signatures {
                let masked = sig.pattern_bytes().unwrap();
                let rendered = format_pattern(&masked);
                assert_eq!(
                    parse_pattern(&rendered).unwrap(),
                    masked,
                    "pattern drifted for {}: {rendered}",
                    entry.name
                );
            }
        }
    }

    #[test]
    fn test_invalid_token_is_rejected() {
        assert!(parse_pattern("ZZ 01").is_err());
        assert!(parse_pattern("").is_err());
    }

    #[test]
    fn test_builtin_set_covers_all_targets() {
        let set = builtin_signatures();
        for target in ["NamePool", "GUObjectArray", "GWorld"] {
            let entry = set.entry(target).unwrap();
            assert!(!entry.signatures.is_empty());
            for sig in &entry.signatures {
                let bytes = sig.pattern_bytes().unwrap();
                assert!(sig.disp_offset + 4 <= sig.instr_len || sig.disp_offset < bytes.len());
            }
        }
    }

    #[test]
    fn test_signature_set_json_roundtrip() {
        let set = builtin_signatures();
        let json = serde_json::to_string(&set).unwrap();
        let back: SignatureSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back.entries.len(), set.entries.len());
        assert!(back.entry("namepool").is_some()); // case-insensitive
    }
}
