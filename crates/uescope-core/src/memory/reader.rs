use crate::error::{Error, Result};

/// Lowest address treated as a plausible user-space pointer.
pub const MIN_USER_ADDRESS: u64 = 0x10000;
/// Highest address treated as a plausible user-space pointer.
pub const MAX_USER_ADDRESS: u64 = 0x7FFF_FFFF_FFFF;

/// Typed bounded reads from a target process.
///
/// All reads are single-shot: a partial read is a failure. Implementations
/// never cache and never retry; retry policy belongs to the caller.
pub trait ReadMemory: Send + Sync {
    /// Read exactly `len` bytes at `address`.
    fn read_bytes(&self, address: u64, len: usize) -> Result<Vec<u8>>;

    /// Whether a single byte at `address` is readable.
    fn is_pointer(&self, address: u64) -> bool {
        (MIN_USER_ADDRESS..=MAX_USER_ADDRESS).contains(&address)
            && self.read_bytes(address, 1).is_ok()
    }

    fn read_u8(&self, address: u64) -> Result<u8> {
        Ok(self.read_bytes(address, 1)?[0])
    }

    fn read_u16(&self, address: u64) -> Result<u16> {
        let b = self.read_bytes(address, 2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn read_u32(&self, address: u64) -> Result<u32> {
        let b = self.read_bytes(address, 4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn read_u64(&self, address: u64) -> Result<u64> {
        let b = self.read_bytes(address, 8)?;
        Ok(u64::from_le_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    fn read_i32(&self, address: u64) -> Result<i32> {
        self.read_u32(address).map(|v| v as i32)
    }

    fn read_i64(&self, address: u64) -> Result<i64> {
        self.read_u64(address).map(|v| v as i64)
    }

    fn read_f32(&self, address: u64) -> Result<f32> {
        self.read_u32(address).map(f32::from_bits)
    }

    fn read_f64(&self, address: u64) -> Result<f64> {
        self.read_u64(address).map(f64::from_bits)
    }

    /// Read a 64-bit pointer slot.
    fn read_ptr(&self, address: u64) -> Result<u64> {
        self.read_u64(address)
    }

    /// Read a NUL-terminated UTF-8 string of at most `max_len` bytes.
    ///
    /// Trailing bytes past the terminator are discarded; a missing terminator
    /// truncates at `max_len`.
    fn read_cstring(&self, address: u64, max_len: usize) -> Result<String> {
        let bytes = self.read_bytes(address, max_len)?;
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        Ok(String::from_utf8_lossy(&bytes[..end]).into_owned())
    }

    /// Read `units` UTF-16 code units and decode them to UTF-8.
    fn read_utf16(&self, address: u64, units: usize) -> Result<String> {
        let bytes = self.read_bytes(address, units * 2)?;
        let wide: Vec<u16> = bytes
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .take_while(|&c| c != 0)
            .collect();
        Ok(String::from_utf16_lossy(&wide))
    }
}

/// Shared helper for OS backends: map a short read into a ReadFault.
pub(crate) fn short_read(address: u64, len: usize) -> Error {
    Error::read_fault(address, len, "memory")
}
