use std::array::TryFromSliceError;
use std::fmt;

/// Size of a plain atom header: 32-bit size + 4-byte tag.
pub const HEADER_LEN: u64 = 8;
/// Size of an extended header: 32-bit marker `1` + tag + 64-bit size.
pub const EXTENDED_HEADER_LEN: u64 = 16;

/// Four-character atom tag.
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct FourCC(pub [u8; 4]);

impl FourCC {
    /// The tag as text, with bytes outside printable ASCII shown as `.`.
    pub fn to_printable(&self) -> String {
        self.0
            .iter()
            .map(|&c| if c == b' ' || c.is_ascii_graphic() { c as char } else { '.' })
            .collect()
    }
}

impl From<[u8; 4]> for FourCC {
    fn from(tag: [u8; 4]) -> Self {
        Self(tag)
    }
}

impl TryFrom<&str> for FourCC {
    type Error = TryFromSliceError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        <[u8; 4]>::try_from(s.as_bytes()).map(Self)
    }
}

impl fmt::Display for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_printable())
    }
}

impl fmt::Debug for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.to_printable())
    }
}

impl serde::Serialize for FourCC {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtomHeader {
    pub size: u64,          // total size including header, as declared (0 = to parent end)
    pub typ: FourCC,
    pub header_len: u64,    // 8, or 16 for the extended form
    pub start: u64,         // stream offset of the header
}

impl AtomHeader {
    pub fn payload_start(&self) -> u64 { self.start + self.header_len }

    /// Declared payload length, or `None` when the size field is 0 (the
    /// atom runs to the end of its container) or smaller than the header.
    pub fn payload_len(&self) -> Option<u64> {
        if self.size == 0 { None } else { self.size.checked_sub(self.header_len) }
    }

    /// Size 0, or at least the header's own length.
    pub fn has_valid_size(&self) -> bool {
        self.size == 0 || self.size >= self.header_len
    }
}

/// Total atom size for a payload of `payload_len` bytes, choosing the
/// extended header only when the plain 32-bit field cannot hold it.
pub fn atom_size_for(payload_len: u64) -> u64 {
    if payload_len + HEADER_LEN > u32::MAX as u64 {
        payload_len + EXTENDED_HEADER_LEN
    } else {
        payload_len + HEADER_LEN
    }
}
