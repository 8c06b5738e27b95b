//! Declarative encoding of the binary records stored inside structural atoms.
//!
//! A record type describes its layout through the sequence of calls its
//! [`Record::decode`] and [`Record::encode`] make, one call per field in
//! declaration order:
//!
//! - fixed-width fields ([`Fixed`]) and padding,
//! - lists repeated a literal number of times or by a sibling's value,
//! - byte strings whose length is literal, taken from a sibling, or "the rest
//!   of the enclosing atom" ([`Decoder::rest`]),
//! - nested records.
//!
//! Count and size fields are never stored in the record. Decoding reads them
//! into locals that later fields consult; encoding recomputes them from the
//! current content, so they cannot drift from what is actually written.

use crate::atom::{atom_size_for, FourCC};
use crate::error::{Error, Result};
use crate::util::read_full;
use crate::writer::AtomWriter;
use byteorder::{BigEndian, ByteOrder, WriteBytesExt};
use std::io::{self, Cursor, Read, Write};

/// A value with a fixed big-endian wire width.
pub trait Fixed: Sized {
    const SIZE: usize;
    /// `buf` holds at least `SIZE` bytes.
    fn read_fixed(buf: &[u8]) -> Self;
    fn write_fixed(&self, w: &mut dyn Write) -> io::Result<()>;
}

macro_rules! fixed_int {
    ($($t:ty => $read:ident, $write:ident;)*) => {$(
        impl Fixed for $t {
            const SIZE: usize = std::mem::size_of::<$t>();
            fn read_fixed(buf: &[u8]) -> Self { BigEndian::$read(buf) }
            fn write_fixed(&self, w: &mut dyn Write) -> io::Result<()> { w.$write::<BigEndian>(*self) }
        }
    )*};
}

fixed_int! {
    u16 => read_u16, write_u16;
    u32 => read_u32, write_u32;
    u64 => read_u64, write_u64;
    i16 => read_i16, write_i16;
    i32 => read_i32, write_i32;
    i64 => read_i64, write_i64;
}

impl Fixed for u8 {
    const SIZE: usize = 1;
    fn read_fixed(buf: &[u8]) -> Self { buf[0] }
    fn write_fixed(&self, w: &mut dyn Write) -> io::Result<()> { w.write_u8(*self) }
}

impl Fixed for FourCC {
    const SIZE: usize = 4;
    fn read_fixed(buf: &[u8]) -> Self { FourCC([buf[0], buf[1], buf[2], buf[3]]) }
    fn write_fixed(&self, w: &mut dyn Write) -> io::Result<()> { w.write_all(&self.0) }
}

impl<T: Fixed, const N: usize> Fixed for [T; N] {
    const SIZE: usize = T::SIZE * N;
    fn read_fixed(buf: &[u8]) -> Self {
        std::array::from_fn(|i| T::read_fixed(&buf[i * T::SIZE..]))
    }
    fn write_fixed(&self, w: &mut dyn Write) -> io::Result<()> {
        self.iter().try_for_each(|v| v.write_fixed(w))
    }
}

/// The 24-bit flags word that follows the version byte of most atoms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub struct Flags(pub u32);

impl Fixed for Flags {
    const SIZE: usize = 3;
    fn read_fixed(buf: &[u8]) -> Self { Flags(BigEndian::read_u24(buf)) }
    fn write_fixed(&self, w: &mut dyn Write) -> io::Result<()> {
        w.write_u24::<BigEndian>(self.0 & 0x00ff_ffff)
    }
}

/// A fixed- or variable-length binary record.
pub trait Record: Sized {
    /// Used to label decode/encode errors.
    const NAME: &'static str;

    fn decode(dec: &mut Decoder<'_>) -> Result<Self>;
    fn encode(&self, enc: &mut Encoder<'_>) -> Result<()>;

    /// Decodes a complete atom payload. The payload length is the record's
    /// declared length; bytes left over after the last field are an error.
    fn unpack(data: &[u8]) -> Result<Self> {
        let mut src = Cursor::new(data);
        let mut dec = Decoder::new(&mut src, Self::NAME, data.len() as u64);
        let value = Self::decode(&mut dec)?;
        dec.finish()?;
        Ok(value)
    }

    fn pack(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.encode(&mut Encoder::new(&mut out, Self::NAME))?;
        Ok(out)
    }
}

/// Decode cursor for one record.
///
/// `remaining` is the number of bytes left in the enclosing atom as declared
/// by its header. It is threaded into nested records so fields like a
/// handler's name can size themselves from it.
pub struct Decoder<'a> {
    src: &'a mut dyn Read,
    record: &'static str,
    remaining: u64,
}

impl<'a> Decoder<'a> {
    pub fn new(src: &'a mut dyn Read, record: &'static str, declared_len: u64) -> Self {
        Self { src, record, remaining: declared_len }
    }

    pub fn record(&self) -> &'static str { self.record }
    pub fn remaining(&self) -> u64 { self.remaining }

    pub fn field<T: Fixed>(&mut self, name: &'static str) -> Result<T> {
        let buf = self.take(name, T::SIZE as u64)?;
        Ok(T::read_fixed(&buf))
    }

    /// A time or duration that is 64 bits wide in version 1 records and 32
    /// bits otherwise.
    pub fn versioned(&mut self, name: &'static str, version: u8) -> Result<u64> {
        if version == 1 {
            self.field::<u64>(name)
        } else {
            Ok(self.field::<u32>(name)? as u64)
        }
    }

    pub fn skip(&mut self, name: &'static str, len: u64) -> Result<()> {
        self.take(name, len).map(drop)
    }

    pub fn list<T: Fixed>(&mut self, name: &'static str, count: u64) -> Result<Vec<T>> {
        let buf = self.take(name, count.saturating_mul(T::SIZE as u64))?;
        Ok(buf.chunks_exact(T::SIZE).map(T::read_fixed).collect())
    }

    pub fn bytes(&mut self, name: &'static str, len: u64) -> Result<Vec<u8>> {
        self.take(name, len)
    }

    /// Everything left in the enclosing atom.
    pub fn rest(&mut self, name: &'static str) -> Result<Vec<u8>> {
        let len = self.remaining;
        self.take(name, len)
    }

    /// Decodes a nested record with its own field context.
    pub fn nested<T: Record>(&mut self) -> Result<T> {
        let mut child = Decoder { src: &mut *self.src, record: T::NAME, remaining: self.remaining };
        let value = T::decode(&mut child)?;
        self.remaining = child.remaining;
        Ok(value)
    }

    pub fn nested_list<T: Record>(&mut self, count: u64) -> Result<Vec<T>> {
        let mut items = Vec::with_capacity(count.min(self.remaining) as usize);
        for _ in 0..count {
            items.push(self.nested()?);
        }
        Ok(items)
    }

    pub fn finish(self) -> Result<()> {
        if self.remaining != 0 {
            return Err(Error::TrailingBytes { record: self.record, count: self.remaining });
        }
        Ok(())
    }

    fn take(&mut self, field: &'static str, len: u64) -> Result<Vec<u8>> {
        if len > self.remaining {
            return Err(Error::Decode { record: self.record, field, expected: len, got: self.remaining });
        }
        let mut buf = vec![0u8; len as usize];
        let got = read_full(self.src, &mut buf)? as u64;
        if got != len {
            return Err(Error::Decode { record: self.record, field, expected: len, got });
        }
        self.remaining -= len;
        Ok(buf)
    }
}

/// Encode sink for one record.
pub struct Encoder<'a> {
    dst: &'a mut dyn Write,
    record: &'static str,
}

impl<'a> Encoder<'a> {
    pub fn new(dst: &'a mut dyn Write, record: &'static str) -> Self {
        Self { dst, record }
    }

    pub fn record(&self) -> &'static str { self.record }

    pub fn field<T: Fixed>(&mut self, value: &T) -> Result<()> {
        value.write_fixed(self.dst)?;
        Ok(())
    }

    /// Counterpart of [`Decoder::versioned`]; values too wide for a version 0
    /// field are rejected rather than truncated.
    pub fn versioned(&mut self, name: &'static str, version: u8, value: u64) -> Result<()> {
        if version == 1 {
            return self.field(&value);
        }
        let narrow = u32::try_from(value).map_err(|_| self.overflow(name, value))?;
        self.field(&narrow)
    }

    /// Writes a derived 32-bit count or size.
    pub fn computed(&mut self, name: &'static str, value: u64) -> Result<()> {
        let narrow = u32::try_from(value).map_err(|_| self.overflow(name, value))?;
        self.field(&narrow)
    }

    pub fn zeros(&mut self, len: usize) -> Result<()> {
        self.dst.write_all(&vec![0u8; len])?;
        Ok(())
    }

    pub fn list<T: Fixed>(&mut self, items: &[T]) -> Result<()> {
        for item in items {
            item.write_fixed(self.dst)?;
        }
        Ok(())
    }

    pub fn bytes(&mut self, data: &[u8]) -> Result<()> {
        self.dst.write_all(data)?;
        Ok(())
    }

    pub fn nested<T: Record>(&mut self, value: &T) -> Result<()> {
        value.encode(&mut Encoder { dst: &mut *self.dst, record: T::NAME })
    }

    pub fn nested_list<T: Record>(&mut self, values: &[T]) -> Result<()> {
        values.iter().try_for_each(|v| self.nested(v))
    }

    /// Writes `payload` as a complete tagged atom.
    pub fn atom(&mut self, tag: FourCC, payload: &[u8]) -> Result<()> {
        let size = atom_size_for(payload.len() as u64);
        AtomWriter::scoped(&mut *self.dst, size, tag, |w| w.write_bytes(payload))
    }

    fn overflow(&self, field: &'static str, value: u64) -> Error {
        Error::Encode { record: self.record, field, reason: format!("{value} does not fit in 32 bits") }
    }
}
