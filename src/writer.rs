use crate::atom::{FourCC, EXTENDED_HEADER_LEN, HEADER_LEN};
use crate::error::{Error, FormatError, Result};
use byteorder::{BigEndian, WriteBytesExt};
use std::io::{self, Write};

/// Write side of one atom: emits the header up front and then refuses to
/// write more than the declared size. [`AtomWriter::finish`] verifies that
/// exactly the declared number of bytes went out.
pub struct AtomWriter<'w> {
    out: &'w mut dyn Write,
    tag: FourCC,
    size: u64,
    written: u64,
}

impl<'w> AtomWriter<'w> {
    /// Writes the header for an atom of `size` total bytes. Sizes that do not
    /// fit 32 bits use the extended header form.
    pub fn begin(out: &'w mut dyn Write, size: u64, tag: FourCC) -> Result<Self> {
        let header_len = if size > u32::MAX as u64 { EXTENDED_HEADER_LEN } else { HEADER_LEN };
        if size < header_len {
            return Err(FormatError::InvalidSize { tag, size }.into());
        }
        if header_len == EXTENDED_HEADER_LEN {
            out.write_u32::<BigEndian>(1)?;
            out.write_all(&tag.0)?;
            out.write_u64::<BigEndian>(size)?;
        } else {
            out.write_u32::<BigEndian>(size as u32)?;
            out.write_all(&tag.0)?;
        }
        Ok(Self { out, tag, size, written: header_len })
    }

    /// Runs `body` against a fresh writer and finalizes it when `body`
    /// succeeds. On error the writer is abandoned without the size check.
    pub fn scoped<F>(out: &'w mut dyn Write, size: u64, tag: FourCC, body: F) -> Result<()>
    where
        F: FnOnce(&mut AtomWriter<'w>) -> Result<()>,
    {
        let mut writer = Self::begin(out, size, tag)?;
        body(&mut writer)?;
        writer.finish()
    }

    pub fn tag(&self) -> FourCC { self.tag }
    pub fn size(&self) -> u64 { self.size }
    pub fn written(&self) -> u64 { self.written }

    pub fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        let attempted = self.written + data.len() as u64;
        if attempted > self.size {
            return Err(FormatError::WriteExcess { tag: self.tag, size: self.size, attempted }.into());
        }
        self.out.write_all(data)?;
        self.written = attempted;
        Ok(())
    }

    pub fn finish(self) -> Result<()> {
        if self.written != self.size {
            return Err(FormatError::SizeMismatch { tag: self.tag, size: self.size, written: self.written }.into());
        }
        Ok(())
    }
}

// Lets nested atoms be written straight into their parent.
impl Write for AtomWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_bytes(buf).map_err(|e| match e {
            Error::Io(e) => e,
            other => io::Error::other(other),
        })?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}
