use crate::atom::{AtomHeader, FourCC, EXTENDED_HEADER_LEN, HEADER_LEN};
use crate::error::{FormatError, Result};
use crate::util::{read_full, stream_len};
use byteorder::{BigEndian, ByteOrder};
use std::io::{Read, Seek, SeekFrom};
use tracing::warn;

/// Reads one atom header at the current stream position.
pub fn read_atom_header<R: Read + Seek + ?Sized>(r: &mut R) -> Result<AtomHeader> {
    let header = scan_header(r)?;
    if !header.has_valid_size() {
        return Err(FormatError::InvalidSize { tag: header.typ, size: header.size }.into());
    }
    Ok(header)
}

// Header fields as stored, without checking the size against the header
// length.
fn scan_header<R: Read + Seek + ?Sized>(r: &mut R) -> Result<AtomHeader> {
    let start = r.stream_position()?;
    let mut head = [0u8; 8];
    if read_full(r, &mut head)? != head.len() {
        return Err(FormatError::TruncatedHeader { offset: start }.into());
    }
    let size32 = BigEndian::read_u32(&head[..4]);
    let typ = FourCC([head[4], head[5], head[6], head[7]]);

    let (size, header_len) = if size32 == 1 {
        let mut large = [0u8; 8];
        if read_full(r, &mut large)? != large.len() {
            return Err(FormatError::TruncatedHeader { offset: start }.into());
        }
        (BigEndian::read_u64(&large), EXTENDED_HEADER_LEN)
    } else {
        (size32 as u64, HEADER_LEN)
    };

    Ok(AtomHeader { size, typ, header_len, start })
}

/// Sequential cursor over a stream of atoms.
///
/// The root extends from the position the stream had when the reader was
/// opened to the end of the stream (probed once by seeking).
pub struct AtomReader<R> {
    inner: R,
    start: u64,
    end: u64,
}

impl<R: Read + Seek> AtomReader<R> {
    pub fn new(mut inner: R) -> Result<Self> {
        let start = inner.stream_position()?;
        let end = stream_len(&mut inner)?;
        Ok(Self { inner, start, end })
    }

    pub fn len(&self) -> u64 { self.end - self.start }
    pub fn is_empty(&self) -> bool { self.end == self.start }

    /// Absolute end offset of the underlying stream.
    pub fn end(&self) -> u64 { self.end }

    /// Top-level atoms. The root is lenient: a last atom declaring more bytes
    /// than the stream holds is still yielded (with a warning) so damaged
    /// recordings can be inspected.
    pub fn children(&mut self) -> Children<'_, R> {
        Children { inner: &mut self.inner, parent: None, next: self.start, end: self.end }
    }

    /// Atoms of a stream that is itself the payload of `parent`. Children must
    /// fill the stream exactly.
    pub fn children_of(&mut self, parent: FourCC) -> Children<'_, R> {
        Children { inner: &mut self.inner, parent: Some(parent), next: self.start, end: self.end }
    }

    pub fn into_inner(self) -> R { self.inner }
}

/// Iteration over the atoms of one container (or of the root).
///
/// Each call to [`Children::next_atom`] skips whatever the previous atom left
/// unread, so callers never need to drain an atom they are not interested in.
pub struct Children<'r, R> {
    inner: &'r mut R,
    parent: Option<FourCC>,
    next: u64,
    end: u64,
}

impl<'r, R: Read + Seek> Children<'r, R> {
    /// Reads the next child header, or `None` once the running total of
    /// consumed bytes reaches the container's size.
    pub fn next_header(&mut self) -> Result<Option<AtomHeader>> {
        if self.next >= self.end {
            return Ok(None);
        }
        self.inner.seek(SeekFrom::Start(self.next))?;
        let header = match self.parent {
            Some(_) => read_atom_header(self.inner)?,
            None => scan_header(self.inner)?,
        };

        if header.payload_start() > self.end {
            return Err(match self.parent {
                Some(parent) => FormatError::ChildOverrun { parent, child: header.typ },
                None => FormatError::TruncatedHeader { offset: header.start },
            }
            .into());
        }

        self.next = match (self.parent, self.declared_end(&header)) {
            (_, Some(atom_end)) if atom_end <= self.end => atom_end,
            (Some(parent), _) => {
                return Err(FormatError::ChildOverrun { parent, child: header.typ }.into());
            }
            (None, Some(atom_end)) => {
                warn!(
                    tag = %header.typ,
                    declared = header.size,
                    available = self.end - header.start,
                    "top-level atom extends past end of stream"
                );
                atom_end
            }
            (None, None) => {
                warn!(
                    tag = %header.typ,
                    declared = header.size,
                    "top-level atom has an unusable size, assuming it runs to end of stream"
                );
                self.end
            }
        };
        Ok(Some(header))
    }

    // End offset the header claims, or `None` when its size is below the
    // header length or runs past `u64::MAX`.
    fn declared_end(&self, header: &AtomHeader) -> Option<u64> {
        match header.size {
            0 => Some(self.end),
            size if header.has_valid_size() => header.start.checked_add(size),
            _ => None,
        }
    }

    pub fn next_atom(&mut self) -> Result<Option<Atom<'_, R>>> {
        match self.next_header()? {
            Some(header) => Ok(Some(self.open(header))),
            None => Ok(None),
        }
    }

    /// Skips ahead to the first remaining child with the given tag.
    pub fn find(&mut self, tag: FourCC) -> Result<Option<Atom<'_, R>>> {
        while let Some(header) = self.next_header()? {
            if header.typ == tag {
                return Ok(Some(self.open(header)));
            }
        }
        Ok(None)
    }

    // Only valid directly after `next_header`, while the stream still sits at
    // the payload start.
    fn open(&mut self, header: AtomHeader) -> Atom<'_, R> {
        Atom { inner: &mut *self.inner, header, pos: header.payload_start(), end: self.next }
    }
}

/// A single atom whose header has been read. The payload is read or skipped
/// lazily.
pub struct Atom<'a, R> {
    inner: &'a mut R,
    header: AtomHeader,
    pos: u64,
    end: u64,
}

impl<'a, R: Read + Seek> Atom<'a, R> {
    pub fn header(&self) -> &AtomHeader { &self.header }
    pub fn tag(&self) -> FourCC { self.header.typ }

    pub fn payload_len(&self) -> u64 { self.end - self.header.payload_start() }
    pub fn remaining(&self) -> u64 { self.end - self.pos }

    /// Overrides the payload length derived from the declared size, for
    /// atoms whose size field cannot be trusted.
    pub fn set_payload_len(&mut self, len: u64) {
        self.end = self.header.payload_start() + len;
    }

    /// Reads the rest of the payload; fails if the stream ends first.
    pub fn read_payload(&mut self) -> Result<Vec<u8>> {
        self.read_data(None, false)
    }

    /// Reads up to `max` bytes (or all remaining bytes). With
    /// `allow_incomplete` a short read is returned instead of failing.
    pub fn read_data(&mut self, max: Option<u64>, allow_incomplete: bool) -> Result<Vec<u8>> {
        let mut want = self.remaining();
        if let Some(max) = max {
            want = want.min(max);
        }
        let mut buf = Vec::new();
        let got = (&mut *self.inner).take(want).read_to_end(&mut buf)? as u64;
        self.pos += got;
        if got != want && !allow_incomplete {
            return Err(FormatError::TruncatedPayload { tag: self.header.typ, expected: want, got }.into());
        }
        Ok(buf)
    }

    /// Fills as much of `buf` as the payload allows. Returns 0 once the
    /// payload is exhausted.
    pub fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize> {
        let remaining = self.remaining();
        let want = buf.len().min(remaining.min(usize::MAX as u64) as usize);
        if want == 0 {
            return Ok(0);
        }
        let got = read_full(self.inner, &mut buf[..want])?;
        self.pos += got as u64;
        if got < want {
            return Err(FormatError::TruncatedPayload {
                tag: self.header.typ,
                expected: remaining,
                got: got as u64,
            }
            .into());
        }
        Ok(got)
    }

    pub fn skip_remaining(&mut self) -> Result<()> {
        if self.pos < self.end {
            self.inner.seek(SeekFrom::Start(self.end))?;
            self.pos = self.end;
        }
        Ok(())
    }

    /// Treats the unread payload as a nested atom stream. The payload counts
    /// as consumed afterwards.
    pub fn children(&mut self) -> Children<'_, R> {
        let next = self.pos;
        self.pos = self.end;
        Children { inner: &mut *self.inner, parent: Some(self.header.typ), next, end: self.end }
    }
}
