use crate::atom::FourCC;
use std::io;

/// Structural violations of the atom wire format.
#[derive(thiserror::Error, Debug)]
pub enum FormatError {
    #[error("reached end of stream while reading atom header at offset {offset}")]
    TruncatedHeader { offset: u64 },
    #[error("invalid size {size} for atom \"{tag}\"")]
    InvalidSize { tag: FourCC, size: u64 },
    #[error("reached end of stream while reading \"{tag}\" atom data (expected {expected} bytes, got {got})")]
    TruncatedPayload { tag: FourCC, expected: u64, got: u64 },
    #[error("sub-atom \"{child}\" exceeds parent atom size: \"{parent}\"")]
    ChildOverrun { parent: FourCC, child: FourCC },
    #[error("atom \"{tag}\" data excess (declared {size}, attempted {attempted})")]
    WriteExcess { tag: FourCC, size: u64, attempted: u64 },
    #[error("atom \"{tag}\" data size mismatch (got {written}, expected {size})")]
    SizeMismatch { tag: FourCC, size: u64, written: u64 },
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("io: {0}")]
    Io(io::Error),
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error("field {record}.{field}: expected {expected} bytes, got {got}")]
    Decode { record: &'static str, field: &'static str, expected: u64, got: u64 },
    #[error("{record}: {count} trailing bytes after last field")]
    TrailingBytes { record: &'static str, count: u64 },
    #[error("field {record}.{field}: {reason}")]
    Encode { record: &'static str, field: &'static str, reason: String },
    #[error("\"{tag}\" is not a registered child of \"{container}\"")]
    Unregistered { container: FourCC, tag: FourCC },
    #[error("atom \"{tag}\" is not a leaf")]
    NotLeaf { tag: FourCC },
    #[error("atom \"{tag}\" is already split")]
    AlreadySplit { tag: FourCC },
    #[error("could not find \"{path}\" atom")]
    MissingAtom { path: String },
    #[error("could not find mdat atom in broken input file")]
    NoMediaData,
    #[error("reference media data is empty, cannot derive a scale factor")]
    EmptyMediaData,
}

pub type Result<T> = std::result::Result<T, Error>;

// Atom writers surface their own errors through `io::Write`; unwrap those so
// callers see the underlying variant rather than an opaque io error.
impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        if !e.get_ref().is_some_and(|inner| inner.is::<Error>()) {
            return Error::Io(e);
        }
        let kind = e.kind();
        match e.into_inner().map(|inner| inner.downcast::<Error>()) {
            Some(Ok(err)) => *err,
            Some(Err(other)) => Error::Io(io::Error::new(kind, other)),
            None => Error::Io(kind.into()),
        }
    }
}
