pub mod api;
pub mod atom;
pub mod codec;
pub mod error;
pub mod known_atoms;
pub mod reader;
pub mod records;
pub mod registry;
pub mod repair;
pub mod tree;
pub mod util;
pub mod writer;

pub use api::{AtomSummary, default_output_path, list_atoms, read_movie, repair_paths};
pub use atom::{AtomHeader, FourCC};
pub use codec::{Decoder, Encoder, Fixed, Flags, Record};
pub use error::{Error, FormatError, Result};
pub use known_atoms::AtomKind;
pub use reader::{Atom, AtomReader, Children, read_atom_header};
pub use registry::{AtomRecord, Container, KnownAtom, Movie, OpaqueAtom};
pub use repair::{RepairOptions, RepairSummary, RescaleReport, ScaleFactor, repair, rescale_movie};
pub use tree::{AtomNode, NodeContent};
pub use writer::AtomWriter;
