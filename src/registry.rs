use crate::atom::FourCC;
use crate::codec::{Decoder, Encoder, Record};
use crate::error::{Error, Result};
use crate::known_atoms::AtomKind;
use crate::reader::AtomReader;
use crate::records::*;
use serde::Serialize;
use std::io::Cursor;
use tracing::warn;

/// An atom whose payload is carried as raw bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OpaqueAtom {
    pub tag: FourCC,
    #[serde(serialize_with = "crate::util::serialize_hex")]
    pub data: Vec<u8>,
}

/// A record that has a variant in [`KnownAtom`].
pub trait AtomRecord: Record + 'static {
    const KIND: AtomKind;

    fn from_known(atom: &KnownAtom) -> Option<&Self>;
    fn from_known_mut(atom: &mut KnownAtom) -> Option<&mut Self>;
}

macro_rules! known_atoms {
    ($($variant:ident($record:ident),)*) => {
        /// Every atom payload kind this crate decodes, plus raw bytes for
        /// everything else.
        #[derive(Debug, Clone, PartialEq, Serialize)]
        #[serde(rename_all = "lowercase")]
        pub enum KnownAtom {
            $($variant($record),)*
            Opaque(OpaqueAtom),
        }

        impl KnownAtom {
            /// Decodes `data` as the record registered for `tag`. Tags
            /// without a record are kept opaque.
            pub fn unpack(tag: FourCC, data: &[u8]) -> Result<Self> {
                match AtomKind::from(tag) {
                    $(AtomKind::$variant => $record::unpack(data).map(KnownAtom::$variant),)*
                    _ => Ok(KnownAtom::Opaque(OpaqueAtom { tag, data: data.to_vec() })),
                }
            }

            pub fn kind(&self) -> AtomKind {
                match self {
                    $(KnownAtom::$variant(_) => AtomKind::$variant,)*
                    KnownAtom::Opaque(o) => AtomKind::from(o.tag),
                }
            }

            pub fn pack(&self) -> Result<Vec<u8>> {
                match self {
                    $(KnownAtom::$variant(r) => r.pack(),)*
                    KnownAtom::Opaque(o) => Ok(o.data.clone()),
                }
            }
        }

        $(
            impl From<$record> for KnownAtom {
                fn from(r: $record) -> Self { KnownAtom::$variant(r) }
            }

            impl AtomRecord for $record {
                const KIND: AtomKind = AtomKind::$variant;

                fn from_known(atom: &KnownAtom) -> Option<&Self> {
                    match atom { KnownAtom::$variant(r) => Some(r), _ => None }
                }

                fn from_known_mut(atom: &mut KnownAtom) -> Option<&mut Self> {
                    match atom { KnownAtom::$variant(r) => Some(r), _ => None }
                }
            }
        )*
    };
}

known_atoms! {
    Moov(Movie),
    Mvhd(MovieHeader),
    Trak(Track),
    Tkhd(TrackHeader),
    Edts(Edits),
    Elst(EditList),
    Mdia(Media),
    Mdhd(MediaHeader),
    Hdlr(HandlerReference),
    Minf(MediaInformation),
    Vmhd(VideoMediaHeader),
    Smhd(SoundMediaHeader),
    Dinf(DataInformation),
    Dref(DataReferenceTable),
    Stbl(SampleTable),
    Stsd(SampleDescriptionTable),
    Stts(TimeToSample),
    Stss(SyncSample),
    Stsz(SampleSize),
    Stsc(SampleToChunk),
    Stco(ChunkOffset),
}

impl KnownAtom {
    pub fn tag(&self) -> FourCC {
        match self {
            KnownAtom::Opaque(o) => o.tag,
            other => other.kind().tag(),
        }
    }
}

/// Records whose payload is a sequence of child atoms.
pub trait Container {
    fn atoms(&self) -> &[KnownAtom];
    fn atoms_mut(&mut self) -> &mut Vec<KnownAtom>;

    fn first<T: AtomRecord>(&self) -> Option<&T> {
        self.atoms().iter().find_map(T::from_known)
    }

    fn first_mut<T: AtomRecord>(&mut self) -> Option<&mut T> {
        self.atoms_mut().iter_mut().find_map(T::from_known_mut)
    }

    fn all<T: AtomRecord>(&self) -> impl Iterator<Item = &T> {
        self.atoms().iter().filter_map(T::from_known)
    }

    fn all_mut<T: AtomRecord>(&mut self) -> impl Iterator<Item = &mut T> {
        self.atoms_mut().iter_mut().filter_map(T::from_known_mut)
    }

    /// Like [`Container::first`], but a missing child is an error naming
    /// `path`.
    fn require<T: AtomRecord>(&self, path: &str) -> Result<&T> {
        self.first().ok_or_else(|| Error::MissingAtom { path: path.to_string() })
    }

    fn require_mut<T: AtomRecord>(&mut self, path: &str) -> Result<&mut T> {
        self.first_mut().ok_or_else(|| Error::MissingAtom { path: path.to_string() })
    }
}

macro_rules! container_record {
    ($(#[$meta:meta])* $name:ident, $kind:ident, $tag:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Default, Serialize)]
        pub struct $name {
            pub atoms: Vec<KnownAtom>,
        }

        impl Record for $name {
            const NAME: &'static str = $tag;

            fn decode(dec: &mut Decoder<'_>) -> Result<Self> {
                Ok(Self { atoms: decode_sub_atoms(dec, AtomKind::$kind)? })
            }

            fn encode(&self, enc: &mut Encoder<'_>) -> Result<()> {
                encode_sub_atoms(enc, AtomKind::$kind, &self.atoms)
            }
        }

        impl Container for $name {
            fn atoms(&self) -> &[KnownAtom] { &self.atoms }
            fn atoms_mut(&mut self) -> &mut Vec<KnownAtom> { &mut self.atoms }
        }
    };
}

container_record!(
    /// Movie atom (`moov`): the movie header and its tracks.
    Movie, Moov, "moov"
);
container_record!(
    /// Track atom (`trak`).
    Track, Trak, "trak"
);
container_record!(Edits, Edts, "edts");
container_record!(Media, Mdia, "mdia");
container_record!(MediaInformation, Minf, "minf");
container_record!(DataInformation, Dinf, "dinf");
container_record!(
    /// Sample table atom (`stbl`): timing, sizes, chunking and offsets of
    /// every sample in the track.
    SampleTable, Stbl, "stbl"
);

impl Movie {
    pub fn header(&self) -> Option<&MovieHeader> { self.first() }
    pub fn tracks(&self) -> impl Iterator<Item = &Track> { self.all() }
    pub fn tracks_mut(&mut self) -> impl Iterator<Item = &mut Track> { self.all_mut() }
}

impl Track {
    pub fn header(&self) -> Option<&TrackHeader> { self.first() }
    pub fn media(&self) -> Option<&Media> { self.first() }

    pub fn sample_table(&self) -> Option<&SampleTable> {
        self.media()?.first::<MediaInformation>()?.first()
    }

    /// Data format of the track's first sample description.
    pub fn data_format(&self) -> Option<FourCC> {
        let stsd = self.sample_table()?.first::<SampleDescriptionTable>()?;
        stsd.descriptions.first().map(|d| d.data_format)
    }
}

impl Media {
    pub fn header(&self) -> Option<&MediaHeader> { self.first() }
    pub fn handler(&self) -> Option<&HandlerReference> { self.first() }
}

// The payload of a container atom, read as an atom stream. Children the
// container does not know are dropped.
fn decode_sub_atoms(dec: &mut Decoder<'_>, container: AtomKind) -> Result<Vec<KnownAtom>> {
    let payload = dec.rest("atoms")?;
    let mut reader = AtomReader::new(Cursor::new(payload))?;
    let mut children = reader.children_of(container.tag());
    let mut atoms = Vec::new();
    while let Some(mut atom) = children.next_atom()? {
        let tag = atom.tag();
        if !container.permits(AtomKind::from(tag)) {
            warn!(container = %container.tag(), %tag, "unsupported atom type, skipping");
            continue;
        }
        atoms.push(KnownAtom::unpack(tag, &atom.read_payload()?)?);
    }
    Ok(atoms)
}

// Opaque atoms are written back verbatim; typed atoms must be registered
// children of the container.
fn encode_sub_atoms(enc: &mut Encoder<'_>, container: AtomKind, atoms: &[KnownAtom]) -> Result<()> {
    for atom in atoms {
        if !matches!(atom, KnownAtom::Opaque(_)) && !container.permits(atom.kind()) {
            return Err(Error::Unregistered { container: container.tag(), tag: atom.tag() });
        }
        enc.atom(atom.tag(), &atom.pack()?)?;
    }
    Ok(())
}
