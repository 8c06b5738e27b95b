use crate::atom::FourCC;

pub const MOOV: FourCC = FourCC(*b"moov");
pub const MDAT: FourCC = FourCC(*b"mdat");
pub const MVHD: FourCC = FourCC(*b"mvhd");
pub const TRAK: FourCC = FourCC(*b"trak");
pub const TKHD: FourCC = FourCC(*b"tkhd");
pub const EDTS: FourCC = FourCC(*b"edts");
pub const ELST: FourCC = FourCC(*b"elst");
pub const MDIA: FourCC = FourCC(*b"mdia");
pub const MDHD: FourCC = FourCC(*b"mdhd");
pub const MINF: FourCC = FourCC(*b"minf");
pub const STBL: FourCC = FourCC(*b"stbl");
pub const STSD: FourCC = FourCC(*b"stsd");
pub const STTS: FourCC = FourCC(*b"stts");
pub const STSZ: FourCC = FourCC(*b"stsz");
pub const STCO: FourCC = FourCC(*b"stco");

/// Sample description data format of time-code tracks.
pub const TIMECODE_FORMAT: FourCC = FourCC(*b"tmcd");

macro_rules! atom_kinds {
    ($($variant:ident => $tag:literal, $name:literal;)*) => {
        /// Classification of atom tags.
        ///
        /// Anything not in this list becomes `AtomKind::Unknown(fourcc)`.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum AtomKind {
            $($variant,)*
            Unknown(FourCC),
        }

        impl From<FourCC> for AtomKind {
            fn from(cc: FourCC) -> Self {
                match &cc.0 {
                    $($tag => AtomKind::$variant,)*
                    _ => AtomKind::Unknown(cc),
                }
            }
        }

        impl AtomKind {
            pub const fn tag(&self) -> FourCC {
                match self {
                    $(AtomKind::$variant => FourCC(*$tag),)*
                    AtomKind::Unknown(cc) => *cc,
                }
            }

            pub fn full_name(&self) -> &'static str {
                match self {
                    $(AtomKind::$variant => $name,)*
                    AtomKind::Unknown(_) => "Unknown Atom",
                }
            }
        }
    };
}

atom_kinds! {
    // top level
    Ftyp => b"ftyp", "File Type Atom";
    Moov => b"moov", "Movie Atom";
    Mdat => b"mdat", "Movie Data Atom";
    Free => b"free", "Free Space Atom";
    Skip => b"skip", "Skip Atom";
    Wide => b"wide", "Wide Atom";
    Pnot => b"pnot", "Preview Atom";
    Uuid => b"uuid", "UUID Atom";

    // moov / trak
    Mvhd => b"mvhd", "Movie Header Atom";
    Trak => b"trak", "Track Atom";
    Udta => b"udta", "User Data Atom";
    Tkhd => b"tkhd", "Track Header Atom";
    Tapt => b"tapt", "Track Aperture Mode Dimensions Atom";
    Tref => b"tref", "Track Reference Atom";
    Edts => b"edts", "Edit Atom";
    Elst => b"elst", "Edit List Atom";

    // mdia / minf
    Mdia => b"mdia", "Media Atom";
    Mdhd => b"mdhd", "Media Header Atom";
    Hdlr => b"hdlr", "Handler Reference Atom";
    Minf => b"minf", "Media Information Atom";
    Vmhd => b"vmhd", "Video Media Information Header Atom";
    Smhd => b"smhd", "Sound Media Information Header Atom";
    Gmhd => b"gmhd", "Base Media Information Header Atom";
    Dinf => b"dinf", "Data Information Atom";
    Dref => b"dref", "Data Reference Atom";

    // stbl
    Stbl => b"stbl", "Sample Table Atom";
    Stsd => b"stsd", "Sample Description Atom";
    Stts => b"stts", "Time-to-Sample Atom";
    Ctts => b"ctts", "Composition Offset Atom";
    Stss => b"stss", "Sync Sample Atom";
    Sdtp => b"sdtp", "Sample Dependency Flags Atom";
    Stsc => b"stsc", "Sample-to-Chunk Atom";
    Stsz => b"stsz", "Sample Size Atom";
    Stco => b"stco", "Chunk Offset Atom";
    Co64 => b"co64", "64-bit Chunk Offset Atom";
}

impl AtomKind {
    /// Does this atom hold child atoms rather than a record?
    pub fn is_container(&self) -> bool {
        matches!(
            self,
            AtomKind::Moov
                | AtomKind::Trak
                | AtomKind::Udta
                | AtomKind::Tapt
                | AtomKind::Tref
                | AtomKind::Edts
                | AtomKind::Mdia
                | AtomKind::Minf
                | AtomKind::Gmhd
                | AtomKind::Dinf
                | AtomKind::Stbl
        )
    }

    /// Child kinds decoded by this container's record. Other children are
    /// skipped on decode and rejected on encode.
    pub fn permitted_children(&self) -> &'static [AtomKind] {
        use AtomKind::*;
        match self {
            Moov => &[Mvhd, Trak],
            Trak => &[Tkhd, Edts, Mdia],
            Edts => &[Elst],
            Mdia => &[Mdhd, Hdlr, Minf],
            Minf => &[Vmhd, Smhd, Hdlr, Dinf, Stbl],
            Dinf => &[Dref],
            Stbl => &[Stsd, Stts, Stss, Stsz, Stsc, Stco],
            _ => &[],
        }
    }

    pub fn permits(&self, child: AtomKind) -> bool {
        self.permitted_children().contains(&child)
    }
}
