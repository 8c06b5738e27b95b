use movrepair::known_atoms::{MOOV, STCO};
use movrepair::{AtomKind, FourCC};

#[test]
fn tags_map_to_kinds() {
    assert_eq!(AtomKind::from(FourCC(*b"moov")), AtomKind::Moov);
    assert_eq!(AtomKind::from(FourCC(*b"stsz")), AtomKind::Stsz);
    assert_eq!(AtomKind::from(FourCC(*b"abcd")), AtomKind::Unknown(FourCC(*b"abcd")));

    assert_eq!(AtomKind::Moov.tag(), MOOV);
    assert_eq!(AtomKind::Stco.tag(), STCO);
    assert_eq!(AtomKind::Unknown(FourCC(*b"abcd")).tag(), FourCC(*b"abcd"));
}

#[test]
fn full_names() {
    assert_eq!(AtomKind::Moov.full_name(), "Movie Atom");
    assert_eq!(AtomKind::Stts.full_name(), "Time-to-Sample Atom");
    assert_eq!(AtomKind::Unknown(FourCC(*b"abcd")).full_name(), "Unknown Atom");
}

#[test]
fn containers() {
    for kind in [AtomKind::Moov, AtomKind::Trak, AtomKind::Mdia, AtomKind::Minf, AtomKind::Stbl, AtomKind::Edts] {
        assert!(kind.is_container(), "{kind:?}");
    }
    for kind in [AtomKind::Mvhd, AtomKind::Stsd, AtomKind::Mdat, AtomKind::Unknown(FourCC(*b"abcd"))] {
        assert!(!kind.is_container(), "{kind:?}");
    }
}

#[test]
fn permitted_children() {
    assert!(AtomKind::Moov.permits(AtomKind::Trak));
    assert!(AtomKind::Moov.permits(AtomKind::Mvhd));
    assert!(!AtomKind::Moov.permits(AtomKind::Udta));
    assert!(AtomKind::Trak.permits(AtomKind::Edts));
    assert!(AtomKind::Minf.permits(AtomKind::Smhd));
    assert!(!AtomKind::Stbl.permits(AtomKind::Ctts));
    assert!(AtomKind::Stsd.permitted_children().is_empty());
}

#[test]
fn tags_from_text() {
    assert_eq!(FourCC::try_from("moov").unwrap(), MOOV);
    assert!(FourCC::try_from("moo").is_err());
    assert!(FourCC::try_from("moovx").is_err());
    assert_eq!(FourCC::from(*b"stco"), STCO);

    let odd = FourCC([b'a', 0, b' ', 0xff]);
    assert_eq!(odd.to_string(), "a. .");
    assert_eq!(format!("{odd:?}"), "\"a. .\"");
}
