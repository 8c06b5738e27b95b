use movrepair::{AtomWriter, Error, FormatError, FourCC};

const MOOV: FourCC = FourCC(*b"moov");
const MVHD: FourCC = FourCC(*b"mvhd");

#[test]
fn scoped_writer_emits_header_and_payload() {
    let mut out = Vec::new();
    AtomWriter::scoped(&mut out, 12, FourCC(*b"free"), |w| w.write_bytes(&[1, 2, 3, 4])).unwrap();
    assert_eq!(out, vec![0, 0, 0, 12, b'f', b'r', b'e', b'e', 1, 2, 3, 4]);
}

#[test]
fn under_write_fails_on_finish() {
    let mut out = Vec::new();
    let mut w = AtomWriter::begin(&mut out, 16, MVHD).unwrap();
    w.write_bytes(&[0; 4]).unwrap();
    assert_eq!(w.written(), 12);
    let err = w.finish().unwrap_err();
    assert!(matches!(err, Error::Format(FormatError::SizeMismatch { size: 16, written: 12, .. })));
}

#[test]
fn over_write_is_rejected() {
    let mut out = Vec::new();
    let err = AtomWriter::scoped(&mut out, 10, MVHD, |w| w.write_bytes(&[0; 3])).unwrap_err();
    assert!(matches!(err, Error::Format(FormatError::WriteExcess { size: 10, attempted: 11, .. })));
}

#[test]
fn size_below_header_is_rejected() {
    let mut out = Vec::new();
    let err = AtomWriter::begin(&mut out, 7, MVHD).err().expect("expected error");
    assert!(matches!(err, Error::Format(FormatError::InvalidSize { size: 7, .. })));
    assert!(out.is_empty());
}

#[test]
fn body_error_skips_size_check() {
    let mut out = Vec::new();
    let err = AtomWriter::scoped(&mut out, 100, MVHD, |_| Err(Error::EmptyMediaData)).unwrap_err();
    assert!(matches!(err, Error::EmptyMediaData));
}

#[test]
fn nested_atoms_write_through_parent() {
    let mut out = Vec::new();
    AtomWriter::scoped(&mut out, 20, MOOV, |moov| {
        AtomWriter::scoped(moov, 12, MVHD, |mvhd| mvhd.write_bytes(&[7; 4]))
    })
    .unwrap();

    let mut expected = vec![0, 0, 0, 20];
    expected.extend_from_slice(b"moov");
    expected.extend_from_slice(&[0, 0, 0, 12]);
    expected.extend_from_slice(b"mvhd");
    expected.extend_from_slice(&[7; 4]);
    assert_eq!(out, expected);
}

#[test]
fn nested_overflow_reports_parent() {
    let mut out = Vec::new();
    let err = AtomWriter::scoped(&mut out, 16, MOOV, |moov| {
        AtomWriter::scoped(moov, 12, MVHD, |mvhd| mvhd.write_bytes(&[7; 4]))
    })
    .unwrap_err();
    match err {
        Error::Format(FormatError::WriteExcess { tag, size, attempted }) => {
            assert_eq!(tag, MOOV);
            assert_eq!(size, 16);
            assert_eq!(attempted, 20);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn large_sizes_use_extended_header() {
    let size = u32::MAX as u64 + 100;
    let mut out = Vec::new();
    let w = AtomWriter::begin(&mut out, size, FourCC(*b"mdat")).unwrap();
    assert_eq!(w.written(), 16);
    drop(w);

    let mut expected = vec![0, 0, 0, 1];
    expected.extend_from_slice(b"mdat");
    expected.extend_from_slice(&size.to_be_bytes());
    assert_eq!(out, expected);
}
