use movrepair::records::*;
use movrepair::registry::{Container, MediaInformation, SampleTable, Track};
use movrepair::{AtomKind, Error, Flags, FourCC, KnownAtom, OpaqueAtom, Record};

fn atom(tag: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut v = Vec::new();
    v.extend_from_slice(&(payload.len() as u32 + 8).to_be_bytes());
    v.extend_from_slice(tag);
    v.extend_from_slice(payload);
    v
}

fn stts() -> TimeToSample {
    TimeToSample {
        version: 0,
        flags: Flags(0),
        entries: vec![TimeToSampleEntry { sample_count: 10, sample_duration: 100 }],
    }
}

fn stco() -> ChunkOffset {
    ChunkOffset { version: 0, flags: Flags(0), offsets: vec![48, 148] }
}

#[test]
fn known_tags_decode_to_records() {
    let packed = stts().pack().unwrap();
    let decoded = KnownAtom::unpack(FourCC(*b"stts"), &packed).unwrap();
    assert_eq!(decoded, KnownAtom::Stts(stts()));
    assert_eq!(decoded.kind(), AtomKind::Stts);
    assert_eq!(decoded.tag(), FourCC(*b"stts"));
}

#[test]
fn unknown_tags_stay_opaque() {
    let decoded = KnownAtom::unpack(FourCC(*b"ftyp"), b"qt  ").unwrap();
    assert_eq!(decoded, KnownAtom::Opaque(OpaqueAtom { tag: FourCC(*b"ftyp"), data: b"qt  ".to_vec() }));
    assert_eq!(decoded.pack().unwrap(), b"qt  ".to_vec());
}

#[test]
fn unknown_child_is_dropped_without_aborting_siblings() {
    let mut payload = atom(b"stts", &stts().pack().unwrap());
    payload.extend(atom(b"zzzz", &[1, 2, 3]));
    payload.extend(atom(b"ctts", &[0; 8]));
    payload.extend(atom(b"stco", &stco().pack().unwrap()));

    let stbl = SampleTable::unpack(&payload).unwrap();
    let kinds: Vec<AtomKind> = stbl.atoms.iter().map(KnownAtom::kind).collect();
    assert_eq!(kinds, vec![AtomKind::Stts, AtomKind::Stco]);
    assert_eq!(stbl.first::<TimeToSample>(), Some(&stts()));
    assert_eq!(stbl.first::<ChunkOffset>(), Some(&stco()));
    assert!(stbl.first::<SampleSize>().is_none());
}

#[test]
fn container_round_trip() {
    let stbl = SampleTable { atoms: vec![stts().into(), stco().into()] };
    let minf = MediaInformation {
        atoms: vec![
            VideoMediaHeader { version: 0, flags: Flags(1), graphics_mode: 0x40, opcolor: [0x8000; 3] }.into(),
            stbl.clone().into(),
        ],
    };

    let packed = minf.pack().unwrap();
    // vmhd (8 + 12) then stbl (8 + stts 24 + stco 24)
    assert_eq!(packed.len(), 20 + 56);
    assert_eq!(&packed[20..28], &[0, 0, 0, 56, b's', b't', b'b', b'l']);

    let decoded = MediaInformation::unpack(&packed).unwrap();
    assert_eq!(decoded, minf);
    assert_eq!(decoded.first::<SampleTable>(), Some(&stbl));
}

#[test]
fn unregistered_child_is_an_encode_error() {
    let track = Track { atoms: vec![stts().into()] };
    match track.pack() {
        Err(Error::Unregistered { container, tag }) => {
            assert_eq!(container, FourCC(*b"trak"));
            assert_eq!(tag, FourCC(*b"stts"));
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn opaque_children_are_written_verbatim() {
    let track = Track {
        atoms: vec![KnownAtom::Opaque(OpaqueAtom { tag: FourCC(*b"udta"), data: vec![1, 2] })],
    };
    assert_eq!(track.pack().unwrap(), atom(b"udta", &[1, 2]));
}

#[test]
fn malformed_children_fail_decode() {
    let mut payload = atom(b"stts", &stts().pack().unwrap());
    payload.truncate(payload.len() - 1);
    assert!(matches!(SampleTable::unpack(&payload), Err(Error::Format(_))));
}

#[test]
fn mutable_access_through_containers() {
    let mut stbl = SampleTable { atoms: vec![stco().into()] };
    stbl.first_mut::<ChunkOffset>().unwrap().offsets.push(248);
    let offsets: Vec<u32> = stbl.all::<ChunkOffset>().flat_map(|t| t.offsets.clone()).collect();
    assert_eq!(offsets, vec![48, 148, 248]);

    match stbl.require::<SampleSize>("stbl.stsz") {
        Err(Error::MissingAtom { path }) => assert_eq!(path, "stbl.stsz"),
        other => panic!("unexpected result: {other:?}"),
    }
}
