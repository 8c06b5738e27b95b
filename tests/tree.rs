use movrepair::atom::atom_size_for;
use movrepair::records::{TimeToSample, TimeToSampleEntry};
use movrepair::{AtomNode, Error, Flags, FormatError, FourCC};

fn cc(tag: &[u8; 4]) -> FourCC {
    FourCC(*tag)
}

fn sample_tree() -> AtomNode {
    AtomNode::container(cc(b"moov"), vec![
        AtomNode::leaf(cc(b"mvhd"), vec![1, 2, 3, 4]),
        AtomNode::container(cc(b"trak"), vec![AtomNode::leaf(cc(b"tkhd"), vec![5; 6])]),
        AtomNode::container(cc(b"trak"), vec![AtomNode::leaf(cc(b"tkhd"), vec![7; 2])]),
    ])
}

#[test]
fn sizes_are_derived_from_content() {
    let tree = sample_tree();
    assert_eq!(tree.calculate_size(), 8 + 12 + 22 + 18);

    let bytes = tree.to_bytes().unwrap();
    assert_eq!(bytes.len(), 60);
    assert_eq!(&bytes[..8], &[0, 0, 0, 60, b'm', b'o', b'o', b'v']);
    assert_eq!(&bytes[8..16], &[0, 0, 0, 12, b'm', b'v', b'h', b'd']);
}

#[test]
fn parse_split_and_rewrite_is_identical() {
    let bytes = sample_tree().to_bytes().unwrap();

    let mut nodes = AtomNode::parse_all(&bytes).unwrap();
    assert_eq!(nodes.len(), 1);
    let moov = &mut nodes[0];
    assert!(moov.is_leaf());
    assert_eq!(moov.data().map(<[u8]>::len), Some(52));

    let children = moov.split().unwrap();
    assert_eq!(children.len(), 3);
    assert!(children.iter().all(AtomNode::is_leaf));

    assert_eq!(moov.to_bytes().unwrap(), bytes);
}

#[test]
fn find_by_path_returns_every_match() {
    let bytes = sample_tree().to_bytes().unwrap();
    let mut moov = AtomNode::parse_all(&bytes).unwrap().remove(0);

    let found = moov.find_by_path(&[cc(b"trak"), cc(b"tkhd")]).unwrap();
    let payloads: Vec<Vec<u8>> = found.iter().map(|n| n.data().unwrap().to_vec()).collect();
    assert_eq!(payloads, vec![vec![5; 6], vec![7; 2]]);

    assert!(moov.find_by_path(&[cc(b"udta")]).unwrap().is_empty());
    assert!(moov.find_by_path(&[]).unwrap().is_empty());
}

#[test]
fn edits_propagate_to_parent_sizes() {
    let bytes = sample_tree().to_bytes().unwrap();
    let mut moov = AtomNode::parse_all(&bytes).unwrap().remove(0);

    {
        let mut found = moov.find_by_path(&[cc(b"trak"), cc(b"tkhd")]).unwrap();
        found[0].edit().unwrap().extend_from_slice(&[0; 4]);
    }

    let out = moov.to_bytes().unwrap();
    assert_eq!(out.len(), 64);
    assert_eq!(&out[..4], &64u32.to_be_bytes());
    // first trak follows the 12-byte mvhd
    assert_eq!(&out[20..28], &[0, 0, 0, 26, b't', b'r', b'a', b'k']);

    let mut reparsed = AtomNode::parse_all(&out).unwrap().remove(0);
    let tkhd = reparsed.require(&[cc(b"trak"), cc(b"tkhd")]).unwrap();
    assert_eq!(tkhd.data().unwrap().len(), 10);
}

#[test]
fn split_twice_fails() {
    let bytes = sample_tree().to_bytes().unwrap();
    let mut moov = AtomNode::parse_all(&bytes).unwrap().remove(0);
    moov.split().unwrap();
    assert!(matches!(moov.split(), Err(Error::AlreadySplit { .. })));
    // children_mut does not split again
    assert_eq!(moov.children_mut().unwrap().len(), 3);
}

#[test]
fn edit_requires_a_leaf() {
    let mut tree = sample_tree();
    assert!(matches!(tree.edit(), Err(Error::NotLeaf { .. })));
}

#[test]
fn failed_split_keeps_payload() {
    let payload = vec![0, 0, 0, 20, b'm', b'v', b'h', b'd', 0, 0];
    let mut node = AtomNode::leaf(cc(b"moov"), payload.clone());
    let err = node.split().unwrap_err();
    assert!(matches!(err, Error::Format(FormatError::ChildOverrun { .. })));
    assert!(node.is_leaf());
    assert_eq!(node.data(), Some(payload.as_slice()));
}

#[test]
fn require_names_the_missing_path() {
    let mut tree = sample_tree();
    match tree.require(&[cc(b"trak"), cc(b"stbl")]) {
        Err(Error::MissingAtom { path }) => assert_eq!(path, "moov.trak.stbl"),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn records_round_trip_through_leaves() {
    let table = TimeToSample {
        version: 0,
        flags: Flags(0),
        entries: vec![TimeToSampleEntry { sample_count: 30, sample_duration: 1001 }],
    };
    let mut node = AtomNode::leaf(cc(b"stts"), Vec::new());
    node.encode(&table).unwrap();
    assert_eq!(node.calculate_size(), 8 + 16);
    assert_eq!(node.decode::<TimeToSample>().unwrap(), table);

    let tree = sample_tree();
    assert!(matches!(tree.decode::<TimeToSample>(), Err(Error::NotLeaf { .. })));
}

#[test]
fn extended_header_only_past_32_bits() {
    assert_eq!(atom_size_for(10), 18);
    assert_eq!(atom_size_for(u32::MAX as u64 - 8), u32::MAX as u64);
    assert_eq!(atom_size_for(u32::MAX as u64 - 7), u32::MAX as u64 + 9);
}
