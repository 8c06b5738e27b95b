use crate::atom::{atom_size_for, FourCC};
use crate::codec::Record;
use crate::error::{Error, Result};
use crate::reader::{Atom, AtomReader};
use crate::writer::AtomWriter;
use std::io::{Cursor, Read, Seek, Write};

/// Content state of an [`AtomNode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeContent {
    /// Raw payload, not (yet) interpreted as child atoms.
    Opaque(Vec<u8>),
    /// Payload materialized into child atoms.
    Children(Vec<AtomNode>),
}

/// In-memory, editable atom. Sizes are never stored: they are recomputed from
/// the live content every time the node is measured or written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtomNode {
    tag: FourCC,
    content: NodeContent,
}

impl AtomNode {
    pub fn leaf(tag: FourCC, data: Vec<u8>) -> Self {
        Self { tag, content: NodeContent::Opaque(data) }
    }

    pub fn container(tag: FourCC, children: Vec<AtomNode>) -> Self {
        Self { tag, content: NodeContent::Children(children) }
    }

    /// Buffers the unread payload of `atom` as a leaf node.
    pub fn read<R: Read + Seek>(atom: &mut Atom<'_, R>) -> Result<Self> {
        Ok(Self::leaf(atom.tag(), atom.read_payload()?))
    }

    /// Parses a complete byte stream of atoms into leaf nodes.
    pub fn parse_all(data: &[u8]) -> Result<Vec<AtomNode>> {
        let mut reader = AtomReader::new(Cursor::new(data))?;
        let mut children = reader.children();
        let mut nodes = Vec::new();
        while let Some(mut atom) = children.next_atom()? {
            nodes.push(Self::read(&mut atom)?);
        }
        Ok(nodes)
    }

    pub fn tag(&self) -> FourCC { self.tag }
    pub fn content(&self) -> &NodeContent { &self.content }
    pub fn is_leaf(&self) -> bool { matches!(self.content, NodeContent::Opaque(_)) }

    pub fn data(&self) -> Option<&[u8]> {
        match &self.content {
            NodeContent::Opaque(data) => Some(data),
            NodeContent::Children(_) => None,
        }
    }

    pub fn children(&self) -> Option<&[AtomNode]> {
        match &self.content {
            NodeContent::Opaque(_) => None,
            NodeContent::Children(children) => Some(children),
        }
    }

    /// Mutable payload of a leaf node.
    pub fn edit(&mut self) -> Result<&mut Vec<u8>> {
        match &mut self.content {
            NodeContent::Opaque(data) => Ok(data),
            NodeContent::Children(_) => Err(Error::NotLeaf { tag: self.tag }),
        }
    }

    /// Interprets the leaf payload as child atoms.
    pub fn split(&mut self) -> Result<&mut Vec<AtomNode>> {
        let data = match &mut self.content {
            NodeContent::Opaque(data) => std::mem::take(data),
            NodeContent::Children(_) => return Err(Error::AlreadySplit { tag: self.tag }),
        };
        let children = match Self::parse_children(self.tag, &data) {
            Ok(children) => children,
            Err(e) => {
                self.content = NodeContent::Opaque(data);
                return Err(e);
            }
        };
        self.content = NodeContent::Children(children);
        match &mut self.content {
            NodeContent::Children(children) => Ok(children),
            NodeContent::Opaque(_) => Err(Error::NotLeaf { tag: self.tag }),
        }
    }

    fn parse_children(tag: FourCC, data: &[u8]) -> Result<Vec<AtomNode>> {
        let mut reader = AtomReader::new(Cursor::new(data))?;
        let mut children = reader.children_of(tag);
        let mut nodes = Vec::new();
        while let Some(mut atom) = children.next_atom()? {
            nodes.push(Self::read(&mut atom)?);
        }
        Ok(nodes)
    }

    /// Child nodes, splitting the node first if it is still opaque.
    pub fn children_mut(&mut self) -> Result<&mut Vec<AtomNode>> {
        if self.is_leaf() {
            return self.split();
        }
        match &mut self.content {
            NodeContent::Children(children) => Ok(children),
            NodeContent::Opaque(_) => Err(Error::NotLeaf { tag: self.tag }),
        }
    }

    /// Depth-first lookup by tag path. Every node walked through is split on
    /// the way; all matches at the final tag are returned in order.
    pub fn find_by_path(&mut self, path: &[FourCC]) -> Result<Vec<&mut AtomNode>> {
        let mut found = Vec::new();
        if !path.is_empty() {
            collect_path(self, path, &mut found)?;
        }
        Ok(found)
    }

    /// First match of [`AtomNode::find_by_path`], or a `MissingAtom` error.
    pub fn require(&mut self, path: &[FourCC]) -> Result<&mut AtomNode> {
        let display = format_path(self.tag, path);
        self.find_by_path(path)?
            .into_iter()
            .next()
            .ok_or(Error::MissingAtom { path: display })
    }

    pub fn calculate_size(&self) -> u64 {
        let payload = match &self.content {
            NodeContent::Opaque(data) => data.len() as u64,
            NodeContent::Children(children) => children.iter().map(AtomNode::calculate_size).sum(),
        };
        atom_size_for(payload)
    }

    pub fn write(&self, out: &mut dyn Write) -> Result<()> {
        AtomWriter::scoped(out, self.calculate_size(), self.tag, |w| match &self.content {
            NodeContent::Opaque(data) => w.write_bytes(data),
            NodeContent::Children(children) => {
                for child in children {
                    child.write(w)?;
                }
                Ok(())
            }
        })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(self.calculate_size() as usize);
        self.write(&mut out)?;
        Ok(out)
    }

    /// Decodes the leaf payload as record `T`. The payload length stands in
    /// for the atom's declared size.
    pub fn decode<T: Record>(&self) -> Result<T> {
        match &self.content {
            NodeContent::Opaque(data) => T::unpack(data),
            NodeContent::Children(_) => Err(Error::NotLeaf { tag: self.tag }),
        }
    }

    /// Replaces the leaf payload with the encoding of `record`.
    pub fn encode<T: Record>(&mut self, record: &T) -> Result<()> {
        let packed = record.pack()?;
        *self.edit()? = packed;
        Ok(())
    }
}

fn collect_path<'a>(node: &'a mut AtomNode, path: &[FourCC], found: &mut Vec<&'a mut AtomNode>) -> Result<()> {
    let Some((first, rest)) = path.split_first() else {
        return Ok(());
    };
    for child in node.children_mut()?.iter_mut() {
        if child.tag != *first {
            continue;
        }
        if rest.is_empty() {
            found.push(child);
        } else {
            collect_path(child, rest, found)?;
        }
    }
    Ok(())
}

fn format_path(root: FourCC, path: &[FourCC]) -> String {
    std::iter::once(root).chain(path.iter().copied())
        .map(|t| t.to_string())
        .collect::<Vec<_>>()
        .join(".")
}
