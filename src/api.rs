use crate::atom::FourCC;
use crate::codec::Record;
use crate::error::{Error, Result};
use crate::known_atoms::{AtomKind, MOOV};
use crate::reader::{AtomReader, Children};
use crate::registry::Movie;
use crate::repair::{repair, RepairOptions, RepairSummary};
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Seek, Write};
use std::path::{Path, PathBuf};

/// A JSON-serializable listing entry for one atom.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AtomSummary {
    /// Absolute offset of the atom header
    pub offset: u64,
    /// Total size including the header. Atoms extending to the end of their
    /// container report the size they actually occupy.
    pub size: u64,
    pub header_size: u64,
    #[serde(rename = "type")]
    pub typ: FourCC,
    /// Human-readable atom name (e.g. "Movie Atom")
    pub full_name: &'static str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<AtomSummary>,
}

/// Lists the atoms of a stream, descending `depth` levels into container
/// atoms. Depth 0 lists the top level only.
///
/// # Example
/// ```no_run
/// use movrepair::list_atoms;
/// use std::fs::File;
///
/// let file = File::open("clip.mov")?;
/// for atom in list_atoms(file, 1)? {
///     println!("{} {}", atom.typ, atom.size);
/// }
/// # Ok::<(), movrepair::Error>(())
/// ```
pub fn list_atoms<R: Read + Seek>(r: R, depth: usize) -> Result<Vec<AtomSummary>> {
    let mut reader = AtomReader::new(r)?;
    summarize(&mut reader.children(), depth)
}

fn summarize<R: Read + Seek>(children: &mut Children<'_, R>, depth: usize) -> Result<Vec<AtomSummary>> {
    let mut out = Vec::new();
    while let Some(mut atom) = children.next_atom()? {
        let header = *atom.header();
        let kind = AtomKind::from(header.typ);
        let nested = if depth > 0 && kind.is_container() {
            summarize(&mut atom.children(), depth - 1)?
        } else {
            Vec::new()
        };
        out.push(AtomSummary {
            offset: header.start,
            size: header.header_len + atom.payload_len(),
            header_size: header.header_len,
            typ: header.typ,
            full_name: kind.full_name(),
            children: nested,
        });
    }
    Ok(out)
}

/// Decodes the first top-level `moov` atom of a stream.
pub fn read_movie<R: Read + Seek>(r: R) -> Result<Movie> {
    let mut reader = AtomReader::new(r)?;
    let mut children = reader.children();
    let mut moov = children
        .find(MOOV)?
        .ok_or_else(|| Error::MissingAtom { path: MOOV.to_string() })?;
    Movie::unpack(&moov.read_payload()?)
}

/// `clip.mov` becomes `clip-fixed.mov`, next to the input.
pub fn default_output_path(broken: &Path) -> PathBuf {
    let mut name = broken.file_stem().unwrap_or_default().to_os_string();
    name.push("-fixed");
    if let Some(ext) = broken.extension() {
        name.push(".");
        name.push(ext);
    }
    broken.with_file_name(name)
}

/// Opens both inputs and runs [`repair`]. The output file is only created
/// once the first repaired byte is ready, so inputs rejected up front (no
/// `mdat`, no `moov`, a missing sample table atom) leave nothing behind.
pub fn repair_paths(reference: &Path, broken: &Path, output: &Path, opts: &RepairOptions) -> Result<RepairSummary> {
    let reference = BufReader::new(File::open(reference)?);
    let broken = BufReader::new(File::open(broken)?);
    let mut output = DeferredFile { path: output.to_path_buf(), file: None };
    repair(reference, broken, &mut output, opts)
}

// Output file created (or truncated) on first write.
struct DeferredFile {
    path: PathBuf,
    file: Option<BufWriter<File>>,
}

impl Write for DeferredFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let file = match self.file.take() {
            Some(file) => file,
            None => BufWriter::new(File::create(&self.path)?),
        };
        self.file.insert(file).write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.file {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}
