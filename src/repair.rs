//! Rebuilds the metadata of a recording whose `moov` atom was lost, using a
//! complete recording made with the same settings as the template.
//!
//! The reference file's top-level atoms are copied to the output in order.
//! Its `mdat` is replaced by the broken file's media bytes and its `moov` is
//! rescaled by the ratio of the two media lengths.

use crate::atom::{atom_size_for, FourCC};
use crate::codec::Record;
use crate::error::{Error, Result};
use crate::known_atoms::{
    EDTS, ELST, MDAT, MDHD, MDIA, MINF, MOOV, MVHD, STBL, STCO, STSD, STSZ, STTS, TIMECODE_FORMAT, TKHD, TRAK,
};
use crate::reader::AtomReader;
use crate::records::{
    ChunkOffset, EditEntry, EditList, MediaHeader, MovieHeader, SampleDescriptionTable, SampleSize, SampleSizes,
    TimeToSample, TrackHeader,
};
use crate::tree::AtomNode;
use crate::util::format_size;
use crate::writer::AtomWriter;
use serde::Serialize;
use std::fmt;
use std::io::{Read, Seek, Write};
use tracing::{debug, info, warn};

pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepairOptions {
    /// Rescale durations and sample tables to the broken file's media
    /// length. When off, the reference metadata is copied unchanged.
    pub fix_metadata: bool,
    /// Size of the buffer media data is streamed through.
    pub chunk_size: usize,
}

impl Default for RepairOptions {
    fn default() -> Self {
        Self { fix_metadata: true, chunk_size: DEFAULT_CHUNK_SIZE }
    }
}

/// Exact ratio `num / den` of broken to reference media length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScaleFactor {
    num: u64,
    den: u64,
}

impl ScaleFactor {
    pub fn new(num: u64, den: u64) -> Result<Self> {
        if den == 0 {
            return Err(Error::EmptyMediaData);
        }
        Ok(Self { num, den })
    }

    pub fn num(&self) -> u64 { self.num }
    pub fn den(&self) -> u64 { self.den }

    /// `value * num / den`, rounded half up. Saturates at `u64::MAX`.
    pub fn apply(&self, value: u64) -> u64 {
        let den = self.den as u128;
        let scaled = (value as u128 * self.num as u128 + den / 2) / den;
        u64::try_from(scaled).unwrap_or(u64::MAX)
    }

    pub fn as_f64(&self) -> f64 {
        self.num as f64 / self.den as f64
    }
}

impl fmt::Display for ScaleFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}", self.as_f64())
    }
}

/// Successive differences of `values`.
pub fn deltas(values: &[i64]) -> Vec<i64> {
    values.windows(2).map(|w| w[1] - w[0]).collect()
}

/// Smallest `p >= 2` below half the sequence length such that the first `p`
/// deltas repeat immediately. Falls back to 1.
pub fn detect_period(deltas: &[i64]) -> usize {
    (2..deltas.len() / 2)
        .find(|&p| deltas[..p] == deltas[p..2 * p])
        .unwrap_or(1)
}

/// Resizes a table to `target_len` entries. Longer targets continue the
/// detected delta cycle from where the existing entries leave off; shorter
/// targets truncate.
pub fn extrapolate(values: &[i64], target_len: usize) -> Vec<i64> {
    let mut out = values.to_vec();
    if target_len <= values.len() {
        out.truncate(target_len);
        return out;
    }
    let Some(&last) = values.last() else {
        return out;
    };
    let deltas = deltas(values);
    if deltas.is_empty() {
        return out;
    }
    let period = detect_period(&deltas);
    let offset = deltas.len() % period;
    let mut prev = last;
    out.reserve(target_len - values.len());
    for i in 0..target_len - values.len() {
        prev = prev.saturating_add(deltas[(offset + i) % period]);
        out.push(prev);
    }
    out
}

/// What [`rescale_movie`] changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RescaleReport {
    /// Tags of the atoms rewritten, in the order they were updated.
    pub updated: Vec<FourCC>,
    pub removed_timecode_tracks: usize,
}

/// Rescales a `moov` atom in place: durations, edit lists and sample tables
/// are adjusted to `scale`, and time-code tracks are dropped.
pub fn rescale_movie(moov: &mut AtomNode, scale: ScaleFactor) -> Result<RescaleReport> {
    let mut report = RescaleReport::default();

    let mvhd = moov.require(&[MVHD])?;
    let mut header: MovieHeader = mvhd.decode()?;
    header.duration = rescale_duration(MVHD, header.duration, header.time_scale, scale);
    mvhd.encode(&header)?;
    report.updated.push(MVHD);

    report.removed_timecode_tracks = remove_timecode_tracks(moov)?;

    for trak in moov.find_by_path(&[TRAK])? {
        rescale_track(trak, scale, &header, &mut report)?;
    }

    let updated: Vec<String> = report.updated.iter().map(FourCC::to_string).collect();
    info!(atoms = %updated.join(", "), "updated moov atoms");
    Ok(report)
}

fn rescale_duration(tag: FourCC, old: u64, time_scale: u32, scale: ScaleFactor) -> u64 {
    let new = scale.apply(old);
    info!(atom = %tag, from = seconds(old, time_scale), to = seconds(new, time_scale), "adjusting duration (s)");
    new
}

fn seconds(ticks: u64, time_scale: u32) -> f64 {
    if time_scale == 0 { 0.0 } else { ticks as f64 / time_scale as f64 }
}

fn remove_timecode_tracks(moov: &mut AtomNode) -> Result<usize> {
    let children = moov.children_mut()?;
    let mut kept = Vec::with_capacity(children.len());
    let mut removed = 0;
    for mut node in std::mem::take(children) {
        if node.tag() == TRAK && is_timecode_track(&mut node)? {
            info!("removing tmcd track");
            removed += 1;
        } else {
            kept.push(node);
        }
    }
    *children = kept;
    Ok(removed)
}

fn is_timecode_track(trak: &mut AtomNode) -> Result<bool> {
    for stbl in trak.find_by_path(&[MDIA, MINF, STBL])? {
        let stsd: SampleDescriptionTable = stbl.require(&[STSD])?.decode()?;
        if stsd.descriptions.first().is_some_and(|d| d.data_format == TIMECODE_FORMAT) {
            return Ok(true);
        }
    }
    Ok(false)
}

fn rescale_track(trak: &mut AtomNode, scale: ScaleFactor, movie: &MovieHeader, report: &mut RescaleReport) -> Result<()> {
    for tkhd in trak.find_by_path(&[TKHD])? {
        let mut header: TrackHeader = tkhd.decode()?;
        header.duration = rescale_duration(TKHD, header.duration, movie.time_scale, scale);
        tkhd.encode(&header)?;
        report.updated.push(TKHD);
    }

    // Only the broken file knows its real edits; assume a single one.
    for elst in trak.find_by_path(&[EDTS, ELST])? {
        let mut list: EditList = elst.decode()?;
        let (media_time, media_rate) = list.entries.first().map_or((0, 0x0001_0000), |e| (e.media_time, e.media_rate));
        list.entries = vec![EditEntry { track_duration: movie.duration, media_time, media_rate }];
        elst.encode(&list)?;
        report.updated.push(ELST);
    }

    for mdhd in trak.find_by_path(&[MDIA, MDHD])? {
        let mut header: MediaHeader = mdhd.decode()?;
        header.duration = rescale_duration(MDHD, header.duration, header.time_scale, scale);
        mdhd.encode(&header)?;
        report.updated.push(MDHD);
    }

    for stbl in trak.find_by_path(&[MDIA, MINF, STBL])? {
        rescale_sample_table(stbl, scale, report)?;
    }
    Ok(())
}

fn rescale_sample_table(stbl: &mut AtomNode, scale: ScaleFactor, report: &mut RescaleReport) -> Result<()> {
    let stsd: SampleDescriptionTable = stbl.require(&[STSD])?.decode()?;
    let format = stsd.descriptions.first().map(|d| d.data_format);

    let stts = stbl.require(&[STTS])?;
    let mut timing: TimeToSample = stts.decode()?;
    for entry in &mut timing.entries {
        let count = narrow(TimeToSample::NAME, "sample_count", scale.apply(entry.sample_count as u64))?;
        info!(from = entry.sample_count, to = count, "adjusting sample count");
        entry.sample_count = count;
    }
    stts.encode(&timing)?;
    report.updated.push(STTS);

    let stco = stbl.require(&[STCO])?;
    let mut chunks: ChunkOffset = stco.decode()?;
    if chunks.offsets.len() > 1 {
        chunks.offsets = resize_table(ChunkOffset::NAME, "offsets", &chunks.offsets, scale)?;
        info!(data_format = ?format, entries = chunks.offsets.len(), "extending chunk offset table");
        stco.encode(&chunks)?;
        report.updated.push(STCO);
    }

    let stsz = stbl.require(&[STSZ])?;
    let mut sizes: SampleSize = stsz.decode()?;
    match &mut sizes.sizes {
        SampleSizes::PerSample(table) if table.len() > 1 => {
            *table = resize_table(SampleSize::NAME, "sizes", table, scale)?;
            info!(data_format = ?format, entries = table.len(), "extending sample size table");
        }
        SampleSizes::Uniform { count, .. } => {
            let new = narrow(SampleSize::NAME, "sample_count", scale.apply(*count as u64))?;
            info!(data_format = ?format, from = *count, to = new, "adjusting uniform sample count");
            *count = new;
        }
        SampleSizes::PerSample(_) => return Ok(()),
    }
    stsz.encode(&sizes)?;
    report.updated.push(STSZ);
    Ok(())
}

fn resize_table(record: &'static str, field: &'static str, values: &[u32], scale: ScaleFactor) -> Result<Vec<u32>> {
    let target = narrow(record, "entry_count", scale.apply(values.len() as u64))? as usize;
    let wide: Vec<i64> = values.iter().map(|&v| v as i64).collect();
    debug!(record, period = detect_period(&deltas(&wide)), from = values.len(), to = target, "resizing table");
    extrapolate(&wide, target)
        .into_iter()
        .map(|v| {
            u32::try_from(v).map_err(|_| Error::Encode {
                record,
                field,
                reason: format!("extrapolated value {v} does not fit in 32 bits"),
            })
        })
        .collect()
}

fn narrow(record: &'static str, field: &'static str, value: u64) -> Result<u32> {
    u32::try_from(value).map_err(|_| Error::Encode { record, field, reason: format!("{value} does not fit in 32 bits") })
}

/// Outcome of [`repair`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepairSummary {
    pub reference_media_len: u64,
    /// Payload length the broken `mdat` header claims, if it claims one.
    pub broken_declared_len: Option<u64>,
    /// Payload length actually used: everything from the broken `mdat`
    /// payload to the end of the file.
    pub broken_media_len: u64,
    /// Bytes of top-level atoms following the reference `mdat`.
    pub trailing_bytes: u64,
    pub scale: Option<ScaleFactor>,
    pub rescale: Option<RescaleReport>,
}

enum TopLevel {
    Atom(AtomNode),
    MediaData,
}

struct ReferenceLayout {
    atoms: Vec<TopLevel>,
    media_len: u64,
    trailing: u64,
}

impl ReferenceLayout {
    /// Buffers every top-level atom except `mdat`, which is only measured.
    fn read<R: Read + Seek>(reference: R) -> Result<Self> {
        let mut reader = AtomReader::new(reference)?;
        let mut children = reader.children();
        let mut atoms = Vec::new();
        let mut media_len = None;
        let mut trailing = 0;

        while let Some(mut atom) = children.next_atom()? {
            if atom.tag() == MDAT {
                if media_len.is_some() {
                    warn!(offset = atom.header().start, "skipping additional mdat atom in reference file");
                    continue;
                }
                media_len = Some(atom.payload_len());
                atoms.push(TopLevel::MediaData);
                continue;
            }
            let node = AtomNode::read(&mut atom)?;
            if media_len.is_some() {
                trailing += node.calculate_size();
            }
            atoms.push(TopLevel::Atom(node));
        }

        let media_len = media_len.ok_or_else(|| Error::MissingAtom { path: MDAT.to_string() })?;
        let layout = Self { atoms, media_len, trailing };
        if layout.movie().is_none() {
            return Err(Error::MissingAtom { path: MOOV.to_string() });
        }
        debug!(atoms = layout.atoms.len(), media_len, trailing, "read reference layout");
        Ok(layout)
    }

    fn movie(&self) -> Option<&AtomNode> {
        self.atoms.iter().find_map(|a| match a {
            TopLevel::Atom(node) if node.tag() == MOOV => Some(node),
            _ => None,
        })
    }

    fn movie_mut(&mut self) -> Result<&mut AtomNode> {
        self.atoms
            .iter_mut()
            .find_map(|a| match a {
                TopLevel::Atom(node) if node.tag() == MOOV => Some(node),
                _ => None,
            })
            .ok_or_else(|| Error::MissingAtom { path: MOOV.to_string() })
    }
}

/// Writes `reference`'s atoms to `output` with `broken`'s media data in
/// place of the reference `mdat`.
///
/// The broken `mdat`'s declared size is ignored: its payload is taken to run
/// to the end of `broken`. Media data is streamed through a buffer of
/// `opts.chunk_size` bytes. On error `output` may hold a partial file.
pub fn repair<R, B, W>(reference: R, broken: B, output: &mut W, opts: &RepairOptions) -> Result<RepairSummary>
where
    R: Read + Seek,
    B: Read + Seek,
    W: Write,
{
    let mut layout = ReferenceLayout::read(reference)?;

    let mut broken = AtomReader::new(broken)?;
    let stream_end = broken.end();
    let mut children = broken.children();
    let mut mdat = children.find(MDAT)?.ok_or(Error::NoMediaData)?;
    let declared = mdat.header().payload_len();
    let media_len = stream_end.saturating_sub(mdat.header().payload_start());
    mdat.set_payload_len(media_len);
    info!(
        from = %declared.map_or_else(|| "?".to_string(), format_size),
        to = %format_size(media_len),
        "broken file's mdat size adjusted"
    );
    if layout.trailing > 0 {
        debug!(trailing = layout.trailing, "reference has atoms after mdat; not subtracted from broken length");
    }

    let mut summary = RepairSummary {
        reference_media_len: layout.media_len,
        broken_declared_len: declared,
        broken_media_len: media_len,
        trailing_bytes: layout.trailing,
        scale: None,
        rescale: None,
    };

    if opts.fix_metadata {
        let scale = ScaleFactor::new(media_len, layout.media_len)?;
        info!(%scale, "scale factor to fix metadata");
        summary.rescale = Some(rescale_movie(layout.movie_mut()?, scale)?);
        summary.scale = Some(scale);
    }

    let mut buf = vec![0u8; opts.chunk_size.max(1)];
    for atom in &layout.atoms {
        match atom {
            TopLevel::Atom(node) => node.write(&mut *output)?,
            TopLevel::MediaData => AtomWriter::scoped(&mut *output, atom_size_for(media_len), MDAT, |w| {
                loop {
                    let n = mdat.read_chunk(&mut buf)?;
                    if n == 0 {
                        return Ok(());
                    }
                    w.write_bytes(&buf[..n])?;
                }
            })?,
        }
    }
    output.flush()?;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wide(values: &[u32]) -> Vec<i64> {
        values.iter().map(|&v| v as i64).collect()
    }

    #[test]
    fn period_of_alternating_deltas() {
        assert_eq!(detect_period(&[1, 2, 1, 2, 1, 2]), 2);
        assert_eq!(detect_period(&[1, 2, 3, 1, 2, 3, 1, 2]), 3);
    }

    #[test]
    fn period_falls_back_to_one() {
        assert_eq!(detect_period(&[]), 1);
        assert_eq!(detect_period(&[7]), 1);
        // Too short for a period of 2 to be confirmed.
        assert_eq!(detect_period(&[1, 2, 1, 2, 1]), 1);
        assert_eq!(detect_period(&[5, 5, 5, 5, 5, 5]), 2);
    }

    #[test]
    fn extrapolation_continues_the_cycle() {
        let values = wide(&[0, 1, 3, 4, 6, 7, 9]);
        assert_eq!(extrapolate(&values, 10), wide(&[0, 1, 3, 4, 6, 7, 9, 10, 12, 13]));

        // Eight deltas with period 3 leave the cycle two steps in.
        let values = wide(&[0, 1, 3, 6, 7, 9, 12, 13, 15]);
        assert_eq!(&extrapolate(&values, 12)[9..], &[18, 19, 21]);
    }

    #[test]
    fn extrapolation_with_single_delta_repeats_it() {
        assert_eq!(extrapolate(&[100, 140], 5), vec![100, 140, 180, 220, 260]);
    }

    #[test]
    fn extrapolation_truncates_shorter_targets() {
        assert_eq!(extrapolate(&[1, 2, 3, 4], 2), vec![1, 2]);
        assert_eq!(extrapolate(&[9], 4), vec![9]);
    }

    #[test]
    fn scale_factor_rounds_half_up() {
        let half = ScaleFactor::new(1, 2).unwrap();
        assert_eq!(half.apply(4), 2);
        assert_eq!(half.apply(5), 3);
        assert_eq!(ScaleFactor::new(2, 3).unwrap().apply(1), 1);
        assert_eq!(ScaleFactor::new(1, 3).unwrap().apply(1), 0);
        assert_eq!(ScaleFactor::new(u64::MAX, 1).unwrap().apply(2), u64::MAX);
    }

    #[test]
    fn scale_factor_rejects_empty_reference() {
        assert!(matches!(ScaleFactor::new(10, 0), Err(Error::EmptyMediaData)));
    }
}
