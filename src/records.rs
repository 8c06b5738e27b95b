//! Leaf records of the structural atoms under `moov`.

use crate::atom::FourCC;
use crate::codec::{Decoder, Encoder, Fixed, Flags, Record};
use crate::error::{Error, Result};
use byteorder::{BigEndian, ByteOrder};
use serde::Serialize;
use std::io::{self, Write};

/// Movie header (`mvhd`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MovieHeader {
    pub version: u8,
    pub flags: Flags,
    pub creation_time: u64,
    pub modification_time: u64,
    pub time_scale: u32,
    pub duration: u64,
    pub preferred_rate: u32,
    pub preferred_volume: u16,
    pub matrix: [u32; 9],
    pub preview_time: u32,
    pub preview_duration: u32,
    pub poster_time: u32,
    pub selection_time: u32,
    pub selection_duration: u32,
    pub current_time: u32,
    pub next_track_id: u32,
}

impl Record for MovieHeader {
    const NAME: &'static str = "mvhd";

    fn decode(dec: &mut Decoder<'_>) -> Result<Self> {
        let version = dec.field("version")?;
        let flags = dec.field("flags")?;
        let creation_time = dec.versioned("creation_time", version)?;
        let modification_time = dec.versioned("modification_time", version)?;
        let time_scale = dec.field("time_scale")?;
        let duration = dec.versioned("duration", version)?;
        let preferred_rate = dec.field("preferred_rate")?;
        let preferred_volume = dec.field("preferred_volume")?;
        dec.skip("reserved", 10)?;
        Ok(Self {
            version,
            flags,
            creation_time,
            modification_time,
            time_scale,
            duration,
            preferred_rate,
            preferred_volume,
            matrix: dec.field("matrix")?,
            preview_time: dec.field("preview_time")?,
            preview_duration: dec.field("preview_duration")?,
            poster_time: dec.field("poster_time")?,
            selection_time: dec.field("selection_time")?,
            selection_duration: dec.field("selection_duration")?,
            current_time: dec.field("current_time")?,
            next_track_id: dec.field("next_track_id")?,
        })
    }

    fn encode(&self, enc: &mut Encoder<'_>) -> Result<()> {
        enc.field(&self.version)?;
        enc.field(&self.flags)?;
        enc.versioned("creation_time", self.version, self.creation_time)?;
        enc.versioned("modification_time", self.version, self.modification_time)?;
        enc.field(&self.time_scale)?;
        enc.versioned("duration", self.version, self.duration)?;
        enc.field(&self.preferred_rate)?;
        enc.field(&self.preferred_volume)?;
        enc.zeros(10)?;
        enc.field(&self.matrix)?;
        enc.field(&self.preview_time)?;
        enc.field(&self.preview_duration)?;
        enc.field(&self.poster_time)?;
        enc.field(&self.selection_time)?;
        enc.field(&self.selection_duration)?;
        enc.field(&self.current_time)?;
        enc.field(&self.next_track_id)
    }
}

/// Track header (`tkhd`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackHeader {
    pub version: u8,
    pub flags: Flags,
    pub creation_time: u64,
    pub modification_time: u64,
    pub track_id: u32,
    pub duration: u64,
    pub layer: u16,
    pub alternate_group: u16,
    pub volume: u16,
    pub matrix: [u32; 9],
    /// 16.16 fixed point.
    pub track_width: u32,
    /// 16.16 fixed point.
    pub track_height: u32,
}

impl Record for TrackHeader {
    const NAME: &'static str = "tkhd";

    fn decode(dec: &mut Decoder<'_>) -> Result<Self> {
        let version = dec.field("version")?;
        let flags = dec.field("flags")?;
        let creation_time = dec.versioned("creation_time", version)?;
        let modification_time = dec.versioned("modification_time", version)?;
        let track_id = dec.field("track_id")?;
        dec.skip("reserved", 4)?;
        let duration = dec.versioned("duration", version)?;
        dec.skip("reserved", 8)?;
        let layer = dec.field("layer")?;
        let alternate_group = dec.field("alternate_group")?;
        let volume = dec.field("volume")?;
        dec.skip("reserved", 2)?;
        Ok(Self {
            version,
            flags,
            creation_time,
            modification_time,
            track_id,
            duration,
            layer,
            alternate_group,
            volume,
            matrix: dec.field("matrix")?,
            track_width: dec.field("track_width")?,
            track_height: dec.field("track_height")?,
        })
    }

    fn encode(&self, enc: &mut Encoder<'_>) -> Result<()> {
        enc.field(&self.version)?;
        enc.field(&self.flags)?;
        enc.versioned("creation_time", self.version, self.creation_time)?;
        enc.versioned("modification_time", self.version, self.modification_time)?;
        enc.field(&self.track_id)?;
        enc.zeros(4)?;
        enc.versioned("duration", self.version, self.duration)?;
        enc.zeros(8)?;
        enc.field(&self.layer)?;
        enc.field(&self.alternate_group)?;
        enc.field(&self.volume)?;
        enc.zeros(2)?;
        enc.field(&self.matrix)?;
        enc.field(&self.track_width)?;
        enc.field(&self.track_height)
    }
}

/// Media header (`mdhd`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaHeader {
    pub version: u8,
    pub flags: Flags,
    pub creation_time: u64,
    pub modification_time: u64,
    pub time_scale: u32,
    pub duration: u64,
    pub language: u16,
    pub quality: u16,
}

impl Record for MediaHeader {
    const NAME: &'static str = "mdhd";

    fn decode(dec: &mut Decoder<'_>) -> Result<Self> {
        let version = dec.field("version")?;
        Ok(Self {
            version,
            flags: dec.field("flags")?,
            creation_time: dec.versioned("creation_time", version)?,
            modification_time: dec.versioned("modification_time", version)?,
            time_scale: dec.field("time_scale")?,
            duration: dec.versioned("duration", version)?,
            language: dec.field("language")?,
            quality: dec.field("quality")?,
        })
    }

    fn encode(&self, enc: &mut Encoder<'_>) -> Result<()> {
        enc.field(&self.version)?;
        enc.field(&self.flags)?;
        enc.versioned("creation_time", self.version, self.creation_time)?;
        enc.versioned("modification_time", self.version, self.modification_time)?;
        enc.field(&self.time_scale)?;
        enc.versioned("duration", self.version, self.duration)?;
        enc.field(&self.language)?;
        enc.field(&self.quality)
    }
}

/// Handler reference (`hdlr`). The component name fills whatever the atom
/// has left after the fixed fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HandlerReference {
    pub version: u8,
    pub flags: Flags,
    pub component_type: FourCC,
    pub component_subtype: FourCC,
    pub component_manufacturer: u32,
    pub component_flags: u32,
    pub component_flags_mask: u32,
    #[serde(serialize_with = "crate::util::serialize_hex")]
    pub component_name: Vec<u8>,
}

impl Record for HandlerReference {
    const NAME: &'static str = "hdlr";

    fn decode(dec: &mut Decoder<'_>) -> Result<Self> {
        Ok(Self {
            version: dec.field("version")?,
            flags: dec.field("flags")?,
            component_type: dec.field("component_type")?,
            component_subtype: dec.field("component_subtype")?,
            component_manufacturer: dec.field("component_manufacturer")?,
            component_flags: dec.field("component_flags")?,
            component_flags_mask: dec.field("component_flags_mask")?,
            component_name: dec.rest("component_name")?,
        })
    }

    fn encode(&self, enc: &mut Encoder<'_>) -> Result<()> {
        enc.field(&self.version)?;
        enc.field(&self.flags)?;
        enc.field(&self.component_type)?;
        enc.field(&self.component_subtype)?;
        enc.field(&self.component_manufacturer)?;
        enc.field(&self.component_flags)?;
        enc.field(&self.component_flags_mask)?;
        enc.bytes(&self.component_name)
    }
}

/// Video media information header (`vmhd`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VideoMediaHeader {
    pub version: u8,
    pub flags: Flags,
    pub graphics_mode: u16,
    pub opcolor: [u16; 3],
}

impl Record for VideoMediaHeader {
    const NAME: &'static str = "vmhd";

    fn decode(dec: &mut Decoder<'_>) -> Result<Self> {
        Ok(Self {
            version: dec.field("version")?,
            flags: dec.field("flags")?,
            graphics_mode: dec.field("graphics_mode")?,
            opcolor: dec.field("opcolor")?,
        })
    }

    fn encode(&self, enc: &mut Encoder<'_>) -> Result<()> {
        enc.field(&self.version)?;
        enc.field(&self.flags)?;
        enc.field(&self.graphics_mode)?;
        enc.field(&self.opcolor)
    }
}

/// Sound media information header (`smhd`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SoundMediaHeader {
    pub version: u8,
    pub flags: Flags,
    /// 8.8 fixed point, 0 is centered.
    pub balance: i16,
}

impl Record for SoundMediaHeader {
    const NAME: &'static str = "smhd";

    fn decode(dec: &mut Decoder<'_>) -> Result<Self> {
        let version = dec.field("version")?;
        let flags = dec.field("flags")?;
        let balance = dec.field("balance")?;
        dec.skip("reserved", 2)?;
        Ok(Self { version, flags, balance })
    }

    fn encode(&self, enc: &mut Encoder<'_>) -> Result<()> {
        enc.field(&self.version)?;
        enc.field(&self.flags)?;
        enc.field(&self.balance)?;
        enc.zeros(2)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EditEntry {
    pub track_duration: u64,
    pub media_time: i64,
    /// 16.16 fixed point.
    pub media_rate: u32,
}

/// Edit list (`elst`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EditList {
    pub version: u8,
    pub flags: Flags,
    pub entries: Vec<EditEntry>,
}

impl Record for EditList {
    const NAME: &'static str = "elst";

    fn decode(dec: &mut Decoder<'_>) -> Result<Self> {
        let version = dec.field("version")?;
        let flags = dec.field("flags")?;
        let count = dec.field::<u32>("entry_count")?;
        let mut entries = Vec::with_capacity(count.min(1024) as usize);
        for _ in 0..count {
            let track_duration = dec.versioned("track_duration", version)?;
            let media_time = if version == 1 {
                dec.field::<i64>("media_time")?
            } else {
                dec.field::<i32>("media_time")? as i64
            };
            let media_rate = dec.field("media_rate")?;
            entries.push(EditEntry { track_duration, media_time, media_rate });
        }
        Ok(Self { version, flags, entries })
    }

    fn encode(&self, enc: &mut Encoder<'_>) -> Result<()> {
        enc.field(&self.version)?;
        enc.field(&self.flags)?;
        enc.computed("entry_count", self.entries.len() as u64)?;
        for entry in &self.entries {
            write_edit(enc, self.version, entry)?;
        }
        Ok(())
    }
}

// Entry widths depend on the list's version, so entries are not `Fixed`.
fn write_edit(enc: &mut Encoder<'_>, version: u8, entry: &EditEntry) -> Result<()> {
    enc.versioned("track_duration", version, entry.track_duration)?;
    if version == 1 {
        enc.field(&entry.media_time)?;
    } else {
        let narrow = i32::try_from(entry.media_time).map_err(|_| Error::Encode {
            record: EditList::NAME,
            field: "media_time",
            reason: format!("{} does not fit in 32 bits", entry.media_time),
        })?;
        enc.field(&narrow)?;
    }
    enc.field(&entry.media_rate)
}

/// One entry of a sample description table. The leading size field is
/// derived from the data length.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SampleDescription {
    pub data_format: FourCC,
    pub data_reference_index: u16,
    #[serde(serialize_with = "crate::util::serialize_hex")]
    pub data: Vec<u8>,
}

impl SampleDescription {
    const FIXED_LEN: u64 = 16;
}

impl Record for SampleDescription {
    const NAME: &'static str = "sample_description";

    fn decode(dec: &mut Decoder<'_>) -> Result<Self> {
        let size = dec.field::<u32>("size")? as u64;
        if size < Self::FIXED_LEN {
            return Err(Error::Decode { record: Self::NAME, field: "size", expected: Self::FIXED_LEN, got: size });
        }
        let data_format = dec.field("data_format")?;
        dec.skip("reserved", 6)?;
        Ok(Self {
            data_format,
            data_reference_index: dec.field("data_reference_index")?,
            data: dec.bytes("data", size - Self::FIXED_LEN)?,
        })
    }

    fn encode(&self, enc: &mut Encoder<'_>) -> Result<()> {
        enc.computed("size", self.data.len() as u64 + Self::FIXED_LEN)?;
        enc.field(&self.data_format)?;
        enc.zeros(6)?;
        enc.field(&self.data_reference_index)?;
        enc.bytes(&self.data)
    }
}

/// Sample description table (`stsd`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SampleDescriptionTable {
    pub version: u8,
    pub flags: Flags,
    pub descriptions: Vec<SampleDescription>,
}

impl Record for SampleDescriptionTable {
    const NAME: &'static str = "stsd";

    fn decode(dec: &mut Decoder<'_>) -> Result<Self> {
        let version = dec.field("version")?;
        let flags = dec.field("flags")?;
        let count = dec.field::<u32>("entry_count")?;
        Ok(Self { version, flags, descriptions: dec.nested_list(count as u64)? })
    }

    fn encode(&self, enc: &mut Encoder<'_>) -> Result<()> {
        enc.field(&self.version)?;
        enc.field(&self.flags)?;
        enc.computed("entry_count", self.descriptions.len() as u64)?;
        enc.nested_list(&self.descriptions)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeToSampleEntry {
    pub sample_count: u32,
    pub sample_duration: u32,
}

impl Fixed for TimeToSampleEntry {
    const SIZE: usize = 8;
    fn read_fixed(buf: &[u8]) -> Self {
        Self { sample_count: BigEndian::read_u32(buf), sample_duration: BigEndian::read_u32(&buf[4..]) }
    }
    fn write_fixed(&self, w: &mut dyn Write) -> io::Result<()> {
        self.sample_count.write_fixed(w)?;
        self.sample_duration.write_fixed(w)
    }
}

/// Time-to-sample table (`stts`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimeToSample {
    pub version: u8,
    pub flags: Flags,
    pub entries: Vec<TimeToSampleEntry>,
}

impl Record for TimeToSample {
    const NAME: &'static str = "stts";

    fn decode(dec: &mut Decoder<'_>) -> Result<Self> {
        let version = dec.field("version")?;
        let flags = dec.field("flags")?;
        let count = dec.field::<u32>("entry_count")?;
        Ok(Self { version, flags, entries: dec.list("entries", count as u64)? })
    }

    fn encode(&self, enc: &mut Encoder<'_>) -> Result<()> {
        enc.field(&self.version)?;
        enc.field(&self.flags)?;
        enc.computed("entry_count", self.entries.len() as u64)?;
        enc.list(&self.entries)
    }
}

/// Sync sample table (`stss`): 1-based numbers of key frames.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncSample {
    pub version: u8,
    pub flags: Flags,
    pub samples: Vec<u32>,
}

impl Record for SyncSample {
    const NAME: &'static str = "stss";

    fn decode(dec: &mut Decoder<'_>) -> Result<Self> {
        let version = dec.field("version")?;
        let flags = dec.field("flags")?;
        let count = dec.field::<u32>("entry_count")?;
        Ok(Self { version, flags, samples: dec.list("samples", count as u64)? })
    }

    fn encode(&self, enc: &mut Encoder<'_>) -> Result<()> {
        enc.field(&self.version)?;
        enc.field(&self.flags)?;
        enc.computed("entry_count", self.samples.len() as u64)?;
        enc.list(&self.samples)
    }
}

/// The two shapes of a sample size table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleSizes {
    /// Every sample has the same size; only the count is stored.
    Uniform { size: u32, count: u32 },
    PerSample(Vec<u32>),
}

/// Sample size table (`stsz`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SampleSize {
    pub version: u8,
    pub flags: Flags,
    pub sizes: SampleSizes,
}

impl Record for SampleSize {
    const NAME: &'static str = "stsz";

    fn decode(dec: &mut Decoder<'_>) -> Result<Self> {
        let version = dec.field("version")?;
        let flags = dec.field("flags")?;
        let size = dec.field::<u32>("sample_size")?;
        let count = dec.field::<u32>("sample_count")?;
        let sizes = if size == 0 {
            SampleSizes::PerSample(dec.list("sizes", count as u64)?)
        } else {
            SampleSizes::Uniform { size, count }
        };
        Ok(Self { version, flags, sizes })
    }

    fn encode(&self, enc: &mut Encoder<'_>) -> Result<()> {
        enc.field(&self.version)?;
        enc.field(&self.flags)?;
        match &self.sizes {
            SampleSizes::Uniform { size: 0, .. } => Err(Error::Encode {
                record: Self::NAME,
                field: "sample_size",
                reason: "uniform sample size must be non-zero".into(),
            }),
            SampleSizes::Uniform { size, count } => {
                enc.field(size)?;
                enc.field(count)
            }
            SampleSizes::PerSample(sizes) => {
                enc.field(&0u32)?;
                enc.computed("sample_count", sizes.len() as u64)?;
                enc.list(sizes)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SampleToChunkEntry {
    pub first_chunk: u32,
    pub samples_per_chunk: u32,
    pub sample_description_id: u32,
}

impl Fixed for SampleToChunkEntry {
    const SIZE: usize = 12;
    fn read_fixed(buf: &[u8]) -> Self {
        Self {
            first_chunk: BigEndian::read_u32(buf),
            samples_per_chunk: BigEndian::read_u32(&buf[4..]),
            sample_description_id: BigEndian::read_u32(&buf[8..]),
        }
    }
    fn write_fixed(&self, w: &mut dyn Write) -> io::Result<()> {
        [self.first_chunk, self.samples_per_chunk, self.sample_description_id].write_fixed(w)
    }
}

/// Sample-to-chunk table (`stsc`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SampleToChunk {
    pub version: u8,
    pub flags: Flags,
    pub entries: Vec<SampleToChunkEntry>,
}

impl Record for SampleToChunk {
    const NAME: &'static str = "stsc";

    fn decode(dec: &mut Decoder<'_>) -> Result<Self> {
        let version = dec.field("version")?;
        let flags = dec.field("flags")?;
        let count = dec.field::<u32>("entry_count")?;
        Ok(Self { version, flags, entries: dec.list("entries", count as u64)? })
    }

    fn encode(&self, enc: &mut Encoder<'_>) -> Result<()> {
        enc.field(&self.version)?;
        enc.field(&self.flags)?;
        enc.computed("entry_count", self.entries.len() as u64)?;
        enc.list(&self.entries)
    }
}

/// Chunk offset table (`stco`): 32-bit absolute file offsets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChunkOffset {
    pub version: u8,
    pub flags: Flags,
    pub offsets: Vec<u32>,
}

impl Record for ChunkOffset {
    const NAME: &'static str = "stco";

    fn decode(dec: &mut Decoder<'_>) -> Result<Self> {
        let version = dec.field("version")?;
        let flags = dec.field("flags")?;
        let count = dec.field::<u32>("entry_count")?;
        Ok(Self { version, flags, offsets: dec.list("offsets", count as u64)? })
    }

    fn encode(&self, enc: &mut Encoder<'_>) -> Result<()> {
        enc.field(&self.version)?;
        enc.field(&self.flags)?;
        enc.computed("entry_count", self.offsets.len() as u64)?;
        enc.list(&self.offsets)
    }
}

/// One data reference (e.g. `alis`, `url `). Structured like an atom, but
/// kept as a flat record since every reference type shares the layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataReference {
    pub ref_type: FourCC,
    pub version: u8,
    pub flags: Flags,
    #[serde(serialize_with = "crate::util::serialize_hex")]
    pub data: Vec<u8>,
}

impl DataReference {
    const FIXED_LEN: u64 = 12;
}

impl Record for DataReference {
    const NAME: &'static str = "data_reference";

    fn decode(dec: &mut Decoder<'_>) -> Result<Self> {
        let size = dec.field::<u32>("size")? as u64;
        if size < Self::FIXED_LEN {
            return Err(Error::Decode { record: Self::NAME, field: "size", expected: Self::FIXED_LEN, got: size });
        }
        Ok(Self {
            ref_type: dec.field("type")?,
            version: dec.field("version")?,
            flags: dec.field("flags")?,
            data: dec.bytes("data", size - Self::FIXED_LEN)?,
        })
    }

    fn encode(&self, enc: &mut Encoder<'_>) -> Result<()> {
        enc.computed("size", self.data.len() as u64 + Self::FIXED_LEN)?;
        enc.field(&self.ref_type)?;
        enc.field(&self.version)?;
        enc.field(&self.flags)?;
        enc.bytes(&self.data)
    }
}

/// Data reference table (`dref`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataReferenceTable {
    pub version: u8,
    pub flags: Flags,
    pub references: Vec<DataReference>,
}

impl Record for DataReferenceTable {
    const NAME: &'static str = "dref";

    fn decode(dec: &mut Decoder<'_>) -> Result<Self> {
        let version = dec.field("version")?;
        let flags = dec.field("flags")?;
        let count = dec.field::<u32>("entry_count")?;
        Ok(Self { version, flags, references: dec.nested_list(count as u64)? })
    }

    fn encode(&self, enc: &mut Encoder<'_>) -> Result<()> {
        enc.field(&self.version)?;
        enc.field(&self.flags)?;
        enc.computed("entry_count", self.references.len() as u64)?;
        enc.nested_list(&self.references)
    }
}
