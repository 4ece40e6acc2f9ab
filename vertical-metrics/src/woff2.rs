//! The [WOFF 2.0](https://www.w3.org/TR/WOFF2/) container.
//!
//! Decoding understands the `glyf`/`loca` and `hmtx` transforms. Encoding
//! always stores tables untransformed, in a single brotli stream.

mod glyf;
mod hmtx;

use std::{
    collections::BTreeSet,
    io::{Read, Write},
};

use brotlic::{CompressorWriter, DecompressorReader};
use read_fonts::{
    tables::{glyf::Glyf, head::Head, hhea::Hhea, hmtx::Hmtx, loca::Loca, maxp::Maxp},
    types::Tag,
    FontData, FontRef, TopLevelTable,
};

use crate::{
    container::{TTC_SIGNATURE, WOFF2_SIGNATURE},
    reader::Reader,
    sfnt::{round4, SfntBuilder},
    Error, Flavor, ParseError,
};

const HEADER_LEN: usize = 48;
const SFNT_HEADER_LEN: usize = 12;
const SFNT_TABLE_RECORD_LEN: usize = 16;

/// Index value that marks an explicit tag in the table directory.
const EXPLICIT_TAG: u8 = 0x3F;
/// The "null" transform of `glyf` and `loca`.
const GLYF_NULL_TRANSFORM: u8 = 3;
/// Offset of `indexToLocFormat` in `head`.
const INDEX_TO_LOC_FORMAT_OFFSET: usize = 50;

/// Tags with a one byte encoding in the table directory.
pub(crate) const KNOWN_TAGS: [Tag; 63] = [
    Tag::new(b"cmap"),
    Tag::new(b"head"),
    Tag::new(b"hhea"),
    Tag::new(b"hmtx"),
    Tag::new(b"maxp"),
    Tag::new(b"name"),
    Tag::new(b"OS/2"),
    Tag::new(b"post"),
    Tag::new(b"cvt "),
    Tag::new(b"fpgm"),
    Tag::new(b"glyf"),
    Tag::new(b"loca"),
    Tag::new(b"prep"),
    Tag::new(b"CFF "),
    Tag::new(b"VORG"),
    Tag::new(b"EBDT"),
    Tag::new(b"EBLC"),
    Tag::new(b"gasp"),
    Tag::new(b"hdmx"),
    Tag::new(b"kern"),
    Tag::new(b"LTSH"),
    Tag::new(b"PCLT"),
    Tag::new(b"VDMX"),
    Tag::new(b"vhea"),
    Tag::new(b"vmtx"),
    Tag::new(b"BASE"),
    Tag::new(b"GDEF"),
    Tag::new(b"GPOS"),
    Tag::new(b"GSUB"),
    Tag::new(b"EBSC"),
    Tag::new(b"JSTF"),
    Tag::new(b"MATH"),
    Tag::new(b"CBDT"),
    Tag::new(b"CBLC"),
    Tag::new(b"COLR"),
    Tag::new(b"CPAL"),
    Tag::new(b"SVG "),
    Tag::new(b"sbix"),
    Tag::new(b"acnt"),
    Tag::new(b"avar"),
    Tag::new(b"bdat"),
    Tag::new(b"bloc"),
    Tag::new(b"bsln"),
    Tag::new(b"cvar"),
    Tag::new(b"fdsc"),
    Tag::new(b"feat"),
    Tag::new(b"fmtx"),
    Tag::new(b"fvar"),
    Tag::new(b"gvar"),
    Tag::new(b"hsty"),
    Tag::new(b"just"),
    Tag::new(b"lcar"),
    Tag::new(b"mort"),
    Tag::new(b"morx"),
    Tag::new(b"opbd"),
    Tag::new(b"prop"),
    Tag::new(b"trak"),
    Tag::new(b"Zapf"),
    Tag::new(b"Silf"),
    Tag::new(b"Glat"),
    Tag::new(b"Gloc"),
    Tag::new(b"Feat"),
    Tag::new(b"Sill"),
];

fn malformed(reason: &'static str) -> ParseError {
    ParseError::malformed("WOFF2", reason)
}

#[derive(Clone, Debug)]
struct TableDirectoryEntry {
    tag: Tag,
    transform_version: u8,
    orig_length: u32,
    /// Present only for transformed tables
    transform_length: Option<u32>,
}

impl TableDirectoryEntry {
    fn read(reader: &mut Reader) -> Result<Self, ParseError> {
        let flags = reader.read_u8()?;
        let tag = match flags & EXPLICIT_TAG {
            EXPLICIT_TAG => reader.read_tag()?,
            index => KNOWN_TAGS[index as usize],
        };
        let transform_version = flags >> 6;
        let orig_length = reader.read_base128()?;
        let transformed = if tag == Glyf::TAG || tag == Loca::TAG {
            match transform_version {
                0 => true,
                GLYF_NULL_TRANSFORM => false,
                version => return Err(ParseError::UnsupportedTransform { tag, version }),
            }
        } else {
            transform_version != 0
        };
        let transform_length = transformed.then(|| reader.read_base128()).transpose()?;
        if tag == Loca::TAG && transform_length.is_some_and(|len| len != 0) {
            return Err(malformed("transformed loca has data"));
        }
        Ok(Self {
            tag,
            transform_version,
            orig_length,
            transform_length,
        })
    }

    fn stored_length(&self) -> u32 {
        self.transform_length.unwrap_or(self.orig_length)
    }
}

/// Unpack a WOFF2 file into an sfnt, undoing any table transforms.
pub(crate) fn decode(data: &[u8]) -> Result<Vec<u8>, Error> {
    let mut reader = Reader::new(data);
    let signature = reader.read_u32()?;
    debug_assert_eq!(signature, WOFF2_SIGNATURE);
    let flavor = reader.read_u32()?;
    let length = reader.read_u32()?;
    let num_tables = reader.read_u16()?;
    let reserved = reader.read_u16()?;
    let _total_sfnt_size = reader.read_u32()?;
    let total_compressed_size = reader.read_u32()?;
    let _major_version = reader.read_u16()?;
    let _minor_version = reader.read_u16()?;
    let _meta_offset = reader.read_u32()?;
    let meta_length = reader.read_u32()?;
    let _meta_orig_length = reader.read_u32()?;
    let _priv_offset = reader.read_u32()?;
    let priv_length = reader.read_u32()?;

    if flavor == TTC_SIGNATURE {
        return Err(ParseError::Collection.into());
    }
    if length as usize != data.len() {
        return Err(malformed("length does not match the file size").into());
    }
    if reserved != 0 {
        return Err(malformed("reserved header field is not zero").into());
    }
    if num_tables == 0 {
        return Err(malformed("no tables").into());
    }
    if meta_length != 0 || priv_length != 0 {
        log::debug!("dropping {meta_length} bytes of metadata and {priv_length} private bytes");
    }

    let mut seen = BTreeSet::new();
    let mut entries = Vec::with_capacity(num_tables as usize);
    for _ in 0..num_tables {
        let entry = TableDirectoryEntry::read(&mut reader)?;
        if !seen.insert(entry.tag) {
            return Err(malformed("duplicate table").into());
        }
        entries.push(entry);
    }

    let compressed = reader.read_bytes(total_compressed_size as usize)?;
    let expected = entries
        .iter()
        .map(|entry| entry.stored_length() as u64)
        .sum::<u64>();
    let stream = decompress(compressed, expected)?;

    let mut tables = Vec::with_capacity(entries.len());
    let mut offset = 0usize;
    for entry in &entries {
        let end = offset + entry.stored_length() as usize;
        let bytes = stream
            .get(offset..end)
            .ok_or(malformed("table data out of bounds"))?;
        tables.push((entry, bytes));
        offset = end;
    }
    let untransformed = |tag: Tag| {
        tables
            .iter()
            .find(|(entry, _)| entry.tag == tag && entry.transform_length.is_none())
            .map(|(_, bytes)| FontData::new(bytes))
    };

    let mut builder = SfntBuilder::new(flavor);
    let mut x_mins = None;
    let transformed_glyf = tables
        .iter()
        .find(|(entry, _)| entry.tag == Glyf::TAG && entry.transform_length.is_some());
    let transformed_loca = entries
        .iter()
        .find(|entry| entry.tag == Loca::TAG && entry.transform_length.is_some());
    match (transformed_glyf, transformed_loca) {
        (Some((_, glyf_data)), Some(loca_entry)) => {
            let head = untransformed(Head::TAG).ok_or(Error::MissingTable(Head::TAG))?;
            let index_to_loc_format = head
                .read_at::<i16>(INDEX_TO_LOC_FORMAT_OFFSET)
                .map_err(ParseError::from)?;
            let rebuilt = glyf::reconstruct(glyf_data, index_to_loc_format)?;
            if rebuilt.loca.len() != loca_entry.orig_length as usize {
                return Err(malformed("rebuilt loca does not match its original length").into());
            }
            builder.add_raw(Glyf::TAG, rebuilt.glyf);
            builder.add_raw(Loca::TAG, rebuilt.loca);
            x_mins = Some(rebuilt.x_mins);
        }
        (None, None) => (),
        _ => return Err(malformed("glyf and loca must be transformed together").into()),
    }

    for (entry, bytes) in &tables {
        if entry.transform_length.is_none() {
            builder.add_raw(entry.tag, *bytes);
            continue;
        }
        if entry.tag == Glyf::TAG || entry.tag == Loca::TAG {
            continue;
        }
        if entry.tag != Hmtx::TAG || entry.transform_version != 1 {
            return Err(ParseError::UnsupportedTransform {
                tag: entry.tag,
                version: entry.transform_version,
            }
            .into());
        }
        let x_mins = x_mins
            .as_deref()
            .ok_or(malformed("transformed hmtx requires a transformed glyf"))?;
        let num_glyphs = untransformed(Maxp::TAG)
            .ok_or(Error::MissingTable(Maxp::TAG))?
            .read_at::<u16>(4)?;
        let num_h_metrics = untransformed(Hhea::TAG)
            .ok_or(Error::MissingTable(Hhea::TAG))?
            .read_at::<u16>(34)?;
        let hmtx = hmtx::reconstruct(bytes, num_glyphs, num_h_metrics, x_mins)?;
        builder.add_raw(Hmtx::TAG, hmtx);
    }
    Ok(builder.build())
}

fn decompress(compressed: &[u8], expected: u64) -> Result<Vec<u8>, ParseError> {
    let mut stream = Vec::new();
    DecompressorReader::new(compressed)
        .take(expected + 1)
        .read_to_end(&mut stream)
        .map_err(|e| ParseError::Decompression {
            container: "WOFF2",
            reason: e.to_string(),
        })?;
    if stream.len() as u64 != expected {
        return Err(ParseError::Decompression {
            container: "WOFF2",
            reason: format!(
                "expected {expected} bytes of table data, got {}",
                stream.len()
            ),
        });
    }
    Ok(stream)
}

/// Pack an sfnt as WOFF2 without table transforms.
pub(crate) fn encode(font: &FontRef) -> Result<Vec<u8>, Error> {
    let conversion = |reason: String| Error::conversion(Flavor::Woff2, reason);
    let mut records: Vec<_> = font.table_directory.table_records().iter().collect();
    // loca must directly follow glyf
    if let Some(loca) = records.iter().position(|record| record.tag() == Loca::TAG) {
        let loca = records.remove(loca);
        let glyf = records.iter().position(|record| record.tag() == Glyf::TAG);
        records.insert(glyf.map(|idx| idx + 1).unwrap_or(records.len()), loca);
    }

    let num_tables = records.len();
    let mut directory = Vec::new();
    let mut stream = Vec::new();
    let mut total_sfnt_size = SFNT_HEADER_LEN + SFNT_TABLE_RECORD_LEN * num_tables;
    for record in &records {
        let tag = record.tag();
        let data = font
            .table_data(tag)
            .ok_or_else(|| conversion(format!("'{tag}' is out of bounds")))?
            .as_bytes();
        let mut flags = KNOWN_TAGS
            .iter()
            .position(|known| *known == tag)
            .map(|idx| idx as u8)
            .unwrap_or(EXPLICIT_TAG);
        if tag == Glyf::TAG || tag == Loca::TAG {
            flags |= GLYF_NULL_TRANSFORM << 6;
        }
        directory.push(flags);
        if flags & EXPLICIT_TAG == EXPLICIT_TAG {
            directory.extend_from_slice(&tag.to_be_bytes());
        }
        write_base128(&mut directory, data.len() as u32);
        stream.extend_from_slice(data);
        total_sfnt_size += round4(data.len());
    }

    let compressed = compress(&stream).map_err(|e| conversion(e.to_string()))?;
    let (major_version, minor_version) = font
        .table_data(Head::TAG)
        .and_then(|head| Some((head.read_at::<u16>(4).ok()?, head.read_at::<u16>(6).ok()?)))
        .unwrap_or_default();
    let length = round4(HEADER_LEN + directory.len() + compressed.len());

    let mut out = Vec::with_capacity(length);
    out.extend_from_slice(&WOFF2_SIGNATURE.to_be_bytes());
    out.extend_from_slice(&font.table_directory.sfnt_version().to_be_bytes());
    out.extend_from_slice(&(length as u32).to_be_bytes());
    out.extend_from_slice(&(num_tables as u16).to_be_bytes());
    out.extend_from_slice(&0u16.to_be_bytes());
    out.extend_from_slice(&(total_sfnt_size as u32).to_be_bytes());
    out.extend_from_slice(&(compressed.len() as u32).to_be_bytes());
    out.extend_from_slice(&major_version.to_be_bytes());
    out.extend_from_slice(&minor_version.to_be_bytes());
    // no metadata or private block
    out.extend_from_slice(&[0; 20]);
    out.extend_from_slice(&directory);
    out.extend_from_slice(&compressed);
    out.resize(length, 0);
    log::debug!(
        "packed {num_tables} tables, {} bytes of table data into {length} bytes",
        stream.len()
    );
    Ok(out)
}

fn compress(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut compressor = CompressorWriter::new(Vec::new());
    compressor.write_all(data)?;
    compressor
        .into_inner()
        .map_err(|_| std::io::Error::other("brotli stream could not be finished"))
}

/// Write a [UIntBase128] value.
///
/// [UIntBase128]: https://www.w3.org/TR/WOFF2/#DataTypes
pub(crate) fn write_base128(out: &mut Vec<u8>, value: u32) {
    let mut bytes = [0u8; 5];
    let mut len = 0;
    let mut remaining = value;
    loop {
        bytes[len] = (remaining & 0x7F) as u8;
        len += 1;
        remaining >>= 7;
        if remaining == 0 {
            break;
        }
    }
    for i in (0..len).rev() {
        let continuation = if i == 0 { 0 } else { 0x80 };
        out.push(bytes[i] | continuation);
    }
}
