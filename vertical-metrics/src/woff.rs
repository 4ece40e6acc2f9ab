//! The [WOFF 1.0](https://www.w3.org/TR/WOFF/) container.

use std::io::{Read, Write};

use flate2::{read::ZlibDecoder, write::ZlibEncoder, Compression};
use read_fonts::{tables::head::Head, types::Tag, FontRef, TopLevelTable};

use crate::{
    container::WOFF_SIGNATURE,
    reader::Reader,
    sfnt::{round4, SfntBuilder},
    Error, Flavor, ParseError,
};

const HEADER_LEN: usize = 44;
const TABLE_DIRECTORY_ENTRY_LEN: usize = 20;
const SFNT_HEADER_LEN: usize = 12;
const SFNT_TABLE_RECORD_LEN: usize = 16;
const MAX_RESERVE_RATIO: usize = 4;

struct TableDirectoryEntry {
    tag: Tag,
    offset: u32,
    comp_length: u32,
    orig_length: u32,
    orig_checksum: u32,
}

/// Unpack a WOFF file into an sfnt.
///
/// Extended metadata and private data blocks have no sfnt equivalent and
/// are dropped.
pub(crate) fn decode(data: &[u8]) -> Result<Vec<u8>, Error> {
    let malformed = |reason| ParseError::malformed("WOFF", reason);
    let mut reader = Reader::new(data);
    let signature = reader.read_u32()?;
    debug_assert_eq!(signature, WOFF_SIGNATURE);
    let flavor = reader.read_u32()?;
    let length = reader.read_u32()?;
    let num_tables = reader.read_u16()?;
    let reserved = reader.read_u16()?;
    let total_sfnt_size = reader.read_u32()?;
    let _major_version = reader.read_u16()?;
    let _minor_version = reader.read_u16()?;
    let meta_length = {
        let _meta_offset = reader.read_u32()?;
        let meta_length = reader.read_u32()?;
        let _meta_orig_length = reader.read_u32()?;
        meta_length
    };
    let _priv_offset = reader.read_u32()?;
    let priv_length = reader.read_u32()?;

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

    let entries = (0..num_tables)
        .map(|_| {
            Ok(TableDirectoryEntry {
                tag: reader.read_tag()?,
                offset: reader.read_u32()?,
                comp_length: reader.read_u32()?,
                orig_length: reader.read_u32()?,
                orig_checksum: reader.read_u32()?,
            })
        })
        .collect::<Result<Vec<_>, ParseError>>()?;
    let expected_sfnt_size = SFNT_HEADER_LEN as u64
        + (SFNT_TABLE_RECORD_LEN * entries.len()) as u64
        + entries
            .iter()
            .map(|entry| round4(entry.orig_length as usize) as u64)
            .sum::<u64>();
    if total_sfnt_size as u64 != expected_sfnt_size {
        return Err(malformed("totalSfntSize does not match the table lengths").into());
    }

    let mut builder = SfntBuilder::new(flavor);
    for entry in &entries {
        let start = entry.offset as usize;
        let bytes = data
            .get(start..start + entry.comp_length as usize)
            .ok_or(malformed("table data out of bounds"))?;
        let table = match entry.comp_length.cmp(&entry.orig_length) {
            std::cmp::Ordering::Less => inflate(entry.tag, bytes, entry.orig_length)?,
            std::cmp::Ordering::Equal => bytes.to_vec(),
            std::cmp::Ordering::Greater => {
                return Err(malformed("compressed table is larger than the original").into())
            }
        };
        log::trace!(
            "'{}' {} -> {} bytes, checksum 0x{:08X}",
            entry.tag,
            entry.comp_length,
            entry.orig_length,
            entry.orig_checksum
        );
        builder.add_raw(entry.tag, table);
    }
    Ok(builder.build())
}

fn inflate(tag: Tag, bytes: &[u8], orig_length: u32) -> Result<Vec<u8>, ParseError> {
    // origLength is untrusted; the buffer grows with the actual output
    let reserve = bytes
        .len()
        .saturating_mul(MAX_RESERVE_RATIO)
        .min(orig_length as usize);
    let mut table = Vec::with_capacity(reserve);
    ZlibDecoder::new(bytes)
        .take(orig_length as u64 + 1)
        .read_to_end(&mut table)
        .map_err(|e| ParseError::Decompression {
            container: "WOFF",
            reason: format!("'{tag}': {e}"),
        })?;
    if table.len() != orig_length as usize {
        return Err(ParseError::Decompression {
            container: "WOFF",
            reason: format!(
                "'{tag}': expected {orig_length} bytes, inflated to {}",
                table.len()
            ),
        });
    }
    Ok(table)
}

/// Pack an sfnt as WOFF, compressing each table when that makes it smaller.
pub(crate) fn encode(font: &FontRef) -> Result<Vec<u8>, Error> {
    let records = font.table_directory.table_records();
    let num_tables = records.len();

    let mut tables = Vec::with_capacity(num_tables);
    for record in records {
        let tag = record.tag();
        let orig = font
            .table_data(tag)
            .ok_or_else(|| Error::conversion(Flavor::Woff, format!("'{tag}' is out of bounds")))?
            .as_bytes();
        let compressed = deflate(orig).map_err(|e| Error::conversion(Flavor::Woff, e))?;
        let stored = if compressed.len() < orig.len() {
            compressed
        } else {
            orig.to_vec()
        };
        tables.push((record, orig.len(), stored));
    }

    let (major_version, minor_version) = font
        .table_data(Head::TAG)
        .and_then(|head| Some((head.read_at::<u16>(4).ok()?, head.read_at::<u16>(6).ok()?)))
        .unwrap_or_default();
    let total_sfnt_size = SFNT_HEADER_LEN
        + SFNT_TABLE_RECORD_LEN * num_tables
        + tables.iter().map(|(_, len, _)| round4(*len)).sum::<usize>();
    let data_start = HEADER_LEN + TABLE_DIRECTORY_ENTRY_LEN * num_tables;
    let length = data_start + tables.iter().map(|(_, _, s)| round4(s.len())).sum::<usize>();

    let mut out = Vec::with_capacity(length);
    out.extend_from_slice(&WOFF_SIGNATURE.to_be_bytes());
    out.extend_from_slice(&font.table_directory.sfnt_version().to_be_bytes());
    out.extend_from_slice(&(length as u32).to_be_bytes());
    out.extend_from_slice(&(num_tables as u16).to_be_bytes());
    out.extend_from_slice(&0u16.to_be_bytes());
    out.extend_from_slice(&(total_sfnt_size as u32).to_be_bytes());
    out.extend_from_slice(&major_version.to_be_bytes());
    out.extend_from_slice(&minor_version.to_be_bytes());
    // no metadata or private block
    out.extend_from_slice(&[0; 20]);

    let mut offset = data_start;
    for (record, orig_length, stored) in &tables {
        out.extend_from_slice(&record.tag().to_be_bytes());
        out.extend_from_slice(&(offset as u32).to_be_bytes());
        out.extend_from_slice(&(stored.len() as u32).to_be_bytes());
        out.extend_from_slice(&(*orig_length as u32).to_be_bytes());
        out.extend_from_slice(&record.checksum().to_be_bytes());
        offset += round4(stored.len());
    }
    for (_, _, stored) in &tables {
        out.extend_from_slice(stored);
        out.resize(round4(out.len()), 0);
    }
    debug_assert_eq!(out.len(), length);
    Ok(out)
}

fn deflate(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(data)?;
    encoder.finish()
}
