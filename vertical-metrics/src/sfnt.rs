//! Assembling tables into an uncompressed sfnt.

use std::{borrow::Cow, collections::BTreeMap};

use read_fonts::{
    tables::{compute_checksum, head::Head},
    types::Tag,
    FontRef, TopLevelTable,
};

const HEADER_LEN: usize = 12;
const TABLE_RECORD_LEN: usize = 16;
/// Offset of `checksumAdjustment` in the `head` table.
const CHECKSUM_ADJUSTMENT_OFFSET: usize = 8;
const CHECKSUM_MAGIC: u32 = 0xB1B0_AFBA;

/// Build an sfnt from a set of tables.
///
/// Unlike a general purpose font builder this preserves the sfnt version of
/// the source, so CFF flavored fonts stay `OTTO`.
#[derive(Debug, Clone)]
pub(crate) struct SfntBuilder<'a> {
    sfnt_version: u32,
    tables: BTreeMap<Tag, Cow<'a, [u8]>>,
}

impl<'a> SfntBuilder<'a> {
    pub(crate) fn new(sfnt_version: u32) -> Self {
        Self {
            sfnt_version,
            tables: BTreeMap::new(),
        }
    }

    pub(crate) fn add_raw(&mut self, tag: Tag, data: impl Into<Cow<'a, [u8]>>) -> &mut Self {
        self.tables.insert(tag, data.into());
        self
    }

    /// Copy each table from the source font if it does not already exist
    ///
    /// Records that point outside the font are skipped; callers that must
    /// keep every table validate the records first.
    pub(crate) fn copy_missing_tables(&mut self, font: &FontRef<'a>) -> &mut Self {
        for record in font.table_directory.table_records() {
            let tag = record.tag();
            if self.tables.contains_key(&tag) {
                continue;
            }
            if let Some(data) = font.table_data(tag) {
                self.add_raw(tag, data.as_bytes());
            } else {
                log::warn!("data for '{tag}' is malformed, dropping it");
            }
        }
        self
    }

    /// Assemble the tables with a [table directory], sorted by tag.
    ///
    /// Per-table checksums and `head.checksumAdjustment` are recomputed.
    ///
    /// [table directory]: https://learn.microsoft.com/en-us/typography/opentype/spec/otff#table-directory
    pub(crate) fn build(&mut self) -> Vec<u8> {
        if let Some(head) = self.tables.get_mut(&Head::TAG) {
            let adjustment = CHECKSUM_ADJUSTMENT_OFFSET..CHECKSUM_ADJUSTMENT_OFFSET + 4;
            if let Some(bytes) = head.to_mut().get_mut(adjustment) {
                bytes.fill(0);
            }
        }

        let num_tables = self.tables.len();
        let SearchRange {
            search_range,
            entry_selector,
            range_shift,
        } = SearchRange::compute(num_tables, TABLE_RECORD_LEN);

        let mut data = Vec::with_capacity(
            HEADER_LEN
                + num_tables * TABLE_RECORD_LEN
                + self.tables.values().map(|t| round4(t.len())).sum::<usize>(),
        );
        data.extend_from_slice(&self.sfnt_version.to_be_bytes());
        data.extend_from_slice(&(num_tables as u16).to_be_bytes());
        data.extend_from_slice(&search_range.to_be_bytes());
        data.extend_from_slice(&entry_selector.to_be_bytes());
        data.extend_from_slice(&range_shift.to_be_bytes());

        let mut position = HEADER_LEN + num_tables * TABLE_RECORD_LEN;
        let mut head_offset = None;
        for (tag, table) in &self.tables {
            if *tag == Head::TAG {
                head_offset = Some(position);
            }
            data.extend_from_slice(&tag.to_be_bytes());
            data.extend_from_slice(&compute_checksum(table).to_be_bytes());
            data.extend_from_slice(&(position as u32).to_be_bytes());
            data.extend_from_slice(&(table.len() as u32).to_be_bytes());
            position += round4(table.len());
        }
        for table in self.tables.values() {
            data.extend_from_slice(table);
            data.resize(round4(data.len()), 0);
        }

        if let Some(offset) = head_offset {
            let adjustment = CHECKSUM_MAGIC.wrapping_sub(compute_checksum(&data));
            let start = offset + CHECKSUM_ADJUSTMENT_OFFSET;
            if let Some(bytes) = data.get_mut(start..start + 4) {
                bytes.copy_from_slice(&adjustment.to_be_bytes());
            }
        }
        data
    }
}

/// The binary search assists of an sfnt table directory.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct SearchRange {
    pub(crate) search_range: u16,
    pub(crate) entry_selector: u16,
    pub(crate) range_shift: u16,
}

impl SearchRange {
    pub(crate) fn compute(num_items: usize, item_size: usize) -> Self {
        let entry_selector = if num_items == 0 {
            0
        } else {
            num_items.ilog2() as usize
        };
        let search_range = (1usize << entry_selector) * item_size;
        let range_shift = (num_items * item_size).saturating_sub(search_range);
        SearchRange {
            search_range: search_range as u16,
            entry_selector: entry_selector as u16,
            range_shift: range_shift as u16,
        }
    }
}

pub(crate) fn round4(len: usize) -> usize {
    (len + 3) & !3
}
