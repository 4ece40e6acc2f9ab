//! A parsed font with a set of pending table replacements.

use std::collections::BTreeMap;

use read_fonts::{types::Tag, FontRef, ReadError};

use crate::{sfnt::SfntBuilder, Error, ParseError};

/// Map a missing table to [`Error::MissingTable`] and anything else to a parse error.
pub(crate) fn require<T>(result: Result<T, ReadError>) -> Result<T, Error> {
    result.map_err(|e| match e {
        ReadError::TableIsMissing(tag) => Error::MissingTable(tag),
        other => other.into(),
    })
}

/// The working copy of a font.
///
/// Tables are read from the source bytes until they are replaced; writing
/// the document back out keeps every untouched table byte for byte.
pub(crate) struct FontDocument<'a> {
    font: FontRef<'a>,
    replaced: BTreeMap<Tag, Vec<u8>>,
}

impl<'a> FontDocument<'a> {
    /// Parse `sfnt`, checking that every table record points at real data.
    pub(crate) fn new(sfnt: &'a [u8]) -> Result<Self, Error> {
        let font = FontRef::new(sfnt)?;
        for record in font.table_directory.table_records() {
            let tag = record.tag();
            if font.table_data(tag).is_none() {
                return Err(ParseError::TableOutOfBounds(tag).into());
            }
        }
        Ok(Self {
            font,
            replaced: BTreeMap::new(),
        })
    }

    /// The font as it was parsed, without replacements.
    pub(crate) fn font(&self) -> &FontRef<'a> {
        &self.font
    }

    pub(crate) fn replace_table(&mut self, tag: Tag, data: Vec<u8>) {
        log::debug!("replacing '{tag}' ({} bytes)", data.len());
        self.replaced.insert(tag, data);
    }

    /// Serialize to an uncompressed sfnt with the source's sfnt version.
    ///
    /// Every source table is kept, since all of them were checked by [`FontDocument::new`].
    pub(crate) fn to_sfnt(&self) -> Vec<u8> {
        let mut builder = SfntBuilder::new(self.font.table_directory.sfnt_version());
        for (tag, data) in &self.replaced {
            builder.add_raw(*tag, data.as_slice());
        }
        builder.copy_missing_tables(&self.font).build()
    }
}
