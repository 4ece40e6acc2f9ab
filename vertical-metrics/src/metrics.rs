//! Reading the line metrics and rewriting the OS/2 vertical metrics.

use std::ops::Range;

use read_fonts::{
    tables::{hhea::Hhea, os2::Os2},
    FontRead, FontRef, ReadError, TableProvider, TopLevelTable,
};

use crate::{
    bbox::BoundingBox,
    document::{require, FontDocument},
    Error,
};

/// The `USE_TYPO_METRICS` bit of `OS/2.fsSelection`.
///
/// When set, applications should use the typographic metrics for line
/// layout instead of the Windows metrics.
pub const USE_TYPO_METRICS: u16 = 1 << 7;

/// The line metrics of the `hhea` table, in font units.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct LineMetrics {
    pub ascender: i16,
    pub descender: i16,
    pub line_gap: i16,
}

impl LineMetrics {
    pub fn read(font: &FontRef) -> Result<Self, Error> {
        let hhea = Hhea::read(require(font.expect_data_for_tag(Hhea::TAG))?)?;
        Ok(Self {
            ascender: hhea.ascender().to_i16(),
            descender: hhea.descender().to_i16(),
            line_gap: hhea.line_gap().to_i16(),
        })
    }
}

/// The vertical metric fields of the `OS/2` table.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Os2Metrics {
    pub typo_ascender: i16,
    pub typo_descender: i16,
    pub typo_line_gap: i16,
    pub win_ascent: u16,
    pub win_descent: u16,
    /// The raw selection flags, reserved bits included.
    pub fs_selection: u16,
}

impl Os2Metrics {
    pub fn read(font: &FontRef) -> Result<Self, Error> {
        let os2 = require(font.os2())?;
        Ok(Self::from_table(&os2)?)
    }

    fn from_table(os2: &Os2) -> Result<Self, ReadError> {
        let data = os2.offset_data();
        let shape = os2.shape();
        Ok(Self {
            typo_ascender: data.read_at(shape.s_typo_ascender_byte_range().start)?,
            typo_descender: data.read_at(shape.s_typo_descender_byte_range().start)?,
            typo_line_gap: data.read_at(shape.s_typo_line_gap_byte_range().start)?,
            win_ascent: data.read_at(shape.us_win_ascent_byte_range().start)?,
            win_descent: data.read_at(shape.us_win_descent_byte_range().start)?,
            fs_selection: data.read_at(shape.fs_selection_byte_range().start)?,
        })
    }

    pub fn uses_typo_metrics(&self) -> bool {
        self.fs_selection & USE_TYPO_METRICS != 0
    }
}

/// Rewrite the `OS/2` table of `document` so its vertical metrics agree.
///
/// The typographic metrics take the `hhea` line metrics, the Windows metrics
/// cover `bbox`, and `USE_TYPO_METRICS` is set. Every other byte of the
/// table, including reserved selection bits, is kept.
pub(crate) fn synchronize(
    document: &mut FontDocument,
    line: LineMetrics,
    bbox: BoundingBox,
) -> Result<Os2Metrics, Error> {
    let os2 = require(document.font().os2())?;
    let before = Os2Metrics::from_table(&os2)?;
    let after = Os2Metrics {
        typo_ascender: line.ascender,
        typo_descender: line.descender,
        typo_line_gap: line.line_gap,
        win_ascent: bbox.win_ascent(),
        win_descent: bbox.win_descent(),
        fs_selection: before.fs_selection | USE_TYPO_METRICS,
    };
    if line.line_gap < 0 {
        log::warn!("hhea.lineGap is negative ({}), copying it as is", line.line_gap);
    }
    if bbox.y_max > u16::MAX as i32 || -(bbox.y_min as i64) > u16::MAX as i64 {
        log::warn!(
            "glyph extents {}..{} do not fit the Windows metrics, clamping",
            bbox.y_min,
            bbox.y_max
        );
    }

    let shape = os2.shape();
    let mut data = os2.offset_data().as_bytes().to_vec();
    patch(
        &mut data,
        shape.s_typo_ascender_byte_range(),
        after.typo_ascender.to_be_bytes(),
    )?;
    patch(
        &mut data,
        shape.s_typo_descender_byte_range(),
        after.typo_descender.to_be_bytes(),
    )?;
    patch(
        &mut data,
        shape.s_typo_line_gap_byte_range(),
        after.typo_line_gap.to_be_bytes(),
    )?;
    patch(
        &mut data,
        shape.us_win_ascent_byte_range(),
        after.win_ascent.to_be_bytes(),
    )?;
    patch(
        &mut data,
        shape.us_win_descent_byte_range(),
        after.win_descent.to_be_bytes(),
    )?;
    patch(
        &mut data,
        shape.fs_selection_byte_range(),
        after.fs_selection.to_be_bytes(),
    )?;
    document.replace_table(Os2::TAG, data);
    Ok(after)
}

fn patch(data: &mut [u8], range: Range<usize>, bytes: [u8; 2]) -> Result<(), ReadError> {
    data.get_mut(range)
        .filter(|target| target.len() == bytes.len())
        .ok_or(ReadError::OutOfBounds)?
        .copy_from_slice(&bytes);
    Ok(())
}
