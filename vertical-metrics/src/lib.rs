//! Synchronize the vertical metrics of a font.
//!
//! Fonts often disagree with themselves about line height: the `hhea` line
//! metrics, the `OS/2` typographic metrics and the `OS/2` Windows metrics are
//! each consulted by different platforms. [`fix_vertical_metrics`] makes them
//! consistent:
//!
//! - the `OS/2` typographic ascender, descender and line gap are copied from
//!   `hhea`
//! - `usWinAscent` and `usWinDescent` are set to cover every drawn glyph
//! - the `USE_TYPO_METRICS` bit of `fsSelection` is set
//!
//! Everything else in the font is left alone. Input may be an uncompressed
//! sfnt, WOFF or WOFF2, and the result can be written as any of those.
//!
//! ```no_run
//! use vertical_metrics::{fix_vertical_metrics, Flavor};
//!
//! let input = std::fs::read("MyFont-Regular.ttf").unwrap();
//! let output = fix_vertical_metrics(&input, Flavor::Woff2).unwrap();
//! std::fs::write("MyFont-Regular-fixed.woff2", output).unwrap();
//! ```

mod bbox;
mod container;
mod document;
mod error;
mod metrics;
mod reader;
mod sfnt;
mod woff;
mod woff2;

#[cfg(test)]
mod testdata;

pub use bbox::{
    extract_bounding_box, BoundingBox, COMPOSITE_RECURSION_LIMIT, MAX_COMPONENTS_PER_GLYPH,
};
pub use container::Flavor;
pub use error::{Error, ParseError};
pub use metrics::{LineMetrics, Os2Metrics, USE_TYPO_METRICS};

use document::FontDocument;

/// What the transform read and wrote.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MetricsReport {
    /// The `hhea` line metrics that were copied
    pub line_metrics: LineMetrics,
    /// The extent of all drawn glyphs
    pub bbox: BoundingBox,
    /// `OS/2` metrics of the input
    pub before: Os2Metrics,
    /// `OS/2` metrics of the output
    pub after: Os2Metrics,
    /// The container the input arrived in
    pub input_flavor: Flavor,
    /// The container that was written
    pub output_flavor: Flavor,
}

/// Synchronize the vertical metrics of `input` and write it as `flavor`.
///
/// Either the complete output is returned or exactly one error; see
/// [`fix_vertical_metrics_with_report`] for the values involved.
pub fn fix_vertical_metrics(input: &[u8], flavor: Flavor) -> Result<Vec<u8>, Error> {
    fix_vertical_metrics_with_report(input, flavor).map(|(output, _)| output)
}

/// Like [`fix_vertical_metrics`], also reporting the metrics before and after.
pub fn fix_vertical_metrics_with_report(
    input: &[u8],
    flavor: Flavor,
) -> Result<(Vec<u8>, MetricsReport), Error> {
    let decoded = container::decode(input)?;
    let mut document = FontDocument::new(&decoded.sfnt)?;

    // check everything before changing anything
    let line_metrics = LineMetrics::read(document.font())?;
    let before = Os2Metrics::read(document.font())?;
    let bbox = extract_bounding_box(document.font())?;
    log::debug!("hhea {line_metrics:?}, glyph bounds {bbox:?}");

    let after = metrics::synchronize(&mut document, line_metrics, bbox)?;
    let output = container::encode(document.to_sfnt(), flavor)?;
    log::info!(
        "typo {}/{}/{} win {}/{} fsSelection 0x{:04X} -> 0x{:04X}, {} bytes of {flavor}",
        after.typo_ascender,
        after.typo_descender,
        after.typo_line_gap,
        after.win_ascent,
        after.win_descent,
        before.fs_selection,
        after.fs_selection,
        output.len(),
    );
    let report = MetricsReport {
        line_metrics,
        bbox,
        before,
        after,
        input_flavor: decoded.flavor,
        output_flavor: flavor,
    };
    Ok((output, report))
}
