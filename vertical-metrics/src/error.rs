//! Errors returned by the metrics transform

use read_fonts::{types::Tag, ReadError};
use thiserror::Error;

use crate::Flavor;

/// An error that occurred while fixing a font's vertical metrics.
///
/// The variant alone tells a caller whether the input was bad ([`Parse`],
/// [`MissingTable`], [`DegenerateGlyphSet`]), the request was bad
/// ([`UnsupportedFlavor`]) or the output could not be produced
/// ([`Conversion`]).
///
/// [`Parse`]: Error::Parse
/// [`MissingTable`]: Error::MissingTable
/// [`DegenerateGlyphSet`]: Error::DegenerateGlyphSet
/// [`UnsupportedFlavor`]: Error::UnsupportedFlavor
/// [`Conversion`]: Error::Conversion
#[derive(Debug, Error)]
pub enum Error {
    #[error("Failed to parse font: {0}")]
    Parse(#[from] ParseError),

    #[error("Font does not contain a '{0}' table")]
    MissingTable(Tag),

    #[error("Font has no glyphs with contours")]
    DegenerateGlyphSet,

    #[error("Unsupported output flavor '{0}', expected one of ttf, woff or woff2")]
    UnsupportedFlavor(String),

    #[error("Failed to write {flavor} output: {reason}")]
    Conversion { flavor: Flavor, reason: String },
}

/// The input could not be understood as a font.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("unrecognized container signature 0x{0:08X}")]
    UnknownSignature(u32),

    #[error("font collections are not supported")]
    Collection,

    #[error("error reading font data: {0}")]
    Read(ReadError),

    #[error("table '{0}' lies outside the font data")]
    TableOutOfBounds(Tag),

    #[error("malformed {container} data: {reason}")]
    Malformed {
        container: &'static str,
        reason: &'static str,
    },

    #[error("unsupported transform version {version} for table '{tag}'")]
    UnsupportedTransform { tag: Tag, version: u8 },

    #[error("decompressing {container} data failed: {reason}")]
    Decompression {
        container: &'static str,
        reason: String,
    },

    #[error("glyph {0} exceeds the composite nesting limit")]
    RecursionLimitExceeded(u32),

    #[error("glyph {0} references too many components")]
    ComponentLimitExceeded(u32),

    #[error("glyph {glyph_id} has an invalid anchor point {point}")]
    InvalidAnchorPoint { glyph_id: u32, point: u16 },

    #[error("glyph {0} has malformed outline data")]
    InvalidOutline(u32),
}

impl ParseError {
    pub(crate) fn malformed(container: &'static str, reason: &'static str) -> Self {
        ParseError::Malformed { container, reason }
    }
}

impl From<ReadError> for ParseError {
    fn from(src: ReadError) -> ParseError {
        ParseError::Read(src)
    }
}

impl From<ReadError> for Error {
    fn from(src: ReadError) -> Error {
        Error::Parse(ParseError::Read(src))
    }
}

impl Error {
    pub(crate) fn conversion(flavor: Flavor, reason: impl ToString) -> Self {
        Error::Conversion {
            flavor,
            reason: reason.to_string(),
        }
    }
}
