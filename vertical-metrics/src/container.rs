//! Detecting, decoding and encoding the outer font container.

use std::{borrow::Cow, fmt::Display, str::FromStr};

use read_fonts::FontRef;

use crate::{woff, woff2, Error, ParseError};

pub(crate) const TRUETYPE_SFNT_VERSION: u32 = 0x0001_0000;
pub(crate) const CFF_SFNT_VERSION: u32 = u32::from_be_bytes(*b"OTTO");
pub(crate) const APPLE_SFNT_VERSION: u32 = u32::from_be_bytes(*b"true");
pub(crate) const TTC_SIGNATURE: u32 = u32::from_be_bytes(*b"ttcf");
pub(crate) const WOFF_SIGNATURE: u32 = u32::from_be_bytes(*b"wOFF");
pub(crate) const WOFF2_SIGNATURE: u32 = u32::from_be_bytes(*b"wOF2");

/// The outer serialization of a font file.
///
/// The tables inside are the same for every flavor; only the framing
/// around them (and whether they are compressed) differs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Flavor {
    /// An uncompressed sfnt (`.ttf` or `.otf`)
    Raw,
    /// [WOFF 1.0](https://www.w3.org/TR/WOFF/), zlib compressed tables
    Woff,
    /// [WOFF 2.0](https://www.w3.org/TR/WOFF2/), brotli compressed tables
    Woff2,
}

impl Flavor {
    /// Identify the container of `data` from its signature.
    ///
    /// The file extension plays no part; font collections and unknown data
    /// return `None`.
    pub fn sniff(data: &[u8]) -> Option<Flavor> {
        let signature = data.get(..4)?;
        match u32::from_be_bytes(signature.try_into().ok()?) {
            TRUETYPE_SFNT_VERSION | CFF_SFNT_VERSION | APPLE_SFNT_VERSION => Some(Flavor::Raw),
            WOFF_SIGNATURE => Some(Flavor::Woff),
            WOFF2_SIGNATURE => Some(Flavor::Woff2),
            _ => None,
        }
    }

    /// The conventional file extension for this flavor.
    pub fn extension(self) -> &'static str {
        match self {
            Flavor::Raw => "ttf",
            Flavor::Woff => "woff",
            Flavor::Woff2 => "woff2",
        }
    }
}

impl FromStr for Flavor {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ttf" | "otf" | "sfnt" | "raw" => Ok(Flavor::Raw),
            "woff" => Ok(Flavor::Woff),
            "woff2" => Ok(Flavor::Woff2),
            _ => Err(Error::UnsupportedFlavor(s.to_string())),
        }
    }
}

impl Display for Flavor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Flavor::Raw => write!(f, "sfnt"),
            Flavor::Woff => write!(f, "WOFF"),
            Flavor::Woff2 => write!(f, "WOFF2"),
        }
    }
}

/// An sfnt recovered from the input, along with the container it came in.
pub(crate) struct Decoded<'a> {
    pub(crate) flavor: Flavor,
    pub(crate) sfnt: Cow<'a, [u8]>,
}

/// Unwrap `data` into a plain sfnt, decompressing if needed.
pub(crate) fn decode(data: &[u8]) -> Result<Decoded<'_>, Error> {
    let signature = data
        .get(..4)
        .map(|bytes| u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
        .ok_or(ParseError::malformed("font", "shorter than a signature"))?;
    let decoded = match signature {
        TRUETYPE_SFNT_VERSION | CFF_SFNT_VERSION | APPLE_SFNT_VERSION => Decoded {
            flavor: Flavor::Raw,
            sfnt: Cow::Borrowed(data),
        },
        WOFF_SIGNATURE => Decoded {
            flavor: Flavor::Woff,
            sfnt: Cow::Owned(woff::decode(data)?),
        },
        WOFF2_SIGNATURE => Decoded {
            flavor: Flavor::Woff2,
            sfnt: Cow::Owned(woff2::decode(data)?),
        },
        TTC_SIGNATURE => return Err(ParseError::Collection.into()),
        other => return Err(ParseError::UnknownSignature(other).into()),
    };
    log::debug!(
        "decoded {} container, {} sfnt bytes",
        decoded.flavor,
        decoded.sfnt.len()
    );
    Ok(decoded)
}

/// Wrap a finished sfnt in the requested container.
pub(crate) fn encode(sfnt: Vec<u8>, flavor: Flavor) -> Result<Vec<u8>, Error> {
    let encode: fn(&FontRef) -> Result<Vec<u8>, Error> = match flavor {
        Flavor::Raw => return Ok(sfnt),
        Flavor::Woff => woff::encode,
        Flavor::Woff2 => woff2::encode,
    };
    let font = FontRef::new(&sfnt).map_err(|e| Error::conversion(flavor, e))?;
    encode(&font)
}
