//! Reconstructing the [transformed hmtx table].
//!
//! [transformed hmtx table]: https://www.w3.org/TR/WOFF2/#hmtx_table_format

use crate::{reader::Reader, ParseError};

const PROPORTIONAL_LSBS_OMITTED: u8 = 0x01;
const MONOSPACE_LSBS_OMITTED: u8 = 0x02;
const RESERVED: u8 = !(PROPORTIONAL_LSBS_OMITTED | MONOSPACE_LSBS_OMITTED);

fn malformed(reason: &'static str) -> ParseError {
    ParseError::malformed("WOFF2 hmtx", reason)
}

/// Rebuild `hmtx`, taking omitted left side bearings from `x_mins`.
pub(crate) fn reconstruct(
    data: &[u8],
    num_glyphs: u16,
    num_h_metrics: u16,
    x_mins: &[i16],
) -> Result<Vec<u8>, ParseError> {
    let mut reader = Reader::new(data);
    let flags = reader.read_u8()?;
    if flags & RESERVED != 0 {
        return Err(malformed("reserved flags are set"));
    }
    if flags == 0 {
        return Err(malformed("transform omits nothing"));
    }
    if num_h_metrics == 0 || num_h_metrics > num_glyphs {
        return Err(malformed("numberOfHMetrics out of range"));
    }
    if x_mins.len() < num_glyphs as usize {
        return Err(malformed("fewer glyphs than hmtx entries"));
    }

    let advances = (0..num_h_metrics)
        .map(|_| reader.read_u16())
        .collect::<Result<Vec<_>, _>>()?;
    let mut hmtx = Vec::with_capacity(num_h_metrics as usize * 4 + num_glyphs as usize * 2);
    // proportional side bearings precede the monospace ones
    for gid in 0..num_glyphs as usize {
        let omitted = match advances.get(gid) {
            Some(_) => flags & PROPORTIONAL_LSBS_OMITTED != 0,
            None => flags & MONOSPACE_LSBS_OMITTED != 0,
        };
        let lsb = if omitted {
            x_mins[gid]
        } else {
            reader.read_i16()?
        };
        if let Some(advance) = advances.get(gid) {
            hmtx.extend_from_slice(&advance.to_be_bytes());
        }
        hmtx.extend_from_slice(&lsb.to_be_bytes());
    }
    if reader.remaining() != 0 {
        log::debug!("{} trailing bytes in transformed hmtx", reader.remaining());
    }
    Ok(hmtx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proportional_lsbs_from_glyf() {
        let data = [
            0x01, // flags
            0x01, 0xF4, 0x02, 0x58, // advances 500, 600
            0xFF, 0xF6, // explicit lsb for the last glyph, -10
        ];
        let hmtx = reconstruct(&data, 3, 2, &[5, -20, 30]).unwrap();
        assert_eq!(
            hmtx,
            [0x01, 0xF4, 0x00, 0x05, 0x02, 0x58, 0xFF, 0xEC, 0xFF, 0xF6]
        );
    }

    #[test]
    fn all_lsbs_from_glyf() {
        let data = [0x03, 0x01, 0xF4];
        let hmtx = reconstruct(&data, 2, 1, &[7, 8]).unwrap();
        assert_eq!(hmtx, [0x01, 0xF4, 0x00, 0x07, 0x00, 0x08]);
    }

    #[test]
    fn monospace_only() {
        let data = [0x02, 0x01, 0xF4, 0x00, 0x01];
        let hmtx = reconstruct(&data, 2, 1, &[7, 8]).unwrap();
        assert_eq!(hmtx, [0x01, 0xF4, 0x00, 0x01, 0x00, 0x08]);
    }

    #[test]
    fn bad_flags() {
        assert!(reconstruct(&[0x04, 0x01, 0xF4], 1, 1, &[0]).is_err());
        assert!(reconstruct(&[0x00, 0x01, 0xF4, 0, 0], 1, 1, &[0]).is_err());
    }

    #[test]
    fn truncated() {
        assert!(reconstruct(&[0x02, 0x01], 1, 1, &[0]).is_err());
        assert!(reconstruct(&[0x02, 0x01, 0xF4], 2, 2, &[0, 0]).is_err());
    }
}
