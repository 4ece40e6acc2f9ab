//! Reconstructing the [transformed glyf table].
//!
//! [transformed glyf table]: https://www.w3.org/TR/WOFF2/#glyf_table_format

use crate::{reader::Reader, sfnt::round4, ParseError};

const HEADER_LEN: usize = 36;

// simple glyph flags
const ON_CURVE_POINT: u8 = 0x01;
const X_SHORT_VECTOR: u8 = 0x02;
const Y_SHORT_VECTOR: u8 = 0x04;
const REPEAT_FLAG: u8 = 0x08;
const X_IS_SAME_OR_POSITIVE: u8 = 0x10;
const Y_IS_SAME_OR_POSITIVE: u8 = 0x20;
const OVERLAP_SIMPLE: u8 = 0x40;

// composite glyph flags
const ARG_1_AND_2_ARE_WORDS: u16 = 0x0001;
const WE_HAVE_A_SCALE: u16 = 0x0008;
const MORE_COMPONENTS: u16 = 0x0020;
const WE_HAVE_AN_X_AND_Y_SCALE: u16 = 0x0040;
const WE_HAVE_A_TWO_BY_TWO: u16 = 0x0080;
const WE_HAVE_INSTRUCTIONS: u16 = 0x0100;

const HAS_OVERLAP_SIMPLE_BITMAP: u16 = 0x0001;

/// The rebuilt `glyf` and `loca` tables.
#[derive(Debug)]
pub(crate) struct Reconstructed {
    pub(crate) glyf: Vec<u8>,
    pub(crate) loca: Vec<u8>,
    /// `xMin` of each glyph, for recovering omitted side bearings.
    pub(crate) x_mins: Vec<i16>,
}

fn malformed(reason: &'static str) -> ParseError {
    ParseError::malformed("WOFF2 glyf", reason)
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct Bbox {
    x_min: i16,
    y_min: i16,
    x_max: i16,
    y_max: i16,
}

impl Bbox {
    fn read(reader: &mut Reader) -> Result<Self, ParseError> {
        Ok(Self {
            x_min: reader.read_i16()?,
            y_min: reader.read_i16()?,
            x_max: reader.read_i16()?,
            y_max: reader.read_i16()?,
        })
    }

    fn of_points(points: &[Point]) -> Self {
        let mut points = points.iter();
        let Some(first) = points.next() else {
            return Bbox::default();
        };
        points.fold(
            Bbox {
                x_min: first.x,
                y_min: first.y,
                x_max: first.x,
                y_max: first.y,
            },
            |bbox, p| Bbox {
                x_min: bbox.x_min.min(p.x),
                y_min: bbox.y_min.min(p.y),
                x_max: bbox.x_max.max(p.x),
                y_max: bbox.y_max.max(p.y),
            },
        )
    }

    fn write(&self, out: &mut Vec<u8>) {
        for value in [self.x_min, self.y_min, self.x_max, self.y_max] {
            out.extend_from_slice(&value.to_be_bytes());
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Point {
    x: i16,
    y: i16,
    on_curve: bool,
}

/// The streams following the transformed table header.
struct Streams<'a> {
    n_contour: Reader<'a>,
    n_points: Reader<'a>,
    flags: Reader<'a>,
    glyphs: Reader<'a>,
    composites: Reader<'a>,
    bboxes: Reader<'a>,
    bbox_bitmap: &'a [u8],
    instructions: Reader<'a>,
    overlap_bitmap: Option<&'a [u8]>,
}

/// Rebuild `glyf` and `loca` from the transformed `glyf` data.
///
/// `index_to_loc_format` comes from `head` and must agree with the format
/// recorded in the transformed data.
pub(crate) fn reconstruct(data: &[u8], index_to_loc_format: i16) -> Result<Reconstructed, ParseError> {
    let mut header = Reader::new(data);
    let _reserved = header.read_u16()?;
    let option_flags = header.read_u16()?;
    let num_glyphs = header.read_u16()? as usize;
    let index_format = header.read_u16()?;
    if index_format as i16 != index_to_loc_format {
        return Err(malformed("indexFormat does not match head.indexToLocFormat"));
    }
    let mut sizes = [0usize; 7];
    for size in &mut sizes {
        *size = header.read_u32()? as usize;
    }
    debug_assert_eq!(header.position(), HEADER_LEN);

    let mut body = Reader::new(data.get(HEADER_LEN..).unwrap_or_default());
    let [n_contour, n_points, flags, glyphs, composites, bboxes, instructions] =
        sizes.map(|size| body.read_bytes(size).map(Reader::new));
    let mut bboxes = bboxes?;
    let bbox_bitmap = bboxes.read_bytes(4 * num_glyphs.div_ceil(32))?;
    let overlap_bitmap = if option_flags & HAS_OVERLAP_SIMPLE_BITMAP != 0 {
        Some(body.read_bytes(num_glyphs.div_ceil(8))?)
    } else {
        None
    };
    let mut streams = Streams {
        n_contour: n_contour?,
        n_points: n_points?,
        flags: flags?,
        glyphs: glyphs?,
        composites: composites?,
        bboxes,
        bbox_bitmap,
        instructions: instructions?,
        overlap_bitmap,
    };

    let mut glyf = Vec::new();
    let mut offsets = Vec::with_capacity(num_glyphs + 1);
    let mut x_mins = Vec::with_capacity(num_glyphs);
    offsets.push(0);
    let mut points = Vec::new();
    for gid in 0..num_glyphs {
        let n_contours = streams.n_contour.read_i16()?;
        let has_bbox = bit_is_set(streams.bbox_bitmap, gid);
        let x_min = match n_contours {
            0 if has_bbox => return Err(malformed("empty glyph has a bounding box")),
            0 => 0,
            -1 if !has_bbox => return Err(malformed("composite glyph without a bounding box")),
            -1 => streams.composite(&mut glyf)?,
            n if n > 0 => {
                let overlap = streams
                    .overlap_bitmap
                    .is_some_and(|bitmap| bit_is_set(bitmap, gid));
                streams.simple(n as u16, has_bbox, overlap, &mut points, &mut glyf)?
            }
            _ => return Err(malformed("invalid contour count")),
        };
        x_mins.push(x_min);
        glyf.resize(round4(glyf.len()), 0);
        offsets.push(glyf.len());
    }

    let loca = write_loca(&offsets, index_format)?;
    log::debug!(
        "reconstructed {num_glyphs} glyphs, glyf {} bytes, loca {} bytes",
        glyf.len(),
        loca.len()
    );
    Ok(Reconstructed { glyf, loca, x_mins })
}

fn bit_is_set(bitmap: &[u8], index: usize) -> bool {
    bitmap
        .get(index >> 3)
        .is_some_and(|byte| byte & (0x80 >> (index & 7)) != 0)
}

fn write_loca(offsets: &[usize], index_format: u16) -> Result<Vec<u8>, ParseError> {
    let mut loca = Vec::new();
    match index_format {
        0 => {
            for offset in offsets {
                let short = u16::try_from(offset / 2)
                    .map_err(|_| malformed("glyph data too large for a short loca"))?;
                loca.extend_from_slice(&short.to_be_bytes());
            }
        }
        1 => {
            for offset in offsets {
                let long = u32::try_from(*offset)
                    .map_err(|_| malformed("glyph data too large for a long loca"))?;
                loca.extend_from_slice(&long.to_be_bytes());
            }
        }
        _ => return Err(malformed("unknown indexFormat")),
    }
    Ok(loca)
}

impl Streams<'_> {
    /// Copy a composite glyph to `out`, returning its `xMin`.
    fn composite(&mut self, out: &mut Vec<u8>) -> Result<i16, ParseError> {
        let bbox = Bbox::read(&mut self.bboxes)?;

        // find the extent of the component records
        let mut scan = self.composites.clone();
        let mut have_instructions = false;
        loop {
            let flags = scan.read_u16()?;
            let _glyph = scan.read_u16()?;
            let mut len = if flags & ARG_1_AND_2_ARE_WORDS != 0 { 4 } else { 2 };
            if flags & WE_HAVE_A_SCALE != 0 {
                len += 2;
            } else if flags & WE_HAVE_AN_X_AND_Y_SCALE != 0 {
                len += 4;
            } else if flags & WE_HAVE_A_TWO_BY_TWO != 0 {
                len += 8;
            }
            scan.read_bytes(len)?;
            have_instructions |= flags & WE_HAVE_INSTRUCTIONS != 0;
            if flags & MORE_COMPONENTS == 0 {
                break;
            }
        }
        let components_len = scan.position() - self.composites.position();
        let components = self.composites.read_bytes(components_len)?;

        out.extend_from_slice(&(-1i16).to_be_bytes());
        bbox.write(out);
        out.extend_from_slice(components);
        if have_instructions {
            let len = self.glyphs.read_255_u16()?;
            let instructions = self.instructions.read_bytes(len as usize)?;
            out.extend_from_slice(&len.to_be_bytes());
            out.extend_from_slice(instructions);
        }
        Ok(bbox.x_min)
    }

    /// Decode a simple glyph to `out`, returning its `xMin`.
    fn simple(
        &mut self,
        n_contours: u16,
        has_bbox: bool,
        overlap: bool,
        points: &mut Vec<Point>,
        out: &mut Vec<u8>,
    ) -> Result<i16, ParseError> {
        let mut end_points = Vec::with_capacity(n_contours as usize);
        let mut total = 0u16;
        for _ in 0..n_contours {
            let n = self.n_points.read_255_u16()?;
            total = total
                .checked_add(n)
                .filter(|total| *total > 0)
                .ok_or(malformed("invalid contour point count"))?;
            end_points.push(total - 1);
        }

        points.clear();
        let (mut x, mut y) = (0i32, 0i32);
        for _ in 0..total {
            let flag = self.flags.read_u8()?;
            let (dx, dy) = decode_triplet(flag & 0x7F, &mut self.glyphs)?;
            x += dx;
            y += dy;
            points.push(Point {
                x: i16::try_from(x).map_err(|_| malformed("coordinate out of range"))?,
                y: i16::try_from(y).map_err(|_| malformed("coordinate out of range"))?,
                on_curve: flag & 0x80 == 0,
            });
        }
        let instruction_len = self.glyphs.read_255_u16()?;
        let instructions = self.instructions.read_bytes(instruction_len as usize)?;
        let bbox = if has_bbox {
            Bbox::read(&mut self.bboxes)?
        } else {
            Bbox::of_points(points)
        };

        out.extend_from_slice(&n_contours.to_be_bytes());
        bbox.write(out);
        for end in end_points {
            out.extend_from_slice(&end.to_be_bytes());
        }
        out.extend_from_slice(&instruction_len.to_be_bytes());
        out.extend_from_slice(instructions);
        write_points(points, overlap, out);
        Ok(bbox.x_min)
    }
}

/// Decode one [triplet] coordinate delta.
///
/// [triplet]: https://www.w3.org/TR/WOFF2/#triplet_decoding
fn decode_triplet(flag: u8, glyphs: &mut Reader) -> Result<(i32, i32), ParseError> {
    fn with_sign(flag: u8, value: i32) -> i32 {
        if flag & 1 != 0 {
            value
        } else {
            -value
        }
    }

    let flag_i = flag as i32;
    let delta = if flag < 10 {
        let b0 = glyphs.read_u8()? as i32;
        (0, with_sign(flag, ((flag_i & 14) << 7) + b0))
    } else if flag < 20 {
        let b0 = glyphs.read_u8()? as i32;
        (with_sign(flag, (((flag_i - 10) & 14) << 7) + b0), 0)
    } else if flag < 84 {
        let b0 = flag_i - 20;
        let b1 = glyphs.read_u8()? as i32;
        (
            with_sign(flag, 1 + (b0 & 0x30) + (b1 >> 4)),
            with_sign(flag >> 1, 1 + ((b0 & 0x0C) << 2) + (b1 & 0x0F)),
        )
    } else if flag < 120 {
        let b0 = flag_i - 84;
        let b1 = glyphs.read_u8()? as i32;
        let b2 = glyphs.read_u8()? as i32;
        (
            with_sign(flag, 1 + ((b0 / 12) << 8) + b1),
            with_sign(flag >> 1, 1 + (((b0 % 12) >> 2) << 8) + b2),
        )
    } else if flag < 124 {
        let b1 = glyphs.read_u8()? as i32;
        let b2 = glyphs.read_u8()? as i32;
        let b3 = glyphs.read_u8()? as i32;
        (
            with_sign(flag, (b1 << 4) + (b2 >> 4)),
            with_sign(flag >> 1, ((b2 & 0x0F) << 8) + b3),
        )
    } else {
        let b1 = glyphs.read_u8()? as i32;
        let b2 = glyphs.read_u8()? as i32;
        let b3 = glyphs.read_u8()? as i32;
        let b4 = glyphs.read_u8()? as i32;
        (
            with_sign(flag, (b1 << 8) + b2),
            with_sign(flag >> 1, (b3 << 8) + b4),
        )
    };
    Ok(delta)
}

/// Write the flags and coordinates of a simple glyph in their compact form.
fn write_points(points: &[Point], overlap: bool, out: &mut Vec<u8>) {
    let mut flags = Vec::with_capacity(points.len());
    let mut xs = Vec::new();
    let mut ys = Vec::new();
    let mut last_flag = None;
    let mut repeat = 0u8;
    let (mut last_x, mut last_y) = (0i16, 0i16);
    for (i, point) in points.iter().enumerate() {
        let mut flag = if point.on_curve { ON_CURVE_POINT } else { 0 };
        if overlap && i == 0 {
            flag |= OVERLAP_SIMPLE;
        }
        let dx = point.x as i32 - last_x as i32;
        let dy = point.y as i32 - last_y as i32;
        flag |= encode_delta(dx, X_SHORT_VECTOR, X_IS_SAME_OR_POSITIVE, &mut xs);
        flag |= encode_delta(dy, Y_SHORT_VECTOR, Y_IS_SAME_OR_POSITIVE, &mut ys);
        (last_x, last_y) = (point.x, point.y);

        if last_flag == Some(flag) && repeat != u8::MAX {
            if let Some(last) = flags.last_mut() {
                *last |= REPEAT_FLAG;
            }
            repeat += 1;
        } else {
            if repeat != 0 {
                flags.push(repeat);
            }
            flags.push(flag);
            repeat = 0;
        }
        last_flag = Some(flag);
    }
    if repeat != 0 {
        flags.push(repeat);
    }
    out.extend(flags);
    out.extend(xs);
    out.extend(ys);
}

fn encode_delta(delta: i32, short: u8, same_or_positive: u8, out: &mut Vec<u8>) -> u8 {
    if delta == 0 {
        same_or_positive
    } else if (-255..=255).contains(&delta) {
        out.push(delta.unsigned_abs() as u8);
        if delta > 0 {
            short | same_or_positive
        } else {
            short
        }
    } else {
        // points are i16, so deltas fit in 16 bits after wrapping
        out.extend_from_slice(&(delta as i16).to_be_bytes());
        0
    }
}
