//! The vertical extent of all drawn glyphs.

use read_fonts::{
    tables::{
        glyf::{Anchor, CompositeGlyph, CompositeGlyphFlags, Glyf, Glyph, SimpleGlyph},
        loca::Loca,
    },
    FontRead, FontRef, ReadError, TableProvider, TopLevelTable,
};

use crate::{document::require, Error, ParseError};

/// Maximum depth of nested composite glyphs.
///
/// Deeper structures (including cycles) are rejected instead of followed.
pub const COMPOSITE_RECURSION_LIMIT: usize = 32;

/// Maximum number of components visited while resolving one glyph.
pub const MAX_COMPONENTS_PER_GLYPH: usize = 1024;

/// The smallest vertical interval covering every drawn glyph, in font units.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct BoundingBox {
    pub y_min: i32,
    pub y_max: i32,
}

impl BoundingBox {
    /// The `usWinAscent` this box calls for.
    pub fn win_ascent(&self) -> u16 {
        self.y_max.clamp(0, u16::MAX as i32) as u16
    }

    /// The `usWinDescent` this box calls for; a positive distance below the baseline.
    pub fn win_descent(&self) -> u16 {
        self.y_min.saturating_neg().clamp(0, u16::MAX as i32) as u16
    }

    fn include(bbox: &mut Option<BoundingBox>, y: i32) {
        let bbox = bbox.get_or_insert(BoundingBox { y_min: y, y_max: y });
        bbox.y_min = bbox.y_min.min(y);
        bbox.y_max = bbox.y_max.max(y);
    }
}

/// Compute the vertical extent of all glyphs that have contours.
///
/// Glyphs with no outline data, or whose header declares zero contours, do
/// not contribute even if they store a bounding box. Composite glyphs are
/// measured by resolving their components, so stored composite boxes are
/// never trusted.
///
/// Fonts without a `glyf` table (CFF outlines) report
/// [`Error::DegenerateGlyphSet`], as do fonts where nothing is drawn.
pub fn extract_bounding_box(font: &FontRef) -> Result<BoundingBox, Error> {
    let Some(glyf_data) = font.table_data(Glyf::TAG) else {
        log::warn!("no 'glyf' table, outlines cannot be measured");
        return Err(Error::DegenerateGlyphSet);
    };
    let glyf = Glyf::read(glyf_data)?;
    let head = require(font.head())?;
    let num_glyphs = require(font.maxp())?.num_glyphs();
    let loca_data = require(font.expect_data_for_tag(Loca::TAG))?;
    let loca = Loca::read(loca_data, head.index_to_loc_format() == 1)?;
    // `len` counts glyphs, one less than the number of offsets
    if loca.len() < num_glyphs as usize {
        return Err(ParseError::malformed("loca", "fewer offsets than glyphs").into());
    }

    let outlines = Outlines { glyf, loca };
    let mut points = Vec::new();
    let mut bbox = None;
    let mut drawn = 0usize;
    for gid in 0..num_glyphs as u32 {
        let Some(glyph) = outlines.get(gid)? else {
            continue;
        };
        points.clear();
        let mut budget = MAX_COMPONENTS_PER_GLYPH;
        outlines.load(&glyph, gid, 0, &mut budget, &mut points)?;
        if points.is_empty() {
            continue;
        }
        drawn += 1;
        for point in &points {
            BoundingBox::include(&mut bbox, point.y.round() as i32);
        }
    }

    let bbox = bbox.ok_or(Error::DegenerateGlyphSet)?;
    log::debug!(
        "{drawn} of {num_glyphs} glyphs drawn, yMin {} yMax {}",
        bbox.y_min,
        bbox.y_max
    );
    Ok(bbox)
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct Point {
    x: f32,
    y: f32,
}

struct Outlines<'a> {
    glyf: Glyf<'a>,
    loca: Loca<'a>,
}

impl<'a> Outlines<'a> {
    /// The outline for `gid`, or `None` if it has no contours.
    fn get(&self, gid: u32) -> Result<Option<Glyph<'a>>, Error> {
        let idx = gid as usize;
        let start = self.loca.get_raw(idx).ok_or(ReadError::OutOfBounds)? as usize;
        let end = self.loca.get_raw(idx + 1).ok_or(ReadError::OutOfBounds)? as usize;
        if start == end {
            return Ok(None);
        }
        let data = self
            .glyf
            .offset_data()
            .slice(start..end)
            .ok_or(ReadError::OutOfBounds)?;
        // a zero contour header may still carry a stale bounding box
        if data.read_at::<i16>(0)? == 0 {
            return Ok(None);
        }
        Ok(Some(Glyph::read(data)?))
    }

    /// Append the points of `glyph`, in its own coordinate space, to `points`.
    fn load(
        &self,
        glyph: &Glyph<'a>,
        gid: u32,
        depth: usize,
        budget: &mut usize,
        points: &mut Vec<Point>,
    ) -> Result<(), Error> {
        if depth > COMPOSITE_RECURSION_LIMIT {
            return Err(ParseError::RecursionLimitExceeded(gid).into());
        }
        match glyph {
            Glyph::Simple(simple) => load_simple(simple, gid, points),
            Glyph::Composite(composite) => {
                self.load_composite(composite, gid, depth, budget, points)
            }
        }
    }

    fn load_composite(
        &self,
        glyph: &CompositeGlyph<'a>,
        gid: u32,
        depth: usize,
        budget: &mut usize,
        points: &mut Vec<Point>,
    ) -> Result<(), Error> {
        let point_base = points.len();
        for component in glyph.components() {
            *budget = budget
                .checked_sub(1)
                .ok_or(ParseError::ComponentLimitExceeded(gid))?;
            let component_gid = component.glyph.to_u32();
            let start = points.len();
            if let Some(child) = self.get(component_gid)? {
                self.load(&child, component_gid, depth + 1, budget, points)?;
            }

            let have_xform = component.flags.intersects(
                CompositeGlyphFlags::WE_HAVE_A_SCALE
                    | CompositeGlyphFlags::WE_HAVE_AN_X_AND_Y_SCALE
                    | CompositeGlyphFlags::WE_HAVE_A_TWO_BY_TWO,
            );
            let transform = if have_xform {
                let xform = &component.transform;
                [xform.xx, xform.yx, xform.xy, xform.yy].map(|x| x.to_f32())
            } else {
                [1.0, 0.0, 0.0, 1.0]
            };
            // components are transformed before they are positioned
            if have_xform {
                for point in &mut points[start..] {
                    *point = map_point(transform, *point);
                }
            }

            let (dx, dy) = match component.anchor {
                Anchor::Offset { x, y } => {
                    let (mut x, mut y) = (x as f32, y as f32);
                    if have_xform
                        && component.flags
                            & (CompositeGlyphFlags::SCALED_COMPONENT_OFFSET
                                | CompositeGlyphFlags::UNSCALED_COMPONENT_OFFSET)
                            == CompositeGlyphFlags::SCALED_COMPONENT_OFFSET
                    {
                        x *= transform[0].hypot(transform[2]);
                        y *= transform[1].hypot(transform[3]);
                    }
                    (x, y)
                }
                Anchor::Point { base, component } => {
                    let base_idx = point_base + base as usize;
                    let base_point = points[..start].get(base_idx).ok_or(
                        ParseError::InvalidAnchorPoint {
                            glyph_id: gid,
                            point: base,
                        },
                    )?;
                    let component_point = points.get(start + component as usize).ok_or(
                        ParseError::InvalidAnchorPoint {
                            glyph_id: gid,
                            point: component,
                        },
                    )?;
                    (
                        base_point.x - component_point.x,
                        base_point.y - component_point.y,
                    )
                }
            };
            for point in &mut points[start..] {
                point.x += dx;
                point.y += dy;
            }
        }
        Ok(())
    }
}

fn load_simple(glyph: &SimpleGlyph, gid: u32, points: &mut Vec<Point>) -> Result<(), Error> {
    let start = points.len();
    points.extend(glyph.points().map(|point| Point {
        x: point.x as f32,
        y: point.y as f32,
    }));
    if points.len() - start != glyph.num_points() {
        return Err(ParseError::InvalidOutline(gid).into());
    }
    Ok(())
}

fn map_point(transform: [f32; 4], p: Point) -> Point {
    Point {
        x: transform[0] * p.x + transform[2] * p.y,
        y: transform[1] * p.x + transform[3] * p.y,
    }
}
