//! Small synthetic fonts for tests, assembled byte by byte.

use std::collections::BTreeMap;

use read_fonts::{
    tables::{glyf::Glyf, head::Head, hhea::Hhea, hmtx::Hmtx, loca::Loca, maxp::Maxp, os2::Os2},
    types::Tag,
    TopLevelTable,
};

use crate::sfnt::SfntBuilder;

/// A big-endian byte buffer.
#[derive(Clone, Debug, Default)]
pub(crate) struct BeBuffer(Vec<u8>);

impl BeBuffer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn u8(mut self, value: u8) -> Self {
        self.0.push(value);
        self
    }

    pub(crate) fn u16(mut self, value: u16) -> Self {
        self.0.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub(crate) fn i16(mut self, value: i16) -> Self {
        self.0.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub(crate) fn u32(mut self, value: u32) -> Self {
        self.0.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub(crate) fn tag(self, tag: &[u8; 4]) -> Self {
        self.bytes(tag)
    }

    pub(crate) fn bytes(mut self, bytes: &[u8]) -> Self {
        self.0.extend_from_slice(bytes);
        self
    }

    pub(crate) fn into_inner(self) -> Vec<u8> {
        self.0
    }
}

pub(crate) fn head_table(index_to_loc_format: i16) -> Vec<u8> {
    BeBuffer::new()
        .u16(1)
        .u16(0)
        .u32(0x0002_8000) // fontRevision 2.5
        .u32(0) // checksumAdjustment
        .u32(0x5F0F_3CF5)
        .u16(0b1011) // flags
        .u16(1000) // unitsPerEm
        .bytes(&[0; 16]) // created, modified
        .i16(0)
        .i16(-250)
        .i16(600)
        .i16(900)
        .u16(0) // macStyle
        .u16(8) // lowestRecPPEM
        .i16(2)
        .i16(index_to_loc_format)
        .i16(0)
        .into_inner()
}

pub(crate) fn hhea_table(ascender: i16, descender: i16, line_gap: i16, num_metrics: u16) -> Vec<u8> {
    BeBuffer::new()
        .u32(0x0001_0000)
        .i16(ascender)
        .i16(descender)
        .i16(line_gap)
        .u16(600) // advanceWidthMax
        .i16(0)
        .i16(0)
        .i16(600)
        .i16(1) // caretSlopeRise
        .i16(0)
        .i16(0)
        .bytes(&[0; 8])
        .i16(0)
        .u16(num_metrics)
        .into_inner()
}

pub(crate) fn maxp_table(num_glyphs: u16) -> Vec<u8> {
    BeBuffer::new().u32(0x0000_5000).u16(num_glyphs).into_inner()
}

pub(crate) fn hmtx_table(num_glyphs: u16) -> Vec<u8> {
    (0..num_glyphs)
        .fold(BeBuffer::new(), |buf, _| buf.u16(500).i16(0))
        .into_inner()
}

/// The OS/2 fields the transform touches.
#[derive(Clone, Copy, Debug)]
pub(crate) struct TestOs2 {
    pub(crate) typo_ascender: i16,
    pub(crate) typo_descender: i16,
    pub(crate) typo_line_gap: i16,
    pub(crate) win_ascent: u16,
    pub(crate) win_descent: u16,
    pub(crate) fs_selection: u16,
}

impl Default for TestOs2 {
    fn default() -> Self {
        Self {
            typo_ascender: 700,
            typo_descender: -300,
            typo_line_gap: 100,
            win_ascent: 1100,
            win_descent: 400,
            // REGULAR
            fs_selection: 0x0040,
        }
    }
}

/// A version 4 OS/2 table.
pub(crate) fn os2_table(values: TestOs2) -> Vec<u8> {
    BeBuffer::new()
        .u16(4)
        .i16(500) // xAvgCharWidth
        .u16(400)
        .u16(5)
        .u16(0) // fsType
        .bytes(&[0x01; 20]) // sub/superscript, strikeout
        .i16(0) // sFamilyClass
        .bytes(&[2, 0, 5, 3, 0, 0, 0, 0, 0, 0]) // panose
        .bytes(&[0xA5; 16]) // ulUnicodeRange1-4
        .tag(b"TEST")
        .u16(values.fs_selection)
        .u16(0x20)
        .u16(0x7A)
        .i16(values.typo_ascender)
        .i16(values.typo_descender)
        .i16(values.typo_line_gap)
        .u16(values.win_ascent)
        .u16(values.win_descent)
        .u32(1) // ulCodePageRange1
        .u32(0)
        .i16(500) // sxHeight
        .i16(700)
        .u16(0)
        .u16(0x20)
        .u16(2)
        .into_inner()
}

#[derive(Clone, Copy, Debug)]
pub(crate) enum TestAnchor {
    Offset { x: i16, y: i16 },
    Point { base: u16, component: u16 },
}

/// A component transform, with values in F2Dot14 range.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) enum TestTransform {
    #[default]
    Identity,
    Scale(f32),
    XyScale { x: f32, y: f32 },
    /// `[xx, yx, xy, yy]` in file order
    TwoByTwo([f32; 4]),
}

#[derive(Clone, Debug)]
pub(crate) struct TestComponent {
    pub(crate) glyph: u16,
    pub(crate) anchor: TestAnchor,
    pub(crate) transform: TestTransform,
    /// Sets SCALED_COMPONENT_OFFSET
    pub(crate) scaled_offset: bool,
}

impl TestComponent {
    pub(crate) fn offset(glyph: u16, x: i16, y: i16) -> Self {
        Self {
            glyph,
            anchor: TestAnchor::Offset { x, y },
            transform: TestTransform::Identity,
            scaled_offset: false,
        }
    }

    pub(crate) fn point(glyph: u16, base: u16, component: u16) -> Self {
        Self {
            anchor: TestAnchor::Point { base, component },
            ..Self::offset(glyph, 0, 0)
        }
    }

    pub(crate) fn scaled(self, scale: f32) -> Self {
        self.transform(TestTransform::Scale(scale))
    }

    pub(crate) fn transform(mut self, transform: TestTransform) -> Self {
        self.transform = transform;
        self
    }

    pub(crate) fn with_scaled_offset(mut self) -> Self {
        self.scaled_offset = true;
        self
    }
}

#[derive(Clone, Debug)]
pub(crate) enum TestGlyph {
    /// No outline data at all, like a space
    Empty,
    /// A zero contour glyph that nevertheless stores a bounding box
    ZeroContours { y_min: i16, y_max: i16 },
    /// On-curve points, one list per contour
    Simple(Vec<Vec<(i16, i16)>>),
    Composite(Vec<TestComponent>),
}

impl TestGlyph {
    pub(crate) fn rect(x_min: i16, y_min: i16, x_max: i16, y_max: i16) -> Self {
        TestGlyph::Simple(vec![vec![
            (x_min, y_min),
            (x_min, y_max),
            (x_max, y_max),
            (x_max, y_min),
        ]])
    }

    fn compile(&self) -> Vec<u8> {
        match self {
            TestGlyph::Empty => Vec::new(),
            TestGlyph::ZeroContours { y_min, y_max } => BeBuffer::new()
                .i16(0)
                .i16(0)
                .i16(*y_min)
                .i16(300)
                .i16(*y_max)
                .u16(0) // instructionLength
                .into_inner(),
            TestGlyph::Simple(contours) => {
                let points: Vec<_> = contours.iter().flatten().copied().collect();
                let x_min = points.iter().map(|p| p.0).min().unwrap_or_default();
                let x_max = points.iter().map(|p| p.0).max().unwrap_or_default();
                let y_min = points.iter().map(|p| p.1).min().unwrap_or_default();
                let y_max = points.iter().map(|p| p.1).max().unwrap_or_default();
                let mut buf = BeBuffer::new()
                    .i16(contours.len() as i16)
                    .i16(x_min)
                    .i16(y_min)
                    .i16(x_max)
                    .i16(y_max);
                let mut end = 0u16;
                for contour in contours {
                    end += contour.len() as u16;
                    buf = buf.u16(end - 1);
                }
                buf = buf.u16(0);
                // ON_CURVE_POINT with two byte coordinates
                buf = points.iter().fold(buf, |buf, _| buf.u8(0x01));
                let mut last = 0i16;
                for (x, _) in &points {
                    buf = buf.i16(x - last);
                    last = *x;
                }
                last = 0;
                for (_, y) in &points {
                    buf = buf.i16(y - last);
                    last = *y;
                }
                buf.into_inner()
            }
            TestGlyph::Composite(components) => {
                let mut buf = BeBuffer::new().i16(-1).bytes(&[0; 8]);
                for (i, component) in components.iter().enumerate() {
                    // ARG_1_AND_2_ARE_WORDS
                    let mut flags = 0x0001u16;
                    if matches!(component.anchor, TestAnchor::Offset { .. }) {
                        flags |= 0x0002;
                    }
                    flags |= match component.transform {
                        TestTransform::Identity => 0,
                        TestTransform::Scale(_) => 0x0008,
                        TestTransform::XyScale { .. } => 0x0040,
                        TestTransform::TwoByTwo(_) => 0x0080,
                    };
                    if component.scaled_offset {
                        flags |= 0x0800;
                    }
                    if i + 1 < components.len() {
                        flags |= 0x0020;
                    }
                    buf = buf.u16(flags).u16(component.glyph);
                    buf = match component.anchor {
                        TestAnchor::Offset { x, y } => buf.i16(x).i16(y),
                        TestAnchor::Point { base, component } => buf.u16(base).u16(component),
                    };
                    let f2dot14 = |value: f32| (value * 16384.0) as i16;
                    buf = match component.transform {
                        TestTransform::Identity => buf,
                        TestTransform::Scale(scale) => buf.i16(f2dot14(scale)),
                        TestTransform::XyScale { x, y } => buf.i16(f2dot14(x)).i16(f2dot14(y)),
                        TestTransform::TwoByTwo(matrix) => matrix
                            .into_iter()
                            .fold(buf, |buf, value| buf.i16(f2dot14(value))),
                    };
                }
                buf.into_inner()
            }
        }
    }
}

/// Compile glyphs into `glyf` and `loca` data.
pub(crate) fn glyf_and_loca(glyphs: &[TestGlyph], long_loca: bool) -> (Vec<u8>, Vec<u8>) {
    let mut glyf = Vec::new();
    let mut offsets = vec![0usize];
    for glyph in glyphs {
        glyf.extend(glyph.compile());
        glyf.resize((glyf.len() + 3) & !3, 0);
        offsets.push(glyf.len());
    }
    let loca = offsets
        .into_iter()
        .fold(BeBuffer::new(), |buf, offset| match long_loca {
            true => buf.u32(offset as u32),
            false => buf.u16((offset / 2) as u16),
        })
        .into_inner();
    (glyf, loca)
}

/// A font with just enough tables for the metrics transform.
#[derive(Clone, Debug)]
pub(crate) struct TestFont {
    glyphs: Vec<TestGlyph>,
    line_metrics: (i16, i16, i16),
    os2: TestOs2,
    sfnt_version: u32,
    long_loca: bool,
    without: Vec<Tag>,
    extra: Vec<(Tag, Vec<u8>)>,
}

impl TestFont {
    pub(crate) fn new(glyphs: Vec<TestGlyph>) -> Self {
        Self {
            glyphs,
            line_metrics: (800, -200, 0),
            os2: TestOs2::default(),
            sfnt_version: 0x0001_0000,
            long_loca: true,
            without: Vec::new(),
            extra: Vec::new(),
        }
    }

    pub(crate) fn line_metrics(mut self, ascender: i16, descender: i16, line_gap: i16) -> Self {
        self.line_metrics = (ascender, descender, line_gap);
        self
    }

    pub(crate) fn os2(mut self, os2: TestOs2) -> Self {
        self.os2 = os2;
        self
    }

    pub(crate) fn short_loca(mut self) -> Self {
        self.long_loca = false;
        self
    }

    pub(crate) fn sfnt_version(mut self, version: u32) -> Self {
        self.sfnt_version = version;
        self
    }

    pub(crate) fn without_table(mut self, tag: Tag) -> Self {
        self.without.push(tag);
        self
    }

    pub(crate) fn with_table(mut self, tag: Tag, data: Vec<u8>) -> Self {
        self.extra.push((tag, data));
        self
    }

    pub(crate) fn tables(&self) -> BTreeMap<Tag, Vec<u8>> {
        let num_glyphs = self.glyphs.len() as u16;
        let (ascender, descender, line_gap) = self.line_metrics;
        let (glyf, loca) = glyf_and_loca(&self.glyphs, self.long_loca);
        let mut tables = BTreeMap::from([
            (Head::TAG, head_table(self.long_loca as i16)),
            (
                Hhea::TAG,
                hhea_table(ascender, descender, line_gap, num_glyphs),
            ),
            (Maxp::TAG, maxp_table(num_glyphs)),
            (Os2::TAG, os2_table(self.os2)),
            (Hmtx::TAG, hmtx_table(num_glyphs)),
            (Glyf::TAG, glyf),
            (Loca::TAG, loca),
            // something the transform has no business touching
            (Tag::new(b"name"), b"\0\0\0\0\0\x06not a real name table".to_vec()),
        ]);
        tables.extend(self.extra.iter().cloned());
        for tag in &self.without {
            tables.remove(tag);
        }
        tables
    }

    pub(crate) fn build(&self) -> Vec<u8> {
        let mut builder = SfntBuilder::new(self.sfnt_version);
        for (tag, data) in self.tables() {
            builder.add_raw(tag, data);
        }
        builder.build()
    }
}

/// Length of the `glyf` table rebuilt from [`transformed_glyf`].
pub(crate) const TRANSFORMED_GLYF_LEN: usize = 40;

/// A transformed `glyf` table with three glyphs: an empty one, a simple
/// triangle spanning -10..700 and a composite placing the triangle 50
/// units higher.
pub(crate) fn transformed_glyf() -> Vec<u8> {
    let n_contour = [0x00, 0x00, 0x00, 0x01, 0xFF, 0xFF];
    let n_points = [3];
    // on curve y only, two byte on curve, two byte off curve
    let flags = [1, 95, 221];
    let glyphs = [0, 99, 187, 99, 197, 0];
    // ARGS_ARE_XY_VALUES, glyph 1, (0, 50)
    let composites = [0x00, 0x02, 0x00, 0x01, 0x00, 50];
    let bboxes = [0x20, 0, 0, 0, 0, 0, 0, 40, 0, 200, 0x02, 0xEE];
    let streams: [&[u8]; 7] = [
        &n_contour,
        &n_points,
        &flags,
        &glyphs,
        &composites,
        &bboxes,
        &[],
    ];
    let header = BeBuffer::new().u16(0).u16(0).u16(3).u16(0);
    let header = streams
        .iter()
        .fold(header, |buf, stream| buf.u32(stream.len() as u32));
    streams
        .iter()
        .fold(header, |buf, stream| buf.bytes(stream))
        .into_inner()
}

/// One table of a hand assembled WOFF2 file.
#[derive(Clone, Debug)]
pub(crate) struct Woff2Table {
    tag: Tag,
    transform_version: u8,
    orig_length: u32,
    transform_length: Option<u32>,
    data: Vec<u8>,
}

impl Woff2Table {
    /// An untransformed table.
    pub(crate) fn new(tag: Tag, data: Vec<u8>) -> Self {
        let transform_version = if tag == Glyf::TAG || tag == Loca::TAG {
            3
        } else {
            0
        };
        Self {
            tag,
            transform_version,
            orig_length: data.len() as u32,
            transform_length: None,
            data,
        }
    }

    /// Mark the data as transformed, decoding to `orig_length` bytes.
    pub(crate) fn transformed(mut self, version: u8, orig_length: u32) -> Self {
        self.transform_version = version;
        self.orig_length = orig_length;
        self.transform_length = Some(self.data.len() as u32);
        self
    }
}

pub(crate) fn build_woff2(flavor: u32, tables: &[Woff2Table]) -> Vec<u8> {
    let mut directory = Vec::new();
    let mut stream = Vec::new();
    for table in tables {
        let index = crate::woff2::KNOWN_TAGS
            .iter()
            .position(|tag| *tag == table.tag)
            .unwrap_or(0x3F) as u8;
        directory.push(index | (table.transform_version << 6));
        if index == 0x3F {
            directory.extend_from_slice(&table.tag.to_be_bytes());
        }
        crate::woff2::write_base128(&mut directory, table.orig_length);
        if let Some(len) = table.transform_length {
            crate::woff2::write_base128(&mut directory, len);
        }
        stream.extend_from_slice(&table.data);
    }
    let mut compressor = brotlic::CompressorWriter::new(Vec::new());
    std::io::Write::write_all(&mut compressor, &stream).unwrap();
    let compressed = compressor.into_inner().unwrap();

    let length = (48 + directory.len() + compressed.len() + 3) & !3;
    let mut woff2 = BeBuffer::new()
        .tag(b"wOF2")
        .u32(flavor)
        .u32(length as u32)
        .u16(tables.len() as u16)
        .u16(0)
        .u32(0) // totalSfntSize, unused when decoding
        .u32(compressed.len() as u32)
        .u16(1)
        .u16(0)
        .bytes(&[0; 20])
        .bytes(&directory)
        .bytes(&compressed)
        .into_inner();
    woff2.resize(length, 0);
    woff2
}

/// A complete font whose `glyf`, `loca` and `hmtx` are transformed.
pub(crate) fn woff2_with_transformed_glyf() -> Vec<u8> {
    let hmtx = BeBuffer::new().u8(0x03).u16(500).u16(500).u16(500).into_inner();
    build_woff2(
        0x0001_0000,
        &[
            Woff2Table::new(Tag::new(b"OS/2"), os2_table(TestOs2::default())),
            Woff2Table::new(Head::TAG, head_table(0)),
            Woff2Table::new(Hhea::TAG, hhea_table(800, -200, 0, 3)),
            Woff2Table::new(Hmtx::TAG, hmtx).transformed(1, 12),
            Woff2Table::new(Maxp::TAG, maxp_table(3)),
            Woff2Table::new(Glyf::TAG, transformed_glyf())
                .transformed(0, TRANSFORMED_GLYF_LEN as u32),
            Woff2Table::new(Loca::TAG, Vec::new()).transformed(0, 8),
        ],
    )
}

/// Overwrite the length field of the `tag` table record in an sfnt.
pub(crate) fn set_table_length(sfnt: &mut [u8], tag: Tag, length: u32) {
    let num_tables = u16::from_be_bytes([sfnt[4], sfnt[5]]) as usize;
    let record = (0..num_tables)
        .map(|i| 12 + i * 16)
        .find(|start| sfnt[*start..*start + 4] == tag.to_be_bytes())
        .expect("no such table");
    sfnt[record + 12..record + 16].copy_from_slice(&length.to_be_bytes());
}
