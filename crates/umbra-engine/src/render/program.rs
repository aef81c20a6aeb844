//! Named uniform interface of a compiled program.
//!
//! A program declares its uniform block as an ordered list of named fields.
//! Offsets follow WGSL uniform address-space layout, so a WGSL struct declaring
//! the same fields in the same order matches byte for byte. Texture units are
//! declared alongside and validated, but occupy no bytes: they name the fixed
//! binding index each sampled attachment is bound to.

use std::ops::Range;

use glam::{Mat3, Mat4, Vec2, Vec3, Vec4};

use super::error::{RenderError, RenderResult};

/// Declared type of a uniform.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum UniformKind {
    Float,
    Int,
    Uint,
    Vec2,
    Vec3,
    Vec4,
    Mat3,
    Mat4,
    /// Fixed-length `array<vec4<f32>, N>`.
    Vec4Array(usize),
    /// Sampled texture bound at the given binding index.
    TextureUnit(u32),
}

impl UniformKind {
    /// `(size, align)` in bytes under WGSL uniform layout rules.
    fn size_align(self) -> (usize, usize) {
        match self {
            UniformKind::Float | UniformKind::Int | UniformKind::Uint => (4, 4),
            UniformKind::Vec2 => (8, 8),
            UniformKind::Vec3 => (12, 16),
            UniformKind::Vec4 => (16, 16),
            // Three vec3 columns, each padded to 16 bytes.
            UniformKind::Mat3 => (48, 16),
            UniformKind::Mat4 => (64, 16),
            UniformKind::Vec4Array(n) => (16 * n, 16),
            UniformKind::TextureUnit(_) => (0, 1),
        }
    }
}

/// A value handed to [`UniformBlock::set`].
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum UniformValue<'a> {
    Float(f32),
    Int(i32),
    Uint(u32),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    Mat3(Mat3),
    Mat4(Mat4),
    Vec4Array(&'a [Vec4]),
    TextureUnit(u32),
}

impl UniformValue<'_> {
    fn kind_name(&self) -> &'static str {
        match self {
            UniformValue::Float(_) => "f32",
            UniformValue::Int(_) => "i32",
            UniformValue::Uint(_) => "u32",
            UniformValue::Vec2(_) => "vec2",
            UniformValue::Vec3(_) => "vec3",
            UniformValue::Vec4(_) => "vec4",
            UniformValue::Mat3(_) => "mat3",
            UniformValue::Mat4(_) => "mat4",
            UniformValue::Vec4Array(_) => "vec4 array",
            UniformValue::TextureUnit(_) => "texture unit",
        }
    }
}

#[derive(Debug, Clone)]
struct UniformField {
    name: &'static str,
    kind: UniformKind,
    offset: usize,
}

/// Ordered, named uniform declaration of one program.
#[derive(Debug, Clone)]
pub struct UniformLayout {
    program: &'static str,
    fields: Vec<UniformField>,
    size: usize,
}

impl UniformLayout {
    pub fn builder(program: &'static str) -> UniformLayoutBuilder {
        UniformLayoutBuilder {
            program,
            fields: Vec::new(),
            cursor: 0,
        }
    }

    pub fn program(&self) -> &'static str {
        self.program
    }

    /// Byte size of the block, rounded up to 16 as WGSL rounds struct sizes.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Byte offset of a data field.
    pub fn offset_of(&self, name: &str) -> RenderResult<usize> {
        let f = self.field(name)?;
        if let UniformKind::TextureUnit(_) = f.kind {
            return Err(RenderError::uniform(
                self.program,
                name,
                "texture units have no offset",
            ));
        }
        Ok(f.offset)
    }

    /// Binding index declared for a texture unit.
    pub fn texture_unit(&self, name: &str) -> RenderResult<u32> {
        match self.field(name)?.kind {
            UniformKind::TextureUnit(unit) => Ok(unit),
            other => Err(RenderError::uniform(
                self.program,
                name,
                format!("declared as {other:?}, not a texture unit"),
            )),
        }
    }

    fn field(&self, name: &str) -> RenderResult<&UniformField> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .ok_or_else(|| RenderError::uniform(self.program, name, "not declared by program"))
    }
}

pub struct UniformLayoutBuilder {
    program: &'static str,
    fields: Vec<UniformField>,
    cursor: usize,
}

impl UniformLayoutBuilder {
    pub fn field(mut self, name: &'static str, kind: UniformKind) -> Self {
        let (size, align) = kind.size_align();
        let offset = align_up(self.cursor, align);
        if size > 0 {
            self.cursor = offset + size;
        }
        self.fields.push(UniformField { name, kind, offset });
        self
    }

    pub fn texture(self, name: &'static str, unit: u32) -> Self {
        self.field(name, UniformKind::TextureUnit(unit))
    }

    pub fn build(self) -> UniformLayout {
        UniformLayout {
            program: self.program,
            fields: self.fields,
            size: align_up(self.cursor.max(16), 16),
        }
    }
}

#[inline]
pub(crate) fn align_up(v: usize, align: usize) -> usize {
    v.div_ceil(align) * align
}

/// CPU copy of a program's uniform block.
///
/// Values are written immediately into the byte image; [`bytes`](Self::bytes) is
/// what gets uploaded. The block tracks the byte range touched since the last
/// upload so large, rarely changing fields (the SSAO kernel) are sent once.
#[derive(Debug, Clone)]
pub struct UniformBlock {
    layout: UniformLayout,
    data: Vec<u8>,
    dirty: Option<Range<usize>>,
}

impl UniformBlock {
    pub fn new(layout: UniformLayout) -> Self {
        let data = vec![0u8; layout.size()];
        Self {
            dirty: Some(0..data.len()),
            layout,
            data,
        }
    }

    pub fn layout(&self) -> &UniformLayout {
        &self.layout
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Byte range written since the last call, if any. Clears the range.
    pub fn take_dirty(&mut self) -> Option<Range<usize>> {
        self.dirty.take()
    }

    /// Sets a named uniform.
    ///
    /// Unknown names, kind mismatches, array length mismatches and texture-unit
    /// values differing from the declared unit all fail with `UniformMismatch`.
    pub fn set(&mut self, name: &str, value: UniformValue<'_>) -> RenderResult<()> {
        let program = self.layout.program;
        let field = self.layout.field(name)?.clone();
        let mismatch = |reason: String| RenderError::uniform(program, name, reason);
        let o = field.offset;

        match (field.kind, value) {
            (UniformKind::Float, UniformValue::Float(v)) => self.write(o, &[v]),
            (UniformKind::Int, UniformValue::Int(v)) => self.write_bytes(o, bytemuck::bytes_of(&v)),
            (UniformKind::Uint, UniformValue::Uint(v)) => {
                self.write_bytes(o, bytemuck::bytes_of(&v))
            }
            (UniformKind::Vec2, UniformValue::Vec2(v)) => self.write(o, &v.to_array()),
            (UniformKind::Vec3, UniformValue::Vec3(v)) => self.write(o, &v.to_array()),
            (UniformKind::Vec4, UniformValue::Vec4(v)) => self.write(o, &v.to_array()),
            (UniformKind::Mat3, UniformValue::Mat3(m)) => {
                for (i, col) in [m.x_axis, m.y_axis, m.z_axis].into_iter().enumerate() {
                    self.write(o + i * 16, &col.to_array());
                }
            }
            (UniformKind::Mat4, UniformValue::Mat4(m)) => self.write(o, &m.to_cols_array()),
            (UniformKind::Vec4Array(n), UniformValue::Vec4Array(values)) => {
                if values.len() != n {
                    return Err(mismatch(format!(
                        "expected {n} elements, got {}",
                        values.len()
                    )));
                }
                let floats: Vec<f32> = values.iter().flat_map(|v| v.to_array()).collect();
                self.write(o, &floats);
            }
            (UniformKind::TextureUnit(unit), UniformValue::TextureUnit(v)) => {
                if unit != v {
                    return Err(mismatch(format!("declared at unit {unit}, set to unit {v}")));
                }
                return Ok(());
            }
            (kind, v) => {
                return Err(mismatch(format!(
                    "declared as {kind:?}, got {}",
                    v.kind_name()
                )));
            }
        }

        Ok(())
    }

    fn write(&mut self, offset: usize, floats: &[f32]) {
        self.write_bytes(offset, bytemuck::cast_slice(floats));
    }

    fn write_bytes(&mut self, offset: usize, bytes: &[u8]) {
        let end = offset + bytes.len();
        self.data[offset..end].copy_from_slice(bytes);
        self.dirty = Some(match self.dirty.take() {
            Some(r) => r.start.min(offset)..r.end.max(end),
            None => offset..end,
        });
    }
}

/// Uniform block paired with its GPU buffer.
#[derive(Debug)]
pub struct UniformBuffer {
    block: UniformBlock,
    buffer: wgpu::Buffer,
}

impl UniformBuffer {
    pub fn new(device: &wgpu::Device, layout: UniformLayout) -> Self {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(layout.program()),
            size: layout.size() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        Self {
            block: UniformBlock::new(layout),
            buffer,
        }
    }

    pub fn set(&mut self, name: &str, value: UniformValue<'_>) -> RenderResult<()> {
        self.block.set(name, value)
    }

    pub fn layout(&self) -> &UniformLayout {
        self.block.layout()
    }

    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }

    /// Uploads the bytes written since the last flush.
    pub fn flush(&mut self, queue: &wgpu::Queue) {
        if let Some(range) = self.block.take_dirty() {
            queue.write_buffer(&self.buffer, range.start as u64, &self.block.bytes()[range]);
        }
    }
}

/// Minimum binding size of a uniform layout. Layouts are never empty because
/// [`UniformLayoutBuilder::build`] rounds the size up to at least 16 bytes.
pub(crate) fn min_binding_size(layout: &UniformLayout) -> std::num::NonZeroU64 {
    std::num::NonZeroU64::new(layout.size() as u64)
        .unwrap_or(std::num::NonZeroU64::MIN.saturating_add(15))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_f32(block: &UniformBlock, offset: usize) -> f32 {
        bytemuck::pod_read_unaligned(&block.bytes()[offset..offset + 4])
    }

    // ── layout ────────────────────────────────────────────────────────────

    #[test]
    fn vec3_followed_by_scalar_packs_into_one_slot() {
        let l = UniformLayout::builder("t")
            .field("color", UniformKind::Vec3)
            .field("intensity", UniformKind::Float)
            .build();
        assert_eq!(l.offset_of("color").unwrap(), 0);
        assert_eq!(l.offset_of("intensity").unwrap(), 12);
        assert_eq!(l.size(), 16);
    }

    #[test]
    fn vec3_after_scalar_aligns_to_16() {
        let l = UniformLayout::builder("t")
            .field("a", UniformKind::Float)
            .field("b", UniformKind::Vec3)
            .build();
        assert_eq!(l.offset_of("b").unwrap(), 16);
        assert_eq!(l.size(), 32);
    }

    #[test]
    fn mat3_occupies_three_padded_columns() {
        let l = UniformLayout::builder("t")
            .field("normal_matrix", UniformKind::Mat3)
            .field("scale", UniformKind::Float)
            .build();
        assert_eq!(l.offset_of("scale").unwrap(), 48);
        assert_eq!(l.size(), 64);
    }

    #[test]
    fn texture_units_take_no_space() {
        let l = UniformLayout::builder("t")
            .field("m", UniformKind::Mat4)
            .texture("g_position", 1)
            .field("bias", UniformKind::Float)
            .build();
        assert_eq!(l.offset_of("bias").unwrap(), 64);
        assert_eq!(l.texture_unit("g_position").unwrap(), 1);
        assert!(l.offset_of("g_position").is_err());
        assert!(l.texture_unit("m").is_err());
    }

    #[test]
    fn ssao_block_matches_wgsl_layout() {
        let l = UniformLayout::builder("ssao")
            .field("projection", UniformKind::Mat4)
            .field("samples", UniformKind::Vec4Array(64))
            .field("kernel_size", UniformKind::Uint)
            .field("radius", UniformKind::Float)
            .field("bias", UniformKind::Float)
            .field("range_check", UniformKind::Uint)
            .build();
        assert_eq!(l.offset_of("samples").unwrap(), 64);
        assert_eq!(l.offset_of("kernel_size").unwrap(), 64 + 1024);
        assert_eq!(l.offset_of("range_check").unwrap(), 64 + 1024 + 12);
        assert_eq!(l.size(), 1104);
        assert_eq!(min_binding_size(&l).get(), 1104);
    }

    #[test]
    fn binding_size_of_texture_only_layout_is_one_slot() {
        let l = UniformLayout::builder("t").texture("noise", 3).build();
        assert_eq!(min_binding_size(&l).get(), 16);
    }

    // ── set ───────────────────────────────────────────────────────────────

    #[test]
    fn set_writes_at_declared_offset() {
        let mut b = UniformBlock::new(
            UniformLayout::builder("t")
                .field("a", UniformKind::Float)
                .field("v", UniformKind::Vec3)
                .build(),
        );
        assert_eq!(b.take_dirty(), Some(0..32));
        assert_eq!(b.take_dirty(), None);
        b.set("v", UniformValue::Vec3(Vec3::new(1.0, 2.0, 3.0))).unwrap();
        assert_eq!(b.take_dirty(), Some(16..28));
        assert_eq!(read_f32(&b, 16), 1.0);
        assert_eq!(read_f32(&b, 24), 3.0);
    }

    #[test]
    fn dirty_range_spans_all_writes() {
        let mut b = UniformBlock::new(
            UniformLayout::builder("t")
                .field("projection", UniformKind::Mat4)
                .field("samples", UniformKind::Vec4Array(2))
                .field("radius", UniformKind::Float)
                .build(),
        );
        b.take_dirty();
        b.set("radius", UniformValue::Float(0.5)).unwrap();
        b.set("projection", UniformValue::Mat4(Mat4::IDENTITY)).unwrap();
        assert_eq!(b.take_dirty(), Some(0..100));
    }

    #[test]
    fn mat3_columns_are_padded() {
        let mut b = UniformBlock::new(
            UniformLayout::builder("t")
                .field("m", UniformKind::Mat3)
                .build(),
        );
        b.set("m", UniformValue::Mat3(Mat3::from_diagonal(Vec3::new(2.0, 3.0, 4.0))))
            .unwrap();
        assert_eq!(read_f32(&b, 0), 2.0);
        assert_eq!(read_f32(&b, 16 + 4), 3.0);
        assert_eq!(read_f32(&b, 32 + 8), 4.0);
        assert_eq!(read_f32(&b, 12), 0.0);
    }

    #[test]
    fn unknown_name_is_uniform_mismatch() {
        let mut b = UniformBlock::new(
            UniformLayout::builder("lighting")
                .field("ka", UniformKind::Vec3)
                .build(),
        );
        let err = b.set("kd", UniformValue::Vec3(Vec3::ONE)).unwrap_err();
        assert!(matches!(
            err,
            RenderError::UniformMismatch { ref program, ref name, .. }
                if program == "lighting" && name == "kd"
        ));
    }

    #[test]
    fn wrong_kind_is_uniform_mismatch() {
        let mut b = UniformBlock::new(
            UniformLayout::builder("t")
                .field("radius", UniformKind::Float)
                .build(),
        );
        assert!(matches!(
            b.set("radius", UniformValue::Uint(1)),
            Err(RenderError::UniformMismatch { .. })
        ));
    }

    #[test]
    fn array_length_must_match_declaration() {
        let mut b = UniformBlock::new(
            UniformLayout::builder("t")
                .field("samples", UniformKind::Vec4Array(4))
                .build(),
        );
        assert!(b.set("samples", UniformValue::Vec4Array(&[Vec4::ONE; 3])).is_err());
        assert!(b.set("samples", UniformValue::Vec4Array(&[Vec4::ONE; 4])).is_ok());
    }

    #[test]
    fn texture_unit_must_match_declaration() {
        let mut b = UniformBlock::new(
            UniformLayout::builder("t")
                .texture("ssao", 4)
                .build(),
        );
        assert!(b.set("ssao", UniformValue::TextureUnit(4)).is_ok());
        assert!(matches!(
            b.set("ssao", UniformValue::TextureUnit(3)),
            Err(RenderError::UniformMismatch { .. })
        ));
    }
}
