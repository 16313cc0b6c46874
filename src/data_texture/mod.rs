//! Structured float records stored in a square texture.
//!
//! A [`DataTexture`] holds `record_count` records of `slots` vec3/vec4 values
//! each. Slot `s` of record `r` lives at the linear texel `r * slots + s`, and
//! linear texel `i` sits at column `i % side`, row `i / side`. The generated
//! WGSL performs the exact same mapping with `textureLoad`, so the shader reads
//! back bit-identical floats.
//!
//! Writes only touch the CPU copy and mark it dirty. The render loop calls
//! [`DataTexture::flush`] once per frame to push the whole buffer to the GPU.

use std::borrow::Cow;

use log::warn;

pub mod matrix;

pub use matrix::{MatrixAndInvTexture, MatrixTexture, matrix_and_normal_columns};

/// Number of floats per slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotWidth {
    Vec3,
    Vec4,
}

impl SlotWidth {
    pub fn components(self) -> usize {
        match self {
            SlotWidth::Vec3 => 3,
            SlotWidth::Vec4 => 4,
        }
    }

    fn wgsl_type(self) -> &'static str {
        match self {
            SlotWidth::Vec3 => "vec3<f32>",
            SlotWidth::Vec4 => "vec4<f32>",
        }
    }

    fn wgsl_swizzle(self) -> &'static str {
        match self {
            SlotWidth::Vec3 => ".xyz",
            SlotWidth::Vec4 => "",
        }
    }
}

/// Receiver of flushed texel data, one RGBA32F texel per slot.
pub trait TexelSink {
    fn upload(&mut self, side: u32, texels: &[f32]);
}

#[derive(Clone, Debug)]
pub struct DataTexture {
    name: String,
    record_count: u32,
    slots: u32,
    width: SlotWidth,
    side: u32,
    data: Vec<f32>,
    dirty: bool,
}

impl DataTexture {
    /// `name` ends up in WGSL identifiers and must be a valid one.
    pub fn new(name: impl Into<String>, record_count: u32, slots: u32, width: SlotWidth) -> Self {
        let side = side_for(record_count as u64 * slots as u64);
        let data = vec![0.0; record_count as usize * slots as usize * width.components()];
        Self {
            name: name.into(),
            record_count,
            slots,
            width,
            side,
            data,
            dirty: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn record_count(&self) -> u32 {
        self.record_count
    }

    pub fn slots(&self) -> u32 {
        self.slots
    }

    pub fn width(&self) -> SlotWidth {
        self.width
    }

    /// Edge length of the square texture.
    pub fn side(&self) -> u32 {
        self.side
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn record_len(&self) -> usize {
        self.slots as usize * self.width.components()
    }

    /// Overwrite a whole record. A value count other than `slots * components`
    /// is logged and ignored.
    ///
    /// Keeping `index` below [`record_count`](Self::record_count) is up to the
    /// caller; past it this panics.
    pub fn set_record(&mut self, index: u32, values: &[f32]) -> bool {
        let len = self.record_len();
        if values.len() != len {
            warn!(
                "{}: record {} expects {} values, got {}",
                self.name,
                index,
                len,
                values.len()
            );
            return false;
        }
        let start = index as usize * len;
        self.data[start..start + len].copy_from_slice(values);
        self.dirty = true;
        true
    }

    /// Overwrite one slot of a record.
    pub fn set_slot(&mut self, index: u32, slot: u32, values: &[f32]) -> bool {
        let components = self.width.components();
        if values.len() != components || slot >= self.slots {
            warn!(
                "{}: slot {} of record {} rejected ({} values)",
                self.name,
                slot,
                index,
                values.len()
            );
            return false;
        }
        let start = (index as usize * self.slots as usize + slot as usize) * components;
        self.data[start..start + components].copy_from_slice(values);
        self.dirty = true;
        true
    }

    pub fn record(&self, index: u32) -> &[f32] {
        let len = self.record_len();
        let start = index as usize * len;
        &self.data[start..start + len]
    }

    pub fn slot(&self, index: u32, slot: u32) -> &[f32] {
        let components = self.width.components();
        let start = (index as usize * self.slots as usize + slot as usize) * components;
        &self.data[start..start + components]
    }

    /// Column and row of the texel that stores `slot` of `record`.
    pub fn texel_coords(&self, record: u32, slot: u32) -> (u32, u32) {
        let linear = record * self.slots + slot;
        (linear % self.side, linear / self.side)
    }

    /// Backing data as `side * side` RGBA texels; vec3 slots are padded with
    /// `w = 1`. Texels past the last record are zero (`w = 1` for vec3).
    pub fn texels(&self) -> Cow<'_, [f32]> {
        let total = self.side as usize * self.side as usize * 4;
        match self.width {
            SlotWidth::Vec4 if self.data.len() == total => Cow::Borrowed(&self.data),
            SlotWidth::Vec4 => {
                let mut texels = self.data.clone();
                texels.resize(total, 0.0);
                Cow::Owned(texels)
            }
            SlotWidth::Vec3 => {
                let mut texels: Vec<f32> = self
                    .data
                    .chunks_exact(3)
                    .flat_map(|c| [c[0], c[1], c[2], 1.0])
                    .collect();
                while texels.len() < total {
                    texels.extend_from_slice(&[0.0, 0.0, 0.0, 1.0]);
                }
                Cow::Owned(texels)
            }
        }
    }

    /// Upload the texels if anything changed since the last flush.
    pub fn flush(&mut self, sink: &mut dyn TexelSink) -> bool {
        if !self.dirty {
            return false;
        }
        self.dirty = false;
        sink.upload(self.side, &self.texels());
        true
    }

    fn pascal_name(&self) -> String {
        self.name
            .split('_')
            .filter(|part| !part.is_empty())
            .map(|part| {
                let mut chars = part.chars();
                match chars.next() {
                    Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                    None => String::new(),
                }
            })
            .collect()
    }

    /// WGSL name of the texture binding.
    pub fn map_name(&self) -> String {
        format!("{}_map", self.name)
    }

    /// WGSL name of the decoded record struct.
    pub fn struct_name(&self) -> String {
        format!("{}Data", self.pascal_name())
    }

    /// Texture declaration, record struct and accessors for this layout.
    pub fn wgsl(&self, group: u32, binding: u32) -> String {
        let map = self.map_name();
        let ty = self.width.wgsl_type();
        let name = &self.name;
        let record = self.struct_name();
        let fields: String = (0..self.slots)
            .map(|i| format!("    data{i}: {ty},\n"))
            .collect();
        let reads: String = (0..self.slots)
            .map(|i| format!("    result.data{i} = sample_{name}(start + {i}u);\n"))
            .collect();
        format!(
            "@group({group}) @binding({binding})
var {map}: texture_2d<f32>;

struct {record} {{
{fields}}}

fn sample_{name}(index: u32) -> {ty} {{
    let side = textureDimensions({map}).x;
    let texel = textureLoad({map}, vec2<u32>(index % side, index / side), 0);
    return texel{swizzle};
}}

fn get_{name}_data(record: u32) -> {record} {{
    let start = record * {slots}u;
    var result: {record};
{reads}    return result;
}}
",
            swizzle = self.width.wgsl_swizzle(),
            slots = self.slots,
        )
    }

    /// WGSL statement binding the record at `index` to `var`.
    pub fn wgsl_fetch(&self, var: &str, index: &str) -> String {
        format!("let {var} = get_{}_data({index});", self.name)
    }
}

/// Smallest square edge that fits `texels` texels.
pub fn side_for(texels: u64) -> u32 {
    let mut side = (texels as f64).sqrt().ceil() as u64;
    while side * side < texels {
        side += 1;
    }
    side.max(1) as u32
}

/// CPU mirror of the generated `sample_*` function: the RGBA texel at
/// `linear` of a `side` x `side` texel array.
pub fn decode_slot(texels: &[f32], side: u32, linear: u32) -> [f32; 4] {
    let (x, y) = (linear % side, linear / side);
    let start = (y as usize * side as usize + x as usize) * 4;
    [
        texels[start],
        texels[start + 1],
        texels[start + 2],
        texels[start + 3],
    ]
}
