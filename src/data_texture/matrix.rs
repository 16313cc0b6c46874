//! Data textures specialised to 4x4 matrices.

use std::ops::{Deref, DerefMut};

use cgmath::{Matrix, SquareMatrix};

use super::{DataTexture, SlotWidth};

/// Matrix columns of `world` followed by the columns of its transposed inverse.
///
/// Singular matrices (e.g. a zero scale) have no inverse; the normal matrix
/// falls back to identity so the record stays well formed.
pub fn matrix_and_normal_columns(world: &cgmath::Matrix4<f32>) -> [f32; 32] {
    let normal = match world.invert() {
        Some(inverse) => inverse.transpose(),
        None => {
            log::warn!("world matrix is not invertible, using identity normal matrix");
            cgmath::Matrix4::identity()
        }
    };
    let world_cols: [[f32; 4]; 4] = (*world).into();
    let normal_cols: [[f32; 4]; 4] = normal.into();
    let mut out = [0.0; 32];
    for (i, v) in world_cols.iter().chain(normal_cols.iter()).flatten().enumerate() {
        out[i] = *v;
    }
    out
}

fn columns(values: &[f32]) -> cgmath::Matrix4<f32> {
    cgmath::Matrix4::new(
        values[0], values[1], values[2], values[3], values[4], values[5], values[6], values[7],
        values[8], values[9], values[10], values[11], values[12], values[13], values[14],
        values[15],
    )
}

fn wgsl_matrix(fn_name: &str, data_fn: &str, first_slot: u32) -> String {
    let cols: Vec<String> = (first_slot..first_slot + 4)
        .map(|i| format!("data.data{i}"))
        .collect();
    format!(
        "fn {fn_name}(record: u32) -> mat4x4<f32> {{
    let data = {data_fn}(record);
    return mat4x4<f32>({});
}}
",
        cols.join(", ")
    )
}

/// One column-major matrix per record (4 vec4 slots).
#[derive(Clone, Debug)]
pub struct MatrixTexture(DataTexture);

impl MatrixTexture {
    pub fn new(name: impl Into<String>, count: u32) -> Self {
        Self(DataTexture::new(name, count, 4, SlotWidth::Vec4))
    }

    pub fn set_matrix(&mut self, index: u32, matrix: &cgmath::Matrix4<f32>) -> bool {
        let cols: [[f32; 4]; 4] = (*matrix).into();
        self.0.set_record(index, cols.as_flattened())
    }

    pub fn matrix(&self, index: u32) -> cgmath::Matrix4<f32> {
        columns(self.0.record(index))
    }

    pub fn wgsl(&self, group: u32, binding: u32) -> String {
        let name = self.0.name();
        self.0.wgsl(group, binding)
            + &wgsl_matrix(
                &format!("get_{name}_matrix"),
                &format!("get_{name}_data"),
                0,
            )
    }
}

impl Deref for MatrixTexture {
    type Target = DataTexture;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for MatrixTexture {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

/// A matrix and its transposed inverse per record (8 vec4 slots).
///
/// The second matrix transforms normals under non-uniform scale.
#[derive(Clone, Debug)]
pub struct MatrixAndInvTexture(DataTexture);

impl MatrixAndInvTexture {
    pub fn new(name: impl Into<String>, count: u32) -> Self {
        Self(DataTexture::new(name, count, 8, SlotWidth::Vec4))
    }

    pub fn set_matrix(&mut self, index: u32, matrix: &cgmath::Matrix4<f32>) -> bool {
        self.0.set_record(index, &matrix_and_normal_columns(matrix))
    }

    pub fn matrix(&self, index: u32) -> cgmath::Matrix4<f32> {
        columns(&self.0.record(index)[..16])
    }

    pub fn normal_matrix(&self, index: u32) -> cgmath::Matrix4<f32> {
        columns(&self.0.record(index)[16..])
    }

    pub fn wgsl(&self, group: u32, binding: u32) -> String {
        let name = self.0.name();
        let data_fn = format!("get_{name}_data");
        self.0.wgsl(group, binding)
            + &wgsl_matrix(&format!("get_{name}_matrix"), &data_fn, 0)
            + &wgsl_matrix(&format!("get_{name}_normal_matrix"), &data_fn, 4)
    }
}

impl Deref for MatrixAndInvTexture {
    type Target = DataTexture;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for MatrixAndInvTexture {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}
