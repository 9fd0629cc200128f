//! Matrix layouts at the SDK boundary and hashing helpers.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use bytemuck::{Pod, Zeroable};
use glam::{Affine3A, Mat4};

/// Row-major 3x4 object-to-world matrix, translation in the last column.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct Float3x4 {
    pub rows: [[f32; 4]; 3],
}

impl Float3x4 {
    pub const IDENTITY: Self = Self {
        rows: [[1.0, 0.0, 0.0, 0.0], [0.0, 1.0, 0.0, 0.0], [0.0, 0.0, 1.0, 0.0]],
    };

    /// Take the top three rows of a row-major 4x4 array.
    pub fn from_row_major_4x4(m: &[f32; 16]) -> Self {
        let mut rows = [[0.0f32; 4]; 3];
        for (r, row) in rows.iter_mut().enumerate() {
            row.copy_from_slice(&m[r * 4..r * 4 + 4]);
        }
        Self { rows }
    }

    pub fn translation(&self) -> [f32; 3] {
        [self.rows[0][3], self.rows[1][3], self.rows[2][3]]
    }
}

/// Node transform to the backend instance layout: column-major 4x4, transposed, top 3 rows.
pub fn instance_transform(transform: &Affine3A) -> Float3x4 {
    let column_major = Mat4::from(*transform);
    let row_major = column_major.transpose().to_cols_array();
    Float3x4::from_row_major_4x4(&row_major)
}

/// Boost-style hash_combine over u64 seeds.
pub fn hash_combine<T: Hash>(seed: &mut u64, value: &T) {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    let h = hasher.finish();
    *seed ^= h
        .wrapping_add(0x9e37_79b9_7f4a_7c15)
        .wrapping_add(*seed << 6)
        .wrapping_add(*seed >> 2);
}
