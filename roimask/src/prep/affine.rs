//! Voxel-to-world transforms read from NIfTI headers.

use crate::error::{Result, VolumeError};
use approx::abs_diff_eq;
use nifti::NiftiHeader;

/// Element-wise tolerance under which two affines are treated as the same grid.
pub const AFFINE_TOLERANCE: f64 = 1e-4;

/// A 3x4 affine; the implicit last row is `[0, 0, 0, 1]`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Affine {
    rows: [[f64; 4]; 3],
}

impl Affine {
    #[inline]
    pub fn from_rows(rows: [[f64; 4]; 3]) -> Self {
        Self { rows }
    }

    #[inline]
    pub fn identity() -> Self {
        Self::scaling([1.0; 3])
    }

    /// Diagonal affine with the given voxel sizes and no offset.
    pub fn scaling(zooms: [f64; 3]) -> Self {
        let mut rows = [[0.0; 4]; 3];
        for (axis, z) in zooms.into_iter().enumerate() {
            rows[axis][axis] = z;
        }
        Self { rows }
    }

    /// Best available affine of a header: sform, then qform, then `pixdim` scaling.
    pub fn from_header(header: &NiftiHeader) -> Self {
        if header.sform_code > 0 {
            let r = |s: [f32; 4]| s.map(|v| v as f64);
            Self::from_rows([r(header.srow_x), r(header.srow_y), r(header.srow_z)])
        } else if header.qform_code > 0 {
            Self::from_quaternion(header)
        } else {
            let p = &header.pixdim;
            Self::scaling([p[1] as f64, p[2] as f64, p[3] as f64])
        }
    }

    fn from_quaternion(header: &NiftiHeader) -> Self {
        let (mut b, mut c, mut d) = (
            header.quatern_b as f64,
            header.quatern_c as f64,
            header.quatern_d as f64,
        );
        let sq = 1.0 - (b * b + c * c + d * d);
        let a = if sq < 1e-7 {
            // 180 degree rotation; renormalize (b, c, d)
            let norm = (b * b + c * c + d * d).sqrt();
            b /= norm;
            c /= norm;
            d /= norm;
            0.0
        } else {
            sq.sqrt()
        };
        let qfac = if header.pixdim[0] < 0.0 { -1.0 } else { 1.0 };
        let (dx, dy, dz) = (
            header.pixdim[1] as f64,
            header.pixdim[2] as f64,
            header.pixdim[3] as f64 * qfac,
        );
        let rot = [
            [
                a * a + b * b - c * c - d * d,
                2.0 * (b * c - a * d),
                2.0 * (b * d + a * c),
            ],
            [
                2.0 * (b * c + a * d),
                a * a + c * c - b * b - d * d,
                2.0 * (c * d - a * b),
            ],
            [
                2.0 * (b * d - a * c),
                2.0 * (c * d + a * b),
                a * a + d * d - b * b - c * c,
            ],
        ];
        let offset = [
            header.quatern_x as f64,
            header.quatern_y as f64,
            header.quatern_z as f64,
        ];
        let mut rows = [[0.0; 4]; 3];
        for r in 0..3 {
            rows[r] = [rot[r][0] * dx, rot[r][1] * dy, rot[r][2] * dz, offset[r]];
        }
        Self { rows }
    }

    /// Maps a (continuous) voxel coordinate to world space.
    #[inline]
    pub fn apply(&self, p: [f64; 3]) -> [f64; 3] {
        let mut out = [0.0; 3];
        for (r, row) in self.rows.iter().enumerate() {
            out[r] = row[0] * p[0] + row[1] * p[1] + row[2] * p[2] + row[3];
        }
        out
    }

    /// `self ∘ other`: apply `other` first, then `self`.
    pub fn compose(&self, other: &Affine) -> Affine {
        let mut rows = [[0.0; 4]; 3];
        for r in 0..3 {
            for col in 0..4 {
                let mut v = (0..3)
                    .map(|m| self.rows[r][m] * other.rows[m][col])
                    .sum::<f64>();
                if col == 3 {
                    v += self.rows[r][3];
                }
                rows[r][col] = v;
            }
        }
        Affine { rows }
    }

    pub fn inverse(&self) -> Result<Affine> {
        let m = &self.rows;
        let cof = |r0: usize, r1: usize, c0: usize, c1: usize| {
            m[r0][c0] * m[r1][c1] - m[r0][c1] * m[r1][c0]
        };
        let det = m[0][0] * cof(1, 2, 1, 2) - m[0][1] * cof(1, 2, 0, 2) + m[0][2] * cof(1, 2, 0, 1);
        if det.abs() < f64::EPSILON || !det.is_finite() {
            return Err(VolumeError::SingularAffine);
        }
        let inv = [
            [cof(1, 2, 1, 2), -cof(0, 2, 1, 2), cof(0, 1, 1, 2)],
            [-cof(1, 2, 0, 2), cof(0, 2, 0, 2), -cof(0, 1, 0, 2)],
            [cof(1, 2, 0, 1), -cof(0, 2, 0, 1), cof(0, 1, 0, 1)],
        ];
        let mut rows = [[0.0; 4]; 3];
        for r in 0..3 {
            for col in 0..3 {
                rows[r][col] = inv[r][col] / det;
            }
            rows[r][3] = -(0..3).map(|col| rows[r][col] * m[col][3]).sum::<f64>();
        }
        Ok(Affine { rows })
    }

    /// Voxel sizes (column norms of the linear part).
    pub fn zooms(&self) -> [f64; 3] {
        let mut z = [0.0; 3];
        for (col, v) in z.iter_mut().enumerate() {
            *v = (0..3)
                .map(|r| self.rows[r][col] * self.rows[r][col])
                .sum::<f64>()
                .sqrt();
        }
        z
    }

    pub fn approx_eq(&self, other: &Affine, epsilon: f64) -> bool {
        self.rows
            .iter()
            .flatten()
            .zip(other.rows.iter().flatten())
            .all(|(a, b)| abs_diff_eq!(*a, *b, epsilon = epsilon))
    }

    /// Rows as `f32`, in the layout of the NIfTI `srow_*` fields.
    pub fn to_srows(&self) -> [[f32; 4]; 3] {
        self.rows.map(|row| row.map(|v| v as f32))
    }
}

#[cfg(test)]
mod tests {
    use super::Affine;
    use approx::assert_abs_diff_eq;
    use nifti::NiftiHeader;

    fn mni_2mm() -> Affine {
        Affine::from_rows([
            [-2.0, 0.0, 0.0, 90.0],
            [0.0, 2.0, 0.0, -126.0],
            [0.0, 0.0, 2.0, -72.0],
        ])
    }

    #[test]
    fn test_inverse_round_trips_points() {
        let a = mni_2mm();
        let inv = a.inverse().unwrap();
        let world = a.apply([10.0, 20.0, 30.0]);
        assert_eq!(world, [70.0, -86.0, -12.0]);
        let back = inv.apply(world);
        for (x, y) in back.iter().zip([10.0, 20.0, 30.0]) {
            assert_abs_diff_eq!(*x, y, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_compose_with_inverse_is_identity() {
        let a = Affine::from_rows([
            [0.0, 3.0, 0.0, 1.0],
            [1.5, 0.0, 0.0, -4.0],
            [0.0, 0.2, 2.5, 7.0],
        ]);
        let id = a.inverse().unwrap().compose(&a);
        assert!(id.approx_eq(&Affine::identity(), 1e-9));
    }

    #[test]
    fn test_singular_affine() {
        let a = Affine::scaling([1.0, 0.0, 1.0]);
        assert!(a.inverse().is_err());
    }

    #[test]
    fn test_header_prefers_sform() {
        let header = NiftiHeader {
            sform_code: 4,
            qform_code: 1,
            srow_x: [-2.0, 0.0, 0.0, 90.0],
            srow_y: [0.0, 2.0, 0.0, -126.0],
            srow_z: [0.0, 0.0, 2.0, -72.0],
            ..NiftiHeader::default()
        };
        assert_eq!(Affine::from_header(&header), mni_2mm());
    }

    #[test]
    fn test_header_qform_identity_rotation() {
        let header = NiftiHeader {
            sform_code: 0,
            qform_code: 1,
            quatern_b: 0.0,
            quatern_c: 0.0,
            quatern_d: 0.0,
            quatern_x: -10.0,
            quatern_y: 5.0,
            quatern_z: 0.5,
            pixdim: [-1.0, 3.0, 3.0, 4.0, 2.0, 0.0, 0.0, 0.0],
            ..NiftiHeader::default()
        };
        let expected = Affine::from_rows([
            [3.0, 0.0, 0.0, -10.0],
            [0.0, 3.0, 0.0, 5.0],
            [0.0, 0.0, -4.0, 0.5],
        ]);
        assert!(Affine::from_header(&header).approx_eq(&expected, 1e-6));
    }

    #[test]
    fn test_header_fallback_scaling() {
        let header = NiftiHeader {
            sform_code: 0,
            qform_code: 0,
            pixdim: [1.0, 2.0, 2.5, 3.0, 0.0, 0.0, 0.0, 0.0],
            ..NiftiHeader::default()
        };
        assert_eq!(Affine::from_header(&header), Affine::scaling([2.0, 2.5, 3.0]));
        assert_eq!(Affine::from_header(&header).zooms(), [2.0, 2.5, 3.0]);
    }
}
