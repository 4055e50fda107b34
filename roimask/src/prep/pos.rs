/// A voxel index `(i, j, k)` in array order. Not bounds checked.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct VoxelPos {
    pub i: usize,
    pub j: usize,
    pub k: usize,
}

impl VoxelPos {
    #[inline]
    pub fn new(i: usize, j: usize, k: usize) -> Self {
        Self { i, j, k }
    }

    /// Index usable with `ndarray` (`array[pos.index()]`).
    #[inline]
    pub fn index(self) -> [usize; 3] {
        [self.i, self.j, self.k]
    }

    /// Nearest voxel to a continuous voxel coordinate, or `None` when it falls outside `shape`.
    pub fn nearest(point: [f64; 3], shape: [usize; 3]) -> Option<Self> {
        let mut idx = [0usize; 3];
        for axis in 0..3 {
            let v = point[axis].round();
            if !v.is_finite() || v < 0.0 || v >= shape[axis] as f64 {
                return None;
            }
            idx[axis] = v as usize;
        }
        Some(Self::new(idx[0], idx[1], idx[2]))
    }
}

impl From<(usize, usize, usize)> for VoxelPos {
    #[inline]
    fn from(pos: (usize, usize, usize)) -> Self {
        VoxelPos::new(pos.0, pos.1, pos.2)
    }
}
