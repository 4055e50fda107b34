use super::pos::VoxelPos;
use super::volume::Grid;

/// Walks every voxel of a grid in C order: `k` varies fastest, `i` slowest.
pub struct VoxelIter {
    cur: [usize; 3],
    shape: [usize; 3],
    done: bool,
}

impl VoxelIter {
    #[inline]
    pub fn new(shape: [usize; 3]) -> Self {
        Self {
            cur: [0; 3],
            shape,
            done: shape.iter().any(|&n| n == 0),
        }
    }
}

impl Iterator for VoxelIter {
    type Item = VoxelPos;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let ret_pos = VoxelPos::new(self.cur[0], self.cur[1], self.cur[2]);
        for axis in (0..3).rev() {
            if self.cur[axis] + 1 < self.shape[axis] {
                self.cur[axis] += 1;
                return Some(ret_pos);
            }
            self.cur[axis] = 0;
        }
        self.done = true;
        Some(ret_pos)
    }
}

impl From<&Grid> for VoxelIter {
    #[inline]
    fn from(g: &Grid) -> Self {
        VoxelIter::new(g.shape)
    }
}
