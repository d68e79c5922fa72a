//! Block decomposition of a volume and fan-out of per-block work.
//!
//! The engines tile the volume into cubic blocks and process each block on
//! one worker. Blocks own disjoint output regions, so no synchronization is
//! needed beyond joining all workers before returning.

use voxmorph_volume::VolumeSize;

/// Block edge length for volumes with depth above one.
const BLOCK_EDGE_3D: usize = 64;

/// Block edge length for planar volumes.
const BLOCK_EDGE_2D: usize = 512;

/// One axis-aligned unit of parallel work, with half-open voxel bounds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Block {
    pub xs: usize,
    pub xe: usize,
    pub ys: usize,
    pub ye: usize,
    pub zs: usize,
    pub ze: usize,
}

/// The processed span of an axis: `[trim, extent - trim)`, except that an
/// axis of extent one is never trimmed (its border checks vanish instead).
fn axis_span(extent: usize, trim: usize) -> (usize, usize) {
    if extent == 1 {
        (0, 1)
    } else {
        (trim, extent.saturating_sub(trim))
    }
}

/// Tile the trimmed region of `size` into blocks.
fn partition(size: VolumeSize, trim: usize) -> Vec<Block> {
    let edge = if size.depth > 1 {
        BLOCK_EDGE_3D
    } else {
        BLOCK_EDGE_2D
    };

    let (xlo, xhi) = axis_span(size.width, trim);
    let (ylo, yhi) = axis_span(size.height, trim);
    let (zlo, zhi) = axis_span(size.depth, trim);

    let grid_x = size.width.div_ceil(edge).max(1);
    let grid_y = size.height.div_ceil(edge).max(1);
    let grid_z = size.depth.div_ceil(edge).max(1);

    let mut blocks = Vec::with_capacity(grid_x * grid_y * grid_z);
    for gz in 0..grid_z {
        let zs = zlo.max(gz * edge);
        let ze = zhi.min((gz + 1) * edge);
        if zs >= ze {
            continue;
        }
        for gy in 0..grid_y {
            let ys = ylo.max(gy * edge);
            let ye = yhi.min((gy + 1) * edge);
            if ys >= ye {
                continue;
            }
            for gx in 0..grid_x {
                let xs = xlo.max(gx * edge);
                let xe = xhi.min((gx + 1) * edge);
                if xs >= xe {
                    continue;
                }
                blocks.push(Block {
                    xs,
                    xe,
                    ys,
                    ye,
                    zs,
                    ze,
                });
            }
        }
    }

    blocks
}

/// Run `f` on every block of the trimmed volume, fanning out to at most
/// `threads` workers.
///
/// A worker count of zero or one runs every block on the calling thread.
/// Blocks are handed out round-robin; there is no ordering guarantee
/// between them and the engines must not rely on one. The call returns
/// only after every block has completed.
pub(crate) fn for_each_block<F>(size: VolumeSize, trim: usize, threads: usize, f: F)
where
    F: Fn(&Block) + Send + Sync,
{
    let blocks = partition(size, trim);
    let workers = threads.min(blocks.len());

    if workers <= 1 {
        for block in &blocks {
            f(block);
        }
        return;
    }

    rayon::scope(|scope| {
        for worker in 0..workers {
            let blocks = &blocks;
            let f = &f;
            scope.spawn(move |_| {
                for block in blocks.iter().skip(worker).step_by(workers) {
                    f(block);
                }
            });
        }
    });
}

/// A raw view of the output buffer shared by concurrently running blocks.
///
/// Each block writes only voxel locations inside its own bounds and reads
/// back only locations it has written earlier in the same call, so no
/// location is ever touched by two workers.
pub(crate) struct SharedOutput<'a, T> {
    ptr: *mut T,
    len: usize,
    marker: std::marker::PhantomData<&'a mut [T]>,
}

// SAFETY: SharedOutput can be sent between threads because the blocks the
// partitioner emits cover disjoint voxel locations and every access goes
// through the owning block.
unsafe impl<T: Send> Send for SharedOutput<'_, T> {}

// SAFETY: SharedOutput can be shared between threads for the same reason;
// no location is read by one worker while another writes it.
unsafe impl<T: Sync> Sync for SharedOutput<'_, T> {}

impl<'a, T: Copy> SharedOutput<'a, T> {
    pub(crate) fn new(slice: &'a mut [T]) -> Self {
        Self {
            ptr: slice.as_mut_ptr(),
            len: slice.len(),
            marker: std::marker::PhantomData,
        }
    }

    /// Read back a voxel this block has already written (or its initial
    /// zero).
    #[inline]
    pub(crate) fn get(&self, loc: usize) -> T {
        debug_assert!(loc < self.len);
        // SAFETY: loc is inside the buffer and inside the calling block's
        // region, which no other worker touches.
        unsafe { *self.ptr.add(loc) }
    }

    /// Write a voxel inside the calling block's region.
    #[inline]
    pub(crate) fn set(&self, loc: usize, value: T) {
        debug_assert!(loc < self.len);
        // SAFETY: loc is inside the buffer and inside the calling block's
        // region, which no other worker touches.
        unsafe { *self.ptr.add(loc) = value }
    }
}

#[cfg(test)]
mod tests {
    use super::{axis_span, for_each_block, partition, SharedOutput};
    use voxmorph_volume::VolumeSize;

    fn size(width: usize, height: usize, depth: usize) -> VolumeSize {
        VolumeSize {
            width,
            height,
            depth,
        }
    }

    #[test]
    fn test_axis_span() {
        assert_eq!(axis_span(10, 0), (0, 10));
        assert_eq!(axis_span(10, 1), (1, 9));
        assert_eq!(axis_span(2, 1), (1, 1));
        assert_eq!(axis_span(1, 1), (0, 1));
        assert_eq!(axis_span(1, 0), (0, 1));
    }

    #[test]
    fn test_partition_single_block() {
        let blocks = partition(size(10, 10, 10), 0);
        assert_eq!(blocks.len(), 1);
        let block = blocks[0];
        assert_eq!((block.xs, block.xe), (0, 10));
        assert_eq!((block.ys, block.ye), (0, 10));
        assert_eq!((block.zs, block.ze), (0, 10));
    }

    #[test]
    fn test_partition_splits_along_x() {
        let blocks = partition(size(130, 4, 4), 0);
        assert_eq!(blocks.len(), 3);
        assert_eq!((blocks[0].xs, blocks[0].xe), (0, 64));
        assert_eq!((blocks[1].xs, blocks[1].xe), (64, 128));
        assert_eq!((blocks[2].xs, blocks[2].xe), (128, 130));
    }

    #[test]
    fn test_partition_planar_block_edge() {
        // depth of one selects the wide planar blocks
        let blocks = partition(size(600, 600, 1), 0);
        assert_eq!(blocks.len(), 4);
        assert_eq!((blocks[0].xs, blocks[0].xe), (0, 512));
        assert_eq!((blocks[3].xs, blocks[3].xe), (512, 600));
        assert_eq!((blocks[3].ys, blocks[3].ye), (512, 600));
    }

    #[test]
    fn test_partition_trim() {
        let blocks = partition(size(10, 10, 10), 1);
        assert_eq!(blocks.len(), 1);
        let block = blocks[0];
        assert_eq!((block.xs, block.xe), (1, 9));
        assert_eq!((block.ys, block.ye), (1, 9));
        assert_eq!((block.zs, block.ze), (1, 9));
    }

    #[test]
    fn test_partition_trim_degenerate_axes() {
        // an axis of extent one is processed untrimmed, extent two is all
        // border and disappears
        let blocks = partition(size(5, 1, 1), 1);
        assert_eq!(blocks.len(), 1);
        assert_eq!((blocks[0].xs, blocks[0].xe), (1, 4));
        assert_eq!((blocks[0].ys, blocks[0].ye), (0, 1));
        assert_eq!((blocks[0].zs, blocks[0].ze), (0, 1));

        assert!(partition(size(5, 2, 1), 1).is_empty());
    }

    #[test]
    fn test_partition_covers_each_voxel_once() {
        for trim in [0usize, 1] {
            let sz = size(70, 66, 3);
            let mut seen = vec![0u8; 70 * 66 * 3];
            for block in partition(sz, trim) {
                for z in block.zs..block.ze {
                    for y in block.ys..block.ye {
                        for x in block.xs..block.xe {
                            seen[x + 70 * (y + 66 * z)] += 1;
                        }
                    }
                }
            }
            for z in 0..3 {
                for y in 0..66 {
                    for x in 0..70 {
                        let interior = x >= trim
                            && x < 70 - trim
                            && y >= trim
                            && y < 66 - trim
                            && z >= trim
                            && z < 3 - trim;
                        let expected = u8::from(interior);
                        assert_eq!(seen[x + 70 * (y + 66 * z)], expected);
                    }
                }
            }
        }
    }

    #[test]
    fn test_for_each_block_runs_every_block() {
        let mut output = vec![0u32; 130 * 5 * 5];
        let shared = SharedOutput::new(&mut output);
        for threads in [0usize, 1, 4, 16] {
            for_each_block(size(130, 5, 5), 0, threads, |block| {
                for z in block.zs..block.ze {
                    for y in block.ys..block.ye {
                        for x in block.xs..block.xe {
                            let loc = x + 130 * (y + 5 * z);
                            shared.set(loc, shared.get(loc) + 1);
                        }
                    }
                }
            });
        }
        assert!(output.iter().all(|&count| count == 4));
    }
}
