use voxmorph_volume::{Volume, VolumeError, VolumeSize, VoxelType};

use crate::block::{for_each_block, Block, SharedOutput};
use crate::smallsort;

// Combined middle+right column sizes above which a uniform pair decides the
// next voxel's mode as well.
const UNIFORM_PAIR_3D: usize = 14;
const UNIFORM_PAIR_2D: usize = 5;

// Winning run counts above which the mode carries over to the next voxel.
const LOOKAHEAD_3D: usize = 23;
const LOOKAHEAD_2D: usize = 8;

/// Dilate a labeled volume with a 3x3x3 stencil, all cells active.
///
/// Each output voxel receives the most frequent nonzero label of its
/// neighborhood, intersected with the volume. On a tied count the smallest
/// of the tied labels wins. Voxels whose whole neighborhood is background
/// stay background.
///
/// # Arguments
///
/// * `labels` - The input labeled volume.
/// * `output` - The output volume. It is overwritten and must have the
///   same size as `labels`.
/// * `background_only` - When true, foreground voxels are copied through
///   unchanged and only background voxels are filled in; when false the
///   mode may overwrite foreground labels.
/// * `threads` - Worker count for the block fan-out. Zero or one runs on
///   the calling thread.
///
/// # Errors
///
/// Returns an error when the two volumes differ in size.
///
/// # Examples
///
/// ```
/// use voxmorph_ops::multilabel_dilate_3d;
/// use voxmorph_volume::{Volume, VolumeSize};
///
/// let size = VolumeSize { width: 3, height: 3, depth: 3 };
/// let mut data = vec![0u8; 27];
/// data[1 + 3 * (1 + 3 * 1)] = 5;
/// let labels = Volume::new(size, data).unwrap();
/// let mut output = Volume::from_size_val(size, 0u8).unwrap();
///
/// multilabel_dilate_3d(&labels, &mut output, true, 0).unwrap();
/// assert!(output.as_slice().iter().all(|&v| v == 5));
/// ```
pub fn multilabel_dilate_3d<T: VoxelType>(
    labels: &Volume<T>,
    output: &mut Volume<T>,
    background_only: bool,
    threads: usize,
) -> Result<(), VolumeError> {
    if labels.size() != output.size() {
        return Err(VolumeError::SizeMismatch(labels.size(), output.size()));
    }
    if labels.is_empty() {
        return Ok(());
    }

    let size = labels.size();
    let src = labels.as_slice();
    let dst = output.as_slice_mut();
    dst.fill(T::default());
    let out = SharedOutput::new(dst);

    for_each_block(size, 0, threads, |block| {
        process_block_3d(src, &out, size, block, background_only);
    });

    Ok(())
}

/// Dilate a planar labeled volume with a 3x3 stencil, all cells active.
///
/// The planar counterpart of [`multilabel_dilate_3d`].
///
/// # Errors
///
/// Returns an error when the volume depth is not one or the two volumes
/// differ in size.
pub fn multilabel_dilate_2d<T: VoxelType>(
    labels: &Volume<T>,
    output: &mut Volume<T>,
    background_only: bool,
    threads: usize,
) -> Result<(), VolumeError> {
    if !labels.size().is_planar() {
        return Err(VolumeError::NotTwoDimensional(labels.size()));
    }
    if labels.size() != output.size() {
        return Err(VolumeError::SizeMismatch(labels.size(), output.size()));
    }
    if labels.is_empty() {
        return Ok(());
    }

    let size = labels.size();
    let src = labels.as_slice();
    let dst = output.as_slice_mut();
    dst.fill(T::default());
    let out = SharedOutput::new(dst);

    for_each_block(size, 0, threads, |block| {
        process_block_2d(src, &out, size, block, background_only);
    });

    Ok(())
}

/// Dilate a labeled volume, selecting the planar engine for volumes of
/// depth one.
///
/// # Errors
///
/// Returns an error when the two volumes differ in size.
pub fn multilabel_dilate<T: VoxelType>(
    labels: &Volume<T>,
    output: &mut Volume<T>,
    background_only: bool,
    threads: usize,
) -> Result<(), VolumeError> {
    if labels.size().is_planar() {
        multilabel_dilate_2d(labels, output, background_only, threads)
    } else {
        multilabel_dilate_3d(labels, output, background_only, threads)
    }
}

/// The three-column stencil window advanced along a row, plus the scratch
/// buffer the mode is computed in. Columns hold only the nonzero labels of
/// their 3x3 (or 3x1) slice of the neighborhood.
struct StencilState<T> {
    left: Vec<T>,
    middle: Vec<T>,
    right: Vec<T>,
    neighbors: Vec<T>,
}

impl<T: VoxelType> StencilState<T> {
    fn with_capacity(column: usize, total: usize) -> Self {
        Self {
            left: Vec::with_capacity(column),
            middle: Vec::with_capacity(column),
            right: Vec::with_capacity(column),
            neighbors: Vec::with_capacity(total),
        }
    }

    /// Shift the window one column to the right; the old left column ends
    /// up in `right` and must be refilled by the caller.
    fn rotate(&mut self) {
        std::mem::swap(&mut self.left, &mut self.middle);
        std::mem::swap(&mut self.middle, &mut self.right);
    }

    /// Concatenate the three columns into the scratch buffer.
    fn gather(&mut self) -> usize {
        self.neighbors.clear();
        self.neighbors.extend_from_slice(&self.left);
        self.neighbors.extend_from_slice(&self.middle);
        self.neighbors.extend_from_slice(&self.right);
        self.neighbors.len()
    }

    fn is_empty(&self) -> bool {
        self.left.is_empty() && self.middle.is_empty() && self.right.is_empty()
    }
}

/// Collect the nonzero labels of the 3x3 column at `xi` into `column`.
fn fill_column_3d<T: VoxelType>(
    labels: &[T],
    size: VolumeSize,
    xi: isize,
    y: usize,
    z: usize,
    column: &mut Vec<T>,
) {
    column.clear();
    if xi < 0 || xi as usize >= size.width {
        return;
    }

    let (sx, sy, sz) = (size.width, size.height, size.depth);
    let sxy = sx * sy;
    let zero = T::default();
    let loc = xi as usize + sx * (y + sy * z);

    if labels[loc] != zero {
        column.push(labels[loc]);
    }
    if y > 0 && labels[loc - sx] != zero {
        column.push(labels[loc - sx]);
    }
    if y + 1 < sy && labels[loc + sx] != zero {
        column.push(labels[loc + sx]);
    }
    if z > 0 && labels[loc - sxy] != zero {
        column.push(labels[loc - sxy]);
    }
    if z + 1 < sz && labels[loc + sxy] != zero {
        column.push(labels[loc + sxy]);
    }
    if y > 0 && z > 0 && labels[loc - sx - sxy] != zero {
        column.push(labels[loc - sx - sxy]);
    }
    if y + 1 < sy && z > 0 && labels[loc + sx - sxy] != zero {
        column.push(labels[loc + sx - sxy]);
    }
    if y > 0 && z + 1 < sz && labels[loc - sx + sxy] != zero {
        column.push(labels[loc - sx + sxy]);
    }
    if y + 1 < sy && z + 1 < sz && labels[loc + sx + sxy] != zero {
        column.push(labels[loc + sx + sxy]);
    }
}

/// Collect only the `z + 1` slab of the column at `xi`. Valid when the
/// voxel below resolved to background, which proves the two lower slabs of
/// the column hold no labels.
fn fill_column_3d_top<T: VoxelType>(
    labels: &[T],
    size: VolumeSize,
    xi: isize,
    y: usize,
    z: usize,
    column: &mut Vec<T>,
) {
    column.clear();
    if xi < 0 || xi as usize >= size.width {
        return;
    }

    let (sx, sy, sz) = (size.width, size.height, size.depth);
    let sxy = sx * sy;
    let zero = T::default();
    let loc = xi as usize + sx * (y + sy * z);

    if z + 1 < sz && labels[loc + sxy] != zero {
        column.push(labels[loc + sxy]);
    }
    if y > 0 && z + 1 < sz && labels[loc - sx + sxy] != zero {
        column.push(labels[loc - sx + sxy]);
    }
    if y + 1 < sy && z + 1 < sz && labels[loc + sx + sxy] != zero {
        column.push(labels[loc + sx + sxy]);
    }
}

/// Collect the nonzero labels of the 3x1 column at `xi` into `column`.
fn fill_column_2d<T: VoxelType>(
    labels: &[T],
    size: VolumeSize,
    xi: isize,
    y: usize,
    column: &mut Vec<T>,
) {
    column.clear();
    if xi < 0 || xi as usize >= size.width {
        return;
    }

    let (sx, sy) = (size.width, size.height);
    let zero = T::default();
    let loc = xi as usize + sx * y;

    if labels[loc] != zero {
        column.push(labels[loc]);
    }
    if y > 0 && labels[loc - sx] != zero {
        column.push(labels[loc - sx]);
    }
    if y + 1 < sy && labels[loc + sx] != zero {
        column.push(labels[loc + sx]);
    }
}

/// Mode of an ascending-sorted nonempty multiset, returning the winning
/// label and the run count the scan finished with. On a tied count the run
/// seen earlier (the smaller label) is kept.
fn mode_of_sorted<T: VoxelType>(neighbors: &[T]) -> (T, usize) {
    let size = neighbors.len();
    let mut mode = neighbors[0];
    let mut ct = 1usize;
    let mut max_ct = 1usize;

    for i in 1..size {
        if neighbors[i] != neighbors[i - 1] {
            if ct > max_ct {
                mode = neighbors[i - 1];
                max_ct = ct;
            }
            ct = 1;
            // no remaining run can beat the current best
            if size - i < max_ct {
                break;
            }
        } else {
            ct += 1;
        }
    }

    if ct > max_ct {
        mode = neighbors[size - 1];
    }

    (mode, ct)
}

fn process_block_3d<T: VoxelType>(
    labels: &[T],
    out: &SharedOutput<T>,
    size: VolumeSize,
    block: &Block,
    background_only: bool,
) {
    let (sx, sy) = (size.width, size.height);
    let sxy = sx * sy;
    let zero = T::default();
    let mut st = StencilState::with_capacity(9, 27);

    for z in block.zs..block.ze {
        for y in block.ys..block.ye {
            let mut stale = 3usize;
            let mut x = block.xs;

            while x < block.xe {
                let loc = x + sx * (y + sy * z);

                if background_only && labels[loc] != zero {
                    out.set(loc, labels[loc]);
                    stale += 1;
                    x += 1;
                    continue;
                }

                let xi = x as isize;
                if z > block.zs && out.get(loc - sxy) == zero {
                    // the voxel below resolved to background, so the two
                    // lower slabs of all three columns are empty
                    match stale {
                        1 => {
                            st.rotate();
                            fill_column_3d_top(labels, size, xi + 1, y, z, &mut st.right);
                        }
                        2 => {
                            std::mem::swap(&mut st.left, &mut st.right);
                            fill_column_3d_top(labels, size, xi, y, z, &mut st.middle);
                            fill_column_3d_top(labels, size, xi + 1, y, z, &mut st.right);
                        }
                        _ => {
                            fill_column_3d_top(labels, size, xi - 1, y, z, &mut st.left);
                            fill_column_3d_top(labels, size, xi, y, z, &mut st.middle);
                            fill_column_3d_top(labels, size, xi + 1, y, z, &mut st.right);
                        }
                    }
                } else {
                    match stale {
                        1 => {
                            st.rotate();
                            fill_column_3d(labels, size, xi + 1, y, z, &mut st.right);
                        }
                        2 => {
                            std::mem::swap(&mut st.left, &mut st.right);
                            fill_column_3d(labels, size, xi, y, z, &mut st.middle);
                            fill_column_3d(labels, size, xi + 1, y, z, &mut st.right);
                        }
                        _ => {
                            fill_column_3d(labels, size, xi - 1, y, z, &mut st.left);
                            fill_column_3d(labels, size, xi, y, z, &mut st.middle);
                            fill_column_3d(labels, size, xi + 1, y, z, &mut st.right);
                        }
                    }
                }

                if st.is_empty() {
                    stale = 1;
                    x += 1;
                    continue;
                }

                smallsort::sort(&mut st.middle);
                smallsort::sort(&mut st.right);

                if st.right.len() + st.middle.len() >= UNIFORM_PAIR_3D
                    && st.right.first() == st.right.last()
                    && st.middle.first() == st.middle.last()
                    && st.right.first() == st.middle.first()
                {
                    let label = st.right[0];
                    out.set(loc, label);
                    if x + 1 < block.xe {
                        out.set(loc + 1, label);
                        stale = 2;
                        x += 2;
                    } else {
                        stale = 1;
                        x += 1;
                    }
                    continue;
                }

                let total = st.gather();
                smallsort::sort(&mut st.neighbors);

                // middle and right become the next voxel's left and middle
                // and dominate its neighborhood
                if st.neighbors.first() == st.neighbors.last() {
                    let label = st.neighbors[0];
                    out.set(loc, label);
                    if total >= LOOKAHEAD_3D && x + 1 < block.xe {
                        out.set(loc + 1, label);
                        stale = 2;
                        x += 2;
                    } else {
                        stale = 1;
                        x += 1;
                    }
                    continue;
                }

                let (mode, run) = mode_of_sorted(&st.neighbors);
                out.set(loc, mode);

                if run >= LOOKAHEAD_3D && x + 1 < block.xe {
                    out.set(loc + 1, mode);
                    stale = 2;
                    x += 2;
                    continue;
                }

                stale = 1;
                x += 1;
            }
        }
    }
}

fn process_block_2d<T: VoxelType>(
    labels: &[T],
    out: &SharedOutput<T>,
    size: VolumeSize,
    block: &Block,
    background_only: bool,
) {
    let sx = size.width;
    let zero = T::default();
    let mut st = StencilState::with_capacity(3, 9);

    for y in block.ys..block.ye {
        let mut stale = 3usize;
        let mut x = block.xs;

        while x < block.xe {
            let loc = x + sx * y;

            if background_only && labels[loc] != zero {
                out.set(loc, labels[loc]);
                stale += 1;
                x += 1;
                continue;
            }

            let xi = x as isize;
            match stale {
                1 => {
                    st.rotate();
                    fill_column_2d(labels, size, xi + 1, y, &mut st.right);
                }
                2 => {
                    std::mem::swap(&mut st.left, &mut st.right);
                    fill_column_2d(labels, size, xi, y, &mut st.middle);
                    fill_column_2d(labels, size, xi + 1, y, &mut st.right);
                }
                _ => {
                    fill_column_2d(labels, size, xi - 1, y, &mut st.left);
                    fill_column_2d(labels, size, xi, y, &mut st.middle);
                    fill_column_2d(labels, size, xi + 1, y, &mut st.right);
                }
            }

            if st.is_empty() {
                stale = 1;
                x += 1;
                continue;
            }

            smallsort::sort(&mut st.middle);
            smallsort::sort(&mut st.right);

            if st.right.len() + st.middle.len() >= UNIFORM_PAIR_2D
                && st.right.first() == st.right.last()
                && st.middle.first() == st.middle.last()
                && st.right.first() == st.middle.first()
            {
                let label = st.right[0];
                out.set(loc, label);
                if x + 1 < block.xe {
                    out.set(loc + 1, label);
                    stale = 2;
                    x += 2;
                } else {
                    stale = 1;
                    x += 1;
                }
                continue;
            }

            st.gather();
            smallsort::sort(&mut st.neighbors);

            if st.neighbors.first() == st.neighbors.last() {
                out.set(loc, st.neighbors[0]);
                stale = 1;
                x += 1;
                continue;
            }

            let (mode, run) = mode_of_sorted(&st.neighbors);
            out.set(loc, mode);

            if run >= LOOKAHEAD_2D && x + 1 < block.xe {
                out.set(loc + 1, mode);
                stale = 2;
                x += 2;
                continue;
            }

            stale = 1;
            x += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use voxmorph_volume::{Volume, VolumeError, VolumeSize, VoxelType};

    use super::{multilabel_dilate, multilabel_dilate_2d, multilabel_dilate_3d};

    fn size(width: usize, height: usize, depth: usize) -> VolumeSize {
        VolumeSize {
            width,
            height,
            depth,
        }
    }

    /// Plain triple-loop dilation with the same mode and tie-break rules.
    fn reference_dilate<T: VoxelType>(labels: &Volume<T>, background_only: bool) -> Volume<T> {
        let sz = labels.size();
        let mut output = Volume::from_size_val(sz, T::default()).unwrap();
        let src = labels.as_slice();
        let dst = output.as_slice_mut();
        let zero = T::default();

        for z in 0..sz.depth {
            for y in 0..sz.height {
                for x in 0..sz.width {
                    let loc = x + sz.width * (y + sz.height * z);
                    if background_only && src[loc] != zero {
                        dst[loc] = src[loc];
                        continue;
                    }

                    let mut neighbors = Vec::new();
                    for dz in -1i64..=1 {
                        for dy in -1i64..=1 {
                            for dx in -1i64..=1 {
                                let nx = x as i64 + dx;
                                let ny = y as i64 + dy;
                                let nz = z as i64 + dz;
                                if nx < 0
                                    || nx >= sz.width as i64
                                    || ny < 0
                                    || ny >= sz.height as i64
                                    || nz < 0
                                    || nz >= sz.depth as i64
                                {
                                    continue;
                                }
                                let nloc = nx as usize
                                    + sz.width * (ny as usize + sz.height * nz as usize);
                                if src[nloc] != zero {
                                    neighbors.push(src[nloc]);
                                }
                            }
                        }
                    }

                    if neighbors.is_empty() {
                        continue;
                    }
                    neighbors.sort_unstable();

                    let mut mode = neighbors[0];
                    let mut ct = 1usize;
                    let mut max_ct = 1usize;
                    for i in 1..neighbors.len() {
                        if neighbors[i] != neighbors[i - 1] {
                            if ct > max_ct {
                                mode = neighbors[i - 1];
                                max_ct = ct;
                            }
                            ct = 1;
                        } else {
                            ct += 1;
                        }
                    }
                    if ct > max_ct {
                        mode = neighbors[neighbors.len() - 1];
                    }
                    dst[loc] = mode;
                }
            }
        }

        output
    }

    #[test]
    fn test_single_voxel_fills_cube() -> Result<(), VolumeError> {
        let sz = size(3, 3, 3);
        let mut data = vec![0u8; 27];
        data[1 + 3 * (1 + 3 * 1)] = 5;
        let labels = Volume::new(sz, data)?;

        for background_only in [true, false] {
            let mut output = Volume::from_size_val(sz, 0u8)?;
            multilabel_dilate_3d(&labels, &mut output, background_only, 0)?;
            assert!(output.as_slice().iter().all(|&v| v == 5));
        }

        Ok(())
    }

    #[test]
    fn test_planar_mode_and_tie_break() -> Result<(), VolumeError> {
        // labels, by row: [1,1,2] / [1,1,2] / [2,2,2]
        let sz = size(3, 3, 1);
        let labels = Volume::new(sz, vec![1u8, 1, 2, 1, 1, 2, 2, 2, 2])?;
        let mut output = Volume::from_size_val(sz, 0u8)?;
        multilabel_dilate_2d(&labels, &mut output, false, 0)?;

        assert_eq!(output.get(0, 0, 0), Some(&1));
        assert_eq!(output.get(1, 1, 0), Some(&2));
        assert_eq!(output.get(2, 2, 0), Some(&2));

        let expected = reference_dilate(&labels, false);
        assert_eq!(output.as_slice(), expected.as_slice());

        Ok(())
    }

    #[test]
    fn test_tie_break_prefers_smaller_label() -> Result<(), VolumeError> {
        let sz = size(3, 1, 1);
        let labels = Volume::new(sz, vec![1u8, 2, 0])?;
        let mut output = Volume::from_size_val(sz, 0u8)?;
        multilabel_dilate_2d(&labels, &mut output, false, 0)?;

        // voxels 0 and 1 see {1, 2} and tie toward 1; voxel 2 sees only {2}
        assert_eq!(output.as_slice(), &[1, 1, 2]);

        let mut output_3d = Volume::from_size_val(sz, 0u8)?;
        multilabel_dilate_3d(&labels, &mut output_3d, false, 0)?;
        assert_eq!(output_3d.as_slice(), &[1, 1, 2]);

        Ok(())
    }

    #[test]
    fn test_line_dilates_to_full_row() -> Result<(), VolumeError> {
        let sz = size(5, 1, 1);
        let labels = Volume::new(sz, vec![0u8, 1, 1, 1, 0])?;
        let mut output = Volume::from_size_val(sz, 0u8)?;
        multilabel_dilate(&labels, &mut output, false, 0)?;
        assert_eq!(output.as_slice(), &[1, 1, 1, 1, 1]);

        Ok(())
    }

    #[test]
    fn test_all_zero_stays_zero() -> Result<(), VolumeError> {
        let sz = size(6, 5, 4);
        let labels = Volume::from_size_val(sz, 0u16)?;
        let mut output = Volume::from_size_val(sz, 0u16)?;
        multilabel_dilate_3d(&labels, &mut output, false, 2)?;
        assert!(output.as_slice().iter().all(|&v| v == 0));

        Ok(())
    }

    #[test]
    fn test_uniform_volume_is_fixed_point() -> Result<(), VolumeError> {
        let sz = size(20, 6, 6);
        let labels = Volume::from_size_val(sz, 9u32)?;
        let mut output = Volume::from_size_val(sz, 0u32)?;
        multilabel_dilate_3d(&labels, &mut output, false, 2)?;
        assert_eq!(output.as_slice(), labels.as_slice());

        Ok(())
    }

    #[test]
    fn test_background_only_preserves_foreground() -> Result<(), VolumeError> {
        let mut rng = StdRng::seed_from_u64(11);
        let sz = size(9, 8, 7);
        let data: Vec<u8> = (0..sz.numel().unwrap())
            .map(|_| rng.random_range(0..4))
            .collect();
        let labels = Volume::new(sz, data)?;
        let mut output = Volume::from_size_val(sz, 0u8)?;
        multilabel_dilate_3d(&labels, &mut output, true, 0)?;

        for (idx, &label) in labels.as_slice().iter().enumerate() {
            if label != 0 {
                assert_eq!(output.as_slice()[idx], label);
            }
        }

        Ok(())
    }

    #[test]
    fn test_matches_reference_3d() -> Result<(), VolumeError> {
        let mut rng = StdRng::seed_from_u64(23);
        for (w, h, d) in [(4, 4, 4), (7, 5, 3), (3, 1, 7), (1, 6, 6), (9, 9, 2)] {
            let sz = size(w, h, d);
            for background_only in [false, true] {
                let data: Vec<u8> = (0..sz.numel().unwrap())
                    .map(|_| rng.random_range(0..5))
                    .collect();
                let labels = Volume::new(sz, data)?;
                let expected = reference_dilate(&labels, background_only);
                let mut output = Volume::from_size_val(sz, 0u8)?;
                multilabel_dilate_3d(&labels, &mut output, background_only, 1)?;
                assert_eq!(
                    output.as_slice(),
                    expected.as_slice(),
                    "size {sz} background_only {background_only}"
                );
            }
        }

        Ok(())
    }

    #[test]
    fn test_matches_reference_3d_sparse() -> Result<(), VolumeError> {
        // mostly background, exercising the restricted column refill that
        // relies on the voxel below having resolved to background
        let mut rng = StdRng::seed_from_u64(29);
        let sz = size(12, 10, 8);
        for round in 0..4 {
            let data: Vec<u16> = (0..sz.numel().unwrap())
                .map(|_| {
                    if rng.random_range(0..10) < 2 {
                        rng.random_range(1..4)
                    } else {
                        0
                    }
                })
                .collect();
            let labels = Volume::new(sz, data)?;
            let expected = reference_dilate(&labels, false);
            let mut output = Volume::from_size_val(sz, 0u16)?;
            multilabel_dilate_3d(&labels, &mut output, false, 0)?;
            assert_eq!(output.as_slice(), expected.as_slice(), "round {round}");
        }

        Ok(())
    }

    #[test]
    fn test_matches_reference_signed_labels() -> Result<(), VolumeError> {
        // negative labels are ordinary labels
        let mut rng = StdRng::seed_from_u64(31);
        let sz = size(6, 6, 5);
        let data: Vec<i32> = (0..sz.numel().unwrap())
            .map(|_| rng.random_range(-3..3))
            .collect();
        let labels = Volume::new(sz, data)?;
        let expected = reference_dilate(&labels, false);
        let mut output = Volume::from_size_val(sz, 0i32)?;
        multilabel_dilate_3d(&labels, &mut output, false, 0)?;
        assert_eq!(output.as_slice(), expected.as_slice());

        Ok(())
    }

    #[test]
    fn test_matches_reference_2d() -> Result<(), VolumeError> {
        let mut rng = StdRng::seed_from_u64(37);
        for (w, h) in [(4, 4), (9, 3), (1, 8), (17, 11)] {
            let sz = size(w, h, 1);
            for background_only in [false, true] {
                let data: Vec<u8> = (0..sz.numel().unwrap())
                    .map(|_| rng.random_range(0..4))
                    .collect();
                let labels = Volume::new(sz, data)?;
                let expected = reference_dilate(&labels, background_only);
                let mut output = Volume::from_size_val(sz, 0u8)?;
                multilabel_dilate_2d(&labels, &mut output, background_only, 0)?;
                assert_eq!(
                    output.as_slice(),
                    expected.as_slice(),
                    "size {sz} background_only {background_only}"
                );
            }
        }

        Ok(())
    }

    #[test]
    fn test_block_boundaries_3d() -> Result<(), VolumeError> {
        // wider than one 64-voxel block along x, so pair emits and column
        // reuse run into block edges
        let mut rng = StdRng::seed_from_u64(41);
        let sz = size(130, 4, 3);
        let data: Vec<u8> = (0..sz.numel().unwrap())
            .map(|_| rng.random_range(0..3))
            .collect();
        let labels = Volume::new(sz, data)?;
        let expected = reference_dilate(&labels, false);

        for threads in [0usize, 1, 4] {
            let mut output = Volume::from_size_val(sz, 0u8)?;
            multilabel_dilate_3d(&labels, &mut output, false, threads)?;
            assert_eq!(output.as_slice(), expected.as_slice(), "threads {threads}");
        }

        Ok(())
    }

    #[test]
    fn test_block_boundaries_2d() -> Result<(), VolumeError> {
        let mut rng = StdRng::seed_from_u64(43);
        let sz = size(1030, 3, 1);
        let data: Vec<u8> = (0..sz.numel().unwrap())
            .map(|_| rng.random_range(0..3))
            .collect();
        let labels = Volume::new(sz, data)?;
        let expected = reference_dilate(&labels, false);

        for threads in [0usize, 3] {
            let mut output = Volume::from_size_val(sz, 0u8)?;
            multilabel_dilate_2d(&labels, &mut output, false, threads)?;
            assert_eq!(output.as_slice(), expected.as_slice(), "threads {threads}");
        }

        Ok(())
    }

    #[test]
    fn test_deterministic_across_thread_counts() -> Result<(), VolumeError> {
        let mut rng = StdRng::seed_from_u64(47);
        let sz = size(70, 70, 5);
        let data: Vec<u64> = (0..sz.numel().unwrap())
            .map(|_| rng.random_range(0..6))
            .collect();
        let labels = Volume::new(sz, data)?;

        let mut baseline = Volume::from_size_val(sz, 0u64)?;
        multilabel_dilate_3d(&labels, &mut baseline, false, 0)?;

        for threads in [1usize, 2, 4, 8] {
            let mut output = Volume::from_size_val(sz, 0u64)?;
            multilabel_dilate_3d(&labels, &mut output, false, threads)?;
            assert_eq!(output.as_slice(), baseline.as_slice(), "threads {threads}");
        }

        Ok(())
    }

    #[test]
    fn test_size_mismatch_is_an_error() -> Result<(), VolumeError> {
        let labels = Volume::from_size_val(size(4, 4, 4), 0u8)?;
        let mut output = Volume::from_size_val(size(4, 4, 5), 0u8)?;
        assert!(matches!(
            multilabel_dilate_3d(&labels, &mut output, false, 0),
            Err(VolumeError::SizeMismatch(_, _))
        ));

        Ok(())
    }

    #[test]
    fn test_planar_entry_rejects_deep_volume() -> Result<(), VolumeError> {
        let labels = Volume::from_size_val(size(4, 4, 2), 0u8)?;
        let mut output = Volume::from_size_val(size(4, 4, 2), 0u8)?;
        assert!(matches!(
            multilabel_dilate_2d(&labels, &mut output, false, 0),
            Err(VolumeError::NotTwoDimensional(_))
        ));

        Ok(())
    }

    #[test]
    fn test_empty_volume() -> Result<(), VolumeError> {
        let labels = Volume::<u8>::new(size(0, 4, 4), vec![])?;
        let mut output = Volume::<u8>::new(size(0, 4, 4), vec![])?;
        multilabel_dilate_3d(&labels, &mut output, false, 4)?;
        assert!(output.is_empty());

        Ok(())
    }
}
