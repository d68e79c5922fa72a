//! Grayscale morphology: maximum (dilation) and minimum (erosion) over a
//! 3x3x3 or 3x3 neighborhood.
//!
//! Both operators share one stencil engine parameterized by the reduction.
//! Out-of-bounds neighbors are omitted. The engine short-circuits on the
//! saturated value of the element type: once a voxel or a whole column
//! reaches it, nearby results are already decided and are emitted without
//! further reads.

use voxmorph_volume::{Volume, VolumeError, VolumeSize, VoxelType};

use crate::block::{for_each_block, Block, SharedOutput};

/// The reduction an engine instance runs with.
trait Extremum<T: VoxelType> {
    /// Combine two values, keeping the reduction's extremum.
    fn pick(a: T, b: T) -> T;
    /// Absorbing value of the reduction; reaching it decides the result.
    fn sentinel() -> T;
    /// Neutral value contributed by absent columns.
    fn identity() -> T;
}

struct Max;

struct Min;

impl<T: VoxelType> Extremum<T> for Max {
    fn pick(a: T, b: T) -> T {
        a.max(b)
    }

    fn sentinel() -> T {
        T::max_value()
    }

    fn identity() -> T {
        T::min_value()
    }
}

impl<T: VoxelType> Extremum<T> for Min {
    fn pick(a: T, b: T) -> T {
        a.min(b)
    }

    fn sentinel() -> T {
        T::min_value()
    }

    fn identity() -> T {
        T::max_value()
    }
}

/// Dilate a grayscale volume with a 3x3x3 stencil, all cells active.
///
/// Each output voxel receives the maximum value of its neighborhood,
/// intersected with the volume.
///
/// # Arguments
///
/// * `labels` - The input volume.
/// * `output` - The output volume. It is overwritten and must have the
///   same size as `labels`.
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
/// use voxmorph_ops::grey_dilate_3d;
/// use voxmorph_volume::{Volume, VolumeSize};
///
/// let size = VolumeSize { width: 5, height: 1, depth: 1 };
/// let labels = Volume::new(size, vec![0u8, 1, 1, 1, 0]).unwrap();
/// let mut output = Volume::from_size_val(size, 0u8).unwrap();
///
/// grey_dilate_3d(&labels, &mut output, 0).unwrap();
/// assert_eq!(output.as_slice(), &[1, 1, 1, 1, 1]);
/// ```
pub fn grey_dilate_3d<T: VoxelType>(
    labels: &Volume<T>,
    output: &mut Volume<T>,
    threads: usize,
) -> Result<(), VolumeError> {
    run_3d::<T, Max>(labels, output, threads)
}

/// Erode a grayscale volume with a 3x3x3 stencil, all cells active.
///
/// Each output voxel receives the minimum value of its neighborhood,
/// intersected with the volume.
///
/// # Errors
///
/// Returns an error when the two volumes differ in size.
pub fn grey_erode_3d<T: VoxelType>(
    labels: &Volume<T>,
    output: &mut Volume<T>,
    threads: usize,
) -> Result<(), VolumeError> {
    run_3d::<T, Min>(labels, output, threads)
}

/// Dilate a planar grayscale volume with a 3x3 stencil, all cells active.
///
/// The planar counterpart of [`grey_dilate_3d`].
///
/// # Errors
///
/// Returns an error when the volume depth is not one or the two volumes
/// differ in size.
pub fn grey_dilate_2d<T: VoxelType>(
    labels: &Volume<T>,
    output: &mut Volume<T>,
    threads: usize,
) -> Result<(), VolumeError> {
    run_2d::<T, Max>(labels, output, threads)
}

/// Erode a planar grayscale volume with a 3x3 stencil, all cells active.
///
/// The planar counterpart of [`grey_erode_3d`].
///
/// # Errors
///
/// Returns an error when the volume depth is not one or the two volumes
/// differ in size.
pub fn grey_erode_2d<T: VoxelType>(
    labels: &Volume<T>,
    output: &mut Volume<T>,
    threads: usize,
) -> Result<(), VolumeError> {
    run_2d::<T, Min>(labels, output, threads)
}

/// Dilate a grayscale volume, selecting the planar engine for volumes of
/// depth one.
///
/// # Errors
///
/// Returns an error when the two volumes differ in size.
pub fn grey_dilate<T: VoxelType>(
    labels: &Volume<T>,
    output: &mut Volume<T>,
    threads: usize,
) -> Result<(), VolumeError> {
    if labels.size().is_planar() {
        grey_dilate_2d(labels, output, threads)
    } else {
        grey_dilate_3d(labels, output, threads)
    }
}

/// Erode a grayscale volume, selecting the planar engine for volumes of
/// depth one.
///
/// # Errors
///
/// Returns an error when the two volumes differ in size.
pub fn grey_erode<T: VoxelType>(
    labels: &Volume<T>,
    output: &mut Volume<T>,
    threads: usize,
) -> Result<(), VolumeError> {
    if labels.size().is_planar() {
        grey_erode_2d(labels, output, threads)
    } else {
        grey_erode_3d(labels, output, threads)
    }
}

fn run_3d<T: VoxelType, E: Extremum<T>>(
    labels: &Volume<T>,
    output: &mut Volume<T>,
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
        process_block_3d::<T, E>(src, &out, size, block);
    });

    Ok(())
}

fn run_2d<T: VoxelType, E: Extremum<T>>(
    labels: &Volume<T>,
    output: &mut Volume<T>,
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
        process_block_2d::<T, E>(src, &out, size, block);
    });

    Ok(())
}

/// Reduce the 3x3 column at `xi`, or the identity when the column is
/// outside the volume.
fn column_extremum_3d<T: VoxelType, E: Extremum<T>>(
    labels: &[T],
    size: VolumeSize,
    xi: isize,
    y: usize,
    z: usize,
) -> T {
    if xi < 0 || xi as usize >= size.width {
        return E::identity();
    }

    let (sx, sy, sz) = (size.width, size.height, size.depth);
    let sxy = sx * sy;
    let loc = xi as usize + sx * (y + sy * z);

    let mut best = labels[loc];
    if y > 0 {
        best = E::pick(best, labels[loc - sx]);
    }
    if y + 1 < sy {
        best = E::pick(best, labels[loc + sx]);
    }
    if z > 0 {
        best = E::pick(best, labels[loc - sxy]);
    }
    if z + 1 < sz {
        best = E::pick(best, labels[loc + sxy]);
    }
    if y > 0 && z > 0 {
        best = E::pick(best, labels[loc - sx - sxy]);
    }
    if y + 1 < sy && z > 0 {
        best = E::pick(best, labels[loc + sx - sxy]);
    }
    if y > 0 && z + 1 < sz {
        best = E::pick(best, labels[loc - sx + sxy]);
    }
    if y + 1 < sy && z + 1 < sz {
        best = E::pick(best, labels[loc + sx + sxy]);
    }

    best
}

/// Reduce the 3x1 column at `xi`, or the identity when the column is
/// outside the volume.
fn column_extremum_2d<T: VoxelType, E: Extremum<T>>(
    labels: &[T],
    size: VolumeSize,
    xi: isize,
    y: usize,
) -> T {
    if xi < 0 || xi as usize >= size.width {
        return E::identity();
    }

    let (sx, sy) = (size.width, size.height);
    let loc = xi as usize + sx * y;

    let mut best = labels[loc];
    if y > 0 {
        best = E::pick(best, labels[loc - sx]);
    }
    if y + 1 < sy {
        best = E::pick(best, labels[loc + sx]);
    }

    best
}

/// Write `value` to `count` consecutive voxels starting at `loc`.
fn emit_span<T: VoxelType>(out: &SharedOutput<T>, loc: usize, count: usize, value: T) {
    for i in 0..count {
        out.set(loc + i, value);
    }
}

fn process_block_3d<T: VoxelType, E: Extremum<T>>(
    labels: &[T],
    out: &SharedOutput<T>,
    size: VolumeSize,
    block: &Block,
) {
    let (sx, sy) = (size.width, size.height);
    let sentinel = E::sentinel();

    for z in block.zs..block.ze {
        for y in block.ys..block.ye {
            let mut stale = 3usize;
            let mut x = block.xs;
            let mut agg_left = sentinel;
            let mut agg_middle = sentinel;
            let mut agg_right = sentinel;

            while x < block.xe {
                let loc = x + sx * (y + sy * z);

                // a saturated center decides this voxel and the next one
                if labels[loc] == sentinel {
                    emit_span(out, loc, 2.min(block.xe - x), sentinel);
                    x += 2;
                    stale += 2;
                    continue;
                }

                let xi = x as isize;
                match stale {
                    1 => {
                        agg_left = agg_middle;
                        agg_middle = agg_right;
                        agg_right = column_extremum_3d::<T, E>(labels, size, xi + 1, y, z);
                    }
                    2 => {
                        agg_left = agg_right;
                        agg_right = column_extremum_3d::<T, E>(labels, size, xi + 1, y, z);
                        if agg_right == sentinel {
                            emit_span(out, loc, 3.min(block.xe - x), sentinel);
                            x += 3;
                            stale = 3;
                            continue;
                        }
                        agg_middle = column_extremum_3d::<T, E>(labels, size, xi, y, z);
                    }
                    _ => {
                        agg_right = column_extremum_3d::<T, E>(labels, size, xi + 1, y, z);
                        if agg_right == sentinel {
                            emit_span(out, loc, 3.min(block.xe - x), sentinel);
                            x += 3;
                            stale = 3;
                            continue;
                        }
                        agg_middle = column_extremum_3d::<T, E>(labels, size, xi, y, z);
                        if agg_middle == sentinel {
                            emit_span(out, loc, 2.min(block.xe - x), sentinel);
                            x += 2;
                            stale = 2;
                            continue;
                        }
                        agg_left = column_extremum_3d::<T, E>(labels, size, xi - 1, y, z);
                    }
                }

                // a saturated right column decides three voxels, a
                // saturated middle two
                if agg_right == sentinel {
                    emit_span(out, loc, 3.min(block.xe - x), sentinel);
                    x += 3;
                    stale = 3;
                    continue;
                }
                if agg_middle == sentinel {
                    emit_span(out, loc, 2.min(block.xe - x), sentinel);
                    x += 2;
                    stale = 2;
                    continue;
                }

                out.set(loc, E::pick(E::pick(agg_left, agg_middle), agg_right));
                stale = 1;
                x += 1;
            }
        }
    }
}

fn process_block_2d<T: VoxelType, E: Extremum<T>>(
    labels: &[T],
    out: &SharedOutput<T>,
    size: VolumeSize,
    block: &Block,
) {
    let sx = size.width;
    let sentinel = E::sentinel();

    for y in block.ys..block.ye {
        let mut stale = 3usize;
        let mut x = block.xs;
        let mut agg_left = sentinel;
        let mut agg_middle = sentinel;
        let mut agg_right = sentinel;

        while x < block.xe {
            let loc = x + sx * y;

            if labels[loc] == sentinel {
                emit_span(out, loc, 2.min(block.xe - x), sentinel);
                x += 2;
                stale += 2;
                continue;
            }

            let xi = x as isize;
            match stale {
                1 => {
                    agg_left = agg_middle;
                    agg_middle = agg_right;
                    agg_right = column_extremum_2d::<T, E>(labels, size, xi + 1, y);
                }
                2 => {
                    agg_left = agg_right;
                    agg_right = column_extremum_2d::<T, E>(labels, size, xi + 1, y);
                    if agg_right == sentinel {
                        emit_span(out, loc, 3.min(block.xe - x), sentinel);
                        x += 3;
                        stale = 3;
                        continue;
                    }
                    agg_middle = column_extremum_2d::<T, E>(labels, size, xi, y);
                }
                _ => {
                    agg_right = column_extremum_2d::<T, E>(labels, size, xi + 1, y);
                    if agg_right == sentinel {
                        emit_span(out, loc, 3.min(block.xe - x), sentinel);
                        x += 3;
                        stale = 3;
                        continue;
                    }
                    agg_middle = column_extremum_2d::<T, E>(labels, size, xi, y);
                    if agg_middle == sentinel {
                        emit_span(out, loc, 2.min(block.xe - x), sentinel);
                        x += 2;
                        stale = 2;
                        continue;
                    }
                    agg_left = column_extremum_2d::<T, E>(labels, size, xi - 1, y);
                }
            }

            if agg_right == sentinel {
                emit_span(out, loc, 3.min(block.xe - x), sentinel);
                x += 3;
                stale = 3;
                continue;
            }
            if agg_middle == sentinel {
                emit_span(out, loc, 2.min(block.xe - x), sentinel);
                x += 2;
                stale = 2;
                continue;
            }

            out.set(loc, E::pick(E::pick(agg_left, agg_middle), agg_right));
            stale = 1;
            x += 1;
        }
    }
}
