use voxmorph_volume::{Volume, VolumeError, VolumeSize, VoxelType};

use crate::block::{for_each_block, Block, SharedOutput};

/// Erode a labeled volume with a 3x3x3 stencil, all cells active.
///
/// A voxel keeps its label only when every in-bounds neighbor carries the
/// same label; otherwise it becomes background. The outermost one-voxel
/// shell of every axis of extent above one is always background, since its
/// neighborhood leaves the volume.
///
/// # Arguments
///
/// * `labels` - The input labeled volume.
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
/// use voxmorph_ops::multilabel_erode_3d;
/// use voxmorph_volume::{Volume, VolumeSize};
///
/// let size = VolumeSize { width: 5, height: 5, depth: 5 };
/// let labels = Volume::from_size_val(size, 1u8).unwrap();
/// let mut output = Volume::from_size_val(size, 0u8).unwrap();
///
/// multilabel_erode_3d(&labels, &mut output, 0).unwrap();
/// // only the 3x3x3 interior survives
/// assert_eq!(output.get(2, 2, 2), Some(&1));
/// assert_eq!(output.get(0, 2, 2), Some(&0));
/// ```
pub fn multilabel_erode_3d<T: VoxelType>(
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

    for_each_block(size, 1, threads, |block| {
        process_block_3d(src, &out, size, block);
    });

    Ok(())
}

/// Erode a planar labeled volume with a 3x3 stencil, all cells active.
///
/// The planar counterpart of [`multilabel_erode_3d`].
///
/// # Errors
///
/// Returns an error when the volume depth is not one or the two volumes
/// differ in size.
pub fn multilabel_erode_2d<T: VoxelType>(
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

    for_each_block(size, 1, threads, |block| {
        process_block_2d(src, &out, size, block);
    });

    Ok(())
}

/// Erode a labeled volume, selecting the planar engine for volumes of
/// depth one.
///
/// # Errors
///
/// Returns an error when the two volumes differ in size.
pub fn multilabel_erode<T: VoxelType>(
    labels: &Volume<T>,
    output: &mut Volume<T>,
    threads: usize,
) -> Result<(), VolumeError> {
    if labels.size().is_planar() {
        multilabel_erode_2d(labels, output, threads)
    } else {
        multilabel_erode_3d(labels, output, threads)
    }
}

/// Which cells of a column the purity check has to read. The restricted
/// variants are valid when the voxel below (along z or y) was already
/// emitted with the same label, which pins the remaining slabs.
#[derive(Clone, Copy)]
enum Purity {
    Full,
    UpperZ,
    UpperY,
}

/// Purity of the 3x3 column at `xi`: the column's center label when every
/// in-bounds cell carries it, zero otherwise. Cells along an axis of
/// extent one do not exist and cannot veto.
fn pure_column_3d<T: VoxelType>(labels: &[T], size: VolumeSize, xi: usize, y: usize, z: usize) -> T {
    let (sx, sy, sz) = (size.width, size.height, size.depth);
    let sxy = sx * sy;
    let loc = xi + sx * (y + sy * z);
    let label = labels[loc];
    if label == T::default() {
        return T::default();
    }

    let pure = (y == 0 || labels[loc - sx] == label)
        && (y + 1 == sy || labels[loc + sx] == label)
        && (z == 0 || labels[loc - sxy] == label)
        && (z + 1 == sz || labels[loc + sxy] == label)
        && (y == 0 || z == 0 || labels[loc - sx - sxy] == label)
        && (y + 1 == sy || z == 0 || labels[loc + sx - sxy] == label)
        && (y == 0 || z + 1 == sz || labels[loc - sx + sxy] == label)
        && (y + 1 == sy || z + 1 == sz || labels[loc + sx + sxy] == label);

    if pure {
        label
    } else {
        T::default()
    }
}

/// Purity restricted to the `z + 1` slab of the column at `xi`.
fn pure_column_3d_upper_z<T: VoxelType>(
    labels: &[T],
    size: VolumeSize,
    xi: usize,
    y: usize,
    z: usize,
) -> T {
    let (sx, sy, sz) = (size.width, size.height, size.depth);
    let sxy = sx * sy;
    let loc = xi + sx * (y + sy * z);
    let label = labels[loc];
    if label == T::default() {
        return T::default();
    }

    let pure = (z + 1 == sz || labels[loc + sxy] == label)
        && (y == 0 || z + 1 == sz || labels[loc - sx + sxy] == label)
        && (y + 1 == sy || z + 1 == sz || labels[loc + sx + sxy] == label);

    if pure {
        label
    } else {
        T::default()
    }
}

/// Purity restricted to the `y + 1` slab of the column at `xi`.
fn pure_column_3d_upper_y<T: VoxelType>(
    labels: &[T],
    size: VolumeSize,
    xi: usize,
    y: usize,
    z: usize,
) -> T {
    let (sx, sy, sz) = (size.width, size.height, size.depth);
    let sxy = sx * sy;
    let loc = xi + sx * (y + sy * z);
    let label = labels[loc];
    if label == T::default() {
        return T::default();
    }

    let pure = (y + 1 == sy || labels[loc + sx] == label)
        && (y + 1 == sy || z == 0 || labels[loc + sx - sxy] == label)
        && (y + 1 == sy || z + 1 == sz || labels[loc + sx + sxy] == label);

    if pure {
        label
    } else {
        T::default()
    }
}

fn column_purity_3d<T: VoxelType>(
    kind: Purity,
    labels: &[T],
    size: VolumeSize,
    xi: usize,
    y: usize,
    z: usize,
) -> T {
    match kind {
        Purity::Full => pure_column_3d(labels, size, xi, y, z),
        Purity::UpperZ => pure_column_3d_upper_z(labels, size, xi, y, z),
        Purity::UpperY => pure_column_3d_upper_y(labels, size, xi, y, z),
    }
}

/// Purity of the 3x1 column at `xi` in a planar volume.
fn pure_column_2d<T: VoxelType>(labels: &[T], size: VolumeSize, xi: usize, y: usize) -> T {
    let (sx, sy) = (size.width, size.height);
    let loc = xi + sx * y;
    let label = labels[loc];
    if label == T::default() {
        return T::default();
    }

    let pure =
        (y == 0 || labels[loc - sx] == label) && (y + 1 == sy || labels[loc + sx] == label);

    if pure {
        label
    } else {
        T::default()
    }
}

/// Purity restricted to the `y + 1` cell of the planar column at `xi`.
fn pure_column_2d_upper_y<T: VoxelType>(labels: &[T], size: VolumeSize, xi: usize, y: usize) -> T {
    let (sx, sy) = (size.width, size.height);
    let loc = xi + sx * y;
    let label = labels[loc];
    if label == T::default() {
        return T::default();
    }

    if y + 1 == sy || labels[loc + sx] == label {
        label
    } else {
        T::default()
    }
}

fn column_purity_2d<T: VoxelType>(
    kind: Purity,
    labels: &[T],
    size: VolumeSize,
    xi: usize,
    y: usize,
) -> T {
    match kind {
        Purity::UpperY => pure_column_2d_upper_y(labels, size, xi, y),
        _ => pure_column_2d(labels, size, xi, y),
    }
}

fn process_block_3d<T: VoxelType>(
    labels: &[T],
    out: &SharedOutput<T>,
    size: VolumeSize,
    block: &Block,
) {
    let (sx, sy) = (size.width, size.height);
    let sxy = sx * sy;
    let zero = T::default();

    if sx == 1 {
        // no lateral columns exist, the single column decides alone
        for z in block.zs..block.ze {
            for y in block.ys..block.ye {
                let label = pure_column_3d(labels, size, 0, y, z);
                if label != zero {
                    out.set(sx * (y + sy * z), label);
                }
            }
        }
        return;
    }

    for z in block.zs..block.ze {
        for y in block.ys..block.ye {
            let mut stale = 3usize;
            let mut x = block.xs;
            let mut pure_left = zero;
            let mut pure_middle = zero;
            let mut pure_right = zero;

            while x < block.xe {
                let loc = x + sx * (y + sy * z);
                let center = labels[loc];

                // a background center also vetoes the next voxel over
                if center == zero {
                    x += 2;
                    stale += 2;
                    continue;
                }

                let kind = if z > block.zs && out.get(loc - sxy) == center {
                    Purity::UpperZ
                } else if y > block.ys && out.get(loc - sx) == center {
                    Purity::UpperY
                } else {
                    Purity::Full
                };

                match stale {
                    1 => {
                        pure_left = pure_middle;
                        pure_middle = pure_right;
                        pure_right = column_purity_3d(kind, labels, size, x + 1, y, z);
                    }
                    2 => {
                        pure_left = pure_right;
                        pure_right = column_purity_3d(kind, labels, size, x + 1, y, z);
                        if pure_right == zero {
                            x += 3;
                            stale = 3;
                            continue;
                        }
                        pure_middle = column_purity_3d(kind, labels, size, x, y, z);
                    }
                    _ => {
                        pure_right = column_purity_3d(kind, labels, size, x + 1, y, z);
                        if pure_right == zero {
                            x += 3;
                            stale = 3;
                            continue;
                        }
                        pure_middle = column_purity_3d(kind, labels, size, x, y, z);
                        if pure_middle == zero {
                            x += 2;
                            stale = 2;
                            continue;
                        }
                        pure_left = column_purity_3d(kind, labels, size, x - 1, y, z);
                    }
                }

                // an impure right column also dooms the next two voxels,
                // an impure middle the next one
                if pure_right == zero {
                    x += 3;
                    stale = 3;
                    continue;
                }
                if pure_middle == zero {
                    x += 2;
                    stale = 2;
                    continue;
                }
                if pure_left == pure_middle && pure_middle == pure_right {
                    out.set(loc, center);
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
) {
    let sx = size.width;
    let zero = T::default();

    if sx == 1 {
        for y in block.ys..block.ye {
            let label = pure_column_2d(labels, size, 0, y);
            if label != zero {
                out.set(sx * y, label);
            }
        }
        return;
    }

    for y in block.ys..block.ye {
        let mut stale = 3usize;
        let mut x = block.xs;
        let mut pure_left = zero;
        let mut pure_middle = zero;
        let mut pure_right = zero;

        while x < block.xe {
            let loc = x + sx * y;
            let center = labels[loc];

            if center == zero {
                x += 2;
                stale += 2;
                continue;
            }

            let kind = if y > block.ys && out.get(loc - sx) == center {
                Purity::UpperY
            } else {
                Purity::Full
            };

            match stale {
                1 => {
                    pure_left = pure_middle;
                    pure_middle = pure_right;
                    pure_right = column_purity_2d(kind, labels, size, x + 1, y);
                }
                2 => {
                    pure_left = pure_right;
                    pure_right = column_purity_2d(kind, labels, size, x + 1, y);
                    if pure_right == zero {
                        x += 3;
                        stale = 3;
                        continue;
                    }
                    pure_middle = column_purity_2d(kind, labels, size, x, y);
                }
                _ => {
                    pure_right = column_purity_2d(kind, labels, size, x + 1, y);
                    if pure_right == zero {
                        x += 3;
                        stale = 3;
                        continue;
                    }
                    pure_middle = column_purity_2d(kind, labels, size, x, y);
                    if pure_middle == zero {
                        x += 2;
                        stale = 2;
                        continue;
                    }
                    pure_left = column_purity_2d(kind, labels, size, x - 1, y);
                }
            }

            if pure_right == zero {
                x += 3;
                stale = 3;
                continue;
            }
            if pure_middle == zero {
                x += 2;
                stale = 2;
                continue;
            }
            if pure_left == pure_middle && pure_middle == pure_right {
                out.set(loc, center);
            }

            stale = 1;
            x += 1;
        }
    }
}
