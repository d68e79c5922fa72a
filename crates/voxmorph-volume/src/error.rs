use crate::volume::VolumeSize;

/// An error type for volume operations.
#[derive(thiserror::Error, Debug)]
pub enum VolumeError {
    /// Error when the data length does not match the volume size.
    #[error("Data length ({0}) does not match the volume size ({1})")]
    InvalidDataLength(usize, usize),

    /// Error when two volumes were expected to have the same size.
    #[error("Volume sizes do not match ({0} vs {1})")]
    SizeMismatch(VolumeSize, VolumeSize),

    /// Error when a planar operation receives a volume of depth above one.
    #[error("Volume of size {0} is not two dimensional")]
    NotTwoDimensional(VolumeSize),

    /// Error when the voxel count of a volume overflows the address space.
    #[error("Volume size {0} overflows the addressable voxel count")]
    SizeOverflow(VolumeSize),
}
