#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Error types for volume operations.
pub mod error;

/// Scalar element types accepted by the volume containers.
pub mod voxel;

/// Dense voxel volume representation.
pub mod volume;

pub use crate::error::VolumeError;
pub use crate::volume::{Volume, VolumeSize};
pub use crate::voxel::VoxelType;
