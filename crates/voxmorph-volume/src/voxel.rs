/// Trait for the scalar element types the morphology engines operate on.
///
/// `Default::default()` doubles as the multilabel background value and the
/// [`num_traits::Bounded`] bounds supply the grayscale saturation values.
/// Boolean images are handled by the caller as their `u8` representation.
pub trait VoxelType:
    Copy + Ord + Default + Send + Sync + num_traits::Bounded + std::fmt::Debug
{
}

/// Implement the `VoxelType` trait for the supported types.
impl VoxelType for u8 {}
impl VoxelType for u16 {}
impl VoxelType for u32 {}
impl VoxelType for u64 {}
impl VoxelType for i8 {}
impl VoxelType for i16 {}
impl VoxelType for i32 {}
impl VoxelType for i64 {}
