#[doc(inline)]
pub use voxmorph_volume as volume;

#[doc(inline)]
pub use voxmorph_ops as ops;
