//! Multilabel morphology over dense integer-labeled volumes.
//!
//! Voxels carry integer labels identifying the object they belong to, with
//! zero reserved for background. Dilation grows objects by the most
//! frequent nonzero label of each voxel's 3x3x3 (or 3x3) neighborhood;
//! erosion keeps a voxel only when its whole neighborhood carries its own
//! label.

mod dilate;
mod erode;

pub use dilate::{multilabel_dilate, multilabel_dilate_2d, multilabel_dilate_3d};
pub use erode::{multilabel_erode, multilabel_erode_2d, multilabel_erode_3d};
