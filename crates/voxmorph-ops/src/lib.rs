#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

mod block;

/// grayscale morphology module.
pub mod grayscale;

/// multilabel morphology module.
pub mod multilabel;

/// small fixed-size sorting utilities.
pub mod smallsort;

pub use crate::grayscale::{
    grey_dilate, grey_dilate_2d, grey_dilate_3d, grey_erode, grey_erode_2d, grey_erode_3d,
};
pub use crate::multilabel::{
    multilabel_dilate, multilabel_dilate_2d, multilabel_dilate_3d, multilabel_erode,
    multilabel_erode_2d, multilabel_erode_3d,
};
