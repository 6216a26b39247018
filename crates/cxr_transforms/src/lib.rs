//! # cxr_transforms
//!
//! Image preprocessing and encoding for cxr-rs.
//!
//! This crate provides:
//! - [`Preprocessor`]: decode raw bytes, resize to the network size and
//!   convert to a channel-first [`InputTensor`](cxr_core::InputTensor),
//!   keeping the original-resolution image for compositing
//! - [`encode_image`] / [`decode_image`]: lossless PNG + base-64 text encoding

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod codec;
mod preprocess;

pub use codec::{decode_image, encode_image, encode_png};
pub use preprocess::{
    decode_rgb, to_tensor, InputImage, Preprocessed, Preprocessor, PreprocessorConfig, Resize,
    ResizeFilter,
};
