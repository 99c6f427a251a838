//! Commands run on rendered artifacts: frame encoding, mosaics and
//! slideshows. All of them go through the shared command executor.

pub mod animation;
pub mod mosaic;
pub mod slideshow;

pub use animation::{encode_frames, AnimationCodec};
pub use mosaic::{generate_mosaic, mosaic_path};
pub use slideshow::{generate_slideshow, slideshow_path};
