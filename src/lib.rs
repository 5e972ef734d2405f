//! mcdenoise is a motion-compensated multi-frame video denoiser.
//!
//! Every new frame is matched against the previous one in small pixel groups.
//! Pixels that did not move, or that moved together with a flood-filled
//! region, are linked to the same reference pixel, which averages every
//! sample it has seen. A frame leaves the window once it is `frames` frames
//! old, by which point each of its pixels is the mean of its whole history.
//!
//! [`MotionSearcher`] is the per-plane core. [`Denoiser`] drives luma and
//! chroma searchers over planar YUV frames, optionally in parallel via the
//! `rayon` feature, and [`pipeline`] moves work onto dedicated threads.

mod candidate;
pub mod denoiser;
pub mod image;
mod kernel;
pub mod lowlevel;
pub mod motion;
pub mod pipeline;
pub mod pixel;
pub mod region;
pub mod search;
pub mod set;
mod trace;
pub mod util;

pub use denoiser::{Denoiser, DenoiserConfig, Interlace};
pub use image::{ChromaSubsampling, FrameGeometry, ImageView, Plane, YuvFrame};
pub use motion::{
    FrameStats, MotionSearcher, SearchConfig, SearcherState, MIN_ZERO_MOTION_RUN,
    PREFER_SHORTER_VECTORS,
};
pub use pipeline::{denoise_stream, PipelinedDenoiser, Threading};
pub use pixel::{FrameView, Pixel, PixelCbCr, PixelY};
pub use util::{DenoiseError, DenoiseResult};
