//! Whole-frame denoising of planar YUV video.
//!
//! A [`Denoiser`] runs one [`PlaneEngine`] over the luma plane and, unless
//! the stream is mono or luma-only, a second one over the Cb/Cr pair. Both
//! engines see the same frames, so their outputs stay in step.

mod engine;
pub mod raw;

pub use engine::{PlaneEngine, PlaneGroup};

use crate::image::{FrameGeometry, YuvFrame};
use crate::motion::{FrameStats, SearchConfig};
use crate::pixel::{PixelCbCr, PixelY};
use crate::trace::{trace_event, trace_span};
use crate::util::{DenoiseError, DenoiseResult};

/// Smallest luma search radius the denoiser accepts.
pub const MIN_LUMA_RADIUS: usize = 4;

/// Field structure of the input.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Interlace {
    #[default]
    Progressive,
    TopFieldFirst,
    BottomFieldFirst,
}

impl Interlace {
    /// Parity of the first field in time, or `None` for progressive input.
    pub fn first_field(self) -> Option<usize> {
        match self {
            Interlace::Progressive => None,
            Interlace::TopFieldFirst => Some(0),
            Interlace::BottomFieldFirst => Some(1),
        }
    }
}

/// Configuration for [`Denoiser`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DenoiserConfig {
    /// Search parameters for the luma plane. Its `frames` also sets the
    /// chroma window.
    pub luma: SearchConfig,
    /// Tolerances and throttles for the chroma pair. The radii are derived
    /// from the luma radii and the chroma subsampling.
    pub chroma: SearchConfig,
    pub interlace: Interlace,
    /// Skip chroma and write neutral chroma planes.
    pub luma_only: bool,
    /// Frames between cache purges; 0 never purges.
    pub purge_interval: usize,
    /// Search luma and chroma concurrently (requires the `rayon` feature).
    pub parallel: bool,
}

impl Default for DenoiserConfig {
    fn default() -> Self {
        Self {
            luma: SearchConfig::default(),
            chroma: SearchConfig::default(),
            interlace: Interlace::Progressive,
            luma_only: false,
            purge_interval: 10,
            parallel: cfg!(feature = "rayon"),
        }
    }
}

impl DenoiserConfig {
    /// Checks the settings that span both planes; each engine validates its
    /// own search parameters on construction.
    pub fn validate(&self, geometry: &FrameGeometry) -> DenoiseResult<()> {
        if self.luma.radius_x < MIN_LUMA_RADIUS || self.luma.radius_y < MIN_LUMA_RADIUS {
            return Err(DenoiseError::InvalidRadius {
                radius_x: self.luma.radius_x,
                radius_y: self.luma.radius_y,
                width: geometry.width,
                height: geometry.height,
            });
        }
        if self.interlace != Interlace::Progressive {
            let mut heights = vec![geometry.height];
            if !self.luma_only {
                heights.extend(geometry.chroma_size().map(|(_, h)| h));
            }
            if heights.iter().any(|h| h % 2 != 0) {
                return Err(DenoiseError::InvalidDimensions {
                    width: geometry.width,
                    height: geometry.height,
                });
            }
        }
        Ok(())
    }

    /// Chroma search parameters for planes of `width x height` subsampled
    /// by `(sx, sy)`.
    pub fn chroma_search(
        &self,
        (sx, sy): (usize, usize),
        (width, height): (usize, usize),
    ) -> SearchConfig {
        let search_height = if self.interlace == Interlace::Progressive {
            height
        } else {
            height / 2
        };
        let radius_x = (self.luma.radius_x / sx).clamp(1, width.max(1));
        let radius_y = (self.luma.radius_y / sy).clamp(1, search_height.max(1));
        SearchConfig {
            frames: self.luma.frames,
            radius_x,
            radius_y,
            match_count_throttle: self.chroma.match_count_throttle.min(radius_x * radius_y),
            ..self.chroma.clone()
        }
    }
}

/// Motion-compensated denoiser for a stream of planar frames.
pub struct Denoiser {
    config: DenoiserConfig,
    geometry: FrameGeometry,
    luma: PlaneEngine<PixelY>,
    chroma: Option<PlaneEngine<PixelCbCr>>,
    scratch: YuvFrame,
    frames_in: u64,
    frames_out: u64,
}

impl Denoiser {
    pub fn new(config: DenoiserConfig, geometry: FrameGeometry) -> DenoiseResult<Self> {
        config.validate(&geometry)?;
        let field_order = config.interlace.first_field();
        let luma = PlaneEngine::new(
            config.luma.clone(),
            geometry.width,
            geometry.height,
            field_order,
            config.purge_interval,
        )?;
        let chroma = match (config.luma_only, geometry.subsampling.factors()) {
            (false, Some(factors)) => {
                let (cw, ch) = geometry
                    .chroma_size()
                    .ok_or(DenoiseError::InvariantViolation("chroma size missing"))?;
                Some(PlaneEngine::new(
                    config.chroma_search(factors, (cw, ch)),
                    cw,
                    ch,
                    field_order,
                    config.purge_interval,
                )?)
            }
            _ => None,
        };
        Ok(Self {
            scratch: YuvFrame::new(geometry)?,
            config,
            geometry,
            luma,
            chroma,
            frames_in: 0,
            frames_out: 0,
        })
    }

    pub fn config(&self) -> &DenoiserConfig {
        &self.config
    }

    pub fn geometry(&self) -> FrameGeometry {
        self.geometry
    }

    /// Counters from the last frame for the luma and chroma engines.
    pub fn last_stats(&self) -> (FrameStats, Option<FrameStats>) {
        (
            self.luma.last_stats(),
            self.chroma.as_ref().map(PlaneEngine::last_stats),
        )
    }

    /// Adds a frame and returns the frame leaving the window, if any.
    pub fn denoise_frame(&mut self, frame: &YuvFrame) -> DenoiseResult<Option<YuvFrame>> {
        if frame.geometry() != self.geometry {
            return Err(DenoiseError::InvalidDimensions {
                width: frame.geometry().width,
                height: frame.geometry().height,
            });
        }
        let _span = trace_span!("denoise_frame", frame = self.frames_in).entered();
        let (out_luma, out_chroma) = self.scratch.split_mut();
        let luma = &mut self.luma;
        let mut run_luma = move || luma.add(&[frame.luma()], &mut [out_luma]);

        let produced = match (self.chroma.as_mut(), frame.chroma(), out_chroma) {
            (Some(engine), Some([cb, cr]), Some([out_cb, out_cr])) => {
                let run_chroma = move || engine.add(&[cb, cr], &mut [out_cb, out_cr]);
                let (luma, chroma) = join(self.config.parallel, run_luma, run_chroma);
                let (luma, chroma) = (luma?, chroma?);
                if luma != chroma {
                    return Err(DenoiseError::InvariantViolation(
                        "luma and chroma engines are out of step",
                    ));
                }
                luma
            }
            _ => run_luma()?,
        };
        self.frames_in += 1;
        Ok(self.take_output(produced))
    }

    /// Returns the next buffered frame after input has ended, or `None`
    /// once the window is empty.
    pub fn flush(&mut self) -> DenoiseResult<Option<YuvFrame>> {
        let (out_luma, out_chroma) = self.scratch.split_mut();
        let produced = self.luma.flush(&mut [out_luma])?;
        if let (Some(engine), Some([out_cb, out_cr])) = (self.chroma.as_mut(), out_chroma) {
            if engine.flush(&mut [out_cb, out_cr])? != produced {
                return Err(DenoiseError::InvariantViolation(
                    "luma and chroma engines are out of step",
                ));
            }
        }
        Ok(self.take_output(produced))
    }

    fn take_output(&mut self, produced: bool) -> Option<YuvFrame> {
        if !produced {
            return None;
        }
        self.frames_out += 1;
        trace_event!(
            "frame_out",
            frames_in = self.frames_in,
            frames_out = self.frames_out
        );
        Some(self.scratch.clone())
    }
}

/// Runs both closures, concurrently when `parallel` is set.
#[cfg(feature = "rayon")]
pub(crate) fn join<A, B, RA, RB>(parallel: bool, a: A, b: B) -> (RA, RB)
where
    A: FnOnce() -> RA + Send,
    B: FnOnce() -> RB + Send,
    RA: Send,
    RB: Send,
{
    if parallel {
        rayon::join(a, b)
    } else {
        (a(), b())
    }
}

#[cfg(not(feature = "rayon"))]
pub(crate) fn join<A, B, RA, RB>(_parallel: bool, a: A, b: B) -> (RA, RB)
where
    A: FnOnce() -> RA + Send,
    B: FnOnce() -> RB + Send,
{
    (a(), b())
}

#[cfg(test)]
mod tests {
    use super::{Denoiser, DenoiserConfig, Interlace};
    use crate::image::{ChromaSubsampling, FrameGeometry, YuvFrame};
    use crate::motion::SearchConfig;
    use crate::util::DenoiseError;

    fn small_config() -> DenoiserConfig {
        DenoiserConfig {
            luma: SearchConfig {
                frames: 2,
                radius_x: 4,
                radius_y: 4,
                ..SearchConfig::default()
            },
            ..DenoiserConfig::default()
        }
    }

    fn flat_frame(geometry: FrameGeometry, y: u8, c: u8) -> YuvFrame {
        let mut frame = YuvFrame::new(geometry).unwrap();
        frame.luma_mut().as_mut_slice().fill(y);
        if let Some(chroma) = frame.chroma_mut() {
            for plane in chroma.iter_mut() {
                plane.as_mut_slice().fill(c);
            }
        }
        frame
    }

    #[test]
    fn rejects_small_luma_radius() {
        let geometry = FrameGeometry::new(16, 16, ChromaSubsampling::Yuv420).unwrap();
        let mut config = small_config();
        config.luma.radius_y = 3;
        assert!(matches!(
            Denoiser::new(config, geometry),
            Err(DenoiseError::InvalidRadius { .. })
        ));
    }

    #[test]
    fn chroma_radius_follows_subsampling() {
        let config = DenoiserConfig::default();
        let chroma = config.chroma_search((2, 2), (320, 240));
        assert_eq!((chroma.radius_x, chroma.radius_y), (8, 8));
        let chroma = config.chroma_search((2, 1), (320, 240));
        assert_eq!((chroma.radius_x, chroma.radius_y), (8, 16));
        assert_eq!(chroma.frames, config.luma.frames);
    }

    #[test]
    fn interlaced_chroma_needs_even_rows() {
        let geometry = FrameGeometry::new(16, 18, ChromaSubsampling::Yuv420).unwrap();
        let config = DenoiserConfig {
            interlace: Interlace::TopFieldFirst,
            ..small_config()
        };
        assert!(config.validate(&geometry).is_err());
        let luma_only = DenoiserConfig {
            luma_only: true,
            ..config
        };
        assert!(luma_only.validate(&geometry).is_ok());
    }

    #[test]
    fn flat_frames_come_back_unchanged() {
        let geometry = FrameGeometry::new(16, 16, ChromaSubsampling::Yuv420).unwrap();
        let mut denoiser = Denoiser::new(small_config(), geometry).unwrap();
        let input = flat_frame(geometry, 120, 60);
        let mut outputs = Vec::new();
        for _ in 0..4 {
            outputs.extend(denoiser.denoise_frame(&input).unwrap());
        }
        while let Some(frame) = denoiser.flush().unwrap() {
            outputs.push(frame);
        }
        assert_eq!(outputs.len(), 4);
        assert!(outputs.iter().all(|frame| *frame == input));
    }

    #[test]
    fn luma_only_writes_neutral_chroma() {
        let geometry = FrameGeometry::new(16, 16, ChromaSubsampling::Yuv444).unwrap();
        let config = DenoiserConfig {
            luma_only: true,
            ..small_config()
        };
        let mut denoiser = Denoiser::new(config, geometry).unwrap();
        let input = flat_frame(geometry, 80, 30);
        for _ in 0..3 {
            denoiser.denoise_frame(&input).unwrap();
        }
        let out = denoiser.flush().unwrap().unwrap();
        assert_eq!(out.luma(), input.luma());
        let chroma = out.chroma().unwrap();
        assert!(chroma[0].as_slice().iter().all(|&v| v == 128));
    }
}
