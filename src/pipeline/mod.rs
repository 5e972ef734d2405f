//! Threaded variants of the denoiser.
//!
//! [`PipelinedDenoiser`] moves the chroma engine onto a [`ChromaWorker`]
//! thread and produces exactly the frames the synchronous
//! [`Denoiser`](crate::denoiser::Denoiser) would. [`denoise_stream`] adds
//! [`ReadAhead`] and [`WriteBehind`] stages around it for raw files.

mod handoff;
mod stages;
mod worker;

pub use handoff::Handoff;
pub use stages::{ReadAhead, WriteBehind};
pub use worker::{ChromaDone, ChromaJob, ChromaWorker};

use crate::denoiser::raw::{read_raw_frame, write_raw_frame};
use crate::denoiser::{Denoiser, DenoiserConfig, PlaneEngine};
use crate::image::{FrameGeometry, Plane, YuvFrame};
use crate::pixel::PixelY;
use crate::trace::trace_span;
use crate::util::{DenoiseError, DenoiseResult};
use std::io::{Read, Write};

/// Denoiser whose chroma engine runs on a worker thread.
pub struct PipelinedDenoiser {
    geometry: FrameGeometry,
    luma: PlaneEngine<PixelY>,
    luma_out: Plane,
    chroma: Option<ChromaWorker>,
    /// Output planes while they are not lent to the worker; neutral planes
    /// in luma-only mode.
    chroma_out: Option<[Plane; 2]>,
}

impl PipelinedDenoiser {
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
        let neutral = YuvFrame::new(geometry)?;
        let chroma_out = neutral.chroma().cloned();
        let chroma = match (config.luma_only, geometry.subsampling.factors()) {
            (false, Some(factors)) => {
                let (cw, ch) = geometry
                    .chroma_size()
                    .ok_or(DenoiseError::InvariantViolation("chroma size missing"))?;
                let engine = PlaneEngine::new(
                    config.chroma_search(factors, (cw, ch)),
                    cw,
                    ch,
                    field_order,
                    config.purge_interval,
                )?;
                Some(ChromaWorker::spawn(engine)?)
            }
            _ => None,
        };
        Ok(Self {
            geometry,
            luma,
            luma_out: neutral.luma().clone(),
            chroma,
            chroma_out,
        })
    }

    pub fn geometry(&self) -> FrameGeometry {
        self.geometry
    }

    /// Same contract as [`Denoiser::denoise_frame`].
    pub fn denoise_frame(&mut self, frame: &YuvFrame) -> DenoiseResult<Option<YuvFrame>> {
        if frame.geometry() != self.geometry {
            return Err(DenoiseError::InvalidDimensions {
                width: frame.geometry().width,
                height: frame.geometry().height,
            });
        }
        let _span = trace_span!("denoise_frame").entered();
        if let Some(worker) = &self.chroma {
            let input = frame
                .chroma()
                .cloned()
                .ok_or(DenoiseError::InvalidInput("frame has no chroma planes"))?;
            worker.submit(ChromaJob::Add {
                input,
                output: lend(&mut self.chroma_out)?,
            })?;
        }
        let produced = self
            .luma
            .add(&[frame.luma()], &mut [&mut self.luma_out])?;
        self.finish(produced)
    }

    /// Same contract as [`Denoiser::flush`].
    pub fn flush(&mut self) -> DenoiseResult<Option<YuvFrame>> {
        if let Some(worker) = &self.chroma {
            worker.submit(ChromaJob::Flush {
                output: lend(&mut self.chroma_out)?,
            })?;
        }
        let produced = self.luma.flush(&mut [&mut self.luma_out])?;
        self.finish(produced)
    }

    fn finish(&mut self, produced: bool) -> DenoiseResult<Option<YuvFrame>> {
        if let Some(worker) = &self.chroma {
            let done = worker.receive()?;
            self.chroma_out = Some(done.output);
            if done.produced != produced {
                return Err(DenoiseError::InvariantViolation(
                    "luma and chroma engines are out of step",
                ));
            }
        }
        if !produced {
            return Ok(None);
        }
        YuvFrame::from_planes(self.geometry, self.luma_out.clone(), self.chroma_out.clone())
            .map(Some)
    }
}

fn lend(planes: &mut Option<[Plane; 2]>) -> DenoiseResult<[Plane; 2]> {
    planes
        .take()
        .ok_or(DenoiseError::InvariantViolation("chroma planes already lent"))
}

/// Frame-at-a-time denoising shared by the synchronous and threaded drivers.
trait FrameDenoiser {
    fn denoise_frame(&mut self, frame: &YuvFrame) -> DenoiseResult<Option<YuvFrame>>;
    fn flush(&mut self) -> DenoiseResult<Option<YuvFrame>>;
}

impl FrameDenoiser for Denoiser {
    fn denoise_frame(&mut self, frame: &YuvFrame) -> DenoiseResult<Option<YuvFrame>> {
        Denoiser::denoise_frame(self, frame)
    }

    fn flush(&mut self) -> DenoiseResult<Option<YuvFrame>> {
        Denoiser::flush(self)
    }
}

impl FrameDenoiser for PipelinedDenoiser {
    fn denoise_frame(&mut self, frame: &YuvFrame) -> DenoiseResult<Option<YuvFrame>> {
        PipelinedDenoiser::denoise_frame(self, frame)
    }

    fn flush(&mut self) -> DenoiseResult<Option<YuvFrame>> {
        PipelinedDenoiser::flush(self)
    }
}

fn run_inline<D, R, W>(
    denoiser: &mut D,
    reader: &mut R,
    writer: &mut W,
    geometry: FrameGeometry,
) -> DenoiseResult<u64>
where
    D: FrameDenoiser,
    R: Read,
    W: Write,
{
    let mut written = 0;
    while let Some(frame) = read_raw_frame(reader, geometry)? {
        if let Some(out) = denoiser.denoise_frame(&frame)? {
            write_raw_frame(writer, &out)?;
            written += 1;
        }
    }
    while let Some(out) = denoiser.flush()? {
        write_raw_frame(writer, &out)?;
        written += 1;
    }
    writer.flush()?;
    Ok(written)
}

/// How much of the work moves off the calling thread.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Threading {
    /// Everything on the calling thread.
    #[default]
    Synchronous,
    /// Chroma on a worker thread.
    ChromaWorker,
    /// Chroma worker plus read-ahead and write-behind threads.
    Full,
}

impl Threading {
    /// Maps a thread count: 0 synchronous, 1 chroma worker, 2 or more full.
    pub fn from_threads(threads: usize) -> Self {
        match threads {
            0 => Threading::Synchronous,
            1 => Threading::ChromaWorker,
            _ => Threading::Full,
        }
    }
}

/// Denoises every raw frame of `reader` into `writer`. Returns the number
/// of frames written.
pub fn denoise_stream<R, W>(
    mut reader: R,
    mut writer: W,
    config: DenoiserConfig,
    geometry: FrameGeometry,
    threading: Threading,
) -> DenoiseResult<u64>
where
    R: Read + Send + 'static,
    W: Write + Send + 'static,
{
    match threading {
        Threading::Synchronous => {
            let mut denoiser = Denoiser::new(config, geometry)?;
            run_inline(&mut denoiser, &mut reader, &mut writer, geometry)
        }
        Threading::ChromaWorker => {
            let mut denoiser = PipelinedDenoiser::new(config, geometry)?;
            run_inline(&mut denoiser, &mut reader, &mut writer, geometry)
        }
        Threading::Full => {
            let mut denoiser = PipelinedDenoiser::new(config, geometry)?;
            let input = ReadAhead::spawn(reader, geometry)?;
            let output = WriteBehind::spawn(writer)?;
            let mut written = 0;
            while let Some(frame) = input.next_frame()? {
                if let Some(out) = denoiser.denoise_frame(&frame)? {
                    output.write(out)?;
                    written += 1;
                }
            }
            while let Some(out) = denoiser.flush()? {
                output.write(out)?;
                written += 1;
            }
            output.finish()?;
            Ok(written)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{denoise_stream, PipelinedDenoiser, Threading};
    use crate::denoiser::{Denoiser, DenoiserConfig};
    use crate::image::{ChromaSubsampling, FrameGeometry, YuvFrame};
    use crate::motion::SearchConfig;

    fn config() -> DenoiserConfig {
        DenoiserConfig {
            luma: SearchConfig {
                frames: 3,
                radius_x: 4,
                radius_y: 4,
                ..SearchConfig::default()
            },
            parallel: false,
            ..DenoiserConfig::default()
        }
    }

    fn ramp(geometry: FrameGeometry, t: usize) -> YuvFrame {
        let mut frame = YuvFrame::new(geometry).unwrap();
        for (i, plane) in frame.planes_mut().enumerate() {
            let width = plane.width();
            for (idx, v) in plane.as_mut_slice().iter_mut().enumerate() {
                *v = ((idx % width + t) * 8 + i * 40) as u8;
            }
        }
        frame
    }

    #[test]
    fn worker_output_matches_synchronous() {
        let geometry = FrameGeometry::new(16, 16, ChromaSubsampling::Yuv420).unwrap();
        let mut sync = Denoiser::new(config(), geometry).unwrap();
        let mut piped = PipelinedDenoiser::new(config(), geometry).unwrap();
        for t in 0..6 {
            let frame = ramp(geometry, t);
            assert_eq!(
                sync.denoise_frame(&frame).unwrap(),
                piped.denoise_frame(&frame).unwrap()
            );
        }
        loop {
            let a = sync.flush().unwrap();
            let b = piped.flush().unwrap();
            assert_eq!(a, b);
            if a.is_none() {
                break;
            }
        }
    }

    #[test]
    fn stream_writes_every_frame() {
        let geometry = FrameGeometry::new(8, 8, ChromaSubsampling::Mono).unwrap();
        let mut input = Vec::new();
        for t in 0..5 {
            crate::denoiser::raw::write_raw_frame(&mut input, &ramp(geometry, t)).unwrap();
        }
        for threads in 0..3 {
            let written = denoise_stream(
                std::io::Cursor::new(input.clone()),
                std::io::sink(),
                config(),
                geometry,
                Threading::from_threads(threads),
            )
            .unwrap();
            assert_eq!(written, 5);
        }
    }
}
