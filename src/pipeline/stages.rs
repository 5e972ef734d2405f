//! Frame I/O on background threads.

use super::handoff::Handoff;
use crate::denoiser::raw::{read_raw_frame, write_raw_frame};
use crate::image::{FrameGeometry, YuvFrame};
use crate::trace::trace_event;
use crate::util::{DenoiseError, DenoiseResult};
use std::io::{Read, Write};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Reads the next raw frame while the current one is being denoised.
pub struct ReadAhead {
    frames: Arc<Handoff<DenoiseResult<YuvFrame>>>,
    worker: Option<JoinHandle<()>>,
}

impl ReadAhead {
    pub fn spawn<R>(mut reader: R, geometry: FrameGeometry) -> DenoiseResult<Self>
    where
        R: Read + Send + 'static,
    {
        let frames = Arc::new(Handoff::new("read-ahead"));
        let worker_frames = Arc::clone(&frames);
        let worker = thread::Builder::new()
            .name("mcdenoise-read".to_string())
            .spawn(move || {
                trace_event!("stage_start", stage = "read");
                loop {
                    let next = read_raw_frame(&mut reader, geometry);
                    let stop = !matches!(next, Ok(Some(_)));
                    let sent = match next {
                        Ok(Some(frame)) => worker_frames.put(Ok(frame)),
                        Ok(None) => Ok(()),
                        Err(err) => worker_frames.put(Err(err)),
                    };
                    if stop || sent.is_err() {
                        break;
                    }
                }
                worker_frames.close();
                trace_event!("stage_stop", stage = "read");
            })?;
        Ok(Self {
            frames,
            worker: Some(worker),
        })
    }

    /// Next frame, or `None` at the end of the stream.
    pub fn next_frame(&self) -> DenoiseResult<Option<YuvFrame>> {
        self.frames.take()?.transpose()
    }
}

impl Drop for ReadAhead {
    fn drop(&mut self) {
        self.frames.close();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

/// Writes finished frames while the next one is being denoised.
pub struct WriteBehind<W> {
    frames: Arc<Handoff<YuvFrame>>,
    worker: Option<JoinHandle<DenoiseResult<W>>>,
}

impl<W: Write + Send + 'static> WriteBehind<W> {
    pub fn spawn(mut writer: W) -> DenoiseResult<Self> {
        let frames = Arc::new(Handoff::<YuvFrame>::new("write-behind"));
        let worker_frames = Arc::clone(&frames);
        let worker = thread::Builder::new()
            .name("mcdenoise-write".to_string())
            .spawn(move || {
                trace_event!("stage_start", stage = "write");
                let result = Self::drain(&mut writer, &worker_frames);
                worker_frames.close();
                trace_event!("stage_stop", stage = "write");
                result.map(|()| writer)
            })?;
        Ok(Self {
            frames,
            worker: Some(worker),
        })
    }

    fn drain(writer: &mut W, frames: &Handoff<YuvFrame>) -> DenoiseResult<()> {
        while let Some(frame) = frames.take()? {
            write_raw_frame(writer, &frame)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Queues a frame for writing. A write failure on the background thread
    /// closes the stage, so the next call reports it.
    pub fn write(&self, frame: YuvFrame) -> DenoiseResult<()> {
        self.frames.put(frame)
    }

    /// Waits for every queued frame to be written and returns the writer,
    /// or the first write error.
    pub fn finish(mut self) -> DenoiseResult<W> {
        self.frames.close();
        let worker = self.worker.take().ok_or(DenoiseError::PipelineClosed {
            stage: self.frames.stage(),
        })?;
        worker.join().map_err(|_| DenoiseError::PipelineClosed {
            stage: self.frames.stage(),
        })?
    }
}

impl<W> Drop for WriteBehind<W> {
    fn drop(&mut self) {
        self.frames.close();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
