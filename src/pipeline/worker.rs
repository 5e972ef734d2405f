//! Chroma engine running on its own thread.

use super::handoff::Handoff;
use crate::denoiser::PlaneEngine;
use crate::image::Plane;
use crate::pixel::PixelCbCr;
use crate::trace::trace_event;
use crate::util::{DenoiseError, DenoiseResult};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Work for the chroma thread. The output planes travel with the job and
/// come back in the [`ChromaDone`].
pub enum ChromaJob {
    Add { input: [Plane; 2], output: [Plane; 2] },
    Flush { output: [Plane; 2] },
}

/// Result of one [`ChromaJob`].
pub struct ChromaDone {
    pub produced: bool,
    pub output: [Plane; 2],
}

/// Runs a Cb/Cr [`PlaneEngine`] on a dedicated thread, one job at a time.
pub struct ChromaWorker {
    jobs: Arc<Handoff<ChromaJob>>,
    done: Arc<Handoff<DenoiseResult<ChromaDone>>>,
    worker: Option<JoinHandle<()>>,
}

impl ChromaWorker {
    pub fn spawn(engine: PlaneEngine<PixelCbCr>) -> DenoiseResult<Self> {
        let jobs = Arc::new(Handoff::new("chroma jobs"));
        let done = Arc::new(Handoff::new("chroma results"));
        let worker_jobs = Arc::clone(&jobs);
        let worker_done = Arc::clone(&done);
        let worker = thread::Builder::new()
            .name("mcdenoise-chroma".to_string())
            .spawn(move || Self::run(engine, &worker_jobs, &worker_done))?;
        Ok(Self {
            jobs,
            done,
            worker: Some(worker),
        })
    }

    fn run(
        mut engine: PlaneEngine<PixelCbCr>,
        jobs: &Handoff<ChromaJob>,
        done: &Handoff<DenoiseResult<ChromaDone>>,
    ) {
        trace_event!("stage_start", stage = "chroma");
        while let Ok(Some(job)) = jobs.take() {
            let result = match job {
                ChromaJob::Add { input, output } => {
                    let [cb, cr] = &input;
                    Self::process(output, |[out_cb, out_cr]| {
                        engine.add(&[cb, cr], &mut [out_cb, out_cr])
                    })
                }
                ChromaJob::Flush { output } => {
                    Self::process(output, |[out_cb, out_cr]| {
                        engine.flush(&mut [out_cb, out_cr])
                    })
                }
            };
            if done.put(result).is_err() {
                break;
            }
        }
        done.close();
        trace_event!("stage_stop", stage = "chroma");
    }

    fn process<F>(mut output: [Plane; 2], step: F) -> DenoiseResult<ChromaDone>
    where
        F: FnOnce([&mut Plane; 2]) -> DenoiseResult<bool>,
    {
        let [cb, cr] = &mut output;
        let produced = step([cb, cr])?;
        Ok(ChromaDone { produced, output })
    }

    /// Queues a job; blocks while the previous one is still unclaimed.
    pub fn submit(&self, job: ChromaJob) -> DenoiseResult<()> {
        self.jobs.put(job)
    }

    /// Waits for the result of the oldest submitted job.
    pub fn receive(&self) -> DenoiseResult<ChromaDone> {
        self.done
            .take()?
            .ok_or(DenoiseError::PipelineClosed {
                stage: self.done.stage(),
            })?
    }
}

impl Drop for ChromaWorker {
    fn drop(&mut self) {
        self.jobs.close();
        self.done.close();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
