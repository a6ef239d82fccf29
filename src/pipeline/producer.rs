//! Background batch producer.
//!
//! Runs segmentation and post-processing image by image on a named thread
//! and reports over a channel. Images are processed and reported in input
//! order. A batch is sent only once complete, so cancelling never hands over
//! a partial image.

use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

use web_time::Instant;

use super::PipelineError;
use super::postprocess::{PostProcessor, SegmentedRegion};
use super::segmenter::{CancelToken, Segmenter, SourceImage};
use crate::config::CurationConfig;
use crate::model::IntensityImage;

/// Every region of one processed image.
#[derive(Debug, Clone)]
pub struct ImageBatch {
    pub image_name: String,
    /// `(rows, cols)` of the label grid
    pub dims: (usize, usize),
    pub intensity: Option<Arc<IntensityImage>>,
    pub regions: Vec<SegmentedRegion>,
}

/// Progress report from the producer.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    Started { total: usize },
    ImageReady(ImageBatch),
    ImageSkipped { name: String, reason: String },
    Progress { done: usize, total: usize },
    Finished { processed: usize, cancelled: bool },
}

/// Segment and post-process one image.
pub fn process_image(
    source: &SourceImage,
    segmenter: &dyn Segmenter,
    post: &PostProcessor,
    cancel: &CancelToken,
) -> Result<ImageBatch, PipelineError> {
    let grid = segmenter.segment(source, cancel)?;
    cancel.check()?;

    let dims = grid.dim();
    for channel in [&source.intensity, &source.nucleus].into_iter().flatten() {
        if channel.dim() != dims {
            return Err(PipelineError::DimensionMismatch {
                image: source.name.clone(),
                expected: dims,
                found: channel.dim(),
            });
        }
    }

    let regions = post.process(
        &grid,
        source.intensity.as_deref(),
        source.nucleus.as_deref(),
        cancel,
    )?;

    Ok(ImageBatch {
        image_name: source.name.clone(),
        dims,
        intensity: source.intensity.clone(),
        regions,
    })
}

/// Owns the producer thread and the receiving end of its events.
pub struct BatchProducer {
    events: Receiver<PipelineEvent>,
    cancel: CancelToken,
    thread_handle: Option<JoinHandle<()>>,
}

impl BatchProducer {
    /// Spawn the producer thread over `images`, in the given order.
    pub fn spawn(
        images: Vec<SourceImage>,
        segmenter: Arc<dyn Segmenter>,
        config: &CurationConfig,
    ) -> Result<Self, PipelineError> {
        let rate = config
            .pixel_rate()
            .map_err(|e| PipelineError::Config(e.to_string()))?;
        let post = PostProcessor::new(&config.pipeline, rate);
        let (event_tx, events) = mpsc::channel::<PipelineEvent>();
        let cancel = CancelToken::new();
        let thread_cancel = cancel.clone();

        let thread_handle = thread::Builder::new()
            .name("batch-producer".to_string())
            .spawn(move || {
                log::info!("Batch producer thread started");
                Self::thread_loop(images, segmenter.as_ref(), &post, &thread_cancel, &event_tx);
                log::info!("Batch producer thread exiting");
            })
            .map_err(|e| PipelineError::Segmentation(format!("Failed to spawn producer thread: {}", e)))?;

        Ok(Self {
            events,
            cancel,
            thread_handle: Some(thread_handle),
        })
    }

    fn thread_loop(
        images: Vec<SourceImage>,
        segmenter: &dyn Segmenter,
        post: &PostProcessor,
        cancel: &CancelToken,
        events: &Sender<PipelineEvent>,
    ) {
        let total = images.len();
        let start = Instant::now();
        let mut processed = 0;
        let send = |event| {
            if events.send(event).is_err() {
                log::warn!("Event channel closed, producer stopping");
                cancel.cancel();
            }
        };

        send(PipelineEvent::Started { total });

        for (index, source) in images.iter().enumerate() {
            if cancel.is_cancelled() {
                break;
            }
            let image_start = Instant::now();
            match process_image(source, segmenter, post, cancel) {
                Ok(batch) => {
                    log::info!(
                        "{}: {} region(s) in {:.2?}",
                        batch.image_name,
                        batch.regions.len(),
                        image_start.elapsed()
                    );
                    processed += 1;
                    send(PipelineEvent::ImageReady(batch));
                }
                Err(PipelineError::Cancelled) => {
                    log::info!("{}: cancelled, nothing committed", source.name);
                    break;
                }
                Err(e) => {
                    log::warn!("{}: skipped: {}", source.name, e);
                    send(PipelineEvent::ImageSkipped {
                        name: source.name.clone(),
                        reason: e.to_string(),
                    });
                }
            }
            send(PipelineEvent::Progress {
                done: index + 1,
                total,
            });
        }

        let cancelled = cancel.is_cancelled();
        log::info!(
            "Processed {}/{} image(s) in {:.2?}{}",
            processed,
            total,
            start.elapsed(),
            if cancelled { " (cancelled)" } else { "" }
        );
        // The receiver may already be gone after cancellation.
        let _ = events.send(PipelineEvent::Finished {
            processed,
            cancelled,
        });
    }

    /// Request cancellation. Already-sent batches stay valid.
    pub fn cancel(&self) {
        log::debug!("Cancelling batch producer");
        self.cancel.cancel();
    }

    /// Iterate over events until the producer finishes.
    pub fn events(&self) -> impl Iterator<Item = PipelineEvent> + '_ {
        self.events.iter()
    }
}

impl Drop for BatchProducer {
    fn drop(&mut self) {
        log::debug!("Shutting down batch producer thread");
        self.cancel.cancel();

        if let Some(handle) = self.thread_handle.take()
            && let Err(e) = handle.join()
        {
            log::warn!("Batch producer thread panicked: {:?}", e);
        }
    }
}
