//! Live frame source: PipeWire remote → GStreamer → leaky single-slot handoff.

pub mod frame;
pub mod slot;

use crate::error::{Error, Result};
use crate::portal::CaptureHandle;
use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_app as gst_app;
use gstreamer_video as gst_video;
use std::os::fd::{AsRawFd, OwnedFd};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, trace, warn};

pub use frame::{decode_sample, Frame, PixelFormat, RawSample};
pub use slot::{FrameSlot, SlotStats, Take};

/// Every sample is converted to this layout before it reaches the slot
pub const NORMALIZED_FORMAT: PixelFormat = PixelFormat::Bgrx;

/// What a frame source produced while the consumer waited
#[derive(Debug)]
pub enum SourceEvent {
    Sample(RawSample),
    /// Nothing arrived within the timeout
    Idle,
    /// The stream finished; no more samples will come
    Ended,
}

pub trait FrameSource {
    fn next_sample(&mut self, timeout: Duration) -> Result<SourceEvent>;

    /// Stop producing and release the stream; calling it again is a no-op
    fn stop(&mut self);
}

/// GStreamer pipeline reading the negotiated PipeWire node.
///
/// Samples are produced on GStreamer's streaming thread and handed over via a
/// [`FrameSlot`], so a slow consumer only ever sees the newest frame and never
/// stalls the source.
pub struct FramePipeline {
    pipeline: gst::Pipeline,
    slot: Arc<FrameSlot<RawSample>>,
    fd: Option<OwnedFd>,
    stopped: bool,
}

impl FramePipeline {
    pub fn start(handle: CaptureHandle) -> Result<Self> {
        gst::init().map_err(map_gst_error)?;

        let CaptureHandle { fd, stream } = handle;
        let node_id = stream.node_id();

        let source = gst::ElementFactory::make("pipewiresrc")
            .property("fd", fd.as_raw_fd())
            .property("path", node_id.to_string())
            .build()
            .map_err(map_gst_error)?;

        let convert = gst::ElementFactory::make("videoconvert")
            .build()
            .map_err(map_gst_error)?;

        let caps = gst::Caps::builder("video/x-raw")
            .field("format", NORMALIZED_FORMAT.caps_name())
            .build();
        let filter = gst::ElementFactory::make("capsfilter")
            .property("caps", &caps)
            .build()
            .map_err(map_gst_error)?;

        let queue = gst::ElementFactory::make("queue")
            .property("max-size-buffers", 1u32)
            .property("max-size-bytes", 0u32)
            .property("max-size-time", 0u64)
            .property_from_str("leaky", "downstream")
            .build()
            .map_err(map_gst_error)?;

        let appsink = gst::ElementFactory::make("appsink")
            .build()
            .map_err(map_gst_error)?
            .downcast::<gst_app::AppSink>()
            .map_err(|_| Error::Pipeline("appsink element is not an AppSink".into()))?;
        appsink.set_property("max-buffers", 1u32);
        appsink.set_property("drop", true);
        appsink.set_property("sync", false);

        let slot = Arc::new(FrameSlot::new());
        let slot_cb = Arc::clone(&slot);
        let started = Instant::now();
        appsink.set_callbacks(
            gst_app::AppSinkCallbacks::builder()
                .new_sample(move |sink| {
                    let sample = sink.pull_sample().map_err(|_| gst::FlowError::Eos)?;
                    match build_sample(&sample, started) {
                        Ok(raw) => {
                            if !slot_cb.offer(raw) {
                                return Err(gst::FlowError::Flushing);
                            }
                        }
                        Err(reason) => warn!(%reason, "dropping unreadable sample"),
                    }
                    Ok(gst::FlowSuccess::Ok)
                })
                .build(),
        );

        let pipeline = gst::Pipeline::default();
        pipeline
            .add_many([&source, &convert, &filter, &queue, appsink.upcast_ref()])
            .map_err(map_gst_error)?;
        gst::Element::link_many([&source, &convert, &filter, &queue, appsink.upcast_ref()])
            .map_err(map_gst_error)?;

        play(&pipeline)?;
        info!(node_id, format = NORMALIZED_FORMAT.caps_name(), "frame pipeline playing");

        Ok(Self {
            pipeline,
            slot,
            fd: Some(fd),
            stopped: false,
        })
    }

    pub fn stats(&self) -> SlotStats {
        self.slot.stats()
    }

    fn poll_bus(&self) -> Result<()> {
        let Some(bus) = self.pipeline.bus() else {
            return Ok(());
        };

        while let Some(message) = bus.pop() {
            use gst::MessageView;
            match message.view() {
                MessageView::Error(err) => {
                    return Err(Error::Pipeline(format!(
                        "{} ({})",
                        err.error(),
                        err.debug().map(|d| d.to_string()).unwrap_or_default()
                    )));
                }
                MessageView::Warning(warning) => {
                    warn!(
                        warning = %warning.error(),
                        debug = ?warning.debug(),
                        "pipeline warning"
                    );
                }
                MessageView::Eos(..) => {
                    info!("frame stream reached end of stream");
                    self.slot.close();
                }
                _ => trace!(message = ?message.type_(), "pipeline message"),
            }
        }
        Ok(())
    }
}

impl FrameSource for FramePipeline {
    fn next_sample(&mut self, timeout: Duration) -> Result<SourceEvent> {
        self.poll_bus()?;
        match self.slot.take(timeout) {
            Take::Item(sample) => Ok(SourceEvent::Sample(sample)),
            Take::Timeout => Ok(SourceEvent::Idle),
            Take::Closed => Ok(SourceEvent::Ended),
        }
    }

    fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;

        if let Err(err) = self.pipeline.set_state(gst::State::Null) {
            warn!(error = ?err, "failed to stop pipeline");
        }
        self.slot.close();
        // closes the PipeWire remote
        self.fd.take();

        let stats = self.slot.stats();
        info!(
            offered = stats.offered,
            delivered = stats.delivered,
            dropped = stats.dropped,
            "frame pipeline stopped"
        );
    }
}

impl Drop for FramePipeline {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Set `pipeline` playing, tearing it back down to Null if it refuses
fn play(pipeline: &gst::Pipeline) -> Result<()> {
    if let Err(e) = pipeline.set_state(gst::State::Playing) {
        if let Err(err) = pipeline.set_state(gst::State::Null) {
            warn!(error = ?err, "failed to reset pipeline after a failed start");
        }
        return Err(Error::Pipeline(format!("Failed to start pipeline: {:?}", e)));
    }
    Ok(())
}

/// Copy a sample out of GStreamer, taking the row layout from the buffer's
/// video meta when present and from the negotiated caps otherwise
fn build_sample(sample: &gst::Sample, started: Instant) -> std::result::Result<RawSample, String> {
    let caps = sample.caps().ok_or("sample without caps")?;
    let info = gst_video::VideoInfo::from_caps(caps).map_err(|e| e.to_string())?;
    let buffer = sample.buffer().ok_or("sample without buffer")?;

    let (offset, stride) = match buffer.meta::<gst_video::VideoMeta>() {
        Some(meta) => (meta.offset()[0], meta.stride()[0]),
        None => (info.offset()[0], info.stride()[0]),
    };
    let stride = usize::try_from(stride).map_err(|_| format!("negative stride {}", stride))?;

    let map = buffer.map_readable().map_err(|e| e.to_string())?;
    let data = map
        .as_slice()
        .get(offset..)
        .ok_or_else(|| format!("plane offset {} past end of {} byte buffer", offset, map.size()))?
        .to_vec();

    let format = info.format().to_str().to_string();
    let (width, height) = (info.width(), info.height());
    trace!(width, height, stride, %format, len = data.len(), "sample");

    Ok(RawSample {
        data,
        width,
        height,
        stride,
        format,
        timestamp_ms: started.elapsed().as_millis(),
    })
}

fn map_gst_error(err: impl std::fmt::Display) -> Error {
    Error::Pipeline(format!("GStreamer error: {}", err))
}
