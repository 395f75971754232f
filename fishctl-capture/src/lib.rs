//! fishctl-capture: live screen frames on Linux (Wayland via xdg-desktop-portal)
//!
//! This crate provides:
//! - The ScreenCast portal handshake over D-Bus, with request/response correlation
//! - A GStreamer pipeline reading the negotiated PipeWire node
//! - A leaky single-slot handoff so consumers always see the newest frame
//! - Decoding of raw samples into `(height, width, 4)` pixel arrays

pub mod error;
pub mod pipeline;
pub mod portal;

// Re-export common types at crate root
pub use error::{DecodeError, Error, NegotiationError, Result};
pub use pipeline::{
    decode_sample, Frame, FramePipeline, FrameSlot, FrameSource, PixelFormat, RawSample,
    SlotStats, SourceEvent, Take,
};
pub use portal::{
    Canceller, CaptureHandle, CorrelationRegistry, CursorMode, DbusBackend, NegotiationState,
    Negotiator, ScreencastBackend, Stage, StreamDescriptor,
};
