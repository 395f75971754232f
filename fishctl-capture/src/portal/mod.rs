//! xdg-desktop-portal ScreenCast negotiation.
//!
//! The portal answers every method call twice: the call itself returns a
//! request object path, and the real result arrives later as a `Response`
//! signal on that path. The [`CorrelationRegistry`] matches those signals back
//! to the stage that is waiting for them, and the [`Negotiator`] walks the
//! four stages in order.

pub mod backend;
pub mod correlation;
pub mod dbus;
pub mod negotiator;
pub mod options;
pub mod token;

use serde::Deserialize;
use std::fmt;
use zvariant::{DeserializeDict, Type};

pub use backend::{ResponseListener, ScreencastBackend};
pub use correlation::{CorrelationRegistry, PortalResponse};
pub use dbus::DbusBackend;
pub use negotiator::{Canceller, CaptureHandle, NegotiationState, Negotiator, Session};
pub use options::{
    CreateSessionOptions, CursorMode, OpenRemoteOptions, SelectSourcesOptions, SourceTypes,
    StartOptions,
};
pub use token::TokenMinter;

pub const PORTAL_DESTINATION: &str = "org.freedesktop.portal.Desktop";
pub const PORTAL_PATH: &str = "/org/freedesktop/portal/desktop";
pub const SCREENCAST_INTERFACE: &str = "org.freedesktop.portal.ScreenCast";
pub const REQUEST_INTERFACE: &str = "org.freedesktop.portal.Request";
pub const SESSION_INTERFACE: &str = "org.freedesktop.portal.Session";

/// One request/response exchange of the handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    CreateSession,
    SelectSources,
    Start,
    OpenRemote,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::CreateSession => "CreateSession",
            Stage::SelectSources => "SelectSources",
            Stage::Start => "Start",
            Stage::OpenRemote => "OpenPipeWireRemote",
        };
        f.write_str(name)
    }
}

/// Numeric code of a `Response` signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseCode {
    Success,
    /// The user dismissed the dialog
    Cancelled,
    Other(u32),
}

impl From<u32> for ResponseCode {
    fn from(code: u32) -> Self {
        match code {
            0 => ResponseCode::Success,
            1 => ResponseCode::Cancelled,
            other => ResponseCode::Other(other),
        }
    }
}

impl ResponseCode {
    pub fn is_success(self) -> bool {
        self == ResponseCode::Success
    }
}

impl fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseCode::Success => f.write_str("0 (success)"),
            ResponseCode::Cancelled => f.write_str("1 (cancelled by user)"),
            ResponseCode::Other(code) => write!(f, "{} (failed)", code),
        }
    }
}

/// Result dictionary of a `Response` signal.
///
/// Only the keys the handshake reads are kept; anything else the portal adds
/// is ignored.
#[derive(DeserializeDict, Type, Debug, Default, Clone, PartialEq)]
#[zvariant(signature = "dict")]
pub struct ResponseResults {
    pub session_handle: Option<String>,
    pub streams: Option<Vec<StreamDescriptor>>,
}

/// A PipeWire node offered by the portal together with its properties
#[derive(Deserialize, Type, Debug, Clone, PartialEq)]
pub struct StreamDescriptor(u32, StreamProperties);

impl StreamDescriptor {
    pub fn new(node_id: u32, properties: StreamProperties) -> Self {
        Self(node_id, properties)
    }

    pub fn node_id(&self) -> u32 {
        self.0
    }

    pub fn properties(&self) -> &StreamProperties {
        &self.1
    }
}

#[derive(DeserializeDict, Type, Debug, Default, Clone, PartialEq)]
#[zvariant(signature = "dict")]
pub struct StreamProperties {
    pub id: Option<String>,
    pub position: Option<(i32, i32)>,
    pub size: Option<(i32, i32)>,
    pub source_type: Option<u32>,
}
