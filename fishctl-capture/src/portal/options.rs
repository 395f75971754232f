//! Typed option dictionaries for the ScreenCast methods.
//!
//! Each struct serializes to the `a{sv}` the portal expects; `None` fields are
//! left out of the dictionary.

use std::fmt;
use std::ops::BitOr;
use std::str::FromStr;
use zvariant::{SerializeDict, Type};

/// Bitmask of capturable source kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceTypes(u32);

impl SourceTypes {
    pub const MONITOR: SourceTypes = SourceTypes(1);
    pub const WINDOW: SourceTypes = SourceTypes(2);
    pub const VIRTUAL: SourceTypes = SourceTypes(4);

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn contains(self, other: SourceTypes) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for SourceTypes {
    type Output = SourceTypes;

    fn bitor(self, rhs: Self) -> Self::Output {
        SourceTypes(self.0 | rhs.0)
    }
}

/// How the cursor shows up in the captured stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorMode {
    Hidden,
    Embedded,
    Metadata,
}

impl CursorMode {
    pub fn bits(self) -> u32 {
        match self {
            CursorMode::Hidden => 1,
            CursorMode::Embedded => 2,
            CursorMode::Metadata => 4,
        }
    }
}

impl FromStr for CursorMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "hidden" => Ok(CursorMode::Hidden),
            "embedded" => Ok(CursorMode::Embedded),
            "metadata" => Ok(CursorMode::Metadata),
            _ => Err(format!(
                "Unknown cursor mode '{}'. Use: hidden, embedded, metadata",
                s
            )),
        }
    }
}

impl fmt::Display for CursorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CursorMode::Hidden => "hidden",
            CursorMode::Embedded => "embedded",
            CursorMode::Metadata => "metadata",
        };
        f.write_str(name)
    }
}

#[derive(SerializeDict, Type, Debug, Clone, PartialEq)]
#[zvariant(signature = "dict")]
pub struct CreateSessionOptions {
    pub handle_token: String,
    pub session_handle_token: String,
}

#[derive(SerializeDict, Type, Debug, Clone, PartialEq)]
#[zvariant(signature = "dict")]
pub struct SelectSourcesOptions {
    pub handle_token: String,
    pub types: u32,
    pub multiple: bool,
    pub cursor_mode: Option<u32>,
}

impl SelectSourcesOptions {
    /// A single monitor or window, chosen by the user
    pub fn single(handle_token: String, cursor_mode: Option<CursorMode>) -> Self {
        Self {
            handle_token,
            types: (SourceTypes::MONITOR | SourceTypes::WINDOW).bits(),
            multiple: false,
            cursor_mode: cursor_mode.map(CursorMode::bits),
        }
    }
}

#[derive(SerializeDict, Type, Debug, Clone, PartialEq)]
#[zvariant(signature = "dict")]
pub struct StartOptions {
    pub handle_token: String,
}

/// `OpenPipeWireRemote` takes no options yet; the dictionary is sent empty
#[derive(SerializeDict, Type, Debug, Clone, Default, PartialEq)]
#[zvariant(signature = "dict")]
pub struct OpenRemoteOptions {}
