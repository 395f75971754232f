use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("failed to create uinput device: {0}")]
    DeviceCreation(#[from] std::io::Error),

    #[error("failed to emit input event: {0}")]
    EmitFailed(#[source] std::io::Error),

    #[error("unknown key name '{0}'")]
    UnknownKey(String),

    #[error("unknown mouse button '{0}' (expected left, right, middle, side or extra)")]
    UnknownButton(String),
}

pub type Result<T> = std::result::Result<T, Error>;
