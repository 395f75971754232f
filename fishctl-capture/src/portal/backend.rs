use super::correlation::CorrelationRegistry;
use super::options::{CreateSessionOptions, OpenRemoteOptions, SelectSourcesOptions, StartOptions};
use std::os::fd::OwnedFd;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// The remote side of the handshake.
///
/// Method calls return as soon as the portal accepted the request; the
/// outcome is delivered later through the registry handed to [`subscribe`].
///
/// [`subscribe`]: ScreencastBackend::subscribe
#[allow(async_fn_in_trait)]
pub trait ScreencastBackend {
    /// Start routing `Response` signals into `registry`
    async fn subscribe(&self, registry: Arc<CorrelationRegistry>)
        -> zbus::Result<ResponseListener>;

    async fn create_session(&self, options: &CreateSessionOptions) -> zbus::Result<()>;

    async fn select_sources(
        &self,
        session: &str,
        options: &SelectSourcesOptions,
    ) -> zbus::Result<()>;

    async fn start(
        &self,
        session: &str,
        parent_window: &str,
        options: &StartOptions,
    ) -> zbus::Result<()>;

    async fn open_pipe_wire_remote(
        &self,
        session: &str,
        options: &OpenRemoteOptions,
    ) -> zbus::Result<OwnedFd>;

    async fn close_session(&self, session: &str) -> zbus::Result<()>;
}

/// Keeps a response-routing task alive; aborts it on drop
#[derive(Debug, Default)]
pub struct ResponseListener {
    task: Option<JoinHandle<()>>,
}

impl ResponseListener {
    pub fn new(task: JoinHandle<()>) -> Self {
        Self { task: Some(task) }
    }

    /// A listener with no task of its own, for backends that deliver responses inline
    pub fn detached() -> Self {
        Self { task: None }
    }

    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for ResponseListener {
    fn drop(&mut self) {
        self.stop();
    }
}
