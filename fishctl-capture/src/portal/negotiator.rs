use super::backend::{ResponseListener, ScreencastBackend};
use super::correlation::{CorrelationRegistry, PortalResponse};
use super::options::{
    CreateSessionOptions, CursorMode, OpenRemoteOptions, SelectSourcesOptions, StartOptions,
};
use super::token::TokenMinter;
use super::{Stage, StreamDescriptor};
use crate::error::NegotiationError;
use std::os::fd::OwnedFd;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

static REQUEST_TOKENS: TokenMinter = TokenMinter::new();
static SESSION_TOKENS: TokenMinter = TokenMinter::new();

/// Where the handshake currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationState {
    Idle,
    CreatingSession,
    SelectingSources,
    Starting,
    StreamReady,
    Active,
    /// Absorbing: reached on failure or explicit termination
    Terminated,
}

/// A portal session created by stage 1
#[derive(Debug, Clone)]
pub struct Session {
    pub handle: String,
    pub token: String,
    pub created_at: SystemTime,
}

/// What a completed handshake yields: the PipeWire remote and the node to read
#[derive(Debug)]
pub struct CaptureHandle {
    pub fd: OwnedFd,
    pub stream: StreamDescriptor,
}

impl CaptureHandle {
    pub fn node_id(&self) -> u32 {
        self.stream.node_id()
    }
}

/// Cancels a negotiation from any thread, e.g. a signal handler.
///
/// The stage currently waiting for the portal fails with
/// [`NegotiationError::Cancelled`] and the negotiator terminates itself.
#[derive(Clone)]
pub struct Canceller {
    registry: Arc<CorrelationRegistry>,
}

impl Canceller {
    pub fn cancel(&self) {
        self.registry.close();
    }
}

/// Drives CreateSession → SelectSources → Start → OpenPipeWireRemote.
///
/// Exactly one request is in flight at a time; each stage suspends until the
/// portal's `Response` for its own token has been routed through the registry.
pub struct Negotiator<B> {
    backend: B,
    cursor_mode: Option<CursorMode>,
    state: NegotiationState,
    registry: Arc<CorrelationRegistry>,
    listener: Option<ResponseListener>,
    session: Option<Session>,
}

impl<B: ScreencastBackend> Negotiator<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            cursor_mode: None,
            state: NegotiationState::Idle,
            registry: Arc::new(CorrelationRegistry::new()),
            listener: None,
            session: None,
        }
    }

    pub fn with_cursor_mode(mut self, cursor_mode: Option<CursorMode>) -> Self {
        self.cursor_mode = cursor_mode;
        self
    }

    pub fn state(&self) -> NegotiationState {
        self.state
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Requests still waiting for a response
    pub fn pending_requests(&self) -> usize {
        self.registry.len()
    }

    pub fn canceller(&self) -> Canceller {
        Canceller {
            registry: Arc::clone(&self.registry),
        }
    }

    /// Run the whole handshake.
    ///
    /// On any failure the negotiator terminates itself (releasing whatever it
    /// acquired) before returning the error.
    pub async fn begin_capture(&mut self) -> Result<CaptureHandle, NegotiationError> {
        match self.state {
            NegotiationState::Idle => {}
            NegotiationState::Terminated => {
                return Err(NegotiationError::InvalidState("terminated"))
            }
            _ => return Err(NegotiationError::InvalidState("started")),
        }

        match self.negotiate().await {
            Ok(handle) => {
                self.state = NegotiationState::Active;
                info!(node_id = handle.node_id(), "screen cast active");
                Ok(handle)
            }
            Err(err) => {
                error!(error = %err, state = ?self.state, "negotiation failed");
                self.terminate().await;
                Err(err)
            }
        }
    }

    async fn negotiate(&mut self) -> Result<CaptureHandle, NegotiationError> {
        let registry = Arc::clone(&self.registry);
        let listener = self
            .backend
            .subscribe(Arc::clone(&registry))
            .await
            .map_err(|source| NegotiationError::Call {
                stage: Stage::CreateSession,
                source,
            })?;
        self.listener = Some(listener);

        let session = self.create_session(&registry).await?;
        self.select_sources(&registry, &session.handle).await?;
        let stream = self.start(&registry, &session.handle).await?;

        self.state = NegotiationState::StreamReady;
        let fd = self
            .backend
            .open_pipe_wire_remote(&session.handle, &OpenRemoteOptions::default())
            .await
            .map_err(|source| NegotiationError::Call {
                stage: Stage::OpenRemote,
                source,
            })?;
        debug!(node_id = stream.node_id(), "opened PipeWire remote");

        Ok(CaptureHandle { fd, stream })
    }

    async fn create_session(
        &mut self,
        registry: &CorrelationRegistry,
    ) -> Result<Session, NegotiationError> {
        self.state = NegotiationState::CreatingSession;
        let stage = Stage::CreateSession;
        let token = REQUEST_TOKENS.next();
        let session_token = SESSION_TOKENS.next();
        let response = expect_response(registry, &token, stage)?;

        let options = CreateSessionOptions {
            handle_token: token.clone(),
            session_handle_token: session_token.clone(),
        };
        let issued = self.backend.create_session(&options).await;
        check_issued(registry, &token, stage, issued)?;

        let response = wait_for(stage, response).await?;
        let handle = response
            .results
            .session_handle
            .ok_or(NegotiationError::MissingSessionHandle)?;
        info!(session = %handle, token = %session_token, "session created");

        let session = Session {
            handle,
            token: session_token,
            created_at: SystemTime::now(),
        };
        self.session = Some(session.clone());
        Ok(session)
    }

    async fn select_sources(
        &mut self,
        registry: &CorrelationRegistry,
        session: &str,
    ) -> Result<(), NegotiationError> {
        self.state = NegotiationState::SelectingSources;
        let stage = Stage::SelectSources;
        let token = REQUEST_TOKENS.next();
        let response = expect_response(registry, &token, stage)?;

        let options = SelectSourcesOptions::single(token.clone(), self.cursor_mode);
        let issued = self.backend.select_sources(session, &options).await;
        check_issued(registry, &token, stage, issued)?;

        debug!("waiting for the user to pick a cast source");
        wait_for(stage, response).await?;
        debug!("cast source selected");
        Ok(())
    }

    async fn start(
        &mut self,
        registry: &CorrelationRegistry,
        session: &str,
    ) -> Result<StreamDescriptor, NegotiationError> {
        self.state = NegotiationState::Starting;
        let stage = Stage::Start;
        let token = REQUEST_TOKENS.next();
        let response = expect_response(registry, &token, stage)?;

        let options = StartOptions {
            handle_token: token.clone(),
        };
        let issued = self.backend.start(session, "", &options).await;
        check_issued(registry, &token, stage, issued)?;

        let response = wait_for(stage, response).await?;
        let mut streams = response.results.streams.unwrap_or_default().into_iter();
        let first = streams.next().ok_or(NegotiationError::NoStreams)?;
        info!(
            node_id = first.node_id(),
            properties = ?first.properties(),
            "using stream"
        );
        for extra in streams {
            warn!(
                node_id = extra.node_id(),
                properties = ?extra.properties(),
                "ignoring additional stream"
            );
        }
        Ok(first)
    }

    /// Release everything acquired so far and enter `Terminated`.
    ///
    /// Safe from any state and idempotent; cleanup failures are only logged.
    pub async fn terminate(&mut self) {
        if self.state == NegotiationState::Terminated {
            return;
        }

        if let Some(mut listener) = self.listener.take() {
            listener.stop();
        }
        if let Some(session) = self.session.take() {
            match self.backend.close_session(&session.handle).await {
                Ok(()) => debug!(session = %session.handle, "session closed"),
                Err(err) => debug!(session = %session.handle, error = %err, "closing session failed"),
            }
        }
        self.registry.close();

        self.state = NegotiationState::Terminated;
    }
}

fn expect_response(
    registry: &CorrelationRegistry,
    token: &str,
    stage: Stage,
) -> Result<oneshot::Receiver<PortalResponse>, NegotiationError> {
    let (tx, rx) = oneshot::channel();
    registry.register(token, stage, tx)?;
    Ok(rx)
}

fn check_issued(
    registry: &CorrelationRegistry,
    token: &str,
    stage: Stage,
    issued: zbus::Result<()>,
) -> Result<(), NegotiationError> {
    issued.map_err(|source| {
        registry.cancel(token);
        NegotiationError::Call { stage, source }
    })
}

async fn wait_for(
    stage: Stage,
    response: oneshot::Receiver<PortalResponse>,
) -> Result<PortalResponse, NegotiationError> {
    let response = response
        .await
        .map_err(|_| NegotiationError::Cancelled { stage })?;
    debug_assert_eq!(response.stage, stage);

    if !response.code.is_success() {
        return Err(NegotiationError::Rejected {
            stage,
            code: response.code,
        });
    }
    Ok(response)
}
