use fishctl_capture::portal::options::{
    CreateSessionOptions, CursorMode, OpenRemoteOptions, SelectSourcesOptions, StartOptions,
};
use fishctl_capture::portal::token::session_path;
use fishctl_capture::portal::{
    CorrelationRegistry, NegotiationState, Negotiator, ResponseCode, ResponseListener,
    ResponseResults, ScreencastBackend, Stage, StreamDescriptor, StreamProperties,
};
use fishctl_capture::NegotiationError;
use std::os::fd::OwnedFd;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

const IDENTITY: &str = "1_7";

#[derive(Clone, Copy)]
enum Delivery {
    /// Resolve before the call returns
    Inline,
    /// Resolve from another task after the call returned
    Spawned,
}

/// In-memory portal answering each request according to a script
struct ScriptedPortal {
    codes: Vec<u32>,
    streams: Vec<StreamDescriptor>,
    failing_call: Option<&'static str>,
    /// Stage whose request never gets a response
    silent_stage: Option<usize>,
    delivery: Delivery,
    registry: Mutex<Option<Arc<CorrelationRegistry>>>,
    calls: Mutex<Vec<&'static str>>,
    last_cursor_mode: Mutex<Option<u32>>,
    /// Outstanding requests seen when the session was closed
    pending_at_close: Mutex<Option<usize>>,
}

impl ScriptedPortal {
    fn new(codes: &[u32]) -> Self {
        Self {
            codes: codes.to_vec(),
            streams: vec![stream(42)],
            failing_call: None,
            silent_stage: None,
            delivery: Delivery::Inline,
            registry: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
            last_cursor_mode: Mutex::new(None),
            pending_at_close: Mutex::new(None),
        }
    }

    fn with_streams(mut self, streams: Vec<StreamDescriptor>) -> Self {
        self.streams = streams;
        self
    }

    fn failing(mut self, call: &'static str) -> Self {
        self.failing_call = Some(call);
        self
    }

    fn silent_at(mut self, stage: usize) -> Self {
        self.silent_stage = Some(stage);
        self
    }

    fn spawned(mut self) -> Self {
        self.delivery = Delivery::Spawned;
        self
    }

    fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: &'static str) -> zbus::Result<()> {
        self.calls.lock().unwrap().push(call);
        if self.failing_call == Some(call) {
            return Err(zbus::Error::Failure(format!("{} refused", call)));
        }
        Ok(())
    }

    fn registry(&self) -> Arc<CorrelationRegistry> {
        self.registry
            .lock()
            .unwrap()
            .clone()
            .expect("subscribed before the first call")
    }

    fn respond(&self, stage: usize, token: &str, results: ResponseResults) {
        if self.silent_stage == Some(stage) {
            return;
        }
        let code = self.codes.get(stage).copied().unwrap_or(0);
        let registry = self.registry();
        match self.delivery {
            Delivery::Inline => {
                assert!(registry.resolve(token, code, results));
            }
            Delivery::Spawned => {
                let token = token.to_string();
                tokio::spawn(async move {
                    // a stray response for someone else's request arrives first
                    registry.resolve("u999999", 0, ResponseResults::default());
                    tokio::task::yield_now().await;
                    assert!(registry.resolve(&token, code, results));
                });
            }
        }
    }
}

fn stream(node_id: u32) -> StreamDescriptor {
    StreamDescriptor::new(
        node_id,
        StreamProperties {
            size: Some((1920, 1080)),
            source_type: Some(1),
            ..Default::default()
        },
    )
}

impl ScreencastBackend for ScriptedPortal {
    async fn subscribe(
        &self,
        registry: Arc<CorrelationRegistry>,
    ) -> zbus::Result<ResponseListener> {
        *self.registry.lock().unwrap() = Some(registry);
        Ok(ResponseListener::detached())
    }

    async fn create_session(&self, options: &CreateSessionOptions) -> zbus::Result<()> {
        self.record("CreateSession")?;
        let results = ResponseResults {
            session_handle: Some(session_path(IDENTITY, &options.session_handle_token)),
            streams: None,
        };
        self.respond(0, &options.handle_token, results);
        Ok(())
    }

    async fn select_sources(
        &self,
        session: &str,
        options: &SelectSourcesOptions,
    ) -> zbus::Result<()> {
        assert!(session.starts_with("/org/freedesktop/portal/desktop/session/1_7/"));
        self.record("SelectSources")?;
        *self.last_cursor_mode.lock().unwrap() = options.cursor_mode;
        self.respond(1, &options.handle_token, ResponseResults::default());
        Ok(())
    }

    async fn start(
        &self,
        _session: &str,
        parent_window: &str,
        options: &StartOptions,
    ) -> zbus::Result<()> {
        assert_eq!(parent_window, "");
        self.record("Start")?;
        let results = ResponseResults {
            session_handle: None,
            streams: Some(self.streams.clone()),
        };
        self.respond(2, &options.handle_token, results);
        Ok(())
    }

    async fn open_pipe_wire_remote(
        &self,
        _session: &str,
        _options: &OpenRemoteOptions,
    ) -> zbus::Result<OwnedFd> {
        self.record("OpenPipeWireRemote")?;
        Ok(std::fs::File::open("/dev/null").unwrap().into())
    }

    async fn close_session(&self, _session: &str) -> zbus::Result<()> {
        *self.pending_at_close.lock().unwrap() = Some(self.registry().len());
        self.record("Close")
    }
}

#[tokio::test]
async fn all_stages_succeed_and_capture_becomes_active() {
    let mut negotiator = Negotiator::new(ScriptedPortal::new(&[0, 0, 0]));
    assert_eq!(negotiator.state(), NegotiationState::Idle);

    let handle = negotiator.begin_capture().await.unwrap();

    assert_eq!(negotiator.state(), NegotiationState::Active);
    assert_eq!(handle.node_id(), 42);
    assert_eq!(handle.stream.properties().size, Some((1920, 1080)));
    assert_eq!(negotiator.pending_requests(), 0);
    assert_eq!(
        negotiator.backend().calls(),
        vec!["CreateSession", "SelectSources", "Start", "OpenPipeWireRemote"]
    );

    let session = negotiator.session().unwrap();
    assert!(session.handle.ends_with(&format!("/{}", session.token)));
}

#[tokio::test]
async fn responses_delivered_from_another_task_are_awaited() {
    let portal = ScriptedPortal::new(&[0, 0, 0]).spawned();
    let mut negotiator = Negotiator::new(portal);

    let handle = negotiator.begin_capture().await.unwrap();

    assert_eq!(handle.node_id(), 42);
    assert_eq!(negotiator.state(), NegotiationState::Active);
}

#[tokio::test]
async fn cancelled_source_selection_terminates_without_start() {
    let mut negotiator = Negotiator::new(ScriptedPortal::new(&[0, 1]));

    let err = negotiator.begin_capture().await.unwrap_err();

    assert!(matches!(
        err,
        NegotiationError::Rejected {
            stage: Stage::SelectSources,
            code: ResponseCode::Cancelled
        }
    ));
    assert_eq!(negotiator.state(), NegotiationState::Terminated);
    assert!(negotiator.session().is_none());
    let calls = negotiator.backend().calls();
    assert!(!calls.contains(&"Start"));
    assert_eq!(calls, vec!["CreateSession", "SelectSources", "Close"]);
}

#[tokio::test]
async fn failed_session_creation_is_fatal() {
    let mut negotiator = Negotiator::new(ScriptedPortal::new(&[2]));

    let err = negotiator.begin_capture().await.unwrap_err();

    assert!(matches!(
        err,
        NegotiationError::Rejected {
            stage: Stage::CreateSession,
            code: ResponseCode::Other(2)
        }
    ));
    assert_eq!(negotiator.state(), NegotiationState::Terminated);
    // no session was created, so there is nothing to close
    assert_eq!(negotiator.backend().calls(), vec!["CreateSession"]);
}

#[tokio::test]
async fn start_without_streams_is_fatal() {
    let portal = ScriptedPortal::new(&[0, 0, 0]).with_streams(Vec::new());
    let mut negotiator = Negotiator::new(portal);

    let err = negotiator.begin_capture().await.unwrap_err();

    assert!(matches!(err, NegotiationError::NoStreams));
    assert_eq!(negotiator.state(), NegotiationState::Terminated);
    assert!(!negotiator
        .backend()
        .calls()
        .contains(&"OpenPipeWireRemote"));
}

#[tokio::test]
async fn first_of_several_streams_is_used() {
    let portal = ScriptedPortal::new(&[0, 0, 0]).with_streams(vec![stream(7), stream(8)]);
    let mut negotiator = Negotiator::new(portal);

    let handle = negotiator.begin_capture().await.unwrap();

    assert_eq!(handle.node_id(), 7);
}

#[tokio::test]
async fn failing_call_drops_its_pending_request() {
    let portal = ScriptedPortal::new(&[0, 0, 0]).failing("SelectSources");
    let mut negotiator = Negotiator::new(portal);

    let err = negotiator.begin_capture().await.unwrap_err();

    assert!(matches!(
        err,
        NegotiationError::Call {
            stage: Stage::SelectSources,
            ..
        }
    ));
    // the failed request was dropped before cleanup started
    assert_eq!(*negotiator.backend().pending_at_close.lock().unwrap(), Some(0));
    assert_eq!(negotiator.pending_requests(), 0);
    assert_eq!(negotiator.state(), NegotiationState::Terminated);
}

#[tokio::test]
async fn cancel_wakes_the_waiting_stage_and_closes_the_session() {
    let portal = ScriptedPortal::new(&[0, 0, 0]).silent_at(1);
    let mut negotiator = Negotiator::new(portal);
    let canceller = negotiator.canceller();
    tokio::spawn(async move {
        tokio::task::yield_now().await;
        canceller.cancel();
    });

    let err = negotiator.begin_capture().await.unwrap_err();

    assert!(matches!(
        err,
        NegotiationError::Cancelled {
            stage: Stage::SelectSources
        }
    ));
    assert_eq!(negotiator.state(), NegotiationState::Terminated);
    assert_eq!(negotiator.pending_requests(), 0);
    assert_eq!(
        negotiator.backend().calls(),
        vec!["CreateSession", "SelectSources", "Close"]
    );
}

#[tokio::test]
async fn cancel_from_another_thread_interrupts_a_stalled_dialog() {
    let portal = ScriptedPortal::new(&[0, 0, 0]).silent_at(2);
    let mut negotiator = Negotiator::new(portal);
    let canceller = negotiator.canceller();
    let interrupter = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        canceller.cancel();
    });

    let err = negotiator.begin_capture().await.unwrap_err();
    interrupter.join().unwrap();

    assert!(matches!(
        err,
        NegotiationError::Cancelled {
            stage: Stage::Start
        }
    ));
    assert_eq!(negotiator.state(), NegotiationState::Terminated);
    assert!(negotiator.backend().calls().contains(&"Close"));
}

#[tokio::test]
async fn cancel_before_start_issues_no_calls() {
    let mut negotiator = Negotiator::new(ScriptedPortal::new(&[0, 0, 0]));
    negotiator.canceller().cancel();

    let err = negotiator.begin_capture().await.unwrap_err();

    assert!(matches!(
        err,
        NegotiationError::Cancelled {
            stage: Stage::CreateSession
        }
    ));
    assert_eq!(negotiator.state(), NegotiationState::Terminated);
    assert!(negotiator.backend().calls().is_empty());
}

#[tokio::test]
async fn cursor_mode_is_forwarded_to_source_selection() {
    let portal = ScriptedPortal::new(&[0, 0, 0]);
    let mut negotiator = Negotiator::new(portal).with_cursor_mode(Some(CursorMode::Embedded));

    negotiator.begin_capture().await.unwrap();

    assert_eq!(*negotiator.backend().last_cursor_mode.lock().unwrap(), Some(2));
}

#[tokio::test]
async fn terminate_closes_session_once() {
    let mut negotiator = Negotiator::new(ScriptedPortal::new(&[0, 0, 0]));
    let _handle = negotiator.begin_capture().await.unwrap();

    negotiator.terminate().await;
    negotiator.terminate().await;

    assert_eq!(negotiator.state(), NegotiationState::Terminated);
    let closes = negotiator
        .backend()
        .calls()
        .into_iter()
        .filter(|call| *call == "Close")
        .count();
    assert_eq!(closes, 1);
}

#[tokio::test]
async fn capture_cannot_begin_twice() {
    let mut negotiator = Negotiator::new(ScriptedPortal::new(&[0, 0, 0]));
    let _handle = negotiator.begin_capture().await.unwrap();

    let err = negotiator.begin_capture().await.unwrap_err();
    assert!(matches!(err, NegotiationError::InvalidState(_)));
    assert_eq!(negotiator.state(), NegotiationState::Active);

    negotiator.terminate().await;
    let err = negotiator.begin_capture().await.unwrap_err();
    assert!(matches!(err, NegotiationError::InvalidState("terminated")));
}
