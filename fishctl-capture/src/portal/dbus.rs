use super::backend::{ResponseListener, ScreencastBackend};
use super::correlation::CorrelationRegistry;
use super::options::{CreateSessionOptions, OpenRemoteOptions, SelectSourcesOptions, StartOptions};
use super::token::{request_path_namespace, sender_path_element, token_from_request_path};
use super::{
    ResponseResults, PORTAL_DESTINATION, PORTAL_PATH, REQUEST_INTERFACE, SCREENCAST_INTERFACE,
    SESSION_INTERFACE,
};
use futures_util::StreamExt;
use std::os::fd::OwnedFd;
use std::sync::Arc;
use tracing::{debug, warn};
use zbus::message::Type as MessageType;
use zbus::{Connection, MatchRule, Message, MessageStream, Proxy};
use zvariant::{ObjectPath, OwnedObjectPath};

/// Portal code reported for a `Response` whose body could not be decoded
const UNDECODABLE_RESPONSE: u32 = 2;

/// ScreenCast portal on the session bus
pub struct DbusBackend {
    connection: Connection,
    identity: String,
}

impl DbusBackend {
    pub async fn connect() -> zbus::Result<Self> {
        let connection = Connection::session().await?;
        Self::with_connection(connection)
    }

    pub fn with_connection(connection: Connection) -> zbus::Result<Self> {
        let unique_name = connection
            .unique_name()
            .ok_or_else(|| zbus::Error::Failure("connection has no unique name".into()))?;
        let identity = sender_path_element(unique_name.as_str());
        debug!(%identity, "connected to session bus");
        Ok(Self {
            connection,
            identity,
        })
    }

    async fn screencast(&self) -> zbus::Result<Proxy<'static>> {
        Proxy::new(
            &self.connection,
            PORTAL_DESTINATION,
            PORTAL_PATH,
            SCREENCAST_INTERFACE,
        )
        .await
    }
}

fn session_path(session: &str) -> zbus::Result<ObjectPath<'_>> {
    ObjectPath::try_from(session).map_err(zbus::Error::from)
}

impl ScreencastBackend for DbusBackend {
    async fn subscribe(
        &self,
        registry: Arc<CorrelationRegistry>,
    ) -> zbus::Result<ResponseListener> {
        // Subscribed before the first call, so no response can slip past
        let rule = MatchRule::builder()
            .msg_type(MessageType::Signal)
            .interface(REQUEST_INTERFACE)?
            .member("Response")?
            .path_namespace(request_path_namespace(&self.identity))?
            .build();
        let mut stream = MessageStream::for_match_rule(rule, &self.connection, None).await?;

        let task = tokio::spawn(async move {
            while let Some(message) = stream.next().await {
                match message {
                    Ok(message) => route_response(&registry, &message),
                    Err(err) => warn!(error = %err, "error on portal response stream"),
                }
            }
            debug!("portal response stream ended");
        });
        Ok(ResponseListener::new(task))
    }

    async fn create_session(&self, options: &CreateSessionOptions) -> zbus::Result<()> {
        let request: OwnedObjectPath = self
            .screencast()
            .await?
            .call("CreateSession", &(options,))
            .await?;
        debug!(request = %request.as_str(), "CreateSession issued");
        Ok(())
    }

    async fn select_sources(
        &self,
        session: &str,
        options: &SelectSourcesOptions,
    ) -> zbus::Result<()> {
        let session = session_path(session)?;
        let request: OwnedObjectPath = self
            .screencast()
            .await?
            .call("SelectSources", &(&session, options))
            .await?;
        debug!(request = %request.as_str(), "SelectSources issued");
        Ok(())
    }

    async fn start(
        &self,
        session: &str,
        parent_window: &str,
        options: &StartOptions,
    ) -> zbus::Result<()> {
        let session = session_path(session)?;
        let request: OwnedObjectPath = self
            .screencast()
            .await?
            .call("Start", &(&session, parent_window, options))
            .await?;
        debug!(request = %request.as_str(), "Start issued");
        Ok(())
    }

    async fn open_pipe_wire_remote(
        &self,
        session: &str,
        options: &OpenRemoteOptions,
    ) -> zbus::Result<OwnedFd> {
        let session = session_path(session)?;
        let fd: zvariant::OwnedFd = self
            .screencast()
            .await?
            .call("OpenPipeWireRemote", &(&session, options))
            .await?;
        Ok(fd.into())
    }

    async fn close_session(&self, session: &str) -> zbus::Result<()> {
        let proxy = Proxy::new(
            &self.connection,
            PORTAL_DESTINATION,
            session_path(session)?,
            SESSION_INTERFACE,
        )
        .await?;
        proxy.call_method("Close", &()).await?;
        Ok(())
    }
}

fn route_response(registry: &CorrelationRegistry, message: &Message) {
    let header = message.header();
    let path = header.path().map(|path| path.as_str());
    dispatch_response(registry, path, || message.body().deserialize());
}

/// Hand one `Response` to the request waiting on `path`; returns whether one was waiting
fn dispatch_response(
    registry: &CorrelationRegistry,
    path: Option<&str>,
    body: impl FnOnce() -> zbus::Result<(u32, ResponseResults)>,
) -> bool {
    let Some(path) = path else {
        warn!("response signal without an object path");
        return false;
    };
    let Some(token) = token_from_request_path(path) else {
        warn!(%path, "response on a path without a token");
        return false;
    };

    match body() {
        Ok((code, results)) => registry.resolve(token, code, results),
        Err(err) => {
            warn!(%token, error = %err, "undecodable portal response");
            registry.resolve(token, UNDECODABLE_RESPONSE, ResponseResults::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::portal::{PortalResponse, ResponseCode, Stage};
    use tokio::sync::oneshot;

    const PATH: &str = "/org/freedesktop/portal/desktop/request/1_42/u5";

    fn pending() -> (CorrelationRegistry, oneshot::Receiver<PortalResponse>) {
        let registry = CorrelationRegistry::new();
        let (tx, rx) = oneshot::channel();
        registry.register("u5", Stage::Start, tx).unwrap();
        (registry, rx)
    }

    #[test]
    fn response_without_path_is_skipped() {
        let (registry, mut rx) = pending();

        assert!(!dispatch_response(&registry, None, || Ok((0, ResponseResults::default()))));
        assert_eq!(registry.len(), 1);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn response_reaches_the_request_named_by_its_path() {
        let (registry, mut rx) = pending();

        assert!(dispatch_response(&registry, Some(PATH), || Ok((1, ResponseResults::default()))));
        assert!(registry.is_empty());
        assert_eq!(rx.try_recv().unwrap().code, ResponseCode::Cancelled);
    }

    #[test]
    fn undecodable_body_still_wakes_the_request() {
        let (registry, mut rx) = pending();

        assert!(dispatch_response(&registry, Some(PATH), || Err(zbus::Error::Failure(
            "bad body".into()
        ))));
        assert_eq!(
            rx.try_recv().unwrap().code,
            ResponseCode::Other(UNDECODABLE_RESPONSE)
        );
    }
}
