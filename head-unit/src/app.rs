//! # Connection Owner
//!
//! Holds at most one live session. A new connection replaces the live one:
//! the old session is stopped before the new one starts. A session that
//! quits on its own is forgotten, unless a newer one already replaced it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use aa_shared::{Cryptor, TransportReader, TransportWriter};
use log::{info, warn};
use tokio::net::TcpListener;

use crate::config::Configuration;
use crate::error::Result;
use crate::messenger::lock;
use crate::service::ServiceRegistry;
use crate::session::{Session, SessionEventHandler, SessionHandle};
use crate::transport::StreamTransport;

/// Host hook creating the per-connection parts of a session
pub trait SessionFactory: Send + Sync {
    fn create_cryptor(&self) -> Box<dyn Cryptor>;
    fn create_services(&self, config: &Configuration) -> Result<ServiceRegistry>;
}

struct LiveSession {
    id: u64,
    handle: SessionHandle,
}

struct AppInner {
    config: Configuration,
    factory: Box<dyn SessionFactory>,
    live: Mutex<Option<LiveSession>>,
    next_id: AtomicU64,
}

/// Forwards a session's quit to the app, tagged with the session it belongs to
struct QuitRelay {
    app: Weak<AppInner>,
    session_id: u64,
}

impl SessionEventHandler for QuitRelay {
    fn on_quit(&self) {
        let Some(app) = self.app.upgrade() else {
            return;
        };
        let mut live = lock(&app.live);
        match live.as_ref() {
            Some(current) if current.id == self.session_id => {
                info!("[App] session {} ended", self.session_id);
                if let Some(ended) = live.take() {
                    let _ = ended.handle.stop();
                }
            }
            _ => info!("[App] ignoring quit of replaced session {}", self.session_id),
        }
    }
}

#[derive(Clone)]
pub struct App {
    inner: Arc<AppInner>,
}

impl App {
    pub fn new(config: Configuration, factory: impl SessionFactory + 'static) -> Self {
        Self {
            inner: Arc::new(AppInner {
                config,
                factory: Box::new(factory),
                live: Mutex::new(None),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn config(&self) -> &Configuration {
        &self.inner.config
    }

    /// Handle of the live session, if any
    pub fn current(&self) -> Option<SessionHandle> {
        lock(&self.inner.live)
            .as_ref()
            .map(|live| live.handle.clone())
    }

    /// Start a session on a new connection, replacing the live one
    pub async fn connect<R, W>(&self, reader: R, writer: W) -> Result<SessionHandle>
    where
        R: TransportReader,
        W: TransportWriter,
    {
        let registry = self.inner.factory.create_services(&self.inner.config)?;
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let relay = Arc::new(QuitRelay {
            app: Arc::downgrade(&self.inner),
            session_id: id,
        });
        let session = Session::new(
            reader,
            writer,
            self.inner.factory.create_cryptor(),
            registry,
            &self.inner.config,
            relay,
        );
        let handle = session.handle();

        let previous = lock(&self.inner.live).replace(LiveSession {
            id,
            handle: handle.clone(),
        });
        if let Some(previous) = previous {
            info!("[App] replacing session {} with {}", previous.id, id);
            let _ = previous.handle.stop().await;
        }

        info!("[App] starting session {}", id);
        session.start();
        Ok(handle)
    }

    /// Stop the live session, if any
    pub async fn stop(&self) {
        let live = lock(&self.inner.live).take();
        if let Some(live) = live {
            info!("[App] stopping session {}", live.id);
            let _ = live.handle.stop().await;
        }
    }

    /// Listen on the configured port on all interfaces
    pub async fn bind_tcp(&self) -> std::io::Result<TcpListener> {
        let listener = TcpListener::bind(("0.0.0.0", self.inner.config.tcp_port)).await?;
        info!("[App] listening on {}", listener.local_addr()?);
        Ok(listener)
    }

    /// Accept phones forever; each connection replaces the live session
    pub async fn serve_tcp(&self, listener: TcpListener) {
        loop {
            let (stream, peer) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!("[App] accept failed: {}", e);
                    continue;
                }
            };
            info!("[App] phone connected from {}", peer);
            let (reader, writer) = StreamTransport::from_tcp(stream);
            if let Err(e) = self.connect(reader, writer).await {
                warn!("[App] session for {} not started: {}", peer, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::session::SessionState;
    use crate::testing::PassthroughCryptor;

    struct EmptyFactory {
        fail: bool,
    }

    impl SessionFactory for EmptyFactory {
        fn create_cryptor(&self) -> Box<dyn Cryptor> {
            Box::new(PassthroughCryptor)
        }
        fn create_services(&self, _config: &Configuration) -> Result<ServiceRegistry> {
            if self.fail {
                return Err(Error::Config("no devices".into()));
            }
            Ok(ServiceRegistry::new())
        }
    }

    fn pipe() -> (
        impl TransportReader,
        impl TransportWriter,
        tokio::io::DuplexStream,
    ) {
        let (local, remote) = tokio::io::duplex(64 * 1024);
        let (reader, writer) = StreamTransport::split(local);
        (reader, writer, remote)
    }

    #[tokio::test]
    async fn test_new_connection_replaces_live_session() {
        let app = App::new(Configuration::default(), EmptyFactory { fail: false });

        let (reader, writer, _first_phone) = pipe();
        let first = app.connect(reader, writer).await.unwrap();
        let (reader, writer, _second_phone) = pipe();
        let second = app.connect(reader, writer).await.unwrap();

        assert_eq!(first.state(), SessionState::Terminated);
        assert_ne!(second.state(), SessionState::Terminated);
        assert_ne!(app.current().unwrap().state(), SessionState::Terminated);

        app.stop().await;
        assert!(app.current().is_none());
        second.terminated().await;
    }

    #[tokio::test]
    async fn test_quit_forgets_session_and_stale_quit_ignored() {
        let app = App::new(Configuration::default(), EmptyFactory { fail: false });
        let (reader, writer, phone) = pipe();
        let handle = app.connect(reader, writer).await.unwrap();

        let stale = QuitRelay {
            app: Arc::downgrade(&app.inner),
            session_id: 0,
        };
        stale.on_quit();
        assert!(app.current().is_some());

        // Phone hangs up: the session quits on its own
        drop(phone);
        handle.terminated().await;
        tokio::task::yield_now().await;
        assert!(app.current().is_none());
    }

    #[tokio::test]
    async fn test_factory_failure_keeps_live_session() {
        let app = App::new(Configuration::default(), EmptyFactory { fail: true });
        let (reader, writer, _phone) = pipe();
        assert!(matches!(
            app.connect(reader, writer).await,
            Err(Error::Config(_))
        ));
        assert!(app.current().is_none());
    }
}
