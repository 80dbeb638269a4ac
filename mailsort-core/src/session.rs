//! Connection lifecycle: session acquisition, release and per-thread
//! protocol context.

use std::thread;

use log::{debug, info, warn};
use serde::Serialize;

use crate::automation::{Automation, Handle, ThreadInit};
use crate::error::{Error, Result};
use crate::folders::FolderCache;
use crate::registry::{HandleKind, HandleRegistry};

/// Lifecycle of the automation session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Uninitialized,
    Initializing,
    Ready,
    Closed,
}

/// Root handles of a live session.
#[derive(Debug, Clone, Copy)]
pub struct Session {
    pub application: Handle,
    pub namespace: Handle,
}

/// Everything the adapter keeps about one connection to the mail
/// application. Only ever touched with the adapter's lock held.
#[derive(Debug)]
pub struct Connection<A> {
    pub(crate) automation: A,
    pub(crate) state: ConnectionState,
    pub(crate) session: Option<Session>,
    pub(crate) registry: HandleRegistry,
    pub(crate) folders: FolderCache,
}

impl<A: Automation> Connection<A> {
    pub fn new(automation: A) -> Self {
        Self {
            automation,
            state: ConnectionState::Uninitialized,
            session: None,
            registry: HandleRegistry::new(),
            folders: FolderCache::new(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Establish protocol context for the calling thread if it has none.
    ///
    /// Runs on every call: the binding reports context that already exists,
    /// so nothing per-thread is kept here. Context established earlier in
    /// another threading mode is usable and counts as success.
    pub fn ensure_thread_context(&mut self) -> Result<()> {
        match self.automation.initialize_thread() {
            Ok(ThreadInit::Initialized) => {
                debug!("protocol context established on {:?}", thread::current().id());
            }
            Ok(ThreadInit::AlreadyInitialized) => {}
            Ok(ThreadInit::ChangedMode) => {
                debug!(
                    "protocol context on {:?} uses another threading mode, continuing",
                    thread::current().id()
                );
            }
            Err(fault) => {
                return Err(Error::Connection(format!(
                    "establishing thread context: {fault}"
                )));
            }
        }
        Ok(())
    }

    /// Attach to the mail application. A no-op when already attached.
    pub fn initialize(&mut self) -> Result<()> {
        self.ensure_thread_context()?;
        if self.state == ConnectionState::Ready {
            debug!("mail session already initialized");
            return Ok(());
        }

        // an interrupted earlier attempt can leave handles behind
        self.folders.clear();
        self.registry.release_all(&mut self.automation);

        self.state = ConnectionState::Initializing;
        match self.open_session() {
            Ok(session) => {
                self.session = Some(session);
                self.state = ConnectionState::Ready;
                info!(
                    "mail session opened (application {}, namespace {})",
                    session.application, session.namespace
                );
                Ok(())
            }
            Err(err) => {
                self.registry.release_all(&mut self.automation);
                self.state = ConnectionState::Uninitialized;
                warn!("mail session failed to open: {err}");
                Err(err)
            }
        }
    }

    fn open_session(&mut self) -> Result<Session> {
        let application = self
            .automation
            .connect()
            .map_err(|f| Error::Connection(format!("attaching to mail application: {f}")))?;
        self.registry.track(HandleKind::Session, application);

        let namespace = self
            .automation
            .namespace(application)
            .map_err(|f| Error::Connection(format!("opening namespace: {f}")))?;
        self.registry.track(HandleKind::Namespace, namespace);

        Ok(Session {
            application,
            namespace,
        })
    }

    /// Release every cached folder, the namespace and the session. Safe to
    /// call in any state and more than once.
    pub fn close(&mut self) {
        if let Err(err) = self.ensure_thread_context() {
            warn!("closing without thread context: {err}");
        }
        self.folders.clear();
        let released = self.registry.release_all(&mut self.automation);
        if self.session.take().is_some() {
            info!("mail session closed ({released} handles released)");
        }
        self.state = ConnectionState::Closed;
    }

    /// Entry point of every handle operation: primes the thread and returns
    /// the namespace of the live session. `target` names what the operation
    /// acts on, for the error.
    pub(crate) fn enter(&mut self, op: &'static str, target: &str) -> Result<Handle> {
        self.ensure_thread_context()?;
        match (self.state, self.session) {
            (ConnectionState::Ready, Some(session)) => Ok(session.namespace),
            _ => Err(Error::NotInitialized {
                op,
                target: target.to_string(),
            }),
        }
    }
}
