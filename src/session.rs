//! The one acquisition session of a [`Context`].
//!
//! The session lives in the context's session slot and is driven through
//! `Context::session_*`:
//!
//! ```rust
//! use sigrok_wrapper::{AcquiredData, Context, DemoBackend, Driver};
//! use std::sync::{Arc, Mutex};
//!
//! let context = Context::new(DemoBackend::default());
//! let mut driver = Driver::new(&context, "demo")?;
//! let device = driver.open()?;
//! device.set("limit_samples", 256u64, None)?;
//!
//! context.session_create()?;
//! context.session_add_device(device)?;
//!
//! let data = Arc::new(Mutex::new(AcquiredData::new()));
//! let sink = data.clone();
//! context.session_start(
//!     move |_device, packet| {
//!         sink.lock().unwrap().parse_packet(packet);
//!     },
//!     None,
//! )?;
//! context.session_run()?;
//! context.session_close();
//! driver.close()?;
//!
//! assert_eq!(data.lock().unwrap().channel("A0").unwrap().len(), 256);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! `session_run` blocks until the acquisition ends. To end an open-ended
//! acquisition, call [`SessionStopper::stop`] (or `Context::session_stop`)
//! from another thread or from the data callback.

use crate::backend::{BackendError, RawDevice, RawSession, StoppedCallback};
use crate::context::Context;
use crate::device::Device;
use crate::packet::Packet;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Session missing - call session_create() first")]
    NotCreated,

    #[error("Session was already running - not started")]
    AlreadyRunning,

    #[error("Session backend error: {0}")]
    Backend(#[from] BackendError),
}

#[derive(Clone)]
pub struct Session {
    raw: Arc<dyn RawSession>,
}

impl Session {
    pub fn is_running(&self) -> bool {
        self.raw.is_running()
    }

    /// A handle that can stop this session from another thread.
    pub fn stopper(&self) -> SessionStopper {
        SessionStopper {
            raw: self.raw.clone(),
        }
    }

    pub fn raw(&self) -> &Arc<dyn RawSession> {
        &self.raw
    }

    pub fn ptr_eq(a: &Session, b: &Session) -> bool {
        Arc::ptr_eq(&a.raw, &b.raw)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("is_running", &self.is_running())
            .finish()
    }
}

#[derive(Clone)]
pub struct SessionStopper {
    raw: Arc<dyn RawSession>,
}

impl SessionStopper {
    pub fn stop(&self) -> Result<(), SessionError> {
        Ok(self.raw.stop()?)
    }
}

impl Context {
    /// Create the session unless one exists already.
    pub fn session_create(&self) -> Result<Session, SessionError> {
        let mut slot = self.session_slot();
        if let Some(session) = slot.as_ref() {
            return Ok(session.clone());
        }

        let session = Session {
            raw: self.backend().create_session()?,
        };
        log::info!("session created");
        *slot = Some(session.clone());
        Ok(session)
    }

    pub fn session_get(&self) -> Result<Session, SessionError> {
        self.session_slot()
            .as_ref()
            .cloned()
            .ok_or(SessionError::NotCreated)
    }

    pub fn session_add_device(&self, device: &Device) -> Result<(), SessionError> {
        let session = self.session_get()?;
        session.raw.add_device(device.handle().clone())?;
        log::info!("added device {} to session", device);
        Ok(())
    }

    /// Register `on_data` for the session's packets and start acquisition.
    /// `on_data` replaces the callback of any earlier start. `on_stop` runs
    /// once the acquisition has ended; by default the stop is only logged.
    pub fn session_start<F>(&self, on_data: F, on_stop: Option<StoppedCallback>) -> Result<(), SessionError>
    where
        F: FnMut(&dyn RawDevice, &Packet) + Send + 'static,
    {
        let session = self.session_get()?;
        log::debug!("session_start: called: is_running={}", session.is_running());
        if session.is_running() {
            return Err(SessionError::AlreadyRunning);
        }

        // Packets go to `on_data` only, not to callbacks of earlier starts.
        session.raw.remove_datafeed_callbacks()?;
        session.raw.add_datafeed_callback(Box::new(on_data))?;
        let on_stop: StoppedCallback = match on_stop {
            Some(callback) => callback,
            None => Box::new(|| log::info!("Stopped")),
        };
        session.raw.set_stopped_callback(on_stop)?;

        log::debug!("session_start: before start is_running={}", session.is_running());
        if let Err(e) = session.raw.start() {
            // A failed start must not leave `on_data` behind for the next one.
            session.raw.remove_datafeed_callbacks()?;
            return Err(e.into());
        }
        log::debug!("session_start: after start is_running={}", session.is_running());
        Ok(())
    }

    /// Run the acquisition, blocking until it ends. Returns `true` once the
    /// run completed.
    pub fn session_run(&self) -> Result<bool, SessionError> {
        let session = self.session_get()?;
        let _span = tracing::info_span!("session_run").entered();

        log::info!("session_run: before run, is_running {}", session.is_running());
        session.raw.run()?;
        log::info!("session_run: after run, is_running {}", session.is_running());
        Ok(true)
    }

    /// Stop acquisition. The session stays in place.
    pub fn session_stop(&self) -> Result<(), SessionError> {
        self.session_get()?.stopper().stop()
    }

    /// Forget the session. It is not stopped first: a running session keeps
    /// running, reachable only through handles obtained earlier.
    pub fn session_close(&self) {
        if let Some(session) = self.session_slot().take() {
            if session.is_running() {
                log::warn!("session closed while still running");
            }
        }
    }
}
