//! Engine session lifetime.
//!
//! A session is opened when a frame context becomes available and closed
//! when it is lost. While not ready, frames are skipped and drop whatever
//! was queued, so tickets resolve to `None` instead of piling up.

use gnomon_core::EngineConfig;

use crate::engine::{Engine, EngineBackend, ProcLoader};
use crate::error::{EngineError, EngineResult};
use crate::ui_post::{UiMessage, UiPoster};

/// Owns the backend and, while ready, the live engine.
pub struct EngineSession {
    backend: Box<dyn EngineBackend>,
    engine: Option<Box<dyn Engine>>,
    config: EngineConfig,
    poster: UiPoster,
}

impl EngineSession {
    /// Creates a session that is not ready yet.
    #[must_use]
    pub fn new(backend: Box<dyn EngineBackend>, config: EngineConfig, poster: UiPoster) -> Self {
        Self {
            backend,
            engine: None,
            config,
            poster,
        }
    }

    /// Creates the engine for a fresh frame context. A no-op if already
    /// ready. Posts [`UiMessage::EngineReady`] with the outcome.
    ///
    /// # Errors
    ///
    /// The backend's creation error; the session stays not ready.
    pub fn open(&mut self, loader: &ProcLoader<'_>) -> EngineResult<()> {
        if self.engine.is_some() {
            return Ok(());
        }
        match self.backend.create(&self.config, loader) {
            Ok(engine) => {
                tracing::info!(
                    backend = self.backend.name(),
                    width = self.config.width,
                    height = self.config.height,
                    "engine session ready"
                );
                self.engine = Some(engine);
                self.poster.post(UiMessage::EngineReady(true));
                Ok(())
            }
            Err(err) => {
                tracing::warn!(backend = self.backend.name(), error = %err, "engine init failed");
                self.poster.post(UiMessage::EngineReady(false));
                Err(err)
            }
        }
    }

    /// Destroys the engine. Returns false if it was not ready.
    pub fn close(&mut self) -> bool {
        let Some(engine) = self.engine.take() else {
            return false;
        };
        drop(engine);
        tracing::info!(backend = self.backend.name(), "engine session closed");
        self.poster.post(UiMessage::EngineReady(false));
        true
    }

    /// True while an engine is live.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.engine.is_some()
    }

    /// The live engine.
    ///
    /// # Errors
    ///
    /// [`EngineError::NotReady`] if the session is not open.
    pub fn engine_mut(&mut self) -> EngineResult<&mut (dyn Engine + 'static)> {
        self.engine.as_deref_mut().ok_or(EngineError::NotReady)
    }

    /// Creation settings.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Poster shared with the frame loop.
    #[must_use]
    pub fn poster(&self) -> &UiPoster {
        &self.poster
    }
}

impl Drop for EngineSession {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for EngineSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineSession")
            .field("backend", &self.backend.name())
            .field("ready", &self.is_ready())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessBackend;
    use crate::ui_post::ui_channel;

    fn no_loader(_: &str) -> Option<usize> {
        None
    }

    #[test]
    fn test_open_close_posts_ready() {
        let (poster, inbox) = ui_channel();
        let (backend, _probe) = HeadlessBackend::new();
        let mut session = EngineSession::new(Box::new(backend), EngineConfig::default(), poster);

        assert!(matches!(session.engine_mut(), Err(EngineError::NotReady)));
        session.open(&no_loader).unwrap();
        session.open(&no_loader).unwrap();
        assert!(session.is_ready());
        assert!(session.close());
        assert!(!session.close());

        let ready: Vec<_> = inbox
            .drain()
            .filter_map(|m| match m {
                UiMessage::EngineReady(r) => Some(r),
                _ => None,
            })
            .collect();
        assert_eq!(ready, vec![true, false]);
    }

    #[test]
    fn test_failed_init_stays_not_ready() {
        let (poster, inbox) = ui_channel();
        let (mut backend, _probe) = HeadlessBackend::new();
        backend.fail_init("no context");
        let mut session = EngineSession::new(Box::new(backend), EngineConfig::default(), poster);

        assert!(matches!(session.open(&no_loader), Err(EngineError::Init(_))));
        assert!(!session.is_ready());
        assert!(matches!(inbox.try_recv(), Some(UiMessage::EngineReady(false))));
    }
}
