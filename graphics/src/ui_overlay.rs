//! UI overlay lifecycle.
//!
//! Backends may draw an immediate-mode UI on top of the presented surface.
//! [`UiOverlay`] forwards to the backend's `ui_*` hooks and enforces the
//! `Init -> (BeginDraw -> EndDraw)* -> Shutdown` order.

use std::sync::Arc;

use crate::backend::GpuBackend;
use crate::error::{GraphicsError, contract_violation};

/// Lifecycle state of a [`UiOverlay`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UiOverlayState {
    Uninitialized,
    Ready,
    Drawing,
    Shutdown,
}

/// Backend UI overlay hooks with lifecycle checking.
pub struct UiOverlay {
    backend: Arc<dyn GpuBackend>,
    state: UiOverlayState,
    frames: u64,
}

impl UiOverlay {
    pub(crate) fn new(backend: Arc<dyn GpuBackend>) -> Self {
        Self {
            backend,
            state: UiOverlayState::Uninitialized,
            frames: 0,
        }
    }

    pub fn state(&self) -> UiOverlayState {
        self.state
    }

    /// Completed begin/end pairs.
    pub fn frame_count(&self) -> u64 {
        self.frames
    }

    fn expect(&self, expected: UiOverlayState, operation: &str) -> Result<(), GraphicsError> {
        if self.state != expected {
            return Err(contract_violation!(
                "ui overlay {operation} in state {:?}",
                self.state
            ));
        }
        Ok(())
    }

    pub fn init(&mut self) -> Result<(), GraphicsError> {
        self.expect(UiOverlayState::Uninitialized, "init")?;
        self.backend.ui_init()?;
        log::info!("UI overlay initialized on {}", self.backend.name());
        self.state = UiOverlayState::Ready;
        Ok(())
    }

    pub fn begin_draw(&mut self) -> Result<(), GraphicsError> {
        self.expect(UiOverlayState::Ready, "begin_draw")?;
        self.backend.ui_begin_draw()?;
        self.state = UiOverlayState::Drawing;
        Ok(())
    }

    pub fn end_draw(&mut self) -> Result<(), GraphicsError> {
        self.expect(UiOverlayState::Drawing, "end_draw")?;
        self.backend.ui_end_draw()?;
        self.frames += 1;
        self.state = UiOverlayState::Ready;
        Ok(())
    }

    pub fn shutdown(&mut self) -> Result<(), GraphicsError> {
        self.expect(UiOverlayState::Ready, "shutdown")?;
        self.backend.ui_shutdown()?;
        log::info!("UI overlay shut down after {} frames", self.frames);
        self.state = UiOverlayState::Shutdown;
        Ok(())
    }
}

impl std::fmt::Debug for UiOverlay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UiOverlay")
            .field("backend", &self.backend.name())
            .field("state", &self.state)
            .field("frames", &self.frames)
            .finish()
    }
}
