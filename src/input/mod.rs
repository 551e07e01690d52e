//! Pointer actuation
//!
//! Cross-platform mouse synthesis:
//! - Windows: SetCursorPos + SendInput
//! - Linux: X11 xtest
//! - macOS: stubbed, needs accessibility permissions

pub mod mouse;

use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use crate::error::LocateError;

/// Mouse button to synthesize
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

#[async_trait]
pub trait PointerActuator: Send + Sync {
    async fn move_to(&self, x: i32, y: i32) -> Result<(), LocateError>;
    async fn primary_click(&self) -> Result<(), LocateError>;
}

/// System pointer backed by the platform mouse modules
#[derive(Clone, Copy, Debug)]
pub struct SystemPointer {
    /// Pause between the move and the click so the target window sees the
    /// pointer arrive before the button goes down
    settle: Duration,
}

impl Default for SystemPointer {
    fn default() -> Self {
        Self {
            settle: Duration::from_millis(50),
        }
    }
}

impl SystemPointer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settle(settle: Duration) -> Self {
        Self { settle }
    }
}

#[async_trait]
impl PointerActuator for SystemPointer {
    async fn move_to(&self, x: i32, y: i32) -> Result<(), LocateError> {
        info!("moving pointer to ({}, {})", x, y);

        #[cfg(target_os = "windows")]
        mouse::windows::move_mouse(x, y).map_err(|e| LocateError::Pointer(e.to_string()))?;

        #[cfg(target_os = "linux")]
        mouse::linux::move_mouse(x, y)
            .await
            .map_err(|e| LocateError::Pointer(e.to_string()))?;

        #[cfg(target_os = "macos")]
        mouse::macos::move_mouse(x, y).map_err(|e| LocateError::Pointer(e.to_string()))?;

        #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
        mouse::stub::move_mouse(x, y).map_err(|e| LocateError::Pointer(e.to_string()))?;

        tokio::time::sleep(self.settle).await;
        Ok(())
    }

    async fn primary_click(&self) -> Result<(), LocateError> {
        info!("clicking primary mouse button");

        #[cfg(target_os = "windows")]
        mouse::windows::click_mouse(MouseButton::Left)
            .map_err(|e| LocateError::Pointer(e.to_string()))?;

        #[cfg(target_os = "linux")]
        mouse::linux::click_mouse(MouseButton::Left)
            .await
            .map_err(|e| LocateError::Pointer(e.to_string()))?;

        #[cfg(target_os = "macos")]
        mouse::macos::click_mouse(MouseButton::Left)
            .map_err(|e| LocateError::Pointer(e.to_string()))?;

        #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
        mouse::stub::click_mouse(MouseButton::Left)
            .map_err(|e| LocateError::Pointer(e.to_string()))?;

        Ok(())
    }
}
