//! Drag-and-persist of the floating pill window.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::json;

use notype_core::error::{NotypeError, Result};
use notype_core::WindowPosition;

use crate::bridge::{command, Bridge};
use crate::transport::WindowHandle;

/// What the pointer went down on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerTarget {
    /// The draggable pill surface.
    Surface,
    /// A button inside the pill. Never starts a drag.
    Button,
}

/// Watches pointer gestures and writes the release position to the backend.
///
/// Every failure here is best-effort: it is logged and otherwise ignored.
pub struct PositionController {
    bridge: Bridge,
    window: Option<Arc<dyn WindowHandle>>,
    dragging: AtomicBool,
}

impl PositionController {
    pub fn new(bridge: Bridge) -> Self {
        let window = bridge.current_window();
        Self {
            bridge,
            window,
            dragging: AtomicBool::new(false),
        }
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging.load(Ordering::SeqCst)
    }

    /// Pointer pressed on `target`.
    pub async fn pointer_down(&self, target: PointerTarget) {
        if target == PointerTarget::Button {
            return;
        }
        if self.dragging.swap(true, Ordering::SeqCst) {
            return;
        }
        let Some(window) = self.window.as_ref() else {
            return;
        };
        if let Err(e) = window.start_dragging().await {
            tracing::debug!(error = %e, "Native drag unavailable");
        }
    }

    /// Pointer released anywhere. Returns the persisted position, if any.
    pub async fn pointer_up(&self) -> Option<WindowPosition> {
        if !self.dragging.swap(false, Ordering::SeqCst) {
            return None;
        }
        match self.persist().await {
            Ok(position) => {
                tracing::debug!(x = position.x, y = position.y, "Pill position saved");
                Some(position)
            }
            Err(e) => {
                tracing::debug!(error = %e, "Pill position not saved");
                None
            }
        }
    }

    async fn persist(&self) -> Result<WindowPosition> {
        let window = self
            .window
            .as_ref()
            .ok_or_else(|| NotypeError::BestEffortIo("no window handle".to_string()))?;
        let (x, y) = window.outer_position().await?;
        let position = WindowPosition::from_raw(x, y).ok_or_else(|| {
            NotypeError::BestEffortIo(format!("invalid window position ({x}, {y})"))
        })?;
        self.bridge
            .invoke(
                command::SET_PILL_POSITION,
                Some(json!({ "position": position })),
            )
            .await?;
        Ok(position)
    }
}

impl std::fmt::Debug for PositionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PositionController")
            .field("has_window", &self.window.is_some())
            .field("dragging", &self.is_dragging())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{LoopbackTransport, MemoryWindow};
    use serde_json::Value;

    fn setup() -> (Arc<LoopbackTransport>, Arc<MemoryWindow>, PositionController) {
        let transport = Arc::new(LoopbackTransport::new());
        transport.respond(command::SET_PILL_POSITION, Value::Null);
        let window = Arc::new(MemoryWindow::new(100.0, 40.0));
        transport.set_window(window.clone());
        let controller = PositionController::new(Bridge::with_transport(transport.clone()));
        (transport, window, controller)
    }

    #[tokio::test]
    async fn test_drag_persists_release_position_once() {
        let (transport, window, controller) = setup();

        controller.pointer_down(PointerTarget::Surface).await;
        assert!(controller.is_dragging());
        window.move_to(640.0, 12.0);

        let saved = controller.pointer_up().await;
        assert_eq!(saved, Some(WindowPosition { x: 640, y: 12 }));
        assert_eq!(
            transport.calls_to(command::SET_PILL_POSITION),
            vec![json!({ "position": { "x": 640, "y": 12 } })]
        );

        // A second release without a new press writes nothing.
        assert_eq!(controller.pointer_up().await, None);
        assert_eq!(transport.calls_to(command::SET_PILL_POSITION).len(), 1);
        assert_eq!(window.drag_count(), 1);
    }

    #[tokio::test]
    async fn test_button_never_drags_or_writes() {
        let (transport, window, controller) = setup();

        controller.pointer_down(PointerTarget::Button).await;
        assert!(!controller.is_dragging());
        assert_eq!(controller.pointer_up().await, None);

        assert_eq!(window.drag_count(), 0);
        assert!(transport.calls_to(command::SET_PILL_POSITION).is_empty());
    }

    #[tokio::test]
    async fn test_repeated_press_requests_one_drag() {
        let (_transport, window, controller) = setup();
        controller.pointer_down(PointerTarget::Surface).await;
        controller.pointer_down(PointerTarget::Surface).await;
        assert_eq!(window.drag_count(), 1);
    }

    #[tokio::test]
    async fn test_drag_failure_still_persists() {
        let (transport, window, controller) = setup();
        window.set_drag_supported(false);

        controller.pointer_down(PointerTarget::Surface).await;
        assert!(controller.pointer_up().await.is_some());
        assert_eq!(transport.calls_to(command::SET_PILL_POSITION).len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_position_is_not_written() {
        let (transport, window, controller) = setup();
        window.move_to(f64::NAN, 10.0);

        controller.pointer_down(PointerTarget::Surface).await;
        assert_eq!(controller.pointer_up().await, None);
        assert!(transport.calls_to(command::SET_PILL_POSITION).is_empty());
        assert!(!controller.is_dragging());
    }

    #[tokio::test]
    async fn test_position_query_failure_is_swallowed() {
        let (transport, window, controller) = setup();
        window.set_position_supported(false);

        controller.pointer_down(PointerTarget::Surface).await;
        assert_eq!(controller.pointer_up().await, None);
        assert!(transport.calls_to(command::SET_PILL_POSITION).is_empty());
    }

    #[tokio::test]
    async fn test_persist_failure_is_swallowed() {
        let (transport, _window, controller) = setup();
        transport.fail(command::SET_PILL_POSITION, "config locked");

        controller.pointer_down(PointerTarget::Surface).await;
        assert_eq!(controller.pointer_up().await, None);
        assert_eq!(transport.calls_to(command::SET_PILL_POSITION).len(), 1);
    }

    #[tokio::test]
    async fn test_without_window_nothing_happens() {
        let transport = Arc::new(LoopbackTransport::new());
        let controller = PositionController::new(Bridge::with_transport(transport.clone()));
        controller.pointer_down(PointerTarget::Surface).await;
        assert_eq!(controller.pointer_up().await, None);
        assert!(transport.calls().is_empty());
    }
}
