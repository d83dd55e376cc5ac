use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::viewport::ViewportState;

/// Scroll sensitivity: one unit of scroll multiplies the scale by `exp(-0.1)`.
pub const DEFAULT_ZOOM_SENSITIVITY: f64 = 0.1;

/// Keys with a per-frame repeat action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Key {
    IterationsUp,
    IterationsDown,
}

/// Raw input, already stripped of any windowing-library types.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    /// Cursor position in window pixels.
    PointerMove { x: f64, y: f64 },
    /// Primary button pressed at the last known cursor position.
    PointerDown,
    PointerUp,
    /// Vertical scroll; positive values zoom in.
    Scroll { dy: f64 },
    /// Emitted once per frame while a key is held.
    KeyRepeat { key: Key },
}

/// Drag-tracking sub-state.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DragState {
    pub active: bool,
    pub last_pointer_pos: (f64, f64),
}

/// Turns input events into viewport deltas.
#[derive(Debug, Clone)]
pub struct InputTranslator {
    drag: DragState,
    cursor: (f64, f64),
    zoom_sensitivity: f64,
}

impl Default for InputTranslator {
    fn default() -> Self {
        Self::new(DEFAULT_ZOOM_SENSITIVITY)
    }
}

impl InputTranslator {
    pub fn new(zoom_sensitivity: f64) -> Self {
        Self {
            drag: DragState::default(),
            cursor: (0.0, 0.0),
            zoom_sensitivity,
        }
    }

    pub fn drag(&self) -> DragState {
        self.drag
    }

    pub fn zoom_sensitivity(&self) -> f64 {
        self.zoom_sensitivity
    }

    pub fn set_zoom_sensitivity(&mut self, k: f64) {
        if k.is_finite() && k > 0.0 {
            self.zoom_sensitivity = k;
        }
    }

    /// Apply one event to `viewport`.
    ///
    /// When `suppressed` is set (a capture session owns the viewport) the
    /// cursor is still tracked but nothing in the viewport changes, and any
    /// drag in progress is dropped so it cannot resume from a stale anchor.
    pub fn handle(&mut self, event: InputEvent, viewport: &mut ViewportState, suppressed: bool) {
        if let InputEvent::PointerMove { x, y } = event {
            self.cursor = (x, y);
        }

        if suppressed {
            if self.drag.active {
                debug!("Input suppressed, dropping active drag");
            }
            self.drag = DragState::default();
            return;
        }

        match event {
            InputEvent::PointerDown => {
                self.drag = DragState {
                    active: true,
                    last_pointer_pos: self.cursor,
                };
            }
            InputEvent::PointerMove { x, y } => {
                if self.drag.active {
                    let (lx, ly) = self.drag.last_pointer_pos;
                    let scale = viewport.scale();
                    viewport.pan_by((x - lx) * scale, (y - ly) * scale);
                    self.drag.last_pointer_pos = (x, y);
                }
            }
            InputEvent::PointerUp => {
                self.drag = DragState::default();
            }
            InputEvent::Scroll { dy } => {
                if dy != 0.0 {
                    viewport.zoom_by((-dy * self.zoom_sensitivity).exp());
                }
            }
            InputEvent::KeyRepeat { key } => match key {
                Key::IterationsUp => viewport.adjust_iterations(1),
                Key::IterationsDown => viewport.adjust_iterations(-1),
            },
        }
    }
}
