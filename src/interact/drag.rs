use std::collections::BTreeMap;

use crate::foundation::core::{Point, Size};
use crate::frame::key::{FrameKey, ViewMap};

/// Frame count the drag sensitivity is calibrated against.
const REFERENCE_FRAMES: f64 = 24.0;

/// Drag tuning, copied from the configurator options.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DragTuning {
    pub sensitivity: f64,
    pub vertical_threshold: f64,
}

/// State of one press-drag-release gesture.
#[derive(Clone, Debug, PartialEq)]
pub struct DragSession {
    pub reference: Point,
    pub pointer: Point,
    /// Position when the gesture started.
    pub base: u32,
    /// View when the gesture started.
    pub view: String,
}

/// Turns pointer drags into frame requests.
///
/// Horizontal travel rotates within the view, wrapping around. Vertical
/// travel beyond the threshold switches between `side` and `top`/`bottom`.
#[derive(Clone, Debug, Default)]
pub struct DragController {
    session: Option<DragSession>,
    percent: f64,
    previous: f64,
}

impl DragController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session(&self) -> Option<&DragSession> {
        self.session.as_ref()
    }

    pub fn is_down(&self) -> bool {
        self.session.is_some()
    }

    pub fn press(&mut self, at: Point, view: &str, position: u32) {
        self.session = Some(DragSession {
            reference: at,
            pointer: at,
            base: position,
            view: view.to_string(),
        });
        self.percent = 0.0;
    }

    /// End the gesture, remembering how far it travelled.
    pub fn release(&mut self) {
        self.session = None;
        self.previous = self.percent;
        self.percent = 0.0;
    }

    /// `true` when the last gesture travelled too far to count as a click.
    pub fn suppresses_click(&self, click_threshold: f64) -> bool {
        self.previous.abs() > click_threshold
    }

    /// Track the pointer without computing a frame (used while dragging is blocked).
    pub fn track(&mut self, at: Point) {
        if let Some(s) = &mut self.session {
            s.pointer = at;
        }
    }

    /// Move the pointer and compute the frame the drag points at.
    ///
    /// `view` is the currently displayed view. Returns `None` when no gesture
    /// is active or the element has no area.
    pub fn drag_to(
        &mut self,
        at: Point,
        element: Size,
        view: &str,
        frames: &ViewMap,
        last_frame: &BTreeMap<String, u32>,
        tuning: DragTuning,
    ) -> Option<FrameKey> {
        let session = self.session.as_mut()?;
        session.pointer = at;
        if element.width <= 0.0 || element.height <= 0.0 {
            return None;
        }

        let percent_x = (session.reference.x - at.x) / element.width;
        let percent_y = (session.reference.y - at.y) / element.height;
        self.percent = percent_x;

        let vertical = tuning.sensitivity * percent_y;
        let wanted = if vertical > tuning.vertical_threshold {
            Some(if view == "top" { "side" } else { "bottom" })
        } else if vertical < -tuning.vertical_threshold {
            Some(if view == "bottom" { "side" } else { "top" })
        } else {
            None
        };
        let next_view = match wanted {
            Some(target) if frames.contains(target) => {
                session.reference.y = at.y;
                target
            }
            _ => view,
        };

        let positions = frames.positions(next_view)?;
        let position = if next_view == view {
            let offset =
                (tuning.sensitivity * percent_x * f64::from(positions) / REFERENCE_FRAMES).round();
            (i64::from(session.base) - offset as i64).rem_euclid(i64::from(positions)) as u32
        } else {
            last_frame
                .get(next_view)
                .copied()
                .filter(|p| *p < positions)
                .unwrap_or(0)
        };
        Some(FrameKey::new(next_view, position))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/interact/drag.rs"]
mod tests;
