use crate::foundation::core::Point;

/// What the pointer did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerKind {
    Down,
    Move,
    Up,
    /// The pointer left the element; ends a drag like `Up`.
    Leave,
    /// A click on the frame surfaces, sent by the host after `Up`.
    Click,
}

/// Pointer input in element coordinates (logical pixels, origin top-left).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointerEvent {
    pub kind: PointerKind,
    pub position: Point,
}

impl PointerEvent {
    pub fn new(kind: PointerKind, x: f64, y: f64) -> Self {
        Self {
            kind,
            position: Point::new(x, y),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TouchPhase {
    Start,
    Move,
    End,
    Cancel,
}

/// Raw touch input; only the first touch point drives the configurator.
#[derive(Clone, Debug, PartialEq)]
pub struct TouchEvent {
    pub phase: TouchPhase,
    pub touches: Vec<Point>,
}

impl TouchEvent {
    /// Normalize to the pointer event a mouse would have produced.
    ///
    /// Start and Move need a touch point; End and Cancel fall back to the origin.
    pub fn to_pointer(&self) -> Option<PointerEvent> {
        let first = self.touches.first().copied();
        let (kind, position) = match self.phase {
            TouchPhase::Start => (PointerKind::Down, first?),
            TouchPhase::Move => (PointerKind::Move, first?),
            TouchPhase::End => (PointerKind::Up, first.unwrap_or(Point::ORIGIN)),
            TouchPhase::Cancel => (PointerKind::Leave, first.unwrap_or(Point::ORIGIN)),
        };
        Some(PointerEvent { kind, position })
    }
}
