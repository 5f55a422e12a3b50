pub(crate) mod change_frame;
pub(crate) mod ease;
pub(crate) mod tween;
