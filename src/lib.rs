//! Interactive frame-cache and animation engine for remotely rendered
//! product turntables.
//!
//! A [`Configurator`] displays one pre-rendered frame of a product at a time
//! (a `(view, position)` pair such as `side-3`) and keeps it in sync with the
//! product's visual configuration:
//!
//! - Load a [`ProductSpec`] (frame inventory and parts)
//! - Call [`Configurator::update`] after configuration changes and
//!   [`Configurator::change_frame`] to navigate
//! - Pump [`Configurator::tick`] from the host loop and listen to [`Event`]s
//!
//! Images come from an [`ImageSource`] (in-memory or filesystem) addressed by
//! a [`UrlResolver`]. Time comes from a [`Clock`], so every animation can be
//! driven deterministically with a [`ManualClock`].
#![forbid(unsafe_code)]

mod foundation;

pub(crate) mod animation;
pub(crate) mod assets;
pub(crate) mod config;
pub(crate) mod events;
pub(crate) mod frame;
pub(crate) mod interact;
pub(crate) mod preload;
pub(crate) mod product;
pub(crate) mod render;
pub(crate) mod session;
pub(crate) mod signature;

pub use crate::foundation::core::{Clock, ManualClock, Point, Size, SystemClock};
pub use crate::foundation::error::{ConfiguratorError, ConfiguratorResult};

pub use crate::animation::change_frame::{RotationPlan, RotationTick, StepTiming, shortest_path};
pub use crate::animation::ease::Ease;
pub use crate::animation::tween::{Animated, Tween};
pub use crate::assets::cache::{CacheSlot, SlotStatus};
pub use crate::assets::image::{ImageHandle, decode_image, solid};
pub use crate::assets::source::{
    FetchId, Fetched, FsImageSource, ImageSource, MemorySource, SourceCall,
};
pub use crate::assets::url::{DirUrlResolver, ImageQuery, MaskQuery, QueryUrlResolver, UrlResolver};
pub use crate::config::{ChangeFrameOpts, ConfiguratorOpts, Transition, UpdateOpts};
pub use crate::events::{Event, EventBus, EventKind, SubscriptionId, UpdateId, UpdateOutcome};
pub use crate::frame::key::{FrameKey, ViewMap};
pub use crate::interact::drag::{DragController, DragSession, DragTuning};
pub use crate::interact::hit_test::{MaskHitTester, mask_index};
pub use crate::interact::pointer::{PointerEvent, PointerKind, TouchEvent, TouchPhase};
pub use crate::preload::{PreloadAsset, PreloadLoad, PreloadResult, Preloader, UpdateToken};
pub use crate::product::ProductSpec;
pub use crate::render::backend::{FrameRenderer, LayerState, RendererKind, create_renderer};
pub use crate::render::double_buffer::DoubleBufferRenderer;
pub use crate::session::configurator::{
    ChangeFrameStatus, Configurator, ConfiguratorState, DrawRecord, UpdateStatus,
};
pub use crate::signature::{
    Initials, PartChoice, RenderParams, Signature, SignatureTracker, VisualConfig,
    compute_signature,
};
