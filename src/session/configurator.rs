use std::collections::BTreeMap;
use std::sync::mpsc::Receiver;

use image::RgbaImage;

use crate::animation::change_frame::{AnimationPhase, FrameAnimation, RotationPlan, StepTiming};
use crate::assets::cache::{SlotCache, SlotCompletion, SlotRequest, SlotStatus};
use crate::assets::image::ImageHandle;
use crate::assets::source::{FetchId, FetchIds, ImageSource};
use crate::assets::url::{ImageQuery, MaskQuery, UrlResolver};
use crate::config::{ChangeFrameOpts, ConfiguratorOpts, Transition, UpdateOpts};
use crate::events::{Event, EventBus, EventKind, SubscriptionId, UpdateId, UpdateOutcome};
use crate::foundation::core::{Clock, Point, Size, SystemClock};
use crate::foundation::error::ConfiguratorResult;
use crate::frame::key::{FrameKey, ViewMap};
use crate::interact::drag::{DragController, DragTuning};
use crate::interact::hit_test::MaskHitTester;
use crate::interact::pointer::{PointerEvent, PointerKind};
use crate::preload::{PreloadAsset, PreloadLoad, PreloadResult, Preloader, UpdateToken};
use crate::product::ProductSpec;
use crate::render::backend::{FrameRenderer, RendererKind, create_renderer};
use crate::session::timers::{Timer, TimerQueue};
use crate::signature::{Signature, SignatureTracker, VisualConfig, compute_signature};

// upper bound on state-machine transitions per tick
const MAX_PROGRESS_STEPS: usize = 64;

/// Immediate answer of [`Configurator::update`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpdateStatus {
    /// Nothing to do (not ready, or signature and frame already drawn).
    NotLoaded,
    /// The update is running; its outcome arrives as [`Event::UpdateFinished`].
    Started(UpdateId),
    /// Another update is running; this one starts when it finishes.
    Queued(UpdateId),
}

impl UpdateStatus {
    pub fn id(&self) -> Option<UpdateId> {
        match self {
            Self::NotLoaded => None,
            Self::Started(id) | Self::Queued(id) => Some(*id),
        }
    }
}

/// Immediate answer of [`Configurator::change_frame`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeFrameStatus {
    Started,
    /// Preloading is running; the request replays when it settles.
    Deferred,
    /// Another frame change is running.
    Ignored,
    /// The frame is already displayed.
    AlreadyThere,
}

/// Observable configurator state.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConfiguratorState {
    /// A product is loaded and updates are accepted.
    pub ready: bool,
    pub view: String,
    pub position: u32,
    pub frames: ViewMap,
    /// A frame change is running.
    pub animating: bool,
    /// Dragging is blocked.
    pub no_drag: bool,
    /// A preload batch is running.
    pub preloading: bool,
    /// At least one preload ran for the current product.
    pub preloaded: bool,
    pub highlighted: Option<String>,
    pub fullscreen: bool,
    /// Last visited position per view.
    pub last_frame: BTreeMap<String, u32>,
}

impl ConfiguratorState {
    pub fn current_frame(&self) -> FrameKey {
        FrameKey::new(self.view.clone(), self.position)
    }
}

/// One frame draw performed by the update path.
#[derive(Clone, Debug, PartialEq)]
pub struct DrawRecord {
    /// Canonical key of the drawn frame.
    pub frame: String,
    pub transition: Transition,
    pub at_ms: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum UpdateStage {
    Loading,
    Fading,
    Preloading,
}

#[derive(Clone, Debug)]
struct ActiveUpdate {
    id: UpdateId,
    signature: Signature,
    unique: String,
    frame: FrameKey,
    url: String,
    transition: Transition,
    duration: f64,
    preload: Option<UpdateToken>,
    preload_result: Option<PreloadResult>,
    failure: Option<String>,
    stage: UpdateStage,
}

#[derive(Clone, Debug)]
struct QueuedUpdate {
    id: UpdateId,
    opts: UpdateOpts,
}

#[derive(Clone, Debug)]
struct OverlayFetch {
    id: FetchId,
    part: String,
    url: String,
}

/// Interactive frame-cache and animation engine for one product view.
///
/// Host-pumped: operations return immediately and the host calls
/// [`Configurator::tick`] from its render loop (or a timer) to deliver
/// fetch completions, fire timeouts and advance fades. At most one update is
/// active at a time; newer updates queue behind it, keeping only the latest.
pub struct Configurator<S: ImageSource> {
    opts: ConfiguratorOpts,
    state: ConfiguratorState,
    visual: VisualConfig,
    hit: MaskHitTester,
    tracker: SignatureTracker,
    source: S,
    resolver: Box<dyn UrlResolver>,
    clock: Box<dyn Clock>,
    renderer: Box<dyn FrameRenderer>,
    frames: SlotCache,
    masks: SlotCache,
    fetch_ids: FetchIds,
    overlay_fetch: Option<OverlayFetch>,
    overlay_url: Option<String>,
    timers: TimerQueue,
    preloader: Preloader,
    events: EventBus,
    drag: DragController,
    display: Size,
    restore_size: Option<(Option<u32>, u32, u32)>,
    next_update: u64,
    active: Option<ActiveUpdate>,
    queued: Option<QueuedUpdate>,
    animation: Option<FrameAnimation>,
    step_seq: u64,
    pending_change: Option<(FrameKey, ChangeFrameOpts)>,
    mask_wanted: Option<(FrameKey, String)>,
    // frame currently on the surface
    shown: Option<FrameKey>,
    draw_log: Vec<DrawRecord>,
}

impl<S: ImageSource> std::fmt::Debug for Configurator<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Configurator")
            .field("state", &self.state)
            .field("active", &self.active.as_ref().map(|a| a.id))
            .field("queued", &self.queued.as_ref().map(|q| q.id))
            .finish_non_exhaustive()
    }
}

impl<S: ImageSource> Configurator<S> {
    /// Create a configurator with a system clock and a raster renderer.
    ///
    /// No product is loaded yet; call [`Configurator::load_product`].
    pub fn new(
        opts: ConfiguratorOpts,
        source: S,
        resolver: Box<dyn UrlResolver>,
    ) -> ConfiguratorResult<Self> {
        opts.validate()?;
        let (w, h) = opts.dimensions();
        let renderer = create_renderer(RendererKind::Raster, opts.surface_dimensions(), (w, h));
        Ok(Self {
            state: ConfiguratorState {
                view: opts.view.clone(),
                position: opts.position,
                ..ConfiguratorState::default()
            },
            opts,
            visual: VisualConfig::default(),
            hit: MaskHitTester::default(),
            tracker: SignatureTracker::new(),
            source,
            resolver,
            clock: Box::new(SystemClock::new()),
            renderer,
            frames: SlotCache::new("frames"),
            masks: SlotCache::new("masks"),
            fetch_ids: FetchIds::default(),
            overlay_fetch: None,
            overlay_url: None,
            timers: TimerQueue::default(),
            preloader: Preloader::new(),
            events: EventBus::new(),
            drag: DragController::new(),
            display: Size::new(f64::from(w), f64::from(h)),
            restore_size: None,
            next_update: 0,
            active: None,
            queued: None,
            animation: None,
            step_seq: 0,
            pending_change: None,
            mask_wanted: None,
            shown: None,
            draw_log: Vec::new(),
        })
    }

    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_renderer(mut self, kind: RendererKind) -> Self {
        let (w, h) = self.opts.dimensions();
        self.renderer = create_renderer(kind, self.opts.surface_dimensions(), (w, h));
        self
    }

    /// Use a host-provided renderer.
    pub fn with_custom_renderer(mut self, renderer: Box<dyn FrameRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    // ---- accessors -------------------------------------------------------

    pub fn state(&self) -> &ConfiguratorState {
        &self.state
    }

    pub fn options(&self) -> &ConfiguratorOpts {
        &self.opts
    }

    pub fn visual_config(&self) -> &VisualConfig {
        &self.visual
    }

    pub fn renderer(&self) -> &dyn FrameRenderer {
        self.renderer.as_ref()
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn frame_status(&self, key: &FrameKey) -> SlotStatus {
        self.frames.status(key)
    }

    pub fn mask_status(&self, key: &FrameKey) -> SlotStatus {
        self.masks.status(key)
    }

    /// Canonical key of the current frame.
    pub fn current_frame(&self) -> String {
        self.state.frames.canonical(&self.state.current_frame())
    }

    /// Every frame draw so far, oldest first.
    pub fn draw_log(&self) -> &[DrawRecord] {
        &self.draw_log
    }

    /// What the user currently sees.
    pub fn composite(&self) -> RgbaImage {
        self.renderer.composite()
    }

    /// Due time of the next internal timeout, for hosts that sleep between ticks.
    pub fn next_timer_due(&self) -> Option<f64> {
        self.timers.next_due()
    }

    /// `true` when nothing is left for [`Configurator::tick`] to drive.
    pub fn is_idle(&self) -> bool {
        self.active.is_none()
            && self.queued.is_none()
            && self.animation.is_none()
            && self.pending_change.is_none()
            && self.overlay_fetch.is_none()
            && !self.preloader.is_active()
            && self.timers.is_empty()
            && !self.renderer.is_animating()
    }

    pub fn subscribe(&mut self, kinds: Option<&[EventKind]>) -> (SubscriptionId, Receiver<Event>) {
        self.events.subscribe(kinds)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    /// Size the element is displayed at, used to scale pointer coordinates.
    pub fn set_display_size(&mut self, size: Size) {
        self.display = size;
    }

    /// Store the owner's visual configuration. Call [`Configurator::update`] to apply it.
    pub fn set_visual_config(&mut self, config: VisualConfig) {
        self.visual = config;
    }

    // ---- product lifecycle ----------------------------------------------

    /// Install a new product (frame and part inventory).
    ///
    /// Tears down every in-flight operation, clears both caches, keeps the
    /// current frame when the new inventory supports it and redraws with the
    /// configured product transition and a full preload.
    #[tracing::instrument(skip_all, fields(brand = %product.brand, model = %product.model))]
    pub fn load_product(
        &mut self,
        product: ProductSpec,
        config: Option<VisualConfig>,
    ) -> ConfiguratorResult<UpdateStatus> {
        product.validate()?;
        self.state.ready = false;
        self.lowlight();
        self.teardown();

        self.hit = MaskHitTester::new(product.parts_list(), product.hidden_set());
        self.visual = config.unwrap_or_else(|| product.default_config());
        self.state.frames = product.frames;
        self.state.preloaded = false;

        let frames = &self.state.frames;
        let keep = frames
            .positions(&self.state.view)
            .is_some_and(|n| self.state.position < n);
        if !keep {
            let view = if frames.contains(&self.opts.view) {
                self.opts.view.clone()
            } else {
                frames.views().next().unwrap_or_default().to_string()
            };
            self.state.view = view;
            self.state.position = 0;
        }
        let frames = &self.state.frames;
        self.state
            .last_frame
            .retain(|view, pos| frames.positions(view).is_some_and(|n| *pos < n));

        self.state.ready = true;
        tracing::debug!(frame = %self.current_frame(), "product ready");
        self.events.emit(Event::Ready);
        self.events.emit(Event::ChangedFrame(self.current_frame()));

        let status = self.request_update(UpdateOpts {
            force: true,
            preload: Some(true),
            transition: Some(self.opts.config_animate),
            ..UpdateOpts::default()
        });
        self.progress();
        Ok(status)
    }

    /// Cancel everything, drop subscriptions and caches. The configurator
    /// needs a new product before it draws again.
    pub fn deinit(&mut self) {
        self.lowlight();
        self.teardown();
        self.state.ready = false;
        self.renderer.clear();
        self.events.clear();
        self.draw_log.clear();
    }

    fn teardown(&mut self) {
        if let Some(active) = self.active.take() {
            self.settle_update(active.id, UpdateOutcome::Canceled);
        }
        if let Some(queued) = self.queued.take() {
            self.settle_update(queued.id, UpdateOutcome::Superseded);
        }
        self.animation = None;
        self.pending_change = None;
        self.state.animating = false;
        self.finalize_preload(PreloadResult::Canceled);
        self.timers.clear();
        self.frames.clear(&mut self.source);
        self.masks.clear(&mut self.source);
        self.mask_wanted = None;
        self.shown = None;
        if let Some(fetch) = self.overlay_fetch.take() {
            self.source.abort(fetch.id);
        }
        self.overlay_url = None;
        self.renderer.set_overlay(None);
        self.state.no_drag = false;
    }

    /// Replace the options; optionally run an update with them.
    pub fn update_options(
        &mut self,
        opts: ConfiguratorOpts,
        update: bool,
    ) -> ConfiguratorResult<Option<UpdateStatus>> {
        opts.validate()?;
        let geometry_changed = opts.dimensions() != self.opts.dimensions()
            || opts.surface_dimensions() != self.opts.surface_dimensions();
        if !opts.use_masks {
            self.lowlight();
        }
        self.opts = opts;
        if geometry_changed {
            self.apply_geometry();
        }
        Ok(update.then(|| self.update(UpdateOpts::default())))
    }

    // ---- geometry --------------------------------------------------------

    /// Resize the surfaces. A no-op when the geometry does not change;
    /// otherwise the frame is redrawn regardless of its signature.
    pub fn resize(
        &mut self,
        size: Option<u32>,
        width: Option<u32>,
        height: Option<u32>,
    ) -> Option<UpdateStatus> {
        let next = (
            size,
            width.unwrap_or(self.opts.width),
            height.unwrap_or(self.opts.height),
        );
        let unchanged = next == (self.opts.size, self.opts.width, self.opts.height);
        if unchanged || size == Some(0) || next.1 == 0 || next.2 == 0 {
            return None;
        }
        (self.opts.size, self.opts.width, self.opts.height) = next;
        tracing::debug!(?size, width = next.1, height = next.2, "resize");
        self.apply_geometry();
        Some(self.update(UpdateOpts {
            force: true,
            ..UpdateOpts::default()
        }))
    }

    fn apply_geometry(&mut self) {
        let (w, h) = self.opts.dimensions();
        self.renderer.resize(self.opts.surface_dimensions(), (w, h));
        self.display = Size::new(f64::from(w), f64::from(h));
        self.overlay_url = None;
    }

    /// Resize to the configured maximum size.
    pub fn enter_fullscreen(&mut self) -> Option<UpdateStatus> {
        if self.state.fullscreen {
            return None;
        }
        self.state.fullscreen = true;
        self.restore_size = Some((self.opts.size, self.opts.width, self.opts.height));
        self.resize(Some(self.opts.max_size), None, None)
    }

    /// Restore the size used before [`Configurator::enter_fullscreen`].
    pub fn leave_fullscreen(&mut self) -> Option<UpdateStatus> {
        if !self.state.fullscreen {
            return None;
        }
        self.state.fullscreen = false;
        let (size, width, height) = self.restore_size.take()?;
        self.resize(size, Some(width), Some(height))
    }

    // ---- update ----------------------------------------------------------

    /// Sync the visuals with the current configuration and frame.
    ///
    /// Serialized: while another update is running the new one cancels it
    /// (when the configuration changed) and waits; only the latest waiting
    /// update survives.
    pub fn update(&mut self, opts: UpdateOpts) -> UpdateStatus {
        let status = self.request_update(opts);
        self.progress();
        status
    }

    fn request_update(&mut self, opts: UpdateOpts) -> UpdateStatus {
        if !self.state.ready {
            self.events.emit(Event::NotLoaded);
            return UpdateStatus::NotLoaded;
        }
        if self.active.is_none() {
            let id = self.next_update_id();
            return self.start_update(id, opts);
        }

        self.cancel();
        let id = self.next_update_id();
        if let Some(old) = self.queued.replace(QueuedUpdate { id, opts }) {
            self.settle_update(old.id, UpdateOutcome::Superseded);
        }
        tracing::trace!(id = id.0, "update queued");
        UpdateStatus::Queued(id)
    }

    fn next_update_id(&mut self) -> UpdateId {
        self.next_update += 1;
        UpdateId(self.next_update)
    }

    #[tracing::instrument(level = "debug", skip_all, fields(id = id.0))]
    fn start_update(&mut self, id: UpdateId, opts: UpdateOpts) -> UpdateStatus {
        let params = self.opts.render_params();
        let signature = compute_signature(&self.visual, &params);
        let frame = self.state.current_frame();
        let changed = self.tracker.is_dirty(&signature);
        let unique = signature.unique_for(&frame);
        if !opts.force && self.tracker.is_redundant(&unique) {
            tracing::trace!("update is redundant");
            self.events.emit(Event::NotLoaded);
            return UpdateStatus::NotLoaded;
        }

        self.lowlight();

        let transition = opts.transition.unwrap_or(if changed {
            Transition::Simple
        } else {
            Transition::Instant
        });
        let duration = opts
            .duration
            .filter(|d| *d > 0.0)
            .unwrap_or(self.opts.duration);
        let must_preload = opts.preload.unwrap_or(changed || !self.state.preloaded);
        let use_chain = opts.use_chain.unwrap_or(self.opts.use_chain);

        self.request_mask(&frame, true);
        let url = self.frame_url(&frame);
        let preload = must_preload.then(|| self.begin_preload(&frame, use_chain));

        self.frames
            .request(&frame, &url, &mut self.fetch_ids, &mut self.source);
        tracing::debug!(
            frame = %frame,
            signature = signature.fingerprint(),
            changed,
            must_preload,
            ?transition,
            "update started"
        );
        self.active = Some(ActiveUpdate {
            id,
            signature,
            unique,
            frame,
            url,
            transition,
            duration,
            preload,
            preload_result: None,
            failure: None,
            stage: UpdateStage::Loading,
        });
        UpdateStatus::Started(id)
    }

    /// Abort the running preload when the desired configuration differs
    /// from the one being loaded. Returns `true` when something was canceled.
    pub fn cancel(&mut self) -> bool {
        let desired = compute_signature(&self.visual, &self.opts.render_params());
        let Some(active) = &self.active else {
            return false;
        };
        if active.signature == desired {
            return false;
        }
        tracing::debug!(id = active.id.0, "canceling stale preload");
        self.finalize_preload(PreloadResult::Canceled)
    }

    fn progress_update(&mut self) -> bool {
        let Some(active) = &mut self.active else {
            return false;
        };
        match active.stage {
            UpdateStage::Loading => {
                if let Some(reason) = active.failure.take() {
                    let url = active.url.clone();
                    tracing::warn!(url = %url, reason = %reason, "frame load failed");
                    self.finish_update(UpdateOutcome::Failed(format!("{url}: {reason}")));
                    return true;
                }
                let slot = self.frames.get(&active.frame);
                let targets_url = slot.and_then(|s| s.url()) == Some(active.url.as_str());
                match slot.map(|s| s.status()) {
                    Some(SlotStatus::Loaded) if targets_url => {
                        let Some(image) = slot.and_then(|s| s.image()).cloned() else {
                            return false;
                        };
                        self.draw_active(&image);
                        true
                    }
                    Some(SlotStatus::Loading) if targets_url => false,
                    _ => {
                        // slot was canceled or reassigned underneath us
                        let (frame, url) = (active.frame.clone(), active.url.clone());
                        self.frames
                            .request(&frame, &url, &mut self.fetch_ids, &mut self.source);
                        false
                    }
                }
            }
            UpdateStage::Fading => {
                if self.renderer.is_animating() {
                    return false;
                }
                if active.preload.is_some() {
                    active.stage = UpdateStage::Preloading;
                } else {
                    self.finish_update(UpdateOutcome::Drawn);
                }
                true
            }
            UpdateStage::Preloading => match active.preload_result {
                Some(result) => {
                    self.finish_update(UpdateOutcome::Loaded(result));
                    true
                }
                None if !self.preloader.is_active() => {
                    self.finish_update(UpdateOutcome::Loaded(PreloadResult::Canceled));
                    true
                }
                None => false,
            },
        }
    }

    fn draw_active(&mut self, image: &ImageHandle) {
        let Some(active) = &mut self.active else {
            return;
        };
        let now = self.clock.now_ms();
        self.renderer
            .draw(image, active.transition, active.duration, now, self.opts.ease);
        self.tracker
            .commit(active.signature.clone(), active.unique.clone());
        self.draw_log.push(DrawRecord {
            frame: self.state.frames.canonical(&active.frame),
            transition: active.transition,
            at_ms: now,
        });
        self.shown = Some(active.frame.clone());
        active.stage = UpdateStage::Fading;
    }

    fn finish_update(&mut self, outcome: UpdateOutcome) {
        let Some(active) = self.active.take() else {
            return;
        };
        if let UpdateOutcome::Failed(_) = outcome {
            self.tracker.rollback();
            self.restore_shown(&active.frame);
        }
        self.settle_update(active.id, outcome);
    }

    /// Point the state back at the frame on the surface after `failed`
    /// could not be drawn. A state that already moved past `failed` is kept.
    fn restore_shown(&mut self, failed: &FrameKey) {
        let Some(shown) = self.shown.clone() else {
            return;
        };
        if self.state.current_frame() != *failed || shown == *failed {
            return;
        }
        tracing::debug!(frame = %shown, "restoring shown frame");
        self.state.view = shown.view;
        self.state.position = shown.position;
        self.events.emit(Event::ChangedFrame(self.current_frame()));
    }

    fn settle_update(&mut self, id: UpdateId, outcome: UpdateOutcome) {
        tracing::debug!(id = id.0, ?outcome, "update finished");
        if let Some(anim) = &mut self.animation
            && anim.phase == AnimationPhase::Updating(id)
        {
            anim.outcome = Some(outcome.clone());
            anim.phase = AnimationPhase::Stepped;
        }
        self.events.emit(Event::UpdateFinished { id, outcome });
    }

    // ---- loading ---------------------------------------------------------

    fn frame_url(&self, key: &FrameKey) -> String {
        let params = self.opts.render_params();
        let frame = self.state.frames.canonical(key);
        self.resolver.image_url(&ImageQuery {
            frame: &frame,
            config: &self.visual,
            params: &params,
        })
    }

    fn mask_url(&self, key: &FrameKey, part: Option<&str>) -> String {
        let params = self.opts.render_params();
        let frame = self.state.frames.canonical(key);
        self.resolver.mask_url(&MaskQuery {
            frame: &frame,
            config: &self.visual,
            params: &params,
            part,
        })
    }

    fn request_mask(&mut self, key: &FrameKey, draw: bool) -> SlotRequest {
        let url = self.mask_url(key, None);
        let request = self
            .masks
            .request(key, &url, &mut self.fetch_ids, &mut self.source);
        if draw {
            if request == SlotRequest::Hit {
                self.schedule_mask_settle(key.clone(), url.clone());
            }
            self.mask_wanted = Some((key.clone(), url));
        }
        request
    }

    fn schedule_mask_settle(&mut self, frame: FrameKey, url: String) {
        let due = self.clock.now_ms() + self.opts.mask_settle;
        self.timers.schedule(due, Timer::MaskSettle { frame, url });
    }

    fn preload_one(&mut self, key: &FrameKey) -> PreloadLoad {
        let mask = self.request_mask(key, false);
        let url = self.frame_url(key);
        let frame = self
            .frames
            .request(key, &url, &mut self.fetch_ids, &mut self.source);
        PreloadLoad {
            frame: frame == SlotRequest::Started,
            mask: mask == SlotRequest::Started,
        }
    }

    /// Abort one fetch of a preload batch. Fetches for `spare` are kept.
    fn cancel_preload_fetch(
        &mut self,
        key: &FrameKey,
        asset: PreloadAsset,
        spare: Option<&FrameKey>,
    ) {
        if spare == Some(key) {
            return;
        }
        let cache = match asset {
            PreloadAsset::Frame => &mut self.frames,
            PreloadAsset::Mask => &mut self.masks,
        };
        cache.cancel(key, &mut self.source);
    }

    fn begin_preload(&mut self, current: &FrameKey, use_chain: bool) -> UpdateToken {
        let spare = current.clone();
        let frames = self.state.frames.clone();
        let mut preloader = std::mem::take(&mut self.preloader);
        let token = preloader.begin(&frames, current, use_chain, |key, asset| {
            self.cancel_preload_fetch(key, asset, Some(&spare));
        });
        self.preloader = preloader;
        self.collect_preload();

        self.state.preloading = true;
        self.state.preloaded = true;
        self.state.no_drag = true;
        self.timers
            .cancel_where(|t| matches!(t, Timer::PreloadStart(_)));
        let due = self.clock.now_ms() + self.opts.preload_delay;
        self.timers.schedule(due, Timer::PreloadStart(token));
        token
    }

    /// End the running preload batch, canceling its pending fetches except
    /// the one the foreground update waits on.
    fn finalize_preload(&mut self, result: PreloadResult) -> bool {
        let spare = self.active.as_ref().map(|a| a.frame.clone());
        let mut preloader = std::mem::take(&mut self.preloader);
        let finalized = preloader.finalize(result, |key, asset| {
            self.cancel_preload_fetch(key, asset, spare.as_ref());
        });
        self.preloader = preloader;
        self.collect_preload();
        finalized
    }

    fn pump_preload(&mut self, start: Option<UpdateToken>) {
        let mut preloader = std::mem::take(&mut self.preloader);
        match start {
            Some(token) => {
                preloader.start(token, |key| self.preload_one(key));
            }
            None => preloader.pump(|key| self.preload_one(key)),
        }
        self.preloader = preloader;
        self.collect_preload();
    }

    fn collect_preload(&mut self) {
        let Some((token, result)) = self.preloader.take_result() else {
            return;
        };
        self.state.preloading = false;
        self.state.no_drag = self.animation.as_ref().is_some_and(|a| a.blocks_drag);
        if !result.is_canceled() {
            self.events.emit(Event::Loaded);
        }
        if let Some(active) = &mut self.active
            && active.preload == Some(token)
        {
            active.preload_result = Some(result);
        }
    }

    fn on_frame_loaded(&mut self, done: SlotCompletion) {
        let ok = done.result.is_ok();
        if let Some(active) = &mut self.active
            && active.stage == UpdateStage::Loading
            && active.frame == done.key
            && active.url == done.url
            && let Err(reason) = &done.result
        {
            active.failure = Some(reason.clone());
        }
        if self.preloader.mark(&done.key, PreloadAsset::Frame, ok) {
            self.pump_preload(None);
        }
    }

    fn on_mask_loaded(&mut self, done: SlotCompletion) {
        if self
            .preloader
            .mark(&done.key, PreloadAsset::Mask, done.result.is_ok())
        {
            self.pump_preload(None);
        }
        if done.result.is_err() {
            return;
        }
        let wanted = self
            .mask_wanted
            .as_ref()
            .is_some_and(|(key, url)| *key == done.key && *url == done.url);
        if wanted {
            self.schedule_mask_settle(done.key, done.url);
        }
    }

    fn on_mask_settled(&mut self, frame: FrameKey, url: String) {
        if frame != self.state.current_frame() {
            return;
        }
        let Some(slot) = self.masks.get(&frame) else {
            return;
        };
        if slot.url() != Some(url.as_str()) {
            return;
        }
        if let Some(image) = slot.image().cloned() {
            self.renderer.draw_mask(&image);
            if self.mask_wanted.as_ref().is_some_and(|(k, u)| *k == frame && *u == url) {
                self.mask_wanted = None;
            }
        }
    }

    fn on_overlay_loaded(&mut self, result: Result<ImageHandle, String>) {
        let Some(fetch) = self.overlay_fetch.take() else {
            return;
        };
        match result {
            Ok(image) => {
                self.renderer.set_overlay(Some(image));
                if self.state.highlighted.as_deref() == Some(fetch.part.as_str()) {
                    self.events.emit(Event::HighlightedPart(fetch.part));
                }
            }
            Err(reason) => {
                tracing::debug!(url = %fetch.url, %reason, "highlight mask failed");
                self.overlay_url = None;
            }
        }
    }

    // ---- highlight -------------------------------------------------------

    /// Show the overlay mask of `part` on the current frame.
    ///
    /// When the overlay already holds that mask it is shown again at once
    /// and [`Event::HighlightedPart`] fires without a new fetch.
    pub fn highlight(&mut self, part: &str) {
        if !self.opts.use_masks || !self.state.ready {
            return;
        }
        let frame = self.state.current_frame();
        let url = self.mask_url(&frame, Some(part));
        self.state.highlighted = Some(part.to_string());
        let now = self.clock.now_ms();

        if self.overlay_url.as_deref() == Some(url.as_str()) {
            let from = self.renderer.overlay_opacity();
            self.renderer
                .fade_overlay(from, self.opts.mask_opacity, now, 0.0, self.opts.ease);
            if self.overlay_fetch.is_none() {
                self.events.emit(Event::HighlightedPart(part.to_string()));
            }
            return;
        }

        if let Some(old) = self.overlay_fetch.take() {
            self.source.abort(old.id);
        }
        let id = self.fetch_ids.next();
        self.renderer.set_overlay(None);
        self.source.begin(id, &url);
        self.overlay_fetch = Some(OverlayFetch {
            id,
            part: part.to_string(),
            url: url.clone(),
        });
        self.overlay_url = Some(url);
        self.renderer.fade_overlay(
            0.0,
            self.opts.mask_opacity,
            now,
            self.opts.mask_duration,
            self.opts.ease,
        );
    }

    /// Hide the part highlight.
    pub fn lowlight(&mut self) {
        if !self.opts.use_masks {
            return;
        }
        if self.state.highlighted.take().is_none() {
            return;
        }
        let now = self.clock.now_ms();
        let from = self.renderer.overlay_opacity();
        self.renderer
            .fade_overlay(from, 0.0, now, self.opts.mask_duration, self.opts.ease);
        self.events.emit(Event::Lowlighted);
    }

    pub fn enable_masks(&mut self) {
        self.opts.use_masks = true;
    }

    pub fn disable_masks(&mut self) {
        self.lowlight();
        self.opts.use_masks = false;
    }

    // ---- frame changes ---------------------------------------------------

    /// Navigate to `frame` (`side-3`, `top`, ...).
    ///
    /// Validation errors are returned synchronously and leave all state
    /// untouched. With `safe` set the request is deferred while preloading
    /// (only the latest deferred request is kept) and ignored while another
    /// change runs.
    pub fn change_frame(
        &mut self,
        frame: &str,
        opts: ChangeFrameOpts,
    ) -> ConfiguratorResult<ChangeFrameStatus> {
        let key = self.state.frames.decode(frame)?;
        let status = self.begin_change_frame(key, opts);
        self.progress();
        Ok(status)
    }

    fn begin_change_frame(&mut self, key: FrameKey, opts: ChangeFrameOpts) -> ChangeFrameStatus {
        if !self.state.ready {
            return ChangeFrameStatus::Ignored;
        }
        if opts.safe && self.state.preloading {
            tracing::trace!(frame = %key, "frame change deferred");
            self.pending_change = Some((key, opts));
            return ChangeFrameStatus::Deferred;
        }
        if opts.safe && self.state.animating {
            return ChangeFrameStatus::Ignored;
        }
        if opts.safe && key == self.state.current_frame() {
            return ChangeFrameStatus::AlreadyThere;
        }
        tracing::debug!(frame = %key, "frame change started");
        self.animation = Some(FrameAnimation::new(key, opts));
        self.step_animation();
        ChangeFrameStatus::Started
    }

    pub fn previous_frame(&mut self) -> ConfiguratorResult<ChangeFrameStatus> {
        self.step_frame(-1)
    }

    pub fn next_frame(&mut self) -> ConfiguratorResult<ChangeFrameStatus> {
        self.step_frame(1)
    }

    fn step_frame(&mut self, delta: i64) -> ConfiguratorResult<ChangeFrameStatus> {
        let view = self.state.view.clone();
        let Some(n) = self.state.frames.positions(&view) else {
            return Ok(ChangeFrameStatus::Ignored);
        };
        let next = (i64::from(self.state.position) + delta).rem_euclid(i64::from(n)) as u32;
        let frame = self.state.frames.encode(&view, next)?;
        self.change_frame(&frame, ChangeFrameOpts::default())
    }

    /// One tick of the running frame change: move the state towards the
    /// target, then commit now or after the step's sleep.
    fn step_animation(&mut self) {
        let now = self.clock.now_ms();
        self.lowlight();
        let revolution = self.opts.revolution_duration;
        let default_duration = self.opts.duration;
        let view_animate = self.opts.view_animate;
        let Some(anim) = &mut self.animation else {
            return;
        };

        let view = self.state.view.clone();
        let position = self.state.position;
        self.state.last_frame.insert(view.clone(), position);

        let mut transition = Transition::Instant;
        let mut duration = anim.opts.duration.filter(|d| *d > 0.0);
        let mut sleep = 0.0;
        if view != anim.target.view {
            self.state.view = anim.target.view.clone();
            self.state.position = anim.target.position;
            transition = anim.opts.transition.unwrap_or(view_animate);
            duration = Some(duration.unwrap_or(default_duration));
        } else {
            if anim.first {
                let frames = self.state.frames.positions(&view).unwrap_or(1);
                let timing = StepTiming {
                    duration,
                    step_duration: anim.opts.step_duration,
                    revolution_duration: anim.opts.revolution_duration.or(revolution),
                };
                anim.plan = RotationPlan::new(position, anim.target.position, frames, timing, now);
            }
            match &mut anim.plan {
                Some(plan) => {
                    let tick = plan.advance(now);
                    self.state.position = tick.position;
                    sleep = tick.sleep_ms;
                    duration = Some(plan.duration());
                }
                None => self.state.position = anim.target.position,
            }
        }
        anim.first = false;

        self.state.animating = true;
        let animated = transition != Transition::Instant;
        anim.blocks_drag = anim.opts.prevent_drag && (animated || duration.is_some());
        if anim.blocks_drag {
            self.state.no_drag = true;
        }
        anim.step_transition = transition;
        anim.step_duration = if animated { duration.unwrap_or(0.0) } else { 0.0 };

        if sleep > 0.0 {
            self.step_seq += 1;
            let seq = self.step_seq;
            anim.phase = AnimationPhase::Sleeping { seq };
            self.timers.schedule(now + sleep, Timer::FrameStep { seq });
        } else {
            self.commit_step();
        }
    }

    fn commit_step(&mut self) {
        let Some(anim) = &self.animation else {
            return;
        };
        let (transition, duration) = (anim.step_transition, anim.step_duration);
        self.events.emit(Event::ChangedFrame(self.current_frame()));
        let status = self.request_update(UpdateOpts {
            transition: Some(transition),
            duration: Some(duration),
            ..UpdateOpts::default()
        });
        if let Some(anim) = &mut self.animation {
            anim.phase = match status.id() {
                Some(id) => AnimationPhase::Updating(id),
                None => AnimationPhase::Stepped,
            };
        }
    }

    fn progress_animation(&mut self) -> bool {
        let Some(anim) = &mut self.animation else {
            return false;
        };
        if anim.phase != AnimationPhase::Stepped {
            return false;
        }
        if let Some(UpdateOutcome::Failed(error)) = anim.outcome.take() {
            let frame = self.state.frames.canonical(&anim.target);
            tracing::warn!(frame = %frame, error = %error, "frame change failed");
            self.end_animation();
            self.events.emit(Event::ChangeFrameFailed { frame, error });
            return true;
        }
        if self.state.current_frame() == anim.target {
            tracing::debug!(frame = %anim.target, "frame change settled");
            self.end_animation();
        } else {
            self.step_animation();
        }
        true
    }

    fn end_animation(&mut self) {
        self.animation = None;
        self.state.animating = false;
        self.state.no_drag = self.state.preloading;
    }

    // ---- pointer input ---------------------------------------------------

    /// Feed one pointer event (touch events go through [`crate::TouchEvent::to_pointer`]).
    pub fn handle_pointer(&mut self, event: PointerEvent) {
        let at = event.position;
        match event.kind {
            PointerKind::Down => {
                let view = self.state.view.clone();
                self.drag.press(at, &view, self.state.position);
            }
            PointerKind::Move => {
                if self.drag.is_down() {
                    self.drag_to(at);
                }
                self.hover(at);
            }
            PointerKind::Up | PointerKind::Leave => self.drag.release(),
            PointerKind::Click => self.click(at),
        }
        self.progress();
    }

    fn drag_to(&mut self, at: Point) {
        if !self.state.ready || self.state.no_drag {
            self.drag.track(at);
            return;
        }
        let tuning = DragTuning {
            sensitivity: self.opts.sensitivity,
            vertical_threshold: self.opts.vertical_threshold,
        };
        let view = self.state.view.clone();
        let Some(key) = self.drag.drag_to(
            at,
            self.display,
            &view,
            &self.state.frames,
            &self.state.last_frame,
            tuning,
        ) else {
            return;
        };
        self.begin_change_frame(key, ChangeFrameOpts::default());
    }

    fn hover(&mut self, at: Point) {
        if self.state.preloading || self.state.animating {
            return;
        }
        if self.drag.is_down() {
            self.lowlight();
            return;
        }
        let part = self
            .hit
            .interactive_part(self.renderer.mask(), at, self.display.width)
            .map(str::to_string);
        match part {
            Some(part) => self.highlight(&part),
            None => self.lowlight(),
        }
    }

    fn click(&mut self, at: Point) {
        if self.drag.suppresses_click(self.opts.click_threshold) {
            return;
        }
        if self.state.preloading || self.state.animating {
            return;
        }
        let part = self
            .hit
            .interactive_part(self.renderer.mask(), at, self.display.width)
            .map(str::to_string);
        if let Some(part) = part {
            tracing::debug!(part = %part, "part selected");
            self.events.emit(Event::PartSelected(part));
        }
    }

    /// Part under `(x, y)` in display coordinates, hidden parts included.
    pub fn resolve_part(&self, x: f64, y: f64) -> Option<String> {
        self.hit
            .resolve_part(self.renderer.mask(), Point::new(x, y), self.display.width)
            .map(str::to_string)
    }

    // ---- pumping ---------------------------------------------------------

    /// Deliver fetch completions, fire due timeouts, advance fades and move
    /// every state machine forward.
    pub fn tick(&mut self) {
        let now = self.clock.now_ms();
        for fetched in self.source.poll() {
            if self.frames.owns(fetched.id) {
                if let Some(done) = self.frames.complete(fetched.id, fetched.result) {
                    self.on_frame_loaded(done);
                }
            } else if self.masks.owns(fetched.id) {
                if let Some(done) = self.masks.complete(fetched.id, fetched.result) {
                    self.on_mask_loaded(done);
                }
            } else if self.overlay_fetch.as_ref().is_some_and(|f| f.id == fetched.id) {
                self.on_overlay_loaded(fetched.result);
            } else {
                tracing::trace!(url = %fetched.url, "dropping stale fetch");
            }
        }

        while let Some(timer) = self.timers.pop_due(now) {
            match timer {
                Timer::PreloadStart(token) => self.pump_preload(Some(token)),
                Timer::FrameStep { seq } => {
                    let due = self
                        .animation
                        .as_ref()
                        .is_some_and(|a| a.phase == AnimationPhase::Sleeping { seq });
                    if due {
                        self.commit_step();
                    }
                }
                Timer::MaskSettle { frame, url } => self.on_mask_settled(frame, url),
            }
        }

        self.renderer.advance(now);
        self.progress();
    }

    fn progress(&mut self) {
        for _ in 0..MAX_PROGRESS_STEPS {
            let mut moved = self.progress_update();
            moved |= self.progress_animation();
            if self.active.is_none()
                && let Some(next) = self.queued.take()
            {
                if self.start_update(next.id, next.opts) == UpdateStatus::NotLoaded {
                    self.settle_update(next.id, UpdateOutcome::NotLoaded);
                }
                moved = true;
            }
            if !self.state.preloading
                && !self.state.animating
                && let Some((key, opts)) = self.pending_change.take()
            {
                self.begin_change_frame(key, opts);
                moved = true;
            }
            if !moved {
                return;
            }
        }
        tracing::warn!("state machine did not settle within one tick");
    }
}

#[cfg(test)]
#[path = "../../tests/unit/session/configurator.rs"]
mod tests;
