use std::sync::mpsc::{self, Receiver, Sender};

use crate::preload::PreloadResult;

/// Identifier of one [`crate::Configurator::update`] call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UpdateId(pub u64);

/// Final result of an update, delivered through [`Event::UpdateFinished`].
#[derive(Clone, Debug, PartialEq)]
pub enum UpdateOutcome {
    /// The frame was drawn and no preload was requested.
    Drawn,
    /// The frame was drawn and the preload batch settled.
    Loaded(PreloadResult),
    /// Nothing to do: signature and frame were already current.
    NotLoaded,
    /// Replaced by a newer queued update before it started.
    Superseded,
    /// Torn down before the frame was drawn.
    Canceled,
    /// The foreground frame failed to load.
    Failed(String),
}

impl UpdateOutcome {
    /// `true` for every outcome except [`UpdateOutcome::Failed`].
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed(_))
    }
}

/// Notification emitted by the configurator.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// A product is loaded and the configurator accepts navigation.
    Ready,
    /// A preload batch ran to completion.
    Loaded,
    /// The current frame changed; carries the canonical frame key.
    ChangedFrame(String),
    /// A part highlight finished loading.
    HighlightedPart(String),
    /// The highlight was removed.
    Lowlighted,
    /// An update found nothing to do.
    NotLoaded,
    /// A visible part was clicked.
    PartSelected(String),
    /// An update settled.
    UpdateFinished { id: UpdateId, outcome: UpdateOutcome },
    /// A frame change stopped because an update failed.
    ChangeFrameFailed { frame: String, error: String },
}

/// Discriminant of [`Event`], used as a subscription filter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    Ready,
    Loaded,
    ChangedFrame,
    HighlightedPart,
    Lowlighted,
    NotLoaded,
    PartSelected,
    UpdateFinished,
    ChangeFrameFailed,
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Ready => EventKind::Ready,
            Self::Loaded => EventKind::Loaded,
            Self::ChangedFrame(_) => EventKind::ChangedFrame,
            Self::HighlightedPart(_) => EventKind::HighlightedPart,
            Self::Lowlighted => EventKind::Lowlighted,
            Self::NotLoaded => EventKind::NotLoaded,
            Self::PartSelected(_) => EventKind::PartSelected,
            Self::UpdateFinished { .. } => EventKind::UpdateFinished,
            Self::ChangeFrameFailed { .. } => EventKind::ChangeFrameFailed,
        }
    }
}

/// Token returned by [`EventBus::subscribe`]; pass it back to unsubscribe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscriber {
    id: SubscriptionId,
    kinds: Option<Vec<EventKind>>,
    tx: Sender<Event>,
}

/// Typed publish/subscribe channel.
///
/// Each subscriber owns an mpsc receiver. Subscribers whose receiver was
/// dropped are pruned on the next emit.
#[derive(Default)]
pub struct EventBus {
    next: u64,
    subscribers: Vec<Subscriber>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to every event, or only to `kinds` when given.
    pub fn subscribe(&mut self, kinds: Option<&[EventKind]>) -> (SubscriptionId, Receiver<Event>) {
        self.next += 1;
        let id = SubscriptionId(self.next);
        let (tx, rx) = mpsc::channel();
        self.subscribers.push(Subscriber {
            id,
            kinds: kinds.map(<[EventKind]>::to_vec),
            tx,
        });
        (id, rx)
    }

    /// Remove a subscription. Returns `false` when the id is unknown.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|s| s.id != id);
        self.subscribers.len() != before
    }

    pub fn clear(&mut self) {
        self.subscribers.clear();
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    pub fn emit(&mut self, event: Event) {
        tracing::trace!(?event, "emit");
        let kind = event.kind();
        self.subscribers.retain(|s| {
            if s.kinds.as_ref().is_some_and(|k| !k.contains(&kind)) {
                return true;
            }
            s.tx.send(event.clone()).is_ok()
        });
    }
}
