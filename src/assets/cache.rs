use std::collections::HashMap;

use crate::assets::image::ImageHandle;
use crate::assets::source::{FetchId, FetchIds, ImageSource};
use crate::frame::key::FrameKey;

/// Load status of one cache slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotStatus {
    /// Nothing requested yet, or the last fetch failed.
    Unloaded,
    /// A fetch for the slot's URL is in flight.
    Loading,
    /// The slot holds the decoded image for its URL.
    Loaded,
    /// The in-flight fetch was canceled before completing.
    Canceled,
}

/// Per-frame cache entry.
#[derive(Clone, Debug)]
pub struct CacheSlot {
    url: Option<String>,
    status: SlotStatus,
    image: Option<ImageHandle>,
    fetch: Option<FetchId>,
}

impl CacheSlot {
    fn empty() -> Self {
        Self {
            url: None,
            status: SlotStatus::Unloaded,
            image: None,
            fetch: None,
        }
    }

    /// URL currently assigned to the slot.
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    /// Load status.
    pub fn status(&self) -> SlotStatus {
        self.status
    }

    /// Decoded image, only when loaded.
    pub fn image(&self) -> Option<&ImageHandle> {
        match self.status {
            SlotStatus::Loaded => self.image.as_ref(),
            _ => None,
        }
    }
}

/// Outcome of [`SlotCache::request`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotRequest {
    /// The slot already holds the image for this URL.
    Hit,
    /// The same URL is already being fetched.
    InFlight,
    /// A new fetch was started.
    Started,
}

/// A finished fetch matched back to its slot.
#[derive(Clone, Debug)]
pub struct SlotCompletion {
    /// Frame the slot belongs to.
    pub key: FrameKey,
    /// URL that was loaded.
    pub url: String,
    /// Loaded image or the failure reason.
    pub result: Result<ImageHandle, String>,
}

/// Frame-keyed image slots with URL-based hit detection.
///
/// The configurator owns two independent instances: one for frames and one
/// for index masks.
#[derive(Debug)]
pub struct SlotCache {
    label: &'static str,
    slots: HashMap<FrameKey, CacheSlot>,
    by_fetch: HashMap<FetchId, FrameKey>,
}

impl SlotCache {
    pub(crate) fn new(label: &'static str) -> Self {
        Self {
            label,
            slots: HashMap::new(),
            by_fetch: HashMap::new(),
        }
    }

    /// Slot for `key`, if it was ever requested.
    pub fn get(&self, key: &FrameKey) -> Option<&CacheSlot> {
        self.slots.get(key)
    }

    /// Status of the slot for `key`.
    pub fn status(&self, key: &FrameKey) -> SlotStatus {
        self.slots
            .get(key)
            .map(|s| s.status)
            .unwrap_or(SlotStatus::Unloaded)
    }

    /// Return `true` when `id` belongs to a live fetch of this cache.
    pub(crate) fn owns(&self, id: FetchId) -> bool {
        self.by_fetch.contains_key(&id)
    }

    /// Point the slot for `key` at `url`, fetching unless it already targets it.
    pub(crate) fn request(
        &mut self,
        key: &FrameKey,
        url: &str,
        ids: &mut FetchIds,
        source: &mut dyn ImageSource,
    ) -> SlotRequest {
        let slot = self.slots.entry(key.clone()).or_insert_with(CacheSlot::empty);
        if slot.url.as_deref() == Some(url) {
            match slot.status {
                SlotStatus::Loaded if slot.image.is_some() => return SlotRequest::Hit,
                SlotStatus::Loading if slot.fetch.is_some() => return SlotRequest::InFlight,
                _ => {}
            }
        }

        if let Some(old) = slot.fetch.take() {
            source.abort(old);
            self.by_fetch.remove(&old);
        }

        let id = ids.next();
        slot.url = Some(url.to_string());
        slot.status = SlotStatus::Loading;
        slot.image = None;
        slot.fetch = Some(id);
        self.by_fetch.insert(id, key.clone());
        tracing::trace!(cache = self.label, frame = %key, url, "fetch started");
        source.begin(id, url);
        SlotRequest::Started
    }

    /// Record a finished fetch. Returns `None` for stale or foreign fetches.
    pub(crate) fn complete(
        &mut self,
        id: FetchId,
        result: Result<ImageHandle, String>,
    ) -> Option<SlotCompletion> {
        let key = self.by_fetch.remove(&id)?;
        let slot = self.slots.get_mut(&key)?;
        if slot.fetch != Some(id) {
            return None;
        }
        slot.fetch = None;
        let url = slot.url.clone().unwrap_or_default();
        match &result {
            Ok(image) => {
                slot.status = SlotStatus::Loaded;
                slot.image = Some(image.clone());
            }
            Err(reason) => {
                tracing::debug!(cache = self.label, frame = %key, url = %url, reason = %reason, "fetch failed");
                slot.status = SlotStatus::Unloaded;
                slot.image = None;
                slot.url = None;
            }
        }
        Some(SlotCompletion { key, url, result })
    }

    /// Cancel the slot's in-flight fetch. Loaded slots are left untouched.
    ///
    /// Clears the URL so a later request for it is not mistaken for a hit.
    pub(crate) fn cancel(&mut self, key: &FrameKey, source: &mut dyn ImageSource) -> bool {
        let Some(slot) = self.slots.get_mut(key) else {
            return false;
        };
        if slot.status != SlotStatus::Loading {
            return false;
        }
        if let Some(id) = slot.fetch.take() {
            source.abort(id);
            self.by_fetch.remove(&id);
        }
        slot.status = SlotStatus::Canceled;
        slot.url = None;
        slot.image = None;
        true
    }

    /// Drop every slot, aborting in-flight fetches.
    pub(crate) fn clear(&mut self, source: &mut dyn ImageSource) {
        let mut ids = self.by_fetch.keys().copied().collect::<Vec<_>>();
        ids.sort();
        for id in ids {
            source.abort(id);
        }
        self.by_fetch.clear();
        self.slots.clear();
    }
}

#[cfg(test)]
#[path = "../../tests/unit/assets/cache.rs"]
mod tests;
