use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::assets::image::{ImageHandle, decode_image};

/// Identifier of one fetch issued to an [`ImageSource`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FetchId(pub u64);

/// Monotonic allocator for [`FetchId`]s.
#[derive(Debug, Default)]
pub(crate) struct FetchIds {
    next: u64,
}

impl FetchIds {
    pub(crate) fn next(&mut self) -> FetchId {
        self.next += 1;
        FetchId(self.next)
    }
}

/// A finished fetch, successful or not.
#[derive(Clone, Debug)]
pub struct Fetched {
    /// Fetch this result belongs to.
    pub id: FetchId,
    /// URL that was fetched.
    pub url: String,
    /// Decoded image or a failure reason.
    pub result: Result<ImageHandle, String>,
}

/// Asynchronous fetch-and-decode boundary.
///
/// The configurator calls [`ImageSource::begin`] to start a fetch, may call
/// [`ImageSource::abort`] while it is in flight, and collects results from
/// [`ImageSource::poll`] on every tick. Results for aborted fetches must not be
/// reported (they are ignored if they are).
pub trait ImageSource {
    /// Start fetching `url` under `id`.
    fn begin(&mut self, id: FetchId, url: &str);

    /// Abort an in-flight fetch.
    fn abort(&mut self, id: FetchId);

    /// Drain every fetch that finished since the previous poll.
    fn poll(&mut self) -> Vec<Fetched>;
}

/// One call recorded by [`MemorySource`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SourceCall {
    /// A fetch was started for the URL.
    Begin(String),
    /// A fetch for the URL was aborted.
    Abort(String),
}

/// In-memory image source.
///
/// By default fetches complete on the next poll. With [`MemorySource::holding`]
/// they stay in flight until [`MemorySource::complete`] releases them, which
/// lets callers observe cancellation and interleaving.
#[derive(Debug, Default)]
pub struct MemorySource {
    images: HashMap<String, ImageHandle>,
    failing: HashSet<String>,
    hold: bool,
    in_flight: BTreeMap<FetchId, String>,
    ready: Vec<Fetched>,
    calls: Vec<SourceCall>,
}

impl MemorySource {
    /// Source that completes every fetch on the next poll.
    pub fn new() -> Self {
        Self::default()
    }

    /// Source that keeps fetches in flight until released.
    pub fn holding() -> Self {
        Self {
            hold: true,
            ..Self::default()
        }
    }

    /// Register the image served for `url`.
    pub fn insert(&mut self, url: impl Into<String>, image: ImageHandle) {
        self.images.insert(url.into(), image);
    }

    /// Make every fetch of `url` fail.
    pub fn fail(&mut self, url: impl Into<String>) {
        self.failing.insert(url.into());
    }

    /// Stop failing `url`.
    pub fn heal(&mut self, url: &str) {
        self.failing.remove(url);
    }

    /// Switch between holding and auto-completing mode.
    pub fn set_holding(&mut self, hold: bool) {
        self.hold = hold;
    }

    /// Release in-flight fetches of `url`; returns how many were released.
    pub fn complete(&mut self, url: &str) -> usize {
        let ids = self
            .in_flight
            .iter()
            .filter(|(_, u)| u.as_str() == url)
            .map(|(id, _)| *id)
            .collect::<Vec<_>>();
        for id in &ids {
            if let Some(url) = self.in_flight.remove(id) {
                let fetched = self.resolve(*id, url);
                self.ready.push(fetched);
            }
        }
        ids.len()
    }

    /// Release every in-flight fetch.
    pub fn complete_all(&mut self) -> usize {
        let in_flight = std::mem::take(&mut self.in_flight);
        let n = in_flight.len();
        for (id, url) in in_flight {
            let fetched = self.resolve(id, url);
            self.ready.push(fetched);
        }
        n
    }

    /// Every begin/abort call, in order.
    pub fn calls(&self) -> &[SourceCall] {
        &self.calls
    }

    /// Number of fetches started for `url`.
    pub fn begun(&self, url: &str) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, SourceCall::Begin(u) if u == url))
            .count()
    }

    /// Number of fetches started in total.
    pub fn begun_total(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, SourceCall::Begin(_)))
            .count()
    }

    /// URLs whose fetches were aborted, in order.
    pub fn aborted(&self) -> Vec<&str> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                SourceCall::Abort(u) => Some(u.as_str()),
                SourceCall::Begin(_) => None,
            })
            .collect()
    }

    /// Number of fetches currently held in flight.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    fn resolve(&self, id: FetchId, url: String) -> Fetched {
        let result = if self.failing.contains(&url) {
            Err("fetch failed".to_string())
        } else {
            self.images
                .get(&url)
                .cloned()
                .ok_or_else(|| "not found".to_string())
        };
        Fetched { id, url, result }
    }
}

impl ImageSource for MemorySource {
    fn begin(&mut self, id: FetchId, url: &str) {
        self.calls.push(SourceCall::Begin(url.to_string()));
        if self.hold {
            self.in_flight.insert(id, url.to_string());
        } else {
            let fetched = self.resolve(id, url.to_string());
            self.ready.push(fetched);
        }
    }

    fn abort(&mut self, id: FetchId) {
        let url = self
            .in_flight
            .remove(&id)
            .or_else(|| {
                let i = self.ready.iter().position(|f| f.id == id)?;
                Some(self.ready.remove(i).url)
            });
        if let Some(url) = url {
            self.calls.push(SourceCall::Abort(url));
        }
    }

    fn poll(&mut self) -> Vec<Fetched> {
        std::mem::take(&mut self.ready)
    }
}

/// File-backed image source: URLs are paths relative to a root directory.
///
/// Reads and decodes synchronously inside `begin`; results are handed out on
/// the next poll like any other source.
#[derive(Debug)]
pub struct FsImageSource {
    root: PathBuf,
    ready: Vec<Fetched>,
}

impl FsImageSource {
    /// Serve files below `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ready: Vec::new(),
        }
    }

    /// Root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, url: &str) -> Result<PathBuf, String> {
        let rel = url.strip_prefix("file://").unwrap_or(url).replace('\\', "/");
        if rel.starts_with('/') || rel.split('/').any(|p| p == "..") {
            return Err(format!("refusing to read outside the root: '{url}'"));
        }
        Ok(self.root.join(rel))
    }

    fn load(&self, url: &str) -> Result<ImageHandle, String> {
        let path = self.path_for(url)?;
        let bytes =
            std::fs::read(&path).map_err(|e| format!("read '{}': {e}", path.display()))?;
        decode_image(&bytes).map_err(|e| e.to_string())
    }
}

impl ImageSource for FsImageSource {
    fn begin(&mut self, id: FetchId, url: &str) {
        let result = self.load(url);
        self.ready.push(Fetched {
            id,
            url: url.to_string(),
            result,
        });
    }

    fn abort(&mut self, id: FetchId) {
        self.ready.retain(|f| f.id != id);
    }

    fn poll(&mut self) -> Vec<Fetched> {
        std::mem::take(&mut self.ready)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/assets/source.rs"]
mod tests;
