use std::collections::BTreeSet;

use crate::frame::key::{FrameKey, ViewMap};

/// How a preload batch ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PreloadResult {
    /// Every frame loaded.
    Completed,
    /// The batch ran to the end but some frames failed to load.
    Partial { failed: usize },
    /// The batch was finalized early by a newer update or a teardown.
    Canceled,
}

impl PreloadResult {
    pub fn is_canceled(&self) -> bool {
        matches!(self, Self::Canceled)
    }
}

/// Identifies one preload cycle; stale timers and completions carry an old token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UpdateToken(pub u64);

/// Which image of a frame a preload fetch is for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PreloadAsset {
    Frame,
    Mask,
}

/// Fetches the loader started for one preload request.
///
/// Every flag set here must be answered by a [`Preloader::mark`] for the
/// same frame and asset. Hits and fetches already in flight under the same
/// URL leave their flag unset.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PreloadLoad {
    pub frame: bool,
    pub mask: bool,
}

impl PreloadLoad {
    /// Nothing new to wait for.
    pub const DONE: Self = Self {
        frame: false,
        mask: false,
    };
    /// Only the frame image is loading.
    pub const FRAME: Self = Self {
        frame: true,
        mask: false,
    };
    /// Frame image and index mask are both loading.
    pub const BOTH: Self = Self {
        frame: true,
        mask: true,
    };
}

#[derive(Clone, Debug)]
struct PreloadBatch {
    token: UpdateToken,
    // consumed from the back
    work: Vec<FrameKey>,
    pending: BTreeSet<(FrameKey, PreloadAsset)>,
    use_chain: bool,
    started: bool,
    failed: usize,
}

/// Background work queue filling the frame cache for every non-current frame.
///
/// The batch does nothing until [`Preloader::start`] (after the startup
/// delay). Chain mode works through one frame at a time, waiting for both
/// its image and its mask; parallel mode issues the whole work list at once. Results are handed out once through
/// [`Preloader::take_result`].
#[derive(Clone, Debug, Default)]
pub struct Preloader {
    last_token: u64,
    batch: Option<PreloadBatch>,
    result: Option<(UpdateToken, PreloadResult)>,
}

impl Preloader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue every frame of `frames` except `current`.
    ///
    /// Any batch still running is finalized as canceled first; its pending
    /// fetches are returned through `cancel`.
    pub fn begin(
        &mut self,
        frames: &ViewMap,
        current: &FrameKey,
        use_chain: bool,
        cancel: impl FnMut(&FrameKey, PreloadAsset),
    ) -> UpdateToken {
        self.finalize(PreloadResult::Canceled, cancel);
        self.last_token += 1;
        let token = UpdateToken(self.last_token);
        let mut work = frames.keys().filter(|k| k != current).collect::<Vec<_>>();
        work.reverse();
        tracing::debug!(token = token.0, frames = work.len(), use_chain, "preload queued");
        self.batch = Some(PreloadBatch {
            token,
            work,
            pending: BTreeSet::new(),
            use_chain,
            started: false,
            failed: 0,
        });
        token
    }

    pub fn is_active(&self) -> bool {
        self.batch.is_some()
    }

    pub fn token(&self) -> Option<UpdateToken> {
        self.batch.as_ref().map(|b| b.token)
    }

    /// Frames queued but not yet requested.
    pub fn remaining(&self) -> usize {
        self.batch.as_ref().map_or(0, |b| b.work.len())
    }

    /// Fetches requested and still loading.
    pub fn pending(&self) -> impl Iterator<Item = (&FrameKey, PreloadAsset)> {
        self.batch
            .iter()
            .flat_map(|b| b.pending.iter().map(|(key, asset)| (key, *asset)))
    }

    /// Start issuing fetches for the batch identified by `token`.
    ///
    /// Returns `false` when the token is stale.
    pub fn start(&mut self, token: UpdateToken, load: impl FnMut(&FrameKey) -> PreloadLoad) -> bool {
        match &mut self.batch {
            Some(batch) if batch.token == token => batch.started = true,
            _ => return false,
        }
        self.pump(load);
        true
    }

    /// Issue as many fetches as the mode allows and settle the batch when done.
    pub fn pump(&mut self, mut load: impl FnMut(&FrameKey) -> PreloadLoad) {
        let Some(batch) = &mut self.batch else {
            return;
        };
        if !batch.started {
            return;
        }
        loop {
            if batch.use_chain && !batch.pending.is_empty() {
                break;
            }
            let Some(key) = batch.work.pop() else {
                break;
            };
            let started = load(&key);
            if started.mask {
                batch.pending.insert((key.clone(), PreloadAsset::Mask));
            }
            if started.frame {
                batch.pending.insert((key, PreloadAsset::Frame));
            }
        }
        if batch.work.is_empty() && batch.pending.is_empty() {
            let result = match batch.failed {
                0 => PreloadResult::Completed,
                failed => PreloadResult::Partial { failed },
            };
            self.settle(result);
        }
    }

    /// Record that one fetch of `key` finished. Unknown fetches are ignored.
    ///
    /// Only frame failures count against the batch; a frame without a mask
    /// still draws.
    pub fn mark(&mut self, key: &FrameKey, asset: PreloadAsset, ok: bool) -> bool {
        let Some(batch) = &mut self.batch else {
            return false;
        };
        if !batch.pending.remove(&(key.clone(), asset)) {
            return false;
        }
        if !ok && asset == PreloadAsset::Frame {
            batch.failed += 1;
        }
        true
    }

    /// End the batch now with `result`, passing every still-pending fetch to `cancel`.
    pub fn finalize(
        &mut self,
        result: PreloadResult,
        mut cancel: impl FnMut(&FrameKey, PreloadAsset),
    ) -> bool {
        let Some(batch) = &mut self.batch else {
            return false;
        };
        batch.work.clear();
        for (key, asset) in std::mem::take(&mut batch.pending) {
            cancel(&key, asset);
        }
        self.settle(result);
        true
    }

    /// Result of the batch that settled last, once.
    pub fn take_result(&mut self) -> Option<(UpdateToken, PreloadResult)> {
        self.result.take()
    }

    fn settle(&mut self, result: PreloadResult) {
        if let Some(batch) = self.batch.take() {
            tracing::debug!(token = batch.token.0, ?result, "preload settled");
            self.result = Some((batch.token, result));
        }
    }
}

#[cfg(test)]
#[path = "../tests/unit/preload.rs"]
mod tests;
