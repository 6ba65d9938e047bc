use crate::media::media_kind::MediaKind;
use anyhow::{Result, bail};
use bytes::Bytes;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info};
use webrtc::media::Sample;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

type ReleaseHook = Box<dyn FnOnce() + Send>;

pub struct LocalTrack {
    kind: MediaKind,
    enabled: AtomicBool,
    rtp: Arc<TrackLocalStaticSample>,
}

impl LocalTrack {
    pub fn new(kind: MediaKind, rtp: Arc<TrackLocalStaticSample>) -> Self {
        Self {
            kind,
            enabled: AtomicBool::new(true),
            rtp,
        }
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn rtp(&self) -> Arc<TrackLocalStaticSample> {
        Arc::clone(&self.rtp)
    }
}

/// Local capture handle shared by every peer connection of a call.
///
/// Disabling a kind keeps its track attached; samples written while it is
/// disabled are dropped. `release` stops capture and can only happen once.
pub struct LocalStream {
    id: String,
    tracks: Vec<LocalTrack>,
    released: AtomicBool,
    on_release: Mutex<Option<ReleaseHook>>,
}

impl LocalStream {
    pub fn new(id: impl Into<String>, tracks: Vec<LocalTrack>) -> Self {
        Self {
            id: id.into(),
            tracks,
            released: AtomicBool::new(false),
            on_release: Mutex::new(None),
        }
    }

    /// Run `hook` when the stream is released, e.g. to stop a capture device.
    pub fn with_release_hook(self, hook: impl FnOnce() + Send + 'static) -> Self {
        if let Ok(mut slot) = self.on_release.lock() {
            *slot = Some(Box::new(hook));
        }
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn tracks(&self) -> &[LocalTrack] {
        &self.tracks
    }

    pub fn has(&self, kind: MediaKind) -> bool {
        self.tracks.iter().any(|t| t.kind == kind)
    }

    /// Returns `false` if the stream was already released.
    pub fn set_video_enabled(&self, enabled: bool) -> bool {
        self.set_enabled(MediaKind::Video, enabled)
    }

    /// Returns `false` if the stream was already released.
    pub fn set_audio_enabled(&self, enabled: bool) -> bool {
        self.set_enabled(MediaKind::Audio, enabled)
    }

    pub fn is_enabled(&self, kind: MediaKind) -> bool {
        !self.is_released()
            && self
                .tracks
                .iter()
                .any(|t| t.kind == kind && t.is_enabled())
    }

    fn set_enabled(&self, kind: MediaKind, enabled: bool) -> bool {
        if self.is_released() {
            return false;
        }
        for track in self.tracks.iter().filter(|t| t.kind == kind) {
            track.enabled.store(enabled, Ordering::SeqCst);
        }
        debug!("Local {} {}", kind, if enabled { "enabled" } else { "disabled" });
        true
    }

    /// Push one encoded frame to every enabled track of `kind`. Returns how
    /// many tracks took it.
    pub async fn write_sample(&self, kind: MediaKind, data: Bytes, duration: Duration) -> Result<usize> {
        if self.is_released() {
            bail!("local stream {} was released", self.id);
        }

        let sample = Sample {
            data,
            duration,
            ..Default::default()
        };
        let mut written = 0;
        for track in self.tracks.iter().filter(|t| t.kind == kind && t.is_enabled()) {
            track.rtp.write_sample(&sample).await?;
            written += 1;
        }
        Ok(written)
    }

    /// Stop capture. Returns `true` only for the call that actually released.
    pub fn release(&self) -> bool {
        if self.released.swap(true, Ordering::SeqCst) {
            return false;
        }

        info!("Releasing local stream {}", self.id);
        let hook = self.on_release.lock().ok().and_then(|mut slot| slot.take());
        if let Some(hook) = hook {
            hook();
        }
        true
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for LocalStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalStream")
            .field("id", &self.id)
            .field("tracks", &self.tracks.iter().map(|t| t.kind).collect::<Vec<_>>())
            .field("released", &self.is_released())
            .finish()
    }
}
