use crate::config::MediaConstraints;
use crate::media::local_stream::{LocalStream, LocalTrack};
use crate::media::media_kind::MediaKind;
use async_trait::async_trait;
use huddle_core::{CallError, Result};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;
use webrtc::api::media_engine::{MIME_TYPE_OPUS, MIME_TYPE_VP8};
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

/// Acquires the local camera/microphone capture.
#[async_trait]
pub trait MediaSource: Send + Sync {
    /// Fails with `MediaAccessDenied` if capture permission is refused.
    async fn acquire(&self, constraints: &MediaConstraints) -> Result<LocalStream>;
}

/// Media source backed by sample-fed tracks (VP8 video, Opus audio).
/// Frames are pushed with [`LocalStream::write_sample`].
pub struct SyntheticMediaSource {
    granted: bool,
}

impl SyntheticMediaSource {
    pub fn new() -> Self {
        Self { granted: true }
    }

    /// A source whose permission prompt is always refused.
    pub fn denied() -> Self {
        Self { granted: false }
    }
}

impl Default for SyntheticMediaSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaSource for SyntheticMediaSource {
    async fn acquire(&self, constraints: &MediaConstraints) -> Result<LocalStream> {
        if !self.granted {
            warn!("Capture permission refused");
            return Err(CallError::MediaAccessDenied(
                "camera/microphone permission refused".to_owned(),
            ));
        }

        let stream_id = format!("local-{}", Uuid::new_v4().simple());
        let mut tracks = Vec::new();

        if constraints.video.is_some() {
            let codec = RTCRtpCodecCapability {
                mime_type: MIME_TYPE_VP8.to_owned(),
                clock_rate: 90_000,
                ..Default::default()
            };
            let rtp = TrackLocalStaticSample::new(codec, "video".to_owned(), stream_id.clone());
            tracks.push(LocalTrack::new(MediaKind::Video, Arc::new(rtp)));
        }

        if let Some(audio) = &constraints.audio {
            let codec = RTCRtpCodecCapability {
                mime_type: MIME_TYPE_OPUS.to_owned(),
                clock_rate: audio.sample_rate,
                channels: audio.channels,
                ..Default::default()
            };
            let rtp = TrackLocalStaticSample::new(codec, "audio".to_owned(), stream_id.clone());
            tracks.push(LocalTrack::new(MediaKind::Audio, Arc::new(rtp)));
        }

        info!("Acquired local stream {} with {} tracks", stream_id, tracks.len());
        Ok(LocalStream::new(stream_id, tracks))
    }
}
