use crate::config::MediaConstraints;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tandem_core::{Error, Result};
use tracing::info;
use webrtc::api::media_engine::{MIME_TYPE_OPUS, MIME_TYPE_VP8};
use webrtc::media::Sample;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

const MEDIA_STREAM_ID: &str = "tandem";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Audio,
    Video,
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Audio => f.write_str("audio"),
            Self::Video => f.write_str("video"),
        }
    }
}

/// One outgoing track. The application feeds it encoded samples with
/// [`LocalTrack::write_sample`] until the owning media is stopped.
#[derive(Clone)]
pub struct LocalTrack {
    kind: TrackKind,
    track: Arc<TrackLocalStaticSample>,
    stopped: Arc<AtomicBool>,
}

impl LocalTrack {
    pub fn new(kind: TrackKind, track: Arc<TrackLocalStaticSample>) -> Self {
        Self {
            kind,
            track,
            stopped: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn kind(&self) -> TrackKind {
        self.kind
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    pub async fn write_sample(&self, sample: &Sample) -> Result<()> {
        if self.is_stopped() {
            return Err(Error::media_access(format!("{} track is stopped", self.kind)));
        }
        self.track
            .write_sample(sample)
            .await
            .map_err(|e| Error::media_access(format!("{} track: {}", self.kind, e)))
    }

    pub(crate) fn sample_track(&self) -> Arc<TrackLocalStaticSample> {
        self.track.clone()
    }
}

struct LocalMediaInner {
    tracks: Vec<LocalTrack>,
    stopped: AtomicBool,
}

/// The local media stream of one call. Clones share the same tracks
/// and the same stopped flag.
#[derive(Clone)]
pub struct LocalMedia {
    inner: Arc<LocalMediaInner>,
}

impl LocalMedia {
    pub fn new(tracks: Vec<LocalTrack>) -> Self {
        Self {
            inner: Arc::new(LocalMediaInner {
                tracks,
                stopped: AtomicBool::new(false),
            }),
        }
    }

    pub fn tracks(&self) -> &[LocalTrack] {
        &self.inner.tracks
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::SeqCst)
    }

    /// Stops every track; each refuses samples from then on. Later calls
    /// do nothing.
    pub fn stop(&self) {
        if self.inner.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        for track in &self.inner.tracks {
            track.stopped.store(true, Ordering::SeqCst);
        }
        info!("Stopped {} local tracks", self.inner.tracks.len());
    }
}

impl fmt::Debug for LocalMedia {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kinds: Vec<TrackKind> = self.tracks().iter().map(|t| t.kind).collect();
        f.debug_struct("LocalMedia")
            .field("tracks", &kinds)
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

/// Camera/microphone access. Failures surface as `Error::MediaAccess`.
#[async_trait]
pub trait MediaSource: Send + Sync {
    async fn acquire(&self, constraints: &MediaConstraints) -> Result<LocalMedia>;
}

/// Opus audio and VP8 video sample tracks with no device behind them.
#[derive(Debug, Clone, Default)]
pub struct StaticMediaSource;

impl StaticMediaSource {
    fn track(kind: TrackKind) -> LocalTrack {
        let capability = match kind {
            TrackKind::Audio => RTCRtpCodecCapability {
                mime_type: MIME_TYPE_OPUS.to_owned(),
                clock_rate: 48000,
                channels: 2,
                ..Default::default()
            },
            TrackKind::Video => RTCRtpCodecCapability {
                mime_type: MIME_TYPE_VP8.to_owned(),
                clock_rate: 90000,
                ..Default::default()
            },
        };
        let track = TrackLocalStaticSample::new(
            capability,
            kind.to_string(),
            MEDIA_STREAM_ID.to_owned(),
        );
        LocalTrack::new(kind, Arc::new(track))
    }
}

#[async_trait]
impl MediaSource for StaticMediaSource {
    async fn acquire(&self, constraints: &MediaConstraints) -> Result<LocalMedia> {
        let mut tracks = Vec::new();
        if constraints.audio {
            tracks.push(Self::track(TrackKind::Audio));
        }
        if constraints.video {
            tracks.push(Self::track(TrackKind::Video));
        }

        if tracks.is_empty() {
            return Err(Error::media_access("neither audio nor video was requested"));
        }
        Ok(LocalMedia::new(tracks))
    }
}
