//! Manifest notifiers.
//!
//! Notifiers collect the containers a run produces so the manifest writers
//! can describe them. Manifest serialization itself lives behind these
//! traits; the simple implementations here record notified containers and
//! track flushes.

use abrpack_core::error::{Error, Result};
use abrpack_core::media_info::MediaInfo;
use abrpack_core::params::{HlsParams, MpdParams};
use parking_lot::Mutex;
use tracing::{debug, info};

/// DASH profile for a packaging run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DashProfile {
    /// Single-file segments, no segment template.
    OnDemand,
    /// Templated segments.
    Live,
}

/// MPD presentation type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MpdType {
    /// `static` presentation.
    Static,
    /// `dynamic` presentation.
    Dynamic,
}

/// Resolved MPD generation options.
#[derive(Debug, Clone)]
pub struct MpdOptions {
    /// DASH profile.
    pub dash_profile: DashProfile,
    /// Presentation type.
    pub mpd_type: MpdType,
    /// MPD parameters, paths already rewritten for callbacks.
    pub mpd_params: MpdParams,
    /// Target segment duration in seconds.
    pub target_segment_duration: f64,
}

/// Derive MPD options from the run's profile and parameters.
pub fn get_mpd_options(
    on_demand_profile: bool,
    mpd_params: &MpdParams,
    target_segment_duration: f64,
) -> MpdOptions {
    let dash_profile = if on_demand_profile {
        DashProfile::OnDemand
    } else {
        DashProfile::Live
    };
    let mpd_type = if on_demand_profile || mpd_params.generate_static_live_mpd {
        MpdType::Static
    } else {
        MpdType::Dynamic
    };
    MpdOptions {
        dash_profile,
        mpd_type,
        mpd_params: mpd_params.clone(),
        target_segment_duration,
    }
}

/// Receives the containers destined for a DASH MPD.
pub trait MpdNotifier: Send + Sync {
    /// Prepare the notifier; must be called before any notification.
    fn init(&self) -> Result<()>;

    /// Register one new container; returns its notification id.
    fn notify_new_container(&self, media_info: &MediaInfo) -> Result<u32>;

    /// Write out the manifest state collected so far.
    fn flush(&self) -> Result<()>;
}

/// Receives HLS lifecycle events.
pub trait HlsNotifier: Send + Sync {
    /// Register one new stream for the master playlist.
    fn notify_new_stream(&self, _media_info: &MediaInfo) -> Result<()> {
        Ok(())
    }

    /// Write out the playlists collected so far.
    fn flush(&self) -> Result<()>;
}

#[derive(Default)]
struct MpdNotifierState {
    initialized: bool,
    containers: Vec<MediaInfo>,
    flush_count: u32,
}

/// In-process MPD notifier.
pub struct SimpleMpdNotifier {
    options: MpdOptions,
    state: Mutex<MpdNotifierState>,
}

impl SimpleMpdNotifier {
    /// Create a notifier over resolved MPD options.
    pub fn new(options: MpdOptions) -> Self {
        Self {
            options,
            state: Mutex::new(MpdNotifierState::default()),
        }
    }

    /// The options this notifier was built with.
    pub fn options(&self) -> &MpdOptions {
        &self.options
    }

    /// Whether `init` succeeded.
    pub fn initialized(&self) -> bool {
        self.state.lock().initialized
    }

    /// The containers notified so far.
    pub fn notified_containers(&self) -> Vec<MediaInfo> {
        self.state.lock().containers.clone()
    }

    /// How many times the notifier has been flushed.
    pub fn flush_count(&self) -> u32 {
        self.state.lock().flush_count
    }
}

impl MpdNotifier for SimpleMpdNotifier {
    fn init(&self) -> Result<()> {
        if self.options.mpd_params.mpd_output.is_empty() {
            return Err(Error::InvalidArgument(
                "MPD notifier requires an MPD output path.".to_string(),
            ));
        }
        info!(
            mpd_output = %self.options.mpd_params.mpd_output,
            profile = ?self.options.dash_profile,
            "MPD notifier initialized"
        );
        self.state.lock().initialized = true;
        Ok(())
    }

    fn notify_new_container(&self, media_info: &MediaInfo) -> Result<u32> {
        if media_info.media_file_name.is_empty() {
            return Err(Error::ParserFailure(
                "Media info has no media file name.".to_string(),
            ));
        }
        let mut state = self.state.lock();
        let id = state.containers.len() as u32;
        state.containers.push(media_info.clone());
        debug!(id, file = %media_info.media_file_name, "new container notified");
        Ok(id)
    }

    fn flush(&self) -> Result<()> {
        self.state.lock().flush_count += 1;
        Ok(())
    }
}

#[derive(Default)]
struct HlsNotifierState {
    streams: Vec<MediaInfo>,
    flush_count: u32,
}

/// In-process HLS notifier.
pub struct SimpleHlsNotifier {
    params: HlsParams,
    state: Mutex<HlsNotifierState>,
}

impl SimpleHlsNotifier {
    /// Create a notifier over HLS parameters.
    pub fn new(params: HlsParams) -> Self {
        Self {
            params,
            state: Mutex::new(HlsNotifierState::default()),
        }
    }

    /// The parameters this notifier was built with.
    pub fn params(&self) -> &HlsParams {
        &self.params
    }

    /// The streams notified so far.
    pub fn notified_streams(&self) -> Vec<MediaInfo> {
        self.state.lock().streams.clone()
    }

    /// How many times the notifier has been flushed.
    pub fn flush_count(&self) -> u32 {
        self.state.lock().flush_count
    }
}

impl HlsNotifier for SimpleHlsNotifier {
    fn notify_new_stream(&self, media_info: &MediaInfo) -> Result<()> {
        self.state.lock().streams.push(media_info.clone());
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        self.state.lock().flush_count += 1;
        Ok(())
    }
}
