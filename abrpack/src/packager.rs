//! The packager orchestrator.

use crate::jobs::create_all_jobs;
use crate::listener::MuxerListenerFactory;
use crate::muxer::{EpochClock, MuxerFactory};
use crate::notifier::{get_mpd_options, HlsNotifier, MpdNotifier, SimpleHlsNotifier, SimpleMpdNotifier};
use crate::validate::validate_params;
use abrpack_core::descriptor::StreamDescriptor;
use abrpack_core::error::{Error, Result};
use abrpack_core::file::make_callback_file_name;
use abrpack_core::language::{language_to_iso_639_2, language_to_shortest_form};
use abrpack_core::params::{
    BufferCallbackParams, EncryptedStreamAttributes, KeyProvider, PackagingParams,
};
use abrpack_pipeline::crypto::{create_encryption_key_source, KeySource};
use abrpack_pipeline::cue::SyncPointQueue;
use abrpack_pipeline::job::JobManager;
use std::sync::Arc;
use tracing::{error, info};

/// Streams up to this pixel count take the `"SD"` DRM label.
pub(crate) const DEFAULT_MAX_SD_PIXELS: u32 = 768 * 576;
/// Streams up to this pixel count take the `"HD"` DRM label.
pub(crate) const DEFAULT_MAX_HD_PIXELS: u32 = 1920 * 1080;
/// Streams up to this pixel count take the `"UHD1"` DRM label; anything
/// larger is `"UHD2"`.
pub(crate) const DEFAULT_MAX_UHD1_PIXELS: u32 = 4096 * 2160;

/// State owned by an initialized packager.
struct PackagerInternal {
    #[allow(dead_code)]
    encryption_key_source: Option<Arc<dyn KeySource>>,
    mpd_notifier: Option<Arc<dyn MpdNotifier>>,
    hls_notifier: Option<Arc<dyn HlsNotifier>>,
    #[allow(dead_code)]
    buffer_callback_params: BufferCallbackParams,
    job_manager: JobManager,
}

/// Assembles and runs a packaging job.
///
/// `initialize` validates the request, builds the whole handler graph and
/// registers it with the job manager; nothing is committed unless every
/// step succeeds. `run` then drives the graph to completion and flushes the
/// manifest notifiers.
#[derive(Default)]
pub struct Packager {
    internal: Option<PackagerInternal>,
    library_version: Option<String>,
}

impl Packager {
    /// Create an uninitialized packager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the request and assemble the packaging graph.
    ///
    /// Fails on the first invalid descriptor or unbuildable pipeline; a
    /// packager can only be initialized once.
    pub fn initialize(
        &mut self,
        packaging_params: &PackagingParams,
        stream_descriptors: &[StreamDescriptor],
    ) -> Result<()> {
        if self.internal.is_some() {
            return Err(Error::InvalidArgument("Already initialized.".to_string()));
        }

        validate_params(packaging_params, stream_descriptors)?;

        if !packaging_params.test_params.injected_library_version.is_empty() {
            self.library_version =
                Some(packaging_params.test_params.injected_library_version.clone());
        }

        // The encryption key source, when a provider is configured.
        let mut encryption_key_source = None;
        if packaging_params.encryption_params.key_provider != KeyProvider::None {
            encryption_key_source =
                create_encryption_key_source(&packaging_params.encryption_params);
            if encryption_key_source.is_none() {
                return Err(Error::InvalidArgument(
                    "Failed to create key source.".to_string(),
                ));
            }
        }

        // Keep the callback params around for the whole run, and route the
        // manifest outputs through the write callback when one is set.
        let buffer_callback_params = packaging_params.buffer_callback_params.clone();
        let mut mpd_params = packaging_params.mpd_params.clone();
        let mut hls_params = packaging_params.hls_params.clone();
        if buffer_callback_params.write_func.is_some() {
            mpd_params.mpd_output =
                make_callback_file_name(&buffer_callback_params, &mpd_params.mpd_output);
            hls_params.master_playlist_output = make_callback_file_name(
                &buffer_callback_params,
                &hls_params.master_playlist_output,
            );
        }

        // DASH and HLS both require RFC 5646 language tags, which must be in
        // the shortest form.
        mpd_params.default_language = language_to_shortest_form(&mpd_params.default_language);
        hls_params.default_language = language_to_shortest_form(&hls_params.default_language);

        let mut mpd_notifier: Option<Arc<dyn MpdNotifier>> = None;
        if !mpd_params.mpd_output.is_empty() {
            let on_demand_profile = stream_descriptors
                .first()
                .is_some_and(|descriptor| descriptor.segment_template.is_empty());
            let mpd_options = get_mpd_options(
                on_demand_profile,
                &mpd_params,
                packaging_params.chunking_params.segment_duration_in_seconds,
            );
            let notifier = SimpleMpdNotifier::new(mpd_options);
            if notifier.init().is_err() {
                error!("MpdNotifier failed to initialize.");
                return Err(Error::InvalidArgument(
                    "Failed to initialize MpdNotifier.".to_string(),
                ));
            }
            mpd_notifier = Some(Arc::new(notifier));
        }

        let mut hls_notifier: Option<Arc<dyn HlsNotifier>> = None;
        if !hls_params.master_playlist_output.is_empty() {
            hls_notifier = Some(Arc::new(SimpleHlsNotifier::new(hls_params.clone())));
        }

        let sync_points = (!packaging_params.ad_cue_generator_params.cue_points.is_empty())
            .then(|| {
                Arc::new(SyncPointQueue::new(
                    &packaging_params.ad_cue_generator_params,
                ))
            });
        let mut job_manager = JobManager::new(sync_points.clone());

        // Normalize descriptor copies: callback routing and language codes.
        let mut streams_for_jobs = Vec::with_capacity(stream_descriptors.len());
        for descriptor in stream_descriptors {
            let mut copy = descriptor.clone();

            if buffer_callback_params.read_func.is_some() {
                copy.input = make_callback_file_name(&buffer_callback_params, &descriptor.input);
            }
            if buffer_callback_params.write_func.is_some() {
                copy.output = make_callback_file_name(&buffer_callback_params, &descriptor.output);
                copy.segment_template =
                    make_callback_file_name(&buffer_callback_params, &descriptor.segment_template);
            }

            if !copy.language.is_empty() {
                copy.language = language_to_iso_639_2(&descriptor.language);
                if copy.language == "und" {
                    return Err(Error::InvalidArgument(format!(
                        "Unknown/invalid language specified: {}.",
                        descriptor.language
                    )));
                }
            }

            streams_for_jobs.push(copy);
        }

        let mut muxer_factory = MuxerFactory::new(packaging_params);
        if packaging_params.test_params.inject_fake_clock {
            muxer_factory.override_clock(Arc::new(EpochClock));
        }

        let muxer_listener_factory = MuxerListenerFactory::new(
            packaging_params.output_media_info,
            mpd_notifier.clone(),
            hls_notifier.clone(),
        );

        create_all_jobs(
            &streams_for_jobs,
            packaging_params,
            mpd_notifier.as_ref(),
            encryption_key_source.as_ref(),
            sync_points.as_ref(),
            &muxer_listener_factory,
            &muxer_factory,
            &mut job_manager,
        )?;

        // Commit only after every pipeline assembled.
        self.internal = Some(PackagerInternal {
            encryption_key_source,
            mpd_notifier,
            hls_notifier,
            buffer_callback_params,
            job_manager,
        });
        Ok(())
    }

    /// Run all assembled jobs to completion, then flush the notifiers.
    pub fn run(&self) -> Result<()> {
        let Some(internal) = &self.internal else {
            return Err(Error::InvalidArgument("Not yet initialized.".to_string()));
        };

        internal.job_manager.run_jobs()?;

        if let Some(hls_notifier) = &internal.hls_notifier {
            if hls_notifier.flush().is_err() {
                return Err(Error::InvalidArgument("Failed to flush Hls.".to_string()));
            }
        }
        if let Some(mpd_notifier) = &internal.mpd_notifier {
            if mpd_notifier.flush().is_err() {
                return Err(Error::InvalidArgument("Failed to flush Mpd.".to_string()));
            }
        }
        Ok(())
    }

    /// Cancel a running packaging job. A no-op before initialization.
    pub fn cancel(&self) {
        let Some(internal) = &self.internal else {
            info!("Not yet initialized. Return directly.");
            return;
        };
        internal.job_manager.cancel_jobs();
    }

    /// The library version, or the injected test override after
    /// initialization.
    pub fn library_version(&self) -> &str {
        self.library_version
            .as_deref()
            .unwrap_or(env!("CARGO_PKG_VERSION"))
    }

    /// The names of the registered jobs, in registration order.
    pub fn job_names(&self) -> Vec<String> {
        match &self.internal {
            Some(internal) => internal
                .job_manager
                .jobs()
                .iter()
                .map(|job| job.name().to_string())
                .collect(),
            None => Vec::new(),
        }
    }

    /// The default DRM label for a stream: `"AUDIO"` for audio, a
    /// resolution bucket for video, empty otherwise.
    pub fn default_stream_label_function(
        max_sd_pixels: u32,
        max_hd_pixels: u32,
        max_uhd1_pixels: u32,
        stream_attributes: &EncryptedStreamAttributes,
    ) -> String {
        match stream_attributes {
            EncryptedStreamAttributes::Audio => "AUDIO".to_string(),
            EncryptedStreamAttributes::Video { width, height } => {
                let pixels = width * height;
                if pixels <= max_sd_pixels {
                    "SD".to_string()
                } else if pixels <= max_hd_pixels {
                    "HD".to_string()
                } else if pixels <= max_uhd1_pixels {
                    "UHD1".to_string()
                } else {
                    "UHD2".to_string()
                }
            }
            EncryptedStreamAttributes::Unknown => String::new(),
        }
    }
}
