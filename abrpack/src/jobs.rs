//! Pipeline graph assembly.
//!
//! Given validated, normalized stream descriptors, this module builds the
//! handler graph for a run: one shared demuxer per input, one shared
//! replicator per `(input, stream selector)`, optional cue aligners and
//! trick-play handlers, and one muxer per descriptor. Text descriptors take
//! their own pipelines starting from a WebVTT parser.

use crate::format::resolve_output_format;
use crate::listener::{
    to_muxer_listener_data, write_media_info_to_file, MuxerListener, MuxerListenerFactory,
    MEDIA_INFO_SUFFIX,
};
use crate::muxer::MuxerFactory;
use crate::notifier::MpdNotifier;
use crate::packager::Packager;
use abrpack_core::container::{
    determine_container, determine_container_from_file_name, MediaContainer,
};
use abrpack_core::descriptor::StreamDescriptor;
use abrpack_core::error::{Error, Result};
use abrpack_core::file::{copy_file, read_file};
use abrpack_core::media_info::{MediaInfo, MediaInfoContainerType, TextInfo};
use abrpack_core::params::{KeyProvider, MuxerOptions, PackagingParams, ProtectionScheme};
use abrpack_pipeline::chunking::{ChunkingHandler, TextChunker};
use abrpack_pipeline::crypto::{create_decryption_key_source, EncryptionHandler, KeySource};
use abrpack_pipeline::cue::{CueAlignmentHandler, SyncPointQueue};
use abrpack_pipeline::demuxer::Demuxer;
use abrpack_pipeline::handler::{chain, MediaHandler};
use abrpack_pipeline::job::JobManager;
use abrpack_pipeline::replicator::Replicator;
use abrpack_pipeline::text::{TextPadder, WebVttParser, WebVttTextOutputHandler, WebVttToMp4Handler};
use abrpack_pipeline::trick_play::TrickPlayHandler;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error};

/// Default bandwidth for whole-file text tracks. Text files are small and
/// the input is one file, so players cannot do ranged requests; this stands
/// in when the descriptor does not say.
const DEFAULT_TEXT_BANDWIDTH: u32 = 256;

/// Text streams are not padded out to a minimum duration.
const NO_DURATION_MS: i64 = 0;

/// Build the muxer options for one stream.
pub fn create_muxer_options(
    stream: &StreamDescriptor,
    packaging_params: &PackagingParams,
) -> MuxerOptions {
    MuxerOptions {
        mp4_params: packaging_params.mp4_output_params.clone(),
        temp_dir: packaging_params.temp_dir.clone(),
        bandwidth: stream.bandwidth,
        output_file_name: stream.output.clone(),
        segment_template: stream.segment_template.clone(),
    }
}

/// Total order over stream descriptors for deterministic assembly.
///
/// Orders by input, then stream selector. Among descriptors for the same
/// stream, the main track (factor 0) comes first because the MPD notifier
/// requires the main representation to be announced first; trick-play
/// variants follow in descending factor.
pub fn stream_descriptor_order(a: &StreamDescriptor, b: &StreamDescriptor) -> Ordering {
    match a.input.cmp(&b.input) {
        Ordering::Equal => {}
        unequal => return unequal,
    }
    match a.stream_selector.cmp(&b.stream_selector) {
        Ordering::Equal => {}
        unequal => return unequal,
    }
    if a.trick_play_factor == 0 || b.trick_play_factor == 0 {
        (a.trick_play_factor != 0).cmp(&(b.trick_play_factor != 0))
    } else {
        b.trick_play_factor.cmp(&a.trick_play_factor)
    }
}

fn determine_text_file_codec(file: &str) -> Option<&'static str> {
    let Ok(content) = read_file(file) else {
        error!("Failed to open file {file} to determine file format.");
        return None;
    };
    match determine_container(&content) {
        MediaContainer::WebVtt => Some("wvtt"),
        MediaContainer::Ttml => Some("ttml"),
        _ => None,
    }
}

/// Synthesize the media info for a whole-file text output.
fn stream_info_to_text_media_info(stream: &StreamDescriptor) -> Option<MediaInfo> {
    let Some(codec) = determine_text_file_codec(&stream.input) else {
        error!("Failed to determine the text file format for {}.", stream.input);
        return None;
    };

    Some(MediaInfo {
        media_file_name: stream.output.clone(),
        bandwidth: if stream.bandwidth != 0 {
            stream.bandwidth
        } else {
            DEFAULT_TEXT_BANDWIDTH
        },
        container_type: MediaInfoContainerType::Text,
        text_info: Some(TextInfo {
            codec: codec.to_string(),
            language: stream.language.clone(),
        }),
    })
}

/// Create the shared demuxer for a stream's input.
pub fn create_demuxer(
    stream: &StreamDescriptor,
    packaging_params: &PackagingParams,
) -> Result<Arc<Demuxer>> {
    let demuxer = Arc::new(Demuxer::new(stream.input.as_str()));
    demuxer.set_dump_stream_info(packaging_params.test_params.dump_stream_info);

    if packaging_params.decryption_params.key_provider != KeyProvider::None {
        let Some(decryption_key_source) =
            create_decryption_key_source(&packaging_params.decryption_params)
        else {
            return Err(Error::InvalidArgument(
                "Must define decryption key source when defining key provider.".to_string(),
            ));
        };
        demuxer.set_key_source(decryption_key_source);
    }

    Ok(demuxer)
}

/// Build the encryption handler for one stream, or `None` when the stream
/// skips encryption or no key source is configured.
pub fn create_encryption_handler(
    packaging_params: &PackagingParams,
    stream: &StreamDescriptor,
    key_source: Option<&Arc<dyn KeySource>>,
) -> Option<Arc<EncryptionHandler>> {
    if stream.skip_encryption {
        return None;
    }
    let key_source = key_source?;

    // Copy so per-stream adjustments stay local to this stream.
    let mut encryption_params = packaging_params.encryption_params.clone();

    let output_format = resolve_output_format(stream);
    if output_format == MediaContainer::Mpeg2Ts || output_format.is_packed_audio() {
        debug!("Using Apple Sample-AES encryption for TS and packed-audio output.");
        encryption_params.protection_scheme = ProtectionScheme::AppleSampleAes;
    }

    if !stream.drm_label.is_empty() {
        let drm_label = stream.drm_label.clone();
        encryption_params.stream_label_func = Some(Arc::new(move |_| drm_label.clone()));
    } else if encryption_params.stream_label_func.is_none() {
        encryption_params.stream_label_func = Some(Arc::new(|attributes| {
            Packager::default_stream_label_function(
                crate::packager::DEFAULT_MAX_SD_PIXELS,
                crate::packager::DEFAULT_MAX_HD_PIXELS,
                crate::packager::DEFAULT_MAX_UHD1_PIXELS,
                attributes,
            )
        }));
    }

    Some(Arc::new(EncryptionHandler::new(
        encryption_params,
        Arc::clone(key_source),
    )))
}

fn create_text_chunker(packaging_params: &PackagingParams) -> Arc<TextChunker> {
    Arc::new(TextChunker::new(
        packaging_params.chunking_params.segment_duration_in_seconds,
    ))
}

/// Build the segmented WebVTT job for HLS text output.
fn create_hls_text_job(
    stream: &StreamDescriptor,
    packaging_params: &PackagingParams,
    muxer_listener: Box<dyn MuxerListener>,
    sync_points: Option<&Arc<SyncPointQueue>>,
    job_manager: &mut JobManager,
) -> Result<()> {
    if stream.segment_template.is_empty() {
        return Err(Error::InvalidArgument(format!(
            "Cannot output text ({}) to HLS with no segment template.",
            stream.input
        )));
    }

    let mut muxer_options = create_muxer_options(stream, packaging_params);
    if muxer_options.bandwidth == 0 {
        muxer_options.bandwidth = DEFAULT_TEXT_BANDWIDTH;
    }

    let output = Arc::new(WebVttTextOutputHandler::new(muxer_options, muxer_listener));
    let parser = Arc::new(WebVttParser::new(
        stream.input.as_str(),
        stream.language.as_str(),
    ));
    let padder = Arc::new(TextPadder::new(NO_DURATION_MS));
    let cue_aligner =
        sync_points.map(|points| Arc::new(CueAlignmentHandler::new(Arc::clone(points))));
    let chunker = create_text_chunker(packaging_params);

    job_manager.add("Segmented Text Job", parser.clone());

    chain(&[
        Some(parser as Arc<dyn MediaHandler>),
        Some(padder as Arc<dyn MediaHandler>),
        cue_aligner.map(|aligner| aligner as Arc<dyn MediaHandler>),
        Some(chunker as Arc<dyn MediaHandler>),
        Some(output as Arc<dyn MediaHandler>),
    ])
}

/// Build the WebVTT-in-MP4 job and return its root parser.
fn create_webvtt_to_mp4_text_job(
    stream: &StreamDescriptor,
    packaging_params: &PackagingParams,
    muxer_listener: Box<dyn MuxerListener>,
    sync_points: Option<&Arc<SyncPointQueue>>,
    muxer_factory: &MuxerFactory,
) -> Result<Arc<WebVttParser>> {
    let parser = Arc::new(WebVttParser::new(
        stream.input.as_str(),
        stream.language.as_str(),
    ));
    let padder = Arc::new(TextPadder::new(NO_DURATION_MS));
    let text_to_mp4 = Arc::new(WebVttToMp4Handler::new());

    let muxer = muxer_factory
        .create_muxer(resolve_output_format(stream), stream)
        .ok_or_else(|| {
            Error::InvalidArgument(format!(
                "Failed to create muxer for {}:{}.",
                stream.input, stream.stream_selector
            ))
        })?;
    muxer.set_muxer_listener(muxer_listener);

    let cue_aligner =
        sync_points.map(|points| Arc::new(CueAlignmentHandler::new(Arc::clone(points))));
    let chunker = create_text_chunker(packaging_params);

    chain(&[
        Some(parser.clone() as Arc<dyn MediaHandler>),
        Some(padder as Arc<dyn MediaHandler>),
        cue_aligner.map(|aligner| aligner as Arc<dyn MediaHandler>),
        Some(chunker as Arc<dyn MediaHandler>),
        Some(text_to_mp4 as Arc<dyn MediaHandler>),
        Some(muxer as Arc<dyn MediaHandler>),
    ])?;

    Ok(parser)
}

/// Build all text pipelines.
///
/// Supported shapes are WebVTT input to MP4 output, WebVTT input to
/// segmented WebVTT for HLS, and a whole-file copy registered with the DASH
/// manifest. WebVTT already inside MP4 is not a supported input.
pub fn create_text_jobs(
    streams: &[&StreamDescriptor],
    packaging_params: &PackagingParams,
    sync_points: Option<&Arc<SyncPointQueue>>,
    muxer_listener_factory: &MuxerListenerFactory,
    muxer_factory: &MuxerFactory,
    mpd_notifier: Option<&Arc<dyn MpdNotifier>>,
    job_manager: &mut JobManager,
) -> Result<()> {
    for stream in streams {
        let input_container = determine_container_from_file_name(&stream.input);
        let output_container = resolve_output_format(stream);

        if input_container != MediaContainer::WebVtt {
            return Err(Error::InvalidArgument(format!(
                "Text output format is not supported for {}.",
                stream.input
            )));
        }

        if output_container == MediaContainer::Mp4 {
            let muxer_listener =
                muxer_listener_factory.create_listener(to_muxer_listener_data(stream));
            let root = create_webvtt_to_mp4_text_job(
                stream,
                packaging_params,
                muxer_listener,
                sync_points,
                muxer_factory,
            )?;
            job_manager.add("MP4 text job", root);
            continue;
        }

        let hls_listener = muxer_listener_factory.create_hls_listener(to_muxer_listener_data(stream));

        // Check the descriptor shape against what each output can do.
        if hls_listener.is_some()
            && (stream.segment_template.is_empty() || !stream.output.is_empty())
        {
            return Err(Error::InvalidArgument(
                "segment_template needs to be specified for HLS text output. Single file \
                 output is not supported yet."
                    .to_string(),
            ));
        }
        if mpd_notifier.is_some() && !stream.segment_template.is_empty() {
            return Err(Error::InvalidArgument(
                "Cannot create text output for MPD with segment output.".to_string(),
            ));
        }

        if let Some(hls_listener) = hls_listener {
            create_hls_text_job(
                stream,
                packaging_params,
                hls_listener,
                sync_points,
                job_manager,
            )?;
        }

        if !stream.output.is_empty() {
            copy_file(&stream.input, &stream.output)?;

            let text_media_info = stream_info_to_text_media_info(stream).ok_or_else(|| {
                Error::InvalidArgument("Could not create media info for stream.".to_string())
            })?;

            // With a DASH manifest, the copied file joins it directly.
            if let Some(notifier) = mpd_notifier {
                if notifier.notify_new_container(&text_media_info).is_err() {
                    return Err(Error::ParserFailure(format!(
                        "Failed to process text file {}.",
                        stream.input
                    )));
                }
                notifier.flush()?;
            }

            if packaging_params.output_media_info {
                write_media_info_to_file(
                    &text_media_info,
                    &format!("{}{MEDIA_INFO_SUFFIX}", stream.output),
                )?;
            }
        }
    }

    Ok(())
}

/// Build all audio/video pipelines.
///
/// The streams must already be sorted with [`stream_descriptor_order`];
/// demuxer sharing and trick-play attachment depend on walking descriptors
/// for the same stream consecutively, main track first.
pub fn create_audio_video_jobs(
    streams: &[&StreamDescriptor],
    packaging_params: &PackagingParams,
    encryption_key_source: Option<&Arc<dyn KeySource>>,
    sync_points: Option<&Arc<SyncPointQueue>>,
    muxer_listener_factory: &MuxerListenerFactory,
    muxer_factory: &MuxerFactory,
    job_manager: &mut JobManager,
) -> Result<()> {
    // Pass one: one demuxer per distinct input, plus its cue aligner when
    // cue alignment is active.
    let mut sources: BTreeMap<String, Arc<Demuxer>> = BTreeMap::new();
    let mut cue_aligners: BTreeMap<String, Option<Arc<CueAlignmentHandler>>> = BTreeMap::new();

    for stream in streams {
        if sources.contains_key(&stream.input) {
            continue;
        }
        sources.insert(
            stream.input.clone(),
            create_demuxer(stream, packaging_params)?,
        );
        cue_aligners.insert(
            stream.input.clone(),
            sync_points.map(|points| Arc::new(CueAlignmentHandler::new(Arc::clone(points)))),
        );
    }

    for source in sources.values() {
        job_manager.add("RemuxJob", source.clone());
    }

    // Pass two: per-descriptor wiring. The replicator is shared among all
    // descriptors with the same input and stream selector.
    let mut replicator: Option<Arc<Replicator>> = None;
    let mut previous_input = String::new();
    let mut previous_selector = String::new();

    for stream in streams {
        let demuxer = &sources[&stream.input];
        let cue_aligner = cue_aligners[&stream.input].clone();

        let new_input_file = stream.input != previous_input;
        let new_stream = new_input_file || previous_selector != stream.stream_selector;
        previous_input = stream.input.clone();
        previous_selector = stream.stream_selector.clone();

        // A stream with no output needs none of the remaining pipeline.
        if stream.output.is_empty() && stream.segment_template.is_empty() {
            continue;
        }

        // A different descriptor is not necessarily a different stream;
        // trick-play variants share theirs with the main track.
        if new_stream {
            if !stream.language.is_empty() {
                demuxer.set_language_override(
                    stream.stream_selector.as_str(),
                    stream.language.as_str(),
                );
            }

            let new_replicator = Arc::new(Replicator::new());
            let chunker = Arc::new(ChunkingHandler::new(packaging_params.chunking_params.clone()));
            let encryptor =
                create_encryption_handler(packaging_params, stream, encryption_key_source);

            if let Some(cue_aligner) = &cue_aligner {
                chain(&[
                    Some(cue_aligner.clone() as Arc<dyn MediaHandler>),
                    Some(chunker as Arc<dyn MediaHandler>),
                    encryptor.map(|handler| handler as Arc<dyn MediaHandler>),
                    Some(new_replicator.clone() as Arc<dyn MediaHandler>),
                ])?;
                demuxer.set_handler(stream.stream_selector.as_str(), cue_aligner.clone())?;
            } else {
                chain(&[
                    Some(chunker.clone() as Arc<dyn MediaHandler>),
                    encryptor.map(|handler| handler as Arc<dyn MediaHandler>),
                    Some(new_replicator.clone() as Arc<dyn MediaHandler>),
                ])?;
                demuxer.set_handler(stream.stream_selector.as_str(), chunker)?;
            }
            replicator = Some(new_replicator);
        }

        let muxer = muxer_factory
            .create_muxer(resolve_output_format(stream), stream)
            .ok_or_else(|| {
                Error::InvalidArgument(format!(
                    "Failed to create muxer for {}:{}.",
                    stream.input, stream.stream_selector
                ))
            })?;
        muxer.set_muxer_listener(
            muxer_listener_factory.create_listener(to_muxer_listener_data(stream)),
        );

        let trick_play = (stream.trick_play_factor != 0)
            .then(|| Arc::new(TrickPlayHandler::new(stream.trick_play_factor)));

        chain(&[
            replicator
                .clone()
                .map(|handler| handler as Arc<dyn MediaHandler>),
            trick_play.map(|handler| handler as Arc<dyn MediaHandler>),
            Some(muxer as Arc<dyn MediaHandler>),
        ])?;
    }

    Ok(())
}

/// Build every pipeline for a run and initialize the job graph.
///
/// Splits descriptors into text and audio/video by the `"text"` selector,
/// sorts the audio/video set so shared-source assembly is deterministic,
/// invokes both builders, and finally initializes the registered jobs.
#[allow(clippy::too_many_arguments)]
pub fn create_all_jobs(
    stream_descriptors: &[StreamDescriptor],
    packaging_params: &PackagingParams,
    mpd_notifier: Option<&Arc<dyn MpdNotifier>>,
    encryption_key_source: Option<&Arc<dyn KeySource>>,
    sync_points: Option<&Arc<SyncPointQueue>>,
    muxer_listener_factory: &MuxerListenerFactory,
    muxer_factory: &MuxerFactory,
    job_manager: &mut JobManager,
) -> Result<()> {
    let mut text_streams = Vec::new();
    let mut audio_video_streams = Vec::new();
    for stream in stream_descriptors {
        if stream.stream_selector == "text" {
            text_streams.push(stream);
        } else {
            audio_video_streams.push(stream);
        }
    }

    // Demuxer sharing and trick-play attachment depend on descriptor order.
    audio_video_streams.sort_by(|a, b| stream_descriptor_order(a, b));

    create_text_jobs(
        &text_streams,
        packaging_params,
        sync_points,
        muxer_listener_factory,
        muxer_factory,
        mpd_notifier,
        job_manager,
    )?;
    create_audio_video_jobs(
        &audio_video_streams,
        packaging_params,
        encryption_key_source,
        sync_points,
        muxer_listener_factory,
        muxer_factory,
        job_manager,
    )?;

    job_manager.initialize_jobs()
}
