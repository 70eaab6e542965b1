//! Stream descriptor and parameter validation.

use crate::format::resolve_output_format;
use abrpack_core::container::MediaContainer;
use abrpack_core::descriptor::StreamDescriptor;
use abrpack_core::error::{Error, Result};
use abrpack_core::params::{HlsPlaylistType, PackagingParams};
use abrpack_core::template::validate_segment_template;
use tracing::warn;

/// Validate one stream descriptor against the output container rules.
pub fn validate_stream_descriptor(dump_stream_info: bool, stream: &StreamDescriptor) -> Result<()> {
    if stream.input.is_empty() {
        return Err(Error::InvalidArgument(
            "Stream input not specified.".to_string(),
        ));
    }

    // The only time a stream can have no outputs is when stream info
    // dumping is on.
    if dump_stream_info && stream.output.is_empty() && stream.segment_template.is_empty() {
        return Ok(());
    }

    if stream.output.is_empty() && stream.segment_template.is_empty() {
        return Err(Error::InvalidArgument(
            "Streams must specify 'output' or 'segment template'.".to_string(),
        ));
    }

    // Whenever there is output, a stream must be selected.
    if stream.stream_selector.is_empty() {
        return Err(Error::InvalidArgument(
            "Stream stream_selector not specified.".to_string(),
        ));
    }

    if !stream.segment_template.is_empty() {
        validate_segment_template(&stream.segment_template)?;
    }

    // "$" in the output file name means it is a template, used to produce
    // one file per representation per period when there are ad cues.
    if stream.output.contains('$') {
        validate_segment_template(&stream.output)?;
    }

    match resolve_output_format(stream) {
        MediaContainer::Unknown => Err(Error::InvalidArgument(
            "Unsupported output format.".to_string(),
        )),
        MediaContainer::Mpeg2Ts => {
            if stream.segment_template.is_empty() {
                return Err(Error::InvalidArgument(
                    "Please specify 'segment_template'. Single file TS output is not supported."
                        .to_string(),
                ));
            }
            // The init segment lives in 'output' for multi-segment content,
            // but TS segments are self-initializing.
            if !stream.output.is_empty() {
                return Err(Error::InvalidArgument(
                    "All TS segments must be self-initializing. Stream descriptors 'output' or \
                     'init_segment' are not allowed."
                        .to_string(),
                ));
            }
            Ok(())
        }
        MediaContainer::WebVtt | MediaContainer::Aac | MediaContainer::Ac3
        | MediaContainer::Eac3 => {
            // These formats carry no initialization data.
            if !stream.segment_template.is_empty() && !stream.output.is_empty() {
                return Err(Error::InvalidArgument(
                    "Segmented WebVTT or packed-audio output cannot have an init segment. Do not \
                     specify stream descriptors 'output' or 'init_segment' when using \
                     'segment_template'."
                        .to_string(),
                ));
            }
            Ok(())
        }
        _ => {
            if !stream.segment_template.is_empty() && stream.output.is_empty() {
                return Err(Error::InvalidArgument(
                    "Please specify 'init_segment'. All non-TS multi-segment content must \
                     provide an init segment."
                        .to_string(),
                ));
            }
            Ok(())
        }
    }
}

/// Validate the whole packaging request: the parameter block plus every
/// stream descriptor, including cross-descriptor consistency.
pub fn validate_params(
    packaging_params: &PackagingParams,
    stream_descriptors: &[StreamDescriptor],
) -> Result<()> {
    if !packaging_params.chunking_params.segment_sap_aligned
        && packaging_params.chunking_params.subsegment_sap_aligned
    {
        return Err(Error::InvalidArgument(
            "Setting segment_sap_aligned to false but subsegment_sap_aligned to true is not \
             allowed."
                .to_string(),
        ));
    }

    if stream_descriptors.is_empty() {
        return Err(Error::InvalidArgument(
            "Stream descriptors cannot be empty.".to_string(),
        ));
    }

    // The on-demand profile generates one file per stream while the live
    // profile generates segments from a template; they cannot mix.
    let on_demand_profile = stream_descriptors[0].segment_template.is_empty();
    for descriptor in stream_descriptors {
        if on_demand_profile != descriptor.segment_template.is_empty() {
            return Err(Error::InvalidArgument(
                "Inconsistent stream descriptor specification: segment_template should be \
                 specified for none or all stream descriptors."
                    .to_string(),
            ));
        }

        validate_stream_descriptor(
            packaging_params.test_params.dump_stream_info,
            descriptor,
        )?;

        if descriptor.input.starts_with("udp://") {
            let hls_params = &packaging_params.hls_params;
            if !hls_params.master_playlist_output.is_empty()
                && hls_params.playlist_type == HlsPlaylistType::Vod
            {
                warn!(
                    "Seeing UDP input with HLS playlist type set to VOD. The playlists will \
                     only be generated when the UDP socket is closed. For live packaging, the \
                     playlist type needs to be set to LIVE."
                );
            }
            // No matching check for DASH: the MPD defaults to dynamic when a
            // segment template is provided.
        }
    }

    if packaging_params.output_media_info && !on_demand_profile {
        return Err(Error::Unimplemented(
            "output_media_info is only supported for the on-demand profile (not using \
             segment_template)."
                .to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn on_demand_video() -> StreamDescriptor {
        StreamDescriptor::new("v.mp4", "video").with_output("out.mp4")
    }

    #[test]
    fn test_empty_descriptor_set_rejected() {
        let err = validate_params(&PackagingParams::default(), &[]).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_empty_input_rejected() {
        let stream = StreamDescriptor::new("", "video").with_output("out.mp4");
        assert!(validate_stream_descriptor(false, &stream).is_err());
    }

    #[test]
    fn test_no_output_allowed_only_when_dumping() {
        let stream = StreamDescriptor::new("v.mp4", "video");
        assert!(validate_stream_descriptor(true, &stream).is_ok());
        assert!(validate_stream_descriptor(false, &stream).is_err());
    }

    #[test]
    fn test_missing_stream_selector_rejected() {
        let stream = StreamDescriptor::new("v.mp4", "").with_output("out.mp4");
        assert!(validate_stream_descriptor(false, &stream).is_err());
    }

    #[test]
    fn test_ts_requires_segment_template() {
        let stream = StreamDescriptor::new("v.mp4", "video").with_output("out.ts");
        assert!(validate_stream_descriptor(false, &stream).is_err());
    }

    #[test]
    fn test_ts_with_init_segment_rejected() {
        let stream = StreamDescriptor::new("a.aac", "0")
            .with_output("init.ts")
            .with_segment_template("s_$Number$.ts");
        let err = validate_stream_descriptor(false, &stream).unwrap_err();
        let Error::InvalidArgument(message) = err else {
            panic!("expected InvalidArgument");
        };
        assert!(message.contains("self-initializing"));
    }

    #[test]
    fn test_ts_format_hint_with_output_rejected() {
        let stream = StreamDescriptor::new("v.mp4", "video")
            .with_output("init.bin")
            .with_segment_template("s_$Number$.bin")
            .with_output_format("mp2t");
        assert!(validate_stream_descriptor(false, &stream).is_err());
    }

    #[test]
    fn test_segmented_webvtt_with_init_segment_rejected() {
        let stream = StreamDescriptor::new("en.vtt", "text")
            .with_output("en.vtt")
            .with_segment_template("en_$Number$.vtt");
        assert!(validate_stream_descriptor(false, &stream).is_err());
    }

    #[test]
    fn test_segmented_mp4_requires_init_segment() {
        let stream =
            StreamDescriptor::new("v.mp4", "video").with_segment_template("s_$Number$.m4s");
        assert!(validate_stream_descriptor(false, &stream).is_err());

        let with_init = stream.with_output("init.mp4");
        assert!(validate_stream_descriptor(false, &with_init).is_ok());
    }

    #[test]
    fn test_templated_output_name_is_validated() {
        let stream = StreamDescriptor::new("v.mp4", "video").with_output("out_$Bogus$.mp4");
        assert!(validate_stream_descriptor(false, &stream).is_err());

        let ok = StreamDescriptor::new("v.mp4", "video").with_output("out_$Number$.mp4");
        assert!(validate_stream_descriptor(false, &ok).is_ok());
    }

    #[test]
    fn test_bad_segment_template_rejected() {
        let stream = StreamDescriptor::new("v.mp4", "video")
            .with_output("init.mp4")
            .with_segment_template("s_plain.m4s");
        assert!(validate_stream_descriptor(false, &stream).is_err());
    }

    #[test]
    fn test_mixed_profiles_rejected() {
        let streams = vec![
            on_demand_video(),
            StreamDescriptor::new("a.mp4", "audio")
                .with_output("a_init.mp4")
                .with_segment_template("a_$Number$.m4s"),
        ];
        let err = validate_params(&PackagingParams::default(), &streams).unwrap_err();
        let Error::InvalidArgument(message) = err else {
            panic!("expected InvalidArgument");
        };
        assert!(message.contains("Inconsistent"));
    }

    #[test]
    fn test_subsegment_alignment_requires_segment_alignment() {
        let mut params = PackagingParams::default();
        params.chunking_params.segment_sap_aligned = false;
        params.chunking_params.subsegment_sap_aligned = true;
        let err = validate_params(&params, &[on_demand_video()]).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_output_media_info_rejected_for_live_profile() {
        let mut params = PackagingParams::default();
        params.output_media_info = true;
        let streams = vec![StreamDescriptor::new("v.mp4", "video")
            .with_output("init.mp4")
            .with_segment_template("s_$Number$.m4s")];
        let err = validate_params(&params, &streams).unwrap_err();
        assert!(matches!(err, Error::Unimplemented(_)));
    }

    #[test]
    fn test_output_media_info_allowed_on_demand() {
        let mut params = PackagingParams::default();
        params.output_media_info = true;
        assert!(validate_params(&params, &[on_demand_video()]).is_ok());
    }
}
