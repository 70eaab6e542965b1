//! Output format resolution.

use abrpack_core::container::{
    determine_container_from_file_name, determine_container_from_format_name, MediaContainer,
};
use abrpack_core::descriptor::StreamDescriptor;
use tracing::error;

/// Resolve the output container for a stream descriptor.
///
/// An explicit `output_format` wins. Otherwise the container is derived from
/// the `output` and `segment_template` file names; when both are present
/// they must agree. Returns [`MediaContainer::Unknown`] when nothing
/// determines a format or the signals conflict; the validator turns that
/// into an error.
pub fn resolve_output_format(descriptor: &StreamDescriptor) -> MediaContainer {
    if !descriptor.output_format.is_empty() {
        let format = determine_container_from_format_name(&descriptor.output_format);
        if format == MediaContainer::Unknown {
            error!(
                "Unable to determine output format from '{}'.",
                descriptor.output_format
            );
        }
        return format;
    }

    let format_from_output = if descriptor.output.is_empty() {
        None
    } else {
        let format = determine_container_from_file_name(&descriptor.output);
        if format == MediaContainer::Unknown {
            error!(
                "Unable to determine output format from '{}'.",
                descriptor.output
            );
        }
        Some(format)
    };
    let format_from_segment = if descriptor.segment_template.is_empty() {
        None
    } else {
        let format = determine_container_from_file_name(&descriptor.segment_template);
        if format == MediaContainer::Unknown {
            error!(
                "Unable to determine output format from '{}'.",
                descriptor.segment_template
            );
        }
        Some(format)
    };

    if let (Some(from_output), Some(from_segment)) = (format_from_output, format_from_segment) {
        if from_output != from_segment {
            error!(
                "Output format determined from '{}' differs from output format determined \
                 from '{}'.",
                descriptor.output, descriptor.segment_template
            );
            return MediaContainer::Unknown;
        }
    }

    format_from_output
        .or(format_from_segment)
        .unwrap_or(MediaContainer::Unknown)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_format_wins() {
        let descriptor = StreamDescriptor::new("in.mp4", "video")
            .with_output("out.whatever")
            .with_output_format("mp2t");
        assert_eq!(resolve_output_format(&descriptor), MediaContainer::Mpeg2Ts);
    }

    #[test]
    fn test_unknown_explicit_format() {
        let descriptor = StreamDescriptor::new("in.mp4", "video")
            .with_output("out.mp4")
            .with_output_format("bogus");
        assert_eq!(resolve_output_format(&descriptor), MediaContainer::Unknown);
    }

    #[test]
    fn test_format_from_output_extension() {
        let descriptor = StreamDescriptor::new("in.mp4", "video").with_output("out.mp4");
        assert_eq!(resolve_output_format(&descriptor), MediaContainer::Mp4);
    }

    #[test]
    fn test_format_from_segment_template() {
        let descriptor =
            StreamDescriptor::new("in.mp4", "video").with_segment_template("s_$Number$.ts");
        assert_eq!(resolve_output_format(&descriptor), MediaContainer::Mpeg2Ts);
    }

    #[test]
    fn test_conflicting_extensions_resolve_unknown() {
        let descriptor = StreamDescriptor::new("in.mp4", "video")
            .with_output("init.mp4")
            .with_segment_template("s_$Number$.ts");
        assert_eq!(resolve_output_format(&descriptor), MediaContainer::Unknown);
    }

    #[test]
    fn test_agreeing_extensions_resolve() {
        let descriptor = StreamDescriptor::new("in.mp4", "video")
            .with_output("init.mp4")
            .with_segment_template("s_$Number$.m4s");
        assert_eq!(resolve_output_format(&descriptor), MediaContainer::Mp4);
    }

    #[test]
    fn test_nothing_set_resolves_unknown() {
        let descriptor = StreamDescriptor::new("in.mp4", "video");
        assert_eq!(resolve_output_format(&descriptor), MediaContainer::Unknown);
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let descriptor = StreamDescriptor::new("in.mp4", "video")
            .with_output("init.mp4")
            .with_segment_template("s_$Number$.m4s");
        let first = resolve_output_format(&descriptor);
        for _ in 0..3 {
            assert_eq!(resolve_output_format(&descriptor), first);
        }
    }
}
