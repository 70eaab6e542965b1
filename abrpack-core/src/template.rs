//! Segment template grammar.
//!
//! Segment templates follow the DASH `SegmentTemplate@media` grammar:
//! `$$` escapes a dollar sign, and `$RepresentationID$`, `$Number$`, `$Time$`
//! and `$Bandwidth$` substitute per-segment values. `Number`, `Time` and
//! `Bandwidth` accept a width format tag, e.g. `$Number%05d$`.

use crate::error::{Error, Result};

/// Validate a segment template string.
///
/// The template must contain an even number of `$` signs and exactly one of
/// `$Number$` or `$Time$`.
pub fn validate_segment_template(segment_template: &str) -> Result<()> {
    if segment_template.is_empty() {
        return Err(Error::InvalidArgument(
            "Segment template cannot be empty.".to_string(),
        ));
    }

    let splits: Vec<&str> = segment_template.split('$').collect();
    if splits.len() % 2 == 0 {
        return Err(Error::InvalidArgument(format!(
            "In segment template '{segment_template}', there should be an even number of '$'."
        )));
    }

    let mut has_number = false;
    let mut has_time = false;

    // Odd-indexed pieces sit between a pair of '$'.
    for piece in splits.iter().skip(1).step_by(2) {
        let format_split: Vec<&str> = piece.split('%').collect();
        if format_split.len() > 2 {
            return Err(Error::InvalidArgument(format!(
                "In segment template '{segment_template}', invalid identifier '${piece}$'."
            )));
        }

        let identifier = format_split[0];
        let format_tag = format_split.get(1).copied();

        if let Some(tag) = format_tag {
            validate_format_tag(segment_template, tag)?;
        }

        match identifier {
            "" => {
                // "$$" is an escape sequence; it takes no format tag.
                if format_tag.is_some() {
                    return Err(Error::InvalidArgument(format!(
                        "In segment template '{segment_template}', '$$' cannot have a format tag."
                    )));
                }
            }
            "Number" => has_number = true,
            "Time" => has_time = true,
            "RepresentationID" => {
                if format_tag.is_some() {
                    return Err(Error::InvalidArgument(format!(
                        "In segment template '{segment_template}', '$RepresentationID$' cannot \
                         have a format tag."
                    )));
                }
            }
            "Bandwidth" => {}
            _ => {
                return Err(Error::InvalidArgument(format!(
                    "In segment template '{segment_template}', '${identifier}$' is not a valid \
                     identifier."
                )));
            }
        }
    }

    if has_number && has_time {
        return Err(Error::InvalidArgument(format!(
            "In segment template '{segment_template}', $Number$ and $Time$ cannot co-exist."
        )));
    }
    if !has_number && !has_time {
        return Err(Error::InvalidArgument(format!(
            "Segment template '{segment_template}' must contain $Number$ or $Time$."
        )));
    }

    Ok(())
}

/// Format tags look like `%0[width]d`.
fn validate_format_tag(segment_template: &str, tag: &str) -> Result<()> {
    let ok = tag.len() >= 3
        && tag.starts_with('0')
        && tag.ends_with('d')
        && tag[1..tag.len() - 1].bytes().all(|b| b.is_ascii_digit());
    if !ok {
        return Err(Error::InvalidArgument(format!(
            "In segment template '{segment_template}', invalid format tag '%{tag}'. It should \
             be in the form of '%0[width]d'."
        )));
    }
    Ok(())
}

/// Fill a segment template for a concrete segment.
///
/// Unknown identifiers were already rejected by [`validate_segment_template`];
/// this substitutes values and honors width format tags.
pub fn apply_segment_template(
    segment_template: &str,
    number: u64,
    time: u64,
    representation_id: &str,
    bandwidth: u32,
) -> String {
    let splits: Vec<&str> = segment_template.split('$').collect();
    let mut out = String::with_capacity(segment_template.len());

    for (i, piece) in splits.iter().enumerate() {
        if i % 2 == 0 {
            out.push_str(piece);
            continue;
        }

        let (identifier, width) = match piece.split_once('%') {
            Some((id, tag)) => {
                let width = tag[1..tag.len().saturating_sub(1)].parse::<usize>().unwrap_or(0);
                (id, width)
            }
            None => (*piece, 0),
        };

        match identifier {
            "" => out.push('$'),
            "Number" => out.push_str(&format!("{number:0width$}")),
            "Time" => out.push_str(&format!("{time:0width$}")),
            "RepresentationID" => out.push_str(representation_id),
            "Bandwidth" => out.push_str(&format!("{bandwidth:0width$}")),
            _ => {}
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_templates() {
        assert!(validate_segment_template("s_$Number$.m4s").is_ok());
        assert!(validate_segment_template("s_$Time$.m4s").is_ok());
        assert!(validate_segment_template("$RepresentationID$_$Number$.ts").is_ok());
        assert!(validate_segment_template("s_$Number%05d$.m4s").is_ok());
        assert!(validate_segment_template("$Bandwidth$/$Number$.m4s").is_ok());
        assert!(validate_segment_template("100$$_$Number$.m4s").is_ok());
    }

    #[test]
    fn test_odd_dollar_count_rejected() {
        assert!(validate_segment_template("s_$Number.m4s").is_err());
    }

    #[test]
    fn test_unknown_identifier_rejected() {
        assert!(validate_segment_template("s_$Segment$.m4s").is_err());
    }

    #[test]
    fn test_number_and_time_cannot_coexist() {
        assert!(validate_segment_template("$Number$_$Time$.m4s").is_err());
    }

    #[test]
    fn test_number_or_time_required() {
        assert!(validate_segment_template("$RepresentationID$.m4s").is_err());
        assert!(validate_segment_template("plain.m4s").is_err());
    }

    #[test]
    fn test_bad_format_tags_rejected() {
        assert!(validate_segment_template("s_$Number%5d$.m4s").is_err());
        assert!(validate_segment_template("s_$Number%05x$.m4s").is_err());
        assert!(validate_segment_template("s_$RepresentationID%05d$_$Number$.m4s").is_err());
        assert!(validate_segment_template("s_$%05d$_$Number$.m4s").is_err());
    }

    #[test]
    fn test_apply_template() {
        assert_eq!(
            apply_segment_template("s_$Number$.m4s", 7, 0, "", 0),
            "s_7.m4s"
        );
        assert_eq!(
            apply_segment_template("s_$Number%05d$.m4s", 7, 0, "", 0),
            "s_00007.m4s"
        );
        assert_eq!(
            apply_segment_template("$RepresentationID$/$Time$.m4s", 0, 9000, "video_1", 0),
            "video_1/9000.m4s"
        );
        assert_eq!(
            apply_segment_template("100$$_$Number$.m4s", 1, 0, "", 0),
            "100$_1.m4s"
        );
    }
}
