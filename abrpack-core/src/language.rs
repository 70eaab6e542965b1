//! Language tag canonicalization.
//!
//! Stream descriptors accept BCP-47-style tags. Internally the packager
//! stores ISO-639-2 codes; manifests require the shortest form per RFC 5646.

/// Two-letter ISO-639-1 codes and their ISO-639-2/T equivalents.
///
/// Covers the languages commonly seen in packaging workflows; anything not
/// listed here (and not already a known three-letter code) maps to `"und"`.
const ISO_639_1_TO_2: &[(&str, &str)] = &[
    ("ar", "ara"),
    ("cs", "ces"),
    ("da", "dan"),
    ("de", "deu"),
    ("el", "ell"),
    ("en", "eng"),
    ("es", "spa"),
    ("fi", "fin"),
    ("fr", "fra"),
    ("he", "heb"),
    ("hi", "hin"),
    ("hu", "hun"),
    ("id", "ind"),
    ("it", "ita"),
    ("ja", "jpn"),
    ("ko", "kor"),
    ("nl", "nld"),
    ("no", "nor"),
    ("pl", "pol"),
    ("pt", "por"),
    ("ru", "rus"),
    ("sv", "swe"),
    ("th", "tha"),
    ("tr", "tur"),
    ("uk", "ukr"),
    ("vi", "vie"),
    ("zh", "zho"),
];

/// Bibliographic ISO-639-2/B codes that differ from the terminology code.
const ISO_639_2B_TO_2T: &[(&str, &str)] = &[
    ("cze", "ces"),
    ("dut", "nld"),
    ("fre", "fra"),
    ("ger", "deu"),
    ("gre", "ell"),
    ("chi", "zho"),
];

/// Map a language tag to its ISO-639-2/T code.
///
/// Region and variant subtags are dropped. Returns `"und"` when the primary
/// subtag is not recognized.
pub fn language_to_iso_639_2(language: &str) -> String {
    let primary = language
        .split(['-', '_'])
        .next()
        .unwrap_or("")
        .to_ascii_lowercase();

    match primary.len() {
        2 => ISO_639_1_TO_2
            .iter()
            .find(|(two, _)| *two == primary)
            .map(|(_, three)| (*three).to_string())
            .unwrap_or_else(|| "und".to_string()),
        3 => {
            if let Some((_, term)) = ISO_639_2B_TO_2T.iter().find(|(bib, _)| *bib == primary) {
                return (*term).to_string();
            }
            if ISO_639_1_TO_2.iter().any(|(_, three)| *three == primary) {
                return primary;
            }
            "und".to_string()
        }
        _ => "und".to_string(),
    }
}

/// Map a language tag to its shortest form, preserving any subtags.
///
/// `"eng"` becomes `"en"`; `"eng-US"` becomes `"en-US"`; tags already in
/// shortest form pass through unchanged.
pub fn language_to_shortest_form(language: &str) -> String {
    if language.is_empty() {
        return String::new();
    }

    let (primary, rest) = match language.split_once('-') {
        Some((p, r)) => (p, Some(r)),
        None => (language, None),
    };
    let lower = primary.to_ascii_lowercase();

    let short = ISO_639_1_TO_2
        .iter()
        .find(|(_, three)| *three == lower)
        .map(|(two, _)| (*two).to_string())
        .unwrap_or_else(|| primary.to_string());

    match rest {
        Some(rest) => format!("{short}-{rest}"),
        None => short,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iso_639_2_from_two_letter() {
        assert_eq!(language_to_iso_639_2("en"), "eng");
        assert_eq!(language_to_iso_639_2("fr"), "fra");
        assert_eq!(language_to_iso_639_2("EN"), "eng");
    }

    #[test]
    fn test_iso_639_2_drops_region() {
        assert_eq!(language_to_iso_639_2("en-US"), "eng");
        assert_eq!(language_to_iso_639_2("pt_BR"), "por");
    }

    #[test]
    fn test_iso_639_2_passthrough_three_letter() {
        assert_eq!(language_to_iso_639_2("eng"), "eng");
        assert_eq!(language_to_iso_639_2("jpn"), "jpn");
    }

    #[test]
    fn test_iso_639_2_bibliographic_to_terminology() {
        assert_eq!(language_to_iso_639_2("ger"), "deu");
        assert_eq!(language_to_iso_639_2("fre"), "fra");
    }

    #[test]
    fn test_iso_639_2_unknown() {
        assert_eq!(language_to_iso_639_2("zz"), "und");
        assert_eq!(language_to_iso_639_2("zzz"), "und");
        assert_eq!(language_to_iso_639_2("notalanguage"), "und");
    }

    #[test]
    fn test_shortest_form() {
        assert_eq!(language_to_shortest_form("eng"), "en");
        assert_eq!(language_to_shortest_form("en"), "en");
        assert_eq!(language_to_shortest_form("eng-US"), "en-US");
        assert_eq!(language_to_shortest_form(""), "");
    }
}
