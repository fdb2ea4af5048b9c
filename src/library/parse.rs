//! Tag value parsing shared by the extractor stages and song construction.

/// Split a tag value on any of the given separator characters.
///
/// A backslash escapes the following character, so `AC\/DC` survives a `/`
/// separator. Values are trimmed and empty values dropped.
pub fn split_escaped(value: &str, separators: &str) -> Vec<String> {
    if separators.is_empty() {
        let trimmed = value.trim();
        return if trimmed.is_empty() {
            Vec::new()
        } else {
            vec![trimmed.to_string()]
        };
    }

    let mut out = Vec::new();
    let mut current = String::new();
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                current.push(next);
            }
        } else if separators.contains(c) {
            push_trimmed(&mut out, &current);
            current.clear();
        } else {
            current.push(c);
        }
    }
    push_trimmed(&mut out, &current);
    out
}

fn push_trimmed(out: &mut Vec<String>, value: &str) {
    let trimmed = value.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
}

/// Normalize a multi-valued tag.
///
/// Tags that already carry several values are only trimmed; a single value
/// is split with the user's separators.
pub fn parse_multi_value<S: AsRef<str>>(values: &[S], separators: &str) -> Vec<String> {
    match values {
        [] => Vec::new(),
        [single] => split_escaped(single.as_ref(), separators),
        many => many
            .iter()
            .map(|v| v.as_ref().trim())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .collect(),
    }
}

/// Parse a `n` or `n/total` position string.
pub fn parse_position(value: &str) -> Option<u32> {
    let head = value.split('/').next()?.trim();
    head.parse::<u32>().ok().filter(|n| *n > 0)
}

/// Decode the combined `disc * 1000 + track` number used by legacy media
/// indexes. Returns `(track, disc)`.
pub fn unpack_track_disc(packed: i64) -> (Option<u32>, Option<u32>) {
    if packed <= 0 {
        return (None, None);
    }
    let track = (packed % 1000) as u32;
    let disc = (packed / 1000) as u32;
    (
        Some(track).filter(|t| *t > 0),
        Some(disc).filter(|d| *d > 0),
    )
}

/// Parse a replay gain adjustment like `-6.42 dB`.
pub fn parse_replay_gain(value: &str) -> Option<f32> {
    let cleaned = value
        .trim()
        .trim_end_matches(|c: char| c.is_alphabetic() || c.is_whitespace());
    cleaned
        .trim_start_matches('+')
        .parse::<f32>()
        .ok()
        .filter(|g| g.is_finite() && *g != 0.0)
}

/// Derive a sort name, dropping a leading English article when asked.
pub fn sort_name(name: &str, ignore_articles: bool) -> String {
    let name = name.trim();
    if ignore_articles {
        let lower = name.to_lowercase();
        for article in ["the ", "an ", "a "] {
            if lower.starts_with(article) && name.len() > article.len() {
                return name[article.len()..].trim_start().to_string();
            }
        }
    }
    name.to_string()
}

/// Resolve ID3v1 numeric genre references into names.
///
/// Handles bare codes (`17`), parenthesized codes (`(17)`), refined codes
/// (`(17)Rock & Roll`, where the refinement wins), and the `RX`/`CR` markers.
pub fn parse_id3_genres(values: Vec<String>) -> Vec<String> {
    values
        .into_iter()
        .flat_map(|value| resolve_id3_genre(&value))
        .collect()
}

fn resolve_id3_genre(value: &str) -> Vec<String> {
    let value = value.trim();
    if let Some(name) = id3_genre_code(value) {
        return vec![name.to_string()];
    }

    if !value.starts_with('(') {
        return vec![value.to_string()];
    }

    let mut out = Vec::new();
    let mut rest = value;
    while let Some(stripped) = rest.strip_prefix('(') {
        let Some(end) = stripped.find(')') else {
            break;
        };
        // Anything in parentheses that is not a code is part of the name
        let Some(name) = id3_genre_code(&stripped[..end]) else {
            return vec![value.to_string()];
        };
        out.push(name.to_string());
        rest = &stripped[end + 1..];
    }

    let refinement = rest.trim();
    if !refinement.is_empty() {
        // A trailing refinement replaces the code it follows.
        out.pop();
        out.push(refinement.to_string());
    }
    if out.is_empty() {
        out.push(value.to_string());
    }
    out
}

fn id3_genre_code(code: &str) -> Option<&'static str> {
    match code {
        "RX" => return Some("Remix"),
        "CR" => return Some("Cover"),
        _ => {}
    }
    let index: usize = code.parse().ok()?;
    ID3_GENRES.get(index).copied()
}

/// The original ID3v1 genre table (codes 0-79).
const ID3_GENRES: [&str; 80] = [
    "Blues",
    "Classic rock",
    "Country",
    "Dance",
    "Disco",
    "Funk",
    "Grunge",
    "Hip-hop",
    "Jazz",
    "Metal",
    "New age",
    "Oldies",
    "Other",
    "Pop",
    "Rhythm and blues",
    "Rap",
    "Reggae",
    "Rock",
    "Techno",
    "Industrial",
    "Alternative",
    "Ska",
    "Death metal",
    "Pranks",
    "Soundtrack",
    "Euro-techno",
    "Ambient",
    "Trip-hop",
    "Vocal",
    "Jazz-funk",
    "Fusion",
    "Trance",
    "Classical",
    "Instrumental",
    "Acid",
    "House",
    "Game",
    "Sound clip",
    "Gospel",
    "Noise",
    "Alternative rock",
    "Bass",
    "Soul",
    "Punk",
    "Space",
    "Meditative",
    "Instrumental pop",
    "Instrumental rock",
    "Ethnic",
    "Gothic",
    "Darkwave",
    "Techno-industrial",
    "Electronic",
    "Pop-folk",
    "Eurodance",
    "Dream",
    "Southern rock",
    "Comedy",
    "Cult",
    "Gangsta",
    "Top 40",
    "Christian rap",
    "Pop/funk",
    "Jungle",
    "Native American",
    "Cabaret",
    "New wave",
    "Psychedelic",
    "Rave",
    "Showtunes",
    "Trailer",
    "Lo-fi",
    "Tribal",
    "Acid punk",
    "Acid jazz",
    "Polka",
    "Retro",
    "Musical",
    "Rock and roll",
    "Hard rock",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_escaped() {
        assert_eq!(split_escaped("A; B ;C", ";"), vec!["A", "B", "C"]);
        assert_eq!(split_escaped(r"AC\/DC/Queen", "/"), vec!["AC/DC", "Queen"]);
        assert_eq!(split_escaped("  Solo  ", ""), vec!["Solo"]);
        assert!(split_escaped("   ", ";").is_empty());
        assert_eq!(split_escaped("a;;b", ";"), vec!["a", "b"]);
    }

    #[test]
    fn test_parse_multi_value_keeps_native_lists() {
        let values = vec!["A;B".to_string(), " C ".to_string()];
        assert_eq!(parse_multi_value(&values, ";"), vec!["A;B", "C"]);
        assert_eq!(parse_multi_value(&["A;B"], ";"), vec!["A", "B"]);
        assert!(parse_multi_value::<&str>(&[], ";").is_empty());
    }

    #[test]
    fn test_positions() {
        assert_eq!(parse_position("3/12"), Some(3));
        assert_eq!(parse_position(" 7 "), Some(7));
        assert_eq!(parse_position("0"), None);
        assert_eq!(parse_position("x"), None);
        assert_eq!(unpack_track_disc(2005), (Some(5), Some(2)));
        assert_eq!(unpack_track_disc(7), (Some(7), None));
        assert_eq!(unpack_track_disc(0), (None, None));
    }

    #[test]
    fn test_replay_gain() {
        assert_eq!(parse_replay_gain("-6.42 dB"), Some(-6.42));
        assert_eq!(parse_replay_gain("+1.5 dB"), Some(1.5));
        assert_eq!(parse_replay_gain("0.00 dB"), None);
        assert_eq!(parse_replay_gain("loud"), None);
    }

    #[test]
    fn test_sort_name() {
        assert_eq!(sort_name("The Beatles", true), "Beatles");
        assert_eq!(sort_name("The Beatles", false), "The Beatles");
        assert_eq!(sort_name("A Tribe Called Quest", true), "Tribe Called Quest");
        assert_eq!(sort_name("Theory", true), "Theory");
        assert_eq!(sort_name("The", true), "The");
    }

    #[test]
    fn test_id3_genres() {
        let parsed = parse_id3_genres(vec![
            "17".to_string(),
            "(8)".to_string(),
            "(0)(RX)".to_string(),
            "(9)Nu Metal".to_string(),
            "Shoegaze".to_string(),
        ]);
        assert_eq!(
            parsed,
            vec!["Rock", "Jazz", "Blues", "Remix", "Nu Metal", "Shoegaze"]
        );
    }

    #[test]
    fn test_unknown_genre_code_passes_through() {
        assert_eq!(parse_id3_genres(vec!["(999)".to_string()]), vec!["(999)"]);
        assert_eq!(
            parse_id3_genres(vec!["(Live) Rock".to_string()]),
            vec!["(Live) Rock"]
        );
        assert_eq!(
            parse_id3_genres(vec!["(17)(Live)".to_string()]),
            vec!["(17)(Live)"]
        );
    }
}
