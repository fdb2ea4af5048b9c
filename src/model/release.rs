//! Album release types, following MusicBrainz primary/secondary types.

use serde::{Deserialize, Serialize};

/// Extra qualifier on a release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Refinement {
    #[default]
    None,
    Live,
    Remix,
}

/// The type of release an album is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReleaseType {
    Album(Refinement),
    Ep(Refinement),
    Single(Refinement),
    Compilation(Refinement),
    Soundtrack,
    Mix,
    Mixtape,
}

impl Default for ReleaseType {
    fn default() -> Self {
        ReleaseType::Album(Refinement::None)
    }
}

impl ReleaseType {
    /// Parse a list of release type values, primary type first.
    ///
    /// Unknown primary types are treated as secondary types of an album,
    /// since many taggers only write the secondary type.
    pub fn parse<S: AsRef<str>>(types: &[S]) -> Option<Self> {
        let primary = types.first()?.as_ref().trim().to_lowercase();
        let rest = &types[1..];
        Some(match primary.as_str() {
            "album" => parse_secondary(rest, ReleaseType::Album),
            "ep" => parse_secondary(rest, ReleaseType::Ep),
            "single" => parse_secondary(rest, ReleaseType::Single),
            _ => parse_secondary(types, ReleaseType::Album),
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            ReleaseType::Album(Refinement::Live) => "Live album",
            ReleaseType::Album(Refinement::Remix) => "Remix album",
            ReleaseType::Album(Refinement::None) => "Album",
            ReleaseType::Ep(Refinement::Live) => "Live EP",
            ReleaseType::Ep(Refinement::Remix) => "Remix EP",
            ReleaseType::Ep(Refinement::None) => "EP",
            ReleaseType::Single(Refinement::Live) => "Live single",
            ReleaseType::Single(Refinement::Remix) => "Remix single",
            ReleaseType::Single(Refinement::None) => "Single",
            ReleaseType::Compilation(Refinement::Live) => "Live compilation",
            ReleaseType::Compilation(Refinement::Remix) => "Remix compilation",
            ReleaseType::Compilation(Refinement::None) => "Compilation",
            ReleaseType::Soundtrack => "Soundtrack",
            ReleaseType::Mix => "DJ mix",
            ReleaseType::Mixtape => "Mixtape",
        }
    }
}

fn parse_secondary<S: AsRef<str>>(
    types: &[S],
    refined: impl FnOnce(Refinement) -> ReleaseType,
) -> ReleaseType {
    let secondary = types.first().map(|s| s.as_ref().trim().to_lowercase());
    match secondary.as_deref() {
        Some("compilation") => ReleaseType::Compilation(parse_refinement(types.get(1))),
        Some("soundtrack") => ReleaseType::Soundtrack,
        Some("dj-mix") => ReleaseType::Mix,
        Some("mixtape/street") | Some("mixtape") => ReleaseType::Mixtape,
        _ => refined(parse_refinement(types.first())),
    }
}

fn parse_refinement<S: AsRef<str>>(value: Option<&S>) -> Refinement {
    match value.map(|s| s.as_ref().trim().to_lowercase()).as_deref() {
        Some("live") => Refinement::Live,
        Some("remix") => Refinement::Remix,
        _ => Refinement::None,
    }
}
