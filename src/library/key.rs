//! Raw grouping keys.
//!
//! Songs are folded into albums, artists and genres purely by comparing
//! normalized names. [`normalize`] is the only place that decides whether two
//! credits refer to the same thing.

use crate::model::{MusicKind, ReleaseType, Uid};

/// Fold a name into its grouping form.
///
/// Lowercases, drops punctuation, and collapses runs of whitespace. Names
/// made entirely of punctuation (`!!!`) keep their punctuation so they do not
/// collapse into the empty key.
pub fn normalize(name: &str) -> String {
    let folded = collapse_whitespace(
        name.chars()
            .filter(|c| !c.is_ascii_punctuation() && !is_general_punctuation(*c))
            .flat_map(char::to_lowercase),
    );
    if folded.is_empty() {
        collapse_whitespace(name.chars().flat_map(char::to_lowercase))
    } else {
        folded
    }
}

fn is_general_punctuation(c: char) -> bool {
    // Typographic quotes, dashes and ellipses that taggers substitute freely.
    matches!(c, '\u{2010}'..='\u{2027}')
}

fn collapse_whitespace(chars: impl Iterator<Item = char>) -> String {
    let mut out = String::new();
    let mut pending_space = false;
    for c in chars {
        if c.is_whitespace() {
            pending_space = !out.is_empty();
        } else {
            if pending_space {
                out.push(' ');
                pending_space = false;
            }
            out.push(c);
        }
    }
    out
}

/// Grouping key of an artist credit. `None` is the unknown artist.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArtistKey(pub Option<String>);

/// Grouping key of a genre credit. `None` is the unknown genre.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GenreKey(pub Option<String>);

/// Grouping key of an album: its name plus the artists it is credited to,
/// so same-named albums by different artists stay apart.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AlbumKey {
    pub name: String,
    pub artists: Vec<ArtistKey>,
}

/// An artist credit as it appears on a song or album.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawArtist {
    pub name: Option<String>,
    pub sort_name: Option<String>,
    pub musicbrainz_id: Option<String>,
}

impl RawArtist {
    pub fn unknown() -> Self {
        Self {
            name: None,
            sort_name: None,
            musicbrainz_id: None,
        }
    }

    pub fn key(&self) -> ArtistKey {
        ArtistKey(self.name.as_deref().map(normalize))
    }

    /// Identifier for the artist grouping this credit opens.
    pub fn uid(&self) -> Uid {
        match &self.musicbrainz_id {
            Some(id) => Uid::musicbrainz(MusicKind::Artist, id),
            None => self.key_uid(),
        }
    }

    /// Identifier derived from the grouping key alone.
    pub fn key_uid(&self) -> Uid {
        let key = self.key();
        Uid::hashed(MusicKind::Artist, |h| {
            h.opt_str(key.0.as_deref());
        })
    }
}

/// An album credit as it appears on a song.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawAlbum {
    pub name: String,
    pub sort_name: Option<String>,
    pub musicbrainz_id: Option<String>,
    pub release_type: Option<ReleaseType>,
    /// Album artists, or the song artists when none are tagged.
    pub artists: Vec<RawArtist>,
}

impl RawAlbum {
    pub fn key(&self) -> AlbumKey {
        AlbumKey {
            name: normalize(&self.name),
            artists: self.artists.iter().map(RawArtist::key).collect(),
        }
    }

    pub fn uid(&self) -> Uid {
        match &self.musicbrainz_id {
            Some(id) => Uid::musicbrainz(MusicKind::Album, id),
            None => self.key_uid(),
        }
    }

    /// Identifier derived from the grouping key alone.
    pub fn key_uid(&self) -> Uid {
        let key = self.key();
        Uid::hashed(MusicKind::Album, |h| {
            h.str(&key.name);
            for artist in &key.artists {
                h.opt_str(artist.0.as_deref());
            }
        })
    }
}

/// A genre credit as it appears on a song.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawGenre {
    pub name: Option<String>,
}

impl RawGenre {
    pub fn key(&self) -> GenreKey {
        GenreKey(self.name.as_deref().map(normalize))
    }

    pub fn uid(&self) -> Uid {
        let key = self.key();
        Uid::hashed(MusicKind::Genre, |h| {
            h.opt_str(key.0.as_deref());
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artist(name: &str) -> RawArtist {
        RawArtist {
            name: Some(name.to_string()),
            sort_name: None,
            musicbrainz_id: None,
        }
    }

    #[test]
    fn test_normalize_case_whitespace_punctuation() {
        assert_eq!(normalize("  The   Beatles "), "the beatles");
        assert_eq!(normalize("AC/DC"), "acdc");
        assert_eq!(normalize("Guns N’ Roses"), normalize("Guns N' Roses"));
        assert_eq!(normalize("Sigur\tRós"), "sigur rós");
    }

    #[test]
    fn test_normalize_all_punctuation_keeps_name() {
        assert_eq!(normalize("!!!"), "!!!");
        assert_eq!(normalize("..."), "...");
    }

    #[test]
    fn test_artist_keys_merge_case_variants() {
        assert_eq!(artist("Radiohead").key(), artist("RADIOHEAD ").key());
        assert_eq!(artist("Radiohead").uid(), artist("radiohead").uid());
        assert_ne!(artist("Radiohead").key(), RawArtist::unknown().key());
    }

    #[test]
    fn test_album_key_includes_artists() {
        let a = RawAlbum {
            name: "Greatest Hits".to_string(),
            sort_name: None,
            musicbrainz_id: None,
            release_type: None,
            artists: vec![artist("Queen")],
        };
        let b = RawAlbum {
            artists: vec![artist("ABBA")],
            ..a.clone()
        };
        assert_ne!(a.key(), b.key());
        assert_ne!(a.uid(), b.uid());
    }

    #[test]
    fn test_musicbrainz_uid_wins() {
        let credit = RawArtist {
            musicbrainz_id: Some("a74b1b7f".to_string()),
            ..artist("Queen")
        };
        assert!(credit.uid().is_musicbrainz());
    }

    #[test]
    fn test_genre_key() {
        let rock = RawGenre {
            name: Some("Rock".to_string()),
        };
        let rock2 = RawGenre {
            name: Some(" rock".to_string()),
        };
        assert_eq!(rock.key(), rock2.key());
        assert_eq!(RawGenre { name: None }.key(), GenreKey(None));
    }
}
