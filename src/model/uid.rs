//! Stable identifiers for music items.
//!
//! A [`Uid`] is either derived from a MusicBrainz id embedded in the tags, or
//! from a SHA-256 digest of the fields that distinguish an item. Both forms
//! are pure functions of the extracted metadata, so an unchanged file set
//! yields identical identifiers on every load.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Which kind of music item a [`Uid`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MusicKind {
    Song,
    Album,
    Artist,
    Genre,
}

impl MusicKind {
    fn tag(self) -> &'static str {
        match self {
            MusicKind::Song => "song",
            MusicKind::Album => "album",
            MusicKind::Artist => "artist",
            MusicKind::Genre => "genre",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
enum UidSource {
    Hashed([u8; 16]),
    MusicBrainz(String),
}

/// Unique, load-stable identifier of a song, album, artist or genre.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Uid {
    kind: MusicKind,
    source: UidSource,
}

impl Uid {
    /// Build a digest-based identifier by feeding fields into a [`UidHasher`].
    pub fn hashed(kind: MusicKind, update: impl FnOnce(&mut UidHasher)) -> Self {
        let mut hasher = UidHasher::new(kind);
        update(&mut hasher);
        Self {
            kind,
            source: UidSource::Hashed(hasher.finish()),
        }
    }

    /// Build an identifier from a MusicBrainz id. Ids are compared lowercase.
    pub fn musicbrainz(kind: MusicKind, id: &str) -> Self {
        Self {
            kind,
            source: UidSource::MusicBrainz(id.trim().to_lowercase()),
        }
    }

    pub fn kind(&self) -> MusicKind {
        self.kind
    }

    pub fn is_musicbrainz(&self) -> bool {
        matches!(self.source, UidSource::MusicBrainz(_))
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            UidSource::Hashed(bytes) => {
                write!(f, "{}:", self.kind.tag())?;
                for b in bytes {
                    write!(f, "{:02x}", b)?;
                }
                Ok(())
            }
            UidSource::MusicBrainz(id) => write!(f, "{}:mb:{}", self.kind.tag(), id),
        }
    }
}

/// Accumulates fields into a [`Uid`] digest.
///
/// Every field is length-prefixed and every optional field records its
/// presence, so `("ab", "c")` and `("a", "bc")` never collide.
pub struct UidHasher {
    inner: Sha256,
}

impl UidHasher {
    fn new(kind: MusicKind) -> Self {
        let mut inner = Sha256::new();
        inner.update(kind.tag().as_bytes());
        Self { inner }
    }

    pub fn str(&mut self, value: &str) -> &mut Self {
        self.inner.update((value.len() as u64).to_le_bytes());
        self.inner.update(value.as_bytes());
        self
    }

    pub fn opt_str(&mut self, value: Option<&str>) -> &mut Self {
        match value {
            Some(v) => {
                self.inner.update([1u8]);
                self.str(v)
            }
            None => {
                self.inner.update([0u8]);
                self
            }
        }
    }

    pub fn strs<S: AsRef<str>>(&mut self, values: &[S]) -> &mut Self {
        self.inner.update((values.len() as u64).to_le_bytes());
        for v in values {
            self.str(v.as_ref());
        }
        self
    }

    pub fn opt_num(&mut self, value: Option<u32>) -> &mut Self {
        match value {
            Some(n) => {
                self.inner.update([1u8]);
                self.inner.update(n.to_le_bytes());
            }
            None => self.inner.update([0u8]),
        }
        self
    }

    fn finish(self) -> [u8; 16] {
        let digest = self.inner.finalize();
        let mut out = [0u8; 16];
        out.copy_from_slice(&digest[..16]);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hashed_uid_is_deterministic() {
        let a = Uid::hashed(MusicKind::Song, |h| {
            h.str("Title").opt_num(Some(3));
        });
        let b = Uid::hashed(MusicKind::Song, |h| {
            h.str("Title").opt_num(Some(3));
        });
        assert_eq!(a, b);
        assert!(!a.is_musicbrainz());
    }

    #[test]
    fn test_length_prefix_prevents_collisions() {
        let a = Uid::hashed(MusicKind::Album, |h| {
            h.str("ab").str("c");
        });
        let b = Uid::hashed(MusicKind::Album, |h| {
            h.str("a").str("bc");
        });
        assert_ne!(a, b);
    }

    #[test]
    fn test_kind_separates_identical_fields() {
        let artist = Uid::hashed(MusicKind::Artist, |h| {
            h.str("rock");
        });
        let genre = Uid::hashed(MusicKind::Genre, |h| {
            h.str("rock");
        });
        assert_ne!(artist, genre);
    }

    #[test]
    fn test_display_formats() {
        let mb = Uid::musicbrainz(MusicKind::Song, " ABC-123 ");
        assert_eq!(mb.to_string(), "song:mb:abc-123");

        let hashed = Uid::hashed(MusicKind::Genre, |h| {
            h.str("jazz");
        });
        let s = hashed.to_string();
        assert!(s.starts_with("genre:"));
        assert_eq!(s.len(), "genre:".len() + 32);
    }
}
