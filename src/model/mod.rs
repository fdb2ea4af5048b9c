//! Core data models for the music library.
//!
//! Defines the primary entities: [`Song`], [`Album`], [`Artist`] and
//! [`Genre`]. Songs are built from extracted metadata; the groupings are
//! built from songs by [`crate::library`]. Every entity is rebuilt from
//! scratch on each load and identified by a load-stable [`Uid`].

mod date;
mod release;
mod song;
mod uid;

pub use date::{Date, DateRange};
pub use release::{Refinement, ReleaseType};
pub use song::{ReplayGain, Song};
pub use uid::{MusicKind, Uid, UidHasher};

use crate::library::key::{AlbumKey, ArtistKey, GenreKey, RawArtist};

/// A group of songs sharing one album key.
#[derive(Debug, Clone, PartialEq)]
pub struct Album {
    pub uid: Uid,
    pub name: String,
    pub sort_name: String,
    pub release_type: ReleaseType,
    /// Span of the songs' dates, if any are dated
    pub dates: Option<DateRange>,
    pub duration_ms: u64,
    /// Earliest date any song on the album was added
    pub date_added: i64,
    /// Songs in disc/track order
    pub songs: Vec<Uid>,
    /// Credited album artists, filled when artists are built
    pub artists: Vec<Uid>,
    pub(crate) key: AlbumKey,
    pub(crate) raw_artists: Vec<RawArtist>,
}

/// An artist credited by songs, albums, or both.
#[derive(Debug, Clone, PartialEq)]
pub struct Artist {
    pub uid: Uid,
    /// `None` for the unknown artist
    pub name: Option<String>,
    pub sort_name: Option<String>,
    pub songs: Vec<Uid>,
    /// Albums crediting this artist as an album artist
    pub albums: Vec<Uid>,
    /// Albums this artist only appears on through song credits
    pub implicit_albums: Vec<Uid>,
    pub genres: Vec<Uid>,
    pub duration_ms: u64,
    pub(crate) key: ArtistKey,
}

/// A group of songs sharing one genre credit.
#[derive(Debug, Clone, PartialEq)]
pub struct Genre {
    pub uid: Uid,
    /// `None` for the unknown genre
    pub name: Option<String>,
    pub songs: Vec<Uid>,
    pub artists: Vec<Uid>,
    pub duration_ms: u64,
    pub(crate) key: GenreKey,
}
