//! Song construction from extracted metadata.

use std::collections::HashSet;
use std::path::PathBuf;

use super::{Date, MusicKind, ReleaseType, Uid};
use crate::config::MusicSettings;
use crate::extractor::RawSong;
use crate::library::key::{RawAlbum, RawArtist, RawGenre};
use crate::library::parse::{parse_id3_genres, parse_multi_value, sort_name as derive_sort_name};

/// Replay gain adjustments in decibels.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ReplayGain {
    pub track: Option<f32>,
    pub album: Option<f32>,
}

/// A single audio file in the library.
///
/// Links to the song's album, artists and genres are filled in when the
/// library is built; until then [`Song::album`] is `None` and the other
/// link lists are empty.
#[derive(Debug, Clone, PartialEq)]
pub struct Song {
    pub uid: Uid,
    pub name: String,
    pub sort_name: String,
    pub path: PathBuf,
    pub mime_type: Option<String>,
    pub size: u64,
    pub duration_ms: u64,
    pub date_added: i64,
    pub date_modified: i64,
    pub track: Option<u32>,
    pub disc: Option<u32>,
    pub date: Option<Date>,
    pub replay_gain: ReplayGain,
    pub(crate) raw_album: RawAlbum,
    pub(crate) raw_artists: Vec<RawArtist>,
    pub(crate) raw_genres: Vec<RawGenre>,
    album: Option<Uid>,
    artists: Vec<Uid>,
    genres: Vec<Uid>,
}

impl Song {
    /// Build a song from a finished raw record. Returns `None` if the record
    /// has no path, which no stage should ever let through.
    pub fn new(raw: &RawSong, settings: &MusicSettings) -> Option<Self> {
        let path = raw.path.clone()?;
        let separators = settings.separators.as_str();

        let name = raw
            .name
            .clone()
            .or_else(|| {
                path.file_stem()
                    .map(|s| s.to_string_lossy().to_string())
            })
            .unwrap_or_default();
        let sort_name = raw
            .sort_name
            .clone()
            .unwrap_or_else(|| derive_sort_name(&name, settings.ignore_articles));

        let mut raw_artists = zip_artists(
            &parse_multi_value(&raw.artist_names, separators),
            &parse_multi_value(&raw.artist_sort_names, separators),
            &parse_multi_value(&raw.artist_musicbrainz_ids, separators),
            settings.ignore_articles,
        );
        if raw_artists.is_empty() {
            raw_artists.push(RawArtist::unknown());
        }
        let album_artists = zip_artists(
            &parse_multi_value(&raw.album_artist_names, separators),
            &parse_multi_value(&raw.album_artist_sort_names, separators),
            &parse_multi_value(&raw.album_artist_musicbrainz_ids, separators),
            settings.ignore_articles,
        );

        let album_name = raw
            .album_name
            .clone()
            .or_else(|| {
                path.parent()
                    .and_then(|p| p.file_name())
                    .map(|s| s.to_string_lossy().to_string())
            })
            .unwrap_or_default();
        let raw_album = RawAlbum {
            sort_name: Some(
                raw.album_sort_name
                    .clone()
                    .unwrap_or_else(|| derive_sort_name(&album_name, settings.ignore_articles)),
            ),
            name: album_name,
            musicbrainz_id: raw.album_musicbrainz_id.clone(),
            release_type: ReleaseType::parse(&parse_multi_value(&raw.release_types, separators)),
            artists: if album_artists.is_empty() {
                raw_artists.clone()
            } else {
                album_artists
            },
        };

        let mut seen = HashSet::new();
        let raw_genres: Vec<RawGenre> =
            parse_id3_genres(parse_multi_value(&raw.genre_names, separators))
                .into_iter()
                .map(|name| RawGenre { name: Some(name) })
                .filter(|genre| seen.insert(genre.key()))
                .collect();

        let uid = match &raw.musicbrainz_id {
            Some(id) => Uid::musicbrainz(MusicKind::Song, id),
            None => Uid::hashed(MusicKind::Song, |h| {
                h.str(&name)
                    .str(&raw_album.name)
                    .opt_str(raw_album.musicbrainz_id.as_deref())
                    .opt_num(raw.track)
                    .opt_num(raw.disc)
                    .opt_str(raw.date.map(|d| d.to_string()).as_deref());
                let artists: Vec<&str> =
                    raw_artists.iter().filter_map(|a| a.name.as_deref()).collect();
                let album_artists: Vec<&str> = raw_album
                    .artists
                    .iter()
                    .filter_map(|a| a.name.as_deref())
                    .collect();
                let genres: Vec<&str> = raw_genres.iter().filter_map(|g| g.name.as_deref()).collect();
                h.strs(&artists).strs(&album_artists).strs(&genres);
            }),
        };

        Some(Self {
            uid,
            name,
            sort_name,
            path,
            mime_type: raw.mime_type.clone(),
            size: raw.size.unwrap_or(0),
            duration_ms: raw.duration_ms.unwrap_or(0),
            date_added: raw.date_added.unwrap_or(0),
            date_modified: raw.date_modified.unwrap_or(0),
            track: raw.track,
            disc: raw.disc,
            date: raw.date,
            replay_gain: ReplayGain {
                track: raw.replay_gain_track,
                album: raw.replay_gain_album,
            },
            raw_artists,
            raw_genres: if raw_genres.is_empty() {
                vec![RawGenre { name: None }]
            } else {
                raw_genres
            },
            raw_album,
            album: None,
            artists: Vec::new(),
            genres: Vec::new(),
        })
    }

    /// The album this song belongs to. `None` only before grouping.
    pub fn album(&self) -> Option<&Uid> {
        self.album.as_ref()
    }

    pub fn artists(&self) -> &[Uid] {
        &self.artists
    }

    pub fn genres(&self) -> &[Uid] {
        &self.genres
    }

    pub(crate) fn link(&mut self, album: Uid, artists: Vec<Uid>, genres: Vec<Uid>) {
        self.album = Some(album);
        self.artists = artists;
        self.genres = genres;
    }
}

/// Pair up parallel name/sort/id lists into artist credits, dropping
/// duplicate credits of the same artist.
fn zip_artists(
    names: &[String],
    sort_names: &[String],
    musicbrainz_ids: &[String],
    ignore_articles: bool,
) -> Vec<RawArtist> {
    let mut seen = HashSet::new();
    names
        .iter()
        .enumerate()
        .map(|(i, name)| RawArtist {
            name: Some(name.clone()),
            sort_name: Some(
                sort_names
                    .get(i)
                    .cloned()
                    .unwrap_or_else(|| derive_sort_name(name, ignore_articles)),
            ),
            musicbrainz_id: musicbrainz_ids.get(i).cloned(),
        })
        .filter(|artist| seen.insert(artist.key()))
        .collect()
}
