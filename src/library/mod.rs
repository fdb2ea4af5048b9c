//! Library building.
//!
//! Folds a flat list of songs into albums, artists and genres. Grouping is
//! decided only by the normalized keys in [`key`]; identifiers are assigned
//! afterwards. Every function here is a pure function of its input, so the
//! same songs always produce the same library.

pub mod key;
pub mod parse;

use rayon::slice::ParallelSliceMut;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::model::{Album, Artist, DateRange, Genre, Song, Uid};
use key::{AlbumKey, ArtistKey, GenreKey, RawArtist, RawGenre};

/// An immutable snapshot of the whole music library.
///
/// A load produces a fresh `Library`; nothing ever mutates one after
/// [`Library::build`] returns.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Library {
    songs: Vec<Song>,
    albums: Vec<Album>,
    artists: Vec<Artist>,
    genres: Vec<Genre>,
    song_index: HashMap<Uid, usize>,
    album_index: HashMap<Uid, usize>,
    artist_index: HashMap<Uid, usize>,
    genre_index: HashMap<Uid, usize>,
}

impl Library {
    /// Sort and deduplicate `songs`, group them, and link everything up.
    pub fn build(songs: Vec<Song>) -> Self {
        let mut songs = sort_songs(songs);
        let mut albums = build_albums(&songs);
        let mut artists = build_artists(&songs, &albums);
        let mut genres = build_genres(&songs);

        let album_uids: HashMap<AlbumKey, Uid> = albums
            .iter()
            .map(|a| (a.key.clone(), a.uid.clone()))
            .collect();
        let artist_uids: HashMap<ArtistKey, Uid> = artists
            .iter()
            .map(|a| (a.key.clone(), a.uid.clone()))
            .collect();
        let genre_uids: HashMap<GenreKey, Uid> = genres
            .iter()
            .map(|g| (g.key.clone(), g.uid.clone()))
            .collect();

        for album in &mut albums {
            album.artists = resolve(&album.raw_artists, RawArtist::key, &artist_uids);
        }
        for song in &mut songs {
            let Some(album) = album_uids.get(&song.raw_album.key()).cloned() else {
                continue;
            };
            let artists = resolve(&song.raw_artists, RawArtist::key, &artist_uids);
            let genres = resolve(&song.raw_genres, RawGenre::key, &genre_uids);
            song.link(album, artists, genres);
        }

        let song_index = index_of(&songs, |s| &s.uid);
        for artist in &mut artists {
            artist.genres = unique(
                artist
                    .songs
                    .iter()
                    .filter_map(|uid| song_index.get(uid))
                    .flat_map(|i| songs[*i].genres().iter().cloned()),
            );
        }
        for genre in &mut genres {
            genre.artists = unique(
                genre
                    .songs
                    .iter()
                    .filter_map(|uid| song_index.get(uid))
                    .flat_map(|i| songs[*i].artists().iter().cloned()),
            );
        }

        Self {
            album_index: index_of(&albums, |a| &a.uid),
            artist_index: index_of(&artists, |a| &a.uid),
            genre_index: index_of(&genres, |g| &g.uid),
            song_index,
            songs,
            albums,
            artists,
            genres,
        }
    }

    pub fn songs(&self) -> &[Song] {
        &self.songs
    }

    pub fn albums(&self) -> &[Album] {
        &self.albums
    }

    pub fn artists(&self) -> &[Artist] {
        &self.artists
    }

    pub fn genres(&self) -> &[Genre] {
        &self.genres
    }

    pub fn song(&self, uid: &Uid) -> Option<&Song> {
        self.song_index.get(uid).map(|i| &self.songs[*i])
    }

    pub fn album(&self, uid: &Uid) -> Option<&Album> {
        self.album_index.get(uid).map(|i| &self.albums[*i])
    }

    pub fn artist(&self, uid: &Uid) -> Option<&Artist> {
        self.artist_index.get(uid).map(|i| &self.artists[*i])
    }

    pub fn genre(&self, uid: &Uid) -> Option<&Genre> {
        self.genre_index.get(uid).map(|i| &self.genres[*i])
    }

    pub fn is_empty(&self) -> bool {
        self.songs.is_empty()
    }
}

/// Sort songs by name and drop later songs with an already-seen identifier.
///
/// Identifiers digest every distinguishing field, so only true duplicates
/// collapse. Among duplicates the one with the smallest path survives.
pub fn sort_songs(mut songs: Vec<Song>) -> Vec<Song> {
    songs.par_sort_by_cached_key(|s| (s.sort_name.to_lowercase(), s.uid.clone(), s.path.clone()));
    let mut seen = HashSet::new();
    songs.retain(|s| seen.insert(s.uid.clone()));
    songs
}

/// Group songs by their normalized album key. One group is one album.
pub fn build_albums(songs: &[Song]) -> Vec<Album> {
    let mut groups: BTreeMap<AlbumKey, Vec<&Song>> = BTreeMap::new();
    for song in songs {
        groups.entry(song.raw_album.key()).or_default().push(song);
    }

    let mut taken = HashSet::new();
    let mut albums: Vec<Album> = groups
        .into_iter()
        .filter_map(|(key, mut members)| {
            // The first song in input order speaks for the whole album.
            let raw = members.first()?.raw_album.clone();
            members.sort_by(|a, b| compare_in_album(a, b));
            let uid = unique_uid(raw.uid(), || raw.key_uid(), &mut taken);
            Some(Album {
                uid,
                sort_name: raw.sort_name.clone().unwrap_or_else(|| raw.name.clone()),
                name: raw.name.clone(),
                release_type: raw.release_type.unwrap_or_default(),
                dates: DateRange::from_dates(members.iter().filter_map(|s| s.date)),
                duration_ms: members.iter().map(|s| s.duration_ms).sum(),
                date_added: members.iter().map(|s| s.date_added).min().unwrap_or(0),
                songs: members.iter().map(|s| s.uid.clone()).collect(),
                artists: Vec::new(),
                key,
                raw_artists: raw.artists,
            })
        })
        .collect();

    albums.sort_by(|a, b| compare_names(&a.sort_name, &b.sort_name).then_with(|| a.uid.cmp(&b.uid)));
    albums
}

/// Group song artist credits and album artist credits by normalized artist
/// key. A key seen through both kinds of credit yields one artist.
pub fn build_artists(songs: &[Song], albums: &[Album]) -> Vec<Artist> {
    struct Group<'a> {
        credit: &'a RawArtist,
        songs: Vec<&'a Song>,
        albums: Vec<&'a Album>,
    }

    let mut groups: BTreeMap<ArtistKey, Group<'_>> = BTreeMap::new();
    for song in songs {
        for credit in &song.raw_artists {
            groups
                .entry(credit.key())
                .or_insert_with(|| Group {
                    credit,
                    songs: Vec::new(),
                    albums: Vec::new(),
                })
                .songs
                .push(song);
        }
    }
    for album in albums {
        for credit in &album.raw_artists {
            groups
                .entry(credit.key())
                .or_insert_with(|| Group {
                    credit,
                    songs: Vec::new(),
                    albums: Vec::new(),
                })
                .albums
                .push(album);
        }
    }

    let album_uids: HashMap<&AlbumKey, &Uid> = albums.iter().map(|a| (&a.key, &a.uid)).collect();

    let mut taken = HashSet::new();
    let mut artists: Vec<Artist> = groups
        .into_iter()
        .map(|(key, group)| {
            let explicit: Vec<Uid> = group.albums.iter().map(|a| a.uid.clone()).collect();
            let implicit = unique(
                group
                    .songs
                    .iter()
                    .filter_map(|s| album_uids.get(&s.raw_album.key()).map(|u| (*u).clone()))
                    .filter(|uid| !explicit.contains(uid)),
            );
            Artist {
                uid: unique_uid(group.credit.uid(), || group.credit.key_uid(), &mut taken),
                name: group.credit.name.clone(),
                sort_name: group.credit.sort_name.clone(),
                songs: group.songs.iter().map(|s| s.uid.clone()).collect(),
                albums: explicit,
                implicit_albums: implicit,
                genres: Vec::new(),
                duration_ms: group.songs.iter().map(|s| s.duration_ms).sum(),
                key,
            }
        })
        .collect();

    artists.sort_by(|a, b| compare_optional_names(&a.sort_name, &b.sort_name).then_with(|| a.uid.cmp(&b.uid)));
    artists
}

/// Group songs by normalized genre key. A song credited to several genres
/// appears in each of them.
pub fn build_genres(songs: &[Song]) -> Vec<Genre> {
    let mut groups: BTreeMap<GenreKey, (&RawGenre, Vec<&Song>)> = BTreeMap::new();
    for song in songs {
        for credit in &song.raw_genres {
            groups
                .entry(credit.key())
                .or_insert_with(|| (credit, Vec::new()))
                .1
                .push(song);
        }
    }

    let mut genres: Vec<Genre> = groups
        .into_iter()
        .map(|(key, (credit, members))| Genre {
            uid: credit.uid(),
            name: credit.name.clone(),
            songs: members.iter().map(|s| s.uid.clone()).collect(),
            artists: Vec::new(),
            duration_ms: members.iter().map(|s| s.duration_ms).sum(),
            key,
        })
        .collect();

    genres.sort_by(|a, b| compare_optional_names(&a.name, &b.name).then_with(|| a.uid.cmp(&b.uid)));
    genres
}

fn compare_in_album(a: &Song, b: &Song) -> Ordering {
    a.disc
        .cmp(&b.disc)
        .then(a.track.cmp(&b.track))
        .then_with(|| compare_names(&a.sort_name, &b.sort_name))
        .then_with(|| a.uid.cmp(&b.uid))
}

fn compare_names(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase())
}

/// Named items first, then the unknown item.
fn compare_optional_names(a: &Option<String>, b: &Option<String>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => compare_names(a, b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Prefer `preferred`, unless another group already claimed it (two groups
/// can carry the same MusicBrainz id under differently spelled names).
fn unique_uid(preferred: Uid, fallback: impl FnOnce() -> Uid, taken: &mut HashSet<Uid>) -> Uid {
    let uid = if taken.contains(&preferred) {
        fallback()
    } else {
        preferred
    };
    taken.insert(uid.clone());
    uid
}

fn resolve<T, K: std::hash::Hash + Eq>(
    credits: &[T],
    key: impl Fn(&T) -> K,
    uids: &HashMap<K, Uid>,
) -> Vec<Uid> {
    unique(credits.iter().filter_map(|c| uids.get(&key(c)).cloned()))
}

fn unique(uids: impl Iterator<Item = Uid>) -> Vec<Uid> {
    let mut seen = HashSet::new();
    uids.filter(|uid| seen.insert(uid.clone())).collect()
}

fn index_of<T>(items: &[T], uid: impl Fn(&T) -> &Uid) -> HashMap<Uid, usize> {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| (uid(item).clone(), i))
        .collect()
}
