//! Audio file tag reading.
//!
//! Uses the lofty crate for format-independent tag access across MP3, FLAC,
//! OGG, M4A, WAV and friends. Values are returned as written; splitting and
//! interpretation happen when songs are built, so the cache stores exactly
//! what the file said.

use lofty::file::{AudioFile, TaggedFileExt};
use lofty::probe::Probe;
use lofty::tag::{Accessor, ItemKey, Tag};
use std::path::Path;

use crate::error::{Error, Result};
use crate::extractor::{Credits, RawSong};
use crate::library::parse::parse_replay_gain;
use crate::model::Date;

/// Free-form keys taggers use for the MusicBrainz release type.
const RELEASE_TYPE_KEYS: [&str; 4] = [
    "RELEASETYPE",
    "MUSICBRAINZ_ALBUMTYPE",
    "MUSICBRAINZ ALBUM TYPE",
    "RELEASE TYPE",
];

/// Everything the deep tag stage can learn from a file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TagFields {
    pub duration_ms: Option<u64>,
    pub name: Option<String>,
    pub sort_name: Option<String>,
    pub musicbrainz_id: Option<String>,
    pub track: Option<u32>,
    pub disc: Option<u32>,
    pub date: Option<Date>,
    pub replay_gain_track: Option<f32>,
    pub replay_gain_album: Option<f32>,
    pub album_name: Option<String>,
    pub album_sort_name: Option<String>,
    pub album_musicbrainz_id: Option<String>,
    pub release_types: Credits,
    pub artist_names: Credits,
    pub artist_sort_names: Credits,
    pub artist_musicbrainz_ids: Credits,
    pub album_artist_names: Credits,
    pub album_artist_sort_names: Credits,
    pub album_artist_musicbrainz_ids: Credits,
    pub genre_names: Credits,
}

impl TagFields {
    /// Overlay these fields onto `raw`. Tags are authoritative: any value
    /// present here replaces what the media index guessed.
    pub fn apply(self, raw: &mut RawSong) {
        fn set<T>(slot: &mut Option<T>, value: Option<T>) {
            if value.is_some() {
                *slot = value;
            }
        }
        fn set_all(slot: &mut Credits, values: Credits) {
            if !values.is_empty() {
                *slot = values;
            }
        }

        set(&mut raw.duration_ms, self.duration_ms);
        set(&mut raw.name, self.name);
        set(&mut raw.sort_name, self.sort_name);
        set(&mut raw.musicbrainz_id, self.musicbrainz_id);
        set(&mut raw.track, self.track);
        set(&mut raw.disc, self.disc);
        set(&mut raw.date, self.date);
        set(&mut raw.replay_gain_track, self.replay_gain_track);
        set(&mut raw.replay_gain_album, self.replay_gain_album);
        set(&mut raw.album_name, self.album_name);
        set(&mut raw.album_sort_name, self.album_sort_name);
        set(&mut raw.album_musicbrainz_id, self.album_musicbrainz_id);
        set_all(&mut raw.release_types, self.release_types);
        set_all(&mut raw.artist_names, self.artist_names);
        set_all(&mut raw.artist_sort_names, self.artist_sort_names);
        set_all(&mut raw.artist_musicbrainz_ids, self.artist_musicbrainz_ids);
        set_all(&mut raw.album_artist_names, self.album_artist_names);
        set_all(&mut raw.album_artist_sort_names, self.album_artist_sort_names);
        set_all(
            &mut raw.album_artist_musicbrainz_ids,
            self.album_artist_musicbrainz_ids,
        );
        set_all(&mut raw.genre_names, self.genre_names);
    }
}

/// Reads tags from a file. Blocking; callers run it off the async executor.
pub trait TagReader: Send + Sync {
    fn read(&self, path: &Path) -> Result<TagFields>;
}

/// [`TagReader`] backed by lofty.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoftyReader;

impl TagReader for LoftyReader {
    fn read(&self, path: &Path) -> Result<TagFields> {
        read(path)
    }
}

/// Read every supported tag field from `path`.
pub fn read(path: &Path) -> Result<TagFields> {
    let tagged_file = Probe::open(path)
        .map_err(|e| Error::metadata(path, format!("failed to open file for probing: {e}")))?
        .read()
        .map_err(|e| Error::metadata(path, format!("failed to read file metadata: {e}")))?;

    let duration = tagged_file.properties().duration();
    let mut fields = TagFields {
        duration_ms: Some(duration.as_millis() as u64).filter(|ms| *ms > 0),
        ..Default::default()
    };

    // Get the primary tag, or fall back to the first available tag
    let Some(tag) = tagged_file
        .primary_tag()
        .or_else(|| tagged_file.first_tag())
    else {
        return Ok(fields);
    };

    fields.name = first(tag, &ItemKey::TrackTitle);
    fields.sort_name = first(tag, &ItemKey::TrackTitleSortOrder);
    fields.musicbrainz_id = first(tag, &ItemKey::MusicBrainzTrackId);
    fields.track = tag.track().filter(|t| *t > 0);
    fields.disc = tag.disk().filter(|d| *d > 0);
    fields.date = [
        ItemKey::OriginalReleaseDate,
        ItemKey::RecordingDate,
        ItemKey::ReleaseDate,
        ItemKey::Year,
    ]
    .iter()
    .find_map(|key| first(tag, key).as_deref().and_then(Date::parse));
    fields.replay_gain_track =
        first(tag, &ItemKey::ReplayGainTrackGain).and_then(|g| parse_replay_gain(&g));
    fields.replay_gain_album =
        first(tag, &ItemKey::ReplayGainAlbumGain).and_then(|g| parse_replay_gain(&g));

    fields.album_name = first(tag, &ItemKey::AlbumTitle);
    fields.album_sort_name = first(tag, &ItemKey::AlbumTitleSortOrder);
    fields.album_musicbrainz_id = first(tag, &ItemKey::MusicBrainzReleaseId);
    fields.release_types = release_types(tag);

    fields.artist_names = all(tag, &ItemKey::TrackArtist);
    fields.artist_sort_names = all(tag, &ItemKey::TrackArtistSortOrder);
    fields.artist_musicbrainz_ids = all(tag, &ItemKey::MusicBrainzArtistId);
    fields.album_artist_names = all(tag, &ItemKey::AlbumArtist);
    fields.album_artist_sort_names = all(tag, &ItemKey::AlbumArtistSortOrder);
    fields.album_artist_musicbrainz_ids = all(tag, &ItemKey::MusicBrainzReleaseArtistId);
    fields.genre_names = all(tag, &ItemKey::Genre);

    Ok(fields)
}

fn first(tag: &Tag, key: &ItemKey) -> Option<String> {
    tag.get_string(key)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn all(tag: &Tag, key: &ItemKey) -> Credits {
    tag.get_strings(key)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

fn release_types(tag: &Tag) -> Credits {
    tag.items()
        .filter(|item| match item.key() {
            ItemKey::Unknown(name) => RELEASE_TYPE_KEYS
                .iter()
                .any(|k| k.eq_ignore_ascii_case(name)),
            _ => false,
        })
        .filter_map(|item| item.value().text())
        .flat_map(|value| value.split(['/', ';']))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_read_non_audio_file_returns_error() {
        let mut file = NamedTempFile::new().expect("Failed to create temp file");
        writeln!(file, "This is just some text, not music.").expect("Failed to write to temp file");

        let result = read(file.path());
        assert!(matches!(result, Err(Error::Metadata { .. })));
    }

    #[test]
    fn test_read_non_existent_file_returns_error() {
        let result = LoftyReader.read(Path::new("non_existent_file.mp3"));
        assert!(result.is_err());
    }

    #[test]
    fn test_apply_overrides_only_present_fields() {
        let mut raw = RawSong {
            name: Some("From index".to_string()),
            album_name: Some("Index album".to_string()),
            artist_names: smallvec!["Index artist".to_string()],
            ..Default::default()
        };
        let fields = TagFields {
            name: Some("From tags".to_string()),
            track: Some(4),
            ..Default::default()
        };
        fields.apply(&mut raw);

        assert_eq!(raw.name.as_deref(), Some("From tags"));
        assert_eq!(raw.track, Some(4));
        assert_eq!(raw.album_name.as_deref(), Some("Index album"));
        assert_eq!(raw.artist_names.as_slice(), ["Index artist".to_string()]);
    }

    #[test]
    fn test_release_types_from_free_form_keys() {
        let mut tag = Tag::new(lofty::tag::TagType::VorbisComments);
        // Unmapped keys only survive an unchecked push, as they do when read from a file
        tag.push_unchecked(lofty::tag::TagItem::new(
            ItemKey::Unknown("RELEASETYPE".to_string()),
            lofty::tag::ItemValue::Text("album/live".to_string()),
        ));
        tag.push_unchecked(lofty::tag::TagItem::new(
            ItemKey::Unknown("COMMENT_X".to_string()),
            lofty::tag::ItemValue::Text("ignored".to_string()),
        ));
        assert_eq!(release_types(&tag).as_slice(), ["album".to_string(), "live".to_string()]);
    }

    #[test]
    fn test_first_and_all_trim_values() {
        let mut tag = Tag::new(lofty::tag::TagType::VorbisComments);
        tag.insert_text(ItemKey::TrackTitle, "  Title ".to_string());
        tag.push(lofty::tag::TagItem::new(
            ItemKey::Genre,
            lofty::tag::ItemValue::Text("Rock".to_string()),
        ));
        tag.push(lofty::tag::TagItem::new(
            ItemKey::Genre,
            lofty::tag::ItemValue::Text(" ".to_string()),
        ));
        assert_eq!(first(&tag, &ItemKey::TrackTitle).as_deref(), Some("Title"));
        assert_eq!(all(&tag, &ItemKey::Genre).as_slice(), ["Rock".to_string()]);
    }
}
