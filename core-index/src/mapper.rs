//! Pure decoders turning catalog rows into domain records.
//!
//! Decoders are null-tolerant where the record says a field is optional and
//! strict everywhere else: a missing or ill-typed required column fails the
//! row with [`IndexError::RowDecode`], and a failed row fails the whole
//! batch it belongs to.

use crate::error::{IndexError, Result};
use crate::models::{
    Album, AlbumId, Artist, ArtistId, Audio, AudioId, GenreId, Playlist, PlaylistEntry, PlaylistId,
};
use store_traits::StoreRow;

fn required_i64(row: &StoreRow, column: &str) -> Result<i64> {
    row.get(column)
        .and_then(|value| value.as_i64())
        .ok_or_else(|| IndexError::row_decode(column, "expected an integer value"))
}

fn required_text(row: &StoreRow, column: &str) -> Result<String> {
    row.get(column)
        .and_then(|value| value.as_string())
        .ok_or_else(|| IndexError::row_decode(column, "expected a text value"))
}

fn optional_i64(row: &StoreRow, column: &str) -> Option<i64> {
    row.get(column).and_then(|value| value.as_i64())
}

fn optional_i32(row: &StoreRow, column: &str) -> Option<i32> {
    // Out-of-range values decode to the unknown value, never wrap.
    optional_i64(row, column).and_then(|value| i32::try_from(value).ok())
}

fn optional_text(row: &StoreRow, column: &str) -> Option<String> {
    row.get(column).and_then(|value| value.as_string())
}

pub fn decode_audio(row: &StoreRow) -> Result<Audio> {
    Ok(Audio {
        id: AudioId(required_i64(row, "id")?),
        title: required_text(row, "title")?,
        path: required_text(row, "path")?,
        mime_type: optional_text(row, "mime_type"),
        size: optional_i64(row, "size"),
        date_added: required_i64(row, "date_added")?,
        date_modified: required_i64(row, "date_modified")?,
        duration_ms: required_i64(row, "duration_ms")?,
        artist: optional_text(row, "artist"),
        artist_id: optional_i64(row, "artist_id").map(ArtistId),
        album: optional_text(row, "album"),
        album_id: optional_i64(row, "album_id").map(AlbumId),
        album_artist: optional_text(row, "album_artist"),
        composer: optional_text(row, "composer"),
        genre: optional_text(row, "genre"),
        genre_id: optional_i64(row, "genre_id").map(GenreId),
        year: optional_i32(row, "year"),
        bitrate: optional_i32(row, "bitrate"),
        track_number: optional_i32(row, "track_number"),
        disc_number: optional_i32(row, "disc_number"),
    })
}

pub fn decode_artist(row: &StoreRow) -> Result<Artist> {
    Ok(Artist {
        id: ArtistId(required_i64(row, "id")?),
        name: required_text(row, "name")?,
        track_count: required_i64(row, "track_count")?,
        album_count: required_i64(row, "album_count")?,
    })
}

pub fn decode_album(row: &StoreRow) -> Result<Album> {
    Ok(Album {
        id: AlbumId(required_i64(row, "id")?),
        title: required_text(row, "title")?,
        artist: optional_text(row, "artist"),
        artist_id: optional_i64(row, "artist_id").map(ArtistId),
        last_year: optional_i32(row, "last_year"),
        track_count: required_i64(row, "track_count")?,
    })
}

/// Genres decode in two steps: the row carries only id and name, and the
/// track count is resolved afterwards with a membership count query.
pub fn decode_genre_row(row: &StoreRow) -> Result<(GenreId, String)> {
    Ok((
        GenreId(required_i64(row, "id")?),
        required_text(row, "name")?,
    ))
}

pub fn decode_playlist(row: &StoreRow) -> Result<Playlist> {
    Ok(Playlist {
        id: PlaylistId(required_i64(row, "id")?),
        name: required_text(row, "name")?,
        track_count: required_i64(row, "track_count")?,
    })
}

pub fn decode_playlist_entry(row: &StoreRow) -> Result<PlaylistEntry> {
    Ok(PlaylistEntry {
        audio_id: AudioId(required_i64(row, "audio_id")?),
        play_order: required_i64(row, "play_order")?,
    })
}

/// Decode a membership row down to the audio id it references.
pub fn decode_member_id(row: &StoreRow) -> Result<AudioId> {
    Ok(AudioId(required_i64(row, "audio_id")?))
}

pub fn decode_audio_id(row: &StoreRow) -> Result<AudioId> {
    Ok(AudioId(required_i64(row, "id")?))
}
