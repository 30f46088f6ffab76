//! Catalog targets and the column projections requested from each.
//!
//! Projections are fixed at compile time; queries never ask for `*`. The
//! audio projection comes in two flavors because older catalogs do not carry
//! the direct genre link columns on audio rows.

/// Target identifiers understood by catalog stores.
pub mod targets {
    pub const AUDIO: &str = "audio";
    pub const ARTIST: &str = "artist";
    pub const ALBUM: &str = "album";
    pub const GENRE: &str = "genre";
    pub const PLAYLIST: &str = "playlist";
    /// Genre membership rows: which audio ids belong to a genre.
    pub const GENRE_MEMBERS: &str = "genre_member";
    /// Playlist membership rows: which audio ids belong to a playlist.
    pub const PLAYLIST_MEMBERS: &str = "playlist_member";
}

/// Full audio projection, for catalogs exposing the genre link columns.
pub const AUDIO: &[&str] = &[
    "id",
    "title",
    "path",
    "mime_type",
    "size",
    "date_added",
    "date_modified",
    "duration_ms",
    "artist",
    "artist_id",
    "album",
    "album_id",
    "album_artist",
    "composer",
    "genre",
    "genre_id",
    "year",
    "bitrate",
    "track_number",
    "disc_number",
];

/// Audio projection without the genre columns, for catalogs that resolve
/// genre membership through the membership target instead.
pub const AUDIO_COMPAT: &[&str] = &[
    "id",
    "title",
    "path",
    "mime_type",
    "size",
    "date_added",
    "date_modified",
    "duration_ms",
    "artist",
    "artist_id",
    "album",
    "album_id",
    "album_artist",
    "composer",
    "year",
    "bitrate",
    "track_number",
    "disc_number",
];

pub const ARTIST: &[&str] = &["id", "name", "track_count", "album_count"];

pub const ALBUM: &[&str] = &["id", "title", "artist", "artist_id", "last_year", "track_count"];

pub const GENRE: &[&str] = &["id", "name"];

pub const PLAYLIST: &[&str] = &["id", "name", "track_count"];

pub const PLAYLIST_MEMBER: &[&str] = &["audio_id", "play_order"];

pub const GENRE_MEMBER: &[&str] = &["audio_id"];

/// Minimal projection for identifier-only scans.
pub const ID_ONLY: &[&str] = &["id"];

/// Aggregate projection for row counting.
pub const COUNT: &[&str] = &["COUNT(*) AS total"];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compat_projection_drops_only_genre_columns() {
        assert!(AUDIO.contains(&"genre"));
        assert!(AUDIO.contains(&"genre_id"));
        assert!(!AUDIO_COMPAT.contains(&"genre"));
        assert!(!AUDIO_COMPAT.contains(&"genre_id"));
        assert_eq!(AUDIO.len(), AUDIO_COMPAT.len() + 2);
    }
}
