//! Domain records materialized from the media catalog.
//!
//! Every record is a plain snapshot of catalog state at query time. Fields
//! the catalog is allowed to leave null are `Option`; everything else is
//! required and its absence is a decode error, not a default.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! catalog_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                $name(value)
            }
        }
    };
}

catalog_id!(
    /// Catalog row identifier of an audio record.
    AudioId
);
catalog_id!(
    /// Catalog row identifier of an artist record.
    ArtistId
);
catalog_id!(
    /// Catalog row identifier of an album record.
    AlbumId
);
catalog_id!(
    /// Catalog row identifier of a genre record.
    GenreId
);
catalog_id!(
    /// Catalog row identifier of a playlist record.
    PlaylistId
);

/// One audio track as the catalog describes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Audio {
    pub id: AudioId,
    pub title: String,
    /// Absolute path of the backing file, owned by the catalog.
    pub path: String,
    pub mime_type: Option<String>,
    /// File size in bytes, when the catalog has scanned it.
    pub size: Option<i64>,
    pub date_added: i64,
    pub date_modified: i64,
    pub duration_ms: i64,
    pub artist: Option<String>,
    pub artist_id: Option<ArtistId>,
    pub album: Option<String>,
    pub album_id: Option<AlbumId>,
    pub album_artist: Option<String>,
    pub composer: Option<String>,
    pub genre: Option<String>,
    pub genre_id: Option<GenreId>,
    pub year: Option<i32>,
    pub bitrate: Option<i32>,
    pub track_number: Option<i32>,
    pub disc_number: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artist {
    pub id: ArtistId,
    pub name: String,
    pub track_count: i64,
    pub album_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Album {
    pub id: AlbumId,
    pub title: String,
    pub artist: Option<String>,
    pub artist_id: Option<ArtistId>,
    /// Most recent release year among the album's tracks.
    pub last_year: Option<i32>,
    pub track_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Genre {
    pub id: GenreId,
    pub name: String,
    /// Resolved per genre with a dedicated membership count query.
    pub track_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Playlist {
    pub id: PlaylistId,
    pub name: String,
    pub track_count: i64,
}

/// One playlist membership row, ordered by `play_order`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistEntry {
    pub audio_id: AudioId,
    pub play_order: i64,
}

/// Aggregate row counts across every catalog target, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StoreInspection {
    pub audio_count: i64,
    pub artist_count: i64,
    pub album_count: i64,
    /// Raw genre row count minus the catalog's implicit "no genre" bucket,
    /// clamped at zero.
    pub genre_count: i64,
    pub playlist_count: i64,
}
