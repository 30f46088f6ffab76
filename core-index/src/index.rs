//! The media index facade.
//!
//! [`MediaIndex`] composes the query engine, decoders, and change watcher
//! into the read API consumers actually use. Every call re-queries the
//! catalog; nothing is cached here, so results always reflect the catalog's
//! current state.

use crate::engine::{PagingStrategy, QueryEngine, QuerySpec};
use crate::error::{IndexError, Result};
use crate::mapper;
use crate::models::{
    Album, AlbumId, Artist, ArtistId, Audio, AudioId, Genre, GenreId, Playlist, PlaylistEntry,
    PlaylistId, StoreInspection,
};
use crate::projection::{self, targets};
use crate::watcher::{ChangeWatcher, TickStream};
use futures::{Stream, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use store_traits::{ContentStore, StoreCapabilities, StoreValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AudioOrder {
    #[default]
    Title,
    DateAdded,
    DateModified,
    Duration,
    Year,
    TrackNumber,
}

impl AudioOrder {
    fn column(self) -> &'static str {
        match self {
            AudioOrder::Title => "title COLLATE NOCASE",
            AudioOrder::DateAdded => "date_added",
            AudioOrder::DateModified => "date_modified",
            AudioOrder::Duration => "duration_ms",
            AudioOrder::Year => "year",
            AudioOrder::TrackNumber => "track_number",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArtistOrder {
    #[default]
    Name,
    TrackCount,
    AlbumCount,
}

impl ArtistOrder {
    fn column(self) -> &'static str {
        match self {
            ArtistOrder::Name => "name COLLATE NOCASE",
            ArtistOrder::TrackCount => "track_count",
            ArtistOrder::AlbumCount => "album_count",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AlbumOrder {
    #[default]
    Title,
    Year,
    TrackCount,
}

impl AlbumOrder {
    fn column(self) -> &'static str {
        match self {
            AlbumOrder::Title => "title COLLATE NOCASE",
            AlbumOrder::Year => "last_year",
            AlbumOrder::TrackCount => "track_count",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GenreOrder {
    #[default]
    Name,
}

impl GenreOrder {
    fn column(self) -> &'static str {
        match self {
            GenreOrder::Name => "name COLLATE NOCASE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaylistOrder {
    #[default]
    Name,
}

impl PlaylistOrder {
    fn column(self) -> &'static str {
        match self {
            PlaylistOrder::Name => "name COLLATE NOCASE",
        }
    }
}

/// Read-only view over a media catalog.
#[derive(Clone)]
pub struct MediaIndex {
    engine: QueryEngine,
    watcher: ChangeWatcher,
    capabilities: StoreCapabilities,
}

impl MediaIndex {
    /// Open an index over a store, probing its capabilities once. The paging
    /// strategy and genre-resolution path are fixed here for the lifetime of
    /// the index.
    pub async fn open(store: Arc<dyn ContentStore>) -> Result<Self> {
        let capabilities = store
            .capabilities()
            .await
            .map_err(|err| IndexError::store_unavailable("catalog", &err))?;
        let strategy = PagingStrategy::for_capabilities(capabilities);
        tracing::info!(
            ?strategy,
            genre_link_column = capabilities.genre_link_column,
            "media index opened"
        );
        Ok(MediaIndex {
            engine: QueryEngine::new(store.clone(), strategy),
            watcher: ChangeWatcher::new(store),
            capabilities,
        })
    }

    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.engine = self.engine.with_timeout(timeout);
        self
    }

    fn audio_projection(&self) -> &'static [&'static str] {
        if self.capabilities.genre_link_column {
            projection::AUDIO
        } else {
            projection::AUDIO_COMPAT
        }
    }

    // --- audio ---

    pub async fn audios(&self, order: AudioOrder, ascending: bool) -> Result<Vec<Audio>> {
        let spec = QuerySpec::new(targets::AUDIO, self.audio_projection())
            .order(order.column(), ascending);
        self.engine.execute_decoded(spec, mapper::decode_audio).await
    }

    /// Search audios by a case-insensitive substring of the title. `None` or
    /// an empty query matches everything.
    pub async fn find_audios(
        &self,
        query: Option<&str>,
        order: AudioOrder,
        ascending: bool,
        offset: i64,
        limit: Option<i64>,
    ) -> Result<Vec<Audio>> {
        let mut spec = QuerySpec::new(targets::AUDIO, self.audio_projection())
            .order(order.column(), ascending)
            .offset(offset);
        if let Some(limit) = limit {
            spec = spec.limit(limit);
        }
        if let Some((clause, args)) = audio_search(query) {
            spec = spec.selection(clause, args);
        }
        self.engine.execute_decoded(spec, mapper::decode_audio).await
    }

    pub async fn audio_by_id(&self, id: AudioId) -> Result<Audio> {
        let spec = QuerySpec::new(targets::AUDIO, self.audio_projection())
            .selection("id = ?", vec![StoreValue::Integer(id.0)]);
        match self.engine.fetch_one(spec).await? {
            Some(row) => mapper::decode_audio(&row),
            None => Err(IndexError::not_found("audio", id.to_string())),
        }
    }

    pub async fn audios_by_album(
        &self,
        album: AlbumId,
        order: AudioOrder,
        ascending: bool,
    ) -> Result<Vec<Audio>> {
        let spec = QuerySpec::new(targets::AUDIO, self.audio_projection())
            .selection("album_id = ?", vec![StoreValue::Integer(album.0)])
            .order(order.column(), ascending);
        self.engine.execute_decoded(spec, mapper::decode_audio).await
    }

    pub async fn audios_by_artist(
        &self,
        artist: ArtistId,
        order: AudioOrder,
        ascending: bool,
    ) -> Result<Vec<Audio>> {
        let spec = QuerySpec::new(targets::AUDIO, self.audio_projection())
            .selection("artist_id = ?", vec![StoreValue::Integer(artist.0)])
            .order(order.column(), ascending);
        self.engine.execute_decoded(spec, mapper::decode_audio).await
    }

    /// Ids of the most recently added audios, newest first.
    pub async fn most_recent_audio_ids(&self, limit: i64) -> Result<Vec<AudioId>> {
        let spec = QuerySpec::new(targets::AUDIO, projection::ID_ONLY)
            .order("date_added", false)
            .limit(limit);
        self.engine
            .execute_decoded(spec, mapper::decode_audio_id)
            .await
    }

    // --- artist ---

    pub async fn artists(&self, order: ArtistOrder, ascending: bool) -> Result<Vec<Artist>> {
        let spec =
            QuerySpec::new(targets::ARTIST, projection::ARTIST).order(order.column(), ascending);
        self.engine.execute_decoded(spec, mapper::decode_artist).await
    }

    /// Search artists by a substring of the name. `None` or an empty query
    /// matches everything.
    pub async fn find_artists(
        &self,
        query: Option<&str>,
        order: ArtistOrder,
        ascending: bool,
        offset: i64,
        limit: Option<i64>,
    ) -> Result<Vec<Artist>> {
        let mut spec = QuerySpec::new(targets::ARTIST, projection::ARTIST)
            .order(order.column(), ascending)
            .offset(offset);
        if let Some(limit) = limit {
            spec = spec.limit(limit);
        }
        if let Some(query) = query.filter(|q| !q.is_empty()) {
            spec = spec.selection("name LIKE ?", vec![StoreValue::Text(like_arg(query))]);
        }
        self.engine.execute_decoded(spec, mapper::decode_artist).await
    }

    pub async fn artist_by_id(&self, id: ArtistId) -> Result<Artist> {
        let spec = QuerySpec::new(targets::ARTIST, projection::ARTIST)
            .selection("id = ?", vec![StoreValue::Integer(id.0)]);
        match self.engine.fetch_one(spec).await? {
            Some(row) => mapper::decode_artist(&row),
            None => Err(IndexError::not_found("artist", id.to_string())),
        }
    }

    // --- album ---

    pub async fn albums(&self, order: AlbumOrder, ascending: bool) -> Result<Vec<Album>> {
        let spec =
            QuerySpec::new(targets::ALBUM, projection::ALBUM).order(order.column(), ascending);
        self.engine.execute_decoded(spec, mapper::decode_album).await
    }

    /// Search albums by a substring of the title. `None` or an empty query
    /// matches everything.
    pub async fn find_albums(
        &self,
        query: Option<&str>,
        order: AlbumOrder,
        ascending: bool,
        offset: i64,
        limit: Option<i64>,
    ) -> Result<Vec<Album>> {
        let mut spec = QuerySpec::new(targets::ALBUM, projection::ALBUM)
            .order(order.column(), ascending)
            .offset(offset);
        if let Some(limit) = limit {
            spec = spec.limit(limit);
        }
        if let Some(query) = query.filter(|q| !q.is_empty()) {
            spec = spec.selection("title LIKE ?", vec![StoreValue::Text(like_arg(query))]);
        }
        self.engine.execute_decoded(spec, mapper::decode_album).await
    }

    pub async fn album_by_id(&self, id: AlbumId) -> Result<Album> {
        let spec = QuerySpec::new(targets::ALBUM, projection::ALBUM)
            .selection("id = ?", vec![StoreValue::Integer(id.0)]);
        match self.engine.fetch_one(spec).await? {
            Some(row) => mapper::decode_album(&row),
            None => Err(IndexError::not_found("album", id.to_string())),
        }
    }

    pub async fn albums_by_artist(
        &self,
        artist: ArtistId,
        order: AlbumOrder,
        ascending: bool,
    ) -> Result<Vec<Album>> {
        let spec = QuerySpec::new(targets::ALBUM, projection::ALBUM)
            .selection("artist_id = ?", vec![StoreValue::Integer(artist.0)])
            .order(order.column(), ascending);
        self.engine.execute_decoded(spec, mapper::decode_album).await
    }

    // --- genre ---

    /// All genres with their membership counts.
    ///
    /// One count query runs per genre row, matching the catalog clients this
    /// replaces. TODO: batch into a single grouped count query.
    pub async fn genres(&self, order: GenreOrder, ascending: bool) -> Result<Vec<Genre>> {
        let spec =
            QuerySpec::new(targets::GENRE, projection::GENRE).order(order.column(), ascending);
        let rows = self
            .engine
            .execute_decoded(spec, mapper::decode_genre_row)
            .await?;
        let mut genres = Vec::with_capacity(rows.len());
        for (id, name) in rows {
            let track_count = self.genre_audio_count(id).await?;
            genres.push(Genre {
                id,
                name,
                track_count,
            });
        }
        Ok(genres)
    }

    /// Search genres by a substring of the name, with membership counts.
    pub async fn find_genres(
        &self,
        query: Option<&str>,
        order: GenreOrder,
        ascending: bool,
        offset: i64,
        limit: Option<i64>,
    ) -> Result<Vec<Genre>> {
        let mut spec = QuerySpec::new(targets::GENRE, projection::GENRE)
            .order(order.column(), ascending)
            .offset(offset);
        if let Some(limit) = limit {
            spec = spec.limit(limit);
        }
        if let Some(query) = query.filter(|q| !q.is_empty()) {
            spec = spec.selection("name LIKE ?", vec![StoreValue::Text(like_arg(query))]);
        }
        let rows = self
            .engine
            .execute_decoded(spec, mapper::decode_genre_row)
            .await?;
        let mut genres = Vec::with_capacity(rows.len());
        for (id, name) in rows {
            let track_count = self.genre_audio_count(id).await?;
            genres.push(Genre {
                id,
                name,
                track_count,
            });
        }
        Ok(genres)
    }

    pub async fn genre_by_id(&self, id: GenreId) -> Result<Genre> {
        let spec = QuerySpec::new(targets::GENRE, projection::GENRE)
            .selection("id = ?", vec![StoreValue::Integer(id.0)]);
        match self.engine.fetch_one(spec).await? {
            Some(row) => {
                let (id, name) = mapper::decode_genre_row(&row)?;
                let track_count = self.genre_audio_count(id).await?;
                Ok(Genre {
                    id,
                    name,
                    track_count,
                })
            }
            None => Err(IndexError::not_found("genre", id.to_string())),
        }
    }

    pub async fn genre_by_name(&self, name: &str) -> Result<Genre> {
        let spec = QuerySpec::new(targets::GENRE, projection::GENRE)
            .selection("name = ?", vec![StoreValue::Text(name.to_string())]);
        match self.engine.fetch_one(spec).await? {
            Some(row) => {
                let (id, genre_name) = mapper::decode_genre_row(&row)?;
                let track_count = self.genre_audio_count(id).await?;
                Ok(Genre {
                    id,
                    name: genre_name,
                    track_count,
                })
            }
            None => Err(IndexError::not_found("genre", name.to_string())),
        }
    }

    /// Number of audios belonging to a genre.
    pub async fn genre_audio_count(&self, genre: GenreId) -> Result<i64> {
        if self.capabilities.genre_link_column {
            self.engine
                .count(
                    targets::AUDIO,
                    Some("genre_id = ?".to_string()),
                    vec![StoreValue::Integer(genre.0)],
                )
                .await
        } else {
            self.engine
                .count(
                    targets::GENRE_MEMBERS,
                    Some("genre_id = ?".to_string()),
                    vec![StoreValue::Integer(genre.0)],
                )
                .await
        }
    }

    /// Audios belonging to a genre.
    ///
    /// Catalogs with the genre link column resolve this with one query.
    /// Without it, membership ids are fetched first and the audio rows are
    /// resolved in a second hop; an empty member set short-circuits before
    /// the second query.
    pub async fn audios_in_genre(
        &self,
        genre: GenreId,
        query: Option<&str>,
        order: AudioOrder,
        ascending: bool,
    ) -> Result<Vec<Audio>> {
        let search = audio_search(query);

        if self.capabilities.genre_link_column {
            let mut clause = "genre_id = ?".to_string();
            let mut args = vec![StoreValue::Integer(genre.0)];
            if let Some((search_clause, search_args)) = search {
                clause.push_str(" AND ");
                clause.push_str(&search_clause);
                args.extend(search_args);
            }
            let spec = QuerySpec::new(targets::AUDIO, self.audio_projection())
                .selection(clause, args)
                .order(order.column(), ascending);
            return self.engine.execute_decoded(spec, mapper::decode_audio).await;
        }

        let member_spec = QuerySpec::new(targets::GENRE_MEMBERS, projection::GENRE_MEMBER)
            .selection("genre_id = ?", vec![StoreValue::Integer(genre.0)]);
        let member_ids = self
            .engine
            .execute_decoded(member_spec, mapper::decode_member_id)
            .await?;
        if member_ids.is_empty() {
            return Ok(Vec::new());
        }

        // One bound placeholder per member id. SQLite caps bound parameters
        // (999 on older builds), so a genre past that fails loudly as
        // StoreUnavailable rather than truncating.
        let mut clause = format!("id IN ({})", placeholders(member_ids.len()));
        let mut args: Vec<StoreValue> = member_ids
            .into_iter()
            .map(|id| StoreValue::Integer(id.0))
            .collect();
        if let Some((search_clause, search_args)) = search {
            clause.push_str(" AND ");
            clause.push_str(&search_clause);
            args.extend(search_args);
        }
        let spec = QuerySpec::new(targets::AUDIO, self.audio_projection())
            .selection(clause, args)
            .order(order.column(), ascending);
        self.engine.execute_decoded(spec, mapper::decode_audio).await
    }

    pub async fn audios_in_genre_named(
        &self,
        name: &str,
        query: Option<&str>,
        order: AudioOrder,
        ascending: bool,
    ) -> Result<Vec<Audio>> {
        let genre = self.genre_by_name(name).await?;
        self.audios_in_genre(genre.id, query, order, ascending).await
    }

    // --- playlist ---

    pub async fn playlists(&self, order: PlaylistOrder, ascending: bool) -> Result<Vec<Playlist>> {
        let spec = QuerySpec::new(targets::PLAYLIST, projection::PLAYLIST)
            .order(order.column(), ascending);
        self.engine
            .execute_decoded(spec, mapper::decode_playlist)
            .await
    }

    /// Search playlists by a substring of the name. `None` or an empty query
    /// matches everything.
    pub async fn find_playlists(
        &self,
        query: Option<&str>,
        order: PlaylistOrder,
        ascending: bool,
        offset: i64,
        limit: Option<i64>,
    ) -> Result<Vec<Playlist>> {
        let mut spec = QuerySpec::new(targets::PLAYLIST, projection::PLAYLIST)
            .order(order.column(), ascending)
            .offset(offset);
        if let Some(limit) = limit {
            spec = spec.limit(limit);
        }
        if let Some(query) = query.filter(|q| !q.is_empty()) {
            spec = spec.selection("name LIKE ?", vec![StoreValue::Text(like_arg(query))]);
        }
        self.engine
            .execute_decoded(spec, mapper::decode_playlist)
            .await
    }

    pub async fn playlist_by_id(&self, id: PlaylistId) -> Result<Playlist> {
        let spec = QuerySpec::new(targets::PLAYLIST, projection::PLAYLIST)
            .selection("id = ?", vec![StoreValue::Integer(id.0)]);
        match self.engine.fetch_one(spec).await? {
            Some(row) => mapper::decode_playlist(&row),
            None => Err(IndexError::not_found("playlist", id.to_string())),
        }
    }

    /// Membership rows of a playlist, in play order.
    pub async fn playlist_entries(&self, playlist: PlaylistId) -> Result<Vec<PlaylistEntry>> {
        let spec = QuerySpec::new(targets::PLAYLIST_MEMBERS, projection::PLAYLIST_MEMBER)
            .selection("playlist_id = ?", vec![StoreValue::Integer(playlist.0)])
            .order("play_order", true);
        self.engine
            .execute_decoded(spec, mapper::decode_playlist_entry)
            .await
    }

    // --- diagnostics ---

    /// Row counts across every target. The genre count excludes the
    /// catalog's implicit "no genre" bucket, clamped at zero for catalogs
    /// that lack the bucket row.
    pub async fn inspect_store(&self) -> Result<StoreInspection> {
        let raw_genre_count = self.engine.count(targets::GENRE, None, Vec::new()).await?;
        Ok(StoreInspection {
            audio_count: self.engine.count(targets::AUDIO, None, Vec::new()).await?,
            artist_count: self.engine.count(targets::ARTIST, None, Vec::new()).await?,
            album_count: self.engine.count(targets::ALBUM, None, Vec::new()).await?,
            genre_count: (raw_genre_count - 1).max(0),
            playlist_count: self
                .engine
                .count(targets::PLAYLIST, None, Vec::new())
                .await?,
        })
    }

    // --- change observation ---

    /// Raw tick stream for a target: one tick immediately, one per external
    /// mutation afterwards.
    pub fn changes(&self, target: &str) -> Result<TickStream> {
        self.watcher.subscribe(target)
    }

    /// Live audio listing: emits the full sorted list immediately and again
    /// after every audio mutation.
    pub fn audios_stream(
        &self,
        order: AudioOrder,
        ascending: bool,
    ) -> Result<impl Stream<Item = Result<Vec<Audio>>>> {
        let ticks = self.watcher.subscribe(targets::AUDIO)?;
        let index = self.clone();
        Ok(futures::stream::unfold(
            (ticks, index),
            move |(mut ticks, index)| async move {
                ticks.next().await?;
                let batch = index.audios(order, ascending).await;
                Some((batch, (ticks, index)))
            },
        ))
    }

    /// Live album listing, re-emitted after every album mutation.
    pub fn albums_stream(
        &self,
        order: AlbumOrder,
        ascending: bool,
    ) -> Result<impl Stream<Item = Result<Vec<Album>>>> {
        let ticks = self.watcher.subscribe(targets::ALBUM)?;
        let index = self.clone();
        Ok(futures::stream::unfold(
            (ticks, index),
            move |(mut ticks, index)| async move {
                ticks.next().await?;
                let batch = index.albums(order, ascending).await;
                Some((batch, (ticks, index)))
            },
        ))
    }

    /// Live artist listing, re-emitted after every artist mutation.
    pub fn artists_stream(
        &self,
        order: ArtistOrder,
        ascending: bool,
    ) -> Result<impl Stream<Item = Result<Vec<Artist>>>> {
        let ticks = self.watcher.subscribe(targets::ARTIST)?;
        let index = self.clone();
        Ok(futures::stream::unfold(
            (ticks, index),
            move |(mut ticks, index)| async move {
                ticks.next().await?;
                let batch = index.artists(order, ascending).await;
                Some((batch, (ticks, index)))
            },
        ))
    }

    /// Live genre listing, re-emitted after every genre mutation.
    pub fn genres_stream(
        &self,
        order: GenreOrder,
        ascending: bool,
    ) -> Result<impl Stream<Item = Result<Vec<Genre>>>> {
        let ticks = self.watcher.subscribe(targets::GENRE)?;
        let index = self.clone();
        Ok(futures::stream::unfold(
            (ticks, index),
            move |(mut ticks, index)| async move {
                ticks.next().await?;
                let batch = index.genres(order, ascending).await;
                Some((batch, (ticks, index)))
            },
        ))
    }

    /// Live playlist listing, re-emitted after every playlist mutation.
    pub fn playlists_stream(
        &self,
        order: PlaylistOrder,
        ascending: bool,
    ) -> Result<impl Stream<Item = Result<Vec<Playlist>>>> {
        let ticks = self.watcher.subscribe(targets::PLAYLIST)?;
        let index = self.clone();
        Ok(futures::stream::unfold(
            (ticks, index),
            move |(mut ticks, index)| async move {
                ticks.next().await?;
                let batch = index.playlists(order, ascending).await;
                Some((batch, (ticks, index)))
            },
        ))
    }
}

/// Substring search predicate on the audio title column.
fn audio_search(query: Option<&str>) -> Option<(String, Vec<StoreValue>)> {
    let query = query.filter(|q| !q.is_empty())?;
    Some((
        "title LIKE ?".to_string(),
        vec![StoreValue::Text(like_arg(query))],
    ))
}

fn like_arg(query: &str) -> String {
    format!("%{query}%")
}

fn placeholders(count: usize) -> String {
    let mut out = String::with_capacity(count * 3);
    for i in 0..count {
        if i > 0 {
            out.push_str(", ");
        }
        out.push('?');
    }
    out
}
