//! # Media Index Core
//!
//! Query and resolution layer over an externally-owned media catalog.
//!
//! ## Overview
//!
//! This crate provides:
//! - Typed domain records for audios, artists, albums, genres, and playlists
//! - A query engine executing parameterized catalog queries across two
//!   paging capabilities behind one interface
//! - Pure row decoders tolerant of the catalog's nullable fields
//! - A change watcher turning mutation announcements into tick streams
//! - The [`MediaIndex`] facade composing all of the above
//!
//! The catalog is the source of truth: every read re-queries it, nothing is
//! cached, and nothing here ever writes to it.

pub mod adapters;
pub mod db;
pub mod engine;
pub mod error;
pub mod index;
pub mod mapper;
pub mod models;
pub mod projection;
pub mod watcher;

pub use error::{IndexError, Result};
pub use index::{AlbumOrder, ArtistOrder, AudioOrder, GenreOrder, MediaIndex, PlaylistOrder};
