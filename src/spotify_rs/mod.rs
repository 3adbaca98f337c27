//! Thin Spotify Web API layer: request building, error mapping and the
//! response types. No retries or pagination loops live here.
pub mod client;
pub mod types;
