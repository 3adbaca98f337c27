use std::collections::HashSet;

use crate::services::sync::snapshot::Snapshot;

/// Reads an artist list file: one name per line, blank lines and `#`
/// comments ignored.
pub fn parse_artist_list(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Appends the names not yet on the artist list (compared case-insensitively)
/// and returns the ones that were added.
pub fn add_artists<I, S>(snapshot: &mut Snapshot, names: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut known: HashSet<String> = snapshot
        .artists
        .iter()
        .map(|name| name.to_lowercase())
        .collect();

    let mut added = Vec::new();
    for name in names {
        let name = name.as_ref().trim();
        if name.is_empty() || !known.insert(name.to_lowercase()) {
            continue;
        }
        snapshot.artists.push(name.to_string());
        added.push(name.to_string());
    }
    added
}

/// Drops repeated artist names, keeping the first spelling so existing
/// results stay attached. Returns how many names were dropped.
pub fn dedup_artists(artists: &mut Vec<String>) -> usize {
    let before = artists.len();
    let mut seen = HashSet::new();
    artists.retain(|name| seen.insert(name.to_lowercase()));
    before - artists.len()
}
