//! Typed response schemas for the catalog's `ws/2` JSON API.
//!
//! Each search kind has its own page type. Optional fields stay `Option`,
//! list fields default to empty when the API omits them.

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Which entity a search or browse targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchKind {
    Recording,
    Release,
    ReleaseGroup,
}

impl SearchKind {
    /// Entity path segment, relative to the API root.
    pub fn path(&self) -> &'static str {
        match self {
            SearchKind::Recording => "recording",
            SearchKind::Release => "release",
            SearchKind::ReleaseGroup => "release-group",
        }
    }
}

impl std::fmt::Display for SearchKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.path())
    }
}

// ---------------------------------------------------------------------------
// Shared pieces
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtistRef {
    pub id: String,
    pub name: String,
    #[serde(rename = "sort-name", default)]
    pub sort_name: Option<String>,
}

/// One entry of an artist credit, e.g. "Queen" in "Queen & David Bowie".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtistCredit {
    /// Credited name, which may differ from the artist's canonical name.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub joinphrase: Option<String>,
    pub artist: ArtistRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Disc {
    pub id: String,
    #[serde(default)]
    pub sectors: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackRecordingRef {
    pub id: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub number: Option<String>,
    #[serde(default)]
    pub position: Option<u32>,
    #[serde(default)]
    pub length: Option<u64>,
    #[serde(default)]
    pub recording: Option<TrackRecordingRef>,
}

/// A disc, side or digital medium of a release.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Medium {
    /// Format label such as "CD", "12\" Vinyl" or "Digital Media".
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub position: Option<u32>,
    #[serde(rename = "track-count", default)]
    pub track_count: Option<u32>,
    #[serde(default)]
    pub discs: Vec<Disc>,
    #[serde(default)]
    pub tracks: Vec<Track>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseGroupRef {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(rename = "primary-type", default)]
    pub primary_type: Option<String>,
    #[serde(rename = "secondary-types", default)]
    pub secondary_types: Vec<String>,
    #[serde(rename = "first-release-date", default)]
    pub first_release_date: Option<String>,
}

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

/// A specific issued edition of a work. This is the disambiguation candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    pub id: String,
    pub title: String,
    /// ISO-ish date: `"1975"`, `"1975-11"` or `"1975-11-21"`.
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub barcode: Option<String>,
    #[serde(rename = "artist-credit", default)]
    pub artist_credit: Vec<ArtistCredit>,
    #[serde(default)]
    pub media: Vec<Medium>,
    #[serde(rename = "track-count", default)]
    pub track_count: Option<u32>,
    #[serde(rename = "release-group", default)]
    pub release_group: Option<ReleaseGroupRef>,
    /// Search relevance (0-100), present only on search hits.
    #[serde(default)]
    pub score: Option<u32>,
}

impl Release {
    /// Year component of `date`, if it parses.
    pub fn year(&self) -> Option<i32> {
        self.date
            .as_deref()
            .and_then(|d| d.get(..4))
            .and_then(|y| y.parse().ok())
    }

    pub fn artist_ids(&self) -> Vec<&str> {
        self.artist_credit
            .iter()
            .map(|c| c.artist.id.as_str())
            .collect()
    }

    /// Format labels of all media, skipping unlabeled ones.
    pub fn formats(&self) -> impl Iterator<Item = &str> {
        self.media.iter().filter_map(|m| m.format.as_deref())
    }

    /// Track count from the search hit, or summed over media.
    pub fn total_tracks(&self) -> u32 {
        self.track_count.unwrap_or_else(|| {
            self.media
                .iter()
                .map(|m| m.track_count.unwrap_or(m.tracks.len() as u32))
                .sum()
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recording {
    pub id: String,
    pub title: String,
    /// Duration in milliseconds.
    #[serde(default)]
    pub length: Option<u64>,
    #[serde(rename = "artist-credit", default)]
    pub artist_credit: Vec<ArtistCredit>,
    #[serde(default)]
    pub releases: Vec<Release>,
    #[serde(default)]
    pub isrcs: Vec<String>,
    #[serde(default)]
    pub score: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseGroup {
    pub id: String,
    pub title: String,
    #[serde(rename = "primary-type", default)]
    pub primary_type: Option<String>,
    #[serde(rename = "secondary-types", default)]
    pub secondary_types: Vec<String>,
    #[serde(rename = "first-release-date", default)]
    pub first_release_date: Option<String>,
    #[serde(default)]
    pub releases: Vec<Release>,
}

// ---------------------------------------------------------------------------
// Pages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReleaseSearchPage {
    #[serde(default)]
    pub count: Option<u32>,
    #[serde(default)]
    pub offset: Option<u32>,
    #[serde(default)]
    pub releases: Vec<Release>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RecordingSearchPage {
    #[serde(default)]
    pub count: Option<u32>,
    #[serde(default)]
    pub offset: Option<u32>,
    #[serde(default)]
    pub recordings: Vec<Recording>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReleaseGroupBrowsePage {
    #[serde(rename = "release-group-count", default)]
    pub release_group_count: Option<u32>,
    #[serde(rename = "release-group-offset", default)]
    pub release_group_offset: Option<u32>,
    #[serde(rename = "release-groups", default)]
    pub release_groups: Vec<ReleaseGroup>,
}

/// One page of `release?artist=<id>` browse results.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReleaseBrowsePage {
    #[serde(rename = "release-count", default)]
    pub release_count: Option<u32>,
    #[serde(rename = "release-offset", default)]
    pub release_offset: Option<u32>,
    #[serde(default)]
    pub releases: Vec<Release>,
}

/// A decoded search page, tagged by the kind that was requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchPage {
    Recordings(RecordingSearchPage),
    Releases(ReleaseSearchPage),
    ReleaseGroups(ReleaseGroupBrowsePage),
}

impl SearchPage {
    /// Number of hits on this page.
    pub fn len(&self) -> usize {
        match self {
            SearchPage::Recordings(p) => p.recordings.len(),
            SearchPage::Releases(p) => p.releases.len(),
            SearchPage::ReleaseGroups(p) => p.release_groups.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Decode a response body with the schema for `kind`.
pub fn decode_search(kind: SearchKind, body: &str) -> Result<SearchPage, AppError> {
    Ok(match kind {
        SearchKind::Recording => SearchPage::Recordings(serde_json::from_str(body)?),
        SearchKind::Release => SearchPage::Releases(serde_json::from_str(body)?),
        SearchKind::ReleaseGroup => SearchPage::ReleaseGroups(serde_json::from_str(body)?),
    })
}

// ---------------------------------------------------------------------------
// Discography slots
// ---------------------------------------------------------------------------

/// Coarse type of a release group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseKind {
    Album,
    Single,
    Ep,
    Compilation,
    Other,
}

impl ReleaseKind {
    /// Map the catalog's primary/secondary type labels.
    pub fn from_types(primary: Option<&str>, secondary: &[String]) -> Self {
        if secondary
            .iter()
            .any(|s| s.eq_ignore_ascii_case("compilation"))
        {
            return ReleaseKind::Compilation;
        }
        match primary.map(str::to_ascii_lowercase).as_deref() {
            Some("album") => ReleaseKind::Album,
            Some("single") => ReleaseKind::Single,
            Some("ep") => ReleaseKind::Ep,
            Some(_) => ReleaseKind::Other,
            None => ReleaseKind::Album,
        }
    }

    /// Guess from the number of tracks when the catalog could not be asked.
    pub fn from_track_count(tracks: usize) -> Self {
        match tracks {
            0 => ReleaseKind::Album,
            1 => ReleaseKind::Single,
            2..=6 => ReleaseKind::Ep,
            _ => ReleaseKind::Album,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReleaseKind::Album => "album",
            ReleaseKind::Single => "single",
            ReleaseKind::Ep => "ep",
            ReleaseKind::Compilation => "compilation",
            ReleaseKind::Other => "other",
        }
    }
}

impl std::fmt::Display for ReleaseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One album of an artist's discography, enriched in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReleaseGroupSlot {
    pub id: String,
    pub title: String,
    /// Known track count from the source listing.
    pub track_count: usize,
    pub primary_type: Option<String>,
    pub secondary_types: Vec<String>,
    pub first_release_date: Option<String>,
    pub kind: Option<ReleaseKind>,
}

impl ReleaseGroupSlot {
    pub fn new(id: impl Into<String>, title: impl Into<String>, track_count: usize) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            track_count,
            primary_type: None,
            secondary_types: Vec::new(),
            first_release_date: None,
            kind: None,
        }
    }
}

impl ReleaseGroupSlot {
    /// Slot for the group `release` belongs to, counting that release's
    /// tracks. `None` when the release carries no group.
    pub fn from_release(release: &Release) -> Option<Self> {
        let group = release.release_group.as_ref()?;
        Some(Self {
            id: group.id.clone(),
            title: group.title.clone().unwrap_or_else(|| release.title.clone()),
            track_count: release.total_tracks() as usize,
            primary_type: group.primary_type.clone(),
            secondary_types: group.secondary_types.clone(),
            first_release_date: group.first_release_date.clone(),
            kind: None,
        })
    }
}
