//! High-level catalog lookups built on the executor, disambiguator, cache
//! and enricher.

use std::collections::HashSet;

use tokio_util::sync::CancellationToken;

use crate::cache::MetadataCache;
use crate::disambiguate;
use crate::enrich::{ConcurrentEnricher, EnrichReport};
use crate::error::AppError;
use crate::executor::{RequestDescriptor, RequestExecutor};
use crate::models::{
    Recording, RecordingSearchPage, Release, ReleaseBrowsePage, ReleaseGroup, ReleaseGroupSlot,
    ReleaseKind, ReleaseSearchPage, SearchKind, SearchPage, decode_search,
};
use crate::traits::{DetailFetcher, Transport};
use crate::warnings::{Warning, WarningCollector, WarningKind};

/// Candidates requested when searching for a release to disambiguate.
pub const RELEASE_CANDIDATE_LIMIT: u32 = 10;

/// Page size for browsing an artist's releases (API maximum).
pub const BROWSE_PAGE_SIZE: u32 = 100;

/// Includes for the artist release browse: group type and track counts.
const ARTIST_RELEASES_INC: &str = "release-groups+media";

const LUCENE_SPECIAL: &[char] = &[
    '+', '-', '&', '|', '!', '(', ')', '{', '}', '[', ']', '^', '"', '~', '*', '?', ':', '\\',
    '/',
];

/// Backslash-escape Lucene query syntax in a user-supplied term.
pub fn escape_lucene(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if LUCENE_SPECIAL.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

pub fn release_query(artist: &str, album: &str) -> String {
    format!(
        "release:\"{}\" AND artist:\"{}\"",
        escape_lucene(album),
        escape_lucene(artist)
    )
}

pub fn recording_query(artist: &str, title: &str) -> String {
    format!(
        "recording:\"{}\" AND artist:\"{}\"",
        escape_lucene(title),
        escape_lucene(artist)
    )
}

fn search_descriptor(kind: SearchKind, query: &str, limit: Option<u32>) -> RequestDescriptor {
    let mut descriptor = RequestDescriptor::relative(kind.path()).param("query", query);
    if let Some(limit) = limit {
        descriptor = descriptor.param("limit", limit.to_string());
    }
    descriptor.param("fmt", "json")
}

/// Catalog client: searches, resolves and enriches release metadata.
///
/// Clones share the executor's rate limiter, the cache and the warnings.
#[derive(Clone)]
pub struct CatalogService<T> {
    executor: RequestExecutor<T>,
    cache: MetadataCache<Release>,
    warnings: WarningCollector,
}

impl<T: Transport> CatalogService<T> {
    pub fn new(executor: RequestExecutor<T>) -> Self {
        Self {
            executor,
            cache: MetadataCache::new(),
            warnings: WarningCollector::new(),
        }
    }

    pub fn executor(&self) -> &RequestExecutor<T> {
        &self.executor
    }

    pub fn cache(&self) -> &MetadataCache<Release> {
        &self.cache
    }

    pub fn warnings(&self) -> &WarningCollector {
        &self.warnings
    }

    /// Raw search of any kind, decoded with that kind's schema.
    pub async fn search(
        &self,
        cancel: &CancellationToken,
        kind: SearchKind,
        query: &str,
        limit: Option<u32>,
    ) -> Result<SearchPage, AppError> {
        let body = self
            .executor
            .execute(cancel, &search_descriptor(kind, query, limit))
            .await?;
        decode_search(kind, &body)
    }

    pub async fn search_releases(
        &self,
        cancel: &CancellationToken,
        query: &str,
        limit: Option<u32>,
    ) -> Result<Vec<Release>, AppError> {
        let page: ReleaseSearchPage = self
            .executor
            .execute_json(cancel, &search_descriptor(SearchKind::Release, query, limit))
            .await?;
        Ok(page.releases)
    }

    pub async fn search_recordings(
        &self,
        cancel: &CancellationToken,
        query: &str,
        limit: Option<u32>,
    ) -> Result<Vec<Recording>, AppError> {
        let page: RecordingSearchPage = self
            .executor
            .execute_json(
                cancel,
                &search_descriptor(SearchKind::Recording, query, limit),
            )
            .await?;
        Ok(page.recordings)
    }

    /// Full release with artist credits, media and track recordings.
    pub async fn lookup_release(
        &self,
        cancel: &CancellationToken,
        id: &str,
    ) -> Result<Release, AppError> {
        let descriptor = RequestDescriptor::relative(format!("release/{id}"))
            .param("inc", "artist-credits+media+recordings")
            .param("fmt", "json");
        self.executor.execute_json(cancel, &descriptor).await
    }

    /// Find the release best matching an album, using and filling the cache.
    ///
    /// Failures leave a `release-lookup-failed` warning for `"artist - album"`;
    /// a later success for the same pair clears it.
    pub async fn find_release(
        &self,
        cancel: &CancellationToken,
        artist: &str,
        album: &str,
        expected_tracks: usize,
    ) -> Result<Release, AppError> {
        if let Some(release) = self.cache.get(artist, album) {
            tracing::debug!(artist, album, release_id = %release.id, "Release cache hit");
            return Ok(release);
        }

        let context = format!("{artist} - {album}");
        match self
            .resolve_release(cancel, artist, album, expected_tracks)
            .await
        {
            Ok(release) => {
                self.cache.set(artist, album, release.clone());
                self.warnings
                    .resolve(WarningKind::ReleaseLookupFailed, &context);
                Ok(release)
            }
            Err(AppError::Cancelled) => Err(AppError::Cancelled),
            Err(e) => {
                tracing::warn!(
                    %context,
                    error = %e,
                    rate_limited = e.is_rate_limit(),
                    "Release lookup failed"
                );
                self.warnings.record(Warning::new(
                    WarningKind::ReleaseLookupFailed,
                    context,
                    e.to_string(),
                ));
                Err(e)
            }
        }
    }

    async fn resolve_release(
        &self,
        cancel: &CancellationToken,
        artist: &str,
        album: &str,
        expected_tracks: usize,
    ) -> Result<Release, AppError> {
        if let Some(id) = self.cache.get_id(artist, album) {
            tracing::debug!(artist, album, release_id = %id, "Using resolved release id");
            return self.lookup_release(cancel, &id).await;
        }

        let candidates = self
            .search_releases(
                cancel,
                &release_query(artist, album),
                Some(RELEASE_CANDIDATE_LIMIT),
            )
            .await?;
        disambiguate::select(&candidates, expected_tracks)
            .cloned()
            .ok_or_else(|| AppError::NoCandidates(format!("{artist} - {album}")))
    }

    /// Best recording hit for a track.
    pub async fn find_recording(
        &self,
        cancel: &CancellationToken,
        artist: &str,
        title: &str,
    ) -> Result<Recording, AppError> {
        let context = format!("{artist} - {title}");
        let result = self
            .search_recordings(cancel, &recording_query(artist, title), Some(1))
            .await
            .and_then(|hits| {
                hits.into_iter()
                    .next()
                    .ok_or_else(|| AppError::NoCandidates(context.clone()))
            });

        match result {
            Ok(recording) => {
                self.warnings
                    .resolve(WarningKind::TrackLookupFailed, &context);
                Ok(recording)
            }
            Err(AppError::Cancelled) => Err(AppError::Cancelled),
            Err(e) => {
                tracing::warn!(
                    %context,
                    error = %e,
                    rate_limited = e.is_rate_limit(),
                    "Recording lookup failed"
                );
                self.warnings.record(Warning::new(
                    WarningKind::TrackLookupFailed,
                    context,
                    e.to_string(),
                ));
                Err(e)
            }
        }
    }

    /// Look a release up by barcode and remember its id for the pair.
    ///
    /// Returns `None` when the catalog has no release with that barcode.
    pub async fn resolve_release_by_barcode(
        &self,
        cancel: &CancellationToken,
        artist: &str,
        album: &str,
        barcode: &str,
    ) -> Result<Option<String>, AppError> {
        let query = format!("barcode:{}", escape_lucene(barcode));
        let hits = self.search_releases(cancel, &query, Some(1)).await?;
        let Some(release) = hits.into_iter().next() else {
            tracing::debug!(barcode, "No release for barcode");
            return Ok(None);
        };
        self.cache.set_id(artist, album, release.id.clone());
        Ok(Some(release.id))
    }

    /// Every release group credited to an artist, one slot per group.
    ///
    /// Browses the artist's releases with their groups and media, since a
    /// release-group browse cannot include track counts. Groups keep the
    /// order they are first seen in; a slot's track count comes from the
    /// first release listed for its group.
    pub async fn artist_release_groups(
        &self,
        cancel: &CancellationToken,
        artist_id: &str,
    ) -> Result<Vec<ReleaseGroupSlot>, AppError> {
        let mut slots: Vec<ReleaseGroupSlot> = Vec::new();
        let mut groups: HashSet<String> = HashSet::new();
        let mut seen = 0usize;
        loop {
            let descriptor = RequestDescriptor::relative(SearchKind::Release.path())
                .param("artist", artist_id)
                .param("inc", ARTIST_RELEASES_INC)
                .param("limit", BROWSE_PAGE_SIZE.to_string())
                .param("offset", seen.to_string())
                .param("fmt", "json");
            let page: ReleaseBrowsePage =
                self.executor.execute_json(cancel, &descriptor).await?;

            if page.releases.is_empty() {
                break;
            }
            seen += page.releases.len();
            for slot in page.releases.iter().filter_map(ReleaseGroupSlot::from_release) {
                if groups.insert(slot.id.clone()) {
                    slots.push(slot);
                }
            }

            let total = page.release_count.unwrap_or(0) as usize;
            if seen >= total {
                break;
            }
        }
        tracing::debug!(
            artist_id,
            releases = seen,
            groups = slots.len(),
            "Browsed release groups"
        );
        Ok(slots)
    }

    /// Fill type and date detail for every slot, in place.
    pub async fn enrich_discography(
        &self,
        cancel: &CancellationToken,
        artist: &str,
        slots: &mut [ReleaseGroupSlot],
        parallelism: usize,
    ) -> EnrichReport {
        let fetcher = ReleaseGroupDetails::new(self.executor.clone(), artist);
        ConcurrentEnricher::new(fetcher, self.warnings.clone())
            .enrich(cancel, slots, parallelism)
            .await
    }
}

/// Fetches `release-group/{id}` for a discography slot.
pub struct ReleaseGroupDetails<T> {
    executor: RequestExecutor<T>,
    artist: String,
}

impl<T: Transport> ReleaseGroupDetails<T> {
    pub fn new(executor: RequestExecutor<T>, artist: impl Into<String>) -> Self {
        Self {
            executor,
            artist: artist.into(),
        }
    }
}

impl<T: Transport> DetailFetcher for ReleaseGroupDetails<T> {
    type Item = ReleaseGroupSlot;
    type Detail = ReleaseGroup;

    async fn fetch(
        &self,
        item: &ReleaseGroupSlot,
        cancel: &CancellationToken,
    ) -> Result<ReleaseGroup, AppError> {
        let descriptor =
            RequestDescriptor::relative(format!("release-group/{}", item.id)).param("fmt", "json");
        self.executor.execute_json(cancel, &descriptor).await
    }

    fn apply(&self, item: &mut ReleaseGroupSlot, detail: ReleaseGroup) {
        item.kind = Some(ReleaseKind::from_types(
            detail.primary_type.as_deref(),
            &detail.secondary_types,
        ));
        item.primary_type = detail.primary_type;
        item.secondary_types = detail.secondary_types;
        item.first_release_date = detail.first_release_date;
    }

    fn fallback(&self, item: &mut ReleaseGroupSlot) {
        item.kind = Some(ReleaseKind::from_track_count(item.track_count));
    }

    fn describe(&self, item: &ReleaseGroupSlot) -> String {
        format!("{} - {}", self.artist, item.title)
    }
}
