//! Picks one release among several fuzzy search hits for the same album.
//!
//! Scoring favours short, non-compilation titles for multi-track lookups,
//! short or "single" titles for one-to-three track lookups, early pressings,
//! and digital media over physical formats.

use crate::models::Release;

/// Title fragments marking a compilation or various-artists release.
pub const COMPILATION_KEYWORDS: &[&str] = &[
    "various",
    "compilation",
    "hits",
    "best of",
    "collection",
    "playlist",
    "greatest",
    "anthology",
    "essential",
    "karaoke",
    "tribute",
];

/// Title fragments that suggest a single rather than a full album.
pub const SINGLE_PATTERNS: &[&str] = &["single", "radio edit", "remix", "(edit)"];

/// Format fragments naming a physical medium.
pub const PHYSICAL_FORMATS: &[&str] = &["cd", "vinyl", "cassette", "dvd", "blu-ray"];

/// Widest range of release years considered plausible.
pub const PLAUSIBLE_YEARS: (i32, i32) = (1950, 2030);

const DIGITAL_FORMAT: &str = "digital media";

/// A candidate and its score. Only lives for the duration of a selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoredCandidate<'a> {
    pub release: &'a Release,
    pub score: i32,
}

/// Inclusive year range for an early/original pressing: from the start of
/// the plausible window up to its midpoint.
pub fn early_pressing_window() -> (i32, i32) {
    let (first, last) = PLAUSIBLE_YEARS;
    (first, first + (last - first) / 2)
}

fn is_compilation_title(lower: &str) -> bool {
    COMPILATION_KEYWORDS.iter().any(|k| lower.contains(k))
}

fn is_single_like_title(lower: &str) -> bool {
    SINGLE_PATTERNS.iter().any(|p| lower.contains(p)) || lower.ends_with(" ep")
}

/// Score one candidate against the expected track count.
pub fn score(release: &Release, expected_tracks: usize) -> i32 {
    let lower = release.title.to_lowercase();
    let title_len = release.title.chars().count();
    let compilation = is_compilation_title(&lower);
    let mut total = 0;

    if expected_tracks > 5 {
        if title_len < 30 && !release.title.contains(" - ") && !compilation {
            total += 100;
            if !lower.contains("demo") {
                total += 30;
            }
        }
        if expected_tracks > 10 && is_single_like_title(&lower) {
            total -= 50;
        }
    } else if expected_tracks <= 3 && (lower.contains("single") || title_len < 20) {
        total += 50;
    }

    let (early_start, early_end) = early_pressing_window();
    if release
        .year()
        .is_some_and(|y| (early_start..=early_end).contains(&y))
    {
        total += 10;
    }

    if !compilation {
        total += 15;
    }

    let formats: Vec<String> = release.formats().map(str::to_lowercase).collect();
    if formats.iter().any(|f| f == DIGITAL_FORMAT) {
        total += 40;
    }
    if formats
        .iter()
        .any(|f| PHYSICAL_FORMATS.iter().any(|p| f.contains(p)))
    {
        total -= 20;
    }

    total
}

/// Score every candidate, preserving input order.
pub fn score_all(candidates: &[Release], expected_tracks: usize) -> Vec<ScoredCandidate<'_>> {
    candidates
        .iter()
        .map(|release| ScoredCandidate {
            release,
            score: score(release, expected_tracks),
        })
        .collect()
}

/// Select the best candidate.
///
/// A single candidate is returned without scoring. Ties keep the earliest
/// candidate. Returns `None` only for an empty slice.
pub fn select(candidates: &[Release], expected_tracks: usize) -> Option<&Release> {
    if let [only] = candidates {
        return Some(only);
    }

    let mut best: Option<ScoredCandidate<'_>> = None;
    for candidate in score_all(candidates, expected_tracks) {
        tracing::trace!(
            release_id = %candidate.release.id,
            title = %candidate.release.title,
            score = candidate.score,
            "Scored candidate"
        );
        if best.is_none_or(|b| candidate.score > b.score) {
            best = Some(candidate);
        }
    }

    if let Some(b) = &best {
        tracing::debug!(
            release_id = %b.release.id,
            title = %b.release.title,
            score = b.score,
            candidates = candidates.len(),
            "Selected release"
        );
    }
    best.map(|b| b.release)
}
