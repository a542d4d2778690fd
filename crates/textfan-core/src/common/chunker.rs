//! Boundary-aware text chunking.
//!
//! This module implements the deterministic splitter that partitions input
//! text into bounded, overlapping chunks. Windows are measured in Unicode
//! scalar values, not bytes, so a multi-byte sentence terminator counts as
//! one position.
//!
//! ## Algorithm
//!
//! Scan the text in windows of `chunk_size` characters. For every window
//! that does not reach the end of the input, search the trailing
//! [`BOUNDARY_SEARCH_WINDOW`] characters for a sentence boundary and shrink
//! the window to end immediately after the rightmost occurrence. Marker
//! kinds are tried in priority order — full-width period, full-width
//! exclamation, full-width question mark, double newline, single newline —
//! and the first kind present anywhere in the search region wins.
//!
//! Each slice is trimmed and dropped if empty; the next window starts
//! `overlap` characters before the previous end. The function is pure:
//! identical inputs always produce the identical chunk sequence.

/// How far back from a window's end the boundary search extends, in
/// characters.
pub const BOUNDARY_SEARCH_WINDOW: usize = 200;

/// Sentence boundary markers, in decreasing priority. The first kind found
/// in the search region decides the cut; later kinds are not consulted.
const BOUNDARY_MARKERS: [&[char]; 5] = [&['。'], &['！'], &['？'], &['\n', '\n'], &['\n']];

/// Splits `text` into bounded, overlapping chunks.
///
/// Every chunk is at most `chunk_size` characters before trimming, and
/// consecutive chunks share up to `overlap` characters at their boundary.
/// Chunk order equals textual order, and every non-whitespace character of
/// the input is covered by some chunk.
///
/// The window start always advances by at least one character per
/// iteration, so the loop terminates even when `overlap >= chunk_size`.
pub fn split(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let chunk_size = chunk_size.max(1);
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < len {
        let mut end = start + chunk_size;

        if end < len {
            // Prefer to cut at a sentence boundary within the trailing
            // search region rather than mid-sentence.
            let search_start = end.saturating_sub(BOUNDARY_SEARCH_WINDOW).max(start);
            if let Some(cut) = rightmost_boundary(&chars[search_start..end]) {
                end = search_start + cut;
            }
        } else {
            end = len;
        }

        let slice: String = chars[start..end].iter().collect();
        let trimmed = slice.trim();
        if !trimmed.is_empty() {
            chunks.push(trimmed.to_owned());
        }

        if end >= len {
            break;
        }

        // Minimum forward progress of one character guards against a
        // non-advancing start when overlap is at least the window width.
        start = end.saturating_sub(overlap).max(start + 1);
    }

    chunks
}

/// Returns the offset just past the chosen boundary marker within `window`,
/// or `None` if no marker kind occurs.
fn rightmost_boundary(window: &[char]) -> Option<usize> {
    BOUNDARY_MARKERS
        .iter()
        .find_map(|marker| rfind(window, marker).map(|pos| pos + marker.len()))
}

/// Rightmost occurrence of `marker` as a subsequence of `window`.
fn rfind(window: &[char], marker: &[char]) -> Option<usize> {
    if marker.is_empty() || marker.len() > window.len() {
        return None;
    }
    (0..=window.len() - marker.len())
        .rev()
        .find(|&i| &window[i..i + marker.len()] == marker)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_chunk_when_window_covers_input() {
        let text = "  short input with no boundaries  ";
        let chunks = split(text, text.chars().count(), 0);
        assert_eq!(chunks, vec![text.trim().to_owned()]);
    }

    #[test]
    fn empty_and_whitespace_input_yield_nothing() {
        assert!(split("", 100, 10).is_empty());
        assert!(split(" \n\t  \n ", 100, 10).is_empty());
    }

    #[test]
    fn is_deterministic() {
        let text = "alpha。beta！gamma？\n\ndelta\nepsilon".repeat(40);
        let a = split(&text, 120, 15);
        let b = split(&text, 120, 15);
        assert_eq!(a, b);
        assert!(a.len() > 1);
    }

    #[test]
    fn no_chunk_is_empty_after_trimming() {
        let text = "one。\n\n\n two。\n\n\n three。".repeat(30);
        for chunk in split(&text, 50, 5) {
            assert!(!chunk.trim().is_empty());
        }
    }

    #[test]
    fn covers_full_input_without_markers() {
        // 2500 characters, no boundary markers anywhere: windows fall back
        // to the raw chunk size and overlap by exactly `overlap` chars.
        let text: String = std::iter::repeat('x').take(2500).collect();
        let chunks = split(&text, 1100, 20);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].chars().count(), 1100);
        assert_eq!(chunks[1].chars().count(), 1100);
        assert_eq!(chunks[2].chars().count(), 340);
        // Adjacent chunks share a 20-character overlap region.
        let tail: String = chunks[0].chars().skip(1100 - 20).collect();
        let head: String = chunks[1].chars().take(20).collect();
        assert_eq!(tail, head);
        let total: usize = chunks.iter().map(|c| c.chars().count()).sum();
        assert_eq!(total, 2500 + 2 * 20);
    }

    #[test]
    fn cuts_after_full_width_period() {
        let mut text = "a".repeat(90);
        text.push('。');
        text.push_str(&"b".repeat(120));
        let chunks = split(&text, 100, 0);
        assert_eq!(chunks[0], format!("{}。", "a".repeat(90)));
        assert!(chunks[1].starts_with('b'));
    }

    #[test]
    fn period_outranks_newline() {
        // Both markers in the search region: the full-width period wins
        // even though the newline sits further right.
        let mut text = "a".repeat(50);
        text.push('。');
        text.push_str(&"b".repeat(30));
        text.push('\n');
        text.push_str(&"c".repeat(60));
        let chunks = split(&text, 100, 0);
        assert_eq!(chunks[0].chars().last(), Some('。'));
    }

    #[test]
    fn newline_pair_outranks_single_newline() {
        let mut text = "a".repeat(40);
        text.push_str("\n\n");
        text.push_str(&"b".repeat(30));
        text.push('\n');
        text.push_str(&"c".repeat(80));
        let chunks = split(&text, 100, 0);
        assert_eq!(chunks[0], "a".repeat(40));
        assert!(chunks[1].starts_with('b'));
    }

    #[test]
    fn terminates_when_overlap_exceeds_chunk_size() {
        let text = "abcdefghij".repeat(20);
        let chunks = split(&text, 10, 50);
        assert!(!chunks.is_empty());
        // Forced one-character advance still covers the whole input.
        assert!(chunks.len() <= text.chars().count());
    }

    #[test]
    fn multibyte_characters_count_as_one_position() {
        let text = "日本語のテキスト".repeat(50);
        let chunks = split(&text, 64, 8);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 64);
        }
    }
}
