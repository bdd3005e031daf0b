//! Text normalization and page-marker detection.
//!
//! Ingested text is normalized once; all chunk offsets refer to the
//! normalized form. Page extraction keys off `[Page N]` markers that
//! document extraction inserts ahead of each page's text.

/// Normalize raw document text: unify line endings and strip surrounding
/// whitespace. Returns an empty string for whitespace-only input.
pub fn normalize(raw: &str) -> String {
    raw.replace("\r\n", "\n").trim().to_string()
}

/// Byte offsets at which a new page begins, paired with the page number.
///
/// Markers look like `[Page 3]`. Text before the first marker has no page.
pub fn page_markers(text: &str) -> Vec<(usize, u32)> {
    let mut markers = Vec::new();
    let mut search_from = 0;

    while let Some(rel) = text[search_from..].find("[Page ") {
        let start = search_from + rel;
        let digits_start = start + "[Page ".len();
        let rest = &text[digits_start..];

        match rest.find(']') {
            Some(close) => {
                if let Ok(page) = rest[..close].trim().parse::<u32>() {
                    markers.push((start, page));
                }
                search_from = digits_start + close + 1;
            }
            None => break,
        }
    }

    markers
}

/// Page governing the given offset: the most recent marker at or before it.
pub fn page_at(markers: &[(usize, u32)], offset: usize) -> Option<u32> {
    markers
        .iter()
        .take_while(|(marker_offset, _)| *marker_offset <= offset)
        .last()
        .map(|(_, page)| *page)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_line_endings() {
        assert_eq!(normalize("a\r\nb\r\n"), "a\nb");
        assert_eq!(normalize("   \n\t "), "");
    }

    #[test]
    fn test_page_markers() {
        let text = "[Page 1]\nIntro text.\n[Page 2]\nMore text.";
        let markers = page_markers(text);
        assert_eq!(markers.len(), 2);
        assert_eq!(markers[0], (0, 1));
        assert_eq!(markers[1].1, 2);
    }

    #[test]
    fn test_page_at() {
        let markers = vec![(0, 1), (100, 2), (200, 3)];
        assert_eq!(page_at(&markers, 0), Some(1));
        assert_eq!(page_at(&markers, 150), Some(2));
        assert_eq!(page_at(&markers, 500), Some(3));
        assert_eq!(page_at(&[], 50), None);
    }

    #[test]
    fn test_malformed_marker_ignored() {
        let markers = page_markers("[Page x]\ntext\n[Page 4]\nmore");
        assert_eq!(markers.len(), 1);
        assert_eq!(markers[0].1, 4);
    }
}
