//! Sliding-window chunker with sentence-boundary back-off.
//!
//! Chunks are verbatim slices of the normalized document text, bounded by
//! `max_tokens` and overlapping adjacent chunks by `overlap_tokens`. A
//! window boundary is pulled back to the latest sentence or line break,
//! provided the break lies past the halfway point of the window; otherwise
//! the cut is hard.

use tracing::debug;

use docmind_core::{Chunk, ChunkingConfig, DocmindError, Document, Result};

use crate::normalize::{normalize, page_at, page_markers};

/// Splits normalized document text into overlapping, size-bounded chunks
/// with stable provenance (offsets, sequence index, page number).
pub struct Chunker {
    max_tokens: usize,
    overlap_tokens: usize,
}

impl Chunker {
    /// Create a chunker. Fails fast on `max_tokens == 0` or
    /// `overlap_tokens >= max_tokens`.
    pub fn new(max_tokens: usize, overlap_tokens: usize) -> Result<Self> {
        if max_tokens == 0 {
            return Err(DocmindError::invalid_argument("max_tokens must be > 0"));
        }
        if overlap_tokens >= max_tokens {
            return Err(DocmindError::invalid_argument(
                "overlap_tokens must be < max_tokens",
            ));
        }
        Ok(Self {
            max_tokens,
            overlap_tokens,
        })
    }

    pub fn from_config(config: &ChunkingConfig) -> Result<Self> {
        Self::new(config.max_tokens, config.overlap_tokens)
    }

    /// Chunk a document's raw text.
    ///
    /// Fails with `InvalidDocument` when the text is empty after
    /// normalization. Concatenating the returned chunk texts with overlaps
    /// removed reconstructs the normalized text exactly.
    pub fn chunk(&self, document: &Document) -> Result<Vec<Chunk>> {
        let text = normalize(&document.raw_text);
        if text.is_empty() {
            return Err(DocmindError::invalid_document(format!(
                "document {} is empty after normalization",
                document.id
            )));
        }

        let spans = token_spans(&text);
        let markers = page_markers(&text);
        let total = spans.len();

        let mut chunks = Vec::new();
        let mut start = 0usize;
        let mut sequence_index = 0u32;

        while start < total {
            let hard_end = (start + self.max_tokens).min(total);
            let end = if hard_end < total {
                self.boundary_end(&text, &spans, start, hard_end)
            } else {
                total
            };

            let offset_start = spans[start].0;
            let offset_end = spans[end - 1].1;
            let chunk_text = &text[offset_start..offset_end];

            chunks.push(Chunk::new(
                document.id,
                sequence_index,
                chunk_text,
                offset_start,
                offset_end,
                (end - start) as u32,
                page_at(&markers, offset_start),
            ));

            if end == total {
                break;
            }

            // Next window starts overlap_tokens before this one ended;
            // always advances by at least one token.
            start = (end - self.overlap_tokens).max(start + 1);
            sequence_index += 1;
        }

        debug!(
            document_id = %document.id,
            chunks = chunks.len(),
            tokens = total,
            "chunked document"
        );

        Ok(chunks)
    }

    /// Pull the window end back to the latest sentence or line break past
    /// the halfway point; fall back to the hard cut.
    fn boundary_end(
        &self,
        text: &str,
        spans: &[(usize, usize)],
        start: usize,
        hard_end: usize,
    ) -> usize {
        for idx in (start..hard_end).rev() {
            if idx + 1 - start <= self.max_tokens / 2 {
                break;
            }
            let (_, token_end) = spans[idx];
            let token = &text[spans[idx].0..token_end];
            let at_line_break = text[token_end..].starts_with('\n');
            if at_line_break || token.ends_with(['.', '!', '?']) {
                return idx + 1;
            }
        }
        hard_end
    }
}

/// Byte spans of whitespace-delimited tokens.
fn token_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start: Option<usize> = None;

    for (i, c) in text.char_indices() {
        if c.is_whitespace() {
            if let Some(s) = start.take() {
                spans.push((s, i));
            }
        } else if start.is_none() {
            start = Some(i);
        }
    }
    if let Some(s) = start {
        spans.push((s, text.len()));
    }

    spans
}

/// Rebuild the normalized document text from an ordered chunk sequence by
/// dropping each chunk's overlap with its predecessor.
pub fn reconstruct(chunks: &[Chunk]) -> String {
    let mut out = String::new();
    let mut prev_end = 0usize;

    for chunk in chunks {
        if chunk.offset_start >= prev_end {
            out.push_str(&chunk.text);
        } else {
            out.push_str(&chunk.text[(prev_end - chunk.offset_start)..]);
        }
        prev_end = chunk.offset_end;
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize;

    fn words(n: usize) -> String {
        (0..n)
            .map(|i| format!("w{:04}", i))
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(Chunker::new(0, 0).is_err());
        assert!(Chunker::new(100, 100).is_err());
        assert!(Chunker::new(100, 150).is_err());
        assert!(Chunker::new(100, 99).is_ok());
    }

    #[test]
    fn test_empty_document_rejected() {
        let chunker = Chunker::new(300, 50).unwrap();
        let doc = Document::new("upload://empty.txt", "   \n\t  ");
        let err = chunker.chunk(&doc).unwrap_err();
        assert!(matches!(err, DocmindError::InvalidDocument { .. }));
    }

    #[test]
    fn test_small_document_single_chunk() {
        let chunker = Chunker::new(300, 50).unwrap();
        let doc = Document::new("upload://small.txt", "just a few words here");
        let chunks = chunker.chunk(&doc).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "just a few words here");
        assert_eq!(chunks[0].token_count, 5);
        assert_eq!(chunks[0].sequence_index, 0);
    }

    #[test]
    fn test_900_tokens_max_300_overlap_50_yields_4_chunks() {
        let chunker = Chunker::new(300, 50).unwrap();
        let doc = Document::new("upload://report.txt", &words(900));
        let chunks = chunker.chunk(&doc).unwrap();

        assert_eq!(chunks.len(), 4);
        for chunk in &chunks {
            assert!(chunk.token_count <= 300);
        }
        // Adjacent chunks share exactly the overlap window.
        for pair in chunks.windows(2) {
            let shared: Vec<&str> = pair[1]
                .text
                .split_whitespace()
                .filter(|t| pair[0].text.split_whitespace().any(|p| p == *t))
                .collect();
            assert_eq!(shared.len(), 50);
        }
    }

    #[test]
    fn test_sequence_indices_strictly_increasing() {
        let chunker = Chunker::new(100, 20).unwrap();
        let doc = Document::new("upload://long.txt", &words(500));
        let chunks = chunker.chunk(&doc).unwrap();
        for pair in chunks.windows(2) {
            assert!(pair[1].sequence_index > pair[0].sequence_index);
            assert!(pair[1].offset_start >= pair[0].offset_start);
            assert!(pair[1].offset_start < pair[0].offset_end, "overlap expected");
        }
    }

    #[test]
    fn test_round_trip_reconstruction() {
        let chunker = Chunker::new(64, 16).unwrap();
        let raw = format!(
            "First paragraph. {}\n\nSecond paragraph! {}\nThird line? {}",
            words(100),
            words(150),
            words(80)
        );
        let doc = Document::new("upload://mixed.txt", &raw);
        let chunks = chunker.chunk(&doc).unwrap();
        assert!(chunks.len() > 1);
        assert_eq!(reconstruct(&chunks), normalize(&raw));
    }

    #[test]
    fn test_sentence_boundary_backoff() {
        // 60 words, then a period, then 60 more; window of 100 should cut
        // at the sentence end rather than mid-sentence.
        let raw = format!("{} end.\n{}", words(60), words(60));
        let chunker = Chunker::new(100, 10).unwrap();
        let doc = Document::new("upload://sent.txt", &raw);
        let chunks = chunker.chunk(&doc).unwrap();
        assert!(chunks[0].text.ends_with("end."));
    }

    #[test]
    fn test_page_provenance() {
        let raw = format!(
            "[Page 1]\n{}\n[Page 2]\n{}\n[Page 3]\n{}",
            words(250),
            words(250),
            words(250)
        );
        let chunker = Chunker::new(300, 50).unwrap();
        let doc = Document::new("upload://paged.pdf", &raw);
        let chunks = chunker.chunk(&doc).unwrap();

        assert_eq!(chunks[0].page, Some(1));
        let last = chunks.last().unwrap();
        assert_eq!(last.page, Some(3));
        assert_eq!(reconstruct(&chunks), normalize(&raw));
    }
}
