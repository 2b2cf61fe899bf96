//! Overlapping word-window chunking.

/// Splits text into windows of `chunk_size` words that overlap by
/// `chunk_overlap` words. Windows shorter than `min_words` are dropped.
#[derive(Debug, Clone, Copy)]
pub struct TextChunker {
    chunk_size: usize,
    chunk_overlap: usize,
    min_words: usize,
}

/// One window of a source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Window index within the source, counted before short windows are dropped.
    pub position: usize,
    pub text: String,
    pub word_count: usize,
}

impl TextChunker {
    /// `chunk_overlap` must be smaller than `chunk_size`; config validation
    /// enforces this, and an invalid pair degrades to a stride of one word.
    pub fn new(chunk_size: usize, chunk_overlap: usize, min_words: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            chunk_overlap,
            min_words,
        }
    }

    fn stride(&self) -> usize {
        self.chunk_size.saturating_sub(self.chunk_overlap).max(1)
    }

    /// Number of windows produced for a text of `words` words, before the
    /// minimum-length filter.
    pub fn window_count(&self, words: usize) -> usize {
        if words == 0 {
            return 0;
        }
        if words <= self.chunk_overlap {
            return 1;
        }
        (words - self.chunk_overlap).div_ceil(self.stride())
    }

    pub fn chunk(&self, text: &str) -> Vec<Chunk> {
        let words: Vec<&str> = text.split_whitespace().collect();
        let step = self.stride();

        (0..self.window_count(words.len()))
            .filter_map(|position| {
                let start = position * step;
                let end = (start + self.chunk_size).min(words.len());
                let window = &words[start..end];
                (window.len() >= self.min_words).then(|| Chunk {
                    position,
                    text: window.join(" "),
                    word_count: window.len(),
                })
            })
            .collect()
    }
}
