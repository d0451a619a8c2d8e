use common::error::AppError;

/// Sentence-boundary-preserving chunker.
///
/// Splits on terminal punctuation followed by whitespace and greedily packs
/// whole sentences into chunks of at most `chunk_size` characters. A single
/// sentence longer than `chunk_size` is sliced into fixed-width pieces.
/// After boundaries are fixed, every chunk but the first is prefixed with
/// the trailing `overlap` characters of its predecessor for context
/// continuity, so only the first chunk is guaranteed to stay within
/// `chunk_size`.
///
/// All lengths are Unicode scalar counts.
#[derive(Debug, Clone, Copy)]
pub struct Chunker {
    chunk_size: usize,
    overlap: usize,
}

impl Chunker {
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self, AppError> {
        if chunk_size == 0 {
            return Err(AppError::Validation("chunk_size must be positive".into()));
        }
        if overlap >= chunk_size {
            return Err(AppError::Validation(format!(
                "overlap {overlap} must be smaller than chunk_size {chunk_size}"
            )));
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Splits `text` into ordered, overlapping chunks.
    pub fn chunk(&self, text: &str) -> Vec<String> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Vec::new();
        }
        if char_len(trimmed) <= self.chunk_size {
            return vec![trimmed.to_string()];
        }

        let mut chunks = Vec::new();
        let mut current = String::new();
        let mut current_len = 0usize;

        for sentence in split_sentences(trimmed) {
            let sentence_len = char_len(&sentence);
            let joined_len = if current.is_empty() {
                sentence_len
            } else {
                current_len + 1 + sentence_len
            };

            if joined_len <= self.chunk_size {
                if !current.is_empty() {
                    current.push(' ');
                }
                current.push_str(&sentence);
                current_len = joined_len;
                continue;
            }

            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }

            if sentence_len > self.chunk_size {
                chunks.extend(slice_fixed_width(&sentence, self.chunk_size));
            } else {
                current = sentence;
                current_len = sentence_len;
            }
        }

        if !current.is_empty() {
            chunks.push(current);
        }

        self.apply_overlap(chunks)
    }

    /// Prefixes every chunk after the first with the tail of its
    /// predecessor, taken from the chunk as it stood before overlap.
    fn apply_overlap(&self, chunks: Vec<String>) -> Vec<String> {
        if chunks.len() <= 1 || self.overlap == 0 {
            return chunks;
        }

        let mut out = Vec::with_capacity(chunks.len());
        let mut previous_tail: Option<String> = None;
        for chunk in chunks {
            let tail = tail_chars(&chunk, self.overlap);
            match previous_tail.take() {
                None => out.push(chunk),
                Some(prefix) => out.push(format!("{prefix} {chunk}")),
            }
            previous_tail = Some(tail);
        }
        out
    }
}

/// Sentence boundary: `.`, `!` or `?` immediately followed by whitespace.
/// Punctuation without trailing whitespace does not split.
fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);
        if matches!(c, '.' | '!' | '?') && chars.peek().is_some_and(|next| next.is_whitespace()) {
            while chars.peek().is_some_and(|next| next.is_whitespace()) {
                chars.next();
            }
            let sentence = current.trim();
            if !sentence.is_empty() {
                sentences.push(sentence.to_string());
            }
            current.clear();
        }
    }

    let last = current.trim();
    if !last.is_empty() {
        sentences.push(last.to_string());
    }
    sentences
}

fn slice_fixed_width(sentence: &str, width: usize) -> Vec<String> {
    let chars: Vec<char> = sentence.chars().collect();
    chars
        .chunks(width.max(1))
        .map(|piece| piece.iter().collect())
        .collect()
}

fn tail_chars(text: &str, count: usize) -> String {
    let len = char_len(text);
    if len <= count {
        return text.to_string();
    }
    text.chars().skip(len - count).collect()
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}
