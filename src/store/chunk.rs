//! Split long content into store-safe blocks at word boundaries (spec §4.8
//! "Content chunking" — the store's per-block character limit, default 1800).

/// Split `text` into chunks of at most `max_chars`, never splitting a word.
/// A single word longer than `max_chars` is emitted as its own oversized
/// chunk rather than being truncated.
pub fn chunk_content(text: &str, max_chars: usize) -> Vec<String> {
    if text.len() <= max_chars {
        return if text.is_empty() { vec![] } else { vec![text.to_string()] };
    }

    let mut chunks = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let candidate_len = if current.is_empty() { word.len() } else { current.len() + 1 + word.len() };
        if candidate_len > max_chars && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
