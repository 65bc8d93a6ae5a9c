//! Code-fence-aware message splitter.
//!
//! Splits on line boundaries. When a split falls inside a fenced code block
//! the fence is closed at the end of the chunk and re-opened, with its
//! language tag, at the start of the next one. A line too long for any chunk
//! is wrapped, preferably at a space. Lengths are counted in chars.

const FENCE: &str = "```";
/// `\n` plus the closing fence.
const CLOSE_COST: usize = 4;
/// Below this a chunk cannot hold a fence pair and any content.
const MIN_CHUNK: usize = 32;

/// Split `text` into chunks of at most `max_chars` characters.
///
/// Deterministic for a given input. Text that already fits is returned as a
/// single chunk, unchanged.
pub fn split_chunks(text: &str, max_chars: usize) -> Vec<String> {
    let max = max_chars.max(MIN_CHUNK);
    if char_len(text) <= max {
        return vec![text.to_string()];
    }

    let mut chunks: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;
    let mut fence_lang: Option<String> = None;

    for raw in text.split('\n') {
        for line in wrap_line(raw, line_capacity(raw, fence_lang.as_deref(), max)) {
            let line_len = char_len(line);
            let is_fence = line.trim_start().starts_with(FENCE);
            let open_after = fence_lang.is_some() != is_fence;
            let reserve = if open_after { CLOSE_COST } else { 0 };
            let cost = if current.is_empty() { line_len } else { 1 + line_len };

            if !current.is_empty() && current_len + cost + reserve > max {
                if fence_lang.is_some() {
                    current.push('\n');
                    current.push_str(FENCE);
                }
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
                if let Some(lang) = &fence_lang {
                    current.push_str(FENCE);
                    current.push_str(lang);
                    current_len = FENCE.len() + char_len(lang);
                }
            }

            if !current.is_empty() {
                current.push('\n');
                current_len += 1;
            }
            current.push_str(line);
            current_len += line_len;

            if is_fence {
                fence_lang = match fence_lang {
                    Some(_) => None,
                    None => Some(line.trim_start()[FENCE.len()..].trim().to_string()),
                };
            }
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    // Only reachable with an absurdly long language tag.
    chunks
        .into_iter()
        .flat_map(|chunk| hard_split(&chunk, max))
        .collect()
}

/// Room left for one line in a fresh chunk: inside a code block the
/// reopened fence and the closing fence take their share.
fn line_capacity(line: &str, fence_lang: Option<&str>, max: usize) -> usize {
    match fence_lang {
        Some(lang) if !line.trim_start().starts_with(FENCE) => {
            max.saturating_sub(FENCE.len() + char_len(lang) + 1 + CLOSE_COST).max(1)
        }
        _ => max,
    }
}

/// Wrap one line into pieces of at most `cap` chars, breaking at the last
/// space that keeps leading indentation on the first piece.
fn wrap_line(line: &str, cap: usize) -> Vec<&str> {
    let mut out = Vec::new();
    let mut rest = line;
    while let Some((limit, next)) = rest.char_indices().nth(cap) {
        let indent = rest.len() - rest.trim_start().len();
        let window = &rest[..limit];
        // A space right at the limit is as good a break as one inside it.
        let candidate = &rest[..limit + next.len_utf8()];
        match candidate.rfind(' ').filter(|&i| i > indent) {
            Some(i) => {
                out.push(&rest[..i]);
                rest = &rest[i + 1..];
            }
            None => {
                out.push(window);
                rest = &rest[limit..];
            }
        }
    }
    out.push(rest);
    out
}

/// Break `chunk` at the last newline or space before `max` chars, or exactly
/// at `max` chars when there is neither. The separator itself is dropped;
/// indentation after it is kept.
fn hard_split(chunk: &str, max: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut remaining = chunk;
    while let Some((limit, _)) = remaining.char_indices().nth(max) {
        let window = &remaining[..limit];
        let split_at = window
            .rfind('\n')
            .or_else(|| window.rfind(' '))
            .filter(|&i| i > 0);
        match split_at {
            Some(i) => {
                out.push(remaining[..i].to_string());
                remaining = &remaining[i + 1..];
            }
            None => {
                out.push(window.to_string());
                remaining = &remaining[limit..];
            }
        }
    }
    if !remaining.is_empty() {
        out.push(remaining.to_string());
    }
    out
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fence_lines(chunk: &str) -> usize {
        chunk
            .lines()
            .filter(|l| l.trim_start().starts_with(FENCE))
            .count()
    }

    #[test]
    fn short_text_is_single_chunk() {
        assert_eq!(split_chunks("Hello, world!", 1500), vec!["Hello, world!"]);
    }

    #[test]
    fn exactly_max_is_single_chunk() {
        let text = "a".repeat(1500);
        assert_eq!(split_chunks(&text, 1500).len(), 1);
    }

    #[test]
    fn over_limit_splits_on_newline() {
        let line = "a".repeat(600);
        let text = format!("{line}\n{line}\n{line}");
        let chunks = split_chunks(&text, 1500);
        assert_eq!(chunks.len(), 2);
        for c in &chunks {
            assert!(char_len(c) <= 1500, "chunk too large: {}", char_len(c));
        }
        assert_eq!(chunks.join("\n"), text);
    }

    #[test]
    fn very_long_single_line_force_splits() {
        let text = "x".repeat(4000);
        let chunks = split_chunks(&text, 1500);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| char_len(c) <= 1500));
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn code_fence_closed_and_reopened_with_language() {
        let mut text = String::from("Intro.\n```python\n");
        for i in 0..100 {
            text.push_str(&format!("print('line number {i:03} of a long listing')\n"));
        }
        text.push_str("```\nAfter fence.");

        let chunks = split_chunks(&text, 500);
        assert!(chunks.len() >= 2);
        for c in &chunks {
            assert!(char_len(c) <= 500, "chunk too large: {}", char_len(c));
            assert_eq!(fence_lines(c) % 2, 0, "unbalanced fences in {c:?}");
        }
        assert!(chunks[1].starts_with("```python\n"));
        assert!(chunks.last().unwrap().ends_with("After fence."));
    }

    #[test]
    fn long_code_line_keeps_indentation_and_balanced_fences() {
        let mut text = String::from("```python\ndef run():\n");
        for _ in 0..6 {
            text.push_str("        value = compute(alpha, beta, gamma, delta)\n");
        }
        text.push_str("```");

        let chunks = split_chunks(&text, MIN_CHUNK + 28);
        assert!(chunks.len() >= 2);
        for c in &chunks {
            assert!(char_len(c) <= MIN_CHUNK + 28, "chunk too large: {c:?}");
            assert_eq!(fence_lines(c) % 2, 0, "unbalanced fences in {c:?}");
        }
        for c in &chunks[1..] {
            assert!(c.starts_with("```python\n"), "fence not reopened in {c:?}");
        }
        let body = chunks.join("\n");
        assert_eq!(body.matches("        value = compute(alpha,").count(), 6);
    }

    #[test]
    fn hard_split_keeps_indentation_after_newline() {
        assert_eq!(hard_split("abc\n  de", 6), vec!["abc", "  de"]);
        assert_eq!(hard_split("abcdefgh", 3), vec!["abc", "def", "gh"]);
    }

    #[test]
    fn wrap_line_prefers_spaces_after_indent() {
        assert_eq!(wrap_line("    aa bb cc", 9), vec!["    aa bb", "cc"]);
        assert_eq!(wrap_line("    abcdefgh", 6), vec!["    ab", "cdefgh"]);
        assert_eq!(wrap_line("short", 10), vec!["short"]);
    }

    #[test]
    fn multibyte_text_counts_chars_not_bytes() {
        let text = "héllo wörld ".repeat(300);
        let chunks = split_chunks(&text, 1000);
        assert!(chunks.len() >= 4);
        assert!(chunks.iter().all(|c| char_len(c) <= 1000));
    }

    #[test]
    fn splitting_is_deterministic() {
        let text = "word ".repeat(1000);
        assert_eq!(split_chunks(&text, 700), split_chunks(&text, 700));
    }

    #[test]
    fn tiny_limit_is_clamped() {
        let chunks = split_chunks(&"z".repeat(100), 1);
        assert!(chunks.iter().all(|c| char_len(c) <= MIN_CHUNK));
    }
}
