//! Rewrites fenced code blocks so they read well in WhatsApp.
//!
//! WhatsApp ignores language tags on fences, so each complete block gets a
//! bold label line (`*PYTHON CODE:*`, or `*CODE:*` when untagged) followed by
//! a bare fence. Prose and unclosed fences are left alone.

const FENCE: &str = "```";

/// Label every complete fenced block in `raw`.
///
/// Pure and idempotent: formatting already formatted text changes nothing.
pub fn format_for_chat(raw: &str) -> String {
    let lines: Vec<&str> = raw.split('\n').collect();
    let mut out: Vec<String> = Vec::with_capacity(lines.len() + 4);
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];
        let Some(lang) = opening_fence(line) else {
            out.push(line.to_string());
            i += 1;
            continue;
        };

        let Some(close) = (i + 1..lines.len()).find(|&j| lines[j].trim() == FENCE) else {
            // Unclosed: the fence and everything after it stay as they are.
            out.extend(lines[i..].iter().map(|l| l.to_string()));
            break;
        };

        let labelled = out.last().is_some_and(|prev| is_label(prev));
        if !labelled {
            out.push(label_for(lang));
        }
        out.push(FENCE.to_string());
        out.extend(lines[i + 1..close].iter().map(|l| l.to_string()));
        out.push(FENCE.to_string());
        i = close + 1;
    }

    out.join("\n")
}

/// `Some(lang)` when `line` opens a fence; `lang` is empty for a bare fence.
fn opening_fence(line: &str) -> Option<&str> {
    let rest = line.trim_start().strip_prefix(FENCE)?.trim_end();
    let is_tag = rest
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '#' | '_' | '.'));
    is_tag.then_some(rest)
}

fn label_for(lang: &str) -> String {
    if lang.is_empty() {
        "*CODE:*".to_string()
    } else {
        format!("*{} CODE:*", lang.to_uppercase())
    }
}

fn is_label(line: &str) -> bool {
    let t = line.trim();
    t == "*CODE:*" || (t.starts_with('*') && t.ends_with(" CODE:*"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tagged_block_gets_language_label() {
        let raw = "Here you go:\n```python\nprint('hi')\n```\nDone.";
        assert_eq!(
            format_for_chat(raw),
            "Here you go:\n*PYTHON CODE:*\n```\nprint('hi')\n```\nDone."
        );
    }

    #[test]
    fn bare_block_gets_generic_label() {
        let raw = "```\nls -la\n```";
        assert_eq!(format_for_chat(raw), "*CODE:*\n```\nls -la\n```");
    }

    #[test]
    fn prose_is_untouched() {
        let raw = "No code here.\n\nJust `inline` backticks.";
        assert_eq!(format_for_chat(raw), raw);
    }

    #[test]
    fn unclosed_fence_passes_through() {
        let raw = "Intro\n```rust\nfn main() {}\nand more";
        assert_eq!(format_for_chat(raw), raw);
    }

    #[test]
    fn multiple_blocks_are_each_labelled() {
        let raw = "```js\na()\n```\ntext\n```\nb\n```";
        assert_eq!(
            format_for_chat(raw),
            "*JS CODE:*\n```\na()\n```\ntext\n*CODE:*\n```\nb\n```"
        );
    }

    #[test]
    fn formatting_is_idempotent() {
        let samples = [
            "Here:\n```python\nx = 1\n```\nthen\n```\ny\n```\n",
            "```c++\nint main() {}\n```",
            "open ```\n```sh\necho\n",
            "nested\n```md\n```python\ninner\n```\n",
            "",
            "plain",
        ];
        for raw in samples {
            let once = format_for_chat(raw);
            assert_eq!(format_for_chat(&once), once, "input: {raw:?}");
        }
    }

    #[test]
    fn empty_input_stays_empty() {
        assert_eq!(format_for_chat(""), "");
    }
}
