use regex::Regex;
use std::sync::LazyLock;

static THINK_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<think>.*?</think>").expect("valid regex"));
static BRACKET_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)\[(thinking|thought|reasoning)\].*?\[/(thinking|thought|reasoning)\]")
        .expect("valid regex")
});
static BLANK_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*\n(\s*\n)+").expect("valid regex"));

/// Strip reasoning blocks some models emit before their answer.
pub fn filter_thinking_tags(text: &str) -> String {
    let text = THINK_BLOCK.replace_all(text, "");
    let text = BRACKET_BLOCK.replace_all(&text, "");
    let text = BLANK_RUN.replace_all(&text, "\n\n");
    text.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removes_think_blocks() {
        let raw = "<think>\nweighing options\n</think>\n## Migraine with Aura";
        assert_eq!(filter_thinking_tags(raw), "## Migraine with Aura");
    }

    #[test]
    fn removes_bracketed_reasoning_and_collapses_blank_lines() {
        let raw = "[reasoning]internal[/reasoning]Answer\n\n\n\nMore";
        assert_eq!(filter_thinking_tags(raw), "Answer\n\nMore");
    }

    #[test]
    fn plain_text_is_untouched() {
        assert_eq!(filter_thinking_tags("Plain answer"), "Plain answer");
    }
}
