//! Turn a markdown-flavoured reply into text that reads well aloud.

/// Strip markdown markup and collapse whitespace. Falls back to the input
/// when nothing speakable is left.
pub fn clean_for_speech(text: &str) -> String {
    let without_fences = strip_code_fences(text);

    let mut lines = Vec::new();
    for line in without_fences.lines() {
        let line = strip_line_marker(line.trim_start());
        lines.push(strip_inline(line));
    }

    let joined = lines.join(" ");
    let collapsed = joined.split_whitespace().collect::<Vec<_>>().join(" ");
    let cleaned = tighten_punctuation(&collapsed);

    if cleaned.is_empty() {
        text.trim().to_string()
    } else {
        cleaned
    }
}

fn strip_code_fences(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("```") {
        match rest[start + 3..].find("```") {
            Some(end) => {
                out.push_str(&rest[..start]);
                rest = &rest[start + 3 + end + 3..];
            }
            None => break,
        }
    }
    out.push_str(rest);
    out
}

/// Drop heading hashes, list bullets, ordered-list numbers and quote markers.
fn strip_line_marker(line: &str) -> &str {
    if line.starts_with('#') {
        return line.trim_start_matches('#').trim_start();
    }
    if line.starts_with('>') {
        return line.trim_start_matches('>').trim_start();
    }
    for bullet in ["- ", "* ", "+ "] {
        if let Some(rest) = line.strip_prefix(bullet) {
            return rest;
        }
    }
    if let Some(dot) = line.find(". ") {
        let number = &line[..dot];
        if !number.is_empty() && number.chars().all(|c| c.is_ascii_digit()) {
            return &line[dot + 2..];
        }
    }
    line
}

/// Remove emphasis and inline code markers, keep link text without the URL.
fn strip_inline(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let chars: Vec<char> = line.chars().collect();
    let emphasis = emphasis_markers(&chars);
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' | '~' if emphasis[i] => {}
            '`' => {}
            '_' if is_markup_underscore(&chars, i) => {}
            '[' => {
                if let Some((label, next)) = parse_link(&chars, i) {
                    out.push_str(&label);
                    i = next;
                    continue;
                }
                out.push('[');
            }
            c => out.push(c),
        }
        i += 1;
    }
    out
}

/// Marks the `*` and `~` runs that open or close an emphasis span. A lone
/// or space-surrounded marker ("5 * 3", "~10 minutes") is left alone.
fn emphasis_markers(chars: &[char]) -> Vec<bool> {
    let mut marked = vec![false; chars.len()];
    let mut i = 0;
    while i < chars.len() {
        let marker = chars[i];
        if !matches!(marker, '*' | '~') || marked[i] {
            i += 1;
            continue;
        }
        let len = run_len(chars, i);
        let opens = chars.get(i + len).is_some_and(|c| !c.is_whitespace());
        if opens {
            if let Some(close) = find_closing(chars, &marked, i + len, marker, len) {
                marked[i..i + len].fill(true);
                marked[close..close + len].fill(true);
            }
        }
        i += len;
    }
    marked
}

fn run_len(chars: &[char], start: usize) -> usize {
    chars[start..].iter().take_while(|&&c| c == chars[start]).count()
}

/// Next unmarked run of exactly `len` markers that follows a non-space character.
fn find_closing(chars: &[char], marked: &[bool], from: usize, marker: char, len: usize) -> Option<usize> {
    let mut j = from;
    while j < chars.len() {
        if chars[j] != marker || marked[j] {
            j += 1;
            continue;
        }
        let run = run_len(chars, j);
        if run == len && !chars[j - 1].is_whitespace() {
            return Some(j);
        }
        j += run;
    }
    None
}

/// Underscores inside a word (snake_case, e-mail addresses) are kept.
fn is_markup_underscore(chars: &[char], i: usize) -> bool {
    let before = i.checked_sub(1).map(|j| chars[j]);
    let after = chars.get(i + 1).copied();
    let word = |c: Option<char>| c.map(|c| c.is_alphanumeric()).unwrap_or(false);
    !(word(before) && word(after))
}

/// `[label](url)` starting at `start`; returns the label and the index after `)`.
fn parse_link(chars: &[char], start: usize) -> Option<(String, usize)> {
    let close = start + chars[start..].iter().position(|&c| c == ']')?;
    if chars.get(close + 1) != Some(&'(') {
        return None;
    }
    let end = close + 1 + chars[close + 1..].iter().position(|&c| c == ')')?;
    let label: String = chars[start + 1..close].iter().collect();
    Some((label, end + 1))
}

fn tighten_punctuation(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, ',' | '.' | '!' | '?' | ';' | ':' | '।') && out.ends_with(' ') {
            out.pop();
        }
        out.push(c);
    }
    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_unchanged() {
        assert_eq!(clean_for_speech("Hello there."), "Hello there.");
    }

    #[test]
    fn test_strips_emphasis_and_headers() {
        let text = "## Loans\n**Hawlader Bank** offers *home* loans.";
        assert_eq!(clean_for_speech(text), "Loans Hawlader Bank offers home loans.");
    }

    #[test]
    fn test_strips_lists() {
        let text = "Steps:\n1. Visit a branch\n2. Bring your NID\n- Fill the form";
        assert_eq!(
            clean_for_speech(text),
            "Steps: Visit a branch Bring your NID Fill the form"
        );
    }

    #[test]
    fn test_links_keep_label() {
        let text = "See [our site](https://example.com) for details.";
        assert_eq!(clean_for_speech(text), "See our site for details.");
    }

    #[test]
    fn test_code_fences_removed() {
        let text = "Before\n```\nlet x = 1;\n```\nAfter";
        assert_eq!(clean_for_speech(text), "Before After");
    }

    #[test]
    fn test_email_underscore_kept() {
        let text = "Write to help_desk@example.com _today_.";
        assert_eq!(clean_for_speech(text), "Write to help_desk@example.com today.");
    }

    #[test]
    fn test_bengali_text_survives() {
        let text = "**আমি** ভালো আছি ।";
        assert_eq!(clean_for_speech(text), "আমি ভালো আছি।");
    }

    #[test]
    fn test_lone_markers_are_spoken() {
        assert_eq!(clean_for_speech("5 * 3 = 15"), "5 * 3 = 15");
        assert_eq!(clean_for_speech("about ~10 minutes"), "about ~10 minutes");
        assert_eq!(
            clean_for_speech("**Fee:** ~2% of *loan* amount"),
            "Fee: ~2% of loan amount"
        );
    }

    #[test]
    fn test_nested_and_strikethrough_emphasis() {
        assert_eq!(
            clean_for_speech("**a *b* c** and ~~old~~ new"),
            "a b c and old new"
        );
    }

    #[test]
    fn test_markup_only_falls_back() {
        assert_eq!(clean_for_speech("**"), "**");
    }
}
