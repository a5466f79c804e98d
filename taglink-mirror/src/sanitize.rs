use unicode_normalization::UnicodeNormalization;

const FORBIDDEN: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Unicode-normalizes and strips a path component down to something safe for the device's
/// filesystem (§4.5). Decomposes to NFD, drops combining diacritics, replaces forbidden
/// characters and whitespace with `_`, collapses repeats, trims leading/trailing `_`/`.`, and
/// truncates to `max_len`. Empty output becomes `unknown`.
pub fn sanitize_component(input: &str, max_len: usize) -> String {
    let decomposed: String = input.nfd().filter(|c| !is_combining_mark(*c)).collect();

    let mut out = String::with_capacity(decomposed.len());
    let mut last_was_underscore = false;
    for ch in decomposed.chars() {
        let replaced = if ch.is_whitespace() || FORBIDDEN.contains(&ch) || (ch as u32) < 0x20 {
            '_'
        } else {
            ch
        };
        if replaced == '_' {
            if last_was_underscore {
                continue;
            }
            last_was_underscore = true;
        } else {
            last_was_underscore = false;
        }
        out.push(replaced);
    }

    let trimmed = out.trim_matches(|c| c == '_' || c == '.');
    let truncated: String = trimmed.chars().take(max_len).collect();
    let truncated = truncated.trim_matches(|c| c == '_' || c == '.');

    if truncated.is_empty() {
        "unknown".to_string()
    } else {
        truncated.to_string()
    }
}

fn is_combining_mark(c: char) -> bool {
    matches!(c as u32, 0x0300..=0x036F)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_diacritics() {
        assert_eq!(sanitize_component("Café Müller", 50), "Cafe_Muller");
    }

    #[test]
    fn replaces_forbidden_characters_and_collapses_runs() {
        assert_eq!(sanitize_component("a/b\\c:d", 50), "a_b_c_d");
    }

    #[test]
    fn trims_and_truncates() {
        assert_eq!(sanitize_component("  .hello.  ", 3), "hel");
    }

    #[test]
    fn empty_becomes_unknown() {
        assert_eq!(sanitize_component("   ", 50), "unknown");
        assert_eq!(sanitize_component("...", 50), "unknown");
    }
}
