/// Scans for the first balanced `[...]` JSON array in a response body that the device may have
/// appended junk after (§4.5 "Upstream robustness"). Returns the balanced slice, or `None` if no
/// complete array is found. String contents (including escaped brackets) are skipped correctly.
pub fn extract_json_array(raw: &str) -> Option<&str> {
    let bytes = raw.as_bytes();
    let start = raw.find('[')?;

    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, &byte) in bytes[start..].iter().enumerate() {
        let ch = byte as char;
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    let end = start + offset + 1;
                    return Some(&raw[start..end]);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_array_with_trailing_junk() {
        let raw = r#"[{"name":"01.mp3","size":123}]garbage-after-the-array{{{"#;
        assert_eq!(extract_json_array(raw), Some(r#"[{"name":"01.mp3","size":123}]"#));
    }

    #[test]
    fn handles_nested_brackets_and_escaped_quotes() {
        let raw = r#"[{"name":"a \"quoted\" [thing].mp3","size":1},{"name":"b.mp3","size":2}]trailer"#;
        let extracted = extract_json_array(raw).unwrap();
        assert!(extracted.ends_with("}]"));
        assert!(extracted.starts_with('['));
    }

    #[test]
    fn returns_none_without_a_complete_array() {
        assert_eq!(extract_json_array(r#"{"not":"an array"}"#), None);
        assert_eq!(extract_json_array(r#"[{"unterminated":true}"#), None);
    }
}
