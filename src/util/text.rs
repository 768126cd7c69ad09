//! Text truncation and chunk decoding helpers.

/// Cut `s` to at most `max_bytes` without splitting a code point.
pub fn truncate_utf8(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut cutoff = max_bytes;
    while cutoff > 0 && !s.is_char_boundary(cutoff) {
        cutoff -= 1;
    }
    &s[..cutoff]
}

/// Keep the first `max_chars` characters, appending `marker` when cut.
pub fn truncate_chars(s: &str, max_chars: usize, marker: &str) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}{marker}", &s[..idx]),
        None => s.to_string(),
    }
}

/// Split off the longest valid UTF-8 prefix, keeping an incomplete
/// trailing sequence for the next chunk.
///
/// Bytes that can never become valid are replaced with U+FFFD.
pub fn take_utf8(pending: &mut Vec<u8>) -> String {
    let valid = match std::str::from_utf8(pending) {
        Ok(_) => pending.len(),
        Err(e) if e.error_len().is_none() => e.valid_up_to(),
        Err(_) => {
            let text = String::from_utf8_lossy(pending).into_owned();
            pending.clear();
            return text;
        }
    };
    let rest = pending.split_off(valid);
    let text = String::from_utf8_lossy(pending).into_owned();
    *pending = rest;
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_utf8_never_splits_codepoints() {
        let s = "héllo";
        assert_eq!(truncate_utf8(s, 2), "h");
        assert_eq!(truncate_utf8(s, 3), "hé");
        assert_eq!(truncate_utf8(s, 64), s);
    }

    #[test]
    fn truncate_chars_counts_characters() {
        assert_eq!(truncate_chars("가나다라", 2, "..."), "가나...");
        assert_eq!(truncate_chars("abc", 3, "..."), "abc");
    }

    #[test]
    fn take_utf8_holds_back_split_sequences() {
        let bytes = "안".as_bytes();
        let mut pending = vec![b'a', bytes[0], bytes[1]];
        assert_eq!(take_utf8(&mut pending), "a");
        assert_eq!(pending.len(), 2);
        pending.push(bytes[2]);
        assert_eq!(take_utf8(&mut pending), "안");
        assert!(pending.is_empty());
    }

    #[test]
    fn take_utf8_replaces_invalid_bytes() {
        let mut pending = vec![b'a', 0xff, b'b'];
        assert_eq!(take_utf8(&mut pending), "a\u{fffd}b");
        assert!(pending.is_empty());
    }
}
