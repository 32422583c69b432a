/// Splits `text` into chunks of at most `max_chars` characters, preferring to
/// break after a newline, then after a space.
pub fn split_message(text: &str, max_chars: usize) -> Vec<String> {
    if max_chars == 0 || text.chars().count() <= max_chars {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        let limit = match remaining.char_indices().nth(max_chars) {
            Some((idx, _)) => idx,
            None => {
                chunks.push(remaining.to_string());
                break;
            }
        };

        let window = &remaining[..limit];
        let split_at = window
            .rfind('\n')
            .map(|i| i + 1)
            .or_else(|| window.rfind(' ').map(|i| i + 1))
            .unwrap_or(limit);

        let chunk = &remaining[..split_at];
        if !chunk.trim().is_empty() {
            chunks.push(chunk.to_string());
        }
        remaining = &remaining[split_at..];
    }

    if chunks.is_empty() {
        chunks.push(text.chars().take(max_chars).collect());
    }

    chunks
}

/// `whatsapp:+972501234567` -> `972501234567`
pub fn normalize_phone(raw: &str) -> String {
    raw.trim()
        .trim_start_matches("whatsapp:")
        .replace('+', "")
}

/// `972501234567@s.whatsapp.net` -> `972501234567`
pub fn phone_from_jid(jid: &str) -> String {
    jid.trim_end_matches("@s.whatsapp.net").to_string()
}

pub fn whatsapp_address(number: &str) -> String {
    if number.starts_with("whatsapp:") {
        number.to_string()
    } else if number.starts_with('+') {
        format!("whatsapp:{}", number)
    } else {
        format!("whatsapp:+{}", number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_one_chunk() {
        assert_eq!(split_message("hello", 1600), vec!["hello"]);
    }

    #[test]
    fn splits_on_word_boundaries() {
        let chunks = split_message("aaaa bbbb cccc", 10);
        assert_eq!(chunks, vec!["aaaa bbbb ", "cccc"]);
    }

    #[test]
    fn prefers_newlines() {
        let chunks = split_message("line one\nline two two", 12);
        assert_eq!(chunks[0], "line one\n");
    }

    #[test]
    fn multibyte_text_never_splits_inside_a_character() {
        let text = "שלום ".repeat(500);
        let chunks = split_message(&text, 1600);
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.chars().count() <= 1600));
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn phone_normalisation() {
        assert_eq!(normalize_phone("whatsapp:+972501234567"), "972501234567");
        assert_eq!(phone_from_jid("972501234567@s.whatsapp.net"), "972501234567");
        assert_eq!(whatsapp_address("972501234567"), "whatsapp:+972501234567");
        assert_eq!(whatsapp_address("whatsapp:+1"), "whatsapp:+1");
    }
}
