//! Reply delivery. Discord caps messages at 2000 characters; replies are
//! cut at the latest newline that fits, falling back to the latest space and
//! then to a plain character boundary, so multi-byte text never panics a
//! send.

/// Discord's hard message limit.
const DISCORD_LIMIT: usize = 2000;

/// Split a reply into Discord-sized chunks.
pub fn split_message(text: &str) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut rest = text;
    while rest.len() > DISCORD_LIMIT {
        let cut = split_point(rest, DISCORD_LIMIT);
        if cut == 0 {
            break;
        }
        let piece = rest[..cut].trim_end();
        if !piece.is_empty() {
            chunks.push(piece.to_string());
        }
        rest = rest[cut..].trim_start();
    }
    if !rest.is_empty() {
        chunks.push(rest.to_string());
    }
    chunks
}

/// Byte index to cut at: the end of the last newline that fits within
/// `limit`, else the last space, else the last full character.
fn split_point(text: &str, limit: usize) -> usize {
    let mut last_char_end = 0;
    let mut last_space_end = None;
    let mut last_newline_end = None;
    for (start, ch) in text.char_indices() {
        let end = start + ch.len_utf8();
        if end > limit {
            break;
        }
        last_char_end = end;
        match ch {
            '\n' => last_newline_end = Some(end),
            ' ' => last_space_end = Some(end),
            _ => {}
        }
    }
    last_newline_end
        .or(last_space_end)
        .unwrap_or(last_char_end)
}

/// Send `text` to `channel_id` in sequential chunks.
pub async fn send_chunked(
    http: &serenity::http::Http,
    channel_id: serenity::model::id::ChannelId,
    text: &str,
) -> Result<(), serenity::Error> {
    for chunk in split_message(text) {
        channel_id.say(http, &chunk).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_reply_passes_through_unchanged() {
        assert_eq!(split_message("Hello, world!"), vec!["Hello, world!"]);
    }

    #[test]
    fn reply_at_the_limit_stays_whole() {
        let text = "a".repeat(DISCORD_LIMIT);
        assert_eq!(split_message(&text).len(), 1);
    }

    #[test]
    fn newline_is_preferred_over_space() {
        let head = format!("{} b\nsecond", "a ".repeat(900));
        let text = format!("{head} {}", "c".repeat(500));
        let chunks = split_message(&text);
        assert!(chunks.len() >= 2);
        assert!(
            chunks[0].ends_with('b'),
            "cut should land on the newline, got ...{:?}",
            &chunks[0][chunks[0].len().saturating_sub(12)..]
        );
    }

    #[test]
    fn word_boundaries_are_respected_where_possible() {
        let text = "word ".repeat(1000);
        let chunks = split_message(&text);
        assert!(chunks.len() >= 2);
        for c in &chunks {
            assert!(c.len() <= DISCORD_LIMIT);
            assert!(c.trim_end().ends_with("word"), "no chunk ends mid-word");
        }
    }

    #[test]
    fn unbroken_text_still_splits() {
        let text = "x".repeat(5000);
        let chunks = split_message(&text);
        assert_eq!(chunks.len(), 3);
        for c in &chunks {
            assert!(c.len() <= DISCORD_LIMIT);
        }
    }

    #[test]
    fn multibyte_text_never_splits_inside_a_character() {
        let text = "\u{00E9}".repeat(3000); // 6000 bytes of accented e
        let chunks = split_message(&text);
        assert!(chunks.len() >= 2);
        for c in &chunks {
            assert!(c.len() <= DISCORD_LIMIT);
            assert!(c.chars().all(|ch| ch == '\u{00E9}'));
        }
    }
}
