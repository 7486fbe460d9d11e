//! Reply delivery. Telegram caps messages at 4096 characters. Long replies
//! are assembled line by line into chunks; a chunk that ends inside a fenced
//! code block closes the fence and the next chunk reopens it with the same
//! language tag. Single oversized lines are wrapped at character boundaries,
//! so multi-byte text never panics a send.

use std::time::Duration;

use teloxide::prelude::*;
use tracing::warn;

/// Telegram's hard message limit.
const TELEGRAM_LIMIT: usize = 4096;
/// Room reserved in every chunk for the closing fence marker.
const FENCE_RESERVE: usize = 8;

/// Split a reply into Telegram-sized chunks.
pub fn split_reply(text: &str) -> Vec<String> {
    let budget = TELEGRAM_LIMIT - FENCE_RESERVE;
    let mut builder = ChunkBuilder::new(budget);
    for line in text.split('\n') {
        builder.push_line(line);
    }
    builder.finish()
}

/// Accumulates lines into chunks, carrying code-fence state across chunk
/// boundaries.
struct ChunkBuilder {
    budget: usize,
    chunks: Vec<String>,
    buf: String,
    /// Language tag of the currently open fence, if any ("" for a bare fence).
    fence: Option<String>,
}

impl ChunkBuilder {
    fn new(budget: usize) -> Self {
        Self {
            budget,
            chunks: Vec::new(),
            buf: String::new(),
            fence: None,
        }
    }

    fn push_line(&mut self, line: &str) {
        if line.len() > self.budget {
            for piece in wrap_line(line, self.budget) {
                self.append(&piece);
            }
        } else {
            self.append(line);
        }
        self.note_fence(line);
    }

    /// Add one segment that is known to fit, starting a new chunk when the
    /// current one is full.
    fn append(&mut self, segment: &str) {
        if !self.buf.is_empty() && self.buf.len() + 1 + segment.len() > self.budget {
            self.seal_chunk();
        }
        if !self.buf.is_empty() {
            self.buf.push('\n');
        }
        self.buf.push_str(segment);
    }

    /// Finish the current chunk: close an open fence, emit, and reopen the
    /// fence at the head of the next chunk.
    fn seal_chunk(&mut self) {
        if self.fence.is_some() {
            self.buf.push_str("\n```");
        }
        self.chunks.push(std::mem::take(&mut self.buf));
        if let Some(lang) = &self.fence {
            self.buf = format!("```{lang}");
        }
    }

    fn note_fence(&mut self, line: &str) {
        if let Some(rest) = line.trim_start().strip_prefix("```") {
            self.fence = match self.fence {
                Some(_) => None,
                None => Some(rest.trim().to_string()),
            };
        }
    }

    fn finish(mut self) -> Vec<String> {
        // A trailing buffer holding only a reopened fence header carries no
        // content and is dropped.
        let reopen_only = self
            .fence
            .as_ref()
            .is_some_and(|lang| self.buf == format!("```{lang}"));
        if !self.buf.is_empty() && !reopen_only {
            self.chunks.push(self.buf);
        }
        self.chunks
    }
}

/// Wrap one overlong line into pieces of at most `budget` bytes, breaking at
/// the last whitespace that fits when there is one, and never inside a UTF-8
/// sequence.
fn wrap_line(line: &str, budget: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut rest = line;
    while rest.len() > budget {
        let cut = break_index(rest, budget);
        if cut == 0 {
            break;
        }
        pieces.push(rest[..cut].trim_end().to_string());
        rest = rest[cut..].trim_start();
    }
    if !rest.is_empty() {
        pieces.push(rest.to_string());
    }
    pieces
}

/// Byte index to cut at: the end of the last whitespace character that fits
/// within `budget`, or the end of the last full character.
fn break_index(text: &str, budget: usize) -> usize {
    let mut last_char_end = 0;
    let mut last_space_end = None;
    for (start, ch) in text.char_indices() {
        let end = start + ch.len_utf8();
        if end > budget {
            break;
        }
        last_char_end = end;
        if ch.is_whitespace() {
            last_space_end = Some(end);
        }
    }
    last_space_end.unwrap_or(last_char_end)
}

/// Send `text` to `chat_id` in chunks, with a short pause between chunks to
/// stay clear of rate limits.
pub async fn send_response(bot: &Bot, chat_id: ChatId, text: &str) {
    let chunks = split_reply(text);
    let total = chunks.len();
    for (i, chunk) in chunks.into_iter().enumerate() {
        if let Err(e) = bot.send_message(chat_id, &chunk).await {
            warn!(error = %e, chunk_index = i, "Telegram send failed");
        }
        if i + 1 < total {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
}
