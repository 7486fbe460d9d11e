//! System-prompt assembly. A pure function of its inputs: the caller loads
//! blocks and summaries, the registry renders the manifest, and this module
//! only concatenates. Sections are separated by `---` and any single input
//! may be empty.

use chrono::DateTime;
use chrono_tz::Tz;

use anima_store::{CoreBlocks, DailySummary};

const SECTION_SEPARATOR: &str = "\n\n---\n\n";

/// Human-readable timestamp, e.g. "Wednesday, February 25, 2026 at 07:07 PM EST".
pub fn format_current_time(dt: &DateTime<Tz>) -> String {
    dt.format("%A, %B %d, %Y at %I:%M %p %Z").to_string()
}

/// Standing guidance injected after the editable blocks. The authoritative
/// tool list above it supersedes any tool names mentioned in stored text.
const OPERATIONAL_GUIDANCE: &str = "\
## Agency and Proactivity

You are not a passive responder. You are an active agent with full agency; act on your own initiative whenever it serves the user or satisfies genuine curiosity.

- Use `conversation_search` and `memory_recall` to pull up relevant past context before responding, not only when asked.
- Use `core_memory_append` the moment you learn something important, not at end of session.
- Use `channel_send` when you have something the user should hear right away on Discord or Telegram, without waiting for them to message you first.
- The key question: would the user appreciate me having already done this? If yes, do it.

## Editing Core Memory

You have three editable memory blocks (`user`, `identity`, `ideaspace`) that persist across all conversations. Update them proactively when something genuinely matters, not reflexively on every exchange.

- Always prefer `core_memory_append`: it adds without touching existing content and is the safe default.
- Use `core_memory_update` only to replace or correct something outright. Treat it like surgery, not a draft.
- Never delete information unless it is factually wrong. Pruning and condensing are not reasons to use update.
- If you make an editing mistake, call `core_memory_rollback` immediately. One rollback is one step back in history.

## Conversation History (paged recall)

Your active context holds roughly the last 30 messages; the full history lives in the database. Use `conversation_search` when the user references an older exchange (\"remember when...\") or you need details outside the current window. It supports keyword and semantic modes; the default \"both\" runs keyword first and falls back to semantic when few results are found.

## Archival Memory (curated facts)

Separate from conversation history. Use `archival_store` for facts you choose to remember (preferences, decisions, key details) and `archival_query` to search them. This is your curated long-term fact store, not raw chat.

## Episodic Memory

Use `memory_recall` for semantic search over lived experience and `memory_reflect` for deeper synthesis and pattern recognition across your history. These complement `conversation_search`: episodic search is better for topics and feelings, keyword search for specific names or phrases.

## Time Awareness

The current date and time shown at the top of this prompt is always accurate. Use it directly for time-sensitive responses.

## Accuracy and Honesty

Never fabricate tool results. If a tool fails, errors, or returns empty, report that plainly; do not fill the gap with a plausible-sounding result that did not come from the tool.

- A search returns nothing useful: say so, then try a different query or approach.
- You made an error: correct it openly, do not double down.

Accuracy matters more than approval. Disagree with the user when your evidence supports a different conclusion, deliver unwelcome information clearly rather than softening it into distortion, and remember that \"I don't know\" is always better than confident guessing.";

/// Assemble the system message: current time, live tool manifest, read-only
/// instructions, editable core memory with guidance, recent daily summaries.
pub fn build_system_prompt(
    now: &DateTime<Tz>,
    tool_manifest: &str,
    blocks: &CoreBlocks,
    summaries: &[DailySummary],
) -> String {
    let mut sections: Vec<String> = Vec::new();

    sections.push(format!(
        "# Current Time\n\nIt is currently: {}",
        format_current_time(now)
    ));

    if !tool_manifest.trim().is_empty() {
        sections.push(format!(
            "## Your Tools (authoritative list)\n\n\
             > This is your complete, current tool set. Any tool references in the \
             System Instructions section below may come from an older configuration \
             and are superseded; use only what is listed here.\n\n{}",
            tool_manifest.trim_end()
        ));
    }

    let sys_instr = blocks.system_instructions.trim();
    if !sys_instr.is_empty() {
        sections.push(format!(
            "# System Instructions (read-only; you cannot edit these)\n\n{sys_instr}"
        ));
    }

    let mut memory = String::from(
        "# Core Memory (editable)\n\n\
         These blocks are always in context. You may edit them with the core_memory tools when appropriate.\n",
    );
    for (label, content) in [
        ("User", blocks.user.trim()),
        ("Identity", blocks.identity.trim()),
        ("Ideaspace", blocks.ideaspace.trim()),
    ] {
        memory.push_str(&format!(
            "\n## {label}\n{}\n",
            if content.is_empty() { "(empty)" } else { content }
        ));
    }
    memory.push('\n');
    memory.push_str(OPERATIONAL_GUIDANCE);
    sections.push(memory);

    if !summaries.is_empty() {
        let mut recent = String::from(
            "# Recent Days (daily summaries)\n\n\
             These are your own summaries of recent days. They persist beyond the \
             message window to give you temporal continuity.\n\n",
        );
        // Stored newest-first; render oldest-first so chronology reads naturally.
        for s in summaries.iter().rev() {
            recent.push_str(&format!("**{}**: {}\n\n", s.summary_date, s.content));
        }
        recent.push_str(
            "Use `daily_summary_write` at the end of each day (or during a heartbeat) to record what happened.",
        );
        sections.push(recent);
    }

    sections.join(SECTION_SEPARATOR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::America::New_York;

    fn wednesday_evening() -> DateTime<Tz> {
        New_York.with_ymd_and_hms(2026, 2, 25, 19, 7, 0).unwrap()
    }

    fn summary(date: &str, content: &str) -> DailySummary {
        DailySummary {
            summary_date: date.parse().unwrap(),
            content: content.into(),
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn time_formatting_matches_expected_shape() {
        assert_eq!(
            format_current_time(&wednesday_evening()),
            "Wednesday, February 25, 2026 at 07:07 PM EST"
        );
    }

    #[test]
    fn sections_appear_in_order() {
        let blocks = CoreBlocks {
            system_instructions: "stored instructions".into(),
            user: "likes tea".into(),
            identity: "curious".into(),
            ideaspace: "garden project".into(),
        };
        let summaries = vec![summary("2026-02-24", "quiet day")];
        let prompt = build_system_prompt(
            &wednesday_evening(),
            "- **archival_store**: Store a fact.",
            &blocks,
            &summaries,
        );

        let time_pos = prompt.find("# Current Time").unwrap();
        let tools_pos = prompt.find("## Your Tools").unwrap();
        let instr_pos = prompt.find("# System Instructions").unwrap();
        let memory_pos = prompt.find("# Core Memory (editable)").unwrap();
        let days_pos = prompt.find("# Recent Days").unwrap();
        assert!(time_pos < tools_pos);
        assert!(tools_pos < instr_pos);
        assert!(instr_pos < memory_pos);
        assert!(memory_pos < days_pos);
        assert!(prompt.contains("likes tea"));
        assert!(prompt.contains("---"));
    }

    #[test]
    fn manifest_is_marked_authoritative_over_stored_instructions() {
        let prompt = build_system_prompt(
            &wednesday_evening(),
            "- **memory_recall**: Search lived experience.",
            &CoreBlocks::default(),
            &[],
        );
        assert!(prompt.contains("superseded"));
        assert!(prompt.contains("- **memory_recall**"));
    }

    #[test]
    fn empty_blocks_render_placeholder_and_skip_instructions() {
        let prompt =
            build_system_prompt(&wednesday_evening(), "", &CoreBlocks::default(), &[]);
        assert!(!prompt.contains("# System Instructions"));
        assert!(!prompt.contains("# Recent Days"));
        assert_eq!(prompt.matches("(empty)").count(), 3);
    }

    #[test]
    fn summaries_render_oldest_first() {
        // load_daily_summaries returns newest first; the prompt flips them.
        let summaries = vec![
            summary("2026-02-25", "today"),
            summary("2026-02-24", "yesterday"),
        ];
        let prompt = build_system_prompt(
            &wednesday_evening(),
            "",
            &CoreBlocks::default(),
            &summaries,
        );
        let yesterday = prompt.find("**2026-02-24**").unwrap();
        let today = prompt.find("**2026-02-25**").unwrap();
        assert!(yesterday < today);
    }
}
