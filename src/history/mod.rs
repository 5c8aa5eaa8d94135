use crate::models::chat::{ ConversationRecord, HistoryEntry, Role };

/// Fixed bound on how many stored turns are replayed as model context.
pub const DEFAULT_HISTORY_WINDOW: usize = 20;

/// Derives the bounded model context from a stored record.
///
/// Turns are sorted by timestamp ascending before windowing; stored order is
/// not trusted because concurrent writers can interleave appends. The sort is
/// stable, so turns with equal timestamps keep their storage order. The last
/// `max_turns` turns are kept, oldest first, and each turn expands to a
/// user entry followed by an assistant entry.
///
/// Pure function, no I/O.
pub fn window(record: Option<&ConversationRecord>, max_turns: usize) -> Vec<HistoryEntry> {
    let Some(record) = record else {
        return Vec::new();
    };

    let mut turns: Vec<_> = record.turns.iter().collect();
    turns.sort_by_key(|t| t.timestamp);

    let start = turns.len().saturating_sub(max_turns);
    let mut entries = Vec::with_capacity((turns.len() - start) * 2);
    for turn in &turns[start..] {
        entries.push(HistoryEntry {
            role: Role::User,
            text: turn.user_text.clone(),
        });
        entries.push(HistoryEntry {
            role: Role::Assistant,
            text: turn.assistant_text.clone(),
        });
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::chat::Turn;

    fn turn(user: &str, assistant: &str, ts: i64) -> Turn {
        Turn {
            user_text: user.to_string(),
            assistant_text: assistant.to_string(),
            timestamp: ts,
        }
    }

    fn record(turns: Vec<Turn>) -> ConversationRecord {
        ConversationRecord {
            user_id: "u1".to_string(),
            turns,
            updated_at: 0,
        }
    }

    #[test]
    fn absent_record_yields_empty_context() {
        assert!(window(None, DEFAULT_HISTORY_WINDOW).is_empty());
    }

    #[test]
    fn empty_record_yields_empty_context() {
        let rec = record(Vec::new());
        assert!(window(Some(&rec), DEFAULT_HISTORY_WINDOW).is_empty());
    }

    #[test]
    fn each_turn_expands_to_user_then_assistant() {
        let rec = record(vec![turn("q1", "a1", 1), turn("q2", "a2", 2)]);
        let ctx = window(Some(&rec), DEFAULT_HISTORY_WINDOW);
        assert_eq!(ctx.len(), 4);
        assert_eq!(ctx[0], HistoryEntry { role: Role::User, text: "q1".into() });
        assert_eq!(ctx[1], HistoryEntry { role: Role::Assistant, text: "a1".into() });
        assert_eq!(ctx[2].role, Role::User);
        assert_eq!(ctx[3].text, "a2");
    }

    #[test]
    fn turns_are_sorted_by_timestamp_before_windowing() {
        let rec = record(vec![turn("late", "la", 30), turn("early", "ea", 10), turn("mid", "ma", 20)]);
        let ctx = window(Some(&rec), DEFAULT_HISTORY_WINDOW);
        let users: Vec<&str> = ctx
            .iter()
            .filter(|e| e.role == Role::User)
            .map(|e| e.text.as_str())
            .collect();
        assert_eq!(users, vec!["early", "mid", "late"]);
    }

    #[test]
    fn equal_timestamps_keep_storage_order() {
        let rec = record(vec![turn("first", "a", 5), turn("second", "b", 5), turn("third", "c", 5)]);
        let ctx = window(Some(&rec), DEFAULT_HISTORY_WINDOW);
        let users: Vec<&str> = ctx
            .iter()
            .filter(|e| e.role == Role::User)
            .map(|e| e.text.as_str())
            .collect();
        assert_eq!(users, vec!["first", "second", "third"]);
    }

    #[test]
    fn window_keeps_only_most_recent_twenty_of_twenty_five() {
        let turns: Vec<Turn> = (0..25).map(|i| turn(&format!("q{}", i), &format!("a{}", i), i)).collect();
        let rec = record(turns);
        let ctx = window(Some(&rec), DEFAULT_HISTORY_WINDOW);
        assert_eq!(ctx.len(), 40);
        // Oldest surviving turn is #5, newest is #24.
        assert_eq!(ctx[0].text, "q5");
        assert_eq!(ctx[39].text, "a24");
    }

    #[test]
    fn short_history_is_returned_whole() {
        let turns: Vec<Turn> = (0..3).map(|i| turn(&format!("q{}", i), "a", i)).collect();
        let rec = record(turns);
        assert_eq!(window(Some(&rec), DEFAULT_HISTORY_WINDOW).len(), 6);
    }
}
