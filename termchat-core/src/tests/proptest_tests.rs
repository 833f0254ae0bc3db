use std::collections::HashSet;

use proptest::prelude::*;
use termchat_protocol::Timestamp;

use crate::message_log::MessageLog;

fn offset_strategy() -> impl Strategy<Value = Vec<i64>> {
    prop::collection::vec(-5i64..50, 0..80)
}

fn at(micros: i64) -> Timestamp {
    Timestamp::from_datetime(
        Timestamp::min().as_datetime() + chrono::Duration::microseconds(1_000_000 + micros),
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_log_never_exceeds_capacity(capacity in 1usize..30, offsets in offset_strategy()) {
        let mut log = MessageLog::new(capacity);
        for (i, offset) in offsets.iter().enumerate() {
            log.post("alice", &i.to_string(), at(*offset));
            prop_assert!(log.len() <= capacity);
        }
        prop_assert_eq!(log.len(), offsets.len().min(capacity));
    }

    #[test]
    fn prop_log_keeps_latest_entries(capacity in 1usize..30, offsets in offset_strategy()) {
        let mut log = MessageLog::new(capacity);
        for (i, offset) in offsets.iter().enumerate() {
            log.post("alice", &i.to_string(), at(*offset));
        }

        let skip = offsets.len().saturating_sub(capacity);
        let expected: Vec<String> = (skip..offsets.len()).map(|i| i.to_string()).collect();
        let kept: Vec<String> = log.iter().map(|m| m.content().to_string()).collect();
        prop_assert_eq!(kept, expected);
    }

    #[test]
    fn prop_timestamps_strictly_increase(offsets in offset_strategy()) {
        let mut log = MessageLog::new(100);
        for offset in &offsets {
            log.post("bob", "x", at(*offset));
        }
        let timestamps: Vec<_> = log.iter().map(|m| m.timestamp()).collect();
        for pair in timestamps.windows(2) {
            prop_assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn prop_cursor_drain_visits_each_once(capacity in 1usize..30, offsets in offset_strategy()) {
        let mut log = MessageLog::new(capacity);
        for (i, offset) in offsets.iter().enumerate() {
            log.post("carol", &i.to_string(), at(*offset));
        }

        let mut cursor = Timestamp::min();
        let mut seen = Vec::new();
        while let Some(message) = log.first_after(cursor) {
            // The cursor travels through wire text, so it must survive a reparse.
            cursor = Timestamp::parse(&message.timestamp().to_iso()).unwrap();
            seen.push(message.content().to_string());
            prop_assert!(seen.len() <= log.len());
        }

        let all: Vec<String> = log.iter().map(|m| m.content().to_string()).collect();
        let unique: HashSet<&String> = seen.iter().collect();
        prop_assert_eq!(unique.len(), seen.len());
        prop_assert_eq!(seen, all);
    }
}
