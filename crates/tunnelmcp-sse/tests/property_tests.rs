//! Property-based tests for the incremental SSE parser
//!
//! Uses proptest to verify that parsing is independent of how the byte
//! stream is chunked and that arbitrary input never panics.

use proptest::prelude::*;
use tunnelmcp_sse::{SseEvent, SseParser};

// =============================================================================
// STRATEGIES
// =============================================================================

/// Strategy for a single well-formed event block, returned with the event it encodes.
fn event_block_strategy() -> impl Strategy<Value = (String, SseEvent)> {
    (
        prop::option::of("[a-z]{1,10}"),
        prop::collection::vec("[a-zA-Z0-9 {}:\"é]{0,20}", 1..4),
        prop::option::of("[0-9]{1,6}"),
        any::<bool>(),
    )
        .prop_map(|(event_type, data_lines, id, crlf)| {
            let eol = if crlf { "\r\n" } else { "\n" };
            let mut block = String::new();
            if let Some(ty) = &event_type {
                block.push_str(&format!("event: {ty}{eol}"));
            }
            if let Some(id) = &id {
                block.push_str(&format!("id: {id}{eol}"));
            }
            for line in &data_lines {
                block.push_str(&format!("data: {line}{eol}"));
            }
            block.push_str(eol);

            let mut expected = match event_type {
                Some(ty) => SseEvent::typed(ty, data_lines.join("\n")),
                None => SseEvent::message(data_lines.join("\n")),
            };
            expected.id = id;
            (block, expected)
        })
}

/// Feed `input` split at the given cut points (taken modulo the input length).
fn feed_in_chunks(input: &[u8], cuts: &[usize]) -> Vec<SseEvent> {
    let mut points: Vec<usize> = cuts.iter().map(|c| c % (input.len() + 1)).collect();
    points.sort_unstable();
    points.dedup();

    let mut parser = SseParser::new();
    let mut events = Vec::new();
    let mut start = 0;
    for point in points {
        events.extend(parser.feed(&input[start..point]));
        start = point;
    }
    events.extend(parser.feed(&input[start..]));
    events
}

// =============================================================================
// PROPERTIES
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: events are identical no matter where chunk boundaries fall
    #[test]
    fn prop_chunking_does_not_change_events(
        blocks in prop::collection::vec(event_block_strategy(), 1..6),
        with_head in any::<bool>(),
        cuts in prop::collection::vec(any::<usize>(), 0..12)
    ) {
        let mut input = String::new();
        if with_head {
            input.push_str("HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\n\r\n");
        }
        for (block, _) in &blocks {
            input.push_str(block);
        }
        let expected: Vec<SseEvent> = blocks.into_iter().map(|(_, event)| event).collect();

        let whole = SseParser::new().feed(input.as_bytes());
        prop_assert_eq!(&whole, &expected);

        let chunked = feed_in_chunks(input.as_bytes(), &cuts);
        prop_assert_eq!(&chunked, &expected);
    }

    /// Property: byte-at-a-time feeding matches a single feed
    #[test]
    fn prop_byte_at_a_time(blocks in prop::collection::vec(event_block_strategy(), 1..4)) {
        let input: String = blocks.iter().map(|(block, _)| block.as_str()).collect();

        let mut parser = SseParser::new();
        let mut events = Vec::new();
        for byte in input.as_bytes() {
            events.extend(parser.feed([*byte]));
        }

        prop_assert_eq!(events, SseParser::new().feed(input.as_bytes()));
        prop_assert!(!parser.has_pending_data());
    }

    /// Property: the parser never panics on arbitrary bytes
    #[test]
    fn prop_arbitrary_bytes_never_panic(
        chunks in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..64), 0..8)
    ) {
        let mut parser = SseParser::new();
        for chunk in chunks {
            for event in parser.feed(&chunk) {
                prop_assert!(!event.event_type.is_empty());
            }
        }
    }

    /// Property: last event id tracks the final id-bearing event
    #[test]
    fn prop_last_event_id_is_latest(blocks in prop::collection::vec(event_block_strategy(), 1..6)) {
        let input: String = blocks.iter().map(|(block, _)| block.as_str()).collect();
        let expected = blocks.iter().rev().find_map(|(_, event)| event.id.clone());

        let mut parser = SseParser::new();
        parser.feed(input.as_bytes());
        prop_assert_eq!(parser.last_event_id().map(str::to_string), expected);
    }
}
