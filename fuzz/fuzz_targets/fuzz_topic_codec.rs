//! Fuzz target: `protocol::decode`
//!
//! Feeds arbitrary payloads on both gateway topics and asserts that the
//! decoder never panics, never yields telemetry for a bin outside the
//! fleet, and that every logged rendering of the result stays bounded.
//!
//! cargo fuzz run fuzz_topic_codec

#![no_main]

use binfleet::fleet::Fleet;
use binfleet::protocol::{Decoded, Event, Topics, decode};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Some((&selector, payload)) = data.split_first() else {
        return;
    };
    let topics = Topics::new("trash_collector_main", "trash_collector_sub");
    let fleet = Fleet::new(selector % 8 + 1);
    let topic = if selector & 0x80 == 0 {
        "trash_collector_main"
    } else {
        "trash_collector_sub"
    };

    let event = match decode(&topics, fleet, topic, payload, 0) {
        Ok(Decoded::Event(event)) => event,
        Ok(Decoded::InstructionEcho(d)) => {
            assert!(d <= 9, "echo must be a single digit");
            return;
        }
        Ok(Decoded::Blank) => {
            assert!(payload.is_empty());
            return;
        }
        Err(reason) => Event::ignored(payload, reason, 0),
    };
    if let Event::Telemetry { bin, .. } = &event {
        assert!(fleet.contains(u32::from(bin.get())));
    }
    // Raw text is truncated to the payload bound; the rendering adds a
    // fixed prefix and the reason.
    assert!(event.to_string().len() <= 128 + 64);
});
