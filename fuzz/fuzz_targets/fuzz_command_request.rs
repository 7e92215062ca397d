//! Fuzz target: operator `POST /command` bodies
//!
//! Arbitrary JSON goes through request parsing and validation.  Accepted
//! commands must name a fleet member (Collect) or carry a non-empty topic
//! (Raw).
//!
//! cargo fuzz run fuzz_command_request

#![no_main]

use binfleet::app::commands::{Command, CommandRequest};
use binfleet::fleet::Fleet;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(request) = serde_json::from_slice::<CommandRequest>(data) else {
        return;
    };
    let fleet = Fleet::new(5);
    match Command::from_request(&request, fleet) {
        Ok(Command::Collect(bin)) => assert!(fleet.contains(u32::from(bin.get()))),
        Ok(Command::Raw { topic, .. }) => assert!(!topic.is_empty()),
        Ok(_) | Err(_) => {}
    }
});
