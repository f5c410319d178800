//! Fuzz the event frame parser.

#![no_main]

use libfuzzer_sys::fuzz_target;
use scenelink::wire::frame::parse_event;

fuzz_target!(|data: &[u8]| {
    let _ = parse_event(data);
});
