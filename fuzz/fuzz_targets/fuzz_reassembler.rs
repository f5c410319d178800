//! Fuzz the response reassembler with arbitrary packet streams.
//!
//! The input is chopped into pseudo-packets using its own bytes as
//! length prefixes, so the fuzzer explores both header parsing and
//! continuation handling.

#![no_main]

use libfuzzer_sys::fuzz_target;
use scenelink::wire::Reassembler;

fuzz_target!(|data: &[u8]| {
    let mut reassembler = Reassembler::new();
    let mut rest = data;
    while let Some((&len, tail)) = rest.split_first() {
        let take = (len as usize).min(tail.len());
        let _ = reassembler.feed(&tail[..take]);
        rest = &tail[take..];
    }
});
