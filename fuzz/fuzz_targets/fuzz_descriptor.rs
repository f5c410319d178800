//! Fuzz the property descriptor and value decoders.

#![no_main]

use libfuzzer_sys::fuzz_target;
use scenelink::props::codec::{decode_descriptor, decode_value};
use scenelink::wire::ByteReader;

fuzz_target!(|data: &[u8]| {
    let mut reader = ByteReader::new(data);
    if let Ok(mut property) = decode_descriptor(&mut reader) {
        let _ = decode_value(&mut reader, &mut property);
    }
});
