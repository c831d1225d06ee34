#![no_main]

use crunge::engine::build_chain;
use crunge::parse_chain;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(specs) = parse_chain(text) else {
        return;
    };
    // Anything that parses must build and never emit 0xFF.
    let mut chain = build_chain(&specs, Some(0)).unwrap();
    assert_eq!(chain.len(), specs.len());
    for byte in 0..=254u8 {
        let out = chain.iter_mut().fold(byte, |b, c| c.advance(b));
        assert_ne!(out, 0xFF);
    }
});
