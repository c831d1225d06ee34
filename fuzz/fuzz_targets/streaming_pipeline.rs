#![no_main]

use arbitrary::Arbitrary;
use crunge::engine::{CorruptionConfig, CorruptionStream, HeaderSkip};
use crunge::{corrupt_with, parse_chain};
use libfuzzer_sys::fuzz_target;

const CHAINS: &[&str] = &[
    "noise",
    "chunks 2, padding 0x20 3",
    "moving_average 7, jitter",
    "arccos_chunk 4, arctan_weird 4",
    "first_n_bytes 9 -3.5, additive",
];

#[derive(Arbitrary, Debug)]
struct StreamInput {
    data: Vec<u8>,
    chunk_size: usize,
    chain: u8,
    skip: u8,
    declared: bool,
    follow_restarts: bool,
    seed: u64,
}

fuzz_target!(|input: StreamInput| {
    let config = CorruptionConfig {
        header_skip: if input.declared {
            HeaderSkip::DeclaredLength
        } else {
            HeaderSkip::Fixed(usize::from(input.skip))
        },
        follow_restarts: input.follow_restarts,
        seed: Some(input.seed),
        ..CorruptionConfig::default()
    };
    let chain = parse_chain(CHAINS[usize::from(input.chain) % CHAINS.len()]).unwrap();

    let whole = corrupt_with(&input.data, &chain, &config).unwrap();
    assert_eq!(whole.len(), input.data.len());

    let mut stream = CorruptionStream::new(&chain, &config).unwrap();
    let mut chunked = Vec::new();
    for chunk in input.data.chunks(input.chunk_size.clamp(1, 4096)) {
        stream.process_into(chunk, &mut chunked);
    }
    assert_eq!(chunked, whole);

    for (i, (&before, &after)) in input.data.iter().zip(&whole).enumerate() {
        assert_eq!(before == 0xFF, after == 0xFF, "marker prefix moved at {i}");
        if i > 0 && input.data[i - 1] == 0xFF {
            assert_eq!(before, after, "byte after 0xFF changed at {i}");
        }
    }
});
