#![no_main]

use crunge::engine::scanner::segments;
use crunge::engine::CorruptionConfig;
use crunge::inspect;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let summary = inspect(data, &CorruptionConfig::declared());
    assert!(summary.eligible <= summary.len);

    let segs = segments(data);
    assert_eq!(segs.len(), summary.segments);
    let mut last = 0;
    for seg in &segs {
        assert!(seg.marker_start >= last);
        assert!(seg.marker_end <= data.len() as u64);
        if let (Some(start), Some(end)) = (seg.payload_start, seg.payload_end) {
            assert!(start <= end);
        }
        last = seg.marker_end;
    }
});
