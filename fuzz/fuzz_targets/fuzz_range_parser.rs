#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Any accepted range must be well formed: 1-based and ascending.
    if let Ok((first, last)) = das_config::parse_channel_range(data) {
        assert!(first >= 1);
        assert!(last > first);
    }
});
