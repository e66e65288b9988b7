#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // TOML parsing and validation must reject garbage without panicking.
    if let Ok(cfg) = toml::from_str::<das_config::Config>(data) {
        let _ = cfg.validate();
    }
});
