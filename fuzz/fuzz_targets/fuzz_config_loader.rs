#![no_main]
use libfuzzer_sys::fuzz_target;

// Parse and validation errors are fine; panics are not.
fuzz_target!(|data: &str| {
    if let Ok(cfg) = motorbench_config::load_toml(data) {
        let _ = cfg.validate();
    }
});
