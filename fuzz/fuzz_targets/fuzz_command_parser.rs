#![no_main]
use libfuzzer_sys::fuzz_target;
use motorbench_core::{Command, ParseMode, parse_with};

fuzz_target!(|data: &str| {
    for mode in [ParseMode::Lenient, ParseMode::Strict] {
        match parse_with(data, mode) {
            Command::SetDuty(d) => assert!(d <= 100),
            Command::StartCapture(s) => assert!((1..=100).contains(&s)),
            Command::Malformed(_) | Command::Rejected(_) => {}
        }
    }
});
