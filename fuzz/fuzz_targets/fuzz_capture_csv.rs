#![no_main]
use libfuzzer_sys::fuzz_target;
use motorbench_config::{DutyCurve, parse_capture_csv};

fuzz_target!(|data: &str| {
    if let Ok(record) = parse_capture_csv(data) {
        let curve = DutyCurve::from_rows(&record.rows);
        let total: usize = curve.points.iter().map(|p| p.samples).sum();
        assert_eq!(total, record.rows.len());
    }
});
