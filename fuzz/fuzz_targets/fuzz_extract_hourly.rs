#![no_main]
use libfuzzer_sys::fuzz_target;
use pricewatch::source::{HourlyAverageSource, PriceSource};

fuzz_target!(|data: &[u8]| {
    if let Ok(body) = std::str::from_utf8(data) {
        let source = HourlyAverageSource::new(Default::default());
        let _ = source.extract(body);
    }
});
