#![no_main]
use libfuzzer_sys::fuzz_target;
use pricewatch::source::{DayAheadSource, PriceSource};

fuzz_target!(|data: &[u8]| {
    // Only valid UTF-8 bodies reach the extractor in production
    if let Ok(body) = std::str::from_utf8(data) {
        let source = DayAheadSource::new(Default::default());
        let _ = source.extract(body);
    }
});
