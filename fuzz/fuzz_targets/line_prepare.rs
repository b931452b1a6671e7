#![no_main]

use libfuzzer_sys::fuzz_target;
use logan_engine::schema::moz::MozPreparer;
use logan_engine::{LinePreparer, PreparedLine, RawLine};

fuzz_target!(|data: &[u8]| {
    let Ok(preparer) = MozPreparer::new() else {
        return;
    };

    let mut previous: Option<PreparedLine> = None;
    for (number, text) in String::from_utf8_lossy(data).lines().enumerate() {
        let raw = RawLine {
            text: text.to_owned(),
            offset: 0..text.len() as u64,
            number: number as u64 + 1,
        };
        let line = preparer.prepare(&raw, previous.as_ref());
        assert_eq!(line.raw, raw.text);
        // continuations inherit the previous timestamp
        if let (true, Some(prev)) = (line.continuation, &previous) {
            assert_eq!(line.timestamp, prev.timestamp);
        }
        previous = Some(line);
    }
});
