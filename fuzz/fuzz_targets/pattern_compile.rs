#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use logan_engine::config::PatternMode;
use logan_engine::pattern::compile;

#[derive(Debug, Arbitrary)]
struct Input<'a> {
    pattern: &'a str,
    text: &'a str,
    strict: bool,
}

fuzz_target!(|input: Input<'_>| {
    let mode = if input.strict {
        PatternMode::Strict
    } else {
        PatternMode::Lenient
    };

    // any pattern either compiles or errors, never panics
    let Ok(compiled) = compile(input.pattern, mode) else {
        return;
    };

    // compiling twice is a no-op
    let again = compile(compiled.clone(), mode).expect("recompile");
    assert_eq!(again.source(), compiled.source());

    if let Some(groups) = compiled.captures(input.text) {
        assert_eq!(groups.len(), compiled.group_count());
    }
});
