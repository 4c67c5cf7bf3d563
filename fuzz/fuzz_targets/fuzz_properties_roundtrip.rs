#![no_main]

mod utils;

use libfuzzer_sys::fuzz_target;
use utils::truncate_utf8;

// Any text parses without panicking, and whatever it parsed to survives a
// write/parse cycle unchanged.
fuzz_target!(|data: &[u8]| {
    let Some(text) = truncate_utf8(data) else {
        return;
    };

    let parsed = nasr_properties::parse(text);
    let written = nasr_properties::write(
        parsed
            .entries
            .iter()
            .map(|entry| (entry.key.as_str(), entry.value.as_str())),
    );
    let reparsed = nasr_properties::parse(&written);
    assert_eq!(parsed.entries, reparsed.entries, "written form: {written:?}");
});
