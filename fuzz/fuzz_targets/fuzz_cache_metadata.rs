#![no_main]

mod utils;

use libfuzzer_sys::fuzz_target;
use nasr_cache::CacheMetadata;
use utils::MAX_INPUT_SIZE;

// Arbitrary metadata bytes either load or fail cleanly. Anything that loads
// and can be saved again must load back to the same value.
fuzz_target!(|data: &[u8]| {
    let data = &data[..data.len().min(MAX_INPUT_SIZE)];
    let Ok(dir) = tempfile::tempdir() else {
        return;
    };
    if std::fs::write(CacheMetadata::path(dir.path()), data).is_err() {
        return;
    }

    let header = CacheMetadata::read_header(dir.path());
    let Ok(Some(metadata)) = CacheMetadata::load(dir.path()) else {
        return;
    };
    assert_eq!(header.ok().flatten(), Some(metadata.header));

    if metadata.save(dir.path()).is_ok() {
        let reloaded = CacheMetadata::load(dir.path());
        assert_eq!(reloaded.ok().flatten(), Some(metadata));
    }
});
