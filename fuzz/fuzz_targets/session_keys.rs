#![no_main]

use bitacora::session::{extract_session_keys, SessionIndexer};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let content = String::from_utf8_lossy(data);
    let indexer = SessionIndexer::hdfs();

    // Every key is a distinct substring of the content that starts with "blk_"
    let keys = extract_session_keys(indexer.pattern(), &content);
    for (i, key) in keys.iter().enumerate() {
        assert!(key.starts_with("blk_"));
        assert!(content.contains(key));
        assert!(!keys[..i].contains(key));
    }
});
