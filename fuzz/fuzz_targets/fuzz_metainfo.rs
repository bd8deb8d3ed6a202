#![no_main]
use libfuzzer_sys::fuzz_target;
use trg::torrent::Metainfo;

fuzz_target!(|data: &[u8]| {
    // parse() should never panic on arbitrary input
    if let Ok(metainfo) = Metainfo::parse(data) {
        let _ = metainfo.root.selections();
        let _ = metainfo.total_size();
    }
});
