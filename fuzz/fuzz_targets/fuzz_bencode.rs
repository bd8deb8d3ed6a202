#![no_main]
use libfuzzer_sys::fuzz_target;
use trg::torrent::bencode::decode;
use trg::torrent::BencodeValue;

fuzz_target!(|data: &[u8]| {
    // decoding should never panic on arbitrary input
    let first = decode(data);
    let _ = BencodeValue::parse_exact(data);

    // and must be deterministic
    if let Ok(first) = first {
        assert_eq!(decode(data).ok(), Some(first));
    }
});
