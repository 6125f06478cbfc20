#![no_main]

use bytes::Bytes;
use libfuzzer_sys::fuzz_target;
use bertype::Oid;

fuzz_target!(|data: &[u8]| {
    if let Ok(oid) = Oid::from_content(Bytes::copy_from_slice(data)) {
        let _ = oid.to_string();
        let _ = oid.arcs();
    }
});
