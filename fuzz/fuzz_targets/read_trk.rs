#![no_main]
use libfuzzer_sys::fuzz_target;
use tractometry::format::trk::{self, TrkHeader};

fuzz_target!(|data: &[u8]| {
    if let Ok(header) = TrkHeader::from_bytes(data) {
        let _ = header.to_header_map();
        let _ = header.voxmm_to_rasmm();
    }
    let _ = trk::from_bytes(data);
});
