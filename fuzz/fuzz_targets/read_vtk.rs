#![no_main]
use libfuzzer_sys::fuzz_target;
use tractometry::format::vtk::{legacy, xml};

fuzz_target!(|data: &[u8]| {
    let _ = legacy::from_bytes(data);
    let _ = xml::from_bytes(data);
});
