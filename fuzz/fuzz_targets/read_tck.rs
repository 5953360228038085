#![no_main]
use libfuzzer_sys::fuzz_target;
use tractometry::format::tck;
use tractometry::Tracts;

fuzz_target!(|data: &[u8]| {
    if let Ok(tractogram) = tck::from_reader(data) {
        if let Ok(mut tracts) = Tracts::from_tractogram(tractogram) {
            let _ = tracts.lengths();
            let _ = tracts.midpoints();
            let _ = tracts.turning_angles();
            let _ = tracts.resample(50.);
        }
    }
});
