#![no_main]
use libfuzzer_sys::fuzz_target;
use std::io::Cursor;
use uoct::format::topcon::read_fda_from;
use uoct::j2k::Unsupported;

fuzz_target!(|data: &[u8]| {
    let _ = read_fda_from(Cursor::new(data), &Unsupported);
});
