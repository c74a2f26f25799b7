#![no_main]
use libfuzzer_sys::fuzz_target;
use std::io::Cursor;
use uoct::format::heidelberg::read_e2e_from;

fuzz_target!(|data: &[u8]| {
    let _ = read_e2e_from(Cursor::new(data));
});
