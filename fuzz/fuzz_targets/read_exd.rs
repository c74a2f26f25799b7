#![no_main]
use libfuzzer_sys::fuzz_target;
use std::io::Cursor;
use uoct::format::eyetec::read_exd_from;

fuzz_target!(|data: &[u8]| {
    let _ = read_exd_from(Cursor::new(data));
});
