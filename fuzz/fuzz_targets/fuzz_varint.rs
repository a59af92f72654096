#![no_main]

use libfuzzer_sys::fuzz_target;
use server_browser::core::varint::VarInt;

fuzz_target!(|data: &[u8]| {
    // Alternate integer and string reads until the input is exhausted
    let mut v = VarInt::from_bytes(data);
    let mut read_string = false;
    loop {
        let before = v.len();
        let consumed = if read_string {
            v.unpack_str().is_ok()
        } else {
            v.unpack().is_ok()
        };
        if !consumed {
            assert_eq!(v.len(), before);
            break;
        }
        assert!(v.len() < before);
        read_string = !read_string;
    }
});
