#![no_main]

use libfuzzer_sys::fuzz_target;
use serial::{ByteRead, SliceReader};

fuzz_target!(|data: &[u8]| {
    let mut reader = SliceReader::new(data);
    let mut idx = 0usize;

    // Use input bytes to drive a bounded sequence of reads.
    while idx < data.len() && idx < 1024 {
        let op = data[idx] % 8;
        idx += 1;

        match op {
            0 => {
                let _ = reader.read_bool();
            }
            1 => {
                let _ = reader.read_u16();
            }
            2 => {
                let _ = reader.read_u64();
            }
            3 => {
                let _ = reader.read_string();
            }
            4 => {
                let max = usize::from(data[idx.saturating_sub(1)] % 16);
                let _ = reader.read_string_bounded(max);
            }
            5 => {
                let _ = reader.read_buffer();
            }
            6 => {
                let _ = reader.tolerant().read_i32();
            }
            _ => {
                let mut out = [0u8; 5];
                let _ = reader.read_bytes(&mut out);
            }
        }
        assert!(reader.position() <= data.len());
    }
});
