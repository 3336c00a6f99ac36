#![no_main]

use libfuzzer_sys::fuzz_target;
use packet::{Channel, ConnectionId, Limits, HEADER_SIZE};
use serial::ByteRead;

fuzz_target!(|data: &[u8]| {
    let limits = Limits::for_testing();
    let mut channel = Channel::new(ConnectionId::new(0), limits.clone());
    let mut source = data;

    // Every frame either parses within the limit or ends the stream.
    while !source.is_empty() {
        match channel.receive_packet(std::io::Read::read, &mut source) {
            Ok(Some(mut packet)) => {
                assert!(packet.size() >= HEADER_SIZE);
                assert!(packet.size() <= limits.packet_limit());
                while packet.remaining() > 0 {
                    let _ = packet.read_u32();
                    let _ = packet.read_string();
                }
            }
            Ok(None) | Err(_) => break,
        }
    }
});
