#![no_main]
use emberchain::networking::wire::{Message, NetworkId};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Decoding arbitrary datagrams must never panic, and every accepted
    // message must re-encode to the exact input.
    for network in [NetworkId::Test, NetworkId::Live] {
        if let Ok(msg) = Message::deserialize(data, network) {
            assert_eq!(msg.serialize(network), data);
        }
    }
});
