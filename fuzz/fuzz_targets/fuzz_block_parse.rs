#![no_main]
use emberchain::core::types::BlockKind;
use emberchain::networking::wire::{parse_block, write_block};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Some((kind_byte, payload)) = data.split_first() else {
        return;
    };
    let Some(kind) = BlockKind::from_byte(*kind_byte) else {
        return;
    };
    if let Ok(block) = parse_block(kind, payload) {
        let mut out = Vec::new();
        write_block(&mut out, &block);
        assert_eq!(out, payload);
    }
});
