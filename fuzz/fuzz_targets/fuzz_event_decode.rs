#![no_main]

use libfuzzer_sys::fuzz_target;
use linehook::fuzz_api::{Command, decode_events};

fuzz_target!(|data: &[u8]| {
    let Ok(batch) = decode_events(data) else {
        return;
    };
    for event in batch.events.into_iter().flatten() {
        let _ = event.dedup_key();
        if let linehook::events::EventKind::TextMessage { text, .. } = &event.kind {
            let _ = Command::parse(text);
        }
    }
});
