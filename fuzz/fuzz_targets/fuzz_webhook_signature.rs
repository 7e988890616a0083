#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use linehook::fuzz_api::verify_signature;

#[derive(Arbitrary, Debug)]
struct Input {
    secret: String,
    signature: String,
    body: Vec<u8>,
}

fuzz_target!(|input: Input| {
    let _ = verify_signature(&input.secret, &input.signature, &input.body);
});
