#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        // Structure validation over arbitrary input must never panic.
        let _ = efactura::xades::validate_signature_structure(s);
        let _ = efactura::xades::certificate_info(s);
    }
});
