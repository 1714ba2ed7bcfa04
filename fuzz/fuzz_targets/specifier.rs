#![no_main]

use auricle_host::ModuleSpecifier;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(specifier) = ModuleSpecifier::parse(text) {
        let reparsed = ModuleSpecifier::parse(&specifier.to_string()).expect("display reparses");
        assert_eq!(reparsed, specifier);
    }
});
