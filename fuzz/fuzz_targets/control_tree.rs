#![no_main]

use auricle_engine::{ControlTree, Value};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let mut tree = ControlTree::new();
    tree.insert_setting("fragsize", "", Value::int(200, 1)).ok();
    tree.insert_setting("srate", "", Value::float(44_100.0, 1.0)).ok();
    tree.insert_setting("iolib", "", Value::text("")).ok();
    tree.insert_setting("exit_on_stop", "", Value::Bool(false)).ok();
    for command in text.lines() {
        let _ = tree.parse(command);
    }
});
