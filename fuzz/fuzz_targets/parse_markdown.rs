// SPDX-License-Identifier: AGPL-3.0-or-later
#![no_main]

use adfmd_core::{from_markdown, to_markdown};
use libfuzzer_sys::fuzz_target;

// Arbitrary text must parse without panicking, and whatever tree comes out
// must render and read back to itself.
fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(doc) = from_markdown(input) else {
        return;
    };
    if let Ok(markdown) = to_markdown(&doc) {
        let again = from_markdown(&markdown).expect("rendered text parses");
        assert_eq!(to_markdown(&again).ok(), Some(markdown));
    }
});
