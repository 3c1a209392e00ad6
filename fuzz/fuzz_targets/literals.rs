#![no_main]

use libfuzzer_sys::fuzz_target;
use infscope::{
    metadata::token::PcdToken,
    utils::{parse_guid, parse_integer, split_pcd_setting},
};

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        let _ = PcdToken::parse(text);
        let _ = parse_integer(text);
        let _ = parse_guid(text);
        let _ = split_pcd_setting(text);
    }
});
