//! Textual answers of the exposure daemon.
//!
//! Key queries answer `+OK KEY = value / comment`; list queries answer
//! `+OK READOUT_SPEEDS = a b c` without a comment.

use once_cell::sync::Lazy;
use regex::Regex;

#[allow(clippy::expect_used)]
static KEY_VALUE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\+OK \w+ = (.*?) /").expect("key/value answer regex is valid")
});

/// Prefix of the readout speed list answer.
pub const READOUT_SPEEDS_OK: &str = "+OK READOUT_SPEEDS = ";

/// Prefix of the gain list answer.
pub const GAINS_OK: &str = "+OK GAINS = ";

/// Extract `value` from `+OK KEY = value / comment`.
///
/// The value is everything up to the first `" /"`, so it may itself contain slashes.
/// Trailing line terminators are ignored. Returns an empty string when the answer has
/// any other shape; callers treat that as "not set".
pub fn get_key_value(answer: &str) -> String {
    KEY_VALUE
        .captures(answer.trim_end_matches(['\r', '\n']))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

/// Strip a fixed `+OK KEY = ` prefix, `None` when the answer does not start with it.
pub fn strip_ok_prefix<'a>(answer: &'a str, prefix: &str) -> Option<&'a str> {
    answer.strip_prefix(prefix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_value_stops_before_comment() {
        assert_eq!(get_key_value("+OK OBJECT = HD 1234 / Object name"), "HD 1234");
        assert_eq!(get_key_value("+OK IMAGETYP = flat / Image type"), "flat");
        assert_eq!(get_key_value("+OK OBJECT = zeta Oph /"), "zeta Oph");
    }

    #[test]
    fn key_value_may_contain_slashes() {
        assert_eq!(get_key_value("+OK OBJECT = HD 12/3 / Object name"), "HD 12/3");
        assert_eq!(get_key_value("+OK PATH = data/ccd700 / Data path"), "data/ccd700");
        assert_eq!(get_key_value("+OK PATH = a/b / c / d"), "a/b");
    }

    #[test]
    fn key_value_ignores_trailing_newline() {
        assert_eq!(get_key_value("+OK OBJECT = HD 1234 / Object name\n"), "HD 1234");
        assert_eq!(get_key_value("+OK IMAGETYP = flat / Image type\r\n"), "flat");
        assert_eq!(get_key_value("+OK OBJECT = zeta Oph /\n"), "zeta Oph");
    }

    #[test]
    fn key_value_mismatch_is_empty() {
        assert_eq!(get_key_value(""), "");
        assert_eq!(get_key_value("ERR unknown key"), "");
        assert_eq!(get_key_value("+OK OBJECT = no comment"), "");
    }

    #[test]
    fn strips_list_prefixes() {
        assert_eq!(
            strip_ok_prefix("+OK READOUT_SPEEDS = 50kHz 100kHz", READOUT_SPEEDS_OK),
            Some("50kHz 100kHz")
        );
        assert_eq!(strip_ok_prefix("+OK GAINS = low high", GAINS_OK), Some("low high"));
        assert_eq!(strip_ok_prefix("ERR busy", GAINS_OK), None);
    }
}
