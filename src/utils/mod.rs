//! Small parsing helpers shared by the resolvers.
//!
//! Declaration values arrive as plain text: pipe separated settings, numeric literals in
//! C notation, and GUIDs in two different spellings. These helpers keep the quoting rules
//! in one place.

mod guid;

pub use guid::{guid_to_byte_array, parse_guid};

/// Parses an unsigned integer in C notation (`0x` / `0X` prefixed hex, or decimal).
///
/// Returns `None` for empty input, signs, or anything that overflows `u64`.
#[must_use]
pub fn parse_integer(text: &str) -> Option<u64> {
    let text = text.trim();
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        if hex.is_empty() || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        u64::from_str_radix(hex, 16).ok()
    } else {
        if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        text.parse().ok()
    }
}

/// Splits `text` on `separator`, ignoring separators inside single or double quotes and
/// trimming every piece.
///
/// An empty input produces a single empty piece, matching how a lone `|` free value is
/// still one field.
///
/// # Examples
///
/// ```rust
/// use infscope::utils::split_value_list;
///
/// assert_eq!(split_value_list(r#" "a|b" | 0x10 "#, '|'), vec![r#""a|b""#, "0x10"]);
/// ```
#[must_use]
pub fn split_value_list(text: &str, separator: char) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for c in text.chars() {
        if escaped {
            current.push(c);
            escaped = false;
            continue;
        }
        match quote {
            Some(q) => {
                if c == '\\' {
                    escaped = true;
                } else if c == q {
                    quote = None;
                }
                current.push(c);
            }
            None => {
                if c == separator {
                    pieces.push(current.trim().to_string());
                    current.clear();
                } else {
                    if c == '"' || c == '\'' {
                        quote = Some(c);
                    }
                    current.push(c);
                }
            }
        }
    }
    pieces.push(current.trim().to_string());
    pieces
}

/// Splits a module PCD setting (`Value[|Offset]`) into its positional fields.
///
/// Always returns three slots; missing trailing fields are empty strings. Quoted values keep
/// any `|` they contain.
#[must_use]
pub fn split_pcd_setting(setting: &str) -> [String; 3] {
    let mut fields: [String; 3] = Default::default();
    for (slot, piece) in fields
        .iter_mut()
        .zip(split_value_list(setting, '|').into_iter())
    {
        *slot = piece;
    }
    fields
}
