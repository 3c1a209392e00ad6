//! Textual GUID forms used by package declaration files.
//!
//! Package files spell identity values either in registry format
//! (`8be4df61-93ca-11d2-aa0d-00e098032b8c`) or as the C initializer that ends up in
//! generated code (`{0x8be4df61, 0x93ca, 0x11d2, {0xaa, 0x0d, 0x00, 0xe0, 0x98, 0x03, 0x2b, 0x8c}}`).
//! Both are accepted here and normalized into [`uguid::Guid`].

use uguid::Guid;

use crate::utils::parse_integer;

/// Parses a GUID in registry format or C structure initializer format.
///
/// Returns `None` if the text is neither.
///
/// # Examples
///
/// ```rust
/// use infscope::utils::parse_guid;
///
/// let a = parse_guid("8be4df61-93ca-11d2-aa0d-00e098032b8c").unwrap();
/// let b = parse_guid("{0x8be4df61, 0x93ca, 0x11d2, {0xaa, 0x0d, 0x00, 0xe0, 0x98, 0x03, 0x2b, 0x8c}}").unwrap();
/// assert_eq!(a, b);
/// ```
#[must_use]
pub fn parse_guid(text: &str) -> Option<Guid> {
    let text = text.trim();
    if text.starts_with('{') {
        parse_c_struct(text)
    } else {
        Guid::try_parse(text).ok()
    }
}

fn parse_c_struct(text: &str) -> Option<Guid> {
    let fields: Vec<&str> = text
        .split(|c| c == ',' || c == '{' || c == '}')
        .map(str::trim)
        .filter(|field| !field.is_empty())
        .collect();
    if fields.len() != 11 {
        return None;
    }

    let mut values = [0u64; 11];
    for (slot, field) in values.iter_mut().zip(&fields) {
        *slot = parse_integer(field)?;
    }

    let limits = [
        u64::from(u32::MAX),
        u64::from(u16::MAX),
        u64::from(u16::MAX),
    ];
    if values[..3].iter().zip(limits).any(|(v, max)| *v > max)
        || values[3..].iter().any(|v| *v > u64::from(u8::MAX))
    {
        return None;
    }

    let registry = format!(
        "{:08x}-{:04x}-{:04x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
        values[0],
        values[1],
        values[2],
        values[3],
        values[4],
        values[5],
        values[6],
        values[7],
        values[8],
        values[9],
        values[10]
    );
    Guid::try_parse(&registry).ok()
}

/// Renders a GUID as the 16 byte array literal PCD values use (`{0x61, 0xdf, ...}`).
///
/// Bytes are emitted in memory order (little-endian for the first three fields).
#[must_use]
pub fn guid_to_byte_array(guid: &Guid) -> String {
    let bytes = guid
        .to_bytes()
        .iter()
        .map(|b| format!("0x{b:02x}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!("{{{bytes}}}")
}
