//! Evaluation of module supplied PCD default values.
//!
//! A module may override a PCD's package default with its own value. The value is an
//! expression in the PCD value syntax and is checked against the PCD's datum type. GUID
//! C names visible to the module may appear wherever a 16 byte buffer is expected.

use indexmap::IndexMap;
use thiserror::Error;
use uguid::Guid;

use crate::{
    metadata::pcd::DatumType,
    utils::{guid_to_byte_array, parse_integer, split_value_list},
};

/// Why an expression was rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct ExpressionError(pub String);

/// Evaluates PCD default-value expressions.
pub trait ExpressionEvaluator: Send + Sync {
    /// Evaluates `expression` for a PCD of `datum_type`.
    ///
    /// # Arguments
    /// * `expression` - The module supplied value
    /// * `datum_type` - Datum type the value must fit
    /// * `guids` - GUID C names visible to the module
    ///
    /// # Errors
    ///
    /// Returns an [`ExpressionError`] describing why the expression is malformed or does not
    /// fit the datum type.
    fn evaluate(
        &self,
        expression: &str,
        datum_type: &DatumType,
        guids: &IndexMap<String, Guid>,
    ) -> Result<String, ExpressionError>;
}

/// Literal value evaluator.
///
/// Accepts the value forms module descriptions actually use:
///
/// - integers (decimal or `0x` hex), range checked against the datum type
/// - `TRUE` / `FALSE` (any case) and `0` / `1` for `BOOLEAN`, normalized to `TRUE` / `FALSE`
/// - `"ascii"`, `L"ucs2"` and `'c'` strings for `VOID*`
/// - `{...}` byte arrays for `VOID*`, whose elements are bytes or GUID C names
/// - a bare GUID C name for `VOID*`, rendered as its 16 byte array
///
/// Structure PCDs are passed through unchanged; their layout is not known here.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValueEvaluator;

impl ValueEvaluator {
    fn boolean(text: &str) -> Result<String, ExpressionError> {
        if text.eq_ignore_ascii_case("TRUE") {
            return Ok("TRUE".to_string());
        }
        if text.eq_ignore_ascii_case("FALSE") {
            return Ok("FALSE".to_string());
        }
        match parse_integer(text) {
            Some(0) => Ok("FALSE".to_string()),
            Some(1) => Ok("TRUE".to_string()),
            _ => Err(ExpressionError(format!(
                "{text} is not a valid BOOLEAN value"
            ))),
        }
    }

    fn integer(text: &str, datum_type: &DatumType, max: u64) -> Result<String, ExpressionError> {
        let value = parse_integer(text).ok_or_else(|| {
            ExpressionError(format!("{text} is not a valid {datum_type} value"))
        })?;
        if value > max {
            return Err(ExpressionError(format!(
                "{text} is too large for {datum_type}"
            )));
        }
        Ok(text.to_string())
    }

    fn pointer(text: &str, guids: &IndexMap<String, Guid>) -> Result<String, ExpressionError> {
        if is_string_literal(text) {
            return Ok(text.to_string());
        }

        if let Some(inner) = text.strip_prefix('{').and_then(|t| t.strip_suffix('}')) {
            let mut bytes = Vec::new();
            for element in split_value_list(inner, ',') {
                if element.is_empty() {
                    continue;
                }
                if let Some(guid) = guids.get(&element) {
                    bytes.extend(guid.to_bytes().iter().map(|b| format!("0x{b:02x}")));
                    continue;
                }
                match parse_integer(&element) {
                    Some(byte) if byte <= u64::from(u8::MAX) => bytes.push(format!("0x{byte:02x}")),
                    _ => {
                        return Err(ExpressionError(format!(
                            "{element} is not a valid byte in {text}"
                        )))
                    }
                }
            }
            return Ok(format!("{{{}}}", bytes.join(", ")));
        }

        if let Some(guid) = guids.get(text) {
            return Ok(guid_to_byte_array(guid));
        }

        Err(ExpressionError(format!(
            "{text} is not a valid VOID* value, expected a string, a byte array or a GUID name"
        )))
    }
}

impl ExpressionEvaluator for ValueEvaluator {
    fn evaluate(
        &self,
        expression: &str,
        datum_type: &DatumType,
        guids: &IndexMap<String, Guid>,
    ) -> Result<String, ExpressionError> {
        let text = expression.trim();
        if text.is_empty() {
            return Err(ExpressionError("empty expression".to_string()));
        }

        match datum_type {
            DatumType::Boolean => Self::boolean(text),
            DatumType::Pointer => Self::pointer(text, guids),
            DatumType::Struct(_) => Ok(text.to_string()),
            DatumType::Uint8 | DatumType::Uint16 | DatumType::Uint32 | DatumType::Uint64 => {
                let max = datum_type.max_integer().unwrap_or(u64::MAX);
                Self::integer(text, datum_type, max)
            }
        }
    }
}

fn is_string_literal(text: &str) -> bool {
    let body = text.strip_prefix('L').unwrap_or(text);
    body.len() >= 2
        && ((body.starts_with('"') && body.ends_with('"'))
            || (body.starts_with('\'') && body.ends_with('\'')))
}

#[cfg(test)]
mod tests {
    use super::*;

    const GUID: Guid = uguid::guid!("00000001-0002-0003-0405-060708090a0b");

    fn guids() -> IndexMap<String, Guid> {
        let mut table = IndexMap::new();
        table.insert("gTestGuid".to_string(), GUID);
        table
    }

    #[test]
    fn integers_are_range_checked() {
        let eval = ValueEvaluator;
        assert_eq!(
            eval.evaluate("0xFF", &DatumType::Uint8, &guids()).unwrap(),
            "0xFF"
        );
        assert!(eval.evaluate("256", &DatumType::Uint8, &guids()).is_err());
        assert!(eval.evaluate("abc", &DatumType::Uint32, &guids()).is_err());
        assert_eq!(
            eval.evaluate(" 18446744073709551615 ", &DatumType::Uint64, &guids())
                .unwrap(),
            "18446744073709551615"
        );
    }

    #[test]
    fn booleans_are_normalized() {
        let eval = ValueEvaluator;
        assert_eq!(eval.evaluate("true", &DatumType::Boolean, &guids()).unwrap(), "TRUE");
        assert_eq!(eval.evaluate("0", &DatumType::Boolean, &guids()).unwrap(), "FALSE");
        assert!(eval.evaluate("2", &DatumType::Boolean, &guids()).is_err());
    }

    #[test]
    fn pointer_forms() {
        let eval = ValueEvaluator;
        assert_eq!(
            eval.evaluate("L\"Setup\"", &DatumType::Pointer, &guids()).unwrap(),
            "L\"Setup\""
        );
        assert_eq!(
            eval.evaluate("{0x1, 2}", &DatumType::Pointer, &guids()).unwrap(),
            "{0x01, 0x02}"
        );
        assert_eq!(
            eval.evaluate("gTestGuid", &DatumType::Pointer, &guids()).unwrap(),
            guid_to_byte_array(&GUID)
        );
        assert!(eval.evaluate("{0x100}", &DatumType::Pointer, &guids()).is_err());
        assert!(eval.evaluate("gUnknownGuid", &DatumType::Pointer, &guids()).is_err());
        assert!(eval.evaluate("5", &DatumType::Pointer, &guids()).is_err());
    }

    #[test]
    fn guid_inside_byte_array() {
        let out = ValueEvaluator
            .evaluate("{gTestGuid, 0xAA}", &DatumType::Pointer, &guids())
            .unwrap();
        assert!(out.starts_with("{0x01, 0x00, 0x00, 0x00"));
        assert!(out.ends_with("0x0b, 0xaa}"));
    }

    #[test]
    fn empty_is_rejected() {
        assert_eq!(
            ValueEvaluator.evaluate("  ", &DatumType::Uint8, &guids()),
            Err(ExpressionError("empty expression".to_string()))
        );
    }
}
