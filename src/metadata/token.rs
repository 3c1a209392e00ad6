use std::fmt;
use std::hash::{Hash, Hasher};

use thiserror::Error;

/// Why a declared PCD token value was rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenValueError {
    /// The package declared no token value at all
    #[error("no token value")]
    Empty,
    /// `0x` prefixed, but not 1 to 8 significant hex digits
    #[error("hexadecimal token value must have at most 8 significant digits")]
    Hex,
    /// Decimal, but larger than 4294967295
    #[error("as a decimal it should be between 0 - 4294967295")]
    OutOfRange,
    /// Neither hexadecimal nor decimal
    #[error("it should be hexadecimal or decimal")]
    Format,
}

/// The 32-bit token number a package assigns to a PCD.
///
/// Token numbers identify a PCD inside its token space at run time. Package files spell them
/// either as a `0x` prefixed hexadecimal literal with at most 8 significant digits (leading
/// zeros are not counted) or as a decimal literal in `[0, 4294967295]`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct PcdToken(pub u32);

impl PcdToken {
    /// Creates a new token from a raw 32-bit value
    #[must_use]
    pub fn new(value: u32) -> Self {
        PcdToken(value)
    }

    /// Returns the raw token value
    #[must_use]
    pub fn value(&self) -> u32 {
        self.0
    }

    /// Parses a declared token value.
    ///
    /// # Errors
    ///
    /// Returns a [`TokenValueError`] describing which of the two accepted forms was violated.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use infscope::metadata::token::{PcdToken, TokenValueError};
    ///
    /// assert_eq!(PcdToken::parse("0x00000001").unwrap().value(), 1);
    /// assert_eq!(PcdToken::parse("4294967295").unwrap().value(), u32::MAX);
    /// assert_eq!(PcdToken::parse("0x123456789"), Err(TokenValueError::Hex));
    /// assert_eq!(PcdToken::parse("4294967296"), Err(TokenValueError::OutOfRange));
    /// ```
    pub fn parse(text: &str) -> Result<Self, TokenValueError> {
        if text.is_empty() {
            return Err(TokenValueError::Empty);
        }

        if let Some(digits) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
            let significant = digits.trim_start_matches('0');
            let significant = if significant.is_empty() && !digits.is_empty() {
                "0"
            } else {
                significant
            };
            if significant.is_empty()
                || significant.len() > 8
                || !significant.bytes().all(|b| b.is_ascii_hexdigit())
            {
                return Err(TokenValueError::Hex);
            }
            return u32::from_str_radix(significant, 16)
                .map(PcdToken)
                .map_err(|_| TokenValueError::Hex);
        }

        if !text.bytes().all(|b| b.is_ascii_digit()) {
            return Err(TokenValueError::Format);
        }
        match text.parse::<u64>() {
            Ok(value) => u32::try_from(value)
                .map(PcdToken)
                .map_err(|_| TokenValueError::OutOfRange),
            // all digits, so the only failure left is overflow
            Err(_) => Err(TokenValueError::OutOfRange),
        }
    }
}

impl From<u32> for PcdToken {
    fn from(value: u32) -> Self {
        PcdToken(value)
    }
}

impl From<PcdToken> for u32 {
    fn from(token: PcdToken) -> Self {
        token.0
    }
}

impl fmt::Debug for PcdToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PcdToken(0x{:08x})", self.0)
    }
}

impl fmt::Display for PcdToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

impl Hash for PcdToken {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}
