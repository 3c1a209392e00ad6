//! `$(NAME)` macro expansion inside declaration values.
//!
//! The resolver builds a [`MacroTable`] while it walks the `[Defines]` block (each define
//! becomes a macro visible to later values) and hands it to a [`MacroResolver`] together
//! with a policy for references to names the table does not define.

use indexmap::IndexMap;

/// Macro name to replacement text, in definition order
pub type MacroTable = IndexMap<String, String>;

/// What happens to `$(NAME)` when `NAME` is not defined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UndefinedMacro {
    /// Leave the reference in place
    #[default]
    Keep,
    /// Replace the reference with nothing
    Erase,
}

/// Expands macro references inside string values.
pub trait MacroResolver: Send + Sync {
    /// Returns `text` with every `$(NAME)` reference replaced from `macros`.
    fn expand(&self, text: &str, macros: &MacroTable, undefined: UndefinedMacro) -> String;
}

/// Single pass `$(NAME)` expansion.
///
/// Replacement text is not scanned again, so a macro whose value contains another reference
/// yields that reference verbatim. Values stored in a [`MacroTable`] by the resolver are
/// already expanded when they are inserted.
///
/// # Examples
///
/// ```rust
/// use infscope::metadata::expand::{DefaultMacroResolver, MacroResolver, MacroTable, UndefinedMacro};
///
/// let mut macros = MacroTable::new();
/// macros.insert("ARCH".to_string(), "X64".to_string());
///
/// let resolver = DefaultMacroResolver;
/// assert_eq!(resolver.expand("$(ARCH)/a.c", &macros, UndefinedMacro::Keep), "X64/a.c");
/// assert_eq!(resolver.expand("$(NOPE)/a.c", &macros, UndefinedMacro::Keep), "$(NOPE)/a.c");
/// assert_eq!(resolver.expand("$(NOPE)/a.c", &macros, UndefinedMacro::Erase), "/a.c");
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultMacroResolver;

impl MacroResolver for DefaultMacroResolver {
    fn expand(&self, text: &str, macros: &MacroTable, undefined: UndefinedMacro) -> String {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;

        while let Some(start) = rest.find("$(") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let Some(end) = after.find(')') else {
                // unterminated, copy as is
                out.push_str(&rest[start..]);
                return out;
            };

            let name = &after[..end];
            match macros.get(name) {
                Some(value) => out.push_str(value),
                None if undefined == UndefinedMacro::Keep => {
                    out.push_str(&rest[start..start + 2 + end + 1]);
                }
                None => {}
            }
            rest = &after[end + 1..];
        }

        out.push_str(rest);
        out
    }
}
