//! Per-toolchain build options and the legacy `[nmake]` flag translation.

use indexmap::IndexMap;
use strum::{Display, EnumString};

/// Toolchain families a legacy `CUSTOM_MAKEFILE` may name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
pub enum ToolChainFamily {
    /// Microsoft toolchains
    #[strum(serialize = "MSFT")]
    Msft,
    /// GNU toolchains
    #[strum(serialize = "GCC")]
    Gcc,
}

/// Build options keyed by `(toolchain family, tool flag key)`, in first-declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildOptions {
    options: IndexMap<(String, String), String>,
}

impl BuildOptions {
    /// Creates an empty option set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an option for `(family, key)`.
    ///
    /// A repeated key is concatenated with a single space, unless `option` starts with `=`,
    /// which replaces whatever was collected so far.
    pub fn add(&mut self, family: &str, key: &str, option: &str) {
        let slot = (family.to_string(), key.to_string());
        match self.options.get_mut(&slot) {
            Some(existing) if !option.starts_with('=') => {
                existing.push(' ');
                existing.push_str(option);
            }
            _ => {
                self.options.insert(slot, option.to_string());
            }
        }
    }

    /// Appends an option for `(family, key)`, always concatenating
    pub fn append(&mut self, family: &str, key: &str, option: &str) {
        let slot = (family.to_string(), key.to_string());
        match self.options.get_mut(&slot) {
            Some(existing) => {
                existing.push(' ');
                existing.push_str(option);
            }
            None => {
                self.options.insert(slot, option.to_string());
            }
        }
    }

    /// Returns the collected option string for `(family, key)`
    #[must_use]
    pub fn get(&self, family: &str, key: &str) -> Option<&str> {
        self.options
            .get(&(family.to_string(), key.to_string()))
            .map(String::as_str)
    }

    /// Iterates `((family, key), option)` in first-declaration order
    pub fn iter(&self) -> impl Iterator<Item = (&(String, String), &String)> {
        self.options.iter()
    }

    /// Number of distinct `(family, key)` pairs
    #[must_use]
    pub fn len(&self) -> usize {
        self.options.len()
    }

    /// Returns true if no option was collected
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }
}

/// Extracts the tool name from a legacy `[nmake]` flag variable.
///
/// Recognizes `[EBC_]<TOOL>_[STD_|PROJ_|ARCH_]FLAGS[_DLL|_ASL|_EXE]` anywhere in `name` and
/// returns the tool only when the pattern occurs exactly once. `C`, `LIB` and `LINK` map to
/// `CC`, `SLINK` and `DLINK`.
#[must_use]
pub fn nmake_tool(name: &str) -> Option<String> {
    let bytes = name.as_bytes();
    let mut found = Vec::new();
    let mut pos = 0;
    while pos < bytes.len() {
        match match_flag_at(bytes, pos) {
            Some((tool, end)) => {
                found.push(tool);
                pos = end.max(pos + 1);
            }
            None => pos += 1,
        }
    }

    if found.len() != 1 {
        return None;
    }
    let tool = found.swap_remove(0);
    Some(
        match tool.as_str() {
            "C" => "CC",
            "LIB" => "SLINK",
            "LINK" => "DLINK",
            other => other,
        }
        .to_string(),
    )
}

fn match_flag_at(bytes: &[u8], start: usize) -> Option<(String, usize)> {
    // the optional EBC_ prefix is tried first, then skipped
    let starts = if bytes[start..].starts_with(b"EBC_") {
        vec![start + 4, start]
    } else {
        vec![start]
    };

    for tool_start in starts {
        let tool_end = tool_start
            + bytes[tool_start..]
                .iter()
                .take_while(|b| b.is_ascii_uppercase())
                .count();
        if tool_end == tool_start || bytes.get(tool_end) != Some(&b'_') {
            continue;
        }

        let after = tool_end + 1;
        let mut candidates = Vec::new();
        for infix in [&b"STD_"[..], b"PROJ_", b"ARCH_"] {
            if bytes[after..].starts_with(infix) {
                candidates.push(after + infix.len());
            }
        }
        candidates.push(after);

        for flags in candidates {
            if !bytes[flags..].starts_with(b"FLAGS") {
                continue;
            }
            let mut end = flags + 5;
            for suffix in [&b"_DLL"[..], b"_ASL", b"_EXE"] {
                if bytes[end..].starts_with(suffix) {
                    end += suffix.len();
                    break;
                }
            }
            let tool = String::from_utf8_lossy(&bytes[tool_start..tool_end]).into_owned();
            return Some((tool, end));
        }
    }
    None
}

/// Drops `/D` definitions that are empty or end in `=` (an undefined macro was erased
/// from them) and re-joins the remaining pieces with single spaces.
#[must_use]
pub fn filter_nmake_defines(value: &str) -> String {
    let mut pieces = value.split("/D");
    let mut out = pieces.next().unwrap_or_default().trim().to_string();
    for define in pieces {
        let define = define.trim();
        if define.is_empty() || define.ends_with('=') {
            continue;
        }
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str("/D ");
        out.push_str(define);
    }
    out
}
