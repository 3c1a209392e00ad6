//! Dependency expression compilation.
//!
//! `[Depex]` sections hold postfix expressions the dispatcher evaluates before starting a
//! driver. Each section is scoped to an architecture and a module kind tag (`COMMON` for
//! any). Compilation replaces every operand by the identity value it stands for:
//!
//! | Token | Becomes |
//! |-------|---------|
//! | `BEFORE`, `AFTER`, `PUSH`, `AND`, `OR`, `NOT`, `END`, `SOR`, `TRUE`, `FALSE` | [`DepexToken::Opcode`] |
//! | `Path/To/Module.inf` | the `FILE_GUID` of that module |
//! | `TokenSpace.PcdName` | [`DepexToken::Pcd`], the PCD must be a `VOID*` PCD of this module |
//! | anything else | a protocol, PPI or GUID name, tried in that order |
//!
//! Modules that ship only binaries carry a prebuilt expression and are not compiled.

use std::fmt;

use indexmap::IndexMap;
use strum::{Display, EnumString};
use uguid::Guid;

use crate::{
    metadata::{
        arch::Arch,
        expand::UndefinedMacro,
        package::SymbolKind,
        path::normalize_path,
        records::{RecordKind, RecordRc, SCOPE_COMMON},
    },
    module::{kind::ModuleKind, ResolvedModule},
    utils::parse_guid,
    Location, Result,
};

/// Operators of the dependency expression language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "UPPERCASE")]
pub enum DepexOpcode {
    /// Schedule before the named driver
    Before,
    /// Schedule after the named driver
    After,
    /// Push an identity
    Push,
    /// Logical and
    And,
    /// Logical or
    Or,
    /// Logical not
    Not,
    /// End of expression
    End,
    /// Schedule on request
    Sor,
    /// Constant true
    True,
    /// Constant false
    False,
}

/// One compiled token.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DepexToken {
    /// An operator
    Opcode(DepexOpcode),
    /// A protocol, PPI, GUID or module identity
    Guid(Guid),
    /// A `VOID*` PCD holding an identity at run time
    Pcd {
        /// Token space GUID C name
        token_space: String,
        /// Token C name
        name: String,
    },
}

impl fmt::Display for DepexToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DepexToken::Opcode(opcode) => write!(f, "{opcode}"),
            DepexToken::Guid(guid) => write!(f, "{guid}"),
            DepexToken::Pcd { token_space, name } => write!(f, "{token_space}.{name}"),
        }
    }
}

/// Scope of a dependency expression: architecture and module kind, `None` for `COMMON`
pub type DepexScope = (Arch, Option<ModuleKind>);

/// Per-scope values with `COMMON` fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopedMap<T> {
    entries: IndexMap<DepexScope, T>,
}

impl<T> Default for ScopedMap<T> {
    fn default() -> Self {
        ScopedMap {
            entries: IndexMap::new(),
        }
    }
}

impl<T> ScopedMap<T> {
    /// Value for `arch` and `kind`.
    ///
    /// Tries the exact scope, then the `COMMON` kind, then the `COMMON` architecture with
    /// the exact and `COMMON` kind.
    #[must_use]
    pub fn get(&self, arch: Arch, kind: ModuleKind) -> Option<&T> {
        [
            (arch, Some(kind)),
            (arch, None),
            (Arch::Common, Some(kind)),
            (Arch::Common, None),
        ]
        .iter()
        .find_map(|scope| self.entries.get(scope))
    }

    /// Value stored for exactly `scope`
    #[must_use]
    pub fn get_exact(&self, scope: &DepexScope) -> Option<&T> {
        self.entries.get(scope)
    }

    /// Iterates scopes in first-declaration order
    pub fn iter(&self) -> impl Iterator<Item = (&DepexScope, &T)> {
        self.entries.iter()
    }

    /// Number of scopes
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the module has no expression
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Compiled dependency expressions
pub type Depex = ScopedMap<Vec<DepexToken>>;

/// Dependency expressions as text, tokens joined by single spaces
pub type DepexExpression = ScopedMap<String>;

impl ResolvedModule {
    pub(crate) fn resolve_depex(&self) -> Result<Depex> {
        let mut depex = Depex::default();
        if !self.binaries()?.is_empty() && self.sources()?.is_empty() {
            return Ok(depex);
        }

        let records = self.query_arch(RecordKind::Depex);
        if records.is_empty()
            && self.library_class().is_empty()
            && self.module_type().requires_depex()
        {
            return Err(resolve_error!(
                MissingRequiredField,
                Location::file(&self.key().path),
                "No [Depex] section or no valid expression in [Depex] section for [{}] module",
                self.module_type()
            ));
        }

        for record in &records {
            let scope = self.depex_scope(record)?;
            let mut tokens = Vec::new();
            for token in self.depex_words(record) {
                tokens.push(self.depex_token(record, &token)?);
            }
            depex.entries.entry(scope).or_default().extend(tokens);
        }
        log::debug!("{}: {} dependency expressions", self.key(), depex.len());
        Ok(depex)
    }

    pub(crate) fn resolve_depex_expression(&self) -> DepexExpression {
        let mut expressions = DepexExpression::default();
        for record in self.query_arch(RecordKind::Depex) {
            let Some(scope) = scope_of(&record) else {
                continue;
            };
            let text = self.depex_words(&record).join(" ");
            if text.is_empty() {
                continue;
            }
            let slot = expressions.entries.entry(scope).or_default();
            if !slot.is_empty() {
                slot.push(' ');
            }
            slot.push_str(&text);
        }
        expressions
    }

    fn depex_words(&self, record: &RecordRc) -> Vec<String> {
        self.context()
            .macros()
            .expand(record.value(0), &self.header().macros, UndefinedMacro::Keep)
            .split_whitespace()
            .map(str::to_string)
            .collect()
    }

    fn depex_scope(&self, record: &RecordRc) -> Result<DepexScope> {
        let at = || Location::new(&self.key().path, record.line);
        let scope = scope_of(record).ok_or_else(|| {
            resolve_error!(
                UnsupportedValue,
                at(),
                "[Depex] section tag {} is not a module type",
                record.scope
            )
        })?;

        if self.module_type() == ModuleKind::UserDefined
            && !scope.1.is_some_and(ModuleKind::is_depex_target)
        {
            return Err(resolve_error!(
                StructuralConflict,
                at(),
                "Module type can't be {} in [Depex] section of a USER_DEFINED module, expected PEIM, DXE_DRIVER or DXE_SMM_DRIVER",
                record.scope
            ));
        }
        Ok(scope)
    }

    fn depex_token(&self, record: &RecordRc, token: &str) -> Result<DepexToken> {
        let at = || Location::new(&self.key().path, record.line);

        if let Ok(opcode) = token.parse::<DepexOpcode>() {
            return Ok(DepexToken::Opcode(opcode));
        }

        if token.to_ascii_lowercase().ends_with(".inf") {
            let path = normalize_path(token);
            let guid = self
                .context()
                .module_guid(&path, self.key().arch)?
                .ok_or_else(|| {
                    resolve_error!(
                        UnresolvedSymbol,
                        at(),
                        "Module {} in [Depex] section is not part of the workspace",
                        path
                    )
                })?;
            let value = parse_guid(&guid).ok_or_else(|| {
                resolve_error!(
                    MalformedLiteral,
                    at(),
                    "FILE_GUID {} of module {} is not a valid GUID",
                    guid,
                    path
                )
            })?;
            return Ok(DepexToken::Guid(value));
        }

        if let Some((token_space, name)) = token.split_once('.') {
            let pcd = self.pcds()?.get(name, token_space).ok_or_else(|| {
                resolve_error!(
                    UnresolvedSymbol,
                    at(),
                    "PCD {} used in [Depex] section is not declared by the module",
                    token
                )
            })?;
            if !pcd.datum_type.is_pointer() {
                return Err(resolve_error!(
                    UnsupportedValue,
                    at(),
                    "PCD {} used in [Depex] section must be VOID*, found {}",
                    token,
                    pcd.datum_type
                ));
            }
            return Ok(DepexToken::Pcd {
                token_space: token_space.to_string(),
                name: name.to_string(),
            });
        }

        for kind in [SymbolKind::Protocol, SymbolKind::Ppi, SymbolKind::Guid] {
            if let Some(value) = self.find_symbol(kind, token)? {
                return Ok(DepexToken::Guid(value));
            }
        }
        Err(resolve_error!(
            UnresolvedSymbol,
            at(),
            "Value {} of [Depex] section is not a protocol, PPI or GUID of the dependent packages [{}]",
            token,
            self.package_list()
        ))
    }
}

/// Scope of a `[Depex]` record, `None` if its tag is not a module kind
fn scope_of(record: &RecordRc) -> Option<DepexScope> {
    let tag = record.scope.trim();
    let kind = if tag.is_empty() || tag.eq_ignore_ascii_case(SCOPE_COMMON) {
        None
    } else {
        Some(tag.parse::<ModuleKind>().ok()?)
    };
    Some((record.arch, kind))
}
