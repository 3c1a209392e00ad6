//! PCD resolution.
//!
//! A module lists the PCDs it uses per category (`[FixedPcd]`, `[PatchPcd]`, `[FeaturePcd]`,
//! `[Pcd]`, `[PcdEx]`), optionally with its own default value. Each entry is matched against
//! the PCD declarations of the module's packages, walked in dependency order:
//!
//! 1. The token space GUID name is resolved, from the module's own `[Guids]` first and from
//!    the packages otherwise. GUIDs found in packages are reported in
//!    [`PcdMap::guids_used`].
//! 2. The effective class is the category's class. For the generic `[Pcd]` category it is
//!    the first class in [`DYNAMIC_TYPE_PRIORITY`] the package declares the PCD under, and
//!    the search ends with the first package that declares the PCD at all.
//! 3. The declaring package supplies the token number, datum type and maximum size. A module
//!    default is evaluated against the GUID names visible so far and replaces the package
//!    default.
//!
//! Categories are processed in the order above; a PCD listed in several categories keeps
//! the entry of the last one.
//!
//! # Mixed PCDs
//!
//! A platform may split one declared PCD into per-class instances. The [`PcdAliasTable`]
//! records these splits; a module resolving such a PCD under a split class stores it under
//! the instance name while still looking up the declared name in the packages.

use std::fmt;

use indexmap::IndexMap;
use uguid::Guid;

use crate::{
    metadata::{
        arch::Arch,
        package::{PackageRc, SymbolKind},
        pcd::{DatumType, PcdDeclaration, PcdType, DYNAMIC_TYPE_PRIORITY},
        records::{RecordKind, RecordRc, SCOPE_COMMON},
        token::PcdToken,
    },
    module::ResolvedModule,
    utils::split_pcd_setting,
    Location, Result,
};

/// Key of a module PCD: `(token name, token space GUID name)`
pub type PcdName = (String, String);

/// Record categories in resolution order, with the class each one requests
const CATEGORIES: [(RecordKind, PcdType); 5] = [
    (RecordKind::PcdFixedAtBuild, PcdType::FixedAtBuild),
    (RecordKind::PcdPatchableInModule, PcdType::PatchableInModule),
    (RecordKind::PcdFeatureFlag, PcdType::FeatureFlag),
    (RecordKind::PcdDynamic, PcdType::Dynamic),
    (RecordKind::PcdDynamicEx, PcdType::DynamicEx),
];

/// A PCD as used by one module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pcd {
    /// Token C name as declared by the package
    pub token_cname: String,
    /// Token space GUID C name
    pub token_space_guid_cname: String,
    /// Token space GUID value
    pub token_space_guid_value: Guid,
    /// Effective class
    pub pcd_type: PcdType,
    /// Datum type from the package
    pub datum_type: DatumType,
    /// Token number from the package
    pub token_value: PcdToken,
    /// Maximum datum size from the package
    pub max_datum_size: Option<String>,
    /// Final value: the evaluated module default, or the package default
    pub default_value: String,
    /// The module supplied default as written, if any
    pub inf_default_value: Option<String>,
    /// Patch offset, `[PatchPcd]` only
    pub offset: Option<String>,
    /// Listed in the generic `[Pcd]` category; the platform may still narrow the class
    pub pending: bool,
    /// Path of the declaring package
    pub package: String,
}

/// All PCDs of a module.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PcdMap {
    /// PCDs keyed by `(token name, token space)`; mixed PCDs use their instance name
    pub pcds: IndexMap<PcdName, Pcd>,
    /// Comment lines of each PCD's declaration, same keys as `pcds`
    pub comments: IndexMap<PcdName, Vec<String>>,
    /// Token space GUIDs resolved from packages rather than the module's `[Guids]`
    pub guids_used: IndexMap<String, Guid>,
}

impl PcdMap {
    /// Returns the PCD `name` in `token_space`
    #[must_use]
    pub fn get(&self, name: &str, token_space: &str) -> Option<&Pcd> {
        self.pcds.get(&(name.to_string(), token_space.to_string()))
    }

    /// Number of PCDs
    #[must_use]
    pub fn len(&self) -> usize {
        self.pcds.len()
    }

    /// Returns true if the module uses no PCDs
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pcds.is_empty()
    }
}

/// Build-wide PCD renames introduced by splitting a PCD into per-class instances.
///
/// Built once before any module is resolved and read-only afterwards.
///
/// # Examples
///
/// ```rust
/// use infscope::{metadata::pcd::PcdType, module::pcd::PcdAliasTable};
///
/// let mut aliases = PcdAliasTable::new();
/// aliases.insert_mixed("PcdFoo", "gTokenSpaceGuid", PcdType::DynamicEx);
/// assert_eq!(
///     aliases.renamed("PcdFoo", "gTokenSpaceGuid", PcdType::DynamicEx),
///     Some("PcdFoo_DynamicEx")
/// );
/// assert_eq!(aliases.renamed("PcdFoo", "gTokenSpaceGuid", PcdType::FixedAtBuild), None);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PcdAliasTable {
    entries: IndexMap<PcdName, Vec<(PcdType, String)>>,
}

impl PcdAliasTable {
    /// Creates an empty table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Renames `name` in `token_space` to `renamed` when resolved as `pcd_type`
    pub fn insert(&mut self, name: &str, token_space: &str, pcd_type: PcdType, renamed: &str) {
        let instances = self
            .entries
            .entry((name.to_string(), token_space.to_string()))
            .or_default();
        match instances.iter_mut().find(|(class, _)| *class == pcd_type) {
            Some(slot) => slot.1 = renamed.to_string(),
            None => instances.push((pcd_type, renamed.to_string())),
        }
    }

    /// Registers the conventional `name_<class>` instance of a split PCD
    pub fn insert_mixed(&mut self, name: &str, token_space: &str, pcd_type: PcdType) {
        let renamed = format!("{name}_{pcd_type}");
        self.insert(name, token_space, pcd_type, &renamed);
    }

    /// Instance name of `name` in `token_space` for `pcd_type`, if it was split
    #[must_use]
    pub fn renamed(&self, name: &str, token_space: &str, pcd_type: PcdType) -> Option<&str> {
        self.entries
            .get(&(name.to_string(), token_space.to_string()))?
            .iter()
            .find(|(class, _)| *class == pcd_type)
            .map(|(_, renamed)| renamed.as_str())
    }

    /// Number of split PCDs
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no PCD was split
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One module PCD entry after duplicate elimination
struct Usage {
    record: RecordRc,
    name: String,
    token_space: String,
}

impl fmt::Display for Usage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.token_space, self.name)
    }
}

impl ResolvedModule {
    pub(crate) fn resolve_pcds(&self) -> Result<PcdMap> {
        let mut map = PcdMap::default();
        for (kind, category) in CATEGORIES {
            for usage in self.pcd_usages(kind)? {
                let token_space = self.token_space(&usage, &mut map)?;
                let comments = self.comments_of(&usage.record);
                let (key, pcd) = self.declare_pcd(&usage, category, token_space, &map)?;
                map.comments.insert(key.clone(), comments);
                map.pcds.insert(key, pcd);
            }
        }
        log::debug!("{}: {} PCDs", self.key(), map.len());
        Ok(map)
    }

    /// Entries of one category; an architecture or platform specific entry replaces a
    /// `COMMON` one, two equally specific entries must agree.
    fn pcd_usages(&self, kind: RecordKind) -> Result<Vec<Usage>> {
        let mut chosen: IndexMap<PcdName, (u8, RecordRc)> = IndexMap::new();
        for record in self.query(kind) {
            let key = (record.value(1).to_string(), record.value(0).to_string());
            let rank = u8::from(record.arch != Arch::Common) * 2
                + u8::from(!record.scope.eq_ignore_ascii_case(SCOPE_COMMON));
            match chosen.get_mut(&key) {
                Some((held, existing)) if *held == rank => {
                    if existing.value(2) != record.value(2) {
                        return Err(resolve_error!(
                            StructuralConflict,
                            Location::new(&self.key().path, record.line),
                            "PCD {}.{} is declared again with setting '{}', line {} has '{}'",
                            key.1,
                            key.0,
                            record.value(2),
                            existing.line,
                            existing.value(2)
                        ));
                    }
                }
                Some((held, existing)) if *held < rank => {
                    *held = rank;
                    *existing = record;
                }
                Some(_) => {}
                None => {
                    chosen.insert(key, (rank, record));
                }
            }
        }

        Ok(chosen
            .into_iter()
            .map(|((name, token_space), (_, record))| Usage {
                record,
                name,
                token_space,
            })
            .collect())
    }

    fn token_space(&self, usage: &Usage, map: &mut PcdMap) -> Result<Guid> {
        if let Some(value) = self.guids()?.get(&usage.token_space) {
            return Ok(*value);
        }
        if let Some(value) = map.guids_used.get(&usage.token_space) {
            return Ok(*value);
        }
        let value = self
            .find_symbol(SymbolKind::Guid, &usage.token_space)?
            .ok_or_else(|| self.unresolved(&usage.record, SymbolKind::Guid, &usage.token_space))?;
        map.guids_used.insert(usage.token_space.clone(), value);
        Ok(value)
    }

    fn declare_pcd(
        &self,
        usage: &Usage,
        category: PcdType,
        token_space_value: Guid,
        map: &PcdMap,
    ) -> Result<(PcdName, Pcd)> {
        let at = Location::new(&self.key().path, usage.record.line);
        let [value, offset, _] = split_pcd_setting(usage.record.value(2));

        let mut guid_table = self.guids()?.values.clone();
        guid_table.extend(map.guids_used.iter().map(|(name, guid)| (name.clone(), *guid)));

        let packages = self.packages()?;
        for package in packages {
            guid_table.extend(package.guids.iter().map(|(name, guid)| (name.clone(), *guid)));

            let Some((effective, declaration)) = declaration_in(package, usage, category) else {
                continue;
            };

            let aliases = self.context().aliases();
            let key_name = match aliases.renamed(&usage.name, &usage.token_space, effective) {
                Some(renamed) => {
                    log::debug!("{}: {} resolved as {}", self.key(), usage, renamed);
                    renamed.to_string()
                }
                None => usage.name.clone(),
            };

            let token_value = PcdToken::parse(&declaration.token_value).map_err(|err| {
                resolve_error!(
                    MalformedLiteral,
                    at.clone(),
                    "The format of TokenValue [{}] of PCD [{}] in [{}] is invalid: {}",
                    declaration.token_value,
                    usage,
                    package.path,
                    err
                )
            })?;

            let default_value = if value.is_empty() {
                declaration.default_value.clone()
            } else {
                self.context()
                    .evaluator()
                    .evaluate(&value, &declaration.datum_type, &guid_table)
                    .map_err(|err| {
                        resolve_error!(
                            ExpressionEvaluation,
                            at.clone(),
                            "PCD [{}] value '{}' is invalid: {}",
                            usage,
                            value,
                            err
                        )
                    })?
            };

            let offset = (category == PcdType::PatchableInModule && !offset.is_empty())
                .then_some(offset);
            let pcd = Pcd {
                token_cname: usage.name.clone(),
                token_space_guid_cname: usage.token_space.clone(),
                token_space_guid_value: token_space_value,
                pcd_type: effective,
                datum_type: declaration.datum_type.clone(),
                token_value,
                max_datum_size: declaration.max_datum_size.clone(),
                default_value,
                inf_default_value: (!value.is_empty()).then_some(value),
                offset,
                pending: category == PcdType::Dynamic,
                package: package.path.clone(),
            };
            return Ok(((key_name, usage.token_space.clone()), pcd));
        }

        Err(resolve_error!(
            UnresolvedSymbol,
            at,
            "No {} declaration of PCD [{}] found in any of the dependent packages [{}]",
            category,
            usage,
            packages
                .iter()
                .map(|package| package.path.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        ))
    }
}

/// The class and declaration `package` provides for `usage` in `category`
fn declaration_in<'a>(
    package: &'a PackageRc,
    usage: &Usage,
    category: PcdType,
) -> Option<(PcdType, &'a PcdDeclaration)> {
    let classes: &[PcdType] = if category == PcdType::Dynamic {
        &DYNAMIC_TYPE_PRIORITY
    } else {
        std::slice::from_ref(&category)
    };
    classes.iter().find_map(|class| {
        package
            .pcd(&usage.name, &usage.token_space, *class)
            .map(|declaration| (*class, declaration))
    })
}
