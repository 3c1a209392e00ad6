//! Package declaration indices.
//!
//! A package (`.dec`) declares the protocol, PPI and GUID symbols its modules may reference
//! and the PCDs they may configure. Modules list the packages they depend on; every symbolic
//! name a module uses is settled by walking that list in order.
//!
//! # Private symbols
//!
//! A package may mark symbols as private. Private symbols are only visible to modules whose
//! description file lives below the package directory; to every other module the package
//! behaves as if the symbol was never declared.
//!
//! # Examples
//!
//! ```rust
//! use infscope::metadata::package::PackageBuilder;
//! use infscope::metadata::pcd::{DatumType, PcdDeclaration, PcdType};
//!
//! let guid = uguid::guid!("5b1b31a1-9562-11d2-8e3f-00a0c969723b");
//! let package = PackageBuilder::new("MdePkg/MdePkg.dec")
//!     .protocol("gEfiLoadedImageProtocolGuid", guid)
//!     .pcd(PcdDeclaration::new(
//!         "PcdDebugPropertyMask",
//!         "gEfiMdePkgTokenSpaceGuid",
//!         PcdType::FixedAtBuild,
//!         "0x00000005",
//!         DatumType::Uint8,
//!         "0",
//!     ))
//!     .build();
//!
//! assert_eq!(package.protocol("gEfiLoadedImageProtocolGuid", "MdeModulePkg/A/A.inf"), Some(guid));
//! assert!(package
//!     .pcd("PcdDebugPropertyMask", "gEfiMdePkgTokenSpaceGuid", PcdType::FixedAtBuild)
//!     .is_some());
//! ```

use std::{collections::HashSet, fmt, sync::Arc};

use indexmap::IndexMap;
use uguid::Guid;

use crate::metadata::{
    path::normalize_path,
    pcd::{PcdDeclaration, PcdKey, PcdType},
};

/// A reference to a `Package`
pub type PackageRc = Arc<Package>;

/// Symbol category a package declares names in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    /// `[Protocols]`
    Protocol,
    /// `[Ppis]`
    Ppi,
    /// `[Guids]`
    Guid,
}

/// Declaration index of one package.
#[derive(Debug, Clone, Default)]
pub struct Package {
    /// Workspace relative path of the package file, `/` separated
    pub path: String,
    /// `[Protocols]` symbol table
    pub protocols: IndexMap<String, Guid>,
    /// `[Ppis]` symbol table
    pub ppis: IndexMap<String, Guid>,
    /// `[Guids]` symbol table
    pub guids: IndexMap<String, Guid>,
    /// PCD declarations keyed by `(name, token space, class)`
    pub pcds: IndexMap<PcdKey, PcdDeclaration>,
    private: HashSet<(SymbolKind, String)>,
}

impl Package {
    /// Directory of the package file, `""` for a package at the workspace root
    #[must_use]
    pub fn dir(&self) -> &str {
        self.path.rsplit_once('/').map_or("", |(dir, _)| dir)
    }

    /// Looks up a symbol as seen from the module at `module_path`.
    ///
    /// # Arguments
    /// * `kind` - The symbol table to search
    /// * `name` - C name of the symbol
    /// * `module_path` - Workspace relative path of the requesting module description file
    #[must_use]
    pub fn symbol(&self, kind: SymbolKind, name: &str, module_path: &str) -> Option<Guid> {
        let table = match kind {
            SymbolKind::Protocol => &self.protocols,
            SymbolKind::Ppi => &self.ppis,
            SymbolKind::Guid => &self.guids,
        };
        let value = table.get(name)?;
        if self.private.contains(&(kind, name.to_string())) && !self.contains_module(module_path) {
            return None;
        }
        Some(*value)
    }

    /// Shorthand for [`Package::symbol`] on the protocol table
    #[must_use]
    pub fn protocol(&self, name: &str, module_path: &str) -> Option<Guid> {
        self.symbol(SymbolKind::Protocol, name, module_path)
    }

    /// Shorthand for [`Package::symbol`] on the PPI table
    #[must_use]
    pub fn ppi(&self, name: &str, module_path: &str) -> Option<Guid> {
        self.symbol(SymbolKind::Ppi, name, module_path)
    }

    /// Shorthand for [`Package::symbol`] on the GUID table
    #[must_use]
    pub fn guid(&self, name: &str, module_path: &str) -> Option<Guid> {
        self.symbol(SymbolKind::Guid, name, module_path)
    }

    /// Returns the declaration of `name` in `token_space` under `pcd_type`
    #[must_use]
    pub fn pcd(&self, name: &str, token_space: &str, pcd_type: PcdType) -> Option<&PcdDeclaration> {
        self.pcds
            .get(&(name.to_string(), token_space.to_string(), pcd_type))
    }

    /// Returns true if the module at `module_path` lives below this package's directory
    #[must_use]
    pub fn contains_module(&self, module_path: &str) -> bool {
        let dir = self.dir();
        dir.is_empty()
            || module_path
                .strip_prefix(dir)
                .is_some_and(|rest| rest.starts_with('/'))
    }
}

impl fmt::Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path)
    }
}

/// Fluent construction of a [`Package`].
#[derive(Debug, Clone)]
pub struct PackageBuilder {
    package: Package,
}

impl PackageBuilder {
    /// Starts an empty package at the workspace relative `path`
    #[must_use]
    pub fn new(path: impl AsRef<str>) -> Self {
        PackageBuilder {
            package: Package {
                path: normalize_path(path.as_ref()),
                ..Package::default()
            },
        }
    }

    /// Declares a protocol
    #[must_use]
    pub fn protocol(mut self, name: impl Into<String>, value: Guid) -> Self {
        self.package.protocols.insert(name.into(), value);
        self
    }

    /// Declares a PPI
    #[must_use]
    pub fn ppi(mut self, name: impl Into<String>, value: Guid) -> Self {
        self.package.ppis.insert(name.into(), value);
        self
    }

    /// Declares a GUID
    #[must_use]
    pub fn guid(mut self, name: impl Into<String>, value: Guid) -> Self {
        self.package.guids.insert(name.into(), value);
        self
    }

    /// Declares a symbol that is only visible to modules inside the package
    #[must_use]
    pub fn private(mut self, kind: SymbolKind, name: impl Into<String>, value: Guid) -> Self {
        let name = name.into();
        match kind {
            SymbolKind::Protocol => self.package.protocols.insert(name.clone(), value),
            SymbolKind::Ppi => self.package.ppis.insert(name.clone(), value),
            SymbolKind::Guid => self.package.guids.insert(name.clone(), value),
        };
        self.package.private.insert((kind, name));
        self
    }

    /// Declares a PCD. A later declaration with the same key replaces the earlier one.
    #[must_use]
    pub fn pcd(mut self, declaration: PcdDeclaration) -> Self {
        self.package.pcds.insert(declaration.key(), declaration);
        self
    }

    /// Finishes the package
    #[must_use]
    pub fn build(self) -> Package {
        self.package
    }
}
