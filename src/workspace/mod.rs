//! The build-wide context modules are resolved against.
//!
//! A [`Workspace`] owns everything that is shared between modules and never changes once
//! resolution starts: the [`ResolverConfig`], the registered packages, the record stores of
//! every known module, the PCD alias table, and the macro and expression collaborators.
//! Resolved modules are memoized per [`ModuleKey`], so asking for the same key twice yields
//! the same [`ResolvedModule`] instance.
//!
//! # Key Types
//! - [`Workspace`] - Facade cache and entry point for resolution
//! - [`WorkspaceBuilder`] - Registration of packages, modules and collaborators
//! - [`ModuleKey`] - Identity of one resolution: module file, architecture, target, toolchain
//! - [`BuildContext`] - The immutable shared state a [`ResolvedModule`] reads from
//!
//! # Thread Safety
//!
//! The context is immutable after [`WorkspaceBuilder::build`] and shared through an [`Arc`].
//! The caches are [`DashMap`]s, so independent keys can be resolved from several threads;
//! [`Workspace::resolve_all`] does exactly that with rayon.
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use infscope::prelude::*;
//!
//! let records = RecordTable::new();
//! records.push(RecordBuilder::new(RecordKind::Header).values(["INF_VERSION", "0x00010005"]));
//! records.push(RecordBuilder::new(RecordKind::Header).values(["BASE_NAME", "Hello"]));
//! records.push(RecordBuilder::new(RecordKind::Header).values(["MODULE_TYPE", "UEFI_APPLICATION"]));
//!
//! let workspace = Workspace::builder(ResolverConfig::new("/work/edk2"))
//!     .module("MdeModulePkg/Application/Hello/Hello.inf", records)
//!     .build();
//!
//! let key = ModuleKey::new("MdeModulePkg/Application/Hello/Hello.inf", Arch::X64, "DEBUG", "GCC5");
//! let module = workspace.resolve(&key)?;
//! println!("{} is a {}", module.base_name(), module.module_type());
//! # Ok::<(), infscope::Error>(())
//! ```

mod config;

pub use config::ResolverConfig;

use std::{
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
};

use dashmap::DashMap;
use rayon::prelude::*;

use crate::{
    metadata::{
        arch::Arch,
        expand::{DefaultMacroResolver, MacroResolver},
        expression::{ExpressionEvaluator, ValueEvaluator},
        package::{Package, PackageRc},
        path::normalize_path,
        pcd::PcdType,
        records::RecordStore,
    },
    module::{
        header::{HeaderContext, ModuleHeader},
        pcd::PcdAliasTable,
        ResolvedModule,
    },
    Location, Result,
};

/// Identity of one module resolution.
///
/// Resolution is a pure function of this key and the workspace contents; the target and
/// toolchain do not influence the metadata itself, but distinguish builds that consumers
/// keep apart.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModuleKey {
    /// Workspace relative path of the module description file, `/` separated
    pub path: String,
    /// Target architecture
    pub arch: Arch,
    /// Build target (`DEBUG`, `RELEASE`, ...)
    pub target: String,
    /// Toolchain tag (`GCC5`, `VS2019`, ...)
    pub toolchain: String,
}

impl ModuleKey {
    /// Creates a key; `path` is normalized
    #[must_use]
    pub fn new(
        path: &str,
        arch: Arch,
        target: impl Into<String>,
        toolchain: impl Into<String>,
    ) -> Self {
        ModuleKey {
            path: normalize_path(path),
            arch,
            target: target.into(),
            toolchain: toolchain.into(),
        }
    }
}

impl fmt::Display for ModuleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] {}_{}",
            self.path, self.arch, self.target, self.toolchain
        )
    }
}

/// Immutable state shared by every module of a workspace.
pub struct BuildContext {
    config: ResolverConfig,
    packages: DashMap<String, PackageRc>,
    modules: DashMap<String, Arc<dyn RecordStore>>,
    module_guids: DashMap<(String, Arch), String>,
    aliases: PcdAliasTable,
    macros: Arc<dyn MacroResolver>,
    evaluator: Arc<dyn ExpressionEvaluator>,
}

impl BuildContext {
    /// Resolver settings
    #[must_use]
    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Returns the package registered under the workspace relative `path`
    #[must_use]
    pub fn package(&self, path: &str) -> Option<PackageRc> {
        self.packages
            .get(&normalize_path(path))
            .map(|entry| entry.value().clone())
    }

    /// Returns the record store of the module registered under `path`
    #[must_use]
    pub fn records(&self, path: &str) -> Option<Arc<dyn RecordStore>> {
        self.modules
            .get(&normalize_path(path))
            .map(|entry| entry.value().clone())
    }

    /// The PCD alias table
    #[must_use]
    pub fn aliases(&self) -> &PcdAliasTable {
        &self.aliases
    }

    /// Macro expansion used for every module
    #[must_use]
    pub fn macros(&self) -> &dyn MacroResolver {
        self.macros.as_ref()
    }

    /// PCD default value evaluation used for every module
    #[must_use]
    pub fn evaluator(&self) -> &dyn ExpressionEvaluator {
        self.evaluator.as_ref()
    }

    /// On-disk directory of the module at the workspace relative `path`
    #[must_use]
    pub fn module_dir(&self, path: &str) -> PathBuf {
        let file = self.config.workspace.join(path);
        file.parent()
            .map_or_else(|| self.config.workspace.clone(), Path::to_path_buf)
    }

    /// `FILE_GUID` of another registered module, as seen for `arch`.
    ///
    /// Only the header of that module is resolved; the result is memoized.
    ///
    /// # Errors
    ///
    /// Returns the header resolution error of that module. `Ok(None)` means no module is
    /// registered under `path`.
    pub fn module_guid(&self, path: &str, arch: Arch) -> Result<Option<String>> {
        let path = normalize_path(path);
        let slot = (path, arch);
        if let Some(guid) = self.module_guids.get(&slot) {
            return Ok(Some(guid.value().clone()));
        }

        let Some(records) = self.records(&slot.0) else {
            return Ok(None);
        };
        let module_dir = self.module_dir(&slot.0);
        let ctx = HeaderContext {
            file: Path::new(&slot.0),
            module_dir: &module_dir,
            arch,
            platform: &self.config.platform,
            config: &self.config,
            macros: self.macros(),
        };
        let header = ModuleHeader::parse(records.as_ref(), &ctx)?;
        let guid = header.file_guid;
        self.module_guids.insert(slot, guid.clone());
        Ok(Some(guid))
    }
}

/// Registration of everything a [`Workspace`] resolves against.
///
/// # Examples
///
/// ```rust
/// use infscope::prelude::*;
///
/// let workspace = Workspace::builder(ResolverConfig::new("/work/edk2"))
///     .package(PackageBuilder::new("MdePkg/MdePkg.dec").build())
///     .mixed_pcd("PcdFoo", "gTokenSpaceGuid", PcdType::FixedAtBuild)
///     .build();
/// assert!(workspace.context().package("MdePkg/MdePkg.dec").is_some());
/// ```
#[must_use]
pub struct WorkspaceBuilder {
    config: ResolverConfig,
    packages: Vec<Package>,
    modules: Vec<(String, Arc<dyn RecordStore>)>,
    aliases: PcdAliasTable,
    macros: Arc<dyn MacroResolver>,
    evaluator: Arc<dyn ExpressionEvaluator>,
}

impl WorkspaceBuilder {
    /// Starts a workspace with the default macro resolver and expression evaluator
    pub fn new(config: ResolverConfig) -> Self {
        WorkspaceBuilder {
            config,
            packages: Vec::new(),
            modules: Vec::new(),
            aliases: PcdAliasTable::new(),
            macros: Arc::new(DefaultMacroResolver),
            evaluator: Arc::new(ValueEvaluator),
        }
    }

    /// Registers a package
    pub fn package(mut self, package: Package) -> Self {
        self.packages.push(package);
        self
    }

    /// Registers the records of the module at the workspace relative `path`
    pub fn module(mut self, path: &str, records: impl RecordStore + 'static) -> Self {
        self.modules.push((normalize_path(path), Arc::new(records)));
        self
    }

    /// Registers a shared record store for the module at `path`
    pub fn module_store(mut self, path: &str, records: Arc<dyn RecordStore>) -> Self {
        self.modules.push((normalize_path(path), records));
        self
    }

    /// Declares that the platform split `name` in `token_space` into per-class instances;
    /// modules resolving it as `pcd_type` use the instance `name_<pcd_type>`.
    pub fn mixed_pcd(mut self, name: &str, token_space: &str, pcd_type: PcdType) -> Self {
        self.aliases.insert_mixed(name, token_space, pcd_type);
        self
    }

    /// Replaces the alias table
    pub fn aliases(mut self, aliases: PcdAliasTable) -> Self {
        self.aliases = aliases;
        self
    }

    /// Replaces the macro resolver
    pub fn macro_resolver(mut self, macros: impl MacroResolver + 'static) -> Self {
        self.macros = Arc::new(macros);
        self
    }

    /// Replaces the expression evaluator
    pub fn evaluator(mut self, evaluator: impl ExpressionEvaluator + 'static) -> Self {
        self.evaluator = Arc::new(evaluator);
        self
    }

    /// Freezes the registrations into a [`Workspace`].
    ///
    /// A package or module registered twice under the same path keeps the later
    /// registration.
    pub fn build(self) -> Workspace {
        let packages = DashMap::new();
        for package in self.packages {
            packages.insert(package.path.clone(), Arc::new(package));
        }
        let modules = DashMap::new();
        for (path, records) in self.modules {
            modules.insert(path, records);
        }
        log::debug!(
            "workspace {} with {} packages, {} modules, {} PCD aliases",
            self.config.workspace.display(),
            packages.len(),
            modules.len(),
            self.aliases.len()
        );

        Workspace {
            ctx: Arc::new(BuildContext {
                config: self.config,
                packages,
                modules,
                module_guids: DashMap::new(),
                aliases: self.aliases,
                macros: self.macros,
                evaluator: self.evaluator,
            }),
            cache: DashMap::new(),
        }
    }
}

/// Entry point of module resolution.
pub struct Workspace {
    ctx: Arc<BuildContext>,
    cache: DashMap<ModuleKey, Arc<ResolvedModule>>,
}

impl Workspace {
    /// Starts registering a workspace
    pub fn builder(config: ResolverConfig) -> WorkspaceBuilder {
        WorkspaceBuilder::new(config)
    }

    /// The shared build context
    #[must_use]
    pub fn context(&self) -> &Arc<BuildContext> {
        &self.ctx
    }

    /// Resolves the module identified by `key`.
    ///
    /// The header is resolved eagerly, every other attribute on first access. The facade is
    /// memoized: later calls with an equal key return the same instance.
    ///
    /// # Arguments
    /// * `key` - Module path, architecture, target and toolchain
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::FileValidation`] if no module is registered under the key's
    /// path, or any header resolution error.
    pub fn resolve(&self, key: &ModuleKey) -> Result<Arc<ResolvedModule>> {
        if let Some(module) = self.cache.get(key) {
            return Ok(module.value().clone());
        }

        let records = self.ctx.records(&key.path).ok_or_else(|| {
            resolve_error!(
                FileValidation,
                Location::file(&key.path),
                "module {} is not part of the workspace",
                key.path
            )
        })?;
        let module = Arc::new(ResolvedModule::new(key.clone(), self.ctx.clone(), records)?);

        // a concurrent resolution of the same key may have won the race
        Ok(self.cache.entry(key.clone()).or_insert(module).value().clone())
    }

    /// Resolves many modules in parallel, forcing every attribute of each.
    ///
    /// Results are returned in the order of `keys`.
    pub fn resolve_all(&self, keys: &[ModuleKey]) -> Vec<Result<Arc<ResolvedModule>>> {
        keys.par_iter()
            .map(|key| -> Result<Arc<ResolvedModule>> {
                let module = self.resolve(key)?;
                module.resolve_all()?;
                Ok(module)
            })
            .collect()
    }

    /// Number of memoized facades
    #[must_use]
    pub fn cached(&self) -> usize {
        self.cache.len()
    }
}
