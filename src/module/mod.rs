//! The resolved module facade.
//!
//! A [`ResolvedModule`] is the resolution of one [`ModuleKey`]. Construction resolves the
//! `[Defines]` block ([`header::ModuleHeader`]); every other attribute is computed the first
//! time it is asked for and memoized for the lifetime of the facade. Attributes depend on
//! each other (PCDs need the packages and GUIDs, the dependency expression needs the PCDs),
//! and each accessor pulls what it needs through the other accessors, so the order in which
//! a consumer reads them does not matter.
//!
//! # Key Components
//!
//! - [`header`] - `[Defines]` and legacy `[nmake]` resolution
//! - [`kind`] - Module kinds and build type classification
//! - [`files`] - Sources, binaries, includes, libraries, packages, build options
//! - [`symbols`] - Protocols, PPIs and GUIDs
//! - [`pcd`] - PCD resolution and the alias table
//! - [`depex`] - Dependency expression compilation
//! - [`options`] - Build option collection
//!
//! # Errors
//!
//! Every failure is fatal for the attribute being resolved and is returned again on the
//! next access; nothing is memoized for a failed attribute.
//!
//! # Examples
//!
//! ```rust,no_run
//! use infscope::prelude::*;
//!
//! fn summarize(workspace: &Workspace, key: &ModuleKey) -> infscope::Result<()> {
//!     let module = workspace.resolve(key)?;
//!     println!("{} ({})", module.base_name(), module.guid());
//!     for package in module.packages()? {
//!         println!("  depends on {}", package.path);
//!     }
//!     for ((name, space), pcd) in &module.pcds()?.pcds {
//!         println!("  {space}.{name} = {} [{}]", pcd.default_value, pcd.pcd_type);
//!     }
//!     Ok(())
//! }
//! ```

pub mod depex;
pub mod files;
pub mod header;
pub mod kind;
pub mod options;
pub mod pcd;
pub mod symbols;

use std::{
    path::{Path, PathBuf},
    sync::{Arc, OnceLock},
};

use indexmap::IndexMap;
use uguid::Guid;

use crate::{
    metadata::{
        package::{PackageRc, SymbolKind},
        records::{RecordKind, RecordQuery, RecordRc, RecordStore},
    },
    module::{
        depex::{Depex, DepexExpression},
        files::{BinaryFile, SourceFile},
        header::{HeaderContext, LibraryClassDecl, ModuleHeader, SpecificationKey},
        kind::{BuildType, ModuleKind},
        options::{BuildOptions, ToolChainFamily},
        pcd::PcdMap,
        symbols::SymbolMap,
    },
    workspace::{BuildContext, ModuleKey},
    Result,
};

/// Resolves `cell` with `resolve` unless it already holds a value.
///
/// A failed resolution leaves the cell empty. Two threads racing on the same cell may both
/// compute the value; the first one stored is the one every caller sees.
fn memoize<T>(cell: &OnceLock<T>, resolve: impl FnOnce() -> Result<T>) -> Result<&T> {
    if let Some(value) = cell.get() {
        return Ok(value);
    }
    let value = resolve()?;
    Ok(cell.get_or_init(|| value))
}

/// The resolution of one module for one architecture, target and toolchain.
///
/// Obtained from [`crate::Workspace::resolve`]. All accessors take `&self`; lazily resolved
/// attributes return `Result<&T>` and borrow from the facade.
pub struct ResolvedModule {
    key: ModuleKey,
    ctx: Arc<BuildContext>,
    records: Arc<dyn RecordStore>,
    module_dir: PathBuf,
    override_dir: Option<PathBuf>,
    header: ModuleHeader,

    library_classes: OnceLock<IndexMap<String, Option<String>>>,
    libraries: OnceLock<Vec<String>>,
    sources: OnceLock<Vec<SourceFile>>,
    binaries: OnceLock<Vec<BinaryFile>>,
    includes: OnceLock<Vec<PathBuf>>,
    packages: OnceLock<Vec<PackageRc>>,
    protocols: OnceLock<SymbolMap>,
    ppis: OnceLock<SymbolMap>,
    guids: OnceLock<SymbolMap>,
    pcds: OnceLock<PcdMap>,
    build_options: OnceLock<BuildOptions>,
    depex: OnceLock<Depex>,
    depex_expression: OnceLock<DepexExpression>,
}

impl std::fmt::Debug for ResolvedModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedModule")
            .field("key", &self.key)
            .field("module_dir", &self.module_dir)
            .field("override_dir", &self.override_dir)
            .field("header", &self.header)
            .finish_non_exhaustive()
    }
}

impl ResolvedModule {
    /// Resolves the header of the module at `key` and creates the facade.
    ///
    /// # Errors
    ///
    /// Returns any header resolution error, see [`ModuleHeader::parse`].
    pub fn new(key: ModuleKey, ctx: Arc<BuildContext>, records: Arc<dyn RecordStore>) -> Result<Self> {
        let module_dir = ctx.module_dir(&key.path);
        let config = ctx.config();
        let header = ModuleHeader::parse(
            records.as_ref(),
            &HeaderContext {
                file: Path::new(&key.path),
                module_dir: &module_dir,
                arch: key.arch,
                platform: &config.platform,
                config,
                macros: ctx.macros(),
            },
        )?;

        let override_dir = config
            .source_override(&key.path)
            .map(Path::to_path_buf)
            .or_else(|| {
                header
                    .source_override_path
                    .as_ref()
                    .map(|dir| config.workspace.join(dir))
            });

        Ok(ResolvedModule {
            key,
            records,
            module_dir,
            override_dir,
            header,
            library_classes: OnceLock::new(),
            libraries: OnceLock::new(),
            sources: OnceLock::new(),
            binaries: OnceLock::new(),
            includes: OnceLock::new(),
            packages: OnceLock::new(),
            protocols: OnceLock::new(),
            ppis: OnceLock::new(),
            guids: OnceLock::new(),
            pcds: OnceLock::new(),
            build_options: OnceLock::new(),
            depex: OnceLock::new(),
            depex_expression: OnceLock::new(),
            ctx,
        })
    }

    /// Resolution key of this facade
    #[must_use]
    pub fn key(&self) -> &ModuleKey {
        &self.key
    }

    /// The build context the module was resolved against
    #[must_use]
    pub fn context(&self) -> &BuildContext {
        &self.ctx
    }

    /// Directory of the module description file
    #[must_use]
    pub fn module_dir(&self) -> &Path {
        &self.module_dir
    }

    /// Source override directory, from the workspace configuration or `SOURCE_OVERRIDE_PATH`
    #[must_use]
    pub fn override_dir(&self) -> Option<&Path> {
        self.override_dir.as_deref()
    }

    /// The complete resolved header
    #[must_use]
    pub fn header(&self) -> &ModuleHeader {
        &self.header
    }

    /// `BASE_NAME`
    #[must_use]
    pub fn base_name(&self) -> &str {
        &self.header.base_name
    }

    /// `FILE_GUID` as written, all-zero when absent
    #[must_use]
    pub fn guid(&self) -> &str {
        &self.header.file_guid
    }

    /// Module kind
    #[must_use]
    pub fn module_type(&self) -> ModuleKind {
        self.header.module_type
    }

    /// Build type classification
    #[must_use]
    pub fn build_type(&self) -> &BuildType {
        &self.header.build_type
    }

    /// `COMPONENT_TYPE`, `USER_DEFINED` when absent
    #[must_use]
    pub fn component_type(&self) -> &str {
        &self.header.component_type
    }

    /// Declared specification versions
    #[must_use]
    pub fn specification(&self) -> &IndexMap<SpecificationKey, u32> {
        &self.header.specification
    }

    /// `SHADOW = TRUE`
    #[must_use]
    pub fn shadow(&self) -> bool {
        self.header.shadow
    }

    /// Legacy custom makefile per toolchain family
    #[must_use]
    pub fn custom_makefile(&self) -> &IndexMap<ToolChainFamily, String> {
        &self.header.custom_makefile
    }

    /// Entry point names
    #[must_use]
    pub fn entry_points(&self) -> &[String] {
        &self.header.entry_points
    }

    /// Unload image names
    #[must_use]
    pub fn unload_images(&self) -> &[String] {
        &self.header.unload_images
    }

    /// Library constructor names
    #[must_use]
    pub fn constructors(&self) -> &[String] {
        &self.header.constructors
    }

    /// Library destructor names
    #[must_use]
    pub fn destructors(&self) -> &[String] {
        &self.header.destructors
    }

    /// Library classes this module provides an instance of
    #[must_use]
    pub fn library_class(&self) -> &[LibraryClassDecl] {
        &self.header.library_class
    }

    /// Module version, `0.0` when absent
    #[must_use]
    pub fn version(&self) -> &str {
        &self.header.version
    }

    /// `PCD_IS_DRIVER`
    #[must_use]
    pub fn pcd_is_driver(&self) -> &str {
        &self.header.pcd_is_driver
    }

    /// `MAKEFILE_NAME`
    #[must_use]
    pub fn makefile_name(&self) -> &str {
        &self.header.makefile_name
    }

    /// Every define that is not a specification version or an ordered list entry
    #[must_use]
    pub fn defines(&self) -> &IndexMap<String, String> {
        &self.header.defines
    }

    /// Comment block before `[Defines]`
    #[must_use]
    pub fn header_comments(&self) -> &[String] {
        &self.header.header_comments
    }

    /// Comment block at the end of the file
    #[must_use]
    pub fn tail_comments(&self) -> &[String] {
        &self.header.tail_comments
    }

    /// Declared format version
    #[must_use]
    pub fn inf_version(&self) -> u32 {
        self.header.inf_version
    }

    /// Returns true for pre-1.5 module descriptions
    #[must_use]
    pub fn is_legacy(&self) -> bool {
        self.header.is_legacy()
    }

    /// `[LibraryClasses]`: class name to the instance path the module pins, if any.
    ///
    /// # Errors
    ///
    /// This attribute does not fail; the `Result` keeps the accessor shape uniform.
    pub fn library_classes(&self) -> Result<&IndexMap<String, Option<String>>> {
        memoize(&self.library_classes, || Ok(self.resolve_library_classes()))
    }

    /// Legacy `[Libraries]`: library names without extension, de-duplicated.
    ///
    /// # Errors
    ///
    /// This attribute does not fail; the `Result` keeps the accessor shape uniform.
    pub fn libraries(&self) -> Result<&[String]> {
        memoize(&self.libraries, || Ok(self.resolve_libraries())).map(Vec::as_slice)
    }

    /// Validated source files, followed by the dependency expression sources.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::FileValidation`] for a missing source that is not a header file.
    pub fn sources(&self) -> Result<&[SourceFile]> {
        memoize(&self.sources, || self.resolve_sources()).map(Vec::as_slice)
    }

    /// Validated binary files.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::FileValidation`] for a missing binary, and
    /// [`crate::Error::MissingRequiredField`] for a binary-only build without binaries.
    pub fn binaries(&self) -> Result<&[BinaryFile]> {
        memoize(&self.binaries, || self.resolve_binaries()).map(Vec::as_slice)
    }

    /// Legacy include directories that exist on disk.
    ///
    /// # Errors
    ///
    /// This attribute does not fail; the `Result` keeps the accessor shape uniform.
    pub fn includes(&self) -> Result<&[PathBuf]> {
        memoize(&self.includes, || Ok(self.resolve_includes())).map(Vec::as_slice)
    }

    /// Packages the module depends on, in declaration order.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::FileValidation`] for a reference that is not a `.dec` file or
    /// not registered with the workspace.
    pub fn packages(&self) -> Result<&[PackageRc]> {
        memoize(&self.packages, || self.resolve_packages()).map(Vec::as_slice)
    }

    /// Resolved `[Protocols]`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::UnresolvedSymbol`] for a name no dependent package declares.
    pub fn protocols(&self) -> Result<&SymbolMap> {
        memoize(&self.protocols, || self.resolve_symbols(SymbolKind::Protocol))
    }

    /// Resolved `[Ppis]`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::UnresolvedSymbol`] for a name no dependent package declares.
    pub fn ppis(&self) -> Result<&SymbolMap> {
        memoize(&self.ppis, || self.resolve_symbols(SymbolKind::Ppi))
    }

    /// Resolved `[Guids]`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::UnresolvedSymbol`] for a name no dependent package declares.
    pub fn guids(&self) -> Result<&SymbolMap> {
        memoize(&self.guids, || self.resolve_symbols(SymbolKind::Guid))
    }

    /// Resolved PCDs of every category.
    ///
    /// # Errors
    ///
    /// See [`pcd`] for the failure modes.
    pub fn pcds(&self) -> Result<&PcdMap> {
        memoize(&self.pcds, || self.resolve_pcds())
    }

    /// Token space GUIDs that PCD resolution looked up in the packages
    ///
    /// # Errors
    ///
    /// Returns the PCD resolution error, if any.
    pub fn guids_used_by_pcd(&self) -> Result<&IndexMap<String, Guid>> {
        self.pcds().map(|pcds| &pcds.guids_used)
    }

    /// Build options: legacy `[nmake]` flags first, then `[BuildOptions]`.
    ///
    /// # Errors
    ///
    /// This attribute does not fail; the `Result` keeps the accessor shape uniform.
    pub fn build_options(&self) -> Result<&BuildOptions> {
        memoize(&self.build_options, || Ok(self.resolve_build_options()))
    }

    /// Compiled dependency expressions.
    ///
    /// # Errors
    ///
    /// See [`depex`] for the failure modes.
    pub fn depex(&self) -> Result<&Depex> {
        memoize(&self.depex, || self.resolve_depex())
    }

    /// Dependency expressions as whitespace normalized text.
    ///
    /// # Errors
    ///
    /// This attribute does not fail; the `Result` keeps the accessor shape uniform.
    pub fn depex_expression(&self) -> Result<&DepexExpression> {
        memoize(&self.depex_expression, || Ok(self.resolve_depex_expression()))
    }

    /// Returns true if the module has binaries and no sources, or the workspace is a
    /// binary-only build.
    ///
    /// # Errors
    ///
    /// Returns the source or binary validation error, if any.
    pub fn is_binary_module(&self) -> Result<bool> {
        if self.ctx.config().ignore_source {
            return Ok(true);
        }
        Ok(!self.binaries()?.is_empty() && self.sources()?.is_empty())
    }

    /// Forces every lazily resolved attribute.
    ///
    /// # Errors
    ///
    /// Returns the first attribute resolution error.
    pub fn resolve_all(&self) -> Result<()> {
        self.library_classes()?;
        self.libraries()?;
        self.sources()?;
        self.binaries()?;
        self.includes()?;
        self.packages()?;
        self.protocols()?;
        self.ppis()?;
        self.guids()?;
        self.pcds()?;
        self.build_options()?;
        self.depex()?;
        self.depex_expression()?;
        Ok(())
    }

    /// Records of `kind` for this module's architecture and platform
    pub(crate) fn query(&self, kind: RecordKind) -> Vec<RecordRc> {
        self.records.query(
            &RecordQuery::new(kind)
                .arch(self.key.arch)
                .platform(self.ctx.config().platform.as_str()),
        )
    }

    /// Records of `kind` for this module's architecture, any secondary scope
    pub(crate) fn query_arch(&self, kind: RecordKind) -> Vec<RecordRc> {
        self.records
            .query(&RecordQuery::new(kind).arch(self.key.arch))
    }

    /// Comment lines attached to `record`
    pub(crate) fn comments_of(&self, record: &RecordRc) -> Vec<String> {
        self.records
            .query(&RecordQuery::new(RecordKind::Comment).owner(record.id))
            .iter()
            .map(|comment| comment.value(0).to_string())
            .collect()
    }

    /// Dependent packages as a comma separated list, for diagnostics
    pub(crate) fn package_list(&self) -> String {
        self.packages.get().map_or_else(String::new, |packages| {
            packages
                .iter()
                .map(|package| package.path.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        })
    }
}
