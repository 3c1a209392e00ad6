//! Resolver configuration
//!
//! Settings that are global to a build rather than to one module: where the workspace lives,
//! whether sources are ignored (binary-only builds), the source roots and global macros that
//! legacy modules expect, and per-module source override directories.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use crate::metadata::{expand::MacroTable, path::normalize_path, records::SCOPE_COMMON};

/// Configuration shared by every module resolved in a [`super::Workspace`].
///
/// # Examples
///
/// ```rust
/// use infscope::workspace::ResolverConfig;
///
/// let config = ResolverConfig::new("/work/edk2")
///     .with_platform("OvmfPkgX64")
///     .with_source_override("MdeModulePkg/Core/Dxe/DxeMain.inf", "/work/overrides/DxeMain");
/// assert!(!config.ignore_source);
/// assert_eq!(config.platform, "OvmfPkgX64");
///
/// let binary = ResolverConfig::binary_only("/work/edk2");
/// assert!(binary.ignore_source);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverConfig {
    /// Workspace root; package paths are relative to it
    pub workspace: PathBuf,
    /// Binary-only build: sources are neither listed nor validated
    pub ignore_source: bool,
    /// Legacy compatibility package root, the value of `EDK_SOURCE` for legacy modules
    pub ecp_source: PathBuf,
    /// Alternative `EDK_SOURCE` root tried for legacy include paths
    pub edk_source: PathBuf,
    /// `EFI_SOURCE` root for legacy include paths
    pub efi_source: PathBuf,
    /// `EDK_GLOBAL` macros, visible to legacy modules only
    pub edk_global: MacroTable,
    /// Global defines, visible to legacy modules only
    pub global_defines: MacroTable,
    /// Source override directories keyed by workspace relative module path
    pub source_overrides: HashMap<String, PathBuf>,
    /// Platform scope records are filtered by
    pub platform: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self::new(".")
    }
}

impl ResolverConfig {
    /// Creates a source build configuration rooted at `workspace`.
    ///
    /// The legacy source roots default to `<workspace>/EdkCompatibilityPkg`.
    #[must_use]
    pub fn new(workspace: impl AsRef<Path>) -> Self {
        let workspace = workspace.as_ref().to_path_buf();
        let ecp = workspace.join("EdkCompatibilityPkg");
        ResolverConfig {
            ignore_source: false,
            ecp_source: ecp.clone(),
            edk_source: ecp.clone(),
            efi_source: ecp,
            edk_global: MacroTable::new(),
            global_defines: MacroTable::new(),
            source_overrides: HashMap::new(),
            platform: SCOPE_COMMON.to_string(),
            workspace,
        }
    }

    /// Creates a binary-only configuration rooted at `workspace`.
    ///
    /// Every module is treated as a binary module: sources are skipped and each module must
    /// list at least one binary.
    #[must_use]
    pub fn binary_only(workspace: impl AsRef<Path>) -> Self {
        ResolverConfig {
            ignore_source: true,
            ..Self::new(workspace)
        }
    }

    /// Sets the platform scope
    #[must_use]
    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = platform.into();
        self
    }

    /// Sets the legacy source roots
    #[must_use]
    pub fn with_legacy_sources(
        mut self,
        ecp_source: impl Into<PathBuf>,
        edk_source: impl Into<PathBuf>,
        efi_source: impl Into<PathBuf>,
    ) -> Self {
        self.ecp_source = ecp_source.into();
        self.edk_source = edk_source.into();
        self.efi_source = efi_source.into();
        self
    }

    /// Adds an `EDK_GLOBAL` macro
    #[must_use]
    pub fn with_edk_global(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.edk_global.insert(name.into(), value.into());
        self
    }

    /// Adds a global define
    #[must_use]
    pub fn with_global_define(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.global_defines.insert(name.into(), value.into());
        self
    }

    /// Registers a source override directory for one module
    #[must_use]
    pub fn with_source_override(mut self, module: &str, dir: impl Into<PathBuf>) -> Self {
        self.source_overrides
            .insert(normalize_path(module), dir.into());
        self
    }

    /// Override directory registered for `module`, if any
    #[must_use]
    pub fn source_override(&self, module: &str) -> Option<&Path> {
        self.source_overrides
            .get(&normalize_path(module))
            .map(PathBuf::as_path)
    }
}
