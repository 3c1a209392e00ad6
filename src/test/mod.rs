//! Shared fixtures for the unit tests.
//!
//! [`ModuleFixture`] assembles a one-module workspace: a record table for the module under
//! test, the packages it depends on, and optionally a scratch directory that acts as the
//! workspace root for tests that touch the filesystem.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use tempfile::TempDir;
use uguid::{guid, Guid};

use crate::{
    metadata::{
        arch::Arch,
        package::{Package, PackageBuilder},
        pcd::{DatumType, PcdDeclaration, PcdType},
        records::{RecordBuilder, RecordId, RecordKind, RecordStore, RecordTable},
    },
    module::ResolvedModule,
    workspace::{ModuleKey, ResolverConfig, Workspace},
    Result,
};

/// Workspace relative path of the module under test
pub const MODULE_PATH: &str = "TestPkg/Driver/Driver.inf";

/// Workspace relative path of the default test package
pub const PKG_PATH: &str = "TestPkg/TestPkg.dec";

/// Token space every [`pcd_package`] declaration lives in
pub const TOKEN_SPACE: &str = "gTestTokenSpaceGuid";

/// Value of [`TOKEN_SPACE`]
pub const TOKEN_SPACE_GUID: Guid = guid!("5e0e9358-46b6-4ae2-8218-4ab8b9bbdcec");

// Helper function to create a package declaring PCDs in TOKEN_SPACE
pub fn pcd_package(pcds: &[(&str, PcdType, &str, DatumType, &str)]) -> Package {
    let mut builder = PackageBuilder::new(PKG_PATH).guid(TOKEN_SPACE, TOKEN_SPACE_GUID);
    for (name, pcd_type, token, datum_type, default) in pcds {
        builder = builder.pcd(PcdDeclaration::new(
            *name,
            TOKEN_SPACE,
            *pcd_type,
            *token,
            datum_type.clone(),
            *default,
        ));
    }
    builder.build()
}

// Helper function to create the header records of a modern module
pub fn modern_module(base_name: &str, guid: &str, module_type: &str) -> RecordTable {
    let table = RecordTable::new();
    for (line, (name, value)) in [
        ("INF_VERSION", "0x00010005"),
        ("BASE_NAME", base_name),
        ("FILE_GUID", guid),
        ("MODULE_TYPE", module_type),
    ]
    .into_iter()
    .enumerate()
    {
        table.push(
            RecordBuilder::new(RecordKind::Header)
                .values([name, value])
                .line(line as u32 + 1),
        );
    }
    table
}

/// A workspace around one module under test.
pub struct ModuleFixture {
    records: Arc<RecordTable>,
    packages: Vec<Package>,
    others: Vec<(String, Arc<RecordTable>)>,
    mixed: Vec<(String, String, PcdType)>,
    config: ResolverConfig,
    dir: Option<TempDir>,
}

impl ModuleFixture {
    /// Modern module of `module_type`, workspace root that does not exist
    pub fn new(module_type: &str) -> Self {
        Self::with_records(
            modern_module("Driver", "7a7f7c4e-5ac4-4a8a-a3b0-2f1c0e4b6d10", module_type),
            None,
        )
    }

    /// Modern `DXE_DRIVER`
    pub fn dxe_driver() -> Self {
        Self::new("DXE_DRIVER")
    }

    /// Legacy module of `component_type`
    pub fn legacy(component_type: &str) -> Self {
        Self::with_records(legacy_module(component_type), None)
    }

    /// Modern module whose directory exists in a scratch workspace
    pub fn on_disk(module_type: &str) -> Self {
        Self::with_records(
            modern_module("Driver", "7a7f7c4e-5ac4-4a8a-a3b0-2f1c0e4b6d10", module_type),
            Some(scratch()),
        )
    }

    /// Legacy module whose directory exists in a scratch workspace
    pub fn legacy_on_disk(component_type: &str) -> Self {
        Self::with_records(legacy_module(component_type), Some(scratch()))
    }

    fn with_records(records: RecordTable, dir: Option<TempDir>) -> Self {
        let root = dir
            .as_ref()
            .map_or_else(|| std::env::temp_dir().join("infscope-absent"), |d| d.path().to_path_buf());
        if dir.is_some() {
            fs::create_dir_all(root.join("TestPkg/Driver")).unwrap();
        }
        ModuleFixture {
            records: Arc::new(records),
            packages: Vec::new(),
            others: Vec::new(),
            mixed: Vec::new(),
            config: ResolverConfig::new(root),
            dir,
        }
    }

    /// Workspace root
    pub fn workspace_dir(&self) -> &Path {
        &self.config.workspace
    }

    /// Directory of the module under test
    pub fn module_dir(&self) -> PathBuf {
        self.config.workspace.join("TestPkg/Driver")
    }

    /// Creates an empty file in the module directory
    pub fn touch(&self, name: &str) {
        assert!(self.dir.is_some(), "touch needs an on-disk fixture");
        fs::write(self.module_dir().join(name), "").unwrap();
    }

    /// Adds a `[Defines]` entry
    pub fn define(&self, name: &str, value: &str) {
        self.push(RecordBuilder::new(RecordKind::Header).values([name, value]));
    }

    /// Adds a `COMMON` record of `kind`
    pub fn record<I, S>(&self, kind: RecordKind, values: I) -> RecordId
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push(RecordBuilder::new(kind).values(values).arch(Arch::Common))
    }

    /// Adds an arbitrary record; line numbers count up from 100
    pub fn push(&self, builder: RecordBuilder) -> RecordId {
        let line = 100 + self.records.len() as u32;
        self.records.push(builder.line(line))
    }

    /// Attaches a comment to `owner`
    pub fn comment(&self, owner: RecordId, text: &str) {
        self.records.push(RecordBuilder::comment(owner, text));
    }

    /// Registers `package` and lists it in the module's `[Packages]`
    pub fn package(mut self, package: Package) -> Self {
        self.record(RecordKind::Package, [package.path.clone()]);
        self.packages.push(package);
        self
    }

    /// Replaces the configuration; an on-disk fixture keeps its scratch directory alive
    pub fn config(mut self, config: ResolverConfig) -> Self {
        self.config = config;
        self
    }

    /// Registers a source override directory for the module under test
    pub fn with_override(mut self, dir: &Path) -> Self {
        self.config = self.config.clone().with_source_override(MODULE_PATH, dir);
        self
    }

    /// Declares a split PCD
    pub fn mixed_pcd(mut self, name: &str, token_space: &str, pcd_type: PcdType) -> Self {
        self.mixed
            .push((name.to_string(), token_space.to_string(), pcd_type));
        self
    }

    /// Registers another modern module with the given `FILE_GUID`
    pub fn other_module(mut self, path: &str, guid: &str) -> Self {
        self.others
            .push((path.to_string(), Arc::new(modern_module("Other", guid, "BASE"))));
        self
    }

    /// Key of the module under test, X64
    pub fn key(&self) -> ModuleKey {
        ModuleKey::new(MODULE_PATH, Arch::X64, "DEBUG", "GCC5")
    }

    /// Builds a workspace from the fixture
    pub fn workspace(&self) -> Workspace {
        let mut builder = Workspace::builder(self.config.clone())
            .module_store(MODULE_PATH, self.records.clone() as Arc<dyn RecordStore>);
        for package in &self.packages {
            builder = builder.package(package.clone());
        }
        for (path, records) in &self.others {
            builder = builder.module_store(path, records.clone() as Arc<dyn RecordStore>);
        }
        for (name, token_space, pcd_type) in &self.mixed {
            builder = builder.mixed_pcd(name, token_space, *pcd_type);
        }
        builder.build()
    }

    /// Resolves the module under test in a fresh workspace
    pub fn resolve(&self) -> Result<Arc<ResolvedModule>> {
        self.workspace().resolve(&self.key())
    }
}

fn legacy_module(component_type: &str) -> RecordTable {
    let table = RecordTable::new();
    table.push(
        RecordBuilder::new(RecordKind::Header)
            .values(["BASE_NAME", "Driver"])
            .line(1),
    );
    table.push(
        RecordBuilder::new(RecordKind::Header)
            .values(["FILE_GUID", "0c2c4003-4d8f-4d25-b9d8-6a3e0a5c2f11"])
            .line(2),
    );
    table.push(
        RecordBuilder::new(RecordKind::Header)
            .values(["COMPONENT_TYPE", component_type])
            .line(3),
    );
    table
}

fn scratch() -> TempDir {
    tempfile::tempdir().unwrap()
}
