//! Sources, binaries, include paths, libraries, package dependencies and build options.
//!
//! File references are macro expanded with the module's macro table and validated against
//! the filesystem. Sources of modern modules must live in the module directory; legacy
//! modules may also find them in their source override directory.

use std::path::{Path, PathBuf};

use indexmap::{IndexMap, IndexSet};

use crate::{
    metadata::{
        expand::{MacroTable, UndefinedMacro},
        package::PackageRc,
        path::{extension_of, locate, normalize_path, real_dir, FileRef, PathError},
        records::{RecordKind, SCOPE_COMMON},
    },
    module::{options::BuildOptions, ResolvedModule},
    utils::split_value_list,
    Location, Result,
};

/// A validated `[Sources]` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Declared and located file
    pub file: FileRef,
    /// Toolchain family the file is restricted to, empty for any
    pub tool_chain_family: String,
    /// Free-form tag, empty when absent
    pub tag: String,
}

/// A validated `[Binaries]` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryFile {
    /// Declared and located file
    pub file: FileRef,
    /// Binary file type (`PE32`, `DXE_DEPEX`, `UI`, ...)
    pub file_type: String,
    /// Build target the binary applies to, `COMMON` when not restricted
    pub target: String,
    /// Feature flag expressions following the target
    pub feature_flags: Vec<String>,
}

impl ResolvedModule {
    pub(crate) fn resolve_sources(&self) -> Result<Vec<SourceFile>> {
        if self.context().config().ignore_source {
            return Ok(Vec::new());
        }

        let mut search: Vec<&Path> = vec![self.module_dir()];
        if self.is_legacy() {
            if let Some(dir) = self.override_dir() {
                search.push(dir);
            }
        }

        let mut sources = Vec::new();
        for record in self.query(RecordKind::SourceFile) {
            let declared = self.expand_path(record.value(0), &self.header().macros);
            match locate(&declared, &search, None) {
                Ok(file) => sources.push(SourceFile {
                    file,
                    tool_chain_family: record.value(1).to_string(),
                    tag: record.value(2).to_string(),
                }),
                Err(PathError::NotFound { file, .. }) if extension_of(&file) == ".h" => {
                    log::warn!(
                        "{}({}): header file {} does not exist, skipped",
                        self.key().path,
                        record.line,
                        file
                    );
                }
                Err(err) => {
                    return Err(resolve_error!(
                        FileValidation,
                        Location::new(&self.key().path, record.line),
                        "{}",
                        err
                    ))
                }
            }
        }

        sources.extend(self.header().dependency_files.iter().map(|file| SourceFile {
            file: file.clone(),
            tool_chain_family: String::new(),
            tag: String::new(),
        }));
        log::debug!("{}: {} sources", self.key(), sources.len());
        Ok(sources)
    }

    pub(crate) fn resolve_binaries(&self) -> Result<Vec<BinaryFile>> {
        let macros = self.legacy_macros();
        let mut binaries = Vec::new();
        for record in self.query(RecordKind::BinaryFile) {
            let mut settings = split_value_list(record.value(2), '|').into_iter();
            let target = settings
                .next()
                .filter(|target| !target.is_empty())
                .unwrap_or_else(|| SCOPE_COMMON.to_string());
            let feature_flags = settings.filter(|flag| !flag.is_empty()).collect();

            let declared = self.expand_path(record.value(1), &macros);
            let file = locate(&declared, &[self.module_dir()], None).map_err(|err| {
                resolve_error!(
                    FileValidation,
                    Location::new(&self.key().path, record.line),
                    "{}",
                    err
                )
            })?;
            binaries.push(BinaryFile {
                file,
                file_type: record.value(0).to_string(),
                target,
                feature_flags,
            });
        }

        if binaries.is_empty() && self.context().config().ignore_source {
            return Err(resolve_error!(
                MissingRequiredField,
                Location::file(&self.key().path),
                "No binary files found while building in binary-only mode"
            ));
        }
        log::debug!("{}: {} binaries", self.key(), binaries.len());
        Ok(binaries)
    }

    pub(crate) fn resolve_includes(&self) -> Vec<PathBuf> {
        let mut includes = Vec::new();
        if !self.is_legacy() {
            return includes;
        }

        let config = self.context().config();
        if let Some(dir) = self.override_dir().and_then(real_dir) {
            includes.push(dir);
        }

        let mut macros = self.legacy_macros();
        macros
            .entry("EFI_SOURCE".to_string())
            .or_insert_with(|| config.efi_source.display().to_string());

        for record in self.query(RecordKind::Include) {
            let declared = record.value(0);
            if declared.contains("EDK_SOURCE") {
                // legacy trees put EDK_SOURCE includes in either root
                for root in [&config.ecp_source, &config.edk_source] {
                    macros.insert("EDK_SOURCE".to_string(), root.display().to_string());
                    if let Some(dir) = self.include_dir(declared, &macros) {
                        includes.push(dir);
                    }
                }
                macros.insert(
                    "EDK_SOURCE".to_string(),
                    config.ecp_source.display().to_string(),
                );
                continue;
            }

            match self.include_dir(declared, &macros) {
                Some(dir) => includes.push(dir),
                None if declared.contains("EFI_SOURCE") => {
                    let mut fallback = macros.clone();
                    fallback.insert(
                        "EFI_SOURCE".to_string(),
                        config.workspace.display().to_string(),
                    );
                    if let Some(dir) = self.include_dir(declared, &fallback) {
                        includes.push(dir);
                    }
                }
                None => {}
            }
        }
        includes
    }

    fn include_dir(&self, declared: &str, macros: &MacroTable) -> Option<PathBuf> {
        let raw = self
            .context()
            .macros()
            .expand(declared, macros, UndefinedMacro::Keep);
        let expanded = normalize_path(&raw);
        let path = Path::new(&expanded);
        let dir = if path.is_absolute() {
            path.to_path_buf()
        } else if raw.trim_start().starts_with('.') {
            self.module_dir().join(path)
        } else {
            self.context().config().workspace.join(path)
        };
        real_dir(&dir)
    }

    pub(crate) fn resolve_libraries(&self) -> Vec<String> {
        let macros = &self.header().macros;
        let mut libraries = IndexSet::new();
        for record in self.query(RecordKind::LibraryInstance) {
            let name = self
                .context()
                .macros()
                .expand(record.value(0), macros, UndefinedMacro::Keep);
            let stem = match name.rfind('.') {
                Some(dot) if !name[dot..].contains(['/', '\\']) => name[..dot].to_string(),
                _ => name,
            };
            libraries.insert(stem);
        }
        libraries.into_iter().collect()
    }

    pub(crate) fn resolve_library_classes(&self) -> IndexMap<String, Option<String>> {
        let macros = &self.header().macros;
        let mut classes = IndexMap::new();
        for record in self.query(RecordKind::LibraryClass) {
            let instance = record.value(1);
            let instance = (!instance.is_empty()).then(|| self.expand_path(instance, macros));
            classes.insert(record.value(0).to_string(), instance);
        }
        classes
    }

    pub(crate) fn resolve_packages(&self) -> Result<Vec<PackageRc>> {
        let macros = self.legacy_macros();
        let mut packages: Vec<PackageRc> = Vec::new();
        for record in self.query(RecordKind::Package) {
            let at = Location::new(&self.key().path, record.line);
            let path = self.expand_path(record.value(0), &macros);
            if extension_of(&path) != ".dec" {
                return Err(resolve_error!(
                    FileValidation,
                    at,
                    "{}",
                    PathError::Extension {
                        file: path,
                        expected: ".dec".to_string(),
                    }
                ));
            }
            let package = self.context().package(&path).ok_or_else(|| {
                resolve_error!(
                    FileValidation,
                    at,
                    "package {} is not part of the workspace",
                    path
                )
            })?;
            if packages.iter().all(|known| known.path != package.path) {
                log::debug!("{}: depends on {}", self.key(), package.path);
                packages.push(package);
            }
        }
        Ok(packages)
    }

    pub(crate) fn resolve_build_options(&self) -> BuildOptions {
        let mut options = self.header().nmake_options.clone();
        for record in self.query(RecordKind::BuildOption) {
            options.add(record.value(0), record.value(1), record.value(2));
        }
        options
    }

    /// Macro table plus the legacy `EDK_SOURCE` and `PROCESSOR` macros
    fn legacy_macros(&self) -> MacroTable {
        let mut macros = self.header().macros.clone();
        let config = self.context().config();
        macros
            .entry("EDK_SOURCE".to_string())
            .or_insert_with(|| config.ecp_source.display().to_string());
        macros
            .entry("PROCESSOR".to_string())
            .or_insert_with(|| self.key().arch.to_string());
        macros
    }

    fn expand_path(&self, text: &str, macros: &MacroTable) -> String {
        normalize_path(
            &self
                .context()
                .macros()
                .expand(text, macros, UndefinedMacro::Keep),
        )
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use crate::{
        metadata::{package::PackageBuilder, records::RecordKind},
        test::{ModuleFixture, PKG_PATH},
        workspace::ResolverConfig,
        ErrorKind,
    };

    #[test]
    fn sources_and_dependency_files() {
        let fixture = ModuleFixture::on_disk("DXE_DRIVER");
        fixture.touch("Driver.c");
        fixture.touch("Driver.dxs");
        fixture.define("DPX_SOURCE", "Driver.dxs");
        fixture.record(RecordKind::SourceFile, ["Driver.c", "", ""]);
        fixture.record(RecordKind::SourceFile, ["Missing.h", "", ""]);

        let module = fixture.resolve().unwrap();
        let sources = module.sources().unwrap();
        let names: Vec<_> = sources.iter().map(|s| s.file.declared.as_str()).collect();
        assert_eq!(names, vec!["Driver.c", "Driver.dxs"]);
    }

    #[test]
    fn missing_source_fails() {
        let fixture = ModuleFixture::on_disk("DXE_DRIVER");
        fixture.record(RecordKind::SourceFile, ["Missing.c", "", ""]);
        let err = fixture.resolve().unwrap().sources().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FileValidation);
        assert!(err.location().and_then(|l| l.line).is_some());
    }

    #[test]
    fn binaries_parse_settings() {
        let fixture = ModuleFixture::on_disk("DXE_DRIVER");
        fixture.touch("Driver.efi");
        fixture.touch("Driver.depex");
        fixture.record(RecordKind::BinaryFile, ["PE32", "Driver.efi", "RELEASE|FLAG_A|FLAG_B"]);
        fixture.record(RecordKind::BinaryFile, ["DXE_DEPEX", "Driver.depex", ""]);

        let module = fixture.resolve().unwrap();
        let binaries = module.binaries().unwrap();
        assert_eq!(binaries[0].target, "RELEASE");
        assert_eq!(binaries[0].feature_flags, vec!["FLAG_A", "FLAG_B"]);
        assert_eq!(binaries[1].target, "COMMON");
        assert!(binaries[1].feature_flags.is_empty());
        assert!(module.is_binary_module().unwrap());
    }

    #[test]
    fn binary_only_build_needs_binaries() {
        let fixture = ModuleFixture::dxe_driver().config(ResolverConfig::binary_only("/ws"));
        fixture.record(RecordKind::SourceFile, ["NotChecked.c", "", ""]);
        let module = fixture.resolve().unwrap();
        assert!(module.sources().unwrap().is_empty());
        assert!(module.is_binary_module().unwrap());
        assert_eq!(
            module.binaries().unwrap_err().kind(),
            ErrorKind::MissingRequiredField
        );
    }

    #[test]
    fn libraries_strip_extension() {
        let fixture = ModuleFixture::legacy("LIBRARY");
        fixture.record(RecordKind::LibraryInstance, ["EdkLib.lib"]);
        fixture.record(RecordKind::LibraryInstance, ["EdkLib"]);
        fixture.record(RecordKind::LibraryInstance, ["Other"]);
        let module = fixture.resolve().unwrap();
        assert_eq!(module.libraries().unwrap(), ["EdkLib".to_string(), "Other".to_string()]);
    }

    #[test]
    fn library_classes_keep_optional_instance() {
        let fixture = ModuleFixture::dxe_driver();
        fixture.record(RecordKind::LibraryClass, ["DebugLib", ""]);
        fixture.record(RecordKind::LibraryClass, ["PrintLib", "MdePkg\\Library\\BasePrintLib\\BasePrintLib.inf"]);
        let module = fixture.resolve().unwrap();
        let classes = module.library_classes().unwrap();
        assert_eq!(classes["DebugLib"], None);
        assert_eq!(
            classes["PrintLib"].as_deref(),
            Some("MdePkg/Library/BasePrintLib/BasePrintLib.inf")
        );
    }

    #[test]
    fn package_references() {
        let fixture = ModuleFixture::dxe_driver().package(PackageBuilder::new(PKG_PATH).build());
        fixture.record(RecordKind::Package, [PKG_PATH]);
        let module = fixture.resolve().unwrap();
        assert_eq!(module.packages().unwrap().len(), 1);

        let fixture = ModuleFixture::dxe_driver();
        fixture.record(RecordKind::Package, ["TestPkg/TestPkg.txt"]);
        let err = fixture.resolve().unwrap().packages().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FileValidation);

        let fixture = ModuleFixture::dxe_driver();
        fixture.record(RecordKind::Package, ["GhostPkg/GhostPkg.dec"]);
        let err = fixture.resolve().unwrap().packages().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FileValidation);
    }

    #[test]
    fn build_options_follow_nmake_flags() {
        let fixture = ModuleFixture::legacy("BS_DRIVER");
        fixture.record(RecordKind::Nmake, ["C_FLAGS", "/O1"]);
        fixture.record(RecordKind::BuildOption, ["MSFT", "*_*_*_CC_FLAGS", "/W3"]);
        fixture.record(RecordKind::BuildOption, ["GCC", "*_*_*_CC_FLAGS", "-Os"]);
        let module = fixture.resolve().unwrap();
        let options = module.build_options().unwrap();
        assert_eq!(options.get("MSFT", "*_*_*_CC_FLAGS"), Some("/O1 /W3"));
        assert_eq!(options.get("GCC", "*_*_*_CC_FLAGS"), Some("-Os"));
    }

    #[test]
    fn legacy_sources_fall_back_to_override_dir() {
        let fixture = ModuleFixture::legacy_on_disk("BS_DRIVER");
        let override_dir = fixture.workspace_dir().join("Override");
        fs::create_dir_all(&override_dir).unwrap();
        fs::write(override_dir.join("Patched.c"), "").unwrap();
        let fixture = fixture.with_override(&override_dir);
        fixture.record(RecordKind::SourceFile, ["Patched.c", "", ""]);

        let module = fixture.resolve().unwrap();
        let sources = module.sources().unwrap();
        assert_eq!(sources[0].file.path, override_dir.join("Patched.c"));
    }

    #[test]
    fn legacy_includes() {
        let fixture = ModuleFixture::legacy_on_disk("BS_DRIVER");
        let root = fixture.workspace_dir().to_path_buf();
        fs::create_dir_all(root.join("EdkCompatibilityPkg/Foundation/Include")).unwrap();
        fs::create_dir_all(root.join("Edk/Foundation/Include")).unwrap();
        fs::create_dir_all(root.join("Local")).unwrap();
        let config = ResolverConfig::new(&root).with_legacy_sources(
            root.join("EdkCompatibilityPkg"),
            root.join("Edk"),
            root.join("NoEfi"),
        );
        let fixture = fixture.config(config);
        fixture.record(RecordKind::Include, ["$(EDK_SOURCE)/Foundation/Include"]);
        fixture.record(RecordKind::Include, ["$(EFI_SOURCE)/Local"]);
        fixture.record(RecordKind::Include, ["Nowhere"]);

        let module = fixture.resolve().unwrap();
        let includes = module.includes().unwrap();
        assert_eq!(includes.len(), 3);
        assert!(includes[0].ends_with("EdkCompatibilityPkg/Foundation/Include"));
        assert!(includes[1].ends_with("Edk/Foundation/Include"));
        assert!(includes[2].ends_with("Local"));
    }

    #[test]
    fn modern_modules_have_no_includes() {
        let fixture = ModuleFixture::dxe_driver();
        fixture.record(RecordKind::Include, ["Include"]);
        assert!(fixture.resolve().unwrap().includes().unwrap().is_empty());
    }
}
