//! Integration tests for legacy module descriptions and declared file validation.
//!
//! These tests lay out a scratch workspace with `tempfile`, since source, binary and include
//! resolution check the filesystem.

use std::{fs, path::Path, sync::Arc};

use infscope::{prelude::*, ErrorKind};
use tempfile::TempDir;

const MODULE: &str = "LegacyPkg/Timer/Timer.inf";

fn key() -> ModuleKey {
    ModuleKey::new(MODULE, Arch::Ia32, "DEBUG", "VS2019")
}

// Helper function to create a legacy module header
fn legacy_header(records: &RecordTable, component_type: &str) {
    for (name, value) in [
        ("BASE_NAME", "Timer"),
        ("FILE_GUID", "f2765dec-6b41-11d5-8e71-00902707b35e"),
        ("COMPONENT_TYPE", component_type),
    ] {
        records.push(RecordBuilder::new(RecordKind::Header).values([name, value]));
    }
}

// Helper function to create a scratch workspace with the module directory
fn scratch() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("LegacyPkg/Timer")).unwrap();
    dir
}

fn touch(path: &Path) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, "").unwrap();
}

#[test]
fn test_legacy_driver() -> Result<()> {
    let dir = scratch();
    let root = dir.path();
    let override_dir = root.join("Override/Timer");
    touch(&root.join("LegacyPkg/Timer/Timer.c"));
    touch(&override_dir.join("TimerPatch.c"));
    fs::create_dir_all(root.join("Ecp/Foundation/Include")).unwrap();

    let records = RecordTable::new();
    legacy_header(&records, "BS_DRIVER");
    records.push(RecordBuilder::new(RecordKind::Nmake).values(["IMAGE_ENTRY_POINT", "TimerMain"]));
    records.push(RecordBuilder::new(RecordKind::Nmake).values(["C_STD_FLAGS", "/W4"]));
    records.push(RecordBuilder::new(RecordKind::SourceFile).values(["Timer.c", "", ""]));
    records.push(RecordBuilder::new(RecordKind::SourceFile).values(["TimerPatch.c", "", ""]));
    records.push(RecordBuilder::new(RecordKind::SourceFile).values(["Timer.h", "", ""]));
    records.push(RecordBuilder::new(RecordKind::LibraryInstance).value("EdkGuidLib.lib"));
    records.push(RecordBuilder::new(RecordKind::LibraryInstance).value("EdkGuidLib"));
    records.push(RecordBuilder::new(RecordKind::LibraryInstance).value("EfiDriverLib"));
    records.push(RecordBuilder::new(RecordKind::Include).value("$(EDK_SOURCE)/Foundation/Include"));
    records.push(RecordBuilder::new(RecordKind::BuildOption).values(["MSFT", "*_*_*_CC_FLAGS", "/Od"]));
    records.push(RecordBuilder::new(RecordKind::Depex).value("TRUE"));

    let config = ResolverConfig::new(root)
        .with_legacy_sources(root.join("Ecp"), root.join("Edk"), root.join("Efi"))
        .with_source_override(MODULE, &override_dir);
    let workspace = Workspace::builder(config).module(MODULE, records).build();
    let module = workspace.resolve(&key())?;

    assert!(module.is_legacy());
    assert_eq!(module.component_type(), "BS_DRIVER");
    assert_eq!(module.module_type(), ModuleKind::DxeDriver);
    assert_eq!(module.entry_points(), ["TimerMain"]);

    let sources = module.sources()?;
    assert_eq!(sources.len(), 2);
    assert_eq!(sources[1].file.path, override_dir.join("TimerPatch.c"));

    assert_eq!(module.libraries()?, ["EdkGuidLib", "EfiDriverLib"]);

    let includes = module.includes()?;
    assert_eq!(includes.len(), 2);
    assert!(includes[0].ends_with("Override/Timer"));
    assert!(includes[1].ends_with("Ecp/Foundation/Include"));

    let cc = module.build_options()?.get("MSFT", "*_*_*_CC_FLAGS").unwrap();
    assert!(cc.starts_with("/W4"));
    assert!(cc.ends_with("/Od"));

    assert_eq!(module.depex()?.len(), 1);
    Ok(())
}

#[test]
fn test_unknown_component_type_builds_as_user_defined() -> Result<()> {
    let records = RecordTable::new();
    legacy_header(&records, "TOOL_BINARY");
    let workspace = Workspace::builder(ResolverConfig::new("/ws"))
        .module(MODULE, records)
        .build();
    let module = workspace.resolve(&key())?;
    assert_eq!(module.module_type(), ModuleKind::UserDefined);
    assert!(module.depex()?.is_empty());
    Ok(())
}

#[test]
fn test_unknown_module_type_is_rejected() {
    let records = RecordTable::new();
    for (name, value) in [
        ("INF_VERSION", "0x00010005"),
        ("BASE_NAME", "Timer"),
        ("FILE_GUID", "f2765dec-6b41-11d5-8e71-00902707b35e"),
        ("MODULE_TYPE", "DXE_TIMER"),
    ] {
        records.push(RecordBuilder::new(RecordKind::Header).values([name, value]));
    }
    let workspace = Workspace::builder(ResolverConfig::new("/ws"))
        .module(MODULE, records)
        .build();
    let err = workspace.resolve(&key()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedValue);
}

#[test]
fn test_declared_files_are_validated() -> Result<()> {
    let dir = scratch();
    let records = RecordTable::new();
    legacy_header(&records, "BS_DRIVER");
    records.push(RecordBuilder::new(RecordKind::SourceFile).values(["Missing.c", "", ""]));
    records.push(RecordBuilder::new(RecordKind::BinaryFile).values(["PE32", "Timer.efi", ""]));
    records.push(RecordBuilder::new(RecordKind::Package).value("LegacyPkg/LegacyPkg.dsc"));
    records.push(RecordBuilder::new(RecordKind::Depex).value("TRUE"));

    let workspace = Workspace::builder(ResolverConfig::new(dir.path()))
        .module(MODULE, records)
        .build();
    let module = workspace.resolve(&key())?;

    for err in [
        module.sources().unwrap_err(),
        module.binaries().unwrap_err(),
        module.packages().unwrap_err(),
    ] {
        assert_eq!(err.kind(), ErrorKind::FileValidation, "{err}");
    }
    assert!(module.resolve_all().is_err());
    Ok(())
}

#[test]
fn test_unregistered_package() -> Result<()> {
    let records = Arc::new(RecordTable::new());
    legacy_header(&records, "LIBRARY");
    records.push(RecordBuilder::new(RecordKind::Package).value("LegacyPkg/LegacyPkg.dec"));
    records.push(RecordBuilder::new(RecordKind::Package).value("LegacyPkg/LegacyPkg.dec"));

    let workspace = Workspace::builder(ResolverConfig::new("/ws"))
        .module_store(MODULE, records.clone())
        .build();
    let err = workspace.resolve(&key())?.packages().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FileValidation);
    assert!(err.to_string().contains("LegacyPkg/LegacyPkg.dec"));

    let workspace = Workspace::builder(ResolverConfig::new("/ws"))
        .package(PackageBuilder::new("LegacyPkg/LegacyPkg.dec").build())
        .module_store(MODULE, records)
        .build();
    assert_eq!(workspace.resolve(&key())?.packages()?.len(), 1);
    Ok(())
}
