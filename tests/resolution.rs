//! Integration tests for module resolution through the public API.
//!
//! Each test assembles a small workspace in memory: a module record table, the packages it
//! depends on, and a scratch directory where files need to exist on disk.

use std::{
    fs,
    path::Path,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use infscope::{
    metadata::records::RecordRc,
    module::pcd::PcdMap,
    prelude::*,
    ErrorKind,
};
use uguid::{guid, Guid};

const MODULE: &str = "SamplePkg/Driver/Driver.inf";
const PACKAGE: &str = "SamplePkg/SamplePkg.dec";
const SPACE: &str = "gSampleTokenSpaceGuid";
const SPACE_GUID: Guid = guid!("0e1a2b3c-4d5e-6f70-8192-a3b4c5d6e7f8");

fn header(records: &RecordTable, module_type: &str) {
    for (name, value) in [
        ("INF_VERSION", "0x00010005"),
        ("BASE_NAME", "Driver"),
        ("FILE_GUID", "3c1f8a0e-6b1e-4d7a-9f0e-2a5b7c9d1e3f"),
        ("MODULE_TYPE", module_type),
    ] {
        records.push(RecordBuilder::new(RecordKind::Header).values([name, value]));
    }
}

fn key() -> ModuleKey {
    ModuleKey::new(MODULE, Arch::X64, "DEBUG", "GCC5")
}

fn pcd_decl(name: &str, pcd_type: PcdType, token: &str, default: &str) -> PcdDeclaration {
    PcdDeclaration::new(name, SPACE, pcd_type, token, DatumType::Uint32, default)
}

/// Record store that counts how often it is queried
struct CountingStore {
    inner: RecordTable,
    queries: AtomicUsize,
}

impl RecordStore for CountingStore {
    fn query(&self, query: &RecordQuery) -> Vec<RecordRc> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.inner.query(query)
    }
}

/// The reference scenario: a DXE driver with one source and one fixed PCD taking the
/// package default.
fn end_to_end_workspace(root: &Path) -> Workspace {
    let records = RecordTable::new();
    header(&records, "DXE_DRIVER");
    records.push(RecordBuilder::new(RecordKind::SourceFile).values(["Driver.c", "", ""]));
    records.push(RecordBuilder::new(RecordKind::Package).value(PACKAGE));
    records.push(RecordBuilder::new(RecordKind::PcdFixedAtBuild).values([SPACE, "Pcd1", ""]));
    records.push(RecordBuilder::new(RecordKind::Depex).value("TRUE"));

    let package = PackageBuilder::new(PACKAGE)
        .guid(SPACE, SPACE_GUID)
        .pcd(pcd_decl("Pcd1", PcdType::FixedAtBuild, "0x00000001", "5"))
        .build();

    Workspace::builder(ResolverConfig::new(root))
        .package(package)
        .module(MODULE, records)
        .build()
}

fn scratch_module() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("SamplePkg/Driver")).unwrap();
    fs::write(dir.path().join("SamplePkg/Driver/Driver.c"), "").unwrap();
    dir
}

#[test]
fn test_end_to_end_fixed_pcd() -> Result<()> {
    let dir = scratch_module();
    let workspace = end_to_end_workspace(dir.path());
    let module = workspace.resolve(&key())?;

    assert_eq!(module.module_type(), ModuleKind::DxeDriver);
    assert_eq!(module.sources()?.len(), 1);
    assert!(!module.is_binary_module()?);

    let pcd = module.pcds()?.get("Pcd1", SPACE).cloned().unwrap();
    assert_eq!(pcd.pcd_type, PcdType::FixedAtBuild);
    assert_eq!(pcd.token_value.value(), 1);
    assert_eq!(pcd.default_value, "5");
    assert_eq!(pcd.token_space_guid_value, SPACE_GUID);
    assert_eq!(module.guids_used_by_pcd()?.get(SPACE), Some(&SPACE_GUID));

    module.resolve_all()?;
    Ok(())
}

#[test]
fn test_resolution_is_deterministic() -> Result<()> {
    let dir = scratch_module();
    let first = end_to_end_workspace(dir.path()).resolve(&key())?;
    let second = end_to_end_workspace(dir.path()).resolve(&key())?;
    first.resolve_all()?;
    second.resolve_all()?;

    assert_eq!(first.header(), second.header());
    assert_eq!(first.pcds()?, second.pcds()?);
    assert_eq!(first.sources()?, second.sources()?);
    assert_eq!(first.depex()?, second.depex()?);
    Ok(())
}

#[test]
fn test_attributes_are_memoized() -> Result<()> {
    let inner = RecordTable::new();
    header(&inner, "UEFI_DRIVER");
    inner.push(RecordBuilder::new(RecordKind::Package).value(PACKAGE));
    inner.push(RecordBuilder::new(RecordKind::Protocol).value("gSampleProtocolGuid"));
    inner.push(RecordBuilder::new(RecordKind::PcdFixedAtBuild).values([SPACE, "Pcd1", "7"]));
    let store = Arc::new(CountingStore {
        inner,
        queries: AtomicUsize::new(0),
    });

    let package = PackageBuilder::new(PACKAGE)
        .guid(SPACE, SPACE_GUID)
        .protocol("gSampleProtocolGuid", guid!("00000000-0000-0000-0000-0000000000f1"))
        .pcd(pcd_decl("Pcd1", PcdType::FixedAtBuild, "1", "5"))
        .build();
    let workspace = Workspace::builder(ResolverConfig::new("/ws"))
        .package(package)
        .module_store(MODULE, store.clone())
        .build();
    let module = workspace.resolve(&key())?;

    let protocols: *const SymbolMap = module.protocols()?;
    let pcds: *const PcdMap = module.pcds()?;
    module.packages()?;
    module.guids()?;
    let scans = store.queries.load(Ordering::SeqCst);

    assert!(std::ptr::eq(protocols, module.protocols()?));
    assert!(std::ptr::eq(pcds, module.pcds()?));
    module.packages()?;
    module.guids()?;
    assert_eq!(store.queries.load(Ordering::SeqCst), scans);

    assert!(Arc::ptr_eq(&module, &workspace.resolve(&key())?));
    Ok(())
}

#[test]
fn test_dynamic_pcd_takes_priority_class() -> Result<()> {
    let records = RecordTable::new();
    header(&records, "UEFI_DRIVER");
    records.push(RecordBuilder::new(RecordKind::Package).value(PACKAGE));
    records.push(RecordBuilder::new(RecordKind::PcdDynamic).values([SPACE, "PcdMode", ""]));

    // declaration order in the package is not the priority order
    let package = PackageBuilder::new(PACKAGE)
        .guid(SPACE, SPACE_GUID)
        .pcd(pcd_decl("PcdMode", PcdType::DynamicEx, "3", "2"))
        .pcd(pcd_decl("PcdMode", PcdType::PatchableInModule, "3", "1"))
        .build();
    let workspace = Workspace::builder(ResolverConfig::new("/ws"))
        .package(package)
        .module(MODULE, records)
        .build();

    let module = workspace.resolve(&key())?;
    let pcd = module.pcds()?.get("PcdMode", SPACE).cloned().unwrap();
    assert_eq!(pcd.pcd_type, PcdType::PatchableInModule);
    assert!(pcd.pending);
    Ok(())
}

#[test]
fn test_dynamic_pcd_stops_at_first_declaring_package() -> Result<()> {
    let records = RecordTable::new();
    header(&records, "UEFI_DRIVER");
    records.push(RecordBuilder::new(RecordKind::Package).value("FirstPkg/FirstPkg.dec"));
    records.push(RecordBuilder::new(RecordKind::Package).value("SecondPkg/SecondPkg.dec"));
    records.push(RecordBuilder::new(RecordKind::PcdDynamic).values([SPACE, "PcdMode", ""]));

    let first = PackageBuilder::new("FirstPkg/FirstPkg.dec")
        .guid(SPACE, SPACE_GUID)
        .pcd(pcd_decl("PcdMode", PcdType::DynamicEx, "3", "2"))
        .build();
    let second = PackageBuilder::new("SecondPkg/SecondPkg.dec")
        .pcd(pcd_decl("PcdMode", PcdType::FixedAtBuild, "3", "1"))
        .build();
    let workspace = Workspace::builder(ResolverConfig::new("/ws"))
        .package(first)
        .package(second)
        .module(MODULE, records)
        .build();

    let module = workspace.resolve(&key())?;
    let pcd = module.pcds()?.get("PcdMode", SPACE).cloned().unwrap();
    assert_eq!(pcd.pcd_type, PcdType::DynamicEx);
    assert_eq!(pcd.package, "FirstPkg/FirstPkg.dec");
    Ok(())
}

#[test]
fn test_token_value_validation() {
    let cases = [
        ("0x1234", Some(0x1234)),
        ("0x123456789", None),
        ("4294967296", None),
        ("4294967295", Some(u32::MAX)),
        ("0x0000000012345678", Some(0x1234_5678)),
        ("12ab", None),
    ];

    for (token, expected) in cases {
        let records = RecordTable::new();
        header(&records, "UEFI_DRIVER");
        records.push(RecordBuilder::new(RecordKind::Package).value(PACKAGE));
        records.push(RecordBuilder::new(RecordKind::PcdFixedAtBuild).values([SPACE, "PcdTok", ""]));
        let package = PackageBuilder::new(PACKAGE)
            .guid(SPACE, SPACE_GUID)
            .pcd(pcd_decl("PcdTok", PcdType::FixedAtBuild, token, "0"))
            .build();
        let workspace = Workspace::builder(ResolverConfig::new("/ws"))
            .package(package)
            .module(MODULE, records)
            .build();

        let module = workspace.resolve(&key()).unwrap();
        match (module.pcds(), expected) {
            (Ok(pcds), Some(value)) => {
                assert_eq!(pcds.get("PcdTok", SPACE).unwrap().token_value.value(), value, "{token}");
            }
            (Err(err), None) => assert_eq!(err.kind(), ErrorKind::MalformedLiteral, "{token}"),
            (result, expected) => panic!("{token}: got {result:?}, expected {expected:?}"),
        }
    }
}

#[test]
fn test_depex_prefers_ppi_over_guid() -> Result<()> {
    let shared: &str = "gSharedNameGuid";
    let as_guid = guid!("00000000-0000-0000-0000-00000000000a");
    let as_ppi = guid!("00000000-0000-0000-0000-00000000000b");

    let records = RecordTable::new();
    header(&records, "PEIM");
    records.push(RecordBuilder::new(RecordKind::Package).value("GuidPkg/GuidPkg.dec"));
    records.push(RecordBuilder::new(RecordKind::Package).value("PpiPkg/PpiPkg.dec"));
    records.push(RecordBuilder::new(RecordKind::Depex).value(shared));

    let workspace = Workspace::builder(ResolverConfig::new("/ws"))
        .package(PackageBuilder::new("GuidPkg/GuidPkg.dec").guid(shared, as_guid).build())
        .package(PackageBuilder::new("PpiPkg/PpiPkg.dec").ppi(shared, as_ppi).build())
        .module(MODULE, records)
        .build();

    let module = workspace.resolve(&key())?;
    let tokens = module.depex()?.get(Arch::X64, ModuleKind::Peim).unwrap();
    assert_eq!(tokens, &vec![DepexToken::Guid(as_ppi)]);
    Ok(())
}

#[test]
fn test_required_depex() -> Result<()> {
    let build = |library: bool| {
        let records = RecordTable::new();
        header(&records, "DXE_RUNTIME_DRIVER");
        if library {
            records.push(
                RecordBuilder::new(RecordKind::Header).values(["LIBRARY_CLASS", "RuntimeLib|DXE_RUNTIME_DRIVER"]),
            );
        }
        Workspace::builder(ResolverConfig::new("/ws"))
            .module(MODULE, records)
            .build()
    };

    let workspace = build(false);
    let err = workspace.resolve(&key())?.depex().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MissingRequiredField);

    let workspace = build(true);
    assert!(workspace.resolve(&key())?.depex()?.is_empty());
    Ok(())
}

#[test]
fn test_binary_module_short_circuit() -> Result<()> {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("SamplePkg/Driver")).unwrap();
    fs::write(dir.path().join("SamplePkg/Driver/Driver.efi"), [0u8; 4]).unwrap();

    let records = RecordTable::new();
    header(&records, "DXE_DRIVER");
    records.push(RecordBuilder::new(RecordKind::BinaryFile).values(["PE32", "Driver.efi", ""]));
    // never compiled: the module ships only binaries
    records.push(RecordBuilder::new(RecordKind::Depex).value("gUndeclaredProtocolGuid"));

    let workspace = Workspace::builder(ResolverConfig::new(dir.path()))
        .module(MODULE, records)
        .build();
    let module = workspace.resolve(&key())?;
    assert!(module.is_binary_module()?);
    assert!(module.sources()?.is_empty());
    assert!(module.depex()?.is_empty());
    assert_eq!(
        module
            .depex_expression()?
            .get(Arch::X64, ModuleKind::DxeDriver)
            .map(String::as_str),
        Some("gUndeclaredProtocolGuid")
    );
    Ok(())
}

#[test]
fn test_binary_only_mode() -> Result<()> {
    let records = RecordTable::new();
    header(&records, "DXE_DRIVER");
    records.push(RecordBuilder::new(RecordKind::SourceFile).values(["Missing.c", "", ""]));

    let workspace = Workspace::builder(ResolverConfig::binary_only("/ws"))
        .module(MODULE, records)
        .build();
    let module = workspace.resolve(&key())?;
    assert!(module.is_binary_module()?);
    assert!(module.sources()?.is_empty());
    assert_eq!(module.binaries().unwrap_err().kind(), ErrorKind::MissingRequiredField);
    Ok(())
}

#[test]
fn test_resolve_all_in_parallel() {
    let dir = scratch_module();
    let workspace = end_to_end_workspace(dir.path());
    let keys: Vec<_> = [Arch::Ia32, Arch::X64, Arch::Aarch64]
        .into_iter()
        .map(|arch| ModuleKey::new(MODULE, arch, "RELEASE", "GCC5"))
        .chain(std::iter::once(ModuleKey::new(
            "SamplePkg/Missing/Missing.inf",
            Arch::X64,
            "RELEASE",
            "GCC5",
        )))
        .collect();

    let results = workspace.resolve_all(&keys);
    assert_eq!(results.len(), 4);
    for (key, result) in keys.iter().zip(&results).take(3) {
        let module = result.as_ref().unwrap();
        assert_eq!(module.key(), key);
        assert_eq!(module.pcds().unwrap().len(), 1);
    }
    assert_eq!(
        results[3].as_ref().err().map(Error::kind),
        Some(ErrorKind::FileValidation)
    );
    assert_eq!(workspace.cached(), 3);
}

#[test]
fn test_errors_carry_locations() -> Result<()> {
    let records = RecordTable::new();
    header(&records, "UEFI_DRIVER");
    records.push(RecordBuilder::new(RecordKind::Package).value(PACKAGE));
    records.push(
        RecordBuilder::new(RecordKind::Protocol)
            .value("gMissingProtocolGuid")
            .line(42),
    );
    let workspace = Workspace::builder(ResolverConfig::new("/ws"))
        .package(PackageBuilder::new(PACKAGE).build())
        .module(MODULE, records)
        .build();

    let err = workspace.resolve(&key())?.protocols().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnresolvedSymbol);
    let location = err.location().unwrap();
    assert_eq!(location.file, Path::new(MODULE));
    assert_eq!(location.line, Some(42));
    assert!(err.to_string().starts_with("SamplePkg/Driver/Driver.inf(42)"));
    Ok(())
}
