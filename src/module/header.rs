//! `[Defines]` resolution.
//!
//! The header block is resolved in one batch because its fields depend on each other: the
//! build type needs four PCI fields that may appear in any order, later values may reference
//! earlier defines as macros, and the declared format version decides which validation
//! rules apply. [`ModuleHeader::parse`] produces the complete, immutable header; everything
//! the resolved module exposes about its header is a projection of that struct.
//!
//! # Format versions
//!
//! Modules declaring `INF_VERSION` 1.5 or later are validated strictly (`MODULE_TYPE` is
//! mandatory and must be a supported kind). Older modules describe themselves through
//! `COMPONENT_TYPE` and an `[nmake]` section; both are translated into their modern
//! counterparts here.

use std::path::Path;

use indexmap::IndexMap;
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::{
    metadata::{
        arch::Arch,
        expand::{MacroResolver, MacroTable, UndefinedMacro},
        path::{locate, FileRef},
        records::{RecordKind, RecordQuery, RecordStore},
    },
    module::{
        kind::{BuildType, ModuleKind, ModuleKinds},
        options::{filter_nmake_defines, nmake_tool, BuildOptions, ToolChainFamily},
    },
    utils::{parse_integer, split_value_list},
    workspace::ResolverConfig,
    Location, Result,
};

/// First format version that uses the strict validation rules (`1.5`)
pub const MODERN_INF_VERSION: u32 = 0x0001_0005;

/// Format version assumed when a module does not declare one (`1.0`)
pub const DEFAULT_INF_VERSION: u32 = 0x0001_0000;

/// All-zero GUID reported for modules without `FILE_GUID`
pub const ZERO_GUID: &str = "00000000-0000-0000-0000-000000000000";

/// Specification versions a module may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum SpecificationKey {
    /// `UEFI_SPECIFICATION_VERSION`, also declared as `EFI_SPECIFICATION_VERSION`
    UefiSpecificationVersion,
    /// `EDK_RELEASE_VERSION`
    EdkReleaseVersion,
    /// `PI_SPECIFICATION_VERSION`
    PiSpecificationVersion,
}

/// Header defines that map onto a dedicated header field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeaderField {
    /// `BASE_NAME`
    BaseName,
    /// `FILE_GUID`
    FileGuid,
    /// `MODULE_TYPE`
    ModuleType,
    /// `COMPONENT_TYPE`
    ComponentType,
    /// `MAKEFILE_NAME`
    MakefileName,
    /// `DPX_SOURCE`
    DpxSource,
    /// `VERSION_NUMBER`, `VERSION_STRING` or `VERSION`
    Version,
    /// `PCD_IS_DRIVER`
    PcdIsDriver,
    /// `SHADOW`
    Shadow,
    /// `SOURCE_OVERRIDE_PATH`
    SourceOverridePath,
}

/// Classification of a `[Defines]` name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DefineName {
    /// Stored in a dedicated field, the define map and the macro table
    Field(HeaderField),
    /// A specification version
    Specification(SpecificationKey),
    /// `LIBRARY_CLASS = Name[|KIND KIND ...]`
    LibraryClass,
    /// `ENTRY_POINT`
    EntryPoint,
    /// `UNLOAD_IMAGE`
    UnloadImage,
    /// `CONSTRUCTOR`
    Constructor,
    /// `DESTRUCTOR`
    Destructor,
    /// `CUSTOM_MAKEFILE = [FAMILY|]File`
    CustomMakefile,
    /// Anything else, stored in the define map and the macro table
    Other,
}

impl DefineName {
    /// Classifies a define name
    #[must_use]
    pub fn classify(name: &str) -> DefineName {
        match name {
            "BASE_NAME" => DefineName::Field(HeaderField::BaseName),
            "FILE_GUID" => DefineName::Field(HeaderField::FileGuid),
            "MODULE_TYPE" => DefineName::Field(HeaderField::ModuleType),
            "COMPONENT_TYPE" => DefineName::Field(HeaderField::ComponentType),
            "MAKEFILE_NAME" => DefineName::Field(HeaderField::MakefileName),
            "DPX_SOURCE" => DefineName::Field(HeaderField::DpxSource),
            "VERSION_NUMBER" | "VERSION_STRING" | "VERSION" => {
                DefineName::Field(HeaderField::Version)
            }
            "PCD_IS_DRIVER" => DefineName::Field(HeaderField::PcdIsDriver),
            "SHADOW" => DefineName::Field(HeaderField::Shadow),
            "SOURCE_OVERRIDE_PATH" => DefineName::Field(HeaderField::SourceOverridePath),
            "EFI_SPECIFICATION_VERSION" | "UEFI_SPECIFICATION_VERSION" => {
                DefineName::Specification(SpecificationKey::UefiSpecificationVersion)
            }
            "EDK_RELEASE_VERSION" => DefineName::Specification(SpecificationKey::EdkReleaseVersion),
            "PI_SPECIFICATION_VERSION" => {
                DefineName::Specification(SpecificationKey::PiSpecificationVersion)
            }
            "LIBRARY_CLASS" => DefineName::LibraryClass,
            "ENTRY_POINT" => DefineName::EntryPoint,
            "UNLOAD_IMAGE" => DefineName::UnloadImage,
            "CONSTRUCTOR" => DefineName::Constructor,
            "DESTRUCTOR" => DefineName::Destructor,
            "CUSTOM_MAKEFILE" => DefineName::CustomMakefile,
            _ => DefineName::Other,
        }
    }
}

/// A library class this module provides an instance of.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryClassDecl {
    /// Library class name
    pub name: String,
    /// Module kinds the instance may be linked into
    pub supported: ModuleKinds,
}

/// Everything [`ModuleHeader::parse`] reads besides the records themselves.
pub struct HeaderContext<'a> {
    /// Workspace relative path of the module description file, used in diagnostics
    pub file: &'a Path,
    /// Directory of the module description file on disk
    pub module_dir: &'a Path,
    /// Architecture being resolved
    pub arch: Arch,
    /// Platform scope
    pub platform: &'a str,
    /// Resolver settings
    pub config: &'a ResolverConfig,
    /// Macro expansion
    pub macros: &'a dyn MacroResolver,
}

/// The fully resolved `[Defines]` block of a module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleHeader {
    /// Declared format version
    pub inf_version: u32,
    /// `BASE_NAME`
    pub base_name: String,
    /// `FILE_GUID`, all-zero when absent
    pub file_guid: String,
    /// Module kind
    pub module_type: ModuleKind,
    /// `COMPONENT_TYPE`, `USER_DEFINED` when absent
    pub component_type: String,
    /// Derived build classification
    pub build_type: BuildType,
    /// Module version, `0.0` when absent
    pub version: String,
    /// `PCD_IS_DRIVER`, empty when absent
    pub pcd_is_driver: String,
    /// `MAKEFILE_NAME`, empty when absent
    pub makefile_name: String,
    /// Source override directory declared in the header
    pub source_override_path: Option<String>,
    /// `SHADOW = TRUE`
    pub shadow: bool,
    /// Declared specification versions
    pub specification: IndexMap<SpecificationKey, u32>,
    /// Legacy custom makefile per toolchain family
    pub custom_makefile: IndexMap<ToolChainFamily, String>,
    /// Library classes this module is an instance of
    pub library_class: Vec<LibraryClassDecl>,
    /// `ENTRY_POINT` names, in declaration order
    pub entry_points: Vec<String>,
    /// `UNLOAD_IMAGE` names
    pub unload_images: Vec<String>,
    /// `CONSTRUCTOR` names
    pub constructors: Vec<String>,
    /// `DESTRUCTOR` names
    pub destructors: Vec<String>,
    /// Every define that did not go into a special list or map
    pub defines: IndexMap<String, String>,
    /// Macro table visible to the other sections of the module
    pub macros: MacroTable,
    /// Dependency expression source files, appended to the module sources
    pub dependency_files: Vec<FileRef>,
    /// Build options translated from a legacy `[nmake]` section
    pub nmake_options: BuildOptions,
    /// Comment block before `[Defines]`
    pub header_comments: Vec<String>,
    /// Comment block at the end of the file
    pub tail_comments: Vec<String>,
}

#[derive(Default)]
struct Fields {
    base_name: Option<String>,
    file_guid: Option<String>,
    module_type: Option<(String, u32)>,
    component_type: Option<String>,
    makefile_name: Option<String>,
    dpx_source: Option<(String, u32)>,
    version: Option<String>,
    pcd_is_driver: Option<String>,
    shadow: Option<String>,
    source_override_path: Option<String>,
}

impl Fields {
    fn set(&mut self, field: HeaderField, value: String, line: u32) {
        match field {
            HeaderField::BaseName => self.base_name = Some(value),
            HeaderField::FileGuid => self.file_guid = Some(value),
            HeaderField::ModuleType => self.module_type = Some((value, line)),
            HeaderField::ComponentType => self.component_type = Some(value),
            HeaderField::MakefileName => self.makefile_name = Some(value),
            HeaderField::DpxSource => self.dpx_source = Some((value, line)),
            HeaderField::Version => self.version = Some(value),
            HeaderField::PcdIsDriver => self.pcd_is_driver = Some(value),
            HeaderField::Shadow => self.shadow = Some(value),
            HeaderField::SourceOverridePath => self.source_override_path = Some(value),
        }
    }
}

impl ModuleHeader {
    /// Resolves the `[Defines]` block (and a legacy `[nmake]` block) of a module.
    ///
    /// # Arguments
    /// * `records` - The module's declaration records
    /// * `ctx` - File, architecture and settings the header is resolved for
    ///
    /// # Errors
    ///
    /// - [`crate::Error::MissingRequiredField`] without `BASE_NAME`, without `MODULE_TYPE` (modern)
    ///   or without `COMPONENT_TYPE` (legacy)
    /// - [`crate::Error::UnsupportedValue`] for an unknown `MODULE_TYPE`, an MM/SMM core kind with a
    ///   too old `PI_SPECIFICATION_VERSION`, a malformed `PCI_COMPRESS`, an unknown
    ///   `CUSTOM_MAKEFILE` family or an unknown kind in a `LIBRARY_CLASS` list
    /// - [`crate::Error::MalformedLiteral`] for unparseable `INF_VERSION` or specification versions
    /// - [`crate::Error::FileValidation`] for a missing or misnamed `DPX_SOURCE`
    pub fn parse(records: &dyn RecordStore, ctx: &HeaderContext<'_>) -> Result<ModuleHeader> {
        let query = RecordQuery::new(RecordKind::Header)
            .arch(ctx.arch)
            .platform(ctx.platform);
        let defines = records.query(&query);
        let at = |line: u32| Location::new(ctx.file, line);

        let mut inf_version = DEFAULT_INF_VERSION;
        if let Some(record) = defines.iter().find(|r| r.value(0) == "INF_VERSION") {
            inf_version = parse_inf_version(record.value(1)).ok_or_else(|| {
                resolve_error!(
                    MalformedLiteral,
                    at(record.line),
                    "INF_VERSION '{}' is not a valid version",
                    record.value(1)
                )
            })?;
        }
        let legacy = inf_version < MODERN_INF_VERSION;

        let mut macros = MacroTable::new();
        if legacy {
            macros.extend(ctx.config.edk_global.clone());
            macros.extend(ctx.config.global_defines.clone());
        }

        let mut fields = Fields::default();
        let mut header = ModuleHeader {
            inf_version,
            base_name: String::new(),
            file_guid: ZERO_GUID.to_string(),
            module_type: ModuleKind::Base,
            component_type: ModuleKind::UserDefined.to_string(),
            build_type: BuildType::Module(ModuleKind::Base),
            version: "0.0".to_string(),
            pcd_is_driver: String::new(),
            makefile_name: String::new(),
            source_override_path: None,
            shadow: false,
            specification: IndexMap::new(),
            custom_makefile: IndexMap::new(),
            library_class: Vec::new(),
            entry_points: Vec::new(),
            unload_images: Vec::new(),
            constructors: Vec::new(),
            destructors: Vec::new(),
            defines: IndexMap::new(),
            macros: MacroTable::new(),
            dependency_files: Vec::new(),
            nmake_options: BuildOptions::new(),
            header_comments: comments(records, RecordKind::HeaderComment),
            tail_comments: comments(records, RecordKind::TailComment),
        };

        for record in &defines {
            let name = record.value(0);
            let value = ctx.macros.expand(record.value(1), &macros, UndefinedMacro::Keep);

            match DefineName::classify(name) {
                DefineName::Field(field) => {
                    fields.set(field, value.clone(), record.line);
                    header.defines.insert(name.to_string(), value.clone());
                    macros.insert(name.to_string(), value);
                }
                DefineName::Specification(key) => {
                    let version = parse_spec_version(&value).ok_or_else(|| {
                        resolve_error!(
                            MalformedLiteral,
                            at(record.line),
                            "'{}' format is not supported for {}",
                            value,
                            name
                        )
                    })?;
                    header.specification.insert(key, version);
                }
                DefineName::LibraryClass => {
                    let parts = split_value_list(&value, '|');
                    let supported = match parts.get(1) {
                        Some(list) => ModuleKinds::parse_list(list).map_err(|token| {
                            resolve_error!(
                                UnsupportedValue,
                                at(record.line),
                                "LIBRARY_CLASS {} names unknown module type {}",
                                parts[0],
                                token
                            )
                        })?,
                        None => ModuleKinds::all(),
                    };
                    header.library_class.push(LibraryClassDecl {
                        name: parts[0].clone(),
                        supported,
                    });
                }
                DefineName::EntryPoint => {
                    if !value.is_empty() {
                        header.entry_points.push(value);
                    }
                }
                DefineName::UnloadImage => {
                    if !value.is_empty() {
                        header.unload_images.push(value);
                    }
                }
                DefineName::Constructor => {
                    if !value.is_empty() {
                        header.constructors.push(value);
                    }
                }
                DefineName::Destructor => {
                    if !value.is_empty() {
                        header.destructors.push(value);
                    }
                }
                DefineName::CustomMakefile => {
                    let tokens = split_value_list(&value, '|');
                    if tokens.len() < 2 {
                        header
                            .custom_makefile
                            .insert(ToolChainFamily::Msft, tokens[0].clone());
                        header
                            .custom_makefile
                            .insert(ToolChainFamily::Gcc, tokens[0].clone());
                    } else {
                        let family = tokens[0].parse::<ToolChainFamily>().map_err(|_| {
                            resolve_error!(
                                UnsupportedValue,
                                at(record.line),
                                "No supported family [{}]",
                                tokens[0]
                            )
                        })?;
                        header.custom_makefile.insert(family, tokens[1].clone());
                    }
                }
                DefineName::Other => {
                    header.defines.insert(name.to_string(), value.clone());
                    macros.insert(name.to_string(), value);
                }
            }
        }

        header.base_name = fields.base_name.take().ok_or_else(|| {
            resolve_error!(MissingRequiredField, Location::file(ctx.file), "No BASE_NAME name")
        })?;
        if let Some(guid) = fields.file_guid.take() {
            header.file_guid = guid;
        }
        if let Some(version) = fields.version.take() {
            header.version = version;
        }
        if let Some(component) = fields.component_type.clone() {
            header.component_type = component;
        }
        header.pcd_is_driver = fields.pcd_is_driver.take().unwrap_or_default();
        header.makefile_name = fields.makefile_name.take().unwrap_or_default();
        header.shadow = fields
            .shadow
            .as_deref()
            .is_some_and(|shadow| shadow.eq_ignore_ascii_case("TRUE"));
        header.source_override_path = fields.source_override_path.take();

        if legacy {
            header.resolve_legacy(records, ctx, &fields, &mut macros)?;
        } else {
            header.resolve_modern(ctx, &fields)?;
        }

        header.macros = macros;
        log::debug!(
            "resolved header of {} ({}, {}, INF_VERSION 0x{:08x})",
            ctx.file.display(),
            header.base_name,
            header.module_type,
            header.inf_version
        );
        Ok(header)
    }

    /// Returns true if the module uses the pre-1.5 description format
    #[must_use]
    pub fn is_legacy(&self) -> bool {
        self.inf_version < MODERN_INF_VERSION
    }

    fn resolve_modern(&mut self, ctx: &HeaderContext<'_>, fields: &Fields) -> Result<()> {
        let (declared, line) = fields.module_type.clone().ok_or_else(|| {
            resolve_error!(
                MissingRequiredField,
                Location::file(ctx.file),
                "MODULE_TYPE is not given"
            )
        })?;
        self.module_type = declared.parse::<ModuleKind>().map_err(|_| {
            resolve_error!(
                UnsupportedValue,
                Location::new(ctx.file, line),
                "MODULE_TYPE {} is not supported, valid values are: {}",
                declared,
                ModuleKinds::all()
                    .kinds()
                    .map(|kind| kind.to_string())
                    .collect::<Vec<_>>()
                    .join(" ")
            )
        })?;

        if let Some(minimum) = self.module_type.minimum_pi_version() {
            let declared = self
                .specification
                .get(&SpecificationKey::PiSpecificationVersion)
                .copied();
            if declared.map_or(true, |version| version < minimum) {
                return Err(resolve_error!(
                    UnsupportedValue,
                    Location::file(ctx.file),
                    "{} module type can't be used in the module with PI_SPECIFICATION_VERSION less than 0x{:08X}",
                    self.module_type,
                    minimum
                ));
            }
        }

        let pci = ["PCI_DEVICE_ID", "PCI_VENDOR_ID", "PCI_CLASS_CODE", "PCI_REVISION"];
        self.build_type = if pci.iter().all(|name| self.defines.contains_key(*name)) {
            if let Some(compress) = self.defines.get("PCI_COMPRESS") {
                if compress != "TRUE" && compress != "FALSE" {
                    return Err(resolve_error!(
                        UnsupportedValue,
                        Location::file(ctx.file),
                        "Expected TRUE/FALSE for PCI_COMPRESS, found '{}'",
                        compress
                    ));
                }
            }
            BuildType::OptionRom
        } else if self
            .defines
            .get("UEFI_HII_RESOURCE_SECTION")
            .is_some_and(|value| value == "TRUE")
        {
            BuildType::Hii
        } else {
            BuildType::Module(self.module_type)
        };

        if let Some((dxs, line)) = &fields.dpx_source {
            if !dxs.is_empty() {
                self.add_dependency_file(ctx, dxs, *line)?;
            }
        }
        Ok(())
    }

    fn resolve_legacy(
        &mut self,
        records: &dyn RecordStore,
        ctx: &HeaderContext<'_>,
        fields: &Fields,
        macros: &mut MacroTable,
    ) -> Result<()> {
        let component = fields.component_type.clone().ok_or_else(|| {
            resolve_error!(
                MissingRequiredField,
                Location::file(ctx.file),
                "COMPONENT_TYPE is not given"
            )
        })?;
        self.build_type = BuildType::Component(component.to_ascii_uppercase());
        self.module_type = match ModuleKind::from_component_type(&component) {
            Some(kind) => kind,
            None => match &fields.module_type {
                Some((declared, _)) => declared
                    .parse::<ModuleKind>()
                    .unwrap_or(ModuleKind::UserDefined),
                None => ModuleKind::Base,
            },
        };
        if component == "LIBRARY" {
            self.library_class = vec![LibraryClassDecl {
                name: self.base_name.clone(),
                supported: ModuleKinds::all(),
            }];
        }

        macros.insert(
            "EDK_SOURCE".to_string(),
            ctx.config.ecp_source.display().to_string(),
        );
        macros.insert("PROCESSOR".to_string(), ctx.arch.to_string());

        let query = RecordQuery::new(RecordKind::Nmake)
            .arch(ctx.arch)
            .platform(ctx.platform);
        for record in records.query(&query) {
            let name = record.value(0);
            let value = ctx.macros.expand(record.value(1), macros, UndefinedMacro::Erase);
            match name {
                "IMAGE_ENTRY_POINT" => self.entry_points.push(value),
                "DPX_SOURCE" => self.add_dependency_file(ctx, &value, record.line)?,
                _ => {
                    if let Some(tool) = nmake_tool(name) {
                        let key = format!("*_*_*_{tool}_FLAGS");
                        self.nmake_options
                            .append("MSFT", &key, &filter_nmake_defines(&value));
                    }
                }
            }
        }
        Ok(())
    }

    fn add_dependency_file(&mut self, ctx: &HeaderContext<'_>, dxs: &str, line: u32) -> Result<()> {
        let file = locate(dxs, &[ctx.module_dir], Some(&[".dxs"]))
            .map_err(|err| resolve_error!(FileValidation, Location::new(ctx.file, line), "{}", err))?;
        self.dependency_files.push(file);
        Ok(())
    }
}

fn comments(records: &dyn RecordStore, kind: RecordKind) -> Vec<String> {
    records
        .query(&RecordQuery::new(kind))
        .iter()
        .map(|record| record.value(0).to_string())
        .collect()
}

/// Parses `INF_VERSION`: `major.minor` or a plain numeric literal.
#[must_use]
pub fn parse_inf_version(text: &str) -> Option<u32> {
    let text = text.trim();
    match text.split_once('.') {
        Some((major, minor)) => {
            let major = u32::try_from(parse_integer(major)?).ok()?;
            let minor = u32::try_from(parse_integer(minor)?).ok()?;
            if major > 0xFFFF || minor > 0xFFFF {
                return None;
            }
            Some((major << 16) | minor)
        }
        None => u32::try_from(parse_integer(text)?).ok(),
    }
}

/// Parses a specification version: `M.m` (one or two minor digits, a single digit counts as
/// tens) or a `0x` literal of at most 8 hex digits.
///
/// # Examples
///
/// ```rust
/// use infscope::module::header::parse_spec_version;
///
/// assert_eq!(parse_spec_version("2.3"), Some(0x0002_001E));
/// assert_eq!(parse_spec_version("1.10"), Some(0x0001_000A));
/// assert_eq!(parse_spec_version("0x0001000A"), Some(0x0001_000A));
/// assert_eq!(parse_spec_version("2.300"), None);
/// ```
#[must_use]
pub fn parse_spec_version(text: &str) -> Option<u32> {
    let text = text.trim();
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        if hex.is_empty() || hex.len() > 8 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        return u32::from_str_radix(hex, 16).ok();
    }

    let (major_text, minor_text) = text.split_once('.')?;
    let digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if !digits(major_text) || (major_text.len() > 1 && major_text.starts_with('0')) {
        return None;
    }
    if !digits(minor_text) || minor_text.len() > 2 {
        return None;
    }
    let major: u32 = major_text.parse().ok()?;
    let mut minor: u32 = minor_text.parse().ok()?;
    if minor_text.len() == 1 {
        minor *= 10;
    }
    if major > 0xFFFF {
        return None;
    }
    Some((major << 16) + minor)
}
