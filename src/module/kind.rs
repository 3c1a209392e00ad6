//! Module kinds, kind sets, and the build type classification.

use std::fmt;

use bitflags::bitflags;
use strum::{Display, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

/// Execution phase / role of a firmware module (`MODULE_TYPE`).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString, EnumIter, IntoStaticStr,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ModuleKind {
    /// Phase independent code
    Base,
    /// Security phase
    Sec,
    /// PEI foundation
    PeiCore,
    /// PEI module
    Peim,
    /// DXE foundation
    DxeCore,
    /// DXE driver
    DxeDriver,
    /// DXE driver that survives `ExitBootServices`
    DxeRuntimeDriver,
    /// Itanium SAL runtime driver
    DxeSalDriver,
    /// Traditional SMM driver
    DxeSmmDriver,
    /// UEFI driver model driver
    UefiDriver,
    /// UEFI application
    UefiApplication,
    /// Module with a custom build flow
    UserDefined,
    /// Traditional SMM foundation
    SmmCore,
    /// Standalone MM driver
    MmStandalone,
    /// Standalone MM foundation
    MmCoreStandalone,
    /// Application that runs on the build host
    HostApplication,
}

impl ModuleKind {
    /// Kinds that must carry a dependency expression unless they are a library instance
    #[must_use]
    pub fn requires_depex(self) -> bool {
        matches!(
            self,
            ModuleKind::DxeDriver
                | ModuleKind::Peim
                | ModuleKind::DxeSmmDriver
                | ModuleKind::DxeSalDriver
                | ModuleKind::DxeRuntimeDriver
        )
    }

    /// Kinds a `USER_DEFINED` module may name as the target of its dependency expression
    #[must_use]
    pub fn is_depex_target(self) -> bool {
        matches!(
            self,
            ModuleKind::Peim | ModuleKind::DxeDriver | ModuleKind::DxeSmmDriver
        )
    }

    /// Minimum `PI_SPECIFICATION_VERSION` the kind needs, if any
    #[must_use]
    pub fn minimum_pi_version(self) -> Option<u32> {
        match self {
            ModuleKind::SmmCore => Some(0x0001_000A),
            ModuleKind::MmStandalone | ModuleKind::MmCoreStandalone => Some(0x0001_0032),
            _ => None,
        }
    }

    /// Maps a legacy `COMPONENT_TYPE` to the module kind it builds as
    #[must_use]
    pub fn from_component_type(component: &str) -> Option<ModuleKind> {
        Some(match component {
            "LIBRARY" | "LOGO" => ModuleKind::Base,
            "SECURITY_CORE" => ModuleKind::Sec,
            "PEI_CORE" => ModuleKind::PeiCore,
            "COMBINED_PEIM_DRIVER" | "PIC_PEIM" | "RELOCATABLE_PEIM" | "PE32_PEIM" => {
                ModuleKind::Peim
            }
            "BS_DRIVER" => ModuleKind::DxeDriver,
            "RT_DRIVER" => ModuleKind::DxeRuntimeDriver,
            "SAL_RT_DRIVER" => ModuleKind::DxeSalDriver,
            "APPLICATION" => ModuleKind::UefiApplication,
            _ => return None,
        })
    }

    /// The single-bit [`ModuleKinds`] set of this kind
    #[must_use]
    pub fn flag(self) -> ModuleKinds {
        ModuleKinds::from_bits_truncate(1 << self as u32)
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// A set of module kinds, e.g. the kinds a library class instance supports
    pub struct ModuleKinds : u32 {
        /// `BASE`
        const BASE = 1 << ModuleKind::Base as u32;
        /// `SEC`
        const SEC = 1 << ModuleKind::Sec as u32;
        /// `PEI_CORE`
        const PEI_CORE = 1 << ModuleKind::PeiCore as u32;
        /// `PEIM`
        const PEIM = 1 << ModuleKind::Peim as u32;
        /// `DXE_CORE`
        const DXE_CORE = 1 << ModuleKind::DxeCore as u32;
        /// `DXE_DRIVER`
        const DXE_DRIVER = 1 << ModuleKind::DxeDriver as u32;
        /// `DXE_RUNTIME_DRIVER`
        const DXE_RUNTIME_DRIVER = 1 << ModuleKind::DxeRuntimeDriver as u32;
        /// `DXE_SAL_DRIVER`
        const DXE_SAL_DRIVER = 1 << ModuleKind::DxeSalDriver as u32;
        /// `DXE_SMM_DRIVER`
        const DXE_SMM_DRIVER = 1 << ModuleKind::DxeSmmDriver as u32;
        /// `UEFI_DRIVER`
        const UEFI_DRIVER = 1 << ModuleKind::UefiDriver as u32;
        /// `UEFI_APPLICATION`
        const UEFI_APPLICATION = 1 << ModuleKind::UefiApplication as u32;
        /// `USER_DEFINED`
        const USER_DEFINED = 1 << ModuleKind::UserDefined as u32;
        /// `SMM_CORE`
        const SMM_CORE = 1 << ModuleKind::SmmCore as u32;
        /// `MM_STANDALONE`
        const MM_STANDALONE = 1 << ModuleKind::MmStandalone as u32;
        /// `MM_CORE_STANDALONE`
        const MM_CORE_STANDALONE = 1 << ModuleKind::MmCoreStandalone as u32;
        /// `HOST_APPLICATION`
        const HOST_APPLICATION = 1 << ModuleKind::HostApplication as u32;
    }
}

impl ModuleKinds {
    /// Parses a space separated kind list (`PEIM DXE_DRIVER`).
    ///
    /// # Errors
    ///
    /// Returns the first token that is not a module kind.
    pub fn parse_list(text: &str) -> Result<ModuleKinds, String> {
        let mut kinds = ModuleKinds::empty();
        for token in text.split_whitespace() {
            let kind = token
                .parse::<ModuleKind>()
                .map_err(|_| token.to_string())?;
            kinds |= kind.flag();
        }
        Ok(kinds)
    }

    /// Returns true if `kind` is part of the set
    #[must_use]
    pub fn supports(self, kind: ModuleKind) -> bool {
        self.contains(kind.flag())
    }

    /// Members of the set in declaration order
    pub fn kinds(self) -> impl Iterator<Item = ModuleKind> {
        ModuleKind::iter().filter(move |kind| self.supports(*kind))
    }
}

/// How the build packages a module.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BuildType {
    /// Built as its module kind
    Module(ModuleKind),
    /// PCI option ROM image (`UEFI_OPTIONROM`)
    OptionRom,
    /// Image with an HII resource section (`UEFI_HII`)
    Hii,
    /// Legacy component, classified by its upper-cased `COMPONENT_TYPE`
    Component(String),
}

impl fmt::Display for BuildType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildType::Module(kind) => write!(f, "{kind}"),
            BuildType::OptionRom => write!(f, "UEFI_OPTIONROM"),
            BuildType::Hii => write!(f, "UEFI_HII"),
            BuildType::Component(name) => write!(f, "{name}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn kind_names() {
        assert_eq!(ModuleKind::from_str("DXE_RUNTIME_DRIVER").unwrap(), ModuleKind::DxeRuntimeDriver);
        assert_eq!(ModuleKind::MmCoreStandalone.to_string(), "MM_CORE_STANDALONE");
        assert_eq!(ModuleKind::Peim.to_string(), "PEIM");
        assert!(ModuleKind::from_str("DXE_DRIVERS").is_err());
    }

    #[test]
    fn component_map() {
        assert_eq!(ModuleKind::from_component_type("BS_DRIVER"), Some(ModuleKind::DxeDriver));
        assert_eq!(ModuleKind::from_component_type("PE32_PEIM"), Some(ModuleKind::Peim));
        assert_eq!(ModuleKind::from_component_type("LIBRARY"), Some(ModuleKind::Base));
        assert_eq!(ModuleKind::from_component_type("FV_IMAGE"), None);
    }

    #[test]
    fn kind_sets() {
        let kinds = ModuleKinds::parse_list("PEIM  DXE_DRIVER").unwrap();
        assert!(kinds.supports(ModuleKind::Peim));
        assert!(!kinds.supports(ModuleKind::Base));
        assert_eq!(
            kinds.kinds().collect::<Vec<_>>(),
            vec![ModuleKind::Peim, ModuleKind::DxeDriver]
        );
        assert_eq!(ModuleKinds::parse_list("PEIM FOO"), Err("FOO".to_string()));
        assert_eq!(ModuleKinds::all().kinds().count(), ModuleKind::iter().count());
    }

    #[test]
    fn depex_rules() {
        assert!(ModuleKind::DxeDriver.requires_depex());
        assert!(!ModuleKind::UefiDriver.requires_depex());
        assert!(ModuleKind::DxeSmmDriver.is_depex_target());
        assert!(!ModuleKind::DxeRuntimeDriver.is_depex_target());
        assert_eq!(ModuleKind::SmmCore.minimum_pi_version(), Some(0x0001_000A));
    }

    #[test]
    fn build_type_display() {
        assert_eq!(BuildType::Module(ModuleKind::DxeDriver).to_string(), "DXE_DRIVER");
        assert_eq!(BuildType::OptionRom.to_string(), "UEFI_OPTIONROM");
        assert_eq!(BuildType::Component("BS_DRIVER".into()).to_string(), "BS_DRIVER");
    }
}
