//! PCD storage classes, datum types, and package-side PCD declarations.

use std::{convert::Infallible, fmt, str::FromStr};

use strum::{Display, EnumIter, EnumString, IntoStaticStr};

/// Storage class of a PCD.
///
/// Packages declare a PCD under one or more of the five base classes; platforms may narrow
/// the dynamic classes further into their default / HII / VPD flavours.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString, EnumIter, IntoStaticStr,
)]
pub enum PcdType {
    /// Value is a compile time constant
    FixedAtBuild,
    /// Value lives in the image and can be patched after the build
    PatchableInModule,
    /// Boolean compile time switch
    FeatureFlag,
    /// Value is provided at run time through the PCD database
    Dynamic,
    /// Dynamic, accessed by token space GUID and token number
    DynamicEx,
    /// Dynamic, backed by an HII variable
    DynamicHii,
    /// Dynamic, backed by the VPD region
    DynamicVpd,
    /// Dynamic-ex, backed by an HII variable
    DynamicExHii,
    /// Dynamic-ex, backed by the VPD region
    DynamicExVpd,
}

/// Order in which the concrete classes are tried when a module leaves a PCD's class open
/// (`[Pcd]` section). The first class the declaring package defines wins.
pub const DYNAMIC_TYPE_PRIORITY: [PcdType; 5] = [
    PcdType::FixedAtBuild,
    PcdType::PatchableInModule,
    PcdType::FeatureFlag,
    PcdType::Dynamic,
    PcdType::DynamicEx,
];

/// Datum type of a PCD value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DatumType {
    /// `UINT8`
    Uint8,
    /// `UINT16`
    Uint16,
    /// `UINT32`
    Uint32,
    /// `UINT64`
    Uint64,
    /// `BOOLEAN`
    Boolean,
    /// `VOID*`, variable length buffer or string
    Pointer,
    /// A structure PCD, named by its C type
    Struct(String),
}

impl DatumType {
    /// Largest integer the type can hold, `None` for non-integer types
    #[must_use]
    pub fn max_integer(&self) -> Option<u64> {
        match self {
            DatumType::Uint8 => Some(u64::from(u8::MAX)),
            DatumType::Uint16 => Some(u64::from(u16::MAX)),
            DatumType::Uint32 => Some(u64::from(u32::MAX)),
            DatumType::Uint64 => Some(u64::MAX),
            DatumType::Boolean => Some(1),
            DatumType::Pointer | DatumType::Struct(_) => None,
        }
    }

    /// Returns true for `VOID*`
    #[must_use]
    pub fn is_pointer(&self) -> bool {
        matches!(self, DatumType::Pointer)
    }
}

impl FromStr for DatumType {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim() {
            "UINT8" => DatumType::Uint8,
            "UINT16" => DatumType::Uint16,
            "UINT32" => DatumType::Uint32,
            "UINT64" => DatumType::Uint64,
            "BOOLEAN" => DatumType::Boolean,
            "VOID*" | "VOID *" => DatumType::Pointer,
            other => DatumType::Struct(other.to_string()),
        })
    }
}

impl fmt::Display for DatumType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatumType::Uint8 => write!(f, "UINT8"),
            DatumType::Uint16 => write!(f, "UINT16"),
            DatumType::Uint32 => write!(f, "UINT32"),
            DatumType::Uint64 => write!(f, "UINT64"),
            DatumType::Boolean => write!(f, "BOOLEAN"),
            DatumType::Pointer => write!(f, "VOID*"),
            DatumType::Struct(name) => write!(f, "{name}"),
        }
    }
}

/// Lookup key of a package PCD declaration: `(token name, token space name, class)`
pub type PcdKey = (String, String, PcdType);

/// A PCD as declared by a package.
///
/// The token value is kept as written; it is validated when a module resolves against it, so
/// a malformed declaration only fails the modules that actually use it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PcdDeclaration {
    /// Token C name
    pub token_cname: String,
    /// Token space GUID C name
    pub token_space_guid_cname: String,
    /// Storage class the declaration is made under
    pub pcd_type: PcdType,
    /// Token number as written in the package
    pub token_value: String,
    /// Datum type
    pub datum_type: DatumType,
    /// Maximum datum size for `VOID*` PCDs
    pub max_datum_size: Option<String>,
    /// Package default value
    pub default_value: String,
}

impl PcdDeclaration {
    /// Creates a declaration without a maximum datum size
    #[must_use]
    pub fn new(
        token_cname: impl Into<String>,
        token_space_guid_cname: impl Into<String>,
        pcd_type: PcdType,
        token_value: impl Into<String>,
        datum_type: DatumType,
        default_value: impl Into<String>,
    ) -> Self {
        PcdDeclaration {
            token_cname: token_cname.into(),
            token_space_guid_cname: token_space_guid_cname.into(),
            pcd_type,
            token_value: token_value.into(),
            datum_type,
            max_datum_size: None,
            default_value: default_value.into(),
        }
    }

    /// Sets the maximum datum size
    #[must_use]
    pub fn with_max_datum_size(mut self, size: impl Into<String>) -> Self {
        self.max_datum_size = Some(size.into());
        self
    }

    /// Returns the lookup key of this declaration
    #[must_use]
    pub fn key(&self) -> PcdKey {
        (
            self.token_cname.clone(),
            self.token_space_guid_cname.clone(),
            self.pcd_type,
        )
    }
}
