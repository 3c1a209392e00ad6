//! # infscope Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! from the infscope library. Import this module to get quick access to the essential
//! types for resolving module metadata.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all infscope operations
pub use crate::Error;

/// Failure classification of [`Error`]
pub use crate::ErrorKind;

/// The result type used throughout infscope
pub use crate::Result;

// ================================================================================================
// Main Entry Points
// ================================================================================================

/// Workspace, its builder, configuration and resolution keys
pub use crate::workspace::{ModuleKey, ResolverConfig, Workspace, WorkspaceBuilder};

/// The resolved module facade
pub use crate::module::ResolvedModule;

// ================================================================================================
// Inputs
// ================================================================================================

/// Declaration records and the store interface
pub use crate::metadata::records::{
    RecordBuilder, RecordKind, RecordQuery, RecordStore, RecordTable,
};

/// Target architectures
pub use crate::metadata::arch::Arch;

/// Package declaration indices
pub use crate::metadata::package::{Package, PackageBuilder, SymbolKind};

/// PCD classes, datum types and package declarations
pub use crate::metadata::pcd::{DatumType, PcdDeclaration, PcdType};

/// Macro expansion and value evaluation collaborators
pub use crate::metadata::{
    expand::{DefaultMacroResolver, MacroResolver, MacroTable, UndefinedMacro},
    expression::{ExpressionEvaluator, ValueEvaluator},
};

// ================================================================================================
// Resolved Attributes
// ================================================================================================

/// Module kinds and build types
pub use crate::module::kind::{BuildType, ModuleKind, ModuleKinds};

/// Resolved header
pub use crate::module::header::ModuleHeader;

/// Files, symbols, PCDs and dependency expressions
pub use crate::module::{
    depex::{Depex, DepexExpression, DepexOpcode, DepexToken},
    files::{BinaryFile, SourceFile},
    options::BuildOptions,
    pcd::{Pcd, PcdAliasTable, PcdMap},
    symbols::SymbolMap,
};
