// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![deny(unsafe_code)]
#![allow(clippy::too_many_arguments)]

//! # infscope
//!
//! Metadata resolution for UEFI / EDK II firmware modules. `infscope` takes the pre-parsed
//! declaration records of a module description file (`.inf`) and the declarations of the
//! packages it depends on (`.dec`), and resolves them into a typed, immutable view of the
//! module: its header, sources and binaries, the protocols, PPIs and GUIDs it uses, its PCDs
//! with their final classes and values, and its compiled dependency expressions.
//!
//! ## Features
//!
//! - **Lazy, memoized facade** - every attribute is resolved once, on first access
//! - **Strict validation** - unknown module kinds, malformed token numbers, missing files and
//!   unresolved symbols fail with a typed [`Error`] pointing at the offending line
//! - **Legacy support** - pre-1.5 module descriptions, `[nmake]` flags and legacy include paths
//! - **Parallel batch resolution** - independent modules resolve concurrently against one
//!   immutable [`Workspace`]
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use infscope::prelude::*;
//! use uguid::guid;
//!
//! let package = PackageBuilder::new("MdeModulePkg/MdeModulePkg.dec")
//!     .guid("gEfiMdeModulePkgTokenSpaceGuid", guid!("a1aff049-fdeb-442a-b320-13ab4cb72bbc"))
//!     .pcd(PcdDeclaration::new(
//!         "PcdMaxSize",
//!         "gEfiMdeModulePkgTokenSpaceGuid",
//!         PcdType::FixedAtBuild,
//!         "0x00000001",
//!         DatumType::Uint32,
//!         "5",
//!     ))
//!     .build();
//!
//! let records = RecordTable::new();
//! for (name, value) in [
//!     ("INF_VERSION", "0x00010005"),
//!     ("BASE_NAME", "Sample"),
//!     ("FILE_GUID", "d47e1e0a-3a4c-4ad6-9c37-1c6ad7e9b5b2"),
//!     ("MODULE_TYPE", "UEFI_DRIVER"),
//! ] {
//!     records.push(RecordBuilder::new(RecordKind::Header).values([name, value]));
//! }
//! records.push(RecordBuilder::new(RecordKind::Package).value("MdeModulePkg/MdeModulePkg.dec"));
//! records.push(
//!     RecordBuilder::new(RecordKind::PcdFixedAtBuild)
//!         .values(["gEfiMdeModulePkgTokenSpaceGuid", "PcdMaxSize", ""]),
//! );
//!
//! let workspace = Workspace::builder(ResolverConfig::new("/work/edk2"))
//!     .package(package)
//!     .module("MdeModulePkg/Sample/Sample.inf", records)
//!     .build();
//!
//! let key = ModuleKey::new("MdeModulePkg/Sample/Sample.inf", Arch::X64, "DEBUG", "GCC5");
//! let module = workspace.resolve(&key)?;
//! let pcd = module.pcds()?.get("PcdMaxSize", "gEfiMdeModulePkgTokenSpaceGuid").unwrap();
//! assert_eq!(pcd.default_value, "5");
//! # Ok::<(), infscope::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`metadata`] - The inputs: records, packages, PCD declarations, paths, macro expansion
//!   and value evaluation
//! - [`module`] - The resolved module facade and the resolvers behind each attribute
//! - [`workspace`] - Build-wide context, configuration and the facade cache
//! - [`utils`] - Literal parsing shared by the resolvers
//!
//! Parsing `.inf` / `.dec` text is not part of this crate; a parser feeds a
//! [`metadata::records::RecordStore`] and [`metadata::package::Package`] indices.
//!
//! ## Logging
//!
//! Resolution steps are reported through the [`log`] facade at `debug` level. A source header
//! file that does not exist is reported at `warn` level and skipped. No logger is installed.
//!
//! ## Testing
//!
//! ```bash
//! cargo test
//! cargo bench
//! ```

#[macro_use]
pub(crate) mod error;

/// Shared functionality which is used in unit tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust,no_run
/// use infscope::prelude::*;
///
/// let workspace = Workspace::builder(ResolverConfig::new("/work/edk2")).build();
/// let key = ModuleKey::new("MdePkg/Library/BaseLib/BaseLib.inf", Arch::X64, "DEBUG", "GCC5");
/// let module = workspace.resolve(&key)?;
/// # Ok::<(), infscope::Error>(())
/// ```
pub mod prelude;

/// Inputs of module resolution
///
/// Declaration records and the store interface they are queried through, package
/// declaration indices, PCD classes and datum types, token numbers, declared file
/// validation, macro expansion and PCD value evaluation.
pub mod metadata;

/// The resolved module facade
///
/// [`module::ResolvedModule`] exposes the header of a module eagerly and every other
/// attribute lazily. See the module documentation for the individual resolvers.
pub mod module;

/// Literal parsing helpers: integers, pipe separated settings and GUIDs
pub mod utils;

/// Build-wide context and entry point
///
/// [`Workspace`] registers packages and modules and memoizes resolved modules per
/// [`ModuleKey`].
pub mod workspace;

/// `infscope` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `infscope` Error type
///
/// Every resolution failure. [`Error::kind`] classifies it, [`Error::location`] points at
/// the declaration that caused it.
///
/// # Examples
///
/// ```rust,no_run
/// use infscope::{prelude::*, ErrorKind};
///
/// let workspace = Workspace::builder(ResolverConfig::new("/work/edk2")).build();
/// let key = ModuleKey::new("Missing/Missing.inf", Arch::X64, "DEBUG", "GCC5");
/// match workspace.resolve(&key) {
///     Ok(module) => println!("resolved {}", module.base_name()),
///     Err(err) if err.kind() == ErrorKind::FileValidation => println!("not registered: {err}"),
///     Err(err) => println!("error: {err}"),
/// }
/// ```
pub use error::{Error, ErrorKind, Location};

/// Entry point of module resolution, see [`workspace::Workspace`]
pub use workspace::{ModuleKey, ResolverConfig, Workspace, WorkspaceBuilder};

/// The resolved module facade, see [`module::ResolvedModule`]
pub use module::ResolvedModule;
