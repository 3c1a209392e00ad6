//! Inputs of module resolution: declaration records, package indices, and the value
//! level helpers the resolvers share.
//!
//! # Key Components
//!
//! - [`records`] - Pre-parsed declaration records and the [`records::RecordStore`] query interface
//! - [`package`] - Package symbol and PCD declaration indices
//! - [`pcd`] - PCD storage classes and datum types
//! - [`token`] - Validated PCD token numbers
//! - [`expand`] - `$(NAME)` macro expansion
//! - [`expression`] - Evaluation of module supplied PCD default values
//! - [`path`] - Declared file references and their on-disk validation
//! - [`arch`] - Target architectures
//!
//! # Examples
//!
//! ```rust
//! use infscope::metadata::records::{RecordBuilder, RecordKind, RecordQuery, RecordStore, RecordTable};
//!
//! let table = RecordTable::new();
//! table.push(RecordBuilder::new(RecordKind::Header).values(["BASE_NAME", "HelloWorld"]));
//!
//! let header = table.query(&RecordQuery::new(RecordKind::Header));
//! assert_eq!(header[0].value(1), "HelloWorld");
//! ```

/// Target architectures
pub mod arch;
/// Macro expansion of declaration values
pub mod expand;
/// PCD default value evaluation
pub mod expression;
/// Package declaration indices
pub mod package;
/// Declared file validation
pub mod path;
/// PCD classes, datum types, and package declarations
pub mod pcd;
/// Declaration records and the store interface
pub mod records;
/// PCD token numbers
pub mod token;
