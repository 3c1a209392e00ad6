//! Pre-parsed declaration records of a module description file.
//!
//! Tokenizing `.inf` files is not part of this crate; the resolver consumes the records a
//! parser produced. A record is one declaration line: a category ([`RecordKind`]),
//! positional values, the architecture and secondary scope of the section it appeared in,
//! and the source line for diagnostics.
//!
//! # Key Types
//! - [`RecordStore`] - Query interface the resolver reads through
//! - [`RecordTable`] - In-memory, insertion-ordered store
//! - [`RecordBuilder`] - Fluent construction of a single record
//!
//! # Query Semantics
//!
//! A record matches a queried architecture when it is scoped to that architecture or to
//! `COMMON`. The secondary scope works the same way for platforms. Dependency expression
//! records use the secondary scope for their module kind tag, so their queries leave the
//! platform unconstrained.

use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc,
};

use crossbeam_skiplist::SkipMap;
use strum::{Display, EnumIter};

use crate::metadata::arch::Arch;

/// Scope value that applies to every platform or module kind
pub const SCOPE_COMMON: &str = "COMMON";

/// Identifier of a record within its store, assigned in insertion order
pub type RecordId = u32;

/// A reference to a `Record`
pub type RecordRc = Arc<Record>;

/// Declaration category of a record.
///
/// Each category corresponds to a section (or a section family) of a module description
/// file. Positional value layout per category:
///
/// | Kind | value 0 | value 1 | value 2 |
/// |------|---------|---------|---------|
/// | `Header` / `Nmake` | name | value | |
/// | `SourceFile` | path | toolchain family | tag |
/// | `BinaryFile` | file type | path | `Target[|FeatureFlag...]` |
/// | `LibraryClass` | class name | instance path | |
/// | `LibraryInstance` | library name | | |
/// | `Protocol` / `Ppi` / `Guid` | C name | | |
/// | `Include` / `Package` | path | | |
/// | `Pcd*` | token space C name | token C name | setting |
/// | `BuildOption` | toolchain family | tool flag key | option |
/// | `Depex` | expression | | |
/// | comments | text | | |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumIter)]
pub enum RecordKind {
    /// `[Defines]` entry
    Header,
    /// Legacy `[nmake]` entry
    Nmake,
    /// Comment block preceding the `[Defines]` section
    HeaderComment,
    /// Comment block at the end of the file
    TailComment,
    /// Comment attached to another record (see [`Record::owner`])
    Comment,
    /// `[Sources]` entry
    SourceFile,
    /// `[Binaries]` entry
    BinaryFile,
    /// `[LibraryClasses]` entry
    LibraryClass,
    /// Legacy `[Libraries]` entry
    LibraryInstance,
    /// `[Protocols]` entry
    Protocol,
    /// `[Ppis]` entry
    Ppi,
    /// `[Guids]` entry
    Guid,
    /// Legacy `[Includes]` entry
    Include,
    /// `[Packages]` entry
    Package,
    /// `[FixedPcd]` entry
    PcdFixedAtBuild,
    /// `[PatchPcd]` entry
    PcdPatchableInModule,
    /// `[FeaturePcd]` entry
    PcdFeatureFlag,
    /// `[Pcd]` entry, the storage class is left to the platform
    PcdDynamic,
    /// `[PcdEx]` entry
    PcdDynamicEx,
    /// `[BuildOptions]` entry
    BuildOption,
    /// `[Depex]` entry
    Depex,
}

/// One declaration record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Store-assigned identifier, used to attach comments
    pub id: RecordId,
    /// Declaration category
    pub kind: RecordKind,
    /// Positional values, see [`RecordKind`] for the layout
    pub values: Vec<String>,
    /// Architecture of the enclosing section
    pub arch: Arch,
    /// Secondary scope: platform name, or the module kind tag for `[Depex]` sections
    pub scope: String,
    /// The record this one belongs to (comments only)
    pub owner: Option<RecordId>,
    /// Source line for diagnostics
    pub line: u32,
}

impl Record {
    /// Returns the positional value at `index`, or `""` if the record has fewer values
    #[must_use]
    pub fn value(&self, index: usize) -> &str {
        self.values.get(index).map_or("", String::as_str)
    }
}

/// Filter for [`RecordStore::query`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordQuery {
    /// Category to select
    pub kind: RecordKind,
    /// Architecture filter, `None` for any
    pub arch: Option<Arch>,
    /// Platform filter, `None` for any
    pub platform: Option<String>,
    /// Owner filter for attached comments
    pub owner: Option<RecordId>,
}

impl RecordQuery {
    /// Creates a query selecting every record of `kind`
    #[must_use]
    pub fn new(kind: RecordKind) -> Self {
        RecordQuery {
            kind,
            arch: None,
            platform: None,
            owner: None,
        }
    }

    /// Restricts the query to records applicable to `arch`
    #[must_use]
    pub fn arch(mut self, arch: Arch) -> Self {
        self.arch = Some(arch);
        self
    }

    /// Restricts the query to records applicable to `platform`
    #[must_use]
    pub fn platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = Some(platform.into());
        self
    }

    /// Restricts the query to records owned by `owner`
    #[must_use]
    pub fn owner(mut self, owner: RecordId) -> Self {
        self.owner = Some(owner);
        self
    }

    /// Returns true if `record` satisfies this query
    #[must_use]
    pub fn matches(&self, record: &Record) -> bool {
        if record.kind != self.kind {
            return false;
        }
        if let Some(arch) = self.arch {
            if !record.arch.applies_to(arch) {
                return false;
            }
        }
        if let Some(platform) = &self.platform {
            if !record.scope.eq_ignore_ascii_case(SCOPE_COMMON)
                && !record.scope.eq_ignore_ascii_case(platform)
            {
                return false;
            }
        }
        if let Some(owner) = self.owner {
            if record.owner != Some(owner) {
                return false;
            }
        }
        true
    }
}

/// Read access to the records of one module description file.
///
/// Implementations must return matches in declaration order and must not change their
/// contents once resolution started.
pub trait RecordStore: Send + Sync {
    /// Returns all records matching `query`, in declaration order.
    fn query(&self, query: &RecordQuery) -> Vec<RecordRc>;
}

/// Fluent construction of a [`Record`] before it is added to a [`RecordTable`].
///
/// # Examples
///
/// ```rust
/// use infscope::metadata::records::{RecordBuilder, RecordKind, RecordTable};
/// use infscope::metadata::arch::Arch;
///
/// let table = RecordTable::new();
/// let id = table.push(
///     RecordBuilder::new(RecordKind::Protocol)
///         .value("gEfiPciIoProtocolGuid")
///         .arch(Arch::X64)
///         .line(20),
/// );
/// table.push(RecordBuilder::comment(id, "## CONSUMES"));
/// ```
#[derive(Debug, Clone)]
pub struct RecordBuilder {
    kind: RecordKind,
    values: Vec<String>,
    arch: Arch,
    scope: String,
    owner: Option<RecordId>,
    line: u32,
}

impl RecordBuilder {
    /// Starts a `COMMON`-scoped record of `kind` with no values
    #[must_use]
    pub fn new(kind: RecordKind) -> Self {
        RecordBuilder {
            kind,
            values: Vec::new(),
            arch: Arch::Common,
            scope: SCOPE_COMMON.to_string(),
            owner: None,
            line: 0,
        }
    }

    /// Starts a comment record attached to `owner`
    #[must_use]
    pub fn comment(owner: RecordId, text: impl Into<String>) -> Self {
        let mut builder = RecordBuilder::new(RecordKind::Comment).value(text);
        builder.owner = Some(owner);
        builder
    }

    /// Appends a positional value
    #[must_use]
    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.values.push(value.into());
        self
    }

    /// Appends several positional values
    #[must_use]
    pub fn values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.values.extend(values.into_iter().map(Into::into));
        self
    }

    /// Sets the section architecture
    #[must_use]
    pub fn arch(mut self, arch: Arch) -> Self {
        self.arch = arch;
        self
    }

    /// Sets the secondary scope (platform, or module kind tag for dependency expressions)
    #[must_use]
    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    /// Sets the source line
    #[must_use]
    pub fn line(mut self, line: u32) -> Self {
        self.line = line;
        self
    }
}

/// In-memory [`RecordStore`].
///
/// Records are kept in a skip list keyed by `(kind, id)`, so a query walks only the
/// category it asks for and yields records in insertion order. Insertion takes `&self`
/// and is safe from several threads.
pub struct RecordTable {
    records: SkipMap<(RecordKind, RecordId), RecordRc>,
    next_id: AtomicU32,
}

impl RecordTable {
    /// Creates an empty table
    #[must_use]
    pub fn new() -> Self {
        RecordTable {
            records: SkipMap::new(),
            next_id: AtomicU32::new(1),
        }
    }

    /// Adds a record and returns its identifier
    pub fn push(&self, builder: RecordBuilder) -> RecordId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let record = Record {
            id,
            kind: builder.kind,
            values: builder.values,
            arch: builder.arch,
            scope: builder.scope,
            owner: builder.owner,
            line: builder.line,
        };
        self.records.insert((record.kind, id), Arc::new(record));
        id
    }

    /// Number of records in the table
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if the table holds no records
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Default for RecordTable {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordStore for RecordTable {
    fn query(&self, query: &RecordQuery) -> Vec<RecordRc> {
        self.records
            .range((query.kind, RecordId::MIN)..=(query.kind, RecordId::MAX))
            .map(|entry| entry.value().clone())
            .filter(|record| query.matches(record))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RecordTable {
        let table = RecordTable::new();
        table.push(RecordBuilder::new(RecordKind::Protocol).value("gA").line(1));
        table.push(
            RecordBuilder::new(RecordKind::Protocol)
                .value("gB")
                .arch(Arch::Ia32)
                .line(2),
        );
        table.push(RecordBuilder::new(RecordKind::Ppi).value("gP").line(3));
        table.push(
            RecordBuilder::new(RecordKind::Protocol)
                .value("gC")
                .arch(Arch::X64)
                .scope("MyPlatform")
                .line(4),
        );
        table
    }

    #[test]
    fn query_by_kind_keeps_order() {
        let table = sample();
        let names: Vec<_> = table
            .query(&RecordQuery::new(RecordKind::Protocol))
            .iter()
            .map(|r| r.value(0).to_string())
            .collect();
        assert_eq!(names, vec!["gA", "gB", "gC"]);
    }

    #[test]
    fn arch_filter_includes_common() {
        let table = sample();
        let names: Vec<_> = table
            .query(&RecordQuery::new(RecordKind::Protocol).arch(Arch::X64))
            .iter()
            .map(|r| r.value(0).to_string())
            .collect();
        assert_eq!(names, vec!["gA", "gC"]);
    }

    #[test]
    fn platform_filter() {
        let table = sample();
        let other = table.query(
            &RecordQuery::new(RecordKind::Protocol)
                .arch(Arch::X64)
                .platform("Other"),
        );
        assert_eq!(other.len(), 1);
        let mine = table.query(
            &RecordQuery::new(RecordKind::Protocol)
                .arch(Arch::X64)
                .platform("myplatform"),
        );
        assert_eq!(mine.len(), 2);
    }

    #[test]
    fn comments_by_owner() {
        let table = RecordTable::new();
        let owner = table.push(RecordBuilder::new(RecordKind::Guid).value("gG"));
        table.push(RecordBuilder::comment(owner, "## PRODUCES"));
        table.push(RecordBuilder::comment(owner + 100, "## unrelated"));

        let comments = table.query(&RecordQuery::new(RecordKind::Comment).owner(owner));
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].value(0), "## PRODUCES");
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn missing_value_is_empty() {
        let table = RecordTable::new();
        table.push(RecordBuilder::new(RecordKind::Header).value("BASE_NAME"));
        let record = &table.query(&RecordQuery::new(RecordKind::Header))[0];
        assert_eq!(record.value(1), "");
    }
}
