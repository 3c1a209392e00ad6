//! Protocol, PPI and GUID resolution.

use indexmap::IndexMap;
use uguid::Guid;

use crate::{
    metadata::{
        package::SymbolKind,
        records::{RecordKind, RecordRc},
    },
    module::ResolvedModule,
    Location, Result,
};

/// Resolved symbols of one category, with the comments attached to each declaration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolMap {
    /// C name to identity value, in declaration order
    pub values: IndexMap<String, Guid>,
    /// C name to the comment lines of its declaration
    pub comments: IndexMap<String, Vec<String>>,
}

impl SymbolMap {
    /// Identity value of `name`
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Guid> {
        self.values.get(name)
    }

    /// Returns true if `name` was declared
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Number of declared symbols
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if nothing was declared
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl ResolvedModule {
    pub(crate) fn resolve_symbols(&self, kind: SymbolKind) -> Result<SymbolMap> {
        let record_kind = match kind {
            SymbolKind::Protocol => RecordKind::Protocol,
            SymbolKind::Ppi => RecordKind::Ppi,
            SymbolKind::Guid => RecordKind::Guid,
        };

        let mut map = SymbolMap::default();
        for record in self.query(record_kind) {
            let name = record.value(0);
            let value = self
                .find_symbol(kind, name)?
                .ok_or_else(|| self.unresolved(&record, kind, name))?;
            map.values.insert(name.to_string(), value);
            map.comments
                .insert(name.to_string(), self.comments_of(&record));
        }
        log::debug!("{}: {} {:?} symbols", self.key(), map.len(), kind);
        Ok(map)
    }

    /// First package in dependency order that declares `name` in `kind`
    pub(crate) fn find_symbol(&self, kind: SymbolKind, name: &str) -> Result<Option<Guid>> {
        let module_path = &self.key().path;
        Ok(self
            .packages()?
            .iter()
            .find_map(|package| package.symbol(kind, name, module_path)))
    }

    pub(crate) fn unresolved(&self, record: &RecordRc, kind: SymbolKind, name: &str) -> crate::Error {
        let searched = self.package_list();
        resolve_error!(
            UnresolvedSymbol,
            Location::new(&self.key().path, record.line),
            "{:?} {} is not found in any of the dependent packages [{}]",
            kind,
            name,
            searched
        )
    }
}

#[cfg(test)]
mod tests {
    use uguid::guid;

    use super::*;
    use crate::{
        metadata::package::PackageBuilder,
        test::{ModuleFixture, PKG_PATH},
        ErrorKind,
    };

    #[test]
    fn first_package_wins() {
        let fixture = ModuleFixture::dxe_driver()
            .package(
                PackageBuilder::new(PKG_PATH)
                    .protocol("gFooProtocolGuid", guid!("00000001-0000-0000-0000-000000000000"))
                    .build(),
            )
            .package(
                PackageBuilder::new("OtherPkg/OtherPkg.dec")
                    .protocol("gFooProtocolGuid", guid!("00000002-0000-0000-0000-000000000000"))
                    .protocol("gBarProtocolGuid", guid!("00000003-0000-0000-0000-000000000000"))
                    .build(),
            );
        let owner = fixture.record(RecordKind::Protocol, ["gFooProtocolGuid"]);
        fixture.comment(owner, "## CONSUMES");
        fixture.record(RecordKind::Protocol, ["gBarProtocolGuid"]);

        let module = fixture.resolve().unwrap();
        let protocols = module.protocols().unwrap();
        assert_eq!(
            protocols.get("gFooProtocolGuid"),
            Some(&guid!("00000001-0000-0000-0000-000000000000"))
        );
        assert!(protocols.contains("gBarProtocolGuid"));
        assert_eq!(protocols.comments["gFooProtocolGuid"], vec!["## CONSUMES"]);
        assert!(protocols.comments["gBarProtocolGuid"].is_empty());
    }

    #[test]
    fn unresolved_names_the_packages() {
        let fixture = ModuleFixture::dxe_driver().package(PackageBuilder::new(PKG_PATH).build());
        fixture.record(RecordKind::Ppi, ["gMissingPpiGuid"]);

        let module = fixture.resolve().unwrap();
        let err = module.ppis().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnresolvedSymbol);
        assert!(err.to_string().contains(PKG_PATH));
        assert!(err.to_string().contains("gMissingPpiGuid"));
    }

    #[test]
    fn private_symbols_stay_inside_their_package() {
        let value = guid!("0000000a-0000-0000-0000-000000000000");
        let fixture = ModuleFixture::dxe_driver().package(
            PackageBuilder::new("ElsewherePkg/ElsewherePkg.dec")
                .private(SymbolKind::Guid, "gHiddenGuid", value)
                .build(),
        );
        fixture.record(RecordKind::Guid, ["gHiddenGuid"]);
        let err = fixture.resolve().unwrap().guids().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnresolvedSymbol);
    }
}
