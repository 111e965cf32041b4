use crate::error::ReconError;
use crate::model::{NameDirectoryEntry, TerritoryKind};

/// Source of name-keyed territories. Transport (HTTP, cache file, fixture)
/// is the implementor's business.
pub trait NameDirectoryService {
    /// Every territory of `kind`, in the directory's own order. That order
    /// breaks ties between entries sharing a normalized name.
    fn lookup(&self, kind: TerritoryKind) -> Result<Vec<NameDirectoryEntry>, ReconError>;
}

/// In-memory directory.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    entries: Vec<NameDirectoryEntry>,
}

impl StaticDirectory {
    pub fn new(entries: Vec<NameDirectoryEntry>) -> Self {
        Self { entries }
    }

    pub fn push(&mut self, kind: TerritoryKind, name: &str, reference: &str) {
        self.entries.push(NameDirectoryEntry {
            kind,
            name: name.to_string(),
            reference: reference.to_string(),
        });
    }
}

impl NameDirectoryService for StaticDirectory {
    fn lookup(&self, kind: TerritoryKind) -> Result<Vec<NameDirectoryEntry>, ReconError> {
        Ok(self.entries.iter().filter(|e| e.kind == kind).cloned().collect())
    }
}

impl<T: NameDirectoryService + ?Sized> NameDirectoryService for &T {
    fn lookup(&self, kind: TerritoryKind) -> Result<Vec<NameDirectoryEntry>, ReconError> {
        (**self).lookup(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_directory_filters_by_kind_in_order() {
        let mut dir = StaticDirectory::default();
        dir.push(TerritoryKind::Region, "Bretagne", "r53");
        dir.push(TerritoryKind::Departement, "Finistère", "d29");
        dir.push(TerritoryKind::Region, "Normandie", "r28");

        let regions = dir.lookup(TerritoryKind::Region).unwrap();
        let names: Vec<&str> = regions.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Bretagne", "Normandie"]);
        assert!(dir.lookup(TerritoryKind::Commune).unwrap().is_empty());
    }
}
