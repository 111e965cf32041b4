use std::collections::HashMap;

use serde::Serialize;

use crate::code_table::CodeTable;
use crate::model::HierarchyRelation;
use crate::report::{ReconWarning, ReconciliationReport};

/// Parent/child relations between classification entities.
///
/// Built once from a [`CodeTable`]. Each child has at most one parent and
/// the relation set never contains a cycle.
#[derive(Debug, Clone, Default, Serialize)]
pub struct HierarchyGraph {
    relations: Vec<HierarchyRelation>,
    #[serde(skip)]
    parent: HashMap<String, String>,
    #[serde(skip)]
    children: HashMap<String, Vec<String>>,
}

impl HierarchyGraph {
    /// Resolve every entity's parent internal key, in input order.
    ///
    /// Unresolvable parents and would-be cycles are reported and skipped.
    /// A level jump other than +1 is reported but the relation is kept.
    pub fn build(table: &CodeTable, report: &mut ReconciliationReport) -> Self {
        let mut graph = HierarchyGraph::default();

        for entity in table.entities() {
            let Some(ref parent_key) = entity.parent_key else {
                continue;
            };

            let Some(parent_code) = table.resolve_internal_key(parent_key) else {
                report.record(ReconWarning::UnresolvedParent {
                    code: entity.code.clone(),
                    parent_key: parent_key.clone(),
                });
                continue;
            };

            if parent_code == entity.code || graph.is_ancestor(&entity.code, parent_code) {
                report.record(ReconWarning::HierarchyCycle {
                    code: entity.code.clone(),
                    parent: parent_code.to_string(),
                });
                continue;
            }

            // Resolved keys always point at a code present in the table.
            if let Some(parent) = table.get(parent_code) {
                if parent.level.checked_add(1) != Some(entity.level) {
                    report.record(ReconWarning::LevelInconsistency {
                        parent: parent.code.clone(),
                        child: entity.code.clone(),
                        parent_level: parent.level,
                        child_level: entity.level,
                    });
                }
            }

            graph.insert(parent_code, &entity.code);
        }

        log::info!("hierarchy: {} relations", graph.relations.len());
        graph
    }

    fn insert(&mut self, parent: &str, child: &str) {
        self.parent.insert(child.to_string(), parent.to_string());
        self.children
            .entry(parent.to_string())
            .or_default()
            .push(child.to_string());
        self.relations.push(HierarchyRelation {
            parent: parent.to_string(),
            child: child.to_string(),
        });
    }

    /// True when `candidate` is `code` itself or one of its ancestors.
    fn is_ancestor(&self, candidate: &str, code: &str) -> bool {
        let mut current = Some(code);
        while let Some(c) = current {
            if c == candidate {
                return true;
            }
            current = self.parent_of(c);
        }
        false
    }

    /// Relations in creation order.
    pub fn relations(&self) -> &[HierarchyRelation] {
        &self.relations
    }

    pub fn len(&self) -> usize {
        self.relations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relations.is_empty()
    }

    pub fn parent_of(&self, code: &str) -> Option<&str> {
        self.parent.get(code).map(String::as_str)
    }

    /// Children in input order. Empty for leaves and unknown codes.
    pub fn children_of(&self, code: &str) -> &[String] {
        self.children.get(code).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Ancestors from the direct parent up to the root.
    pub fn ancestors(&self, code: &str) -> Vec<&str> {
        let mut out = Vec::new();
        let mut current = self.parent_of(code);
        while let Some(c) = current {
            out.push(c);
            current = self.parent_of(c);
        }
        out
    }

    /// Codes of the table's entities without a parent, in input order.
    pub fn roots<'a>(&self, table: &'a CodeTable) -> Vec<&'a str> {
        table
            .entities()
            .iter()
            .filter(|e| !self.parent.contains_key(&e.code))
            .map(|e| e.code.as_str())
            .collect()
    }
}
