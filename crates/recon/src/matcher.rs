use std::collections::{BTreeMap, HashMap, HashSet};

use crate::config::MatchingConfig;
use crate::model::{EquivalenceLink, MatchPolicy, NameDirectoryEntry, RegionEntity, TerritoryKind};
use crate::normalize::{entity_key, Normalized, RuleSet};
use crate::report::ReconWarning;

/// Directory entries grouped by territory kind, each in directory order.
pub type DirectoryPools = BTreeMap<TerritoryKind, Vec<NameDirectoryEntry>>;

#[derive(Debug, Default)]
pub struct MatchOutput {
    pub links: Vec<EquivalenceLink>,
    pub warnings: Vec<ReconWarning>,
}

/// Normalized names of one pool under one policy, indexed for lookup.
struct PoolIndex {
    normalized: Vec<Normalized>,
    by_key: HashMap<String, Vec<usize>>,
}

impl PoolIndex {
    fn build(entries: &[NameDirectoryEntry], rules: &RuleSet, policy: MatchPolicy) -> Self {
        let normalized: Vec<Normalized> = entries
            .iter()
            .map(|e| rules.normalize(&e.name, policy))
            .collect();
        let mut by_key: HashMap<String, Vec<usize>> = HashMap::new();
        for (idx, n) in normalized.iter().enumerate() {
            by_key.entry(n.value.clone()).or_default().push(idx);
        }
        Self { normalized, by_key }
    }
}

/// Matches classification entities against directory entries by name.
///
/// Every match consumes both sides. Entities are visited in input order;
/// among directory entries sharing a normalized name the first one in
/// directory order is taken. Levels mapped to the same territory kind draw
/// from one shared pool.
pub struct NameMatcher<'a> {
    rules: &'a RuleSet,
    matching: &'a MatchingConfig,
}

impl<'a> NameMatcher<'a> {
    pub fn new(rules: &'a RuleSet, matching: &'a MatchingConfig) -> Self {
        Self { rules, matching }
    }

    pub fn match_entities(&self, entities: &[RegionEntity], pools: &DirectoryPools) -> MatchOutput {
        let mut out = MatchOutput::default();

        // Lookup indexes are built up front; consumption is tracked apart.
        let mut indexes: HashMap<(TerritoryKind, MatchPolicy), PoolIndex> = HashMap::new();
        for entity in entities {
            if let Some(target) = self.target_for(entity) {
                indexes.entry((target.territory, target.policy)).or_insert_with(|| {
                    PoolIndex::build(pool(pools, target.territory), self.rules, target.policy)
                });
            }
        }
        let mut consumed: HashMap<TerritoryKind, HashSet<usize>> = HashMap::new();

        for entity in entities {
            let Some(target) = self.target_for(entity) else {
                continue;
            };
            let key = entity_key(&entity.name, target.policy);
            log::debug!(
                "trying to match level {} region {} ({}) against {}",
                entity.level,
                entity.code,
                entity.name,
                target.territory
            );

            let taken = consumed.entry(target.territory).or_default();
            let hit = indexes
                .get(&(target.territory, target.policy))
                .and_then(|index| index.by_key.get(&key))
                .and_then(|candidates| candidates.iter().copied().find(|idx| !taken.contains(idx)));

            match hit {
                Some(idx) => {
                    taken.insert(idx);
                    let entry = &pool(pools, target.territory)[idx];
                    out.links.push(EquivalenceLink {
                        code: entity.code.clone(),
                        reference: entry.reference.clone(),
                        level: entity.level,
                        kind: target.territory,
                        policy: target.policy,
                        matched_name: key,
                    });
                }
                None => out.warnings.push(ReconWarning::UnmatchedEntity {
                    code: entity.code.clone(),
                    name: entity.name.clone(),
                    level: entity.level,
                    kind: target.territory,
                    policy: target.policy,
                    key,
                }),
            }
        }

        for kind in self.matching.territories() {
            let entries = pool(pools, kind);
            let taken = consumed.remove(&kind).unwrap_or_default();
            let policy = self.primary_policy(kind);
            for (idx, entry) in entries.iter().enumerate() {
                if taken.contains(&idx) {
                    continue;
                }
                let normalized = match indexes.get(&(kind, policy)) {
                    Some(index) => index.normalized[idx].clone(),
                    None => self.rules.normalize(&entry.name, policy),
                };
                out.warnings.push(ReconWarning::UnmatchedDirectoryEntry {
                    kind,
                    name: entry.name.clone(),
                    normalized: normalized.value,
                    reference: entry.reference.clone(),
                    applied_rules: normalized.applied,
                });
            }
        }

        log::info!(
            "matching: {} links, {} unmatched",
            out.links.len(),
            out.warnings.len()
        );
        out
    }

    fn target_for(&self, entity: &RegionEntity) -> Option<crate::config::PolicyTarget> {
        if !entity.code.starts_with(&self.matching.code_prefix) {
            return None;
        }
        self.matching.policy_for(entity.level)
    }

    /// Policy used to describe unmatched entries of `kind`: the first level
    /// policy drawing from it, else the fallback.
    fn primary_policy(&self, kind: TerritoryKind) -> MatchPolicy {
        self.matching
            .levels
            .iter()
            .find(|p| p.territory == kind)
            .map(|p| p.policy)
            .or_else(|| self.matching.fallback.map(|f| f.policy))
            .unwrap_or(MatchPolicy::Exact)
    }
}

fn pool(pools: &DirectoryPools, kind: TerritoryKind) -> &[NameDirectoryEntry] {
    pools.get(&kind).map(Vec::as_slice).unwrap_or(&[])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatasetVersion;

    fn entity(code: &str, name: &str, level: u32) -> RegionEntity {
        RegionEntity {
            code: code.into(),
            name: name.into(),
            lang: "en".into(),
            level,
            internal_key: code.into(),
            parent_key: None,
            line: 0,
            geometry: None,
        }
    }

    fn entry(kind: TerritoryKind, name: &str, reference: &str) -> NameDirectoryEntry {
        NameDirectoryEntry {
            kind,
            name: name.into(),
            reference: reference.into(),
        }
    }

    fn pools(entries: Vec<NameDirectoryEntry>) -> DirectoryPools {
        let mut pools = DirectoryPools::new();
        for e in entries {
            pools.entry(e.kind).or_default().push(e);
        }
        pools
    }

    #[test]
    fn departments_match_exactly() {
        let rules = RuleSet::builtin(DatasetVersion::Nuts2016);
        let matching = MatchingConfig::default();
        let matcher = NameMatcher::new(&rules, &matching);

        let entities = vec![entity("FR521", "Côtes-d’Armor", 3), entity("FR522", "finistère", 3)];
        let dir = pools(vec![
            entry(TerritoryKind::Departement, "Côtes-d'Armor", "d22"),
            entry(TerritoryKind::Departement, "Finistère", "d29"),
        ]);
        let out = matcher.match_entities(&entities, &dir);

        assert_eq!(out.links.len(), 1);
        assert_eq!(out.links[0].code, "FR521");
        assert_eq!(out.links[0].reference, "d22");
        assert_eq!(out.links[0].policy, MatchPolicy::Exact);
        assert_eq!(out.warnings.len(), 2);
        assert!(matches!(
            out.warnings[0],
            ReconWarning::UnmatchedEntity { ref code, .. } if code == "FR522"
        ));
        assert!(matches!(
            out.warnings[1],
            ReconWarning::UnmatchedDirectoryEntry { ref reference, .. } if reference == "d29"
        ));
    }

    #[test]
    fn regions_match_ignoring_case_after_rename() {
        let rules = RuleSet::builtin(DatasetVersion::Nuts2016);
        let matching = MatchingConfig::default();
        let matcher = NameMatcher::new(&rules, &matching);

        let entities = vec![entity("FRF", "ALSACE-CHAMPAGNE-ARDENNE-LORRAINE", 1)];
        let dir = pools(vec![entry(TerritoryKind::Region, "grand est", "r44")]);
        let out = matcher.match_entities(&entities, &dir);

        assert_eq!(out.links.len(), 1);
        assert_eq!(out.links[0].matched_name, "ALSACE-CHAMPAGNE-ARDENNE-LORRAINE");
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn region_entry_links_once_across_levels() {
        let rules = RuleSet::builtin(DatasetVersion::Nuts2013);
        let matching = MatchingConfig::default();
        let matcher = NameMatcher::new(&rules, &matching);

        // Level 1 and level 2 share the same name; the first in input order wins.
        let entities = vec![entity("FR1", "ÎLE DE FRANCE", 1), entity("FR10", "Île de France", 2)];
        let dir = pools(vec![entry(TerritoryKind::Region, "Île-de-France", "r11")]);
        let out = matcher.match_entities(&entities, &dir);

        assert_eq!(out.links.len(), 1);
        assert_eq!(out.links[0].code, "FR1");
        assert_eq!(out.warnings.len(), 1);
        assert!(matches!(
            out.warnings[0],
            ReconWarning::UnmatchedEntity { ref code, level: 2, .. } if code == "FR10"
        ));
    }

    #[test]
    fn duplicate_directory_names_first_seen_wins() {
        let rules = RuleSet::builtin(DatasetVersion::Nuts2016);
        let matching = MatchingConfig::default();
        let matcher = NameMatcher::new(&rules, &matching);

        let entities = vec![entity("FRX1", "Somme", 3), entity("FRX2", "Somme", 3)];
        let dir = pools(vec![
            entry(TerritoryKind::Departement, "Somme", "first"),
            entry(TerritoryKind::Departement, "Somme", "second"),
            entry(TerritoryKind::Departement, "Somme", "third"),
        ]);
        let out = matcher.match_entities(&entities, &dir);

        let refs: Vec<(&str, &str)> = out
            .links
            .iter()
            .map(|l| (l.code.as_str(), l.reference.as_str()))
            .collect();
        assert_eq!(refs, vec![("FRX1", "first"), ("FRX2", "second")]);
        assert_eq!(out.warnings.len(), 1);
        assert!(matches!(
            out.warnings[0],
            ReconWarning::UnmatchedDirectoryEntry { ref reference, .. } if reference == "third"
        ));
    }

    #[test]
    fn foreign_codes_and_unmapped_levels_are_ignored() {
        let rules = RuleSet::builtin(DatasetVersion::Nuts2016);
        let mut matching = MatchingConfig::default();
        matching.fallback = None;
        let matcher = NameMatcher::new(&rules, &matching);

        let entities = vec![
            entity("BE1", "Région de Bruxelles-Capitale", 3),
            entity("FR1", "ILE-DE-FRANCE", 1),
        ];
        let out = matcher.match_entities(&entities, &DirectoryPools::new());
        assert!(out.links.is_empty());
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn unmatched_directory_entry_reports_rules() {
        let rules = RuleSet::builtin(DatasetVersion::Nuts2016);
        let matching = MatchingConfig::default();
        let matcher = NameMatcher::new(&rules, &matching);

        let dir = pools(vec![entry(TerritoryKind::Region, "Hauts-de-France", "r32")]);
        let out = matcher.match_entities(&[], &dir);
        match &out.warnings[..] {
            [ReconWarning::UnmatchedDirectoryEntry { normalized, applied_rules, .. }] => {
                assert_eq!(normalized, "NORD-PAS DE CALAIS-PICARDIE");
                assert_eq!(applied_rules.len(), 1);
            }
            other => panic!("unexpected warnings: {other:?}"),
        }
    }
}
