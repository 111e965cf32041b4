//! Versioned name normalization for directory entries.
//!
//! Directory names and classification names drift apart between dataset
//! editions (typography, accents, regional reorganizations). Each edition
//! gets an ordered table of textual substitutions followed by a table of
//! whole-name renames. Adding an edition means adding tables, not branches.

use serde::Serialize;

use crate::config::{DatasetVersion, MatchingConfig};
use crate::model::MatchPolicy;

/// 2016 edition: curly apostrophes, no accent on capital I, long dash after
/// "Centre", and the level-1 spelling of Nord-Pas de Calais.
const NUTS_2016_SUBSTITUTIONS: &[(&str, &str)] = &[
    ("'", "’"),
    ("Î", "I"),
    ("Centre-", "Centre — "),
    ("Nord-Pas-de-Calais", "Nord-Pas de Calais"),
];

/// Regions merged in 2016 keep their provisional compound names in the
/// classification.
const NUTS_2016_RENAMES: &[(&str, &str)] = &[
    ("Grand Est", "ALSACE-CHAMPAGNE-ARDENNE-LORRAINE"),
    ("Hauts-de-France", "NORD-PAS DE CALAIS-PICARDIE"),
    ("Nouvelle-Aquitaine", "AQUITAINE-LIMOUSIN-POITOU-CHARENTES"),
    ("Occitanie", "LANGUEDOC-ROUSSILLON-MIDI-PYRÉNÉES"),
];

const NUTS_2013_SUBSTITUTIONS: &[(&str, &str)] = &[
    ("Île-de-France", "Île de France"),
    ("Nord-Pas-de-Calais", "Nord - Pas-de-Calais"),
];

const NUTS_2013_RENAMES: &[(&str, &str)] = &[];

/// Replace every occurrence of `from` with `to`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Substitution {
    pub from: String,
    pub to: String,
}

/// Replace the whole name `from` with `to`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rename {
    pub from: String,
    pub to: String,
}

/// A normalized directory name plus the rules that changed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized {
    pub value: String,
    pub applied: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleSet {
    pub version: DatasetVersion,
    substitutions: Vec<Substitution>,
    renames: Vec<Rename>,
}

impl RuleSet {
    pub fn builtin(version: DatasetVersion) -> Self {
        let (subs, renames) = match version {
            DatasetVersion::Nuts2013 => (NUTS_2013_SUBSTITUTIONS, NUTS_2013_RENAMES),
            DatasetVersion::Nuts2016 => (NUTS_2016_SUBSTITUTIONS, NUTS_2016_RENAMES),
        };
        Self {
            version,
            substitutions: subs
                .iter()
                .map(|(from, to)| Substitution {
                    from: from.to_string(),
                    to: to.to_string(),
                })
                .collect(),
            renames: renames
                .iter()
                .map(|(from, to)| Rename {
                    from: from.to_string(),
                    to: to.to_string(),
                })
                .collect(),
        }
    }

    /// Built-in tables for `version`, with the config's substitution table
    /// replacing the built-in one and its renames merged over the built-in ones.
    pub fn from_config(version: DatasetVersion, matching: &MatchingConfig) -> Self {
        let mut rules = Self::builtin(version);

        if let Some(ref subs) = matching.substitutions {
            rules.substitutions = subs
                .iter()
                .map(|s| Substitution {
                    from: s.from.clone(),
                    to: s.to.clone(),
                })
                .collect();
        }

        for (from, to) in &matching.region_renames {
            match rules.renames.iter_mut().find(|r| r.from == *from) {
                Some(existing) => existing.to = to.clone(),
                None => rules.renames.push(Rename {
                    from: from.clone(),
                    to: to.clone(),
                }),
            }
        }

        rules
    }

    pub fn substitutions(&self) -> &[Substitution] {
        &self.substitutions
    }

    pub fn renames(&self) -> &[Rename] {
        &self.renames
    }

    /// Normalize a directory name for comparison under `policy`.
    ///
    /// Substitutions run first, in table order. Case-insensitive policies then
    /// upper-case the name, and renames compare against upper-cased keys.
    /// The first matching rename wins.
    pub fn normalize(&self, name: &str, policy: MatchPolicy) -> Normalized {
        let mut value = name.to_string();
        let mut applied = Vec::new();

        for sub in &self.substitutions {
            if value.contains(&sub.from) {
                value = value.replace(&sub.from, &sub.to);
                applied.push(format!("{} -> {}", sub.from, sub.to));
            }
        }

        if policy.folds_case() {
            value = value.to_uppercase();
        }

        for rename in &self.renames {
            let (from, to) = if policy.folds_case() {
                (rename.from.to_uppercase(), rename.to.to_uppercase())
            } else {
                (rename.from.clone(), rename.to.clone())
            };
            if value == from {
                applied.push(format!("rename {} -> {}", rename.from, rename.to));
                value = to;
                break;
            }
        }

        Normalized { value, applied }
    }
}

/// Comparison key for a classification name. Classification names are never
/// rewritten, only case-folded when the policy asks for it.
pub fn entity_key(name: &str, policy: MatchPolicy) -> String {
    if policy.folds_case() {
        name.to_uppercase()
    } else {
        name.to_string()
    }
}
