//! Schema canonicalizer: maps both service dialects of the taxon-history
//! payload onto a shared vocabulary so a textual diff only shows true data
//! changes.
//!
//! The dialect differences are a small fixed table of field drops and
//! renames. The table is declarative ([`SchemaMap`]) rather than inline
//! conditionals so it stays independently testable and easy to extend.
//! Canonicalization is idempotent: applying it twice is a no-op.

use serde_json::Value;

/// Declarative field-mapping table applied during a single recursive descent.
///
/// All matching is case-sensitive. `scoped_drops` entries apply to keys found
/// anywhere under a top-level key path beginning with the named head.
#[derive(Debug)]
pub struct SchemaMap {
    /// Dropped only when found at the document root.
    pub root_drops: &'static [&'static str],
    /// Dropped wherever they occur.
    pub drop_keys: &'static [&'static str],
    /// (path head, key) pairs dropped under that path prefix.
    pub scoped_drops: &'static [(&'static str, &'static str)],
    /// Dialect spelling -> shared spelling, applied while descending.
    pub renames: &'static [(&'static str, &'static str)],
}

/// Mapping for the taxon-history payload family.
///
/// Drops one dialect's tree/selection bookkeeping fields and the other's
/// visibility/previous-lineage fields, and renames the divergent spellings
/// onto the shared vocabulary.
pub const TAXON_HISTORY: SchemaMap = SchemaMap {
    root_drops: &["selectedTaxon"],
    drop_keys: &[
        "isCurrent",
        "isVisible",
        "isSelected",
        "prevLineageRanks",
        "prevLineageNames",
        "previousLineage",
        "rankName",
    ],
    scoped_drops: &[("releases", "treeID"), ("taxa", "year")],
    renames: &[
        ("lineageNames", "lineage"),
        ("mslReleaseNum", "mslReleaseNumber"),
        ("prevNames", "previousNames"),
    ],
};

/// Canonicalize a parsed payload under the given mapping table.
pub fn canonicalize(value: Value, map: &SchemaMap) -> Value {
    descend(value, map, &mut Vec::new())
}

fn descend(value: Value, map: &SchemaMap, path: &mut Vec<String>) -> Value {
    match value {
        Value::Object(fields) => {
            let mut out = serde_json::Map::with_capacity(fields.len());
            for (key, val) in fields {
                if path.is_empty() && map.root_drops.contains(&key.as_str()) {
                    continue;
                }
                if map.drop_keys.contains(&key.as_str()) {
                    continue;
                }
                if let Some(head) = path.first()
                    && map
                        .scoped_drops
                        .iter()
                        .any(|(scope, k)| scope == head && *k == key)
                {
                    continue;
                }
                let renamed = map
                    .renames
                    .iter()
                    .find(|(from, _)| *from == key)
                    .map_or(key, |(_, to)| (*to).to_string());
                path.push(renamed.clone());
                let val = descend(val, map, path);
                path.pop();
                out.insert(renamed, val);
            }
            Value::Object(out)
        }
        Value::Array(items) => {
            // List elements inherit the key path of the list itself, so a
            // scoped drop on `releases` reaches into `releases[i]`.
            let elem = path.last().cloned().unwrap_or_default();
            path.push(elem);
            let items = items
                .into_iter()
                .map(|item| descend(item, map, path))
                .collect();
            path.pop();
            Value::Array(items)
        }
        scalar => scalar,
    }
}
