// ABOUTME: PreferenceModel: per content type, the ordered list of strategy ids to try.
// ABOUTME: Built once from a declarative JSON source honoring declaration order and 1-based overrides.

//! Strategy preference lists.
//!
//! The source declares, for each content type, the strategies to try. Entries
//! without an `order` are appended in declaration order; an entry with
//! `order = p` is inserted at index `p - 1` of the list built so far, shifting
//! later entries right. When an earlier entry already claimed the same
//! position, the first one keeps the slot and the newcomer lands right after
//! it. That is list insertion, not replacement.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::document::normalize_content_type;
use crate::error::DispatchError;
use crate::result::StrategyId;

/// Content type key used when no specific group matches.
pub const WILDCARD_CONTENT_TYPE: &str = "*";

/// Embedded default preference source.
const BUILTIN_PREFERENCES_JSON: &str = include_str!("../data/preferences.json");

pub type ContentTypeKey = String;

/// An explicit position as written in the source: a number or a string.
///
/// Any other JSON value (a float, a bool, an array) lands in `Other` so a
/// single bad entry never fails the whole source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawOrder {
    Number(i64),
    Text(String),
    Other(serde_json::Value),
}

impl RawOrder {
    /// The 1-based position, or `None` if the value is malformed or below 1.
    pub fn position(&self) -> Option<usize> {
        let n = match self {
            RawOrder::Number(n) => *n,
            RawOrder::Text(s) => s.trim().parse::<i64>().ok()?,
            RawOrder::Other(_) => return None,
        };
        (n >= 1).then_some(n as usize)
    }
}

/// One strategy reference inside a content type group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyDecl {
    pub id: StrategyId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<RawOrder>,
}

impl StrategyDecl {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            order: None,
        }
    }

    pub fn at(id: impl Into<String>, position: i64) -> Self {
        Self {
            id: id.into(),
            order: Some(RawOrder::Number(position)),
        }
    }
}

/// A declared content type and its strategies, before ordering is applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentTypeGroup {
    pub content_type: ContentTypeKey,
    #[serde(default)]
    pub strategies: Vec<StrategyDecl>,
}

/// The parsed declarative source: groups in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PreferenceSource {
    pub groups: Vec<ContentTypeGroup>,
}

impl PreferenceSource {
    pub fn from_json(json: &str) -> Result<Self, DispatchError> {
        serde_json::from_str(json).map_err(|e| {
            error!("unable to parse preference source: {}", e);
            DispatchError::configuration_from(e)
        })
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, DispatchError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|e| {
            error!("unable to read preference source {}: {}", path.display(), e);
            DispatchError::configuration_from(e)
        })?;
        Self::from_json(&raw)
    }

    pub fn push(&mut self, content_type: impl Into<String>, strategies: Vec<StrategyDecl>) {
        self.groups.push(ContentTypeGroup {
            content_type: content_type.into(),
            strategies,
        });
    }
}

/// The ordered strategy list resolved for one content type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreferenceEntry {
    pub content_type: ContentTypeKey,
    pub strategies: Vec<StrategyId>,
}

/// Immutable mapping from content type to ordered strategy ids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreferenceModel {
    entries: HashMap<ContentTypeKey, PreferenceEntry>,
    declared: Vec<ContentTypeKey>,
}

impl PreferenceModel {
    /// Builds the model. Problems with individual groups are logged and the
    /// group is left out; the build itself never fails.
    pub fn build(source: &PreferenceSource) -> Self {
        let mut model = PreferenceModel::default();

        for group in &source.groups {
            let key = normalize_content_type(&group.content_type);
            if key.is_empty() {
                error!(
                    "preference group with empty content type ({} strategies), skipping",
                    group.strategies.len()
                );
                continue;
            }
            if group.strategies.is_empty() {
                error!("no strategies defined for content type: {}, continuing", key);
                continue;
            }

            let strategies = order_strategies(&key, &group.strategies);
            debug!("content type {} -> {:?}", key, strategies);

            let entry = PreferenceEntry {
                content_type: key.clone(),
                strategies,
            };
            if model.entries.insert(key.clone(), entry).is_some() {
                warn!("content type {} declared twice; later declaration wins", key);
            } else {
                model.declared.push(key);
            }
        }
        model
    }

    /// Builds from already-ordered entries, bypassing override handling.
    pub fn from_entries(entries: impl IntoIterator<Item = PreferenceEntry>) -> Self {
        let mut source = PreferenceSource::default();
        for entry in entries {
            source.push(
                entry.content_type,
                entry.strategies.into_iter().map(StrategyDecl::new).collect(),
            );
        }
        Self::build(&source)
    }

    /// Ordered strategy ids for a content type.
    ///
    /// The key is normalized first. Unknown content types fall back to the
    /// `"*"` group when one is declared, otherwise yield an empty slice.
    pub fn lookup(&self, content_type: &str) -> &[StrategyId] {
        let key = normalize_content_type(content_type);
        self.entries
            .get(&key)
            .or_else(|| self.entries.get(WILDCARD_CONTENT_TYPE))
            .map(|e| e.strategies.as_slice())
            .unwrap_or(&[])
    }

    /// Declared content types in declaration order.
    pub fn content_types(&self) -> &[ContentTypeKey] {
        &self.declared
    }

    /// Entries in declaration order.
    pub fn entries(&self) -> impl Iterator<Item = &PreferenceEntry> {
        self.declared.iter().filter_map(|k| self.entries.get(k))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn order_strategies(content_type: &str, decls: &[StrategyDecl]) -> Vec<StrategyId> {
    // Each slot remembers the position it claimed, if any.
    let mut list: Vec<(StrategyId, Option<usize>)> = Vec::with_capacity(decls.len());
    for decl in decls {
        let position = match &decl.order {
            None => None,
            Some(raw) => {
                let pos = raw.position();
                if pos.is_none() {
                    warn!(
                        "malformed order {:?} for {} under {}, appending",
                        raw, decl.id, content_type
                    );
                }
                pos
            }
        };

        match position {
            Some(p) if p - 1 <= list.len() => {
                let mut index = p - 1;
                while index < list.len() && list[index].1 == Some(p) {
                    index += 1;
                }
                list.insert(index, (decl.id.clone(), Some(p)));
            }
            Some(p) => {
                warn!(
                    "order {} for {} under {} is past the end ({} entries), appending",
                    p,
                    decl.id,
                    content_type,
                    list.len()
                );
                list.push((decl.id.clone(), None));
            }
            None => list.push((decl.id.clone(), None)),
        }
    }
    list.into_iter().map(|(id, _)| id).collect()
}

/// Loads the builtin preference model from embedded JSON.
pub fn load_builtin_preferences() -> Result<PreferenceModel, DispatchError> {
    let source = PreferenceSource::from_json(BUILTIN_PREFERENCES_JSON)?;
    Ok(PreferenceModel::build(&source))
}
