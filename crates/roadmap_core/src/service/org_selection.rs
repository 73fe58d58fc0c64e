//! Organisation lookup selection submitted by the org picker widget.
//!
//! The picker posts three hidden fields:
//! - `org_id`: JSON object of the chosen search hit (or a bare numeric id);
//! - `org_name`: the text shown in the picker;
//! - `org_crosswalk`: JSON array of every hit offered to the user.
//!
//! # Invariants
//! - A selection only yields identifier candidates for schemes that exist.
//! - Blank identifier values are dropped.

use crate::model::identifier::{Identifier, IdentifierScheme};
use crate::model::org::OrgId;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Parsed org picker choice.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrgSelection {
    /// Local organisation id when the hit came from local search.
    pub id: Option<OrgId>,
    pub name: String,
    /// Remaining hit attributes as text, keyed by attribute name.
    pub attributes: BTreeMap<String, String>,
}

impl OrgSelection {
    /// Builds a selection from the picker's hidden fields.
    ///
    /// Returns `None` when nothing usable was chosen.
    pub fn from_form(
        org_id: Option<&str>,
        org_name: Option<&str>,
        org_crosswalk: Option<&str>,
    ) -> Option<Self> {
        let org_name = org_name.map(str::trim).filter(|name| !name.is_empty());

        if let Some(raw) = org_id.map(str::trim).filter(|raw| !raw.is_empty()) {
            if let Ok(id) = raw.parse::<OrgId>() {
                return Some(Self {
                    id: Some(id),
                    name: org_name.unwrap_or_default().to_string(),
                    attributes: BTreeMap::new(),
                });
            }
            if let Ok(Value::Object(hit)) = serde_json::from_str::<Value>(raw) {
                return Some(Self::from_hit(&hit, org_name));
            }
        }

        let name = org_name?;
        let from_crosswalk = org_crosswalk
            .and_then(|raw| serde_json::from_str::<Vec<Value>>(raw).ok())
            .and_then(|hits| {
                hits.into_iter().find_map(|hit| match hit {
                    Value::Object(map)
                        if map
                            .get("name")
                            .and_then(Value::as_str)
                            .is_some_and(|candidate| candidate.eq_ignore_ascii_case(name)) =>
                    {
                        Some(map)
                    }
                    _ => None,
                })
            });

        Some(match from_crosswalk {
            Some(hit) => Self::from_hit(&hit, Some(name)),
            None => Self {
                id: None,
                name: name.to_string(),
                attributes: BTreeMap::new(),
            },
        })
    }

    fn from_hit(hit: &Map<String, Value>, fallback_name: Option<&str>) -> Self {
        let id = hit.get("id").and_then(|value| match value {
            Value::Number(number) => number.as_i64(),
            Value::String(text) => text.trim().parse::<OrgId>().ok(),
            _ => None,
        });
        let name = hit
            .get("name")
            .and_then(Value::as_str)
            .or(fallback_name)
            .unwrap_or_default()
            .trim()
            .to_string();
        let attributes = hit
            .iter()
            .filter(|(key, _)| key.as_str() != "id" && key.as_str() != "name")
            .filter_map(|(key, value)| {
                let text = match value {
                    Value::String(text) => text.trim().to_string(),
                    Value::Number(number) => number.to_string(),
                    _ => return None,
                };
                Some((key.clone(), text))
            })
            .collect();

        Self {
            id,
            name,
            attributes,
        }
    }

    /// Identifier proposals carried by the hit, one per known scheme.
    pub fn identifiers_for(&self, schemes: &[IdentifierScheme]) -> Vec<Identifier> {
        schemes
            .iter()
            .filter_map(|scheme| {
                self.attributes
                    .iter()
                    .find(|(key, _)| key.eq_ignore_ascii_case(&scheme.name))
                    .map(|(_, value)| value)
                    .filter(|value| !value.is_empty())
                    .map(|value| Identifier::proposed(scheme.id, value.as_str()))
            })
            .collect()
    }
}
