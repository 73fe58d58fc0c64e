//! Organisation identifier reconciliation.
//!
//! # Responsibility
//! - Decide whether a candidate identifier creates, replaces, destroys or
//!   leaves alone the identifier an organisation holds for that scheme.
//! - Express the decision as a value (`IdentifierAction`) and as a storage
//!   diff (`IdentifierChangeSet`) so persistence can happen in one save.
//!
//! # Invariants
//! - At most one identifier per scheme after every call.
//! - Reconciling scheme S never touches identifiers of any other scheme.
//! - Reconciling the same `(scheme, value)` twice equals reconciling it once.
//! - Functions here perform no I/O.

use crate::model::identifier::{Identifier, IdentifierId};
use crate::model::org::Org;

/// Outcome of reconciling one candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentifierAction {
    /// Stored identifier was blanked out and is removed.
    Destroy(IdentifierId),
    /// Held identifier for the scheme is swapped for a new value.
    Replace {
        previous: Identifier,
        identifier: Identifier,
    },
    /// Scheme had no identifier; the candidate is attached.
    Create(Identifier),
    /// Held identifier already carries the candidate's value.
    Unchanged,
    /// Blank proposal, stale blanked row, or malformed input.
    Ignored,
}

impl IdentifierAction {
    /// Stable label used in log events.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Destroy(_) => "destroy",
            Self::Replace { .. } => "replace",
            Self::Create(_) => "create",
            Self::Unchanged => "unchanged",
            Self::Ignored => "ignored",
        }
    }

    pub fn is_noop(&self) -> bool {
        matches!(self, Self::Unchanged | Self::Ignored)
    }
}

/// Next aggregate value plus the action that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled {
    pub org: Org,
    pub action: IdentifierAction,
}

/// Decides what `candidate` means for the identifiers in `held`.
///
/// Decision order:
/// 1. persisted and blank: destroy the matching held row (same id and scheme);
/// 2. non-blank: replace a held identifier with a different value, create
///    when the scheme is free, leave an identical value alone;
/// 3. new and blank: ignore.
pub fn plan(held: &[Identifier], candidate: &Identifier) -> IdentifierAction {
    if candidate.is_blank() {
        if !candidate.is_persisted() {
            return IdentifierAction::Ignored;
        }
        return held
            .iter()
            .find(|current| current.id == candidate.id && current.scheme_id == candidate.scheme_id)
            .and_then(|current| current.id)
            .map_or(IdentifierAction::Ignored, IdentifierAction::Destroy);
    }

    let value = candidate.value.trim();
    let identifier = Identifier::proposed(candidate.scheme_id, value);
    match held
        .iter()
        .find(|current| current.scheme_id == candidate.scheme_id)
    {
        Some(current) if current.value == value => IdentifierAction::Unchanged,
        Some(current) => IdentifierAction::Replace {
            previous: current.clone(),
            identifier,
        },
        None => IdentifierAction::Create(identifier),
    }
}

/// Reconciles one candidate against `org` and returns the next aggregate.
pub fn reconcile(mut org: Org, candidate: &Identifier) -> Reconciled {
    let action = plan(&org.identifiers, candidate);
    apply(&mut org.identifiers, &action);
    Reconciled { org, action }
}

/// Folds a batch of candidates through [`reconcile`] in order.
pub fn reconcile_all(org: Org, candidates: &[Identifier]) -> (Org, Vec<IdentifierAction>) {
    candidates
        .iter()
        .fold((org, Vec::new()), |(org, mut actions), candidate| {
            let reconciled = reconcile(org, candidate);
            actions.push(reconciled.action);
            (reconciled.org, actions)
        })
}

fn apply(held: &mut Vec<Identifier>, action: &IdentifierAction) {
    match action {
        IdentifierAction::Destroy(id) => held.retain(|current| current.id != Some(*id)),
        IdentifierAction::Replace { identifier, .. } => {
            held.retain(|current| current.scheme_id != identifier.scheme_id);
            held.push(identifier.clone());
        }
        IdentifierAction::Create(identifier) => held.push(identifier.clone()),
        IdentifierAction::Unchanged | IdentifierAction::Ignored => {}
    }
}

/// Storage diff between two identifier collections of one organisation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentifierChangeSet {
    /// Stored rows to delete. Applied before `added`.
    pub removed: Vec<IdentifierId>,
    /// New rows to insert.
    pub added: Vec<Identifier>,
}

impl IdentifierChangeSet {
    pub fn between(before: &[Identifier], after: &[Identifier]) -> Self {
        let removed = before
            .iter()
            .filter_map(|identifier| identifier.id)
            .filter(|id| !after.iter().any(|current| current.id == Some(*id)))
            .collect();
        let added = after
            .iter()
            .filter(|identifier| !identifier.is_persisted())
            .cloned()
            .collect();
        Self { removed, added }
    }

    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.added.is_empty()
    }
}
