//! Hierarchical identity and addressing.
//!
//! A root identity's address is its own id. A child's address is its
//! parent's address, a `.` separator, and the child's id:
//!
//! ```text
//! root                  7d1f...            (address = id)
//! └── child             7d1f... . 03aa...
//!     └── grandchild    7d1f... . 03aa... . c9e2...
//! ```
//!
//! Because ids are globally unique and an address is the ordered list of
//! ancestor ids, the address is fully determined by the lineage path and two
//! identities never share one. The parent link is stored by id only; an
//! identity never owns its parent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::environment::Environment;
use crate::error::{CoreError, Result};
use crate::ids::ComponentId;

/// Separator between path segments of a hierarchical address.
pub const ADDRESS_SEPARATOR: char = '.';

/// Immutable record of a component's origin, lineage and address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    id: ComponentId,
    created_at: DateTime<Utc>,
    reason: String,
    parent: Option<ComponentId>,
    /// Ancestor ids, root first.
    ancestry: Vec<ComponentId>,
    /// Creation reasons, root first, ending with this identity's own reason.
    lineage: Vec<String>,
    address: String,
    environment: Environment,
}

impl Identity {
    /// Create a root identity.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Validation` if `reason` is empty or blank.
    pub fn create_root(reason: impl Into<String>, environment: Environment) -> Result<Self> {
        let reason = validate_reason(reason.into())?;
        let id = ComponentId::generate();

        Ok(Self {
            id,
            created_at: Utc::now(),
            lineage: vec![reason.clone()],
            reason,
            parent: None,
            ancestry: Vec::new(),
            address: id.to_string(),
            environment,
        })
    }

    /// Create a child identity beneath `parent`.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Validation` if `reason` is empty or blank.
    pub fn create_child(
        reason: impl Into<String>,
        environment: Environment,
        parent: &Self,
    ) -> Result<Self> {
        let reason = validate_reason(reason.into())?;
        let id = ComponentId::generate();

        let mut ancestry = parent.ancestry.clone();
        ancestry.push(parent.id);

        let mut lineage = parent.lineage.clone();
        lineage.push(reason.clone());

        Ok(Self {
            id,
            created_at: Utc::now(),
            reason,
            parent: Some(parent.id),
            ancestry,
            lineage,
            address: format!("{}{ADDRESS_SEPARATOR}{id}", parent.address),
            environment,
        })
    }

    /// The unique id.
    #[must_use]
    pub const fn id(&self) -> ComponentId {
        self.id
    }

    /// When the identity was created.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Why the identity was created.
    #[must_use]
    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// The parent's id, if this is not a root.
    #[must_use]
    pub const fn parent_id(&self) -> Option<ComponentId> {
        self.parent
    }

    /// Whether this identity has no parent.
    #[must_use]
    pub const fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// The hierarchical address.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Ancestor ids, root first. Empty for a root.
    #[must_use]
    pub fn ancestry(&self) -> &[ComponentId] {
        &self.ancestry
    }

    /// Creation reasons from the root down to this identity.
    #[must_use]
    pub fn lineage(&self) -> &[String] {
        &self.lineage
    }

    /// Number of ancestors.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.ancestry.len()
    }

    /// The environment captured at construction.
    #[must_use]
    pub const fn environment(&self) -> &Environment {
        &self.environment
    }

    /// Short id for log context.
    #[must_use]
    pub fn short_id(&self) -> String {
        self.id.short()
    }

    /// Whether `other` is a (transitive) ancestor of this identity.
    #[must_use]
    pub fn is_descendant_of(&self, other: &Self) -> bool {
        self.ancestry.contains(&other.id)
    }

    /// Whether this identity is a (transitive) ancestor of `other`.
    #[must_use]
    pub fn is_ancestor_of(&self, other: &Self) -> bool {
        other.is_descendant_of(self)
    }
}

/// Split an address back into the id path it encodes, root first.
///
/// # Errors
///
/// Returns `CoreError::InvalidId` if any segment is not a valid id, or
/// `CoreError::Validation` for an empty address.
pub fn parse_address(address: &str) -> Result<Vec<ComponentId>> {
    if address.is_empty() {
        return Err(CoreError::validation("address", "must not be empty"));
    }
    address
        .split(ADDRESS_SEPARATOR)
        .map(|segment| segment.parse().map_err(CoreError::from))
        .collect()
}

fn validate_reason(reason: String) -> Result<String> {
    if reason.trim().is_empty() {
        return Err(CoreError::validation("reason", "must not be empty"));
    }
    Ok(reason)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn root() -> Identity {
        Identity::create_root("root", Environment::empty()).unwrap()
    }

    #[test]
    fn root_address_is_id() {
        let identity = root();
        assert!(identity.is_root());
        assert_eq!(identity.address(), identity.id().to_string());
        assert_eq!(identity.depth(), 0);
        assert!(identity.parent_id().is_none());
    }

    #[test]
    fn child_address_extends_parent() {
        let parent = root();
        let child = Identity::create_child("child", Environment::empty(), &parent).unwrap();

        assert!(!child.is_root());
        assert_eq!(child.parent_id(), Some(parent.id()));
        assert_eq!(
            child.address(),
            format!("{}.{}", parent.address(), child.id())
        );
        assert!(child.address().starts_with(parent.address()));
    }

    #[test]
    fn grandchild_lineage_and_ancestry() {
        let a = root();
        let b = Identity::create_child("b", Environment::empty(), &a).unwrap();
        let c = Identity::create_child("c", Environment::empty(), &b).unwrap();

        assert_eq!(c.ancestry(), &[a.id(), b.id()]);
        assert_eq!(c.lineage(), &["root", "b", "c"]);
        assert_eq!(c.depth(), 2);
        assert!(c.is_descendant_of(&a));
        assert!(a.is_ancestor_of(&c));
        assert!(!a.is_descendant_of(&c));
    }

    #[test]
    fn siblings_never_collide() {
        let parent = root();
        let first = Identity::create_child("x", Environment::empty(), &parent).unwrap();
        let second = Identity::create_child("x", Environment::empty(), &parent).unwrap();
        assert_ne!(first.id(), second.id());
        assert_ne!(first.address(), second.address());
        assert!(!first.is_descendant_of(&second));
    }

    #[test]
    fn empty_reason_rejected() {
        let err = Identity::create_root("", Environment::empty()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let parent = root();
        let err = Identity::create_child("   ", Environment::empty(), &parent).unwrap_err();
        assert!(matches!(err, CoreError::Validation { field: "reason", .. }));
    }

    #[test]
    fn address_parses_back_to_path() {
        let a = root();
        let b = Identity::create_child("b", Environment::empty(), &a).unwrap();
        let c = Identity::create_child("c", Environment::empty(), &b).unwrap();

        let path = parse_address(c.address()).unwrap();
        assert_eq!(path, vec![a.id(), b.id(), c.id()]);
    }

    #[test]
    fn malformed_address_rejected() {
        assert!(parse_address("").is_err());
        assert!(matches!(
            parse_address("not-an-id"),
            Err(CoreError::InvalidId(_))
        ));
    }

    #[test]
    fn environment_retained() {
        let env = Environment::from_pairs([("tier", "gold")]);
        let identity = Identity::create_root("root", env).unwrap();
        assert_eq!(identity.environment().get("tier"), Some("gold"));
    }

    #[test]
    fn serde_roundtrip() {
        let parent = root();
        let child = Identity::create_child("child", Environment::empty(), &parent).unwrap();
        let json = serde_json::to_string(&child).unwrap();
        let parsed: Identity = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, child);
    }
}
