//! The virtual `permissions` field.
//!
//! Entities expose capability predicates through [`Capabilities`]; the
//! synthesizer only reports their outcome and never enforces anything.

use std::collections::BTreeSet;

use crate::entity::Entity;
use crate::error::EntityAccessError;
use crate::types::{Capability, Principal, Request};

/// Capability predicates an entity answers for the acting principal.
pub trait Capabilities {
    fn can_retrieve(&self, principal: &Principal, request: &Request) -> Result<bool, EntityAccessError>;

    fn can_update(&self, principal: &Principal, request: &Request) -> Result<bool, EntityAccessError>;

    fn can_destroy(&self, principal: &Principal, request: &Request) -> Result<bool, EntityAccessError>;

    /// Dispatch to the predicate for `capability`.
    fn check(
        &self,
        capability: Capability,
        principal: &Principal,
        request: &Request,
    ) -> Result<bool, EntityAccessError> {
        match capability {
            Capability::Destroy => self.can_destroy(principal, request),
            Capability::Retrieve => self.can_retrieve(principal, request),
            Capability::Update => self.can_update(principal, request),
        }
    }
}

/// A fixed set of granted capabilities, independent of principal and request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Grants(BTreeSet<Capability>);

impl Grants {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn all() -> Self {
        Self(Capability::ALL.into_iter().collect())
    }

    pub fn allows(&self, capability: Capability) -> bool {
        self.0.contains(&capability)
    }
}

impl FromIterator<Capability> for Grants {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Capabilities for Grants {
    fn can_retrieve(&self, _: &Principal, _: &Request) -> Result<bool, EntityAccessError> {
        Ok(self.allows(Capability::Retrieve))
    }

    fn can_update(&self, _: &Principal, _: &Request) -> Result<bool, EntityAccessError> {
        Ok(self.allows(Capability::Update))
    }

    fn can_destroy(&self, _: &Principal, _: &Request) -> Result<bool, EntityAccessError> {
        Ok(self.allows(Capability::Destroy))
    }
}

/// Compute the value of the `permissions` field.
///
/// Predicates run in [`Capability::ALL`] order (`destroy`, `retrieve`,
/// `update`); a capability is listed iff its predicate returns `true`.
///
/// # Errors
///
/// Returns `EntityAccessError::NoCapabilities` when the entity exposes no
/// predicates, or the first error a predicate raises.
pub fn synthesize(entity: &dyn Entity, request: &Request) -> Result<Vec<Capability>, EntityAccessError> {
    let capabilities = entity
        .capabilities()
        .ok_or(EntityAccessError::NoCapabilities)?;
    let principal = request.acting_principal();

    let mut granted = Vec::with_capacity(Capability::ALL.len());
    for capability in Capability::ALL {
        if capabilities.check(capability, principal, request)? {
            granted.push(capability);
        }
    }

    tracing::trace!(principal = ?principal.id, ?granted, "synthesized permissions");
    Ok(granted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::WithCapabilities;
    use serde_json::json;
    use std::cell::Cell;

    struct OwnerOnly {
        owner: &'static str,
        calls: Cell<usize>,
    }

    impl Capabilities for OwnerOnly {
        fn can_retrieve(&self, _: &Principal, _: &Request) -> Result<bool, EntityAccessError> {
            self.calls.set(self.calls.get() + 1);
            Ok(true)
        }

        fn can_update(&self, principal: &Principal, _: &Request) -> Result<bool, EntityAccessError> {
            self.calls.set(self.calls.get() + 1);
            Ok(principal.id.as_deref() == Some(self.owner))
        }

        fn can_destroy(&self, principal: &Principal, _: &Request) -> Result<bool, EntityAccessError> {
            self.calls.set(self.calls.get() + 1);
            Ok(principal.id.as_deref() == Some(self.owner))
        }
    }

    struct Failing;

    impl Capabilities for Failing {
        fn can_retrieve(&self, _: &Principal, _: &Request) -> Result<bool, EntityAccessError> {
            Ok(true)
        }

        fn can_update(&self, _: &Principal, _: &Request) -> Result<bool, EntityAccessError> {
            Err(EntityAccessError::predicate(Capability::Update, "lookup failed"))
        }

        fn can_destroy(&self, _: &Principal, _: &Request) -> Result<bool, EntityAccessError> {
            Ok(false)
        }
    }

    fn owned_by_alice() -> WithCapabilities<serde_json::Value, OwnerOnly> {
        WithCapabilities::new(
            json!({"id": 1}),
            OwnerOnly {
                owner: "alice",
                calls: Cell::new(0),
            },
        )
    }

    #[test]
    fn grants_listed_in_fixed_order() {
        let entity = WithCapabilities::new(
            json!({}),
            [Capability::Retrieve, Capability::Destroy].into_iter().collect::<Grants>(),
        );
        let got = synthesize(&entity, &Request::get()).unwrap();
        assert_eq!(got, [Capability::Destroy, Capability::Retrieve]);
    }

    #[test]
    fn depends_on_principal() {
        let entity = owned_by_alice();
        let anon = synthesize(&entity, &Request::get()).unwrap();
        assert_eq!(anon, [Capability::Retrieve]);

        let req = Request::get().principal(Principal::new("alice"));
        let owner = synthesize(&entity, &req).unwrap();
        assert_eq!(owner, Capability::ALL);
    }

    #[test]
    fn deterministic_across_calls() {
        let entity = owned_by_alice();
        let req = Request::get().principal(Principal::new("alice"));
        let first = synthesize(&entity, &req).unwrap();
        let second = synthesize(&entity, &req).unwrap();
        assert_eq!(first, second);
        assert_eq!(entity.capabilities.calls.get(), 6);
    }

    #[test]
    fn predicate_errors_propagate() {
        let entity = WithCapabilities::new(json!({}), Failing);
        let err = synthesize(&entity, &Request::get()).unwrap_err();
        assert_eq!(
            err,
            EntityAccessError::predicate(Capability::Update, "lookup failed")
        );
    }

    #[test]
    fn entity_without_capabilities_errors() {
        let err = synthesize(&json!({"id": 1}), &Request::get()).unwrap_err();
        assert_eq!(err, EntityAccessError::NoCapabilities);
    }

    #[test]
    fn grants_all_and_none() {
        let req = Request::get();
        let all = WithCapabilities::new(json!({}), Grants::all());
        assert_eq!(synthesize(&all, &req).unwrap().len(), 3);
        let none = WithCapabilities::new(json!({}), Grants::none());
        assert!(synthesize(&none, &req).unwrap().is_empty());
    }
}
