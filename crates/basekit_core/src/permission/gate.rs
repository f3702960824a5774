//! Ordered, per-action permission evaluation.
//!
//! # Invariants
//! - Checks for an action run in registration order.
//! - Evaluation is conjunctive and stops at the first denial.
//! - An action without checks is allowed.

use crate::action::Action;
use crate::context::RequestContext;
use crate::error::{CrudError, CrudResult};
use crate::permission::checks::PermissionCheck;
use log::warn;
use std::collections::BTreeMap;
use std::rc::Rc;

/// Permission checks keyed by action.
#[derive(Default, Clone)]
pub struct PermissionGate {
    checks: BTreeMap<Action, Vec<Rc<dyn PermissionCheck>>>,
}

impl PermissionGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a check for one action.
    pub fn require(mut self, action: Action, check: impl PermissionCheck + 'static) -> Self {
        self.checks.entry(action).or_default().push(Rc::new(check));
        self
    }

    /// Appends one shared check for every action.
    pub fn require_all(mut self, check: impl PermissionCheck + 'static) -> Self {
        let shared: Rc<dyn PermissionCheck> = Rc::new(check);
        for action in Action::ALL {
            self.checks
                .entry(action)
                .or_default()
                .push(Rc::clone(&shared));
        }
        self
    }

    pub fn checks_for(&self, action: Action) -> &[Rc<dyn PermissionCheck>] {
        self.checks
            .get(&action)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Fails with `CrudError::Permission` carrying the first denying
    /// check's message.
    pub fn authorize(&self, action: Action, request: &RequestContext) -> CrudResult<()> {
        let actor = request.actor.as_ref();
        for check in self.checks_for(action) {
            if !check.has_permission(actor, request, action) {
                warn!(
                    "event=permission_denied module=permission status=error action={} check={} actor={}",
                    action,
                    check.name(),
                    actor.map_or("anonymous", |actor| actor.id.as_str())
                );
                return Err(CrudError::Permission {
                    check: check.name().to_string(),
                    message: check.message().to_string(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::PermissionGate;
    use crate::action::Action;
    use crate::context::RequestContext;
    use crate::error::CrudError;
    use crate::permission::checks::{DenyAll, IsPrivileged};

    #[test]
    fn actions_without_checks_are_allowed() {
        let gate = PermissionGate::new().require(Action::Delete, DenyAll);
        assert!(gate.authorize(Action::List, &RequestContext::anonymous()).is_ok());
        assert!(gate.checks_for(Action::Retrieve).is_empty());
    }

    #[test]
    fn denial_carries_check_message() {
        let gate = PermissionGate::new().require_all(IsPrivileged);
        let err = gate
            .authorize(Action::Update, &RequestContext::anonymous())
            .expect_err("anonymous is not privileged");
        match err {
            CrudError::Permission { check, message } => {
                assert_eq!(check, "is_privileged");
                assert_eq!(message, "Only administrators can perform this action");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(gate.checks_for(Action::List).len(), 1);
    }
}
