//! Capability checks evaluated before an action runs.

use crate::action::Action;
use crate::context::{Actor, RequestContext};
use uuid::Uuid;

/// Actor attribute marking privileged actors.
pub const PRIVILEGED_ATTRIBUTE: &str = "is_admin";
/// Actor attribute marking active actors.
pub const ACTIVE_ATTRIBUTE: &str = "is_active";
/// Path parameter holding the target resource id.
pub const RESOURCE_ID_PARAM: &str = "id";

/// Named boolean predicate over actor, request and action.
///
/// Checks are stateless; absent actors are passed as `None`.
pub trait PermissionCheck {
    /// Stable name used in logs.
    fn name(&self) -> &str;

    /// Message returned to the caller on denial.
    fn message(&self) -> &str;

    fn has_permission(&self, actor: Option<&Actor>, request: &RequestContext, action: Action) -> bool;
}

/// Always grants.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl PermissionCheck for AllowAll {
    fn name(&self) -> &str {
        "allow_all"
    }

    fn message(&self) -> &str {
        "Permission granted"
    }

    fn has_permission(&self, _actor: Option<&Actor>, _request: &RequestContext, _action: Action) -> bool {
        true
    }
}

/// Always denies.
#[derive(Debug, Clone, Copy, Default)]
pub struct DenyAll;

impl PermissionCheck for DenyAll {
    fn name(&self) -> &str {
        "deny_all"
    }

    fn message(&self) -> &str {
        "Permission denied"
    }

    fn has_permission(&self, _actor: Option<&Actor>, _request: &RequestContext, _action: Action) -> bool {
        false
    }
}

/// Grants privileged actors only.
#[derive(Debug, Clone, Copy, Default)]
pub struct IsPrivileged;

impl PermissionCheck for IsPrivileged {
    fn name(&self) -> &str {
        "is_privileged"
    }

    fn message(&self) -> &str {
        "Only administrators can perform this action"
    }

    fn has_permission(&self, actor: Option<&Actor>, _request: &RequestContext, _action: Action) -> bool {
        actor.is_some_and(|actor| actor.flag(PRIVILEGED_ATTRIBUTE))
    }
}

/// Grants active actors only.
#[derive(Debug, Clone, Copy, Default)]
pub struct IsActive;

impl PermissionCheck for IsActive {
    fn name(&self) -> &str {
        "is_active"
    }

    fn message(&self) -> &str {
        "Inactive users cannot perform this action"
    }

    fn has_permission(&self, actor: Option<&Actor>, _request: &RequestContext, _action: Action) -> bool {
        actor.is_some_and(|actor| actor.flag(ACTIVE_ATTRIBUTE))
    }
}

/// Grants the actor whose id equals the request's resource id, or any
/// privileged actor.
#[derive(Debug, Clone)]
pub struct IsOwnerOrPrivileged {
    param: String,
}

impl Default for IsOwnerOrPrivileged {
    fn default() -> Self {
        Self {
            param: RESOURCE_ID_PARAM.to_string(),
        }
    }
}

impl IsOwnerOrPrivileged {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the resource id from another path parameter.
    pub fn with_param(param: impl Into<String>) -> Self {
        Self {
            param: param.into(),
        }
    }
}

impl PermissionCheck for IsOwnerOrPrivileged {
    fn name(&self) -> &str {
        "is_owner_or_privileged"
    }

    fn message(&self) -> &str {
        "You can only access your own resource"
    }

    fn has_permission(&self, actor: Option<&Actor>, request: &RequestContext, _action: Action) -> bool {
        let Some(actor) = actor else {
            return false;
        };
        if actor.flag(PRIVILEGED_ATTRIBUTE) {
            return true;
        }
        request
            .path_param(&self.param)
            .is_some_and(|id| same_identity(id, &actor.id))
    }
}

/// UUIDs compare by value; any other id must match exactly.
fn same_identity(resource_id: &str, actor_id: &str) -> bool {
    match (Uuid::parse_str(resource_id), Uuid::parse_str(actor_id)) {
        (Ok(resource), Ok(actor)) => resource == actor,
        _ => resource_id == actor_id,
    }
}

type Predicate = dyn Fn(Option<&Actor>, &RequestContext, Action) -> bool;

/// Ad-hoc check backed by a closure.
pub struct FnCheck {
    name: String,
    message: String,
    predicate: Box<Predicate>,
}

impl FnCheck {
    pub fn new<F>(name: impl Into<String>, message: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(Option<&Actor>, &RequestContext, Action) -> bool + 'static,
    {
        Self {
            name: name.into(),
            message: message.into(),
            predicate: Box::new(predicate),
        }
    }
}

impl PermissionCheck for FnCheck {
    fn name(&self) -> &str {
        &self.name
    }

    fn message(&self) -> &str {
        &self.message
    }

    fn has_permission(&self, actor: Option<&Actor>, request: &RequestContext, action: Action) -> bool {
        (self.predicate)(actor, request, action)
    }
}
