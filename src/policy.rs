//! Authorization decisions.
//!
//! `decide` walks an ordered table of named rules. A request is allowed only when at least one
//! rule applies to it and every applying rule is satisfied; anything else is denied.

use crate::error::ApiError;
use crate::models::{User, UserId};

#[derive(Debug, Clone, PartialEq)]
pub enum Actor {
    Anonymous,
    Authenticated(User),
}

impl Actor {
    pub fn user(&self) -> Option<&User> {
        match self {
            Actor::Anonymous => None,
            Actor::Authenticated(user) => Some(user),
        }
    }

    /// The authenticated user, or a 401.
    pub fn require_user(&self) -> Result<&User, ApiError> {
        self.user().ok_or_else(ApiError::not_authenticated)
    }

    fn is(&self, id: Option<UserId>) -> bool {
        matches!((self.user(), id), (Some(user), Some(id)) if user.id == id)
    }

    fn is_staff(&self) -> bool {
        self.user().map_or(false, |u| u.role.is_staff())
    }

    fn is_regular(&self) -> bool {
        self.user().map_or(false, |u| !u.role.is_staff())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    List,
    Retrieve,
    Create,
    Update,
    Delete,
}

impl Action {
    pub fn is_read(self) -> bool {
        matches!(self, Action::List | Action::Retrieve)
    }

    fn is_modify(self) -> bool {
        matches!(self, Action::Update | Action::Delete)
    }
}

/// What is being acted on. The owner is `None` for collection-level checks made before the
/// object is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Product { created_by: Option<UserId> },
    Review { author: Option<UserId> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny { rule: &'static str },
}

impl Decision {
    #[cfg(test)]
    pub fn is_allowed(self) -> bool {
        self == Decision::Allow
    }
}

struct Request<'a> {
    actor: &'a Actor,
    action: Action,
    resource: Resource,
}

pub struct Rule {
    pub name: &'static str,
    applies: fn(&Request<'_>) -> bool,
    satisfied: fn(&Request<'_>) -> bool,
}

pub const NO_MATCHING_RULE: &str = "default-deny";

pub static RULES: &[Rule] = &[
    Rule {
        name: "read-is-public",
        applies: |r| r.action.is_read(),
        satisfied: |_| true,
    },
    Rule {
        name: "product-write-requires-staff",
        applies: |r| !r.action.is_read() && matches!(r.resource, Resource::Product { .. }),
        satisfied: |r| r.actor.is_staff(),
    },
    Rule {
        name: "product-write-requires-creator",
        applies: |r| {
            r.action.is_modify() && matches!(r.resource, Resource::Product { created_by: Some(_) })
        },
        satisfied: |r| match r.resource {
            Resource::Product { created_by } => r.actor.is(created_by),
            _ => false,
        },
    },
    Rule {
        name: "review-create-requires-regular-user",
        applies: |r| r.action == Action::Create && matches!(r.resource, Resource::Review { .. }),
        satisfied: |r| r.actor.is_regular(),
    },
    Rule {
        name: "review-write-requires-author-or-staff",
        applies: |r| r.action.is_modify() && matches!(r.resource, Resource::Review { .. }),
        satisfied: |r| match r.resource {
            Resource::Review { author: None } => r.actor.user().is_some(),
            Resource::Review { author } => r.actor.is(author) || r.actor.is_staff(),
            _ => false,
        },
    },
];

pub fn decide(actor: &Actor, action: Action, resource: Resource) -> Decision {
    let request = Request {
        actor,
        action,
        resource,
    };
    let mut matched = false;
    for rule in RULES.iter().filter(|rule| (rule.applies)(&request)) {
        if !(rule.satisfied)(&request) {
            return Decision::Deny { rule: rule.name };
        }
        matched = true;
    }
    if matched {
        Decision::Allow
    } else {
        Decision::Deny {
            rule: NO_MATCHING_RULE,
        }
    }
}

/// `decide` mapped onto the error taxonomy: anonymous denials are 401, the rest 403.
pub fn authorize(actor: &Actor, action: Action, resource: Resource) -> Result<(), ApiError> {
    match decide(actor, action, resource) {
        Decision::Allow => Ok(()),
        Decision::Deny { rule } => {
            log::debug!("[POLICY] {:?} on {:?} denied by {}", action, resource, rule);
            match actor {
                Actor::Anonymous => Err(ApiError::not_authenticated()),
                Actor::Authenticated(_) => Err(ApiError::forbidden()),
            }
        }
    }
}
