//! Who started a task and who is asking about it.
//!
//! Ownership is decided by session id alone. The backing user store may be offline
//! during the very maintenance window a monitor represents, so no user lookup happens.

use std::sync::Arc;

/// Request-scoped view of the caller, as seen by the engine.
pub trait RequestContext: Send + Sync {
    /// The caller's active session id, if any.
    fn active_session_id(&self) -> Option<&str>;
}

/// Plain [`RequestContext`] carrying an optional session id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionContext {
    session_id: Option<String>,
}

impl SessionContext {
    /// Context for an authenticated session.
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: Some(session_id.into()),
        }
    }

    /// Context without a session (background/system caller).
    pub fn anonymous() -> Self {
        Self { session_id: None }
    }
}

impl RequestContext for SessionContext {
    fn active_session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }
}

/// Identity captured when a monitor is created.
#[derive(Debug, Clone)]
pub struct Origin {
    pub(crate) node_id: Arc<str>,
    pub(crate) session_id: Option<Arc<str>>,
}

impl Origin {
    /// Origin on `node_id`, owned by the caller's session.
    pub fn new(node_id: impl Into<Arc<str>>, ctx: &dyn RequestContext) -> Self {
        Self {
            node_id: node_id.into(),
            session_id: ctx.active_session_id().map(Arc::from),
        }
    }

    /// Origin on `node_id` with no owning session.
    pub fn system(node_id: impl Into<Arc<str>>) -> Self {
        Self {
            node_id: node_id.into(),
            session_id: None,
        }
    }

    /// The owning cluster node.
    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// The owning session, if any.
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// `true` iff `ctx` carries the same session id as this origin.
    pub fn is_owned_by(&self, ctx: &dyn RequestContext) -> bool {
        match (self.session_id.as_deref(), ctx.active_session_id()) {
            (Some(mine), Some(theirs)) => mine == theirs,
            _ => false,
        }
    }
}
