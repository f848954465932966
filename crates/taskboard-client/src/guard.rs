//! Route table and the guard in front of protected views.

use crate::session::Session;
use futures::StreamExt;
use futures_signals::map_ref;
use futures_signals::signal::{Signal, SignalExt};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Login,
    Signup,
    Dashboard,
}

impl Route {
    pub const ALL: [Route; 3] = [Route::Login, Route::Signup, Route::Dashboard];

    pub fn path(&self) -> &'static str {
        match self {
            Route::Login => "/login",
            Route::Signup => "/signup",
            Route::Dashboard => "/",
        }
    }

    pub fn from_path(path: &str) -> Option<Route> {
        let path = match path.trim_end_matches('/') {
            "" => "/",
            trimmed => trimmed,
        };
        Route::ALL.into_iter().find(|route| route.path() == path)
    }

    /// Protected routes require an authenticated session
    pub fn is_protected(&self) -> bool {
        matches!(self, Route::Dashboard)
    }
}

/// What a view should do with a navigation attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    /// Session bootstrap still in flight: show a neutral placeholder
    Pending,
    /// Navigate elsewhere instead of rendering
    Redirect(Route),
    /// Render the requested view
    Allow,
}

/// Gates protected views on session state
#[derive(Clone)]
pub struct RouteGuard {
    session: Session,
}

impl RouteGuard {
    pub fn new(session: Session) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Decision for a protected view given the raw session state
    pub fn decide(loading: bool, authenticated: bool) -> GuardDecision {
        if loading {
            GuardDecision::Pending
        } else if authenticated {
            GuardDecision::Allow
        } else {
            GuardDecision::Redirect(Route::Login)
        }
    }

    /// Point-in-time decision for a protected view
    pub fn evaluate(&self) -> GuardDecision {
        Self::decide(self.session.is_loading(), self.session.is_authenticated())
    }

    /// Decision for an arbitrary route; public routes are always allowed
    pub fn resolve(&self, route: Route) -> GuardDecision {
        if route.is_protected() {
            self.evaluate()
        } else {
            GuardDecision::Allow
        }
    }

    /// Decision for a protected view, re-evaluated on every session change
    pub fn signal(&self) -> impl Signal<Item = GuardDecision> + use<> {
        map_ref! {
            let loading = self.session.loading_signal(),
            let user = self.session.user_signal() =>
            Self::decide(*loading, user.is_some())
        }
        .dedupe()
    }

    /// Wait until bootstrap has resolved and return the first real decision
    pub async fn settled(&self) -> GuardDecision {
        let mut decisions = self.signal().to_stream();
        while let Some(decision) = decisions.next().await {
            if decision != GuardDecision::Pending {
                return decision;
            }
        }
        self.evaluate()
    }
}
