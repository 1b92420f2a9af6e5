#[cfg(test)]
#[path = "route_test.rs"]
mod route_test;

use std::sync::Arc;

use tokio::sync::watch;

/// Console views, keyed by their dashboard paths.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Route {
    Login,
    Register,
    ForgetPassword,
    Dashboard,
    /// Single-image classification against a trained model.
    Classify,
    TrainConfig,
    TaskManagement,
    Visualization,
    ModelManagement,
    ResourceManagement,
    Profile,
}

impl Route {
    #[must_use]
    pub fn path(self) -> &'static str {
        match self {
            Self::Login => "/login",
            Self::Register => "/register",
            Self::ForgetPassword => "/forget-password",
            Self::Dashboard => "/home/dashboard",
            Self::Classify => "/home/test",
            Self::TrainConfig => "/home/train/trainManagement",
            Self::TaskManagement => "/home/train/taskManagement",
            Self::Visualization => "/home/visualization",
            Self::ModelManagement => "/home/modelManagement",
            Self::ResourceManagement => "/home/resourceManagement",
            Self::Profile => "/profile",
        }
    }

    /// Resolve a path, including the index redirects (`/`, `/home`, `/home/train`).
    #[must_use]
    pub fn from_path(path: &str) -> Option<Self> {
        let path = match path.trim_end_matches('/') {
            "" => "/login",
            "/home" => "/home/dashboard",
            "/home/train" => "/home/train/trainManagement",
            other => other,
        };
        Self::ALL.into_iter().find(|route| route.path() == path)
    }

    /// Every view except the account flows needs a signed-in session.
    #[must_use]
    pub fn requires_session(self) -> bool {
        !matches!(self, Self::Login | Self::Register | Self::ForgetPassword)
    }

    const ALL: [Self; 11] = [
        Self::Login,
        Self::Register,
        Self::ForgetPassword,
        Self::Dashboard,
        Self::Classify,
        Self::TrainConfig,
        Self::TaskManagement,
        Self::Visualization,
        Self::ModelManagement,
        Self::ResourceManagement,
        Self::Profile,
    ];
}

/// Shared current-view state. Clones observe and drive the same route.
#[derive(Clone, Debug)]
pub struct Navigator {
    tx: Arc<watch::Sender<Route>>,
}

impl Navigator {
    #[must_use]
    pub fn new(initial: Route) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    #[must_use]
    pub fn current(&self) -> Route {
        *self.tx.borrow()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Route> {
        self.tx.subscribe()
    }

    /// Move to `route`, diverting protected views to login when signed out.
    /// Returns the route actually shown.
    pub fn navigate(&self, route: Route, signed_in: bool) -> Route {
        let target = if route.requires_session() && !signed_in { Route::Login } else { route };
        self.tx.send_replace(target);
        target
    }

    pub fn redirect_to_login(&self) {
        self.tx.send_replace(Route::Login);
    }
}

impl Default for Navigator {
    fn default() -> Self {
        Self::new(Route::Login)
    }
}
