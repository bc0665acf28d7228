use crate::db::Store;
use crate::domain::onboarding::is_onboarding_complete;
use crate::domain::users::{
    User, UserUpdate, clear_current_user, create_user, current_user, find_by_credentials,
    set_current_user, update_user,
};
use anyhow::{Result, bail};
use tracing::{info, warn};

/// Application state shared by the CLI and the API: the store plus the
/// signed-in user.
pub struct Session {
    store: Store,
    user: Option<User>,
}

impl Session {
    pub fn start(store: Store) -> Result<Self> {
        let user = match current_user(&store) {
            Ok(user) => user,
            Err(error) => {
                warn!(error = %error, "failed to load current user; starting signed out");
                None
            }
        };

        Ok(Self { store, user })
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn require_user(&self) -> Result<&User> {
        match &self.user {
            Some(user) => Ok(user),
            None => bail!("Not signed in. Run `justly login` or `justly signup` first"),
        }
    }

    /// Returns false on wrong credentials and leaves the session untouched.
    pub fn login(&mut self, email: &str, password: &str) -> Result<bool> {
        let Some(user) = find_by_credentials(&self.store, email, password)? else {
            info!("login rejected");
            return Ok(false);
        };

        set_current_user(&self.store, &user)?;
        info!(user = %user.id, "signed in");
        self.user = Some(user);
        Ok(true)
    }

    pub fn signup(&mut self, name: &str, email: &str, password: &str) -> Result<User> {
        let user = create_user(&self.store, name, email, password)?;
        set_current_user(&self.store, &user)?;
        self.user = Some(user.clone());
        Ok(user)
    }

    pub fn logout(&mut self) -> Result<()> {
        clear_current_user(&self.store)?;
        if let Some(user) = self.user.take() {
            info!(user = %user.id, "signed out");
        }
        Ok(())
    }

    pub fn update_user(&mut self, changes: UserUpdate) -> Result<User> {
        let id = self.require_user()?.id.clone();
        let updated = update_user(&self.store, &id, changes)?;
        self.user = Some(updated.clone());
        Ok(updated)
    }

    pub fn is_onboarded(&self) -> Result<bool> {
        is_onboarding_complete(&self.store)
    }

    pub fn route(&self, route: Route) -> Result<RouteDecision> {
        Ok(guard(route, self.user.is_some(), self.is_onboarded()?))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Landing,
    Login,
    Signup,
    Onboarding,
    Home,
    Coach,
    Habits,
    Reflect,
    Profile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteDecision {
    Allow,
    Redirect(Route),
}

pub fn guard(route: Route, signed_in: bool, onboarded: bool) -> RouteDecision {
    match route {
        Route::Landing | Route::Login | Route::Signup if signed_in => {
            RouteDecision::Redirect(Route::Home)
        }
        Route::Landing | Route::Login | Route::Signup => RouteDecision::Allow,
        Route::Onboarding if signed_in => RouteDecision::Allow,
        Route::Onboarding => RouteDecision::Redirect(Route::Landing),
        Route::Home | Route::Coach | Route::Habits | Route::Reflect | Route::Profile => {
            if !signed_in {
                RouteDecision::Redirect(Route::Landing)
            } else if !onboarded {
                RouteDecision::Redirect(Route::Onboarding)
            } else {
                RouteDecision::Allow
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::StoreKey;
    use crate::domain::onboarding::set_onboarding_complete;
    use tempfile::tempdir;

    #[test]
    fn login_success_sets_current_user() {
        let store = Store::open_in_memory().expect("store");
        let mut session = Session::start(store).expect("session");
        let user = session.signup("Ana", "ana@x.com", "secret1").expect("signup");
        session.logout().expect("logout");
        assert!(session.user().is_none());

        assert!(session.login("ana@x.com", "secret1").expect("login"));
        assert_eq!(session.user().map(|current| current.id.clone()), Some(user.id.clone()));
        assert_eq!(
            session
                .store()
                .get::<String>(StoreKey::CurrentUser)
                .expect("current"),
            Some(user.id)
        );
    }

    #[test]
    fn failed_login_changes_nothing() {
        let store = Store::open_in_memory().expect("store");
        let mut session = Session::start(store).expect("session");
        session.signup("Ana", "ana@x.com", "secret1").expect("signup");
        session.logout().expect("logout");

        assert!(!session.login("ana@x.com", "wrong-password").expect("login"));
        assert!(session.user().is_none());
        assert!(
            session
                .store()
                .get::<String>(StoreKey::CurrentUser)
                .expect("current")
                .is_none()
        );
    }

    #[test]
    fn start_restores_stored_user() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("justly.db");

        {
            let mut session = Session::start(Store::open(&path).expect("store")).expect("session");
            session.signup("Ana", "ana@x.com", "secret1").expect("signup");
        }

        let session = Session::start(Store::open(&path).expect("reopen")).expect("session");
        assert_eq!(session.user().map(|user| user.name.as_str()), Some("Ana"));
    }

    #[test]
    fn start_survives_corrupt_current_user() {
        let store = Store::open_in_memory().expect("store");
        store.set(StoreKey::CurrentUser, &42).expect("corrupt");

        let session = Session::start(store).expect("session");
        assert!(session.user().is_none());
    }

    #[test]
    fn update_user_merges_into_current_user() {
        let store = Store::open_in_memory().expect("store");
        let mut session = Session::start(store).expect("session");
        session.signup("Ana", "ana@x.com", "secret1").expect("signup");

        let updated = session
            .update_user(UserUpdate {
                name: Some("Ana Maria".to_string()),
                ..UserUpdate::default()
            })
            .expect("update");
        assert_eq!(updated.name, "Ana Maria");
        assert_eq!(session.user().map(|user| user.name.as_str()), Some("Ana Maria"));
    }

    #[test]
    fn guard_follows_page_table() {
        assert_eq!(guard(Route::Login, true, false), RouteDecision::Redirect(Route::Home));
        assert_eq!(guard(Route::Landing, false, false), RouteDecision::Allow);
        assert_eq!(
            guard(Route::Onboarding, false, false),
            RouteDecision::Redirect(Route::Landing)
        );
        assert_eq!(guard(Route::Onboarding, true, false), RouteDecision::Allow);
        assert_eq!(guard(Route::Coach, false, true), RouteDecision::Redirect(Route::Landing));
        assert_eq!(
            guard(Route::Habits, true, false),
            RouteDecision::Redirect(Route::Onboarding)
        );
        assert_eq!(guard(Route::Reflect, true, true), RouteDecision::Allow);
    }

    #[test]
    fn session_route_reads_onboarding_flag() {
        let store = Store::open_in_memory().expect("store");
        let mut session = Session::start(store).expect("session");
        session.signup("Ana", "ana@x.com", "secret1").expect("signup");
        assert_eq!(
            session.route(Route::Home).expect("route"),
            RouteDecision::Redirect(Route::Onboarding)
        );

        set_onboarding_complete(session.store()).expect("flag");
        assert_eq!(session.route(Route::Home).expect("route"), RouteDecision::Allow);
    }
}
