//! # Application Handles
//!
//! An [`App`] names one Firebase project and owns the lazily constructed
//! [`FirebaseAuth`](crate::auth::FirebaseAuth) facade for it. Handles live in
//! a process-wide registry keyed by a caller-chosen name, so independent
//! parts of a program can share one instance per project. A handle is
//! immutable once created and can be deleted exactly once; deletion also
//! destroys the facade.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use once_cell::sync::Lazy;

use crate::auth::FirebaseAuth;
use crate::credentials::Credentials;
use crate::errors::{ErrorKind, FirebaseError, Result};

/// Name under which [`App::initialize_default`] registers its handle.
pub static DEFAULT_APP_NAME: &str = "[DEFAULT]";

/// When set, all identity toolkit traffic is redirected to the Auth emulator
/// at this host and token signatures are neither produced nor checked.
pub static ENV_AUTH_EMULATOR_HOST: &str = "FIREBASE_AUTH_EMULATOR_HOST";

static APPS: Lazy<Mutex<HashMap<String, Arc<App>>>> = Lazy::new(|| Mutex::new(HashMap::new()));

pub(crate) fn probe_emulator_host() -> Option<String> {
    std::env::var(ENV_AUTH_EMULATOR_HOST)
        .ok()
        .filter(|host| !host.is_empty())
}

/// A named, immutable project handle.
pub struct App {
    name: String,
    credentials: Credentials,
    emulator_host: Option<String>,
    auth: Mutex<Option<Arc<FirebaseAuth>>>,
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("name", &self.name)
            .field("credentials", &self.credentials)
            .field("emulator_host", &self.emulator_host)
            .finish()
    }
}

impl App {
    /// Register a new handle under `name`. Fails if the name is taken.
    ///
    /// The emulator environment variable is probed exactly once, here;
    /// everything constructed from this handle consults the stored result.
    pub fn initialize(name: impl Into<String>, credentials: Credentials) -> Result<Arc<App>> {
        let name = name.into();
        if name.is_empty() {
            return Err(FirebaseError::invalid_argument("app name must not be empty"));
        }
        let mut apps = APPS.lock().expect("poisoned lock");
        if apps.contains_key(&name) {
            return Err(FirebaseError::new(
                ErrorKind::Conflict,
                format!("an app named '{}' already exists", name),
            ));
        }
        let app = Arc::new(App {
            name: name.clone(),
            credentials,
            emulator_host: probe_emulator_host(),
            auth: Mutex::new(None),
        });
        apps.insert(name, app.clone());
        Ok(app)
    }

    pub fn initialize_default(credentials: Credentials) -> Result<Arc<App>> {
        Self::initialize(DEFAULT_APP_NAME, credentials)
    }

    pub fn get(name: &str) -> Option<Arc<App>> {
        APPS.lock().expect("poisoned lock").get(name).cloned()
    }

    pub fn get_default() -> Option<Arc<App>> {
        Self::get(DEFAULT_APP_NAME)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn project_id(&self) -> &str {
        &self.credentials.project_id
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub(crate) fn emulator_host(&self) -> Option<&str> {
        self.emulator_host.as_deref()
    }

    pub(crate) fn auth_cell(&self) -> &Mutex<Option<Arc<FirebaseAuth>>> {
        &self.auth
    }

    /// Remove the handle from the registry and destroy its auth facade. The
    /// destruction is one-way; a later `App::get` returns nothing.
    pub fn delete(&self) {
        APPS.lock().expect("poisoned lock").remove(&self.name);
        let auth = self.auth.lock().expect("poisoned lock").take();
        if let Some(auth) = auth {
            auth.destroy();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_round_trip() {
        let app = App::initialize("registry-round-trip", Credentials::from_project_id("p")).unwrap();
        let looked_up = App::get("registry-round-trip").unwrap();
        assert!(Arc::ptr_eq(&app, &looked_up));
        assert_eq!(looked_up.project_id(), "p");
        app.delete();
        assert!(App::get("registry-round-trip").is_none());
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let app = App::initialize("registry-duplicate", Credentials::from_project_id("p")).unwrap();
        let err =
            App::initialize("registry-duplicate", Credentials::from_project_id("p")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        app.delete();
        // The name is free again after deletion.
        App::initialize("registry-duplicate", Credentials::from_project_id("p"))
            .unwrap()
            .delete();
    }

    #[test]
    fn empty_names_are_rejected() {
        assert!(App::initialize("", Credentials::from_project_id("p")).is_err());
    }

    #[test]
    fn delete_is_idempotent() {
        let app = App::initialize("registry-idempotent", Credentials::from_project_id("p")).unwrap();
        app.delete();
        app.delete();
        assert!(App::get("registry-idempotent").is_none());
    }
}
