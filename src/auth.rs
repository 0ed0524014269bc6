//! Auth
//!
//! A signed-in session checked against a mock credential directory. There is
//! no real identity provider behind this: accounts come from a YAML fixture and
//! registrations only live for the lifetime of the directory. The signed-in
//! user (never the password) is persisted like any other snapshot.

use std::{fmt, fs, path::Path, sync::Arc};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    persistence::{self, Persisted, PersistenceError, PersistenceObserver},
    storage::Storage,
    store::{Observer, Reducer, Store, SubscriptionId},
};

/// Errors raised by sign-in, registration or directory loading.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No account matches the email and password.
    #[error("invalid email or password")]
    InvalidCredentials,

    /// Registration with an email that already has an account.
    #[error("email already in use")]
    EmailInUse,

    /// A required registration or sign-in field was blank.
    #[error("{0} is required")]
    MissingField(&'static str),

    /// Reading the accounts file failed.
    #[error("failed to read accounts file: {0}")]
    Io(#[from] std::io::Error),

    /// The accounts file is not valid YAML for the expected shape.
    #[error("failed to parse accounts: {0}")]
    Yaml(#[from] serde_norway::Error),
}

/// Account role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Shopper
    #[default]
    User,

    /// Back-office operator
    Admin,
}

/// A signed-in user as seen by the storefront.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Account id
    pub id: String,

    /// Sign-in email
    pub email: String,

    /// Display name
    pub name: String,

    /// Account role
    pub role: Role,
}

impl User {
    /// Whether this user may use the admin panel.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// A directory entry: the user plus their password.
#[derive(Clone, Deserialize)]
pub struct Account {
    /// Public part of the account
    #[serde(flatten)]
    pub user: User,

    password: String,
}

impl Account {
    /// Create an account.
    pub fn new(user: User, password: impl Into<String>) -> Self {
        Self {
            user,
            password: password.into(),
        }
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct AccountsFile {
    accounts: Vec<Account>,
}

/// Mock account directory.
#[derive(Debug, Clone, Default)]
pub struct CredentialDirectory {
    accounts: Vec<Account>,
}

impl CredentialDirectory {
    /// Directory holding `accounts`.
    #[must_use]
    pub fn new(accounts: Vec<Account>) -> Self {
        Self { accounts }
    }

    /// Load accounts from a YAML file with a top-level `accounts` list.
    ///
    /// # Errors
    ///
    /// Returns an [`AuthError`] if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, AuthError> {
        Self::from_yaml(&fs::read_to_string(path)?)
    }

    /// Parse accounts from YAML text.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Yaml`] if the text does not describe an accounts list.
    pub fn from_yaml(yaml: &str) -> Result<Self, AuthError> {
        let file: AccountsFile = serde_norway::from_str(yaml)?;

        Ok(Self::new(file.accounts))
    }

    /// Number of known accounts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    /// Whether the directory has no accounts.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// The user whose email and password both match.
    #[must_use]
    pub fn authenticate(&self, email: &str, password: &str) -> Option<&User> {
        self.accounts
            .iter()
            .find(|account| account.user.email == email && account.password == password)
            .map(|account| &account.user)
    }

    /// Whether an account exists for `email`.
    #[must_use]
    pub fn contains_email(&self, email: &str) -> bool {
        self.accounts
            .iter()
            .any(|account| account.user.email == email)
    }

    /// Add a shopper account and return its user.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::MissingField`] for blank input and
    /// [`AuthError::EmailInUse`] for a known email.
    pub fn register(&mut self, name: &str, email: &str, password: &str) -> Result<User, AuthError> {
        require("name", name)?;
        require("email", email)?;
        require("password", password)?;

        if self.contains_email(email) {
            return Err(AuthError::EmailInUse);
        }

        let user = User {
            id: Uuid::now_v7().to_string(),
            email: email.to_string(),
            name: name.to_string(),
            role: Role::User,
        };

        self.accounts.push(Account::new(user.clone(), password));

        Ok(user)
    }
}

fn require(field: &'static str, value: &str) -> Result<(), AuthError> {
    if value.trim().is_empty() {
        return Err(AuthError::MissingField(field));
    }

    Ok(())
}

/// Who is signed in, if anyone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthState {
    user: Option<User>,
}

impl AuthState {
    /// The signed-in user.
    #[must_use]
    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    /// Whether anyone is signed in.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    /// Whether the signed-in user is an admin.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.user.as_ref().is_some_and(User::is_admin)
    }
}

/// Session transitions.
#[derive(Debug, Clone)]
pub enum AuthAction {
    /// `User` is now signed in.
    SignedIn(User),

    /// Nobody is signed in.
    SignedOut,
}

impl Reducer for AuthState {
    type Action = AuthAction;

    fn reduce(&self, action: AuthAction) -> Self {
        match action {
            AuthAction::SignedIn(user) => Self { user: Some(user) },
            AuthAction::SignedOut => Self::default(),
        }
    }
}

impl Persisted for AuthState {
    const KEY: &'static str = "aliphoria_user";

    fn validate(self) -> Result<Self, PersistenceError> {
        match &self.user {
            Some(user) if user.id.is_empty() || user.email.is_empty() => Err(
                PersistenceError::Invalid("stored user has no id or email".to_string()),
            ),
            _ => Ok(self),
        }
    }
}

/// Sign-in session over a credential directory.
#[derive(Debug)]
pub struct AuthSession {
    store: Store<AuthState>,
    directory: CredentialDirectory,
}

impl AuthSession {
    /// A signed-out session with no persistence attached.
    #[must_use]
    pub fn new(directory: CredentialDirectory) -> Self {
        Self {
            store: Store::default(),
            directory,
        }
    }

    /// Restore the signed-in user from `storage` and persist later changes.
    pub fn open(storage: Arc<dyn Storage>, directory: CredentialDirectory) -> Self {
        let mut store = Store::new(persistence::restore::<AuthState>(storage.as_ref()));

        store.subscribe(PersistenceObserver::<AuthState>::new(storage));

        Self { store, directory }
    }

    /// Current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<AuthState> {
        self.store.snapshot()
    }

    /// The signed-in user.
    #[must_use]
    pub fn user(&self) -> Option<&User> {
        self.store.state().user()
    }

    /// Whether anyone is signed in.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.store.state().is_authenticated()
    }

    /// Whether the signed-in user is an admin.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.store.state().is_admin()
    }

    /// Sign in with email and password.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidCredentials`] when no account matches.
    pub fn login(&mut self, email: &str, password: &str) -> Result<User, AuthError> {
        require("email", email)?;
        require("password", password)?;

        let Some(user) = self.directory.authenticate(email, password).cloned() else {
            warn!(%email, "rejected sign-in");
            return Err(AuthError::InvalidCredentials);
        };

        info!(user = %user.id, role = ?user.role, "signed in");

        self.store.dispatch(AuthAction::SignedIn(user.clone()));

        Ok(user)
    }

    /// Create a shopper account and sign it in.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::EmailInUse`] or [`AuthError::MissingField`].
    pub fn register(&mut self, name: &str, email: &str, password: &str) -> Result<User, AuthError> {
        let user = self.directory.register(name, email, password)?;

        info!(user = %user.id, "registered");

        self.store.dispatch(AuthAction::SignedIn(user.clone()));

        Ok(user)
    }

    /// Sign out.
    pub fn logout(&mut self) {
        if let Some(user) = self.user() {
            info!(user = %user.id, "signed out");
        }

        self.store.dispatch(AuthAction::SignedOut);
    }

    /// Be told about every new snapshot.
    pub fn subscribe(&mut self, observer: impl Observer<AuthState> + 'static) -> SubscriptionId {
        self.store.subscribe(observer)
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use crate::storage::MemoryStorage;

    use super::*;

    const ACCOUNTS: &str = "
accounts:
  - id: '1'
    email: shopper@example.com
    password: shopper123
    name: Regular User
    role: user
  - id: '2'
    email: admin@example.com
    password: admin123
    name: Admin User
    role: admin
";

    fn directory() -> Result<CredentialDirectory, AuthError> {
        CredentialDirectory::from_yaml(ACCOUNTS)
    }

    #[test]
    fn login_with_matching_credentials() -> TestResult {
        let mut session = AuthSession::new(directory()?);

        let user = session.login("shopper@example.com", "shopper123")?;

        assert_eq!(user.id, "1");
        assert!(session.is_authenticated());
        assert!(!session.is_admin());

        Ok(())
    }

    #[test]
    fn admin_login_sets_admin_flag() -> TestResult {
        let mut session = AuthSession::new(directory()?);

        session.login("admin@example.com", "admin123")?;

        assert!(session.is_admin());

        Ok(())
    }

    #[test]
    fn login_rejects_wrong_password() -> TestResult {
        let mut session = AuthSession::new(directory()?);

        let result = session.login("shopper@example.com", "nope");

        assert!(matches!(result, Err(AuthError::InvalidCredentials)));
        assert!(!session.is_authenticated());

        Ok(())
    }

    #[test]
    fn register_rejects_known_email() -> TestResult {
        let mut session = AuthSession::new(directory()?);

        let result = session.register("Someone", "admin@example.com", "pw");

        assert!(matches!(result, Err(AuthError::EmailInUse)));

        Ok(())
    }

    #[test]
    fn register_rejects_blank_fields() -> TestResult {
        let mut directory = directory()?;

        assert!(matches!(
            directory.register(" ", "new@example.com", "pw"),
            Err(AuthError::MissingField("name"))
        ));
        assert!(matches!(
            directory.register("New", "new@example.com", ""),
            Err(AuthError::MissingField("password"))
        ));

        Ok(())
    }

    #[test]
    fn register_signs_in_new_shopper() -> TestResult {
        let mut session = AuthSession::new(directory()?);

        let user = session.register("New Shopper", "new@example.com", "secret")?;

        assert_eq!(user.role, Role::User);
        assert_eq!(session.user(), Some(&user));

        session.logout();
        session.login("new@example.com", "secret")?;

        assert_eq!(session.user().map(|u| u.id.as_str()), Some(user.id.as_str()));

        Ok(())
    }

    #[test]
    fn session_persists_without_password() -> TestResult {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());

        AuthSession::open(Arc::clone(&storage), directory()?)
            .login("admin@example.com", "admin123")?;

        let raw = storage.get(AuthState::KEY)?.unwrap_or_default();

        assert!(!raw.contains("admin123"), "password leaked into {raw}");

        let reopened = AuthSession::open(Arc::clone(&storage), directory()?);

        assert!(reopened.is_admin());

        Ok(())
    }

    #[test]
    fn logout_clears_persisted_user() -> TestResult {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());

        let mut session = AuthSession::open(Arc::clone(&storage), directory()?);
        session.login("shopper@example.com", "shopper123")?;
        session.logout();

        let reopened = AuthSession::open(storage, directory()?);

        assert!(!reopened.is_authenticated());

        Ok(())
    }

    #[test]
    fn restores_bare_user_object() -> TestResult {
        let raw = r#"{"id":"1","email":"shopper@example.com","name":"Regular User","role":"user"}"#;

        let state = persistence::decode::<AuthState>(raw)?;

        assert_eq!(state.user().map(|u| u.email.as_str()), Some("shopper@example.com"));

        Ok(())
    }
}
