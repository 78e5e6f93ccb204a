//! crates/schoolhub_core/src/accounts.rs
//!
//! User accounts: registration, login sessions, admin approval and profiles.
//!
//! Password hashing is left to the caller. This module only ever sees the
//! stored hash, and `authenticate` takes the verifier as a closure.

use chrono::Duration;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::{AccountStatus, Actor, AuthSession, Profile, Role, User};
use crate::ports::{Clock, PortError, PortResult};
use crate::store::BoundedStore;

pub const DEFAULT_SESSION_TTL_DAYS: i64 = 30;

/// Lower-cases and trims an email, rejecting anything without a local part and a domain.
pub fn normalize_email(raw: &str) -> PortResult<String> {
    let email = raw.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') && !domain.starts_with('.') => {
            Ok(email)
        }
        _ => Err(PortError::InvalidInput(format!("'{}' is not a valid email", raw.trim()))),
    }
}

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[derive(Clone)]
pub struct Accounts {
    store: BoundedStore,
    clock: Arc<dyn Clock>,
    admin_email: Option<String>,
    session_ttl: Duration,
}

impl Accounts {
    pub fn new(store: BoundedStore, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            admin_email: None,
            session_ttl: Duration::days(DEFAULT_SESSION_TTL_DAYS),
        }
    }

    /// A signup with this address is created as an active admin.
    pub fn with_admin_email(mut self, email: Option<String>) -> Self {
        self.admin_email = email.and_then(|e| normalize_email(&e).ok());
        self
    }

    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    pub fn session_ttl(&self) -> Duration {
        self.session_ttl
    }

    //=====================================================================================
    // Registration & Sessions
    //=====================================================================================

    /// Creates an account awaiting approval.
    pub async fn register(&self, email: &str, password_hash: &str) -> PortResult<User> {
        let email = normalize_email(email)?;
        let bootstrap = self.admin_email.as_deref() == Some(email.as_str());
        let (role, status) = if bootstrap {
            (Role::Admin, AccountStatus::Active)
        } else {
            (Role::Unverified, AccountStatus::Pending)
        };

        let user = User {
            id: Uuid::new_v4(),
            email,
            role,
            status,
            profile: Profile::default(),
            profile_complete: false,
            created_at: self.clock.now(),
        };
        let user = self
            .store
            .call("create_user_with_credentials", |s| {
                s.create_user_with_credentials(user, password_hash)
            })
            .await?;

        info!(user_id = %user.id, role = %user.role, "Account registered");
        Ok(user)
    }

    /// Checks a login attempt. `verify` receives the stored password hash.
    ///
    /// Unknown emails and bad passwords are both `Unauthorized`; accounts that are
    /// still pending or were rejected are `Forbidden`.
    pub async fn authenticate<V>(&self, email: &str, verify: V) -> PortResult<User>
    where
        V: FnOnce(&str) -> bool,
    {
        let email = normalize_email(email).map_err(|_| PortError::Unauthorized)?;
        let credentials = self
            .store
            .call("get_credentials_by_email", |s| s.get_credentials_by_email(&email))
            .await?
            .ok_or(PortError::Unauthorized)?;

        if !verify(&credentials.password_hash) {
            return Err(PortError::Unauthorized);
        }

        let user = self.load_user(credentials.user_id).await?;
        ensure_active(&user)?;
        Ok(user)
    }

    pub async fn open_session(&self, user_id: Uuid) -> PortResult<AuthSession> {
        let session = AuthSession {
            id: format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple()),
            user_id,
            expires_at: self.clock.now() + self.session_ttl,
        };
        let stored = session.clone();
        self.store
            .call("create_auth_session", |s| s.create_auth_session(stored))
            .await?;
        Ok(session)
    }

    /// Resolves a session token to its user. Expired sessions are removed.
    pub async fn resolve_session(&self, token: &str) -> PortResult<User> {
        let session = self
            .store
            .call("get_auth_session", |s| s.get_auth_session(token))
            .await?
            .ok_or(PortError::Unauthorized)?;

        if session.expires_at <= self.clock.now() {
            self.close_session(token).await?;
            return Err(PortError::Unauthorized);
        }

        let user_id = session.user_id;
        self.store
            .call("get_user", |s| s.get_user(user_id))
            .await?
            .ok_or(PortError::Unauthorized)
    }

    pub async fn close_session(&self, token: &str) -> PortResult<()> {
        self.store
            .call("delete_auth_session", |s| s.delete_auth_session(token))
            .await
    }

    //=====================================================================================
    // Administration
    //=====================================================================================

    pub async fn list_users(&self) -> PortResult<Vec<User>> {
        self.store.call("list_users", |s| s.list_users()).await
    }

    pub async fn set_role(&self, user_id: Uuid, role: Role) -> PortResult<User> {
        let user = self.update_access(user_id, Some(role), None).await?;
        info!(%user_id, %role, "Role changed");
        Ok(user)
    }

    /// Activates a pending account with its assigned role.
    pub async fn approve(&self, user_id: Uuid, role: Role) -> PortResult<User> {
        if role == Role::Unverified {
            return Err(PortError::InvalidInput(
                "An approved account needs a role other than UNVERIFIED".to_string(),
            ));
        }
        let user = self
            .update_access(user_id, Some(role), Some(AccountStatus::Active))
            .await?;
        info!(%user_id, %role, "Account approved");
        Ok(user)
    }

    pub async fn reject(&self, user_id: Uuid) -> PortResult<User> {
        let user = self
            .update_access(user_id, None, Some(AccountStatus::Rejected))
            .await?;
        info!(%user_id, "Account rejected");
        Ok(user)
    }

    pub async fn delete_user(&self, actor: Actor, user_id: Uuid) -> PortResult<()> {
        if actor.id == user_id {
            return Err(PortError::InvalidInput(
                "Admins cannot delete their own account".to_string(),
            ));
        }
        if !self.store.call("delete_user", |s| s.delete_user(user_id)).await? {
            return Err(PortError::NotFound(format!("User {} not found", user_id)));
        }
        warn!(%user_id, by = %actor.id, "User deleted");
        Ok(())
    }

    async fn update_access(
        &self,
        user_id: Uuid,
        role: Option<Role>,
        status: Option<AccountStatus>,
    ) -> PortResult<User> {
        self.store
            .call("update_user_access", |s| s.update_user_access(user_id, role, status))
            .await?
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", user_id)))
    }

    //=====================================================================================
    // Profiles
    //=====================================================================================

    pub async fn profile(&self, user_id: Uuid) -> PortResult<User> {
        self.load_user(user_id).await
    }

    /// Replaces the caller's profile. Names and document number are mandatory,
    /// and a successful update marks the profile complete.
    pub async fn update_profile(&self, user_id: Uuid, profile: Profile) -> PortResult<User> {
        let profile = Profile {
            first_names: clean(profile.first_names),
            last_names: clean(profile.last_names),
            document_type: clean(profile.document_type),
            document_number: clean(profile.document_number),
            phone: clean(profile.phone),
            address: clean(profile.address),
            grade_label: clean(profile.grade_label),
            section_label: clean(profile.section_label),
            birth_date: profile.birth_date,
            guardian_name: clean(profile.guardian_name),
            guardian_phone: clean(profile.guardian_phone),
            academic_title: clean(profile.academic_title),
        };
        if !profile.is_complete() {
            return Err(PortError::InvalidInput(
                "First names, last names and document number are required".to_string(),
            ));
        }

        self.store
            .call("update_profile", |s| s.update_profile(user_id, profile, true))
            .await?
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", user_id)))
    }

    async fn load_user(&self, user_id: Uuid) -> PortResult<User> {
        self.store
            .call("get_user", |s| s.get_user(user_id))
            .await?
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", user_id)))
    }
}

/// Only approved accounts may act.
pub fn ensure_active(user: &User) -> PortResult<()> {
    match user.status {
        AccountStatus::Active => Ok(()),
        AccountStatus::Pending => Err(PortError::Forbidden(
            "The account is awaiting approval".to_string(),
        )),
        AccountStatus::Rejected => Err(PortError::Forbidden(
            "The account has been rejected".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::memory::InMemoryStore;
    use crate::testing::bounded;
    use chrono::Utc;

    fn accounts() -> (Arc<FixedClock>, Accounts) {
        let store = Arc::new(InMemoryStore::new());
        let clock = Arc::new(FixedClock::new(Utc::now()));
        let accounts = Accounts::new(bounded(&store), clock.clone())
            .with_admin_email(Some("Head@School.test".into()));
        (clock, accounts)
    }

    #[test]
    fn email_normalization() {
        assert_eq!(normalize_email("  Ana@School.Test ").unwrap(), "ana@school.test");
        assert!(normalize_email("ana").is_err());
        assert!(normalize_email("@school.test").is_err());
        assert!(normalize_email("ana@localhost").is_err());
    }

    #[tokio::test]
    async fn signups_wait_for_approval_except_the_bootstrap_admin() {
        let (_, accounts) = accounts();

        let ana = accounts.register("ana@school.test", "hash").await.unwrap();
        assert_eq!(ana.role, Role::Unverified);
        assert_eq!(ana.status, AccountStatus::Pending);

        let head = accounts.register("head@school.test", "hash").await.unwrap();
        assert_eq!(head.role, Role::Admin);
        assert_eq!(head.status, AccountStatus::Active);

        assert!(matches!(
            accounts.register("ANA@school.test", "hash").await,
            Err(PortError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn login_checks_password_and_approval() {
        let (_, accounts) = accounts();
        let ana = accounts.register("ana@school.test", "secret").await.unwrap();
        let check = |hash: &str| hash == "secret";

        assert!(matches!(
            accounts.authenticate("ana@school.test", |h: &str| h == "wrong").await,
            Err(PortError::Unauthorized)
        ));
        assert!(matches!(
            accounts.authenticate("nobody@school.test", check).await,
            Err(PortError::Unauthorized)
        ));
        assert!(matches!(
            accounts.authenticate("ana@school.test", check).await,
            Err(PortError::Forbidden(_))
        ));

        accounts.approve(ana.id, Role::Student).await.unwrap();
        let user = accounts.authenticate("Ana@School.test", check).await.unwrap();
        assert_eq!(user.role, Role::Student);

        accounts.reject(ana.id).await.unwrap();
        assert!(matches!(
            accounts.authenticate("ana@school.test", check).await,
            Err(PortError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn sessions_expire_and_close() {
        let (clock, accounts) = accounts();
        let ana = accounts.register("ana@school.test", "h").await.unwrap();

        let session = accounts.open_session(ana.id).await.unwrap();
        assert_eq!(accounts.resolve_session(&session.id).await.unwrap().id, ana.id);

        accounts.close_session(&session.id).await.unwrap();
        assert!(matches!(
            accounts.resolve_session(&session.id).await,
            Err(PortError::Unauthorized)
        ));

        let session = accounts.open_session(ana.id).await.unwrap();
        clock.advance(Duration::days(DEFAULT_SESSION_TTL_DAYS));
        assert!(matches!(
            accounts.resolve_session(&session.id).await,
            Err(PortError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn administration() {
        let (_, accounts) = accounts();
        let head = accounts.register("head@school.test", "h").await.unwrap();
        let ana = accounts.register("ana@school.test", "h").await.unwrap();
        let admin = Actor {
            id: head.id,
            role: Role::Admin,
        };

        assert!(matches!(
            accounts.approve(ana.id, Role::Unverified).await,
            Err(PortError::InvalidInput(_))
        ));
        let teacher = accounts.set_role(ana.id, Role::Teacher).await.unwrap();
        assert_eq!(teacher.status, AccountStatus::Pending);

        assert!(matches!(
            accounts.delete_user(admin, head.id).await,
            Err(PortError::InvalidInput(_))
        ));
        accounts.delete_user(admin, ana.id).await.unwrap();
        assert_eq!(accounts.list_users().await.unwrap().len(), 1);
        assert!(matches!(
            accounts.delete_user(admin, ana.id).await,
            Err(PortError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn profile_update_requires_identity_fields() {
        let (_, accounts) = accounts();
        let ana = accounts.register("ana@school.test", "h").await.unwrap();

        let partial = Profile {
            first_names: Some("Ana".into()),
            last_names: Some("  ".into()),
            document_number: Some("123".into()),
            ..Default::default()
        };
        assert!(matches!(
            accounts.update_profile(ana.id, partial).await,
            Err(PortError::InvalidInput(_))
        ));

        let full = Profile {
            first_names: Some(" Ana ".into()),
            last_names: Some("Ruiz".into()),
            document_number: Some("123".into()),
            phone: Some("".into()),
            ..Default::default()
        };
        let updated = accounts.update_profile(ana.id, full).await.unwrap();
        assert!(updated.profile_complete);
        assert_eq!(updated.display_name(), "Ana Ruiz");
        assert_eq!(updated.profile.phone, None);
        assert!(accounts.profile(ana.id).await.unwrap().profile_complete);
    }
}
