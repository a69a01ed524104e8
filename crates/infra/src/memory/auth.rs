use async_trait::async_trait;
use chrono::{DateTime, Utc};

use herbstore_auth::{AdminUser, Session, SessionToken};
use herbstore_core::AdminId;

use super::InMemoryStore;
use crate::error::{StoreError, StoreResult};
use crate::store::{AdminStore, SessionStore};

#[async_trait]
impl SessionStore for InMemoryStore {
    async fn replace_sessions(&self, session: &Session) -> StoreResult<()> {
        let mut t = self.write()?;
        // Matched on kind + id so an admin's role change still replaces old sessions.
        let subject = session.principal.subject();
        let kind = session.principal.kind();
        t.sessions
            .retain(|_, s| !(s.principal.kind() == kind && s.principal.subject() == subject));
        t.sessions
            .insert(session.token.as_str().to_string(), session.clone());
        Ok(())
    }

    async fn find_session(&self, token: &SessionToken) -> StoreResult<Option<Session>> {
        Ok(self.read()?.sessions.get(token.as_str()).cloned())
    }

    async fn delete_session(&self, token: &SessionToken) -> StoreResult<bool> {
        Ok(self.write()?.sessions.remove(token.as_str()).is_some())
    }

    async fn purge_expired_sessions(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let mut t = self.write()?;
        let before = t.sessions.len();
        t.sessions.retain(|_, s| !s.is_expired(now));
        Ok((before - t.sessions.len()) as u64)
    }
}

#[async_trait]
impl AdminStore for InMemoryStore {
    async fn find_admin(&self, id: AdminId) -> StoreResult<Option<AdminUser>> {
        Ok(self.read()?.admins.get(&id).cloned())
    }

    async fn find_admin_by_username(&self, username: &str) -> StoreResult<Option<AdminUser>> {
        let username = username.trim().to_ascii_lowercase();
        Ok(self
            .read()?
            .admins
            .values()
            .find(|a| a.username == username)
            .cloned())
    }

    async fn insert_admin(&self, admin: &AdminUser) -> StoreResult<()> {
        let mut t = self.write()?;
        if t.admins.values().any(|a| a.username == admin.username) {
            return Err(StoreError::Conflict("username already taken".to_string()));
        }
        t.admins.insert(admin.id, admin.clone());
        Ok(())
    }

    async fn list_admins(&self) -> StoreResult<Vec<AdminUser>> {
        let mut rows: Vec<AdminUser> = self.read()?.admins.values().cloned().collect();
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(rows)
    }

    async fn record_admin_login(&self, id: AdminId, now: DateTime<Utc>) -> StoreResult<()> {
        let mut t = self.write()?;
        let admin = t
            .admins
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("admin"))?;
        admin.last_login = Some(now);
        Ok(())
    }
}

impl InMemoryStore {
    /// Place a session row as-is, e.g. one that has already expired.
    pub fn insert_session_unchecked(&self, session: Session) -> StoreResult<()> {
        self.write()?
            .sessions
            .insert(session.token.as_str().to_string(), session);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use herbstore_auth::{AdminRole, NewAdmin, Principal, SessionMeta};
    use herbstore_core::CustomerId;

    #[tokio::test]
    async fn new_session_replaces_earlier_ones_for_the_same_principal() {
        let store = InMemoryStore::new();
        let customer = Principal::Customer { id: CustomerId::new() };
        let other = Principal::Customer { id: CustomerId::new() };
        let now = Utc::now();

        let first = Session::issue(customer.clone(), now, SessionMeta::default());
        let theirs = Session::issue(other, now, SessionMeta::default());
        store.replace_sessions(&first).await.unwrap();
        store.replace_sessions(&theirs).await.unwrap();

        let second = Session::issue(customer, now, SessionMeta::default());
        store.replace_sessions(&second).await.unwrap();

        assert!(store.find_session(&first.token).await.unwrap().is_none());
        assert!(store.find_session(&second.token).await.unwrap().is_some());
        assert!(store.find_session(&theirs.token).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn admin_role_change_still_replaces_sessions() {
        let store = InMemoryStore::new();
        let id = AdminId::new();
        let now = Utc::now();
        let old = Session::issue(Principal::Admin { id, role: AdminRole::Admin }, now, SessionMeta::default());
        store.replace_sessions(&old).await.unwrap();
        let new = Session::issue(
            Principal::Admin { id, role: AdminRole::LimitedAdmin },
            now,
            SessionMeta::default(),
        );
        store.replace_sessions(&new).await.unwrap();
        assert!(store.find_session(&old.token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn logout_and_purge() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        let s = Session::issue(Principal::Customer { id: CustomerId::new() }, now, SessionMeta::default());
        store.replace_sessions(&s).await.unwrap();
        assert!(store.delete_session(&s.token).await.unwrap());
        assert!(!store.delete_session(&s.token).await.unwrap());

        let s = Session::issue(Principal::Customer { id: CustomerId::new() }, now, SessionMeta::default());
        store.replace_sessions(&s).await.unwrap();
        assert_eq!(store.purge_expired_sessions(now + Duration::hours(37)).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn admin_lookup_is_case_insensitive_and_unique() {
        let store = InMemoryStore::new();
        let admin = NewAdmin {
            username: "Owner".to_string(),
            password: "long-password".to_string(),
            role: AdminRole::Admin,
        }
        .into_admin(Utc::now())
        .unwrap();
        store.insert_admin(&admin).await.unwrap();
        assert!(store.find_admin_by_username("OWNER").await.unwrap().is_some());
        assert!(matches!(store.insert_admin(&admin).await, Err(StoreError::Conflict(_))));
        store.record_admin_login(admin.id, Utc::now()).await.unwrap();
        assert!(store.find_admin(admin.id).await.unwrap().unwrap().last_login.is_some());
    }
}
