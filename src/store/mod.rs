//! Role and user persistence backed by redb.
//!
//! Two relations: a role has many users, a user optionally belongs to one
//! role. Names are unique and capped (roles 55, usernames 64 characters).
//! Rows are JSON-serialized; ids are assigned from the highest existing key.

mod error;
mod tables;

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable};
use serde::{Deserialize, Serialize};

use crate::logger;
pub use error::{StoreError, StoreResult};
use tables::{ROLES, ROLE_NAMES, USERNAMES, USERS};

pub const ROLE_NAME_MAX: usize = 55;
pub const USERNAME_MAX: usize = 64;

/// Convert any `Display` error into a `StoreError` variant.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StoreError::$variant(e.to_string())
    };
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub username: String,
    pub role_id: Option<u64>,
}

/// Demonstration rows: (role, [usernames])
const SEED: &[(&str, &[&str])] = &[("Addm121", &["21M62"]), ("modd212", &["Joh21n26"])];

#[derive(Clone)]
pub struct Store {
    db: Arc<Database>,
}

impl Store {
    /// Open (or create) the database file and make sure every table exists.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.create_all()?;
        logger::log_debug(&format!("[Store] Opened {}", path.display()));
        Ok(store)
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.create_all()?;
        Ok(store)
    }

    /// Create any missing table; existing data is left alone.
    pub fn create_all(&self) -> StoreResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        txn.open_table(ROLES).map_err(map_err!(Table))?;
        txn.open_table(USERS).map_err(map_err!(Table))?;
        txn.open_table(ROLE_NAMES).map_err(map_err!(Table))?;
        txn.open_table(USERNAMES).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Delete every table and its rows.
    #[allow(dead_code)] // Used in tests
    pub fn drop_all(&self) -> StoreResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        txn.delete_table(USERNAMES).map_err(map_err!(Table))?;
        txn.delete_table(ROLE_NAMES).map_err(map_err!(Table))?;
        txn.delete_table(USERS).map_err(map_err!(Table))?;
        txn.delete_table(ROLES).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        logger::log_debug("[Store] All tables dropped");
        Ok(())
    }

    pub fn insert_role(&self, name: &str) -> StoreResult<Role> {
        check_length("role name", name, ROLE_NAME_MAX)?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let role;
        {
            let mut names = txn.open_table(ROLE_NAMES).map_err(map_err!(Table))?;
            if names.get(name).map_err(map_err!(Read))?.is_some() {
                return Err(StoreError::Duplicate {
                    field: "role name",
                    value: name.to_string(),
                });
            }
            let mut roles = txn.open_table(ROLES).map_err(map_err!(Table))?;
            let id = roles
                .last()
                .map_err(map_err!(Read))?
                .map_or(1, |(key, _)| key.value() + 1);
            role = Role {
                id,
                name: name.to_string(),
            };
            let value = serde_json::to_vec(&role).map_err(map_err!(Serialize))?;
            roles
                .insert(id, value.as_slice())
                .map_err(map_err!(Write))?;
            names.insert(name, id).map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        logger::log_debug(&format!("[Store] Role {} inserted as {}", role.name, role.id));
        Ok(role)
    }

    /// Insert a user, optionally attached to an existing role.
    pub fn insert_user(&self, username: &str, role_id: Option<u64>) -> StoreResult<User> {
        check_length("username", username, USERNAME_MAX)?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let user;
        {
            if let Some(role_id) = role_id {
                let roles = txn.open_table(ROLES).map_err(map_err!(Table))?;
                if roles.get(role_id).map_err(map_err!(Read))?.is_none() {
                    return Err(StoreError::UnknownRole(role_id));
                }
            }
            let mut names = txn.open_table(USERNAMES).map_err(map_err!(Table))?;
            if names.get(username).map_err(map_err!(Read))?.is_some() {
                return Err(StoreError::Duplicate {
                    field: "username",
                    value: username.to_string(),
                });
            }
            let mut users = txn.open_table(USERS).map_err(map_err!(Table))?;
            let id = users
                .last()
                .map_err(map_err!(Read))?
                .map_or(1, |(key, _)| key.value() + 1);
            user = User {
                id,
                username: username.to_string(),
                role_id,
            };
            let value = serde_json::to_vec(&user).map_err(map_err!(Serialize))?;
            users
                .insert(id, value.as_slice())
                .map_err(map_err!(Write))?;
            names.insert(username, id).map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        logger::log_debug(&format!("[Store] User {} inserted as {}", user.username, user.id));
        Ok(user)
    }

    #[allow(dead_code)] // Used in tests
    pub fn role(&self, id: u64) -> StoreResult<Option<Role>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(ROLES).map_err(map_err!(Table))?;
        match table.get(id).map_err(map_err!(Read))? {
            Some(guard) => Ok(Some(
                serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?,
            )),
            None => Ok(None),
        }
    }

    pub fn user(&self, id: u64) -> StoreResult<Option<User>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(USERS).map_err(map_err!(Table))?;
        match table.get(id).map_err(map_err!(Read))? {
            Some(guard) => Ok(Some(
                serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?,
            )),
            None => Ok(None),
        }
    }

    pub fn user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let id = {
            let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
            let index = txn.open_table(USERNAMES).map_err(map_err!(Table))?;
            let found = index.get(username).map_err(map_err!(Read))?;
            match found {
                Some(guard) => guard.value(),
                None => return Ok(None),
            }
        };
        self.user(id)
    }

    /// The users that belong to a role, in id order
    pub fn users_in_role(&self, role_id: u64) -> StoreResult<Vec<User>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(USERS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let user: User =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            if user.role_id == Some(role_id) {
                results.push(user);
            }
        }
        Ok(results)
    }

    pub fn list_roles(&self) -> StoreResult<Vec<Role>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(ROLES).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            results.push(serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?);
        }
        Ok(results)
    }

    /// Insert the demonstration roles and users when the store holds no roles.
    /// Returns whether anything was inserted.
    pub fn seed_defaults(&self) -> StoreResult<bool> {
        let empty = {
            let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
            let table = txn.open_table(ROLES).map_err(map_err!(Table))?;
            let first = table.first().map_err(map_err!(Read))?;
            first.is_none()
        };
        if !empty {
            return Ok(false);
        }
        for (role_name, usernames) in SEED {
            let role = self.insert_role(role_name)?;
            for username in *usernames {
                self.insert_user(username, Some(role.id))?;
            }
        }
        logger::log_info("[Store] Seeded demonstration roles and users");
        Ok(true)
    }
}

fn check_length(field: &'static str, value: &str, max: usize) -> StoreResult<()> {
    let len = value.chars().count();
    if len == 0 || len > max {
        return Err(StoreError::InvalidLength { field, max });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> Store {
        Store::open_in_memory().unwrap()
    }

    #[test]
    fn test_insert_and_fetch_role() {
        let store = store();
        let admin = store.insert_role("admin").unwrap();
        let moderator = store.insert_role("moderator").unwrap();
        assert_eq!(admin.id, 1);
        assert_eq!(moderator.id, 2);
        assert_eq!(store.role(2).unwrap(), Some(moderator));
        assert!(store.role(3).unwrap().is_none());
    }

    #[test]
    fn test_role_name_unique() {
        let store = store();
        store.insert_role("admin").unwrap();
        let err = store.insert_role("admin").unwrap_err();
        assert!(matches!(err, StoreError::Duplicate { field: "role name", .. }));
        assert_eq!(store.list_roles().unwrap().len(), 1);
    }

    #[test]
    fn test_length_limits() {
        let store = store();
        assert!(store.insert_role(&"r".repeat(55)).is_ok());
        assert!(matches!(
            store.insert_role(&"r".repeat(56)),
            Err(StoreError::InvalidLength { max: 55, .. })
        ));
        assert!(store.insert_user(&"u".repeat(64), None).is_ok());
        assert!(matches!(
            store.insert_user(&"u".repeat(65), None),
            Err(StoreError::InvalidLength { max: 64, .. })
        ));
        assert!(store.insert_user("", None).is_err());
    }

    #[test]
    fn test_user_requires_existing_role() {
        let store = store();
        assert!(matches!(
            store.insert_user("ghost", Some(9)),
            Err(StoreError::UnknownRole(9))
        ));
        assert!(store.user_by_username("ghost").unwrap().is_none());
    }

    #[test]
    fn test_users_in_role() {
        let store = store();
        let admin = store.insert_role("admin").unwrap();
        let other = store.insert_role("other").unwrap();
        store.insert_user("alice", Some(admin.id)).unwrap();
        store.insert_user("bob", Some(other.id)).unwrap();
        store.insert_user("carol", Some(admin.id)).unwrap();
        store.insert_user("dave", None).unwrap();

        let names: Vec<String> = store
            .users_in_role(admin.id)
            .unwrap()
            .into_iter()
            .map(|u| u.username)
            .collect();
        assert_eq!(names, vec!["alice", "carol"]);
    }

    #[test]
    fn test_username_unique_and_lookup() {
        let store = store();
        let alice = store.insert_user("alice", None).unwrap();
        assert!(matches!(
            store.insert_user("alice", None),
            Err(StoreError::Duplicate { field: "username", .. })
        ));
        assert_eq!(store.user_by_username("alice").unwrap(), Some(alice.clone()));
        assert_eq!(store.user(alice.id).unwrap(), Some(alice));
    }

    #[test]
    fn test_seed_defaults_once() {
        let store = store();
        assert!(store.seed_defaults().unwrap());
        assert!(!store.seed_defaults().unwrap());
        assert_eq!(store.list_roles().unwrap().len(), 2);
        let john = store.user_by_username("Joh21n26").unwrap().unwrap();
        let role = store.role(john.role_id.unwrap()).unwrap().unwrap();
        assert_eq!(role.name, "modd212");
    }

    #[test]
    fn test_seeded_roles_each_have_a_member() {
        let store = store();
        store.seed_defaults().unwrap();
        for role in store.list_roles().unwrap() {
            let members = store.users_in_role(role.id).unwrap();
            assert_eq!(members.len(), 1, "role {}", role.name);
        }
    }

    #[test]
    fn test_drop_and_recreate() {
        let store = store();
        store.seed_defaults().unwrap();
        store.drop_all().unwrap();
        assert!(store.list_roles().is_err());
        store.create_all().unwrap();
        assert!(store.list_roles().unwrap().is_empty());
        assert!(store.user_by_username("21M62").unwrap().is_none());
    }

    #[test]
    fn test_on_disk_persists() {
        let dir = std::env::temp_dir().join(format!("webtour-store-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("store.redb");
        {
            let store = Store::open(&path).unwrap();
            store.insert_role("admin").unwrap();
        }
        let store = Store::open(&path).unwrap();
        assert_eq!(store.list_roles().unwrap()[0].name, "admin");
        let _ = std::fs::remove_dir_all(dir);
    }
}
