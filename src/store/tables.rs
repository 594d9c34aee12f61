//! redb table definitions.
//!
//! Rows are JSON in `&[u8]` values keyed by numeric id. The two index
//! tables enforce the unique columns and serve name lookups.

use redb::TableDefinition;

/// Role rows keyed by id.
pub const ROLES: TableDefinition<u64, &[u8]> = TableDefinition::new("roles");

/// User rows keyed by id.
pub const USERS: TableDefinition<u64, &[u8]> = TableDefinition::new("users");

/// Unique index: role name to role id.
pub const ROLE_NAMES: TableDefinition<&str, u64> = TableDefinition::new("role_names");

/// Unique index: username to user id.
pub const USERNAMES: TableDefinition<&str, u64> = TableDefinition::new("usernames");
