//! The identity collaborator seam.
//!
//! Real names and avatars live outside this core. The engine only ever
//! asks for them through [`IdentityProvider`], and only for chats that
//! have completed a reveal. Pre-reveal code paths never issue the lookup,
//! so the leak surface is the projection boundary and nothing else.

use std::sync::Mutex;

use veil_shared::types::UserId;
use veil_store::Database;

/// A user's real, post-reveal identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RealProfile {
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

pub trait IdentityProvider: Send + Sync {
    /// Look up a user's real profile. `None` when the user is unknown to
    /// the identity service or has no public profile.
    fn real_profile(&self, user: UserId) -> Option<RealProfile>;
}

/// Provider backed by the store's `profiles` cache table.
///
/// Holds its own connection to the database file (WAL mode makes the extra
/// reader cheap), so projection reads never contend with the engine's
/// write connection.
pub struct StoreIdentityProvider {
    db: Mutex<Database>,
}

impl StoreIdentityProvider {
    pub fn new(db: Database) -> Self {
        Self { db: Mutex::new(db) }
    }
}

impl IdentityProvider for StoreIdentityProvider {
    fn real_profile(&self, user: UserId) -> Option<RealProfile> {
        let db = match self.db.lock() {
            Ok(db) => db,
            Err(poisoned) => {
                tracing::error!(user = %user, "identity cache lock poisoned");
                poisoned.into_inner()
            }
        };

        match db.get_profile(user) {
            Ok(Some(profile)) => Some(RealProfile {
                display_name: profile.display_name,
                avatar_url: profile.avatar_url,
            }),
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(user = %user, error = %e, "identity lookup failed");
                None
            }
        }
    }
}
