use parking_lot::RwLock;

use crate::api::User;

/// Process-wide signed-in-user state. Created once at startup and shared
/// by both controllers; the user inside is a cache of the backend's view,
/// invalidated on sign-out and replaced wholesale on sign-in.
#[derive(Default)]
pub struct Session {
    user: RwLock<Option<User>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sign_in(&self, user: User) {
        log::debug!("session: signed in as {}", user.id);
        *self.user.write() = Some(user);
    }

    pub fn clear(&self) {
        log::debug!("session: cleared");
        *self.user.write() = None;
    }

    pub fn current(&self) -> Option<User> {
        self.user.read().clone()
    }

    pub fn user_id(&self) -> Option<String> {
        self.user.read().as_ref().map(|user| user.id.clone())
    }

    pub fn is_signed_in(&self) -> bool {
        self.user.read().is_some()
    }

    /// Replace the library with the authoritative set from a library
    /// response. No-op when signed out (a late response after logout).
    pub fn replace_library(&self, library: Vec<String>) {
        if let Some(user) = self.user.write().as_mut() {
            user.library = library;
        }
    }

    /// Optimistic subscription membership flip; reconciled by the next
    /// full user fetch.
    pub fn set_subscribed(&self, channel_id: &str, subscribed: bool) {
        if let Some(user) = self.user.write().as_mut() {
            if subscribed {
                if !user.subscribed_users.iter().any(|id| id == channel_id) {
                    user.subscribed_users.push(channel_id.to_string());
                }
            } else {
                user.subscribed_users.retain(|id| id != channel_id);
            }
        }
    }
}
