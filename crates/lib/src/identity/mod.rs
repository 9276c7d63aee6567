//! Identity provider abstraction.
//!
//! The engine never authenticates anyone itself; it asks an
//! [`IdentityProvider`] who the current user is. [`StaticIdentity`] covers
//! tests and single-user deployments.

use std::fmt::Debug;
use std::sync::RwLock;

use thiserror::Error;

use crate::model::Id;

/// Errors from the identity provider.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum IdentityError {
    /// No user is signed in; every mutation requires one.
    #[error("No user is signed in")]
    SignedOut,
}

impl IdentityError {
    /// Check if this is the signed-out error.
    pub fn is_signed_out(&self) -> bool {
        matches!(self, IdentityError::SignedOut)
    }
}

impl From<IdentityError> for crate::Error {
    fn from(err: IdentityError) -> Self {
        crate::Error::Identity(err)
    }
}

/// The signed-in user as the identity provider knows them.
#[derive(Debug, Clone, PartialEq)]
pub struct UserProfile {
    pub id: Id,
    pub display_name: String,
    pub avatar_url: Option<String>,
}

impl UserProfile {
    pub fn new(id: impl Into<Id>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            avatar_url: None,
        }
    }

    /// Sets the avatar URL.
    pub fn with_avatar(mut self, url: impl Into<String>) -> Self {
        self.avatar_url = Some(url.into());
        self
    }
}

/// Source of the current user's identity.
pub trait IdentityProvider: Send + Sync + Debug {
    /// The currently signed-in user, or [`IdentityError::SignedOut`].
    fn current_user(&self) -> Result<UserProfile, IdentityError>;

    /// Returns true if a user is signed in.
    fn is_signed_in(&self) -> bool {
        self.current_user().is_ok()
    }
}

/// An identity provider holding one switchable profile.
#[derive(Debug, Default)]
pub struct StaticIdentity {
    user: RwLock<Option<UserProfile>>,
}

impl StaticIdentity {
    /// A provider with the given user signed in.
    pub fn signed_in(profile: UserProfile) -> Self {
        Self {
            user: RwLock::new(Some(profile)),
        }
    }

    /// A provider with nobody signed in.
    pub fn signed_out() -> Self {
        Self::default()
    }

    /// Signs a user in, replacing any previous one.
    pub fn sign_in(&self, profile: UserProfile) {
        *self.user.write().unwrap() = Some(profile);
    }

    /// Signs the current user out.
    pub fn sign_out(&self) {
        *self.user.write().unwrap() = None;
    }
}

impl IdentityProvider for StaticIdentity {
    fn current_user(&self) -> Result<UserProfile, IdentityError> {
        self.user
            .read()
            .unwrap()
            .clone()
            .ok_or(IdentityError::SignedOut)
    }
}
