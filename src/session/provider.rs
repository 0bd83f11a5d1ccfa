//! Identity provider capability

use super::events::{Identity, IdentitySubscription};
use crate::error::Result;
use async_trait::async_trait;

/// External identity provider (sign-in, token minting, change notifications)
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Start receiving identity changes. The first event reports the
    /// provider's resolved state (signed in or signed out).
    async fn subscribe(&self) -> IdentitySubscription;

    /// Mint a fresh bearer credential for `identity`, bypassing any cached token
    async fn fresh_credential(&self, identity: &Identity) -> Result<String>;

    /// Sign in with email and password
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Identity>;

    /// Create an account and sign it in
    async fn sign_up(&self, email: &str, password: &str) -> Result<Identity>;

    /// Terminate the provider-side session
    async fn sign_out(&self) -> Result<()>;
}
