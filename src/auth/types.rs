//! Authenticated request identity.

use crate::db::Account;
use crate::jwt::Claims;

/// The account behind a verified access token.
///
/// Inserted into the request extensions by the [`Auth`](super::Auth)
/// extractor so later extractors on the same request reuse it.
#[derive(Debug, Clone)]
pub struct AuthenticatedAccount {
    /// Account as loaded while checking the token version
    pub account: Account,
    /// Raw bearer token
    pub token: String,
    pub claims: Claims,
}
