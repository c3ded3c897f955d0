//! Bearer-token authentication for protected routes.
//!
//! Access tokens (15 min) travel in the `Authorization` header and are
//! checked by the [`Auth`] extractor. Refresh tokens (1 day) travel in an
//! HTTP-only cookie scoped to the auth routes and are only accepted by the
//! refresh endpoint. Both embed the account's token version; bumping the
//! version invalidates every token issued before it.

mod cookie;
mod errors;
mod extractors;
mod ip;
mod state;
mod types;

pub use cookie::{REFRESH_COOKIE_NAME, clear_refresh_cookie, get_cookie, refresh_cookie};
pub use errors::{AuthError, ErrorKind};
pub use extractors::Auth;
pub use ip::{HasHeadersAndExtensions, extract_client_ip};
pub use state::HasAuthBackend;
pub use types::AuthenticatedAccount;
