//! Demo sign-in helpers.
//!
//! The demo login screen performs no credential check: any password is
//! accepted and the role is read off the email address. This is a stand-in
//! for real verification against the auth endpoints in `RentalClient`, and
//! nothing in this crate uses it to authorize requests.

use crate::types::Role;

/// `Admin` when `email` contains `"admin"` (case-insensitive), else `User`.
pub fn infer_role(email: &str) -> Role {
    if email.to_ascii_lowercase().contains("admin") {
        Role::Admin
    } else {
        Role::User
    }
}
