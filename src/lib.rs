//! # mynotes (account slice)
//!
//! Registration, login and logout for a small notes application.
//!
//! The HTTP layer ([`api`]) is a set of thin form handlers. Everything that
//! touches credentials sits behind the [`identity::IdentityService`] trait:
//! password policy, Argon2id hashing, duplicate detection, persistence and
//! cookie sessions.
//!
//! ## Sessions
//!
//! A successful sign-in issues an opaque random token in the `mynotes_session`
//! cookie. Only the SHA-256 hash of the token is stored in PostgreSQL, next to
//! an expiry; "Remember me" extends that expiry and makes the cookie survive
//! browser restarts.
//!
//! ## Redirects
//!
//! After login the user is returned to the requested `returnUrl` only when it
//! is a local path. Anything that could leave the site falls back to
//! `/Home/Index`.

pub mod api;
pub mod cli;
pub mod identity;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};
