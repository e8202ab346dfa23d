//! Route handlers for mynotes.
//!
//! Account pages live under [`account`]; [`home`] renders the landing page and
//! [`health`] reports build info and database reachability.

pub mod account;
pub mod health;
pub mod home;
