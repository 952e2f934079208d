//! Session state and the sign-out transition predicate.
//!
//! The session source is an external collaborator; this module only
//! defines the observed states and the one transition the cache cares
//! about: signed-in to signed-out, which flushes all registered stores.

use serde::{Deserialize, Serialize};

/// Authentication state reported by the session source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// Sign-in is in progress or state is not yet known.
    Loading,
    /// A user is signed in.
    SignedIn,
    /// No user is signed in.
    SignedOut,
}

impl SessionState {
    /// True when a user is signed in.
    pub fn is_signed_in(&self) -> bool {
        matches!(self, Self::SignedIn)
    }

    /// True when no user is signed in.
    pub fn is_signed_out(&self) -> bool {
        matches!(self, Self::SignedOut)
    }
}

/// Whether an observed state change is a sign-out transition.
///
/// Only SignedIn -> SignedOut flushes cached data; every other pair,
/// including repeats of the same state, leaves the cache alone.
pub fn is_sign_out_transition(previous: SessionState, next: SessionState) -> bool {
    previous == SessionState::SignedIn && next == SessionState::SignedOut
}
