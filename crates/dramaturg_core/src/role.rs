//! Role types for conversation participants.

use serde::{Deserialize, Serialize};

/// Sender of a message in a model conversation.
///
/// # Examples
///
/// ```
/// use dramaturg_core::Role;
///
/// assert_ne!(Role::User, Role::Assistant);
/// assert_eq!(format!("{}", Role::System), "System");
/// ```
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Stage instructions
    System,
    /// Stage payload and retry feedback
    User,
    /// Model replies
    Assistant,
}
