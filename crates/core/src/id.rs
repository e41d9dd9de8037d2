// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Identifier newtypes shared across the fleet.

/// Define a newtype ID wrapper around `String`.
///
/// Generates `new()`, `as_str()`, `Display`, `From<String>`, `From<&str>`,
/// `PartialEq<str>`, `PartialEq<&str>`, and `Borrow<str>` implementations.
///
/// ```ignore
/// define_id! {
///     /// Doc comment for the ID type.
///     pub struct MyId;
/// }
/// ```
#[macro_export]
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        pub struct $name:ident;
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

define_id! {
    /// Stable identity of a bot slot.
    ///
    /// Survives restarts: the worker object behind a slot is replaced on
    /// relaunch, the instance id is not.
    pub struct InstanceId;
}

define_id! {
    /// Identity of a pooled account.
    pub struct AccountId;
}

define_id! {
    /// Name of a worker group.
    pub struct GroupName;
}

define_id! {
    /// Name of a routine in the routine catalog.
    pub struct RoutineName;
}

define_id! {
    /// Unique identifier of a published event.
    pub struct EventId;
}

impl EventId {
    /// Generate a fresh random event id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl InstanceId {
    /// Slot id for the `n`th member of a numbered group, e.g. `farm-3`.
    pub fn numbered(prefix: &str, n: usize) -> Self {
        Self(format!("{}-{}", prefix, n))
    }
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
