// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Declarative macros shared across the workspace.

/// Generate a `Display` impl that maps enum variants to string literals,
/// plus a `FromStr` impl accepting the same strings.
///
/// ```ignore
/// crate::status_strings! {
///     MyStatus {
///         Pending => "pending",
///         Running => "running",
///     }
/// }
/// ```
#[macro_export]
macro_rules! status_strings {
    ($enum:ident { $( $variant:ident => $str:expr ),+ $(,)? }) => {
        impl std::fmt::Display for $enum {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(match self {
                    $( Self::$variant => $str, )+
                })
            }
        }

        impl std::str::FromStr for $enum {
            type Err = $crate::macros::UnknownStatus;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $( $str => Ok(Self::$variant), )+
                    other => Err($crate::macros::UnknownStatus(other.to_string())),
                }
            }
        }
    };
}

/// Error returned by the generated `FromStr` impls.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown status: {0:?}")]
pub struct UnknownStatus(pub String);
