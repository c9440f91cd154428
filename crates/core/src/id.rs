// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Identifier generation.
//!
//! Jobs, plan runs, and server-assigned node ids all share the same short
//! hex format so they can be pasted into URLs and log greps without quoting.

/// Length of generated identifiers.
pub const SHORT_ID_LEN: usize = 8;

const HEX: [char; 16] = [
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', 'a', 'b', 'c', 'd', 'e', 'f',
];

/// Generate a new 8-character lowercase-hex id.
///
/// nanoid draws from the OS CSPRNG, so ids are safe to hand out to
/// untrusted callers without leaking a sequence.
pub fn short_id() -> String {
    nanoid::nanoid!(SHORT_ID_LEN, &HEX)
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
