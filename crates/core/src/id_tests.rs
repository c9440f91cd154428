// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::collections::HashSet;

#[test]
fn short_id_is_eight_hex_chars() {
    let id = short_id();
    assert_eq!(id.len(), SHORT_ID_LEN);
    assert!(id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
}

#[test]
fn short_ids_are_distinct() {
    let ids: HashSet<String> = (0..1000).map(|_| short_id()).collect();
    assert_eq!(ids.len(), 1000);
}
