// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[yare::parameterized(
    plain     = { "env=prod", "env", "prod" },
    empty_val = { "flag=", "flag", "" },
    equals_in_value = { "expr=a=b", "expr", "a=b" },
)]
fn parse_var_accepts(raw: &str, key: &str, value: &str) {
    assert_eq!(
        parse_var(raw).unwrap(),
        (key.to_string(), value.to_string())
    );
}

#[yare::parameterized(
    no_equals = { "plain" },
    empty_key = { "=value" },
)]
fn parse_var_rejects(raw: &str) {
    assert!(parse_var(raw).is_err());
}

#[test]
fn client_trims_trailing_slash() {
    let client = Client::new("http://localhost:8080/".into(), None);
    assert_eq!(client.server, "http://localhost:8080");
}
