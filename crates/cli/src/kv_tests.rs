// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;
use yare::parameterized;

fn toks(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[test]
fn empty_tokens_are_an_empty_object() {
    assert_eq!(parse_args(&[]).unwrap(), Map::new());
}

#[test]
fn equals_pairs_become_an_object() {
    let map = parse_args(&toks(&["x=1", "flag=true"])).unwrap();
    assert_eq!(map["x"], json!(1));
    assert_eq!(map["flag"], json!(true));
}

#[test]
fn colon_separator_is_accepted() {
    let map = parse_args(&toks(&["x:2"])).unwrap();
    assert_eq!(map["x"], json!(2));
}

#[test]
fn values_are_raw_json() {
    let map = parse_args(&toks(&["name=\"report\"", "items=[1,2,3]"])).unwrap();
    assert_eq!(map["name"], json!("report"));
    assert_eq!(map["items"], json!([1, 2, 3]));
}

#[test]
fn single_token_falls_back_to_json_object() {
    let map = parse_args(&toks(&["{\"x\": 1, \"y\": \"z\"}"])).unwrap();
    assert_eq!(map["x"], json!(1));
    assert_eq!(map["y"], json!("z"));
}

#[parameterized(
    bare_word = { &["hello"] },
    unquoted_string_value = { &["x=hello", "y=1"] },
    bad_key = { &["bad key=1", "y=2"] },
    non_object_json = { &["[1,2]"] },
)]
fn unparseable_tokens_fail(tokens: &[&str]) {
    assert!(parse_args(&toks(tokens)).is_err());
}

#[test]
fn whitespace_around_separator_is_tolerated() {
    let map = parse_args(&toks(&["x = 3"])).unwrap();
    assert_eq!(map["x"], json!(3));
}
