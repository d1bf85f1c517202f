// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    empty = { "", 1, SpecError::EmptyResourceType },
    blank = { "   ", 2, SpecError::EmptyResourceType },
    zero = { "aws-quota-slice", 0, SpecError::ZeroCount("aws-quota-slice".to_string()) },
)]
fn invalid_specs_are_rejected(resource_type: &str, count: u32, expected: SpecError) {
    assert_eq!(LeaseSpec::new(resource_type, count), Err(expected));
}

#[test]
fn valid_spec_exposes_fields() {
    let spec = LeaseSpec::new("gcp-quota-slice", 5).unwrap();
    assert_eq!(spec.resource_type(), "gcp-quota-slice");
    assert_eq!(spec.count(), 5);
    assert_eq!(spec.to_string(), "5xgcp-quota-slice");
}

#[test]
fn duplicate_types_fail_validation() {
    let specs = vec![
        LeaseSpec::one("aws-quota-slice").unwrap(),
        LeaseSpec::one("gcp-quota-slice").unwrap(),
        LeaseSpec::new("aws-quota-slice", 2).unwrap(),
    ];
    assert_eq!(
        validate_specs(&specs),
        Err(SpecError::DuplicateResourceType(
            "aws-quota-slice".to_string()
        ))
    );
}

#[test]
fn distinct_types_pass_validation() {
    let specs = vec![
        LeaseSpec::new("aws-quota-slice", 3).unwrap(),
        LeaseSpec::new("gcp-quota-slice", 5).unwrap(),
    ];
    assert!(validate_specs(&specs).is_ok());
    assert!(validate_specs(&[]).is_ok());
}

#[derive(Debug, serde::Deserialize)]
struct Wrapper {
    lease: Vec<LeaseSpec>,
}

#[test]
fn count_defaults_to_one_when_deserialized() {
    let wrapper: Wrapper = serde_json::from_str(
        r#"{"lease": [{"resource_type": "aws-quota-slice"}, {"resource_type": "gcp-quota-slice", "count": 4}]}"#,
    )
    .unwrap();
    assert_eq!(wrapper.lease[0].count(), 1);
    assert_eq!(wrapper.lease[1].count(), 4);
}

#[test]
fn deserializing_invalid_spec_fails() {
    let zero: Result<Wrapper, _> =
        serde_json::from_str(r#"{"lease": [{"resource_type": "aws-quota-slice", "count": 0}]}"#);
    assert!(zero.unwrap_err().to_string().contains("must be at least 1"));

    let empty: Result<Wrapper, _> = serde_json::from_str(r#"{"lease": [{"resource_type": ""}]}"#);
    assert!(empty.is_err());
}
