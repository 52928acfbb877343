// This file is part of the terraform-provider-ibm project
//
// Copyright (C) ANEO, 2024-2024. All rights reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License")
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Attribute validators. Unknown and null values are always accepted:
//! they are checked again once Terraform knows them.

use lazy_static::lazy_static;
use regex::Regex;

use tf_provider::value::{ValueNumber, ValueSet, ValueString};
use tf_provider::{AttributePath, Diagnostics};

use crate::utils::DisplayJoinable;

lazy_static! {
    static ref RESOURCE_NAME: Regex = Regex::new("^([a-z]|[a-z][-a-z0-9]*[a-z0-9])$").unwrap();
    static ref TAG: Regex = Regex::new("^[A-Za-z0-9:_ .-]+$").unwrap();
}

/// VPC resource names: lowercase, dashes inside, 1 to 63 characters
pub(crate) fn resource_name(diags: &mut Diagnostics, attr_path: AttributePath, value: &ValueString) {
    regex_len(diags, attr_path, value, &RESOURCE_NAME, 1, 63);
}

pub(crate) fn tags(diags: &mut Diagnostics, attr_path: AttributePath, value: &ValueSet<ValueString>) {
    for tag in value.iter().flatten() {
        if let Some(tag) = tag.as_deref_option() {
            if !(1..=128).contains(&tag.len()) || !TAG.is_match(tag) {
                diags.error(
                    "Invalid tag",
                    format!(
                        "Tag {tag:?} must match {} and contain from 1 to 128 characters",
                        TAG.as_str()
                    ),
                    attr_path.clone(),
                );
            }
        }
    }
}

pub(crate) fn regex_len(
    diags: &mut Diagnostics,
    attr_path: AttributePath,
    value: &ValueString,
    regex: &Regex,
    min: usize,
    max: usize,
) {
    let Some(text) = value.as_deref_option() else {
        return;
    };
    if !regex.is_match(text) {
        diags.error(
            "Invalid value",
            format!("{text:?} should match regexp {}", regex.as_str()),
            attr_path,
        );
    } else if !(min..=max).contains(&text.len()) {
        diags.error(
            "Invalid value",
            format!("{text:?} must contain from {min} to {max} characters"),
            attr_path,
        );
    }
}

pub(crate) fn allowed_string(
    diags: &mut Diagnostics,
    attr_path: AttributePath,
    value: &ValueString,
    allowed: &[&str],
) {
    let Some(text) = value.as_deref_option() else {
        return;
    };
    if !allowed.contains(&text) {
        diags.error(
            "Invalid value",
            format!(
                "Must be one of [{}], got {text:?}",
                allowed.iter().join_with(", ")
            ),
            attr_path,
        );
    }
}

pub(crate) fn allowed_int(
    diags: &mut Diagnostics,
    attr_path: AttributePath,
    value: &ValueNumber,
    allowed: &[i64],
) {
    let Some(number) = value.as_ref_option() else {
        return;
    };
    if !allowed.contains(number) {
        diags.error(
            "Invalid value",
            format!(
                "Must be one of [{}], got {number}",
                allowed.iter().join_with(", ")
            ),
            attr_path,
        );
    }
}

pub(crate) fn int_range(
    diags: &mut Diagnostics,
    attr_path: AttributePath,
    value: &ValueNumber,
    min: i64,
    max: i64,
) {
    let Some(number) = value.as_ref_option() else {
        return;
    };
    if !(min..=max).contains(number) {
        diags.error(
            "Value out of range",
            format!("Must be between {min} and {max}, got {number}"),
            attr_path,
        );
    }
}

/// Reject blocks that set more than one of mutually exclusive attributes
pub(crate) fn at_most_one(diags: &mut Diagnostics, attr_path: AttributePath, set: &[(&str, bool)]) {
    let given: Vec<&str> = set
        .iter()
        .filter_map(|(name, is_set)| is_set.then_some(*name))
        .collect();
    if given.len() > 1 {
        diags.error(
            "Conflicting attributes",
            format!(
                "Only one of [{}] can be set, got [{}]",
                set.iter().map(|(name, _)| name).join_with(", "),
                given.iter().join_with(", ")
            ),
            attr_path,
        );
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use tf_provider::value::Value;

    use super::*;

    fn errors(check: impl FnOnce(&mut Diagnostics)) -> usize {
        let mut diags = Diagnostics::default();
        check(&mut diags);
        diags.errors.len()
    }

    #[test]
    fn names() {
        let path = || AttributePath::new("name");
        for good in ["a", "my-acl", "acl-01"] {
            assert_eq!(errors(|d| resource_name(d, path(), &good.into())), 0, "{good}");
        }
        for bad in ["", "-acl", "acl-", "Acl", "1acl", "acl_1"] {
            assert_eq!(errors(|d| resource_name(d, path(), &bad.into())), 1, "{bad}");
        }
        let long = ValueString::from("a".repeat(64));
        assert_eq!(errors(|d| resource_name(d, path(), &long)), 1);
        assert_eq!(errors(|d| resource_name(d, path(), &Value::Unknown)), 0);
        assert_eq!(errors(|d| resource_name(d, path(), &Value::Null)), 0);
    }

    #[test]
    fn tag_values() {
        let tags_set: ValueSet<ValueString> = Value::Value(BTreeSet::from(
            ["env:prod", "bad/tag", "ok tag"].map(ValueString::from),
        ));
        assert_eq!(errors(|d| tags(d, AttributePath::new("tags"), &tags_set)), 1);
    }

    #[test]
    fn enums_and_ranges() {
        let path = || AttributePath::new("x");
        assert_eq!(errors(|d| allowed_string(d, path(), &"allow".into(), &["allow", "deny"])), 0);
        assert_eq!(errors(|d| allowed_string(d, path(), &"drop".into(), &["allow", "deny"])), 1);
        assert_eq!(errors(|d| allowed_int(d, path(), &Value::Value(125), &[100, 125])), 0);
        assert_eq!(errors(|d| allowed_int(d, path(), &Value::Value(110), &[100, 125])), 1);
        assert_eq!(errors(|d| int_range(d, path(), &Value::Value(0), 1, 65535)), 1);
        assert_eq!(errors(|d| int_range(d, path(), &Value::Value(65535), 1, 65535)), 0);
    }

    #[test]
    fn exclusive_attributes() {
        let path = || AttributePath::new("rules");
        assert_eq!(errors(|d| at_most_one(d, path(), &[("icmp", true), ("tcp", false)])), 0);
        assert_eq!(errors(|d| at_most_one(d, path(), &[("icmp", true), ("tcp", true)])), 1);
    }
}
