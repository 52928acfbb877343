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

use std::cell::RefCell;
use std::collections::HashMap;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use tf_provider::schema::{
    Attribute, AttributeConstraint, AttributeType, Block, Description, NestedBlock, Schema,
};
use tf_provider::value::{Value, ValueString};
use tf_provider::{map, AttributePath, Diagnostics};

pub(crate) trait WithSchema {
    fn schema() -> Schema;
}

#[async_trait]
pub(crate) trait WithValidate {
    async fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath);
}

pub(crate) trait WithNormalize {
    fn normalize(&mut self, diags: &mut Diagnostics);
}

/// Shorthand for an attribute with a description
pub(crate) fn attribute(
    attr_type: AttributeType,
    constraint: AttributeConstraint,
    description: &str,
) -> Attribute {
    Attribute {
        attr_type,
        description: Description::plain(description),
        constraint,
        ..Default::default()
    }
}

pub(crate) fn string_list() -> AttributeType {
    AttributeType::List(AttributeType::String.into())
}

pub(crate) fn string_set() -> AttributeType {
    AttributeType::Set(AttributeType::String.into())
}

/// Computed list of objects, every field computed
pub(crate) fn computed_objects(
    description: &str,
    attributes: HashMap<String, Attribute>,
) -> Attribute {
    attribute(
        AttributeType::AttributeList(attributes),
        AttributeConstraint::Computed,
        description,
    )
}

/// `tags` set, shared by every taggable resource
pub(crate) fn tags_attribute(constraint: AttributeConstraint) -> Attribute {
    attribute(string_set(), constraint, "User tags attached to the resource")
}

/// Per operation timeouts, as Go durations (`30m`, `1h30m`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeouts<'a> {
    pub create: ValueString<'a>,
    pub update: ValueString<'a>,
    pub delete: ValueString<'a>,
}

impl<'a> Timeouts<'a> {
    pub(crate) fn block() -> NestedBlock {
        let timeout = |operation: &str| Attribute {
            attr_type: AttributeType::String,
            description: Description::plain(format!("Timeout of the {operation} operation")),
            constraint: AttributeConstraint::Optional,
            ..Default::default()
        };
        NestedBlock::Optional(Block {
            description: Description::plain("Operation timeouts"),
            attributes: map! {
                "create" => timeout("create"),
                "update" => timeout("update"),
                "delete" => timeout("delete"),
            },
            ..Default::default()
        })
    }
}

#[async_trait]
impl<'a> WithValidate for Timeouts<'a> {
    async fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        for (name, value) in [
            ("create", &self.create),
            ("update", &self.update),
            ("delete", &self.delete),
        ] {
            if let Value::Value(duration) = value {
                if let Err(err) = parse_duration(duration) {
                    diags.error(
                        "Invalid timeout",
                        err.to_string(),
                        attr_path.clone().attribute(name),
                    );
                }
            }
        }
    }
}

pub(crate) trait WithTimeouts {
    fn create_timeout(&self, default: Duration) -> Duration;
    fn update_timeout(&self, default: Duration) -> Duration;
    fn delete_timeout(&self, default: Duration) -> Duration;
}

impl<'a> WithTimeouts for Value<Timeouts<'a>> {
    fn create_timeout(&self, default: Duration) -> Duration {
        pick_timeout(self.as_ref().map(|t| &t.create), default)
    }
    fn update_timeout(&self, default: Duration) -> Duration {
        pick_timeout(self.as_ref().map(|t| &t.update), default)
    }
    fn delete_timeout(&self, default: Duration) -> Duration {
        pick_timeout(self.as_ref().map(|t| &t.delete), default)
    }
}

fn pick_timeout(value: Value<&ValueString<'_>>, default: Duration) -> Duration {
    value
        .as_option()
        .and_then(|value| value.as_deref_option())
        .and_then(|text| parse_duration(text).ok())
        .unwrap_or(default)
}

/// Split an ID made of `N` non-empty parts joined by `sep`
pub(crate) fn split_id<const N: usize>(id: &str, sep: char) -> Result<[&str; N]> {
    let parts: Vec<&str> = id.split(sep).collect();
    let count = parts.len();
    match <[&str; N]>::try_from(parts) {
        Ok(parts) if parts.iter().all(|part| !part.is_empty()) => Ok(parts),
        _ => Err(anyhow!(
            "Incorrect ID {id:?}: expected {N} non-empty parts separated by {sep:?}, got {count}"
        )),
    }
}

/// Parse a Go style duration: a sequence of decimal numbers with a unit suffix
pub fn parse_duration(text: &str) -> Result<Duration> {
    let invalid = || anyhow!("invalid duration {text:?}, expected values like \"30m\" or \"1h30m\"");
    let mut rest = text.trim();
    if rest.is_empty() {
        return Err(invalid());
    }
    if rest == "0" {
        return Ok(Duration::ZERO);
    }

    let mut total = 0.0f64;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(invalid)?;
        if number_len == 0 {
            return Err(invalid());
        }
        let number: f64 = rest[..number_len].parse().map_err(|_| invalid())?;
        rest = &rest[number_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let seconds = match &rest[..unit_len] {
            "ns" => 1e-9,
            "us" | "µs" => 1e-6,
            "ms" => 1e-3,
            "s" => 1.0,
            "m" => 60.0,
            "h" => 3600.0,
            _ => return Err(invalid()),
        };
        rest = &rest[unit_len..];
        total += number * seconds;
    }
    Ok(Duration::from_secs_f64(total))
}

pub struct DisplayJoiner<'a, T, I>
where
    T: Iterator<Item = I>,
    I: std::fmt::Display,
{
    iter: RefCell<T>,
    sep: &'a str,
}

pub trait DisplayJoinable {
    type Joiner<'a>;
    fn join_with(self, sep: &str) -> Self::Joiner<'_>;
}

impl<T, I> DisplayJoinable for T
where
    T: Iterator<Item = I>,
    I: std::fmt::Display,
{
    type Joiner<'a> = DisplayJoiner<'a, T, I>;

    fn join_with(self, sep: &str) -> Self::Joiner<'_> {
        DisplayJoiner {
            iter: RefCell::new(self),
            sep,
        }
    }
}

impl<'a, T, I> std::fmt::Display for DisplayJoiner<'a, T, I>
where
    T: Iterator<Item = I>,
    I: std::fmt::Display,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut sep = "";
        let mut iter = self.iter.try_borrow_mut().or(Err(std::fmt::Error))?;
        for elt in iter.by_ref() {
            f.write_str(sep)?;
            f.write_fmt(format_args!("{elt}"))?;
            sep = self.sep;
        }
        Ok(())
    }
}
