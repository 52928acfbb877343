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

//! Nested API objects flattened into lists of string-keyed objects

use std::borrow::Cow;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use tf_provider::map;
use tf_provider::schema::{Attribute, AttributeConstraint, AttributeType};
use tf_provider::value::{Value, ValueList, ValueNumber, ValueString};

use crate::client::vpc::{Reference, StatusReason, Vcpu};
use crate::utils::attribute;

/// Absent optional strings become null
pub(crate) fn opt_string<'a>(value: Option<String>) -> ValueString<'a> {
    value.map(Cow::Owned).into()
}

/// Wrap a flattened object into a single element list
pub(crate) fn single<T>(item: T) -> ValueList<Value<T>> {
    Value::Value(vec![Value::Value(item)])
}

pub(crate) fn many<T, U>(
    items: impl IntoIterator<Item = U>,
    f: impl FnMut(U) -> T,
) -> ValueList<Value<T>> {
    Value::Value(items.into_iter().map(f).map(Value::Value).collect())
}

/// List data sources have no remote identity: every read gets a fresh id
pub(crate) fn data_source_id() -> String {
    OffsetDateTime::now_utc().unix_timestamp_nanos().to_string()
}

pub(crate) fn computed(attr_type: AttributeType, description: &str) -> Attribute {
    attribute(attr_type, AttributeConstraint::Computed, description)
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceState<'a> {
    pub id: ValueString<'a>,
    pub name: ValueString<'a>,
    pub crn: ValueString<'a>,
}

impl<'a> From<Reference> for ReferenceState<'a> {
    fn from(reference: Reference) -> Self {
        Self {
            id: reference.id.into(),
            name: opt_string(reference.name),
            crn: opt_string(reference.crn),
        }
    }
}

impl<'a> ReferenceState<'a> {
    pub(crate) fn attributes() -> HashMap<String, Attribute> {
        map! {
            "id" => computed(AttributeType::String, "ID"),
            "name" => computed(AttributeType::String, "Name"),
            "crn" => computed(AttributeType::String, "CRN"),
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VcpuState<'a> {
    pub architecture: ValueString<'a>,
    pub count: ValueNumber,
    pub manufacturer: ValueString<'a>,
}

impl<'a> From<Vcpu> for VcpuState<'a> {
    fn from(vcpu: Vcpu) -> Self {
        Self {
            architecture: vcpu.architecture.into(),
            count: Value::Value(vcpu.count),
            manufacturer: opt_string(vcpu.manufacturer),
        }
    }
}

impl<'a> VcpuState<'a> {
    pub(crate) fn attributes() -> HashMap<String, Attribute> {
        map! {
            "architecture" => computed(AttributeType::String, "VCPU architecture"),
            "count" => computed(AttributeType::Number, "Number of VCPUs"),
            "manufacturer" => computed(AttributeType::String, "VCPU manufacturer"),
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReasonState<'a> {
    pub code: ValueString<'a>,
    pub message: ValueString<'a>,
    pub more_info: ValueString<'a>,
}

impl<'a> From<StatusReason> for StatusReasonState<'a> {
    fn from(reason: StatusReason) -> Self {
        Self {
            code: reason.code.into(),
            message: reason.message.into(),
            more_info: opt_string(reason.more_info),
        }
    }
}

impl<'a> StatusReasonState<'a> {
    pub(crate) fn attributes() -> HashMap<String, Attribute> {
        map! {
            "code" => computed(AttributeType::String, "Status reason code"),
            "message" => computed(AttributeType::String, "Explanation of the status"),
            "more_info" => computed(AttributeType::String, "Link to documentation about this status reason"),
        }
    }
}
