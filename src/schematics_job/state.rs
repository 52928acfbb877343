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

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use tf_provider::schema::{
    AttributeConstraint, AttributeType, Block, Description, NestedBlock, Schema,
};
use tf_provider::value::{Value, ValueBool, ValueList, ValueSet, ValueString};
use tf_provider::{map, AttributePath, Diagnostics};

use crate::client::schematics::{Job, JobPrototype, VariableData, VariableMetadata};
use crate::flatten::opt_string;
use crate::utils::{attribute, string_list, string_set, WithSchema, WithValidate};
use crate::validators;

pub(super) const COMMAND_OBJECTS: &[&str] = &["action", "workspace"];
pub(super) const COMMAND_NAMES: &[&str] = &[
    "ansible_playbook_check",
    "ansible_playbook_run",
    "helm_install",
    "helm_list",
    "helm_show",
    "opa_evaluate",
    "terraform_init",
    "terrform_apply",
    "terrform_destroy",
    "terrform_plan",
    "terrform_refresh",
    "terrform_show",
    "terrform_taint",
    "workspace_apply_flow",
    "workspace_custom_flow",
    "workspace_destroy_flow",
    "workspace_init_flow",
    "workspace_plan_flow",
    "workspace_refresh_flow",
    "workspace_show_flow",
];
pub(super) const LOCATIONS: &[&str] = &["eu-de", "eu-gb", "us-east", "us-south"];

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchematicsJobState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub command_object: ValueString<'a>,
    pub command_object_id: ValueString<'a>,
    pub command_name: ValueString<'a>,
    pub command_parameter: ValueString<'a>,
    pub command_options: ValueList<ValueString<'a>>,
    pub job_inputs: ValueList<Value<VariableState<'a>>>,
    pub job_env_settings: ValueList<Value<VariableState<'a>>>,
    pub tags: ValueSet<ValueString<'a>>,
    pub location: ValueString<'a>,
    pub name: ValueString<'a>,
    pub description: ValueString<'a>,
    pub resource_group: ValueString<'a>,
    pub submitted_at: ValueString<'a>,
    pub submitted_by: ValueString<'a>,
    pub start_at: ValueString<'a>,
    pub end_at: ValueString<'a>,
    pub duration: ValueString<'a>,
    pub status_code: ValueString<'a>,
    pub status_message: ValueString<'a>,
    pub log_store_url: ValueString<'a>,
    pub state_store_url: ValueString<'a>,
    pub results_url: ValueString<'a>,
    pub updated_at: ValueString<'a>,
}

/// Job input or environment variable
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableState<'a> {
    pub name: ValueString<'a>,
    pub value: ValueString<'a>,
    #[serde(rename = "type")]
    pub variable_type: ValueString<'a>,
    pub secure: ValueBool,
    pub description: ValueString<'a>,
}

impl<'a> VariableState<'a> {
    fn to_data(&self) -> VariableData {
        let metadata = VariableMetadata {
            variable_type: self.variable_type.as_deref_option().map(str::to_owned),
            secure: self.secure.as_ref_option().copied(),
            description: self.description.as_deref_option().map(str::to_owned),
        };
        VariableData {
            name: self.name.as_str().to_owned(),
            value: self.value.as_str().to_owned(),
            metadata: (metadata != VariableMetadata::default()).then_some(metadata),
        }
    }

    /// Secure values come back masked: keep the declared one
    fn from_data(data: VariableData, declared: Option<&Self>) -> Self {
        let metadata = data.metadata.unwrap_or_default();
        let secure = metadata.secure.unwrap_or(false);
        Self {
            value: match declared {
                Some(declared) if secure => declared.value.clone(),
                _ => data.value.into(),
            },
            name: data.name.into(),
            variable_type: opt_string(metadata.variable_type),
            secure: metadata.secure.into(),
            description: opt_string(metadata.description),
        }
    }

    pub(super) fn block() -> Block {
        use AttributeConstraint::{Optional, Required};
        use AttributeType::{Bool, String};
        Block {
            description: Description::plain("Variable passed to the job"),
            attributes: map! {
                "name" => attribute(String, Required, "Name of the variable"),
                "value" => attribute(String, Required, "Value of the variable"),
                "type" => attribute(String, Optional, "Type of the variable"),
                "secure" => attribute(Bool, Optional, "Whether the value is sensitive"),
                "description" => attribute(String, Optional, "Description of the variable"),
            },
            ..Default::default()
        }
    }
}

fn variables<'a>(values: &ValueList<Value<VariableState<'a>>>) -> Vec<VariableData> {
    values
        .iter()
        .flatten()
        .filter_map(Value::as_ref_option)
        .map(VariableState::to_data)
        .collect()
}

/// Null when nothing was declared and nothing came back
fn flatten_variables<'a>(
    declared: &ValueList<Value<VariableState<'a>>>,
    data: Vec<VariableData>,
) -> ValueList<Value<VariableState<'a>>> {
    if data.is_empty() && !declared.is_value() {
        return Value::Null;
    }
    let declared: Vec<&VariableState<'a>> = declared
        .iter()
        .flatten()
        .filter_map(Value::as_ref_option)
        .collect();
    Value::Value(
        data.into_iter()
            .map(|data| {
                let previous = declared
                    .iter()
                    .find(|variable| variable.name.as_str() == data.name)
                    .copied();
                Value::Value(VariableState::from_data(data, previous))
            })
            .collect(),
    )
}

impl<'a> SchematicsJobState<'a> {
    pub(super) fn prototype(&self) -> JobPrototype {
        JobPrototype {
            command_object: self.command_object.as_str().to_owned(),
            command_object_id: self.command_object_id.as_str().to_owned(),
            command_name: self.command_name.as_str().to_owned(),
            command_parameter: self.command_parameter.as_deref_option().map(str::to_owned),
            command_options: self
                .command_options
                .iter()
                .flatten()
                .filter_map(|option| option.as_deref_option().map(str::to_owned))
                .collect(),
            inputs: variables(&self.job_inputs),
            settings: variables(&self.job_env_settings),
            tags: self
                .tags
                .iter()
                .flatten()
                .filter_map(|tag| tag.as_deref_option().map(str::to_owned))
                .collect(),
            location: self.location.as_deref_option().map(str::to_owned),
        }
    }

    pub(super) fn flatten(&mut self, job: Job) {
        self.id = job.id.into();
        self.command_object = job.command_object.into();
        self.command_object_id = job.command_object_id.into();
        self.command_name = job.command_name.into();
        self.command_parameter = job.command_parameter.into();
        if !job.command_options.is_empty() || self.command_options.is_value() {
            self.command_options = Value::Value(
                job.command_options
                    .into_iter()
                    .map(ValueString::from)
                    .collect(),
            );
        } else {
            self.command_options = Value::Null;
        }
        self.job_inputs = flatten_variables(&self.job_inputs, job.inputs);
        self.job_env_settings = flatten_variables(&self.job_env_settings, job.settings);
        if !job.tags.is_empty() || self.tags.is_value() {
            self.tags = Value::Value(job.tags.into_iter().map(ValueString::from).collect());
        } else {
            self.tags = Value::Null;
        }
        self.location = job.location.into();
        self.name = job.name.into();
        self.description = job.description.into();
        self.resource_group = job.resource_group.into();
        self.submitted_at = job.submitted_at.into();
        self.submitted_by = job.submitted_by.into();
        self.start_at = job.start_at.into();
        self.end_at = job.end_at.into();
        self.duration = job.duration.into();
        let status = job.status.current().cloned().unwrap_or_default();
        self.status_code = status.status_code.into();
        self.status_message = status.status_message.into();
        self.log_store_url = job.log_store_url.into();
        self.state_store_url = job.state_store_url.into();
        self.results_url = job.results_url.into();
        self.updated_at = job.updated_at.into();
    }
}

impl<'a> WithSchema for SchematicsJobState<'a> {
    fn schema() -> Schema {
        use AttributeConstraint::{Computed, Optional, OptionalComputed, Required};
        use AttributeType::String;
        Schema {
            version: 1,
            block: Block {
                version: 1,
                description: Description::plain("Schematics job running a command on a workspace or an action"),
                attributes: map! {
                    "id" => attribute(String, Computed, "Job ID"),
                    "command_object" => attribute(String, Required, "`workspace` or `action`"),
                    "command_object_id" => attribute(String, Required, "Workspace or action ID"),
                    "command_name" => attribute(String, Required, "Command the job runs"),
                    "command_parameter" => attribute(String, Required, "Playbook, capsule or flow name"),
                    "command_options" => attribute(string_list(), Optional, "Command line options for the command"),
                    "tags" => attribute(string_set(), Optional, "Job tags"),
                    "location" => attribute(String, OptionalComputed, "Region the job runs in"),
                    "name" => attribute(String, Computed, "Job name"),
                    "description" => attribute(String, Computed, "Job description"),
                    "resource_group" => attribute(String, Computed, "Resource group name"),
                    "submitted_at" => attribute(String, Computed, "Submission date"),
                    "submitted_by" => attribute(String, Computed, "User who submitted the job"),
                    "start_at" => attribute(String, Computed, "Start date"),
                    "end_at" => attribute(String, Computed, "End date"),
                    "duration" => attribute(String, Computed, "Duration of the job"),
                    "status_code" => attribute(String, Computed, "Status of the job"),
                    "status_message" => attribute(String, Computed, "Status message of the job"),
                    "log_store_url" => attribute(String, Computed, "URL of the job logs"),
                    "state_store_url" => attribute(String, Computed, "URL of the job state"),
                    "results_url" => attribute(String, Computed, "URL of the job results"),
                    "updated_at" => attribute(String, Computed, "Last update date"),
                },
                blocks: map! {
                    "job_inputs" => NestedBlock::List(VariableState::block()),
                    "job_env_settings" => NestedBlock::List(VariableState::block()),
                },
                ..Default::default()
            },
        }
    }
}

#[async_trait]
impl<'a> WithValidate for SchematicsJobState<'a> {
    async fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        validators::allowed_string(
            diags,
            attr_path.clone().attribute("command_object"),
            &self.command_object,
            COMMAND_OBJECTS,
        );
        validators::allowed_string(
            diags,
            attr_path.clone().attribute("command_name"),
            &self.command_name,
            COMMAND_NAMES,
        );
        validators::allowed_string(
            diags,
            attr_path.attribute("location"),
            &self.location,
            LOCATIONS,
        );
    }
}
