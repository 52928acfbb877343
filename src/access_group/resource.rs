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

use tf_provider::schema::{AttributeConstraint, AttributeType, Block, Description, Schema};
use tf_provider::value::{Value, ValueEmpty, ValueSet, ValueString};
use tf_provider::{map, AttributePath, Diagnostics, Resource};

use crate::client::iam::{AccessGroup, AccessGroupPatch, AccessGroupPrototype};
use crate::client::{ApiError, NotFoundExt, Session, SessionHandle};
use crate::flatten::opt_string;
use crate::tags::{read_tags_best_effort, sync_tags_best_effort};
use crate::utils::{attribute, tags_attribute, WithSchema, WithValidate};
use crate::validators;

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessGroupState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub name: ValueString<'a>,
    pub description: ValueString<'a>,
    pub tags: ValueSet<ValueString<'a>>,
    pub crn: ValueString<'a>,
    pub version: ValueString<'a>,
}

impl<'a> AccessGroupState<'a> {
    fn flatten(&mut self, group: AccessGroup, etag: Option<String>) {
        self.id = group.id.into();
        self.name = group.name.into();
        self.description = if group.description.is_empty() {
            Value::Null
        } else {
            group.description.into()
        };
        self.crn = group.crn.into();
        self.version = opt_string(etag);
    }
}

impl<'a> WithSchema for AccessGroupState<'a> {
    fn schema() -> Schema {
        use AttributeConstraint::{Computed, Optional, OptionalComputed, Required};
        use AttributeType::String;
        Schema {
            version: 1,
            block: Block {
                version: 1,
                description: Description::plain("IAM access group of the account"),
                attributes: map! {
                    "id" => attribute(String, Computed, "Access group ID"),
                    "name" => attribute(String, Required, "Access group name"),
                    "description" => attribute(String, Optional, "Description of the access group"),
                    "tags" => tags_attribute(OptionalComputed),
                    "crn" => attribute(String, Computed, "Access group CRN"),
                    "version" => attribute(String, Computed, "ETag of the access group"),
                },
                ..Default::default()
            },
        }
    }
}

#[async_trait]
impl<'a> WithValidate for AccessGroupState<'a> {
    async fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        if let Some(name) = self.name.as_deref_option() {
            if !(1..=100).contains(&name.len()) {
                diags.error(
                    "Invalid access group name",
                    format!("Must contain from 1 to 100 characters, got {}", name.len()),
                    attr_path.clone().attribute("name"),
                );
            }
        }
        validators::tags(diags, attr_path.attribute("tags"), &self.tags);
    }
}

async fn refresh(
    diags: &mut Diagnostics,
    session: &Session,
    state: &mut AccessGroupState<'_>,
) -> Result<bool, ApiError> {
    let Some((group, etag)) = session
        .iam()
        .get_access_group(state.id.as_str())
        .await
        .found()?
    else {
        return Ok(false);
    };
    let crn = group.crn.clone();
    state.flatten(group, etag);
    let tags = std::mem::take(&mut state.tags);
    state.tags = read_tags_best_effort(diags, session, &crn, tags).await;
    Ok(true)
}

#[derive(Debug, Default, Clone)]
pub struct AccessGroupResource {
    session: SessionHandle,
}

impl AccessGroupResource {
    pub fn new(session: SessionHandle) -> Self {
        Self { session }
    }
}

#[async_trait]
impl Resource for AccessGroupResource {
    type State<'a> = AccessGroupState<'a>;
    type PrivateState<'a> = ValueEmpty;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(AccessGroupState::schema())
    }

    async fn validate<'a>(&self, diags: &mut Diagnostics, config: Self::State<'a>) -> Option<()> {
        config.validate(diags, Default::default()).await;

        if diags.errors.is_empty() {
            Some(())
        } else {
            None
        }
    }

    async fn read<'a>(
        &self,
        diags: &mut Diagnostics,
        state: Self::State<'a>,
        private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let session = self.session.get(diags)?;
        let mut refreshed = state.clone();
        match refresh(diags, &session, &mut refreshed).await {
            Ok(true) => Some((refreshed, private_state)),
            Ok(false) => {
                tracing::info!("Access group {} not found, removing it from state", state.id);
                None
            }
            Err(err) => {
                diags.root_error(
                    "Error retrieving access group",
                    format!("Error retrieving access group: {err}"),
                );
                Some((state, private_state))
            }
        }
    }

    async fn plan_create<'a>(
        &self,
        _diags: &mut Diagnostics,
        proposed_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let mut state = proposed_state;
        state.id = Value::Unknown;
        state.crn = Value::Unknown;
        state.version = Value::Unknown;
        if state.tags.is_null() {
            state.tags = Value::Unknown;
        }
        Some((state, Default::default()))
    }

    async fn plan_update<'a>(
        &self,
        _diags: &mut Diagnostics,
        prior_state: Self::State<'a>,
        proposed_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        prior_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>, Vec<AttributePath>)> {
        let mut state = proposed_state;
        if state.name != prior_state.name || state.description != prior_state.description {
            state.version = Value::Unknown;
        }
        Some((state, prior_private_state, Vec::new()))
    }

    async fn plan_destroy<'a>(
        &self,
        _diags: &mut Diagnostics,
        _prior_state: Self::State<'a>,
        prior_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<Self::PrivateState<'a>> {
        Some(prior_private_state)
    }

    async fn create<'a>(
        &self,
        diags: &mut Diagnostics,
        planned_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let session = self.session.get(diags)?;
        let account_id = match session.account_id().await {
            Ok(account_id) => account_id,
            Err(err) => {
                diags.root_error("Error creating access group", format!("{err}"));
                return None;
            }
        };
        let prototype = AccessGroupPrototype {
            name: planned_state.name.as_str().to_owned(),
            description: planned_state.description.as_deref_option().map(str::to_owned),
        };
        let group = match session.iam().create_access_group(&account_id, &prototype).await {
            Ok(group) => group,
            Err(err) => {
                diags.root_error(
                    "Error creating access group",
                    format!("Error creating access group: {err}"),
                );
                return None;
            }
        };
        let id = group.id.clone();
        let crn = group.crn.clone();
        tracing::info!("Access group {id} created");

        let mut state = planned_state.clone();
        state.flatten(group, None);
        if state.tags.is_unknown() {
            state.tags = Value::Value(Default::default());
        }
        sync_tags_best_effort(diags, &session, &Value::Null, &planned_state.tags, &crn).await;

        let mut refreshed = state.clone();
        match refresh(diags, &session, &mut refreshed).await {
            Ok(true) => Some((refreshed, private_state)),
            Ok(false) => {
                diags.root_error(
                    "Access group disappeared",
                    format!("Access group {id} was not found right after its creation"),
                );
                Some((state, private_state))
            }
            Err(err) => {
                diags.root_error(
                    "Error retrieving access group",
                    format!("Error retrieving access group: {err}"),
                );
                Some((state, private_state))
            }
        }
    }

    async fn update<'a>(
        &self,
        diags: &mut Diagnostics,
        prior_state: Self::State<'a>,
        planned_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let session = self.session.get(diags)?;
        let iam = session.iam();
        let id = prior_state.id.as_str().to_owned();

        let mut patch = AccessGroupPatch::default();
        if planned_state.name != prior_state.name {
            patch.name = planned_state.name.as_deref_option().map(str::to_owned);
        }
        if planned_state.description != prior_state.description {
            patch.description = Some(planned_state.description.as_str().to_owned());
        }
        if patch != AccessGroupPatch::default() {
            // The ETag changes with every update: always fetch the current one
            let etag = match iam.get_access_group(&id).await {
                Ok((_, Some(etag))) => etag,
                Ok((_, None)) => {
                    diags.root_error(
                        "Error updating access group",
                        format!("Access group {id} was returned without an ETag"),
                    );
                    return Some((prior_state, private_state));
                }
                Err(err) => {
                    diags.root_error(
                        "Error retrieving access group",
                        format!("Error retrieving access group: {err}"),
                    );
                    return Some((prior_state, private_state));
                }
            };
            if let Err(err) = iam.update_access_group(&id, &etag, &patch).await {
                diags.root_error(
                    "Error updating access group",
                    format!("Error updating access group: {err}"),
                );
                return Some((prior_state, private_state));
            }
        }

        if planned_state.tags != prior_state.tags {
            sync_tags_best_effort(
                diags,
                &session,
                &prior_state.tags,
                &planned_state.tags,
                prior_state.crn.as_str(),
            )
            .await;
        }

        let mut state = planned_state.clone();
        match refresh(diags, &session, &mut state).await {
            Ok(true) => Some((state, private_state)),
            Ok(false) => {
                diags.root_error(
                    "Access group disappeared",
                    format!("Access group {id} was not found after its update"),
                );
                Some((prior_state, private_state))
            }
            Err(err) => {
                diags.root_error(
                    "Error retrieving access group",
                    format!("Error retrieving access group: {err}"),
                );
                Some((prior_state, private_state))
            }
        }
    }

    async fn destroy<'a>(
        &self,
        diags: &mut Diagnostics,
        state: Self::State<'a>,
        _planned_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<()> {
        let session = self.session.get(diags)?;
        let id = state.id.as_str();
        if let Err(err) = session.iam().delete_access_group(id).await.found() {
            diags.root_error(
                "Error deleting access group",
                format!("Error deleting access group: {err}"),
            );
        }
        Some(())
    }

    async fn import<'a>(
        &self,
        diags: &mut Diagnostics,
        id: String,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let state = AccessGroupState {
            id: Value::from(id.clone()),
            ..Default::default()
        };
        let imported = self
            .read(diags, state, Default::default(), Default::default())
            .await;
        if imported.is_none() && diags.errors.is_empty() {
            diags.root_error(
                "Cannot import non-existent remote object",
                format!("Access group {id} does not exist"),
            );
        }
        imported
    }
}
