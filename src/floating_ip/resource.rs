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

use std::time::Duration;

use async_trait::async_trait;

use tf_provider::schema::Schema;
use tf_provider::value::{Value, ValueEmpty};
use tf_provider::{AttributePath, Diagnostics, Resource};

use crate::client::vpc::{FloatingIp, FloatingIpPatch, Identity, VpcApi};
use crate::client::{ApiError, NotFoundExt, Session, SessionHandle};
use crate::tags::{read_tags_best_effort, sync_tags_best_effort};
use crate::utils::{WithSchema, WithTimeouts, WithValidate};
use crate::wait::{Polling, StateChangeConf, WaitError};

use super::state::FloatingIpState;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10 * 60);

#[derive(Debug, Default, Clone)]
pub struct FloatingIpResource {
    session: SessionHandle,
    polling: Polling,
}

impl FloatingIpResource {
    pub fn new(session: SessionHandle) -> Self {
        Self {
            session,
            polling: Polling::default(),
        }
    }
}

async fn wait_for_available(
    vpc: &VpcApi<'_>,
    id: &str,
    timeout: Duration,
    polling: Polling,
) -> Result<FloatingIp, WaitError> {
    tracing::info!("Waiting for floating IP ({id}) to be available.");
    StateChangeConf::new(&["pending"], &["available"], timeout)
        .with_polling(polling)
        .wait_for_state(move || async move {
            let ip = vpc.get_floating_ip(id).await?;
            let status = ip.status.clone();
            Ok(Some((ip, status)))
        })
        .await?
        .ok_or(WaitError::NotFound { retries: 0 })
}

async fn wait_for_deleted(
    vpc: &VpcApi<'_>,
    id: &str,
    timeout: Duration,
    polling: Polling,
) -> Result<(), WaitError> {
    StateChangeConf::new(&["deleting", "available", "pending"], &["done", ""], timeout)
        .with_polling(polling)
        .wait_for_state(move || async move {
            let state = match vpc.get_floating_ip(id).await.found()? {
                None => "done".to_owned(),
                Some(ip) if ip.status == "failed" => ip.status,
                Some(_) => "deleting".to_owned(),
            };
            Ok(Some(((), state)))
        })
        .await
        .map(|_| ())
}

async fn refresh(
    diags: &mut Diagnostics,
    session: &Session,
    state: &mut FloatingIpState<'_>,
) -> Result<bool, ApiError> {
    let Some(ip) = session.vpc().get_floating_ip(state.id.as_str()).await.found()? else {
        return Ok(false);
    };
    let crn = ip.crn.clone();
    state.flatten(ip);
    let tags = std::mem::take(&mut state.tags);
    state.tags = read_tags_best_effort(diags, session, &crn, tags).await;
    Ok(true)
}

#[async_trait]
impl Resource for FloatingIpResource {
    type State<'a> = FloatingIpState<'a>;
    type PrivateState<'a> = ValueEmpty;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(FloatingIpState::schema())
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
                tracing::info!("Floating IP {} not found, removing it from state", state.id);
                None
            }
            Err(err) => {
                diags.root_error(
                    "Error getting floating IP",
                    format!("Error getting floating IP ({}): {err}", state.id),
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
        state.address = Value::Unknown;
        state.status = Value::Unknown;
        for value in [&mut state.zone, &mut state.target, &mut state.resource_group] {
            if value.is_null() {
                *value = Value::Unknown;
            }
        }
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
        let mut trigger_replace = Vec::new();
        if state.resource_group != prior_state.resource_group {
            trigger_replace.push(AttributePath::new("resource_group"));
        }
        if state.target != prior_state.target {
            // A new target may live in another zone
            state.zone = Value::Unknown;
        } else if state.zone != prior_state.zone {
            trigger_replace.push(AttributePath::new("zone"));
        }
        Some((state, prior_private_state, trigger_replace))
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
        let vpc = session.vpc();

        let ip = match vpc.create_floating_ip(&planned_state.prototype()).await {
            Ok(ip) => ip,
            Err(err) => {
                diags.root_error(
                    "Error creating floating IP",
                    format!("[ERROR] Error while creating Floating IP {err}"),
                );
                return None;
            }
        };
        let id = ip.id.clone();
        let crn = ip.crn.clone();
        tracing::info!("Floating IP {id} created");

        let mut state = planned_state.clone();
        state.flatten(ip);
        if state.tags.is_unknown() {
            state.tags = Value::Value(Default::default());
        }

        let timeout = planned_state.timeouts.create_timeout(DEFAULT_TIMEOUT);
        match wait_for_available(&vpc, &id, timeout, self.polling).await {
            Ok(ip) => state.flatten(ip),
            Err(err) => {
                diags.root_error(
                    "Error waiting for floating IP",
                    format!("Error waiting for floating IP ({id}) to be available: {err}"),
                );
                return Some((state, private_state));
            }
        }

        sync_tags_best_effort(diags, &session, &Value::Null, &planned_state.tags, &crn).await;

        let mut refreshed = state.clone();
        match refresh(diags, &session, &mut refreshed).await {
            Ok(true) => Some((refreshed, private_state)),
            Ok(false) => {
                diags.root_error(
                    "Floating IP disappeared",
                    format!("Floating IP {id} was not found right after its creation"),
                );
                Some((state, private_state))
            }
            Err(err) => {
                diags.root_error(
                    "Error getting floating IP",
                    format!("Error getting floating IP ({id}): {err}"),
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
        let id = prior_state.id.as_str().to_owned();

        let mut patch = FloatingIpPatch::default();
        if planned_state.name != prior_state.name {
            patch.name = planned_state.name.as_deref_option().map(str::to_owned);
        }
        if planned_state.target != prior_state.target {
            patch.target = planned_state.target.as_deref_option().map(Identity::id);
        }
        if patch != FloatingIpPatch::default() {
            if let Err(err) = session.vpc().update_floating_ip(&id, &patch).await {
                diags.root_error(
                    "Error updating floating IP",
                    format!("[ERROR] Error updating Floating IP ({id}): {err}"),
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
                    "Floating IP disappeared",
                    format!("Floating IP {id} was not found after its update"),
                );
                Some((prior_state, private_state))
            }
            Err(err) => {
                diags.root_error(
                    "Error getting floating IP",
                    format!("Error getting floating IP ({id}): {err}"),
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
        let vpc = session.vpc();
        let id = state.id.as_str();

        match vpc.get_floating_ip(id).await.found() {
            Ok(Some(_)) => {}
            Ok(None) => return Some(()),
            Err(err) => {
                diags.root_error(
                    "Error getting floating IP",
                    format!("Error getting floating IP ({id}): {err}"),
                );
                return Some(());
            }
        }

        if let Err(err) = vpc.delete_floating_ip(id).await.found() {
            diags.root_error(
                "Error deleting floating IP",
                format!("[ERROR] Error deleting Floating IP ({id}): {err}"),
            );
            return Some(());
        }

        let timeout = state.timeouts.delete_timeout(DEFAULT_TIMEOUT);
        if let Err(err) = wait_for_deleted(&vpc, id, timeout, self.polling).await {
            diags.root_error(
                "Error waiting for floating IP deletion",
                format!("Error waiting for floating IP ({id}) to be deleted: {err}"),
            );
        }
        Some(())
    }

    async fn import<'a>(
        &self,
        diags: &mut Diagnostics,
        id: String,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let state = FloatingIpState {
            id: Value::from(id.clone()),
            ..Default::default()
        };
        let imported = self
            .read(diags, state, Default::default(), Default::default())
            .await;
        if imported.is_none() {
            diags.root_error(
                "Cannot import non-existent remote object",
                format!("Floating IP {id} does not exist"),
            );
        }
        imported
    }
}
