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
use tf_provider::value::{ValueEmpty, ValueSet, ValueString};
use tf_provider::{map, DataSource, Diagnostics};

use crate::client::vpc::FloatingIp;
use crate::client::SessionHandle;
use crate::tags::read_tags_best_effort;
use crate::utils::{attribute, tags_attribute, WithSchema};

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FloatingIpDataSourceState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub name: ValueString<'a>,
    pub address: ValueString<'a>,
    pub status: ValueString<'a>,
    pub zone: ValueString<'a>,
    pub target: ValueString<'a>,
    pub crn: ValueString<'a>,
    pub tags: ValueSet<ValueString<'a>>,
}

impl<'a> FloatingIpDataSourceState<'a> {
    fn flatten(&mut self, ip: FloatingIp) {
        self.id = ip.id.into();
        self.name = ip.name.into();
        self.address = ip.address.into();
        self.status = ip.status.into();
        self.zone = ip.zone.name.unwrap_or_default().into();
        self.target = ip.target.map(|target| target.id).unwrap_or_default().into();
        self.crn = ip.crn.into();
    }
}

impl<'a> WithSchema for FloatingIpDataSourceState<'a> {
    fn schema() -> Schema {
        use AttributeConstraint::{Computed, Required};
        use AttributeType::String;
        Schema {
            version: 1,
            block: Block {
                version: 1,
                description: Description::plain("Look up a floating IP by name"),
                attributes: map! {
                    "id" => attribute(String, Computed, "Floating IP ID"),
                    "name" => attribute(String, Required, "Floating IP name"),
                    "address" => attribute(String, Computed, "Public IP address"),
                    "status" => attribute(String, Computed, "Floating IP status"),
                    "zone" => attribute(String, Computed, "Zone name"),
                    "target" => attribute(String, Computed, "Network interface ID the floating IP is bound to"),
                    "crn" => attribute(String, Computed, "Floating IP CRN"),
                    "tags" => tags_attribute(Computed),
                },
                ..Default::default()
            },
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct FloatingIpDataSource {
    session: SessionHandle,
}

impl FloatingIpDataSource {
    pub fn new(session: SessionHandle) -> Self {
        Self { session }
    }
}

#[async_trait]
impl DataSource for FloatingIpDataSource {
    type State<'a> = FloatingIpDataSourceState<'a>;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(FloatingIpDataSourceState::schema())
    }

    async fn read<'a>(
        &self,
        diags: &mut Diagnostics,
        config: Self::State<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<Self::State<'a>> {
        let session = self.session.get(diags)?;
        let name = config.name.as_str();

        let ips = match session.vpc().list_floating_ips().await {
            Ok(ips) => ips,
            Err(err) => {
                diags.root_error(
                    "Error fetching floating IPs",
                    format!("[ERROR] Error Fetching floating IPs {err}"),
                );
                return None;
            }
        };
        let Some(ip) = ips.into_iter().find(|ip| ip.name == name) else {
            diags.root_error_short(format!("[ERROR] No floatingIP found with name {name}"));
            return None;
        };

        let crn = ip.crn.clone();
        let mut state = config.clone();
        state.flatten(ip);
        state.tags = read_tags_best_effort(diags, &session, &crn, Default::default()).await;
        Some(state)
    }
}

#[cfg(test)]
mod tests {
    use tf_provider::value::Value;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::client::tests::mock_handle;

    #[tokio::test]
    async fn finds_by_name() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/floating_ips"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "floating_ips": [
                    { "id": "fip-1", "name": "one", "address": "169.61.1.1" },
                    { "id": "fip-2", "name": "two", "address": "169.61.1.2", "target": { "id": "nic-1" } },
                ],
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v3/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [{ "name": "env:prod" }],
            })))
            .mount(&server)
            .await;

        let data_source = FloatingIpDataSource::new(mock_handle(&server.uri()));
        let mut diags = Diagnostics::default();
        let config = FloatingIpDataSourceState {
            name: "two".into(),
            ..Default::default()
        };
        let state = data_source
            .read(&mut diags, config, Default::default())
            .await
            .unwrap();
        assert!(diags.errors.is_empty(), "{diags:?}");
        assert_eq!(state.address, Value::from("169.61.1.2"));
        assert_eq!(state.target, Value::from("nic-1"));
        assert_eq!(state.tags.iter().flatten().count(), 1);
    }

    #[tokio::test]
    async fn unknown_name_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/floating_ips"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "floating_ips": [{ "id": "fip-1", "name": "one", "address": "169.61.1.1" }],
            })))
            .mount(&server)
            .await;

        let data_source = FloatingIpDataSource::new(mock_handle(&server.uri()));
        let mut diags = Diagnostics::default();
        let config = FloatingIpDataSourceState {
            name: "three".into(),
            ..Default::default()
        };
        assert!(data_source
            .read(&mut diags, config, Default::default())
            .await
            .is_none());
        assert_eq!(diags.errors.len(), 1);
        assert_eq!(
            diags.errors[0].summary,
            "[ERROR] No floatingIP found with name three"
        );
    }
}
