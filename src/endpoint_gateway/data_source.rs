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

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use tf_provider::schema::{Attribute, AttributeConstraint, AttributeType, Block, Description, Schema};
use tf_provider::value::{Value, ValueEmpty, ValueList, ValueString};
use tf_provider::{map, DataSource, Diagnostics};

use crate::client::vpc::{EndpointGateway, EndpointGatewayTarget, ReservedIpReference};
use crate::client::SessionHandle;
use crate::flatten::{computed, data_source_id, many, opt_string, single};
use crate::utils::{attribute, computed_objects, string_list, WithSchema};

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointGatewaysDataSourceState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub resource_group: ValueString<'a>,
    pub virtual_endpoint_gateways: ValueList<Value<GatewayItemState<'a>>>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayItemState<'a> {
    pub id: ValueString<'a>,
    pub crn: ValueString<'a>,
    pub name: ValueString<'a>,
    pub resource_type: ValueString<'a>,
    pub created_at: ValueString<'a>,
    pub health_state: ValueString<'a>,
    pub lifecycle_state: ValueString<'a>,
    pub resource_group: ValueString<'a>,
    pub vpc: ValueString<'a>,
    pub security_groups: ValueList<ValueString<'a>>,
    pub service_endpoints: ValueList<ValueString<'a>>,
    pub ips: ValueList<Value<GatewayIpState<'a>>>,
    pub target: ValueList<Value<GatewayTargetState<'a>>>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayIpState<'a> {
    pub id: ValueString<'a>,
    pub name: ValueString<'a>,
    pub address: ValueString<'a>,
    pub resource_type: ValueString<'a>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayTargetState<'a> {
    pub name: ValueString<'a>,
    pub crn: ValueString<'a>,
    pub resource_type: ValueString<'a>,
}

impl<'a> From<ReservedIpReference> for GatewayIpState<'a> {
    fn from(ip: ReservedIpReference) -> Self {
        Self {
            id: opt_string(ip.id),
            name: opt_string(ip.name),
            address: ip.address.into(),
            resource_type: opt_string(ip.resource_type),
        }
    }
}

impl<'a> From<EndpointGatewayTarget> for GatewayTargetState<'a> {
    fn from(target: EndpointGatewayTarget) -> Self {
        Self {
            name: opt_string(target.name),
            crn: opt_string(target.crn),
            resource_type: target.resource_type.into(),
        }
    }
}

impl<'a> From<EndpointGateway> for GatewayItemState<'a> {
    fn from(gateway: EndpointGateway) -> Self {
        Self {
            id: gateway.id.into(),
            crn: gateway.crn.into(),
            name: gateway.name.into(),
            resource_type: gateway.resource_type.into(),
            created_at: gateway.created_at.into(),
            health_state: gateway.health_state.into(),
            lifecycle_state: gateway.lifecycle_state.into(),
            resource_group: gateway.resource_group.id.into(),
            vpc: gateway.vpc.id.into(),
            security_groups: Value::Value(
                gateway
                    .security_groups
                    .into_iter()
                    .map(|sg| sg.id.into())
                    .collect(),
            ),
            service_endpoints: Value::Value(
                gateway
                    .service_endpoints
                    .into_iter()
                    .map(|endpoint| endpoint.into())
                    .collect(),
            ),
            ips: many(gateway.ips, GatewayIpState::from),
            target: single(GatewayTargetState::from(gateway.target)),
        }
    }
}

impl<'a> GatewayItemState<'a> {
    fn attributes() -> HashMap<String, Attribute> {
        use AttributeType::String;
        map! {
            "id" => computed(String, "Endpoint gateway ID"),
            "crn" => computed(String, "Endpoint gateway CRN"),
            "name" => computed(String, "Endpoint gateway name"),
            "resource_type" => computed(String, "Resource type"),
            "created_at" => computed(String, "Creation date"),
            "health_state" => computed(String, "Health of the endpoint gateway"),
            "lifecycle_state" => computed(String, "Lifecycle state of the endpoint gateway"),
            "resource_group" => computed(String, "Resource group ID"),
            "vpc" => computed(String, "VPC ID"),
            "security_groups" => computed(string_list(), "Security group IDs"),
            "service_endpoints" => computed(string_list(), "Fully qualified names of the service endpoints"),
            "ips" => computed_objects("Reserved IPs bound to the gateway", map! {
                "id" => computed(String, "Reserved IP ID"),
                "name" => computed(String, "Reserved IP name"),
                "address" => computed(String, "IP address"),
                "resource_type" => computed(String, "Resource type"),
            }),
            "target" => computed_objects("Service the gateway connects to", map! {
                "name" => computed(String, "Target name"),
                "crn" => computed(String, "Target CRN"),
                "resource_type" => computed(String, "Target type"),
            }),
        }
    }
}

impl<'a> WithSchema for EndpointGatewaysDataSourceState<'a> {
    fn schema() -> Schema {
        use AttributeConstraint::{Computed, Optional};
        use AttributeType::String;
        Schema {
            version: 1,
            block: Block {
                version: 1,
                description: Description::plain("List the endpoint gateways of the region"),
                attributes: map! {
                    "id" => attribute(String, Computed, "Identifier of this read"),
                    "resource_group" => attribute(String, Optional, "Only list gateways of this resource group"),
                    "virtual_endpoint_gateways" => computed_objects("Endpoint gateways", GatewayItemState::attributes()),
                },
                ..Default::default()
            },
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct EndpointGatewaysDataSource {
    session: SessionHandle,
}

impl EndpointGatewaysDataSource {
    pub fn new(session: SessionHandle) -> Self {
        Self { session }
    }
}

#[async_trait]
impl DataSource for EndpointGatewaysDataSource {
    type State<'a> = EndpointGatewaysDataSourceState<'a>;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(EndpointGatewaysDataSourceState::schema())
    }

    async fn read<'a>(
        &self,
        diags: &mut Diagnostics,
        config: Self::State<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<Self::State<'a>> {
        let session = self.session.get(diags)?;
        let mut filters = Vec::new();
        if let Some(group) = config.resource_group.as_deref_option() {
            filters.push(("resource_group.id", group.to_owned()));
        }

        match session.vpc().list_endpoint_gateways(&filters).await {
            Ok(gateways) => {
                let mut state = config;
                state.id = data_source_id().into();
                state.virtual_endpoint_gateways = many(gateways, GatewayItemState::from);
                Some(state)
            }
            Err(err) => {
                diags.root_error(
                    "Error fetching endpoint gateways",
                    format!("[ERROR] Error fetching Endpoint Gateways {err}"),
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::client::tests::mock_handle;

    #[tokio::test]
    async fn filters_on_resource_group() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/endpoint_gateways"))
            .and(query_param("resource_group.id", "rg-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "endpoint_gateways": [{
                    "id": "gw-1",
                    "name": "cos",
                    "lifecycle_state": "stable",
                    "ips": [{ "id": "ip-1", "address": "10.240.0.9" }],
                    "target": { "crn": "crn:v1:bluemix:public:cloud-object-storage:global:::endpoint:s3", "resource_type": "provider_cloud_service" },
                    "service_endpoints": ["s3.direct.us-south.cloud-object-storage.appdomain.cloud"],
                    "resource_group": { "id": "rg-1" },
                }],
            })))
            .expect(1)
            .mount(&server)
            .await;

        let data_source = EndpointGatewaysDataSource::new(mock_handle(&server.uri()));
        let mut diags = Diagnostics::default();
        let config = EndpointGatewaysDataSourceState {
            resource_group: "rg-1".into(),
            ..Default::default()
        };
        let state = data_source
            .read(&mut diags, config, Default::default())
            .await
            .unwrap();
        assert!(diags.errors.is_empty(), "{diags:?}");
        let gateways: Vec<_> = state.virtual_endpoint_gateways.iter().flatten().collect();
        assert_eq!(gateways.len(), 1);
        let Value::Value(gateway) = gateways[0] else {
            panic!("gateway should be known");
        };
        assert_eq!(gateway.name, Value::from("cos"));
        assert_eq!(gateway.ips.iter().flatten().count(), 1);
        assert_eq!(gateway.service_endpoints.iter().flatten().count(), 1);
    }
}
