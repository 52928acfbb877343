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

use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, RequestBuilder};
use serde::{de::DeserializeOwned, Serialize};

use super::error::Result;
use super::pager::{collect_all, Page};
use super::Session;

mod models;

pub use models::*;

/// API date pinned for every VPC call
pub const VPC_API_VERSION: &str = "2024-04-30";
const PAGE_LIMIT: &str = "50";

/// Filters passed as query parameters to list calls
pub type Filters<'f> = [(&'f str, String)];

pub struct VpcApi<'s> {
    session: &'s Session,
}

impl<'s> VpcApi<'s> {
    pub(super) fn new(session: &'s Session) -> Self {
        Self { session }
    }

    async fn call(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        let url = format!("{}{}", self.session.endpoints.vpc, path);
        Ok(self
            .session
            .request(method, &url)
            .await?
            .query(&[("version", VPC_API_VERSION), ("generation", "2")]))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let request = self.call(Method::GET, path).await?;
        self.session.send(request).await
    }

    async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let request = self.call(Method::POST, path).await?.json(body);
        self.session.send(request).await
    }

    async fn patch<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let request = self
            .call(Method::PATCH, path)
            .await?
            .header(CONTENT_TYPE, "application/merge-patch+json")
            .body(serde_json::to_vec(body)?);
        self.session.send(request).await
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let request = self.call(Method::DELETE, path).await?;
        self.session.send_empty(request).await
    }

    /// Every item of a collection, following the `start` cursor
    async fn list<P>(&self, path: &str, filters: &Filters<'_>) -> Result<Vec<P::Item>>
    where
        P: Page + DeserializeOwned,
    {
        collect_all(|start| async move {
            let mut request = self
                .call(Method::GET, path)
                .await?
                .query(filters)
                .query(&[("limit", PAGE_LIMIT)]);
            if let Some(start) = start {
                request = request.query(&[("start", start)]);
            }
            self.session.send::<P>(request).await
        })
        .await
    }

    // Instances

    pub async fn list_instances(&self, filters: &Filters<'_>) -> Result<Vec<Instance>> {
        self.list::<InstanceCollection>("/instances", filters).await
    }

    pub async fn get_instance(&self, id: &str) -> Result<Instance> {
        self.get(&format!("/instances/{id}")).await
    }

    pub async fn create_instance(&self, prototype: &InstancePrototype) -> Result<Instance> {
        self.post("/instances", prototype).await
    }

    pub async fn update_instance(&self, id: &str, patch: &InstancePatch) -> Result<Instance> {
        self.patch(&format!("/instances/{id}"), patch).await
    }

    pub async fn delete_instance(&self, id: &str) -> Result<()> {
        self.delete(&format!("/instances/{id}")).await
    }

    // Dedicated hosts

    pub async fn list_dedicated_hosts(&self, filters: &Filters<'_>) -> Result<Vec<DedicatedHost>> {
        self.list::<DedicatedHostCollection>("/dedicated_hosts", filters)
            .await
    }

    // Floating IPs

    pub async fn list_floating_ips(&self) -> Result<Vec<FloatingIp>> {
        self.list::<FloatingIpCollection>("/floating_ips", &[]).await
    }

    pub async fn get_floating_ip(&self, id: &str) -> Result<FloatingIp> {
        self.get(&format!("/floating_ips/{id}")).await
    }

    pub async fn create_floating_ip(&self, prototype: &FloatingIpPrototype) -> Result<FloatingIp> {
        self.post("/floating_ips", prototype).await
    }

    pub async fn update_floating_ip(&self, id: &str, patch: &FloatingIpPatch) -> Result<FloatingIp> {
        self.patch(&format!("/floating_ips/{id}"), patch).await
    }

    pub async fn delete_floating_ip(&self, id: &str) -> Result<()> {
        self.delete(&format!("/floating_ips/{id}")).await
    }

    // Network ACLs

    pub async fn list_network_acls(&self, filters: &Filters<'_>) -> Result<Vec<NetworkAcl>> {
        self.list::<NetworkAclCollection>("/network_acls", filters)
            .await
    }

    pub async fn get_network_acl(&self, id: &str) -> Result<NetworkAcl> {
        self.get(&format!("/network_acls/{id}")).await
    }

    pub async fn create_network_acl(&self, prototype: &NetworkAclPrototype) -> Result<NetworkAcl> {
        self.post("/network_acls", prototype).await
    }

    pub async fn update_network_acl(&self, id: &str, patch: &NetworkAclPatch) -> Result<NetworkAcl> {
        self.patch(&format!("/network_acls/{id}"), patch).await
    }

    pub async fn delete_network_acl(&self, id: &str) -> Result<()> {
        self.delete(&format!("/network_acls/{id}")).await
    }

    pub async fn list_network_acl_rules(&self, acl_id: &str) -> Result<Vec<NetworkAclRule>> {
        self.list::<NetworkAclRuleCollection>(&format!("/network_acls/{acl_id}/rules"), &[])
            .await
    }

    pub async fn create_network_acl_rule(
        &self,
        acl_id: &str,
        prototype: &NetworkAclRulePrototype,
    ) -> Result<NetworkAclRule> {
        self.post(&format!("/network_acls/{acl_id}/rules"), prototype)
            .await
    }

    pub async fn delete_network_acl_rule(&self, acl_id: &str, rule_id: &str) -> Result<()> {
        self.delete(&format!("/network_acls/{acl_id}/rules/{rule_id}"))
            .await
    }

    // Instance groups

    pub async fn list_instance_groups(&self) -> Result<Vec<InstanceGroup>> {
        self.list::<InstanceGroupCollection>("/instance_groups", &[])
            .await
    }

    pub async fn get_instance_group(&self, id: &str) -> Result<InstanceGroup> {
        self.get(&format!("/instance_groups/{id}")).await
    }

    pub async fn create_instance_group(
        &self,
        prototype: &InstanceGroupPrototype,
    ) -> Result<InstanceGroup> {
        self.post("/instance_groups", prototype).await
    }

    pub async fn update_instance_group(
        &self,
        id: &str,
        patch: &InstanceGroupPatch,
    ) -> Result<InstanceGroup> {
        self.patch(&format!("/instance_groups/{id}"), patch).await
    }

    pub async fn delete_instance_group(&self, id: &str) -> Result<()> {
        self.delete(&format!("/instance_groups/{id}")).await
    }

    pub async fn list_instance_group_memberships(
        &self,
        group_id: &str,
    ) -> Result<Vec<InstanceGroupMembership>> {
        self.list::<InstanceGroupMembershipCollection>(
            &format!("/instance_groups/{group_id}/memberships"),
            &[],
        )
        .await
    }

    pub async fn get_instance_group_membership(
        &self,
        group_id: &str,
        id: &str,
    ) -> Result<InstanceGroupMembership> {
        self.get(&format!("/instance_groups/{group_id}/memberships/{id}"))
            .await
    }

    pub async fn update_instance_group_membership(
        &self,
        group_id: &str,
        id: &str,
        patch: &InstanceGroupMembershipPatch,
    ) -> Result<InstanceGroupMembership> {
        self.patch(
            &format!("/instance_groups/{group_id}/memberships/{id}"),
            patch,
        )
        .await
    }

    pub async fn delete_instance_group_membership(&self, group_id: &str, id: &str) -> Result<()> {
        self.delete(&format!("/instance_groups/{group_id}/memberships/{id}"))
            .await
    }

    pub async fn delete_instance_group_memberships(&self, group_id: &str) -> Result<()> {
        self.delete(&format!("/instance_groups/{group_id}/memberships"))
            .await
    }

    pub async fn get_instance_group_manager_action(
        &self,
        group_id: &str,
        manager_id: &str,
        id: &str,
    ) -> Result<InstanceGroupManagerAction> {
        self.get(&format!(
            "/instance_groups/{group_id}/managers/{manager_id}/actions/{id}"
        ))
        .await
    }

    pub async fn create_instance_group_manager_action(
        &self,
        group_id: &str,
        manager_id: &str,
        prototype: &ManagerActionPrototype,
    ) -> Result<InstanceGroupManagerAction> {
        self.post(
            &format!("/instance_groups/{group_id}/managers/{manager_id}/actions"),
            prototype,
        )
        .await
    }

    pub async fn update_instance_group_manager_action(
        &self,
        group_id: &str,
        manager_id: &str,
        id: &str,
        patch: &ManagerActionPrototype,
    ) -> Result<InstanceGroupManagerAction> {
        self.patch(
            &format!("/instance_groups/{group_id}/managers/{manager_id}/actions/{id}"),
            patch,
        )
        .await
    }

    pub async fn delete_instance_group_manager_action(
        &self,
        group_id: &str,
        manager_id: &str,
        id: &str,
    ) -> Result<()> {
        self.delete(&format!(
            "/instance_groups/{group_id}/managers/{manager_id}/actions/{id}"
        ))
        .await
    }

    // Endpoint gateways

    pub async fn list_endpoint_gateways(
        &self,
        filters: &Filters<'_>,
    ) -> Result<Vec<EndpointGateway>> {
        self.list::<EndpointGatewayCollection>("/endpoint_gateways", filters)
            .await
    }

    pub async fn get_endpoint_gateway(&self, id: &str) -> Result<EndpointGateway> {
        self.get(&format!("/endpoint_gateways/{id}")).await
    }

    pub async fn create_endpoint_gateway(
        &self,
        prototype: &EndpointGatewayPrototype,
    ) -> Result<EndpointGateway> {
        self.post("/endpoint_gateways", prototype).await
    }

    pub async fn update_endpoint_gateway(
        &self,
        id: &str,
        patch: &EndpointGatewayPatch,
    ) -> Result<EndpointGateway> {
        self.patch(&format!("/endpoint_gateways/{id}"), patch).await
    }

    pub async fn delete_endpoint_gateway(&self, id: &str) -> Result<()> {
        self.delete(&format!("/endpoint_gateways/{id}")).await
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::client::tests::mock_session;

    #[tokio::test]
    async fn list_follows_next_href() {
        let server = MockServer::start().await;
        let next = format!("{}/v1/floating_ips?limit=50&start=page2", server.uri());
        Mock::given(method("GET"))
            .and(path("/v1/floating_ips"))
            .and(query_param("start", "page2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "floating_ips": [{ "id": "fip-2", "name": "b" }],
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/floating_ips"))
            .and(query_param("generation", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "floating_ips": [{ "id": "fip-1", "name": "a" }],
                "next": { "href": next },
            })))
            .expect(1)
            .mount(&server)
            .await;

        let session = mock_session(&server.uri());
        let ips = session.vpc().list_floating_ips().await.unwrap();
        let ids: Vec<_> = ips.iter().map(|ip| ip.id.as_str()).collect();
        assert_eq!(ids, ["fip-1", "fip-2"]);
    }

    #[tokio::test]
    async fn patch_uses_merge_patch() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/v1/network_acls/acl-1"))
            .and(header("content-type", "application/merge-patch+json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "acl-1",
                "name": "renamed",
            })))
            .expect(1)
            .mount(&server)
            .await;

        let session = mock_session(&server.uri());
        let acl = session
            .vpc()
            .update_network_acl(
                "acl-1",
                &super::NetworkAclPatch {
                    name: Some("renamed".into()),
                },
            )
            .await
            .unwrap();
        assert_eq!(acl.name, "renamed");
    }

    #[tokio::test]
    async fn not_found_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/instances/gone"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "errors": [{ "code": "not_found", "message": "Instance not found" }],
            })))
            .mount(&server)
            .await;

        let session = mock_session(&server.uri());
        let err = session.vpc().get_instance("gone").await.unwrap_err();
        assert!(err.is_not_found());
    }
}
