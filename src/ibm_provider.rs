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
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use tf_provider::schema::{Attribute, AttributeConstraint, AttributeType, Block, Description, Schema};
use tf_provider::value::{ValueEmpty, ValueNumber, ValueString};
use tf_provider::{map, AttributePath, Diagnostics, DynamicDataSource, DynamicResource, Provider};

use crate::access_group::{AccessGroupDataSource, AccessGroupResource};
use crate::cis_domain_settings::CisDomainSettingsResource;
use crate::client::{Credentials, Endpoints, Session, SessionConfig, SessionHandle, Visibility};
use crate::dedicated_host::DedicatedHostsDataSource;
use crate::endpoint_gateway::{EndpointGatewayResource, EndpointGatewaysDataSource};
use crate::floating_ip::{FloatingIpDataSource, FloatingIpResource};
use crate::instance::{InstanceResource, InstancesDataSource};
use crate::instance_group::{
    InstanceGroupDataSource, InstanceGroupResource, ManagerActionResource, MembershipResource,
};
use crate::network_acl::{NetworkAclDataSource, NetworkAclResource};
use crate::schematics_job::{SchematicsJobDataSource, SchematicsJobResource};
use crate::utils::attribute;

const DEFAULT_REGION: &str = "us-south";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IbmProviderConfig<'a> {
    #[serde(borrow = "'a")]
    pub ibmcloud_api_key: ValueString<'a>,
    pub iam_token: ValueString<'a>,
    pub iam_refresh_token: ValueString<'a>,
    pub region: ValueString<'a>,
    pub visibility: ValueString<'a>,
    pub ibmcloud_timeout: ValueNumber,
}

/// First non empty value among the attribute and the environment variables
fn resolve<F>(value: &ValueString<'_>, vars: &[&str], lookup: &F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    value
        .as_deref_option()
        .map(str::to_owned)
        .into_iter()
        .chain(vars.iter().filter_map(|var| lookup(var)))
        .find(|value| !value.is_empty())
}

/// Build the session configuration from the provider block, falling back on `lookup` for the environment
pub(crate) fn session_config<F>(
    diags: &mut Diagnostics,
    config: &IbmProviderConfig<'_>,
    lookup: F,
) -> Option<SessionConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let api_key = resolve(
        &config.ibmcloud_api_key,
        &["IC_API_KEY", "IBMCLOUD_API_KEY"],
        &lookup,
    );
    let iam_token = resolve(&config.iam_token, &["IC_IAM_TOKEN"], &lookup);
    let refresh_token = resolve(&config.iam_refresh_token, &["IC_IAM_REFRESH_TOKEN"], &lookup);
    let credentials = match (api_key, iam_token) {
        (Some(api_key), _) => Credentials::ApiKey(api_key),
        (None, Some(access_token)) => Credentials::Token {
            access_token: access_token
                .strip_prefix("Bearer ")
                .map(str::to_owned)
                .unwrap_or(access_token),
            refresh_token,
        },
        (None, None) => {
            diags.root_error(
                "Missing credentials",
                "Either `ibmcloud_api_key` or `iam_token` must be set, in the provider block or through IC_API_KEY / IC_IAM_TOKEN",
            );
            return None;
        }
    };

    let region = resolve(&config.region, &["IC_REGION", "IBMCLOUD_REGION"], &lookup)
        .unwrap_or_else(|| DEFAULT_REGION.to_owned());

    let visibility = resolve(
        &config.visibility,
        &["IC_VISIBILITY", "IBMCLOUD_VISIBILITY"],
        &lookup,
    )
    .unwrap_or_default();
    let visibility = match visibility.parse::<Visibility>() {
        Ok(visibility) => visibility,
        Err(err) => {
            diags.error_short(err, AttributePath::new("visibility"));
            return None;
        }
    };

    let timeout = match config.ibmcloud_timeout.as_ref_option() {
        Some(&seconds) => Some(seconds.to_string()),
        None => ["IC_TIMEOUT", "IBMCLOUD_TIMEOUT"]
            .iter()
            .find_map(|var| lookup(var)),
    };
    let timeout = match timeout.map(|text| text.trim().parse::<u64>()) {
        None => DEFAULT_TIMEOUT,
        Some(Ok(seconds)) if seconds > 0 => Duration::from_secs(seconds),
        Some(_) => {
            diags.error_short(
                "`ibmcloud_timeout` must be a positive number of seconds",
                AttributePath::new("ibmcloud_timeout"),
            );
            return None;
        }
    };

    let env_tags = lookup("IC_ENV_TAGS")
        .map(|tags| {
            tags.split(',')
                .map(str::trim)
                .filter(|tag| !tag.is_empty())
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default();

    Some(SessionConfig {
        credentials,
        endpoints: Endpoints::new(&region, visibility).with_overrides(&lookup),
        region,
        timeout,
        env_tags,
    })
}

#[derive(Debug, Default, Clone)]
pub struct IbmProvider {
    session: SessionHandle,
}

#[async_trait]
impl Provider for IbmProvider {
    type Config<'a> = IbmProviderConfig<'a>;
    type MetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        use AttributeConstraint::Optional;
        use AttributeType::{Number, String};
        let sensitive = |description: &'static str| Attribute {
            sensitive: true,
            ..attribute(String, Optional, description)
        };
        Some(Schema {
            version: 1,
            block: Block {
                description: Description::plain("IBM Cloud"),
                attributes: map! {
                    "ibmcloud_api_key" => sensitive("IBM Cloud API key (IC_API_KEY)"),
                    "iam_token" => sensitive("IAM bearer token, used when no API key is given (IC_IAM_TOKEN)"),
                    "iam_refresh_token" => sensitive("IAM refresh token (IC_IAM_REFRESH_TOKEN)"),
                    "region" => attribute(String, Optional, "Region of the VPC resources, `us-south` by default (IC_REGION)"),
                    "visibility" => attribute(String, Optional, "`public`, `private` or `public-and-private` endpoints (IC_VISIBILITY)"),
                    "ibmcloud_timeout" => attribute(Number, Optional, "HTTP timeout in seconds, 60 by default (IC_TIMEOUT)"),
                },
                ..Default::default()
            },
        })
    }

    async fn validate<'a>(&self, diags: &mut Diagnostics, config: Self::Config<'a>) -> Option<()> {
        if let Some(visibility) = config.visibility.as_deref_option() {
            if let Err(err) = visibility.parse::<Visibility>() {
                diags.error_short(err, AttributePath::new("visibility"));
            }
        }
        if let Some(&timeout) = config.ibmcloud_timeout.as_ref_option() {
            if timeout <= 0 {
                diags.error_short(
                    "`ibmcloud_timeout` must be a positive number of seconds",
                    AttributePath::new("ibmcloud_timeout"),
                );
            }
        }

        if diags.errors.is_empty() {
            Some(())
        } else {
            None
        }
    }

    async fn configure<'a>(
        &self,
        diags: &mut Diagnostics,
        terraform_version: String,
        config: Self::Config<'a>,
    ) -> Option<()> {
        let session_config = session_config(diags, &config, |var| std::env::var(var).ok())?;
        tracing::info!(
            "Configuring IBM Cloud provider for region {} (terraform {terraform_version})",
            session_config.region
        );
        match Session::new(session_config) {
            Ok(session) => {
                self.session.set(session);
                Some(())
            }
            Err(err) => {
                diags.root_error("Failed to create the IBM Cloud session", err.to_string());
                None
            }
        }
    }

    fn get_resources(
        &self,
        _diags: &mut Diagnostics,
    ) -> Option<HashMap<String, Box<dyn DynamicResource>>> {
        let session = &self.session;
        Some(map! {
            "is_network_acl" => NetworkAclResource::new(session.clone()),
            "is_instance" => InstanceResource::new(session.clone()),
            "is_floating_ip" => FloatingIpResource::new(session.clone()),
            "is_instance_group" => InstanceGroupResource::new(session.clone()),
            "is_instance_group_membership" => MembershipResource::new(session.clone()),
            "is_instance_group_manager_action" => ManagerActionResource::new(session.clone()),
            "is_virtual_endpoint_gateway" => EndpointGatewayResource::new(session.clone()),
            "cis_domain_settings" => CisDomainSettingsResource::new(session.clone()),
            "iam_access_group" => AccessGroupResource::new(session.clone()),
            "schematics_job" => SchematicsJobResource::new(session.clone()),
        })
    }

    fn get_data_sources(
        &self,
        _diags: &mut Diagnostics,
    ) -> Option<HashMap<String, Box<dyn DynamicDataSource>>> {
        let session = &self.session;
        Some(map! {
            "is_network_acl" => NetworkAclDataSource::new(session.clone()),
            "is_instances" => InstancesDataSource::new(session.clone()),
            "is_dedicated_hosts" => DedicatedHostsDataSource::new(session.clone()),
            "is_floating_ip" => FloatingIpDataSource::new(session.clone()),
            "is_instance_group" => InstanceGroupDataSource::new(session.clone()),
            "is_virtual_endpoint_gateways" => EndpointGatewaysDataSource::new(session.clone()),
            "iam_access_group" => AccessGroupDataSource::new(session.clone()),
            "schematics_job" => SchematicsJobDataSource::new(session.clone()),
        })
    }
}
