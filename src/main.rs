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

use anyhow::Result;
use tf_provider::serve;

mod access_group;
mod cis_domain_settings;
mod client;
mod dedicated_host;
mod endpoint_gateway;
mod flatten;
mod floating_ip;
mod ibm_provider;
mod instance;
mod instance_group;
mod mutexkv;
mod network_acl;
mod schematics_job;
mod tags;
mod utils;
mod validators;
mod wait;

use ibm_provider::IbmProvider;

#[tokio::main]
async fn main() -> Result<()> {
    serve("ibm", IbmProvider::default()).await
}
