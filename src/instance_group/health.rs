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

//! Instance group status waits. Mutations of a group, of its memberships
//! and of its scheduled actions only go through while the group is healthy.

use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::client::vpc::{InstanceGroup, VpcApi};
use crate::client::{ApiError, NotFoundExt};
use crate::mutexkv::{instance_group_key, IBM_MUTEX_KV};
use crate::wait::{Polling, StateChangeConf, WaitError};

pub(super) const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Wait until the group settles in `healthy`. `unhealthy` and `deleting` end the wait in error.
pub(super) async fn wait_for_healthy(
    vpc: &VpcApi<'_>,
    group_id: &str,
    timeout: Duration,
    polling: Polling,
) -> Result<InstanceGroup, WaitError> {
    tracing::debug!("Waiting for instance group ({group_id}) to be healthy");
    StateChangeConf::new(&["scaling", "updating"], &["healthy"], timeout)
        .with_polling(polling)
        .wait_for_state(move || async move {
            let group = vpc.get_instance_group(group_id).await?;
            let status = match group.status.as_str() {
                "" => "scaling".to_owned(),
                status => status.to_owned(),
            };
            Ok(Some((group, status)))
        })
        .await?
        .ok_or(WaitError::NotFound { retries: 0 })
}

/// Run `mutate` under the group lock, between two healthy waits
pub(super) async fn while_healthy<T, F, Fut>(
    vpc: &VpcApi<'_>,
    group_id: &str,
    timeout: Duration,
    polling: Polling,
    mutate: F,
) -> Result<T>
where
    F: FnOnce() -> Fut + Send,
    Fut: Future<Output = Result<T, ApiError>> + Send,
    T: Send,
{
    let _lock = IBM_MUTEX_KV.lock(instance_group_key(group_id)).await;
    wait_for_healthy(vpc, group_id, timeout, polling)
        .await
        .with_context(|| format!("Error waiting for instance group ({group_id}) to be healthy"))?;
    let value = mutate().await?;
    wait_for_healthy(vpc, group_id, timeout, polling)
        .await
        .with_context(|| format!("Error waiting for instance group ({group_id}) to be healthy"))?;
    Ok(value)
}

pub(super) async fn wait_for_deleted(
    vpc: &VpcApi<'_>,
    group_id: &str,
    timeout: Duration,
    polling: Polling,
) -> Result<(), WaitError> {
    StateChangeConf::new(&["deleting", "healthy", "scaling", "updating"], &["done", ""], timeout)
        .with_polling(polling)
        .wait_for_state(move || async move {
            let status = match vpc.get_instance_group(group_id).await.found()? {
                None => "done".to_owned(),
                Some(group) => group.status,
            };
            Ok(Some(((), status)))
        })
        .await
        .map(|_| ())
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::client::tests::mock_session;

    #[tokio::test]
    async fn unhealthy_group_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/instance_groups/ig-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "ig-1",
                "status": "unhealthy",
            })))
            .mount(&server)
            .await;

        let session = mock_session(&server.uri());
        let err = wait_for_healthy(&session.vpc(), "ig-1", DEFAULT_TIMEOUT, Polling::immediate())
            .await
            .unwrap_err();
        assert!(matches!(err, WaitError::UnexpectedState { ref state, .. } if state == "unhealthy"));
    }
}
