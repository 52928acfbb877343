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

use anyhow::{Context, Result};

use crate::client::Session;

use super::state::RuleState;

/// Delete every rule of the ACL, the default ones included
pub(super) async fn clear_rules(session: &Session, acl_id: &str) -> Result<()> {
    let vpc = session.vpc();
    let rules = vpc
        .list_network_acl_rules(acl_id)
        .await
        .with_context(|| format!("Error Listing network ACL rules of {acl_id}"))?;
    for rule in rules {
        vpc.delete_network_acl_rule(acl_id, &rule.id)
            .await
            .context("Error Deleting network ACL rule")?;
        tracing::debug!("Deleted rule {} of network ACL {acl_id}", rule.id);
    }
    Ok(())
}

/// Append the rules in declaration order
pub(super) async fn create_rules(
    session: &Session,
    acl_id: &str,
    rules: &[&RuleState<'_>],
) -> Result<()> {
    let vpc = session.vpc();
    for rule in rules {
        let created = vpc
            .create_network_acl_rule(acl_id, &rule.prototype())
            .await
            .context("Error Creating network ACL rule")?;
        tracing::debug!("Created rule {} of network ACL {acl_id}", created.id);
    }
    Ok(())
}

/// Replace the whole rule list: rules cannot be edited in place
pub(super) async fn replace_rules(
    session: &Session,
    acl_id: &str,
    rules: &[&RuleState<'_>],
) -> Result<()> {
    clear_rules(session, acl_id).await?;
    create_rules(session, acl_id, rules).await
}

#[cfg(test)]
mod tests {
    use tf_provider::value::Value;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::client::tests::mock_session;

    #[tokio::test]
    async fn replace_clears_then_appends_in_order() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/network_acls/acl-1/rules"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "rules": [
                    { "id": "default-in", "name": "allow-inbound", "protocol": "all" },
                    { "id": "default-out", "name": "allow-outbound", "protocol": "all" },
                ],
            })))
            .mount(&server)
            .await;
        for rule in ["default-in", "default-out"] {
            Mock::given(method("DELETE"))
                .and(path(format!("/v1/network_acls/acl-1/rules/{rule}")))
                .respond_with(ResponseTemplate::new(204))
                .expect(1)
                .mount(&server)
                .await;
        }
        for name in ["first", "second"] {
            Mock::given(method("POST"))
                .and(path("/v1/network_acls/acl-1/rules"))
                .and(body_json(serde_json::json!({
                    "name": name,
                    "action": "allow",
                    "direction": "inbound",
                    "source": "0.0.0.0/0",
                    "destination": "0.0.0.0/0",
                    "protocol": "all",
                })))
                .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                    "id": format!("rule-{name}"),
                    "name": name,
                    "protocol": "all",
                })))
                .expect(1)
                .mount(&server)
                .await;
        }

        let rule = |name: &'static str| RuleState {
            name: Value::from(name),
            action: "allow".into(),
            direction: "inbound".into(),
            source: "0.0.0.0/0".into(),
            destination: "0.0.0.0/0".into(),
            ..Default::default()
        };
        let (first, second) = (rule("first"), rule("second"));
        let session = mock_session(&server.uri());
        replace_rules(&session, "acl-1", &[&first, &second])
            .await
            .unwrap();

        let posted: Vec<String> = server
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|request| request.method.as_str() == "POST")
            .map(|request| {
                serde_json::from_slice::<serde_json::Value>(&request.body).unwrap()["name"]
                    .as_str()
                    .unwrap_or_default()
                    .to_owned()
            })
            .collect();
        assert_eq!(posted, ["first", "second"]);
    }

    #[tokio::test]
    async fn delete_failure_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/network_acls/acl-1/rules"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "rules": [{ "id": "default-in" }],
            })))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/v1/network_acls/acl-1/rules/default-in"))
            .respond_with(ResponseTemplate::new(409).set_body_json(serde_json::json!({
                "errors": [{ "code": "conflict", "message": "rule in use" }],
            })))
            .mount(&server)
            .await;

        let session = mock_session(&server.uri());
        let err = clear_rules(&session, "acl-1").await.unwrap_err();
        assert!(format!("{err:#}").starts_with("Error Deleting network ACL rule: 409"));
    }
}
