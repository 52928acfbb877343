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

//! Zone level settings of a Cloud Internet Services domain. The settings
//! always exist remotely: creating the resource only takes them over.

use std::collections::BTreeSet;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::{stream, FutureExt, StreamExt};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::json;

use tf_provider::schema::{
    AttributeConstraint, AttributeType, Block, Description, NestedBlock, Schema,
};
use tf_provider::value::{self, Value, ValueBool, ValueEmpty, ValueNumber, ValueSet, ValueString};
use tf_provider::{map, AttributePath, Diagnostics, Resource};

use crate::client::cis::CisApi;
use crate::client::{ApiError, Session, SessionHandle};
use crate::utils::{attribute, string_set, WithSchema, WithValidate};
use crate::validators;

const CONCURRENCY: usize = 8;
const DEFAULT_MIN_TLS_VERSION: &str = "1.1";

const ON_OFF: &[&str] = &["on", "off"];
const CHALLENGE_TTLS: &[i64] = &[
    300, 900, 1800, 2700, 3600, 7200, 10800, 14400, 28800, 57600, 86400, 604800, 2592000, 31536000,
];
const CIPHERS: &[&str] = &[
    "ECDHE-ECDSA-AES128-GCM-SHA256",
    "ECDHE-ECDSA-CHACHA20-POLY1305",
    "ECDHE-RSA-AES128-GCM-SHA256",
    "ECDHE-RSA-CHACHA20-POLY1305",
    "ECDHE-ECDSA-AES128-SHA256",
    "ECDHE-ECDSA-AES128-SHA",
    "ECDHE-RSA-AES128-SHA256",
    "ECDHE-RSA-AES128-SHA",
    "AES128-GCM-SHA256",
    "AES128-SHA256",
    "AES128-SHA",
    "ECDHE-ECDSA-AES256-GCM-SHA384",
    "ECDHE-ECDSA-AES256-SHA384",
    "ECDHE-RSA-AES256-GCM-SHA384",
    "ECDHE-RSA-AES256-SHA384",
    "ECDHE-RSA-AES256-SHA",
    "AES256-GCM-SHA384",
    "AES256-SHA256",
    "AES256-SHA",
    "DES-CBC3-SHA",
];

/// Settings that are not plain strings
const OTHER_SETTINGS: &[&str] = &[
    "challenge_ttl",
    "max_upload",
    "cipher",
    "minify",
    "security_header",
    "mobile_redirect",
];

fn allowed_values(name: &str) -> &'static [&'static str] {
    match name {
        "dnssec" => &["active", "disabled"],
        "ssl" => &["off", "flexible", "full", "strict", "origin_pull"],
        "min_tls_version" => &["1.1", "1.2", "1.3", "1.4"],
        "cname_flattening" => &["flatten_at_root", "flatten_all", "flatten_none"],
        "image_size_optimization" => &["lossless", "off", "lossy"],
        "pseudo_ipv4" => &["overwrite_header", "off", "add_header"],
        _ => ON_OFF,
    }
}

/// Name of the setting in the CIS API
fn api_name(name: &str) -> &str {
    match name {
        "cipher" => "ciphers",
        name => name,
    }
}

fn parse_id(id: &str) -> Result<(&str, &str)> {
    match id.split_once(':') {
        Some((zone, crn)) if !zone.is_empty() && !crn.is_empty() => Ok((zone, crn)),
        _ => Err(anyhow!(
            "Incorrect ID {id:?}: expected <domain_id>:<cis_id>"
        )),
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CisDomainSettingsState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub cis_id: ValueString<'a>,
    pub domain_id: ValueString<'a>,
    pub dnssec: ValueString<'a>,
    pub waf: ValueString<'a>,
    pub ssl: ValueString<'a>,
    pub min_tls_version: ValueString<'a>,
    pub cname_flattening: ValueString<'a>,
    pub opportunistic_encryption: ValueString<'a>,
    pub automatic_https_rewrites: ValueString<'a>,
    pub always_use_https: ValueString<'a>,
    pub ipv6: ValueString<'a>,
    pub browser_check: ValueString<'a>,
    pub hotlink_protection: ValueString<'a>,
    pub http2: ValueString<'a>,
    pub image_load_optimization: ValueString<'a>,
    pub image_size_optimization: ValueString<'a>,
    pub ip_geolocation: ValueString<'a>,
    pub origin_error_page_pass_thru: ValueString<'a>,
    pub brotli: ValueString<'a>,
    pub pseudo_ipv4: ValueString<'a>,
    pub prefetch_preload: ValueString<'a>,
    pub response_buffering: ValueString<'a>,
    pub script_load_optimization: ValueString<'a>,
    pub server_side_exclude: ValueString<'a>,
    pub tls_client_auth: ValueString<'a>,
    pub true_client_ip_header: ValueString<'a>,
    pub websockets: ValueString<'a>,
    pub challenge_ttl: ValueNumber,
    pub max_upload: ValueNumber,
    pub cipher: ValueSet<ValueString<'a>>,
    #[serde(with = "value::serde_as_vec")]
    pub minify: Value<MinifyState<'a>>,
    #[serde(with = "value::serde_as_vec")]
    pub security_header: Value<SecurityHeaderState>,
    #[serde(with = "value::serde_as_vec")]
    pub mobile_redirect: Value<MobileRedirectState<'a>>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinifyState<'a> {
    pub css: ValueString<'a>,
    pub html: ValueString<'a>,
    pub js: ValueString<'a>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityHeaderState {
    pub enabled: ValueBool,
    pub include_subdomains: ValueBool,
    pub max_age: ValueNumber,
    pub nosniff: ValueBool,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MobileRedirectState<'a> {
    pub status: ValueString<'a>,
    pub mobile_subdomain: ValueString<'a>,
    pub strip_uri: ValueBool,
}

macro_rules! string_settings {
    ($($field:ident),* $(,)?) => {
        const STRING_SETTINGS: &[&str] = &[$(stringify!($field)),*];

        impl<'a> CisDomainSettingsState<'a> {
            fn strings(&self) -> Vec<(&'static str, &ValueString<'a>)> {
                vec![$((stringify!($field), &self.$field)),*]
            }

            fn strings_mut(&mut self) -> Vec<(&'static str, &mut ValueString<'a>)> {
                vec![$((stringify!($field), &mut self.$field)),*]
            }
        }
    };
}

string_settings!(
    dnssec,
    waf,
    ssl,
    min_tls_version,
    cname_flattening,
    opportunistic_encryption,
    automatic_https_rewrites,
    always_use_https,
    ipv6,
    browser_check,
    hotlink_protection,
    http2,
    image_load_optimization,
    image_size_optimization,
    ip_geolocation,
    origin_error_page_pass_thru,
    brotli,
    pseudo_ipv4,
    prefetch_preload,
    response_buffering,
    script_load_optimization,
    server_side_exclude,
    tls_client_auth,
    true_client_ip_header,
    websockets,
);

fn json_string(value: &ValueString) -> Option<serde_json::Value> {
    value.as_deref_option().map(|text| json!(text))
}

fn string_of(value: &serde_json::Value) -> ValueString<'static> {
    match value {
        serde_json::Value::String(text) => text.clone().into(),
        serde_json::Value::Null => Value::Null,
        other => other.to_string().into(),
    }
}

impl<'a> CisDomainSettingsState<'a> {
    fn zone_id(&self) -> &str {
        let domain = self.domain_id.as_str();
        domain.split_once(':').map_or(domain, |(zone, _)| zone)
    }

    /// Settings whose configured value differs from `prior`, in the order they are sent
    fn updates(&self, prior: &Self) -> Vec<(&'static str, serde_json::Value)> {
        let mut updates = Vec::new();
        for ((name, value), (_, previous)) in self.strings().into_iter().zip(prior.strings()) {
            if value != previous {
                updates.extend(json_string(value).map(|value| (name, value)));
            }
        }
        for (name, value, previous) in [
            ("challenge_ttl", &self.challenge_ttl, &prior.challenge_ttl),
            ("max_upload", &self.max_upload, &prior.max_upload),
        ] {
            if let (Some(value), true) = (value.as_ref_option(), value != previous) {
                updates.push((name, json!(value)));
            }
        }
        if let (Value::Value(ciphers), true) = (&self.cipher, self.cipher != prior.cipher) {
            let ciphers: Vec<&str> = ciphers.iter().filter_map(|c| c.as_deref_option()).collect();
            updates.push(("cipher", json!(ciphers)));
        }
        if let (Value::Value(minify), true) = (&self.minify, self.minify != prior.minify) {
            updates.push((
                "minify",
                json!({
                    "css": minify.css.as_str(),
                    "html": minify.html.as_str(),
                    "js": minify.js.as_str(),
                }),
            ));
        }
        if let (Value::Value(header), true) = (
            &self.security_header,
            self.security_header != prior.security_header,
        ) {
            updates.push((
                "security_header",
                json!({
                    "strict_transport_security": {
                        "enabled": header.enabled.as_ref_option(),
                        "max_age": header.max_age.as_ref_option(),
                        "include_subdomains": header.include_subdomains.as_ref_option(),
                        "nosniff": header.nosniff.as_ref_option(),
                    },
                }),
            ));
        }
        if let (Value::Value(redirect), true) = (
            &self.mobile_redirect,
            self.mobile_redirect != prior.mobile_redirect,
        ) {
            let mut value = json!({ "status": redirect.status.as_str() });
            if let Some(subdomain) = redirect.mobile_subdomain.as_deref_option() {
                value["mobile_subdomain"] = json!(subdomain);
            }
            if let Some(strip_uri) = redirect.strip_uri.as_ref_option() {
                value["strip_uri"] = json!(strip_uri);
            }
            updates.push(("mobile_redirect", value));
        }
        updates
    }

    /// Store the remote value of a setting. Blocks are only refreshed when declared.
    fn apply(&mut self, name: &str, value: serde_json::Value) {
        if let Some((_, field)) = self.strings_mut().into_iter().find(|(n, _)| *n == name) {
            *field = string_of(&value);
            return;
        }
        match name {
            "challenge_ttl" => self.challenge_ttl = value.as_i64().into(),
            "max_upload" => self.max_upload = value.as_i64().into(),
            "cipher" => {
                self.cipher = Value::Value(
                    value
                        .as_array()
                        .into_iter()
                        .flatten()
                        .filter_map(|cipher| cipher.as_str())
                        .map(|cipher| ValueString::from(cipher.to_owned()))
                        .collect::<BTreeSet<_>>(),
                )
            }
            "minify" => {
                if let Value::Value(minify) = &mut self.minify {
                    minify.css = string_of(&value["css"]);
                    minify.html = string_of(&value["html"]);
                    minify.js = string_of(&value["js"]);
                }
            }
            "security_header" => {
                if let Value::Value(header) = &mut self.security_header {
                    let sts = &value["strict_transport_security"];
                    header.enabled = sts["enabled"].as_bool().into();
                    header.include_subdomains = sts["include_subdomains"].as_bool().into();
                    header.max_age = sts["max_age"].as_i64().into();
                    header.nosniff = sts["nosniff"].as_bool().into();
                }
            }
            "mobile_redirect" => {
                if let Value::Value(redirect) = &mut self.mobile_redirect {
                    redirect.status = string_of(&value["status"]);
                    redirect.mobile_subdomain = string_of(&value["mobile_subdomain"]);
                    redirect.strip_uri = value["strip_uri"].as_bool().into();
                }
            }
            _ => tracing::warn!("Ignoring unknown CIS setting {name}"),
        }
    }

    /// Settings the service refused to read stay unset
    fn clear_unknowns(&mut self) {
        for (_, value) in self.strings_mut() {
            if value.is_unknown() {
                *value = Value::Null;
            }
        }
        for value in [&mut self.challenge_ttl, &mut self.max_upload] {
            if value.is_unknown() {
                *value = Value::Null;
            }
        }
        if self.cipher.is_unknown() {
            self.cipher = Value::Null;
        }
    }
}

impl<'a> WithSchema for CisDomainSettingsState<'a> {
    fn schema() -> Schema {
        use AttributeConstraint::{Computed, Optional, OptionalComputed, Required};
        use AttributeType::{Bool, Number, String};
        let mut attributes = map! {
            "id" => attribute(String, Computed, "`<domain_id>:<cis_id>`"),
            "cis_id" => attribute(String, Required, "CIS instance CRN"),
            "domain_id" => attribute(String, Required, "Associated CIS domain"),
            "challenge_ttl" => attribute(Number, OptionalComputed, "Challenge TTL in seconds"),
            "max_upload" => attribute(Number, OptionalComputed, "Maximum upload size in MB, 100 to 500 by steps of 25"),
            "cipher" => attribute(string_set(), OptionalComputed, "Allowed TLS ciphers"),
        };
        for name in STRING_SETTINGS {
            attributes.insert(
                name.to_string(),
                attribute(String, OptionalComputed, &format!("`{name}` setting")),
            );
        }
        Schema {
            version: 1,
            block: Block {
                version: 1,
                description: Description::plain("Settings of a CIS domain"),
                attributes,
                blocks: map! {
                    "minify" => NestedBlock::Optional(Block {
                        description: Description::plain("Minification of served resources"),
                        attributes: map! {
                            "css" => attribute(String, Required, "Minify CSS, `on` or `off`"),
                            "html" => attribute(String, Required, "Minify HTML, `on` or `off`"),
                            "js" => attribute(String, Required, "Minify JavaScript, `on` or `off`"),
                        },
                        ..Default::default()
                    }),
                    "security_header" => NestedBlock::Optional(Block {
                        description: Description::plain("HTTP Strict Transport Security header"),
                        attributes: map! {
                            "enabled" => attribute(Bool, Required, "Send the header"),
                            "include_subdomains" => attribute(Bool, Required, "Apply to subdomains"),
                            "max_age" => attribute(Number, Required, "Max age in seconds"),
                            "nosniff" => attribute(Bool, Required, "Send `X-Content-Type-Options: nosniff`"),
                        },
                        ..Default::default()
                    }),
                    "mobile_redirect" => NestedBlock::Optional(Block {
                        description: Description::plain("Redirection of mobile visitors"),
                        attributes: map! {
                            "status" => attribute(String, Required, "`on` or `off`"),
                            "mobile_subdomain" => attribute(String, OptionalComputed, "Subdomain mobile visitors are sent to"),
                            "strip_uri" => attribute(Bool, Optional, "Drop the path of the redirected URL"),
                        },
                        ..Default::default()
                    }),
                },
                ..Default::default()
            },
        }
    }
}

#[async_trait]
impl<'a> WithValidate for CisDomainSettingsState<'a> {
    async fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        for (name, value) in self.strings() {
            validators::allowed_string(
                diags,
                attr_path.clone().attribute(name),
                value,
                allowed_values(name),
            );
        }
        validators::allowed_int(
            diags,
            attr_path.clone().attribute("challenge_ttl"),
            &self.challenge_ttl,
            CHALLENGE_TTLS,
        );
        let max_uploads: Vec<i64> = (100..=500).step_by(25).collect();
        validators::allowed_int(
            diags,
            attr_path.clone().attribute("max_upload"),
            &self.max_upload,
            &max_uploads,
        );
        for cipher in self.cipher.iter().flatten() {
            validators::allowed_string(diags, attr_path.clone().attribute("cipher"), cipher, CIPHERS);
        }
        if let Value::Value(minify) = &self.minify {
            let path = attr_path.clone().attribute("minify").index(0);
            for (name, value) in [("css", &minify.css), ("html", &minify.html), ("js", &minify.js)] {
                validators::allowed_string(diags, path.clone().attribute(name), value, ON_OFF);
            }
        }
        if let Value::Value(redirect) = &self.mobile_redirect {
            validators::allowed_string(
                diags,
                attr_path.attribute("mobile_redirect").index(0).attribute("status"),
                &redirect.status,
                ON_OFF,
            );
        }
    }
}

fn method_not_allowed(err: &ApiError) -> bool {
    err.status() == Some(StatusCode::METHOD_NOT_ALLOWED)
}

async fn fetch_setting(
    cis: &CisApi<'_>,
    crn: &str,
    zone_id: &str,
    name: &str,
) -> Result<serde_json::Value, ApiError> {
    if name == "dnssec" {
        Ok(json!(cis.get_dnssec(crn, zone_id).await?.status))
    } else {
        Ok(cis.get_setting(crn, zone_id, api_name(name)).await?.value)
    }
}

/// Send every update in order. Settings the plan does not allow (405) are skipped.
async fn push_updates(
    diags: &mut Diagnostics,
    cis: &CisApi<'_>,
    crn: &str,
    zone_id: &str,
    updates: Vec<(&'static str, serde_json::Value)>,
) -> Result<()> {
    for (name, value) in updates {
        tracing::debug!("Updating CIS setting {name} of zone {zone_id}");
        let result = if name == "dnssec" {
            cis.update_dnssec(crn, zone_id, value.as_str().unwrap_or_default())
                .await
                .map(drop)
        } else {
            cis.update_setting(crn, zone_id, api_name(name), value)
                .await
                .map(drop)
        };
        match result {
            Ok(()) => {}
            Err(err) if method_not_allowed(&err) => {
                tracing::warn!("Update {name}: {err}");
                diags.warning(
                    "Setting not available",
                    format!("{err}"),
                    AttributePath::new(name),
                );
            }
            Err(err) => {
                return Err(err).with_context(|| format!("Update settings failed on {name}"));
            }
        }
    }
    Ok(())
}

/// Read every setting. `Ok(false)` when the zone is gone.
async fn refresh(session: &Session, state: &mut CisDomainSettingsState<'_>) -> Result<bool> {
    let id = state.id.as_str().to_owned();
    let (zone_id, crn) = parse_id(&id)?;
    let cis = session.cis();
    let cis = &cis;

    let fetches: Vec<BoxFuture<'_, (&'static str, Result<serde_json::Value, ApiError>)>> =
        STRING_SETTINGS
            .iter()
            .chain(OTHER_SETTINGS)
            .map(|&name| async move { (name, fetch_setting(cis, crn, zone_id, name).await) }.boxed())
            .collect();
    let fetched = stream::iter(fetches)
        .buffer_unordered(CONCURRENCY)
        .collect::<Vec<_>>()
        .await;

    for (name, result) in fetched {
        match result {
            Ok(value) => state.apply(name, value),
            Err(err) if err.is_not_found() => return Ok(false),
            Err(err) if method_not_allowed(&err) => tracing::warn!("Get {name}: {err}"),
            Err(err) => return Err(err).with_context(|| format!("Get settings failed on {name}")),
        }
    }
    state.clear_unknowns();
    state.cis_id = crn.to_owned().into();
    if state.domain_id.is_null() || state.zone_id() != zone_id {
        state.domain_id = zone_id.to_owned().into();
    }
    Ok(true)
}

#[derive(Debug, Default, Clone)]
pub struct CisDomainSettingsResource {
    session: SessionHandle,
}

impl CisDomainSettingsResource {
    pub fn new(session: SessionHandle) -> Self {
        Self { session }
    }
}

/// Push the settings that changed since `prior`, then read everything back
async fn apply_settings<'a>(
    diags: &mut Diagnostics,
    session: &Session,
    prior: &CisDomainSettingsState<'a>,
    planned: &CisDomainSettingsState<'a>,
) -> Result<CisDomainSettingsState<'a>> {
    let crn = planned.cis_id.as_str();
    let zone_id = planned.zone_id();
    push_updates(diags, &session.cis(), crn, zone_id, planned.updates(prior)).await?;

    let mut state = planned.clone();
    state.id = format!("{zone_id}:{crn}").into();
    if !refresh(session, &mut state).await? {
        return Err(anyhow!("CIS domain {zone_id} not found"));
    }
    Ok(state)
}

fn default_min_tls_version(state: &mut CisDomainSettingsState) {
    if state.min_tls_version.is_null() {
        state.min_tls_version = DEFAULT_MIN_TLS_VERSION.into();
    }
}

#[async_trait]
impl Resource for CisDomainSettingsResource {
    type State<'a> = CisDomainSettingsState<'a>;
    type PrivateState<'a> = ValueEmpty;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(CisDomainSettingsState::schema())
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
        match refresh(&session, &mut refreshed).await {
            Ok(true) => Some((refreshed, private_state)),
            Ok(false) => {
                tracing::info!("CIS domain of {} not found, removing settings from state", state.id);
                None
            }
            Err(err) => {
                diags.root_error("Error reading CIS domain settings", format!("{err:#}"));
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
        default_min_tls_version(&mut state);
        for (_, value) in state.strings_mut() {
            if value.is_null() {
                *value = Value::Unknown;
            }
        }
        for value in [&mut state.challenge_ttl, &mut state.max_upload] {
            if value.is_null() {
                *value = Value::Unknown;
            }
        }
        if state.cipher.is_null() {
            state.cipher = Value::Unknown;
        }
        if let Value::Value(redirect) = &mut state.mobile_redirect {
            if redirect.mobile_subdomain.is_null() {
                redirect.mobile_subdomain = Value::Unknown;
            }
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
        if state.cis_id != prior_state.cis_id {
            trigger_replace.push(AttributePath::new("cis_id"));
        }
        if state.zone_id() != prior_state.zone_id() {
            trigger_replace.push(AttributePath::new("domain_id"));
        }
        default_min_tls_version(&mut state);
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
        match apply_settings(diags, &session, &Default::default(), &planned_state).await {
            Ok(state) => Some((state, private_state)),
            Err(err) => {
                diags.root_error("Error applying CIS domain settings", format!("{err:#}"));
                None
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
        match apply_settings(diags, &session, &prior_state, &planned_state).await {
            Ok(state) => Some((state, private_state)),
            Err(err) => {
                diags.root_error("Error applying CIS domain settings", format!("{err:#}"));
                Some((prior_state, private_state))
            }
        }
    }

    async fn destroy<'a>(
        &self,
        _diags: &mut Diagnostics,
        state: Self::State<'a>,
        _planned_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<()> {
        tracing::info!("Settings of {} are left in place", state.id);
        Some(())
    }

    async fn import<'a>(
        &self,
        diags: &mut Diagnostics,
        id: String,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        if let Err(err) = parse_id(&id) {
            diags.root_error("Cannot import CIS domain settings", format!("{err:#}"));
            return None;
        }
        let state = CisDomainSettingsState {
            id: Value::from(id.clone()),
            ..Default::default()
        };
        let imported = self
            .read(diags, state, Default::default(), Default::default())
            .await;
        if imported.is_none() && diags.errors.is_empty() {
            diags.root_error(
                "Cannot import non-existent remote object",
                format!("CIS domain of {id} does not exist"),
            );
        }
        imported
    }
}
