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

use std::collections::BTreeSet;

use anyhow::{Context, Result};
use tf_provider::value::{Value, ValueSet, ValueString};
use tf_provider::{AttributePath, Diagnostics};

use crate::client::Session;
use crate::utils::DisplayJoinable;

/// Names held by a `tags` attribute, unknown and null entries skipped
pub(crate) fn tag_names(tags: &ValueSet<ValueString>) -> BTreeSet<String> {
    tags.iter()
        .flatten()
        .filter_map(|tag| tag.as_deref_option().map(str::to_owned))
        .collect()
}

pub(crate) fn tags_value<'a>(tags: impl IntoIterator<Item = String>) -> ValueSet<ValueString<'a>> {
    Value::Value(tags.into_iter().map(ValueString::from).collect())
}

/// Detach the removed tags and attach the added ones, plus the environment tags
pub(crate) async fn update_tags_using_crn(
    session: &Session,
    old: &BTreeSet<String>,
    new: &BTreeSet<String>,
    crn: &str,
) -> Result<()> {
    let tagging = session.tagging();

    let remove: Vec<String> = old.difference(new).cloned().collect();
    let add: Vec<String> = new
        .difference(old)
        .chain(&session.env_tags)
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    if !remove.is_empty() {
        tagging
            .detach_tags(crn, &remove)
            .await
            .with_context(|| format!("Error detaching tags {}", remove.iter().join_with(", ")))?;
        for tag in &remove {
            tagging
                .delete_tag(tag)
                .await
                .with_context(|| format!("Error deleting tag {tag}"))?;
        }
    }

    if !add.is_empty() {
        tagging
            .attach_tags(crn, &add)
            .await
            .with_context(|| format!("Error updating tags {}", add.iter().join_with(", ")))?;
    }
    Ok(())
}

/// User tags attached to `crn`, without the environment tags
pub(crate) async fn get_tags_using_crn(session: &Session, crn: &str) -> Result<BTreeSet<String>> {
    let tags = session
        .tagging()
        .list_attached_tags(crn)
        .await
        .with_context(|| format!("Error getting tags of {crn}"))?;
    Ok(tags
        .into_iter()
        .filter(|tag| !session.env_tags.contains(tag))
        .collect())
}

/// Tag synchronization never fails the operation: errors become warnings on `tags`
pub(crate) async fn sync_tags_best_effort(
    diags: &mut Diagnostics,
    session: &Session,
    old: &ValueSet<ValueString<'_>>,
    new: &ValueSet<ValueString<'_>>,
    crn: &str,
) {
    if let Err(err) = update_tags_using_crn(session, &tag_names(old), &tag_names(new), crn).await {
        tracing::warn!("Error on create/update of resource tags ({crn}): {err:#}");
        diags.warning(
            "Error on create/update of resource tags",
            format!("{err:#}"),
            AttributePath::new("tags"),
        );
    }
}

/// Read back the attached tags, keeping `current` when the lookup fails
pub(crate) async fn read_tags_best_effort<'a>(
    diags: &mut Diagnostics,
    session: &Session,
    crn: &str,
    current: ValueSet<ValueString<'a>>,
) -> ValueSet<ValueString<'a>> {
    match get_tags_using_crn(session, crn).await {
        Ok(tags) => tags_value(tags),
        Err(err) => {
            tracing::warn!("Error getting resource tags ({crn}): {err:#}");
            diags.warning(
                "Error getting resource tags",
                format!("{err:#}"),
                AttributePath::new("tags"),
            );
            current
        }
    }
}
