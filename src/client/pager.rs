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

use std::future::Future;

use reqwest::Url;
use serde::Deserialize;

use super::error::Result;

/// Link to the next page of a collection
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PageLink {
    pub href: String,
}

/// A single page of a list API
pub trait Page {
    type Item;

    /// Cursor to pass back to the list call, `None` on the last page
    fn next_token(&self) -> Option<String>;
    fn into_items(self) -> Vec<Self::Item>;
}

/// Extract the cursor `param` from the `next.href` of a page.
///
/// A link without the parameter, or an empty one, ends the iteration.
pub fn next_token(next: Option<&PageLink>, param: &str) -> Option<String> {
    let url = Url::parse(&next?.href).ok()?;
    let token = url
        .query_pairs()
        .find_map(|(key, value)| (key == param).then(|| value.into_owned()))?;
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

/// Call `fetch` with the cursor of the previous page until the last page.
pub async fn collect_all<P, F, Fut>(mut fetch: F) -> Result<Vec<P::Item>>
where
    P: Page,
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<P>>,
{
    let mut items = Vec::new();
    let mut start = None;
    loop {
        let page = fetch(start.take()).await?;
        let next = page.next_token();
        items.extend(page.into_items());
        match next {
            Some(token) => start = Some(token),
            None => break,
        }
    }
    Ok(items)
}

/// Declare a VPC-style collection: items under `$field`, cursor in `next.href?start=`
macro_rules! collection {
    ($name:ident, $field:ident, $item:ty) => {
        collection!($name, $field, $item, "start");
    };
    ($name:ident, $field:ident, $item:ty, $param:literal) => {
        #[derive(Debug, Clone, Default, serde::Deserialize)]
        pub struct $name {
            #[serde(default)]
            pub $field: Vec<$item>,
            pub next: Option<$crate::client::pager::PageLink>,
        }

        impl $crate::client::pager::Page for $name {
            type Item = $item;

            fn next_token(&self) -> Option<String> {
                $crate::client::pager::next_token(self.next.as_ref(), $param)
            }

            fn into_items(self) -> Vec<$item> {
                self.$field
            }
        }
    };
}

pub(crate) use collection;
