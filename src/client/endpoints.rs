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

use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Visibility {
    #[default]
    Public,
    Private,
    PublicAndPrivate,
}

impl FromStr for Visibility {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "public" => Ok(Visibility::Public),
            "private" => Ok(Visibility::Private),
            "public-and-private" => Ok(Visibility::PublicAndPrivate),
            other => Err(format!(
                "visibility must be one of `public`, `private`, `public-and-private`, got `{other}`"
            )),
        }
    }
}

/// Base URLs of every service the provider talks to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub vpc: String,
    pub iam: String,
    pub cis: String,
    pub schematics: String,
    pub global_tagging: String,
}

impl Endpoints {
    pub fn new(region: &str, visibility: Visibility) -> Self {
        let private = visibility == Visibility::Private;
        let prefix = if private { "private." } else { "" };
        let schematics_geo = match region {
            "us-south" | "us-east" => "us",
            "eu-gb" | "eu-de" => "eu",
            "ca-tor" => "ca",
            _ => "us",
        };
        Self {
            vpc: format!("https://{region}.{prefix}iaas.cloud.ibm.com/v1"),
            iam: format!("https://{prefix}iam.cloud.ibm.com"),
            cis: format!("https://api.{prefix}cis.cloud.ibm.com"),
            schematics: if private {
                format!("https://private-{schematics_geo}.schematics.cloud.ibm.com")
            } else {
                format!("https://{schematics_geo}.schematics.cloud.ibm.com")
            },
            global_tagging: format!("https://tags.{prefix}global-search-tagging.cloud.ibm.com"),
        }
    }

    /// Apply the `IBMCLOUD_*_API_ENDPOINT` overrides found through `lookup`
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let overrides: [(&str, &mut String); 5] = [
            ("IBMCLOUD_IS_NG_API_ENDPOINT", &mut self.vpc),
            ("IBMCLOUD_IAM_API_ENDPOINT", &mut self.iam),
            ("IBMCLOUD_CIS_API_ENDPOINT", &mut self.cis),
            ("IBMCLOUD_SCHEMATICS_API_ENDPOINT", &mut self.schematics),
            ("IBMCLOUD_GT_API_ENDPOINT", &mut self.global_tagging),
        ];
        for (var, endpoint) in overrides {
            if let Some(url) = lookup(var).filter(|url| !url.is_empty()) {
                tracing::debug!("Using {var}={url}");
                *endpoint = url.trim_end_matches('/').to_owned();
            }
        }
        self
    }

    /// Every service behind a single base URL
    #[cfg(test)]
    pub fn mock(base: &str) -> Self {
        Self {
            vpc: format!("{base}/v1"),
            iam: base.to_owned(),
            cis: base.to_owned(),
            schematics: base.to_owned(),
            global_tagging: base.to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_endpoints() {
        let endpoints = Endpoints::new("eu-de", Visibility::Public);
        assert_eq!(endpoints.vpc, "https://eu-de.iaas.cloud.ibm.com/v1");
        assert_eq!(endpoints.iam, "https://iam.cloud.ibm.com");
        assert_eq!(endpoints.schematics, "https://eu.schematics.cloud.ibm.com");
        assert_eq!(
            endpoints.global_tagging,
            "https://tags.global-search-tagging.cloud.ibm.com"
        );
    }

    #[test]
    fn private_endpoints() {
        let endpoints = Endpoints::new("us-south", Visibility::Private);
        assert_eq!(endpoints.vpc, "https://us-south.private.iaas.cloud.ibm.com/v1");
        assert_eq!(endpoints.cis, "https://api.private.cis.cloud.ibm.com");
        assert_eq!(
            endpoints.schematics,
            "https://private-us.schematics.cloud.ibm.com"
        );
    }

    #[test]
    fn overrides_replace_defaults() {
        let endpoints = Endpoints::new("us-south", Visibility::Public).with_overrides(|var| {
            (var == "IBMCLOUD_IS_NG_API_ENDPOINT").then(|| "http://localhost:1234/v1/".to_owned())
        });
        assert_eq!(endpoints.vpc, "http://localhost:1234/v1");
        assert_eq!(endpoints.iam, "https://iam.cloud.ibm.com");
    }

    #[test]
    fn visibility_parsing() {
        assert_eq!("".parse(), Ok(Visibility::Public));
        assert_eq!("private".parse(), Ok(Visibility::Private));
        assert!("internal".parse::<Visibility>().is_err());
    }
}
