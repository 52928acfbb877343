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

use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

/// Errors returned by the IBM Cloud REST clients
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{status} {message}\n{body}")]
    Status {
        status: StatusCode,
        message: String,
        body: String,
    },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IAM authentication failed: {0}")]
    Auth(String),

    #[error("Invalid endpoint URL: {0}")]
    Url(String),

    #[error("Unexpected response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Tagging failed for resource {0}")]
    Tagging(String),
}

pub type Result<T, E = ApiError> = std::result::Result<T, E>;

impl ApiError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            ApiError::Http(err) => err.status(),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(StatusCode::NOT_FOUND)
    }

    /// Build an error from a non-success response body.
    ///
    /// IBM services disagree on the error envelope: VPC and IAM return an
    /// `errors` array, CIS wraps it with `success: false`, Schematics uses a
    /// top-level `message`.
    pub(crate) fn from_body(status: StatusCode, body: String) -> Self {
        let message = serde_json::from_str::<ErrorEnvelope>(&body)
            .ok()
            .and_then(ErrorEnvelope::into_message)
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("unknown error")
                    .to_owned()
            });
        ApiError::Status {
            status,
            message,
            body,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    errors: Vec<ErrorItem>,
    message: Option<String>,
    #[serde(rename = "errorMessage")]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorItem {
    code: Option<serde_json::Value>,
    message: Option<String>,
}

impl ErrorEnvelope {
    fn into_message(self) -> Option<String> {
        if let Some(item) = self.errors.into_iter().next() {
            let message = item.message?;
            return Some(match item.code {
                Some(serde_json::Value::String(code)) => format!("{code}: {message}"),
                Some(serde_json::Value::Number(code)) => format!("{code}: {message}"),
                _ => message,
            });
        }
        self.message.or(self.error_message)
    }
}

/// Turn a 404 into `Ok(None)` so callers can treat it as "already absent".
pub trait NotFoundExt<T> {
    fn found(self) -> Result<Option<T>>;
}

impl<T> NotFoundExt<T> for Result<T> {
    fn found(self) -> Result<Option<T>> {
        match self {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vpc_error_envelope() {
        let err = ApiError::from_body(
            StatusCode::NOT_FOUND,
            r#"{"errors":[{"code":"not_found","message":"Network ACL not found"}],"trace":"abc"}"#
                .to_owned(),
        );
        assert!(err.is_not_found());
        let text = err.to_string();
        assert!(text.starts_with("404 Not Found not_found: Network ACL not found\n"));
        assert!(text.contains("\"trace\":\"abc\""));
    }

    #[test]
    fn cis_error_envelope_with_numeric_code() {
        let err = ApiError::from_body(
            StatusCode::BAD_REQUEST,
            r#"{"success":false,"errors":[{"code":1007,"message":"Invalid value"}]}"#.to_owned(),
        );
        assert!(!err.is_not_found());
        assert!(err.to_string().contains("1007: Invalid value"));
    }

    #[test]
    fn schematics_error_envelope() {
        let err = ApiError::from_body(
            StatusCode::CONFLICT,
            r#"{"requestid":"r","message":"job is locked","statuscode":409}"#.to_owned(),
        );
        assert!(err.to_string().contains("job is locked"));
    }

    #[test]
    fn unparsable_body_falls_back_to_reason() {
        let err = ApiError::from_body(StatusCode::BAD_GATEWAY, "<html>".to_owned());
        assert!(err.to_string().starts_with("502 Bad Gateway Bad Gateway\n<html>"));
    }

    #[test]
    fn found_maps_not_found_to_none() {
        let missing: Result<u32> = Err(ApiError::from_body(StatusCode::NOT_FOUND, String::new()));
        assert!(matches!(missing.found(), Ok(None)));

        let present: Result<u32> = Ok(3);
        assert!(matches!(present.found(), Ok(Some(3))));

        let failed: Result<u32> = Err(ApiError::Auth("denied".into()));
        assert!(failed.found().is_err());
    }
}
