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
use std::time::Duration;

use thiserror::Error;

use crate::client::ApiError;
use crate::utils::DisplayJoinable;

/// Longest sleep between two refreshes when no poll interval is set
const MAX_BACKOFF: Duration = Duration::from_secs(10);

#[derive(Error, Debug)]
pub enum WaitError {
    #[error("timeout while waiting for state to become '{}' (last state: '{last_state}', timeout: {timeout:?})", .expected.iter().join_with(", "))]
    Timeout {
        last_state: String,
        expected: Vec<String>,
        timeout: Duration,
    },

    #[error("unexpected state '{state}', wanted target '{}'", .expected.iter().join_with(", "))]
    UnexpectedState { state: String, expected: Vec<String> },

    #[error("couldn't find resource ({retries} retries)")]
    NotFound { retries: usize },

    #[error(transparent)]
    Refresh(#[from] ApiError),
}

/// Pacing of the refreshes, shared by every wait of a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Polling {
    pub delay: Duration,
    pub min_timeout: Duration,
}

impl Default for Polling {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(10),
            min_timeout: Duration::from_secs(10),
        }
    }
}

impl Polling {
    /// No initial delay, backoff from 100ms
    #[cfg(test)]
    pub fn immediate() -> Self {
        Self {
            delay: Duration::ZERO,
            min_timeout: Duration::ZERO,
        }
    }
}

/// Poll a remote object until its status reaches one of the `target` states
#[derive(Debug, Clone)]
pub struct StateChangeConf<'a> {
    pub pending: &'a [&'a str],
    pub target: &'a [&'a str],
    pub timeout: Duration,
    /// Wait before the first refresh
    pub delay: Duration,
    /// Lower bound of the backoff between refreshes
    pub min_timeout: Duration,
    /// Fixed interval between refreshes, overrides the backoff
    pub poll_interval: Option<Duration>,
    /// Consecutive "not found" refreshes tolerated while a target is expected
    pub not_found_checks: usize,
}

impl<'a> StateChangeConf<'a> {
    pub fn new(pending: &'a [&'a str], target: &'a [&'a str], timeout: Duration) -> Self {
        Self {
            pending,
            target,
            timeout,
            delay: Duration::from_secs(10),
            min_timeout: Duration::from_secs(10),
            poll_interval: None,
            not_found_checks: 20,
        }
    }

    pub fn with_polling(mut self, polling: Polling) -> Self {
        self.delay = polling.delay;
        self.min_timeout = polling.min_timeout;
        self
    }

    /// Wait for the object returned by `refresh` to reach a target state.
    ///
    /// `refresh` yields the object with its current state, or `None` when the
    /// object does not exist. With an empty `target`, a missing object ends
    /// the wait successfully.
    pub async fn wait_for_state<T, F, Fut>(&self, mut refresh: F) -> Result<Option<T>, WaitError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<(T, String)>, ApiError>>,
    {
        let mut last_state = String::new();
        let result: Result<Result<Option<T>, WaitError>, _> = tokio::time::timeout(self.timeout, async {
            tokio::time::sleep(self.delay).await;

            let mut wait = Duration::from_millis(100);
            let mut not_found = 0;
            loop {
                match refresh().await? {
                    Some((object, state)) => {
                        not_found = 0;
                        tracing::debug!("Waiting for {:?}, current state: {state}", self.target);
                        if self.target.contains(&state.as_str()) {
                            return Ok(Some(object));
                        }
                        if !self.pending.contains(&state.as_str()) {
                            return Err(WaitError::UnexpectedState {
                                state,
                                expected: self.expected(),
                            });
                        }
                        last_state = state;
                    }
                    None if self.target.is_empty() => return Ok(None),
                    None => {
                        not_found += 1;
                        if not_found > self.not_found_checks {
                            return Err(WaitError::NotFound { retries: not_found });
                        }
                    }
                }

                wait = match self.poll_interval {
                    Some(interval) => interval,
                    None => wait.clamp(self.min_timeout.min(MAX_BACKOFF), MAX_BACKOFF),
                };
                tokio::time::sleep(wait).await;
                wait *= 2;
            }
        })
        .await;

        match result {
            Ok(result) => result,
            Err(_) => Err(WaitError::Timeout {
                last_state,
                expected: self.expected(),
                timeout: self.timeout,
            }),
        }
    }

    fn expected(&self) -> Vec<String> {
        self.target.iter().map(|state| state.to_string()).collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn scripted<'a>(
        states: &'a [Option<&'a str>],
        calls: &'a AtomicUsize,
    ) -> impl FnMut() -> std::future::Ready<Result<Option<(usize, String)>, ApiError>> + 'a {
        move || {
            let call = calls.fetch_add(1, Ordering::SeqCst);
            let state = states[call.min(states.len() - 1)];
            std::future::ready(Ok(state.map(|state| (call, state.to_owned()))))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn reaches_target() {
        let calls = AtomicUsize::new(0);
        let states = [Some("pending"), Some("pending"), Some("running")];
        let conf = StateChangeConf::new(&["pending"], &["running"], Duration::from_secs(600));

        let object = conf
            .wait_for_state(scripted(&states, &calls))
            .await
            .unwrap();
        assert_eq!(object, Some(2));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn unexpected_state_fails() {
        let calls = AtomicUsize::new(0);
        let states = [Some("pending"), Some("failed")];
        let conf = StateChangeConf::new(&["pending"], &["stable"], Duration::from_secs(600));

        let err = conf
            .wait_for_state(scripted(&states, &calls))
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "unexpected state 'failed', wanted target 'stable'"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_reports_last_state() {
        let calls = AtomicUsize::new(0);
        let states = [Some("deleting")];
        let conf = StateChangeConf::new(&["deleting"], &["done", ""], Duration::from_secs(60));

        let err = conf
            .wait_for_state(scripted(&states, &calls))
            .await
            .unwrap_err();
        match &err {
            WaitError::Timeout { last_state, .. } => assert_eq!(last_state, "deleting"),
            other => panic!("unexpected error {other}"),
        }
        assert!(err.to_string().contains("'done, '"));
        // 10s delay, then at most one refresh every 10s
        assert!(calls.load(Ordering::SeqCst) <= 6);
    }

    #[tokio::test(start_paused = true)]
    async fn absence_satisfies_empty_target() {
        let calls = AtomicUsize::new(0);
        let states = [Some("deleting"), None];
        let conf = StateChangeConf::new(&["deleting"], &[], Duration::from_secs(600));

        let object = conf
            .wait_for_state(scripted(&states, &calls))
            .await
            .unwrap();
        assert_eq!(object, None);
    }

    #[tokio::test(start_paused = true)]
    async fn persistent_absence_fails() {
        let calls = AtomicUsize::new(0);
        let states = [None];
        let mut conf = StateChangeConf::new(&["pending"], &["available"], Duration::from_secs(3600));
        conf.not_found_checks = 2;

        let err = conf
            .wait_for_state(scripted(&states, &calls))
            .await
            .unwrap_err();
        assert!(matches!(err, WaitError::NotFound { retries: 3 }));
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_error_aborts() {
        let conf = StateChangeConf::new(&["pending"], &["available"], Duration::from_secs(600));
        let err = conf
            .wait_for_state(|| async {
                Err::<Option<((), String)>, _>(ApiError::Auth("expired".into()))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, WaitError::Refresh(ApiError::Auth(_))));
    }
}
