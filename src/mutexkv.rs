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
use std::sync::{Arc, Mutex, PoisonError};

use lazy_static::lazy_static;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

lazy_static! {
    /// Process-wide named locks
    pub static ref IBM_MUTEX_KV: MutexKV = MutexKV::default();
}

/// Lock serializing the mutations of one instance group
pub fn instance_group_key(group_id: &str) -> String {
    format!("Instance_Group_Key_{group_id}")
}

/// Table of named mutexes, created on first use and never removed
#[derive(Debug, Default)]
pub struct MutexKV {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

/// Held lock, released on drop
#[derive(Debug)]
pub struct KeyGuard {
    key: String,
    _guard: OwnedMutexGuard<()>,
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        tracing::debug!("Unlocked {:?}", self.key);
    }
}

impl MutexKV {
    pub async fn lock(&self, key: impl Into<String>) -> KeyGuard {
        let key = key.into();
        let mutex = self.get(&key);
        tracing::debug!("Locking {key:?}");
        let guard = mutex.lock_owned().await;
        tracing::debug!("Locked {key:?}");
        KeyGuard { key, _guard: guard }
    }

    fn get(&self, key: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(key.to_owned()).or_default().clone()
    }
}
