//
// Copyright 2017-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Secret material contract.
//!
//! The actual secret store is an external collaborator; only its contract
//! matters here: it yields the shared WebSocket secret every envelope
//! carries, and the passphrase protecting the SSH host key. This
//! implementation sources both from the process environment.

use crate::error::{FrontendError, Result};

/// Environment variable holding the shared WebSocket secret.
pub const WS_SECRET_VAR: &str = "MUDGATE_WS_SECRET";

/// Environment variable holding the SSH host key passphrase.
pub const SSH_PASSPHRASE_VAR: &str = "MUDGATE_SSH_PASSPHRASE";

/// Secrets loaded at startup.
#[derive(Clone)]
pub struct KeyStore {
    ws_secret: String,
    ssh_passphrase: Option<String>,
}

impl KeyStore {
    /// Load secrets from the environment. The WebSocket secret is required;
    /// the SSH passphrase is only needed when the SSH listener is enabled
    /// and the host key is encrypted.
    pub fn from_env() -> Result<Self> {
        let ws_secret = std::env::var(WS_SECRET_VAR)
            .map_err(|_| FrontendError::MissingSecret(WS_SECRET_VAR))?;
        if ws_secret.is_empty() {
            return Err(FrontendError::MissingSecret(WS_SECRET_VAR));
        }
        let ssh_passphrase = std::env::var(SSH_PASSPHRASE_VAR).ok();
        Ok(Self {
            ws_secret,
            ssh_passphrase,
        })
    }

    /// Build a key store from explicit values (tests, embedding).
    pub fn new(ws_secret: impl Into<String>, ssh_passphrase: Option<String>) -> Self {
        Self {
            ws_secret: ws_secret.into(),
            ssh_passphrase,
        }
    }

    /// The shared symmetric token every backend envelope must carry.
    pub fn ws_secret(&self) -> &str {
        &self.ws_secret
    }

    /// Passphrase for the SSH host key, if one was provided.
    pub fn ssh_passphrase(&self) -> Option<&str> {
        self.ssh_passphrase.as_deref()
    }
}

impl std::fmt::Debug for KeyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Secrets never land in logs.
        f.debug_struct("KeyStore")
            .field("ws_secret", &"<redacted>")
            .field("ssh_passphrase", &self.ssh_passphrase.is_some())
            .finish()
    }
}
