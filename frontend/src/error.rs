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

//! Error types for the front end.

use thiserror::Error;

/// Result type for front end operations
pub type Result<T> = std::result::Result<T, FrontendError>;

/// Front end error types
#[derive(Debug, Error)]
pub enum FrontendError {
    /// I/O error from a listener or client transport
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TLS configuration or handshake error
    #[error("TLS error: {0}")]
    Tls(#[from] tokio_rustls::rustls::Error),

    /// SSH transport error
    #[error("SSH error: {0}")]
    Ssh(#[from] russh::Error),

    /// SSH host key loading error
    #[error("SSH key error: {0}")]
    SshKey(#[from] russh::keys::Error),

    /// WebSocket error on the backend link
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Envelope serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A required secret is missing from the key store
    #[error("Missing secret: {0}")]
    MissingSecret(&'static str),

    /// Key material could not be loaded
    #[error("Key material error: {0}")]
    KeyMaterial(String),

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),
}

impl FrontendError {
    /// Whether the error concerns a single client transport and should stay
    /// inside that session's supervisor.
    pub fn is_session_error(&self) -> bool {
        matches!(self, FrontendError::Io(_) | FrontendError::Tls(_))
    }

    /// Whether the error is fatal at startup (listener or key material).
    pub fn is_startup_fatal(&self) -> bool {
        matches!(
            self,
            FrontendError::MissingSecret(_)
                | FrontendError::KeyMaterial(_)
                | FrontendError::Config(_)
        )
    }
}
