// mailverify
// Copyright (C) 2024 mailverify contributors

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published
// by the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Transport-level errors from one SMTP port attempt, before they are folded
//! into a [`crate::verdict::ProbeOutcome`] by the prober.

use serde::Serialize;
use thiserror::Error;

/// Classifies why a single port attempt failed before any SMTP reply could
/// be parsed. The prober maps each variant onto the matching
/// `unknown_timeout`/`unknown_refused`/`unknown` probe outcome.
#[derive(Debug, Error, Serialize)]
#[serde(tag = "type", content = "message")]
pub enum ProbeTransportError {
    /// The connect-and-read deadline for this port elapsed.
    #[error("connection timed out: {0}")]
    Timeout(String),
    /// The remote host actively refused the TCP connection.
    #[error("connection refused: {0}")]
    Refused(String),
    /// Any other I/O or protocol-level failure on this port.
    #[error("SMTP transport error: {0}")]
    Other(String),
}

impl ProbeTransportError {
    pub fn from_io(err: &std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::TimedOut => ProbeTransportError::Timeout(err.to_string()),
            std::io::ErrorKind::ConnectionRefused => ProbeTransportError::Refused(err.to_string()),
            _ => ProbeTransportError::Other(err.to_string()),
        }
    }
}
