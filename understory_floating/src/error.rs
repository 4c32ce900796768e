// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error type shared by the host traits and parsers.

use alloc::string::String;
use core::fmt;

use crate::types::EventKind;

/// A host capability that may be missing.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Capability {
    /// Matching the `:focus-visible` pseudo-class.
    FocusVisible,
    /// `event.composedPath()`.
    ComposedPath,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::FocusVisible => ":focus-visible",
            Self::ComposedPath => "composedPath()",
        })
    }
}

/// Errors reported by hosts and parsers.
///
/// None of these escape a controller: listener failures are logged and
/// skipped, and capability gaps switch to a fallback heuristic.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum Error {
    /// The host refused to register a listener.
    #[error("host rejected `{kind}` listener")]
    ListenerRejected {
        /// Event type of the rejected listener.
        kind: EventKind,
    },
    /// The host lacks a capability.
    #[error("{0} is not supported by this host")]
    Unsupported(Capability),
    /// A placement string did not name one of the twelve placements.
    #[error("unknown placement `{0}`")]
    InvalidPlacement(String),
}
