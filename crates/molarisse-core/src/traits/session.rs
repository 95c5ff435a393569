// SPDX-FileCopyrightText: 2026 Molarisse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session-scoped key/value persistence.

/// String storage that survives a view reload but not the session.
///
/// Reads happen before any network call, so implementations must be cheap
/// and non-blocking. Write failures are the store's problem to log; callers
/// treat persistence as best effort.
pub trait SessionStore: Send + Sync + 'static {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: &str, value: &str);
}
