// SPDX-FileCopyrightText: 2026 Molarisse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Molarisse integration tests.
//!
//! Provides a scripted transport and record builders for fast,
//! deterministic tests without a clinic server.
//!
//! # Components
//!
//! - [`MockTransport`] - In-memory server with failure injection and call capture
//! - [`fixtures`] - Builders for upstream record shapes

pub mod fixtures;
pub mod mock_transport;

pub use mock_transport::{MockTransport, Operation, TransportCall};
