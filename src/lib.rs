// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Edge Gateway - Stateless Authentication Edge
//!
//! Sits in front of the internal services, verifies bearer tokens once at the
//! boundary and forwards a trusted `X-User-ID` header downstream.
//!
//! ## Modules
//!
//! - `api` - HTTP router, health and login handlers (Axum)
//! - `auth` - Token codec, verifier, issuer, route classifier and edge filter
//! - `proxy` - Forwarding to the upstream services
//! - `store` - Credential store behind the login endpoint

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod logging;
pub mod proxy;
pub mod server;
pub mod state;
pub mod store;
