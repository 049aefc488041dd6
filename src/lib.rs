// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Workout Nagger: a personal accountability service.
//!
//! Polls WHOOP for today's workout and escalates reminders (email, then
//! SMS or WhatsApp) the longer the user goes without one.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use std::sync::Arc;

use config::Config;
use db::NagStore;
use services::{NagService, Notifiers, WhoopClient, WhoopService};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn NagStore>,
    pub whoop: WhoopService,
    pub nagger: NagService,
}

impl AppState {
    /// Wire the WHOOP client and nag service over `store`.
    pub fn new(config: Config, store: Arc<dyn NagStore>, notifiers: Notifiers) -> Self {
        let client = WhoopClient::new(
            config.whoop_client_id.clone(),
            config.whoop_client_secret.clone(),
            config.whoop_redirect_uri.clone(),
            config.provider_timeout,
        );
        let whoop = WhoopService::new(client, store.clone(), config.timezone);
        let nagger = NagService::new(
            store.clone(),
            Arc::new(whoop.clone()),
            notifiers,
            config.timezone,
            config.weight_goal_kg,
        );

        Self {
            config,
            store,
            whoop,
            nagger,
        }
    }
}
