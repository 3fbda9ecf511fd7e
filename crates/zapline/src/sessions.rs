// SPDX-FileCopyrightText: 2026 Zapline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `zapline sessions` command implementation.

use std::sync::Arc;

use serde::Serialize;
use zapline_config::ZaplineConfig;
use zapline_core::{InstanceId, SessionStore, ZaplineError};

/// Structured output for `sessions list --json`.
#[derive(Debug, Serialize)]
pub struct SessionListing {
    pub store: String,
    pub instances: Vec<InstanceId>,
}

async fn listing(store: &Arc<dyn SessionStore>) -> Result<SessionListing, ZaplineError> {
    Ok(SessionListing {
        store: store.name().to_string(),
        instances: store.list().await?,
    })
}

pub async fn run_list(config: &ZaplineConfig, json: bool) -> Result<(), ZaplineError> {
    let store = zapline_session::open_configured_store(&config.session).await?;
    let listing = listing(&store).await?;

    if json {
        let rendered = serde_json::to_string_pretty(&listing)
            .map_err(|e| ZaplineError::Internal(format!("failed to render listing: {e}")))?;
        println!("{rendered}");
    } else if listing.instances.is_empty() {
        println!("no stored sessions ({} store)", listing.store);
    } else {
        for instance_id in &listing.instances {
            println!("{instance_id}");
        }
    }
    Ok(())
}

pub async fn run_remove(config: &ZaplineConfig, instance_id: &str) -> Result<(), ZaplineError> {
    let store = zapline_session::open_configured_store(&config.session).await?;
    store.delete(&InstanceId::from(instance_id)).await?;
    println!("removed stored session of {instance_id}");
    Ok(())
}
