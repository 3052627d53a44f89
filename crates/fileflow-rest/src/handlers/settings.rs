//! Process-wide `Settings` read/update.
//!
//! Updating publishes a reload signal ([`Store::update_settings`]) that the
//! usage-sync and expiration schedulers pick up on their next loop
//! iteration, restarting their ticker with the new interval without ever
//! running two tickers at once.

use fileflow_core::{Settings, Store};

use crate::dto::SettingsUpdateRequest;
use crate::error::RestError;

pub async fn get(store: &Store) -> Result<Settings, RestError> {
    Ok(store.settings())
}

pub async fn update(store: &Store, req: SettingsUpdateRequest) -> Result<Settings, RestError> {
    Ok(store
        .update_settings(|settings| {
            if let Some(v) = req.sync_interval_minutes {
                settings.sync_interval_minutes = v;
            }
            if let Some(v) = req.endpoint_proxy {
                settings.endpoint_proxy = v;
            }
            if let Some(v) = req.endpoint_proxy_url {
                settings.endpoint_proxy_url = v;
            }
            if let Some(v) = req.default_expiration_days {
                settings.default_expiration_days = v;
            }
            if let Some(v) = req.expiration_check_minutes {
                settings.expiration_check_minutes = v;
            }
            if let Some(v) = req.s3_virtual_hosted_style {
                settings.s3_virtual_hosted_style = v;
            }
            if let Some(v) = req.s3_base_domain {
                settings.s3_base_domain = v;
            }
        })
        .await?)
}
