use std::sync::Arc;

use bot::delivery::send_reports;
use market::DigestService;
use market::asset::ASSETS;
use serenity::all::{ChannelId, Http};
use tracing::{info, instrument, warn};

/// Scheduled digest: every asset, delivered to every allow-listed channel.
#[instrument(name = "run_daily", skip_all, fields(channels = channels.len()))]
pub async fn run_daily(http: Arc<Http>, channels: Vec<ChannelId>, digest: Arc<DigestService>) {
    if channels.is_empty() {
        warn!("no allow-listed channels, skipping scheduled digest");
        return;
    }

    let assets: Vec<_> = ASSETS.iter().collect();
    let reports = digest.reports(&assets).await;
    let incomplete = reports.iter().filter(|r| r.is_incomplete()).count();
    info!(assets = reports.len(), incomplete, "digest ready");

    for channel in channels {
        let sent = send_reports(&http, channel, &reports).await;
        info!(channel_id = %channel, sent, "scheduled digest delivered");
    }
}
