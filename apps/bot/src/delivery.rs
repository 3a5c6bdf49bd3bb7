use std::mem::take;

use market::AssetReport;
use serenity::all::{ChannelId, CreateEmbed, CreateMessage, Http};
use tracing::{debug, warn};

/// Discord caps a message at ten embeds.
pub const BATCH_SIZE: usize = 10;

const COLOR_OK: u32 = 0x00d084;
const COLOR_DEGRADED: u32 = 0x808080;

pub fn report_embed(report: &AssetReport) -> CreateEmbed {
    let color = if report.is_incomplete() {
        COLOR_DEGRADED
    } else {
        COLOR_OK
    };

    CreateEmbed::default()
        .title(report.title())
        .description(report.body())
        .color(color)
}

/// Fire-and-forget delivery of a digest to one channel. Failed batches are
/// logged and skipped; returns how many embeds went out.
pub async fn send_reports(http: &Http, channel: ChannelId, reports: &[AssetReport]) -> usize {
    let mut sent = 0;
    let mut embeds: Vec<CreateEmbed> = Vec::with_capacity(BATCH_SIZE);

    for (i, report) in reports.iter().enumerate() {
        embeds.push(report_embed(report));

        if embeds.len() == BATCH_SIZE || i + 1 == reports.len() {
            let count = embeds.len();
            let msg = CreateMessage::new().embeds(take(&mut embeds));

            match channel.send_message(http, msg).await {
                Ok(_) => {
                    sent += count;
                    debug!(channel_id = %channel, count, "digest batch sent");
                }
                Err(e) => warn!(channel_id = %channel, error = ?e, "send batch failed"),
            }
        }
    }

    sent
}

#[cfg(test)]
mod tests {
    use market::asset::ASSETS;
    use market::indicators::rsi::RsiReading;
    use market::{Interval, Quote};

    use super::*;

    fn report(quote: Option<Quote>) -> AssetReport {
        AssetReport {
            asset: &ASSETS[0],
            quote,
            rsi: vec![(
                Interval::Day1,
                RsiReading {
                    current: Some(55.0),
                    previous: Some(50.0),
                },
            )],
        }
    }

    #[test]
    fn embed_carries_report_text() {
        let full = report(Some(Quote {
            price: 64000.0,
            change_percent: None,
        }));
        let json = serde_json::to_value(report_embed(&full)).unwrap();

        assert_eq!(json["title"], "Bitcoin (BTC/USD)");
        assert_eq!(json["description"], full.body());
        assert_eq!(json["color"], COLOR_OK);
    }

    #[test]
    fn incomplete_report_is_grey() {
        let json = serde_json::to_value(report_embed(&report(None))).unwrap();
        assert_eq!(json["color"], COLOR_DEGRADED);
        assert!(json["description"].as_str().unwrap().starts_with("Price: N/A"));
    }
}
