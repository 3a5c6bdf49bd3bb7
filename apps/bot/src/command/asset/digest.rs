use market::Selection;
use market::asset::{ALL_ASSETS_PHRASE, ASSETS};
use poise::CreateReply;
use tracing::{info, warn};

use super::start::menu_reply;
use crate::command::ensure_allowed;
use crate::delivery::{BATCH_SIZE, report_embed};
use crate::{Context, Error};

#[poise::command(slash_command)]
pub async fn digest(
    ctx: Context<'_>,
    #[description = "Asset name (e.g., Bitcoin) or \"All assets\""] asset: String,
) -> Result<(), Error> {
    if !ensure_allowed(ctx).await? {
        return Ok(());
    }

    let user_id = ctx.author().id.get();
    info!(user_id, raw_input = %asset, "digest: invoked");

    let selection = match Selection::parse(&asset) {
        Some(Selection::Menu) => {
            ctx.send(menu_reply()).await?;
            return Ok(());
        }
        Some(selection) => selection,
        None => {
            warn!(user_id, raw_input = %asset, "digest: unknown asset");
            let names: Vec<&str> = ASSETS.iter().map(|a| a.display_name).collect();
            ctx.say(format!(
                "Unknown asset. Try one of: {}, or {}.",
                names.join(", "),
                ALL_ASSETS_PHRASE
            ))
            .await?;
            return Ok(());
        }
    };

    ctx.defer().await?;

    let reports = ctx.data().digest.reports(&selection.assets()).await;

    for chunk in reports.chunks(BATCH_SIZE) {
        let reply = chunk
            .iter()
            .fold(CreateReply::default(), |reply, r| reply.embed(report_embed(r)));
        ctx.send(reply).await?;
    }

    info!(user_id, reports = reports.len(), "digest: completed");
    Ok(())
}
