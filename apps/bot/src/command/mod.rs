pub mod asset;

use poise::CreateReply;
use tracing::warn;

use crate::{Context, Error};

/// Only allow-listed channels get answers. Others get an ephemeral refusal.
pub async fn ensure_allowed(ctx: Context<'_>) -> Result<bool, Error> {
    let channel_id = ctx.channel_id().get();
    if ctx.data().config.is_allowed(channel_id) {
        return Ok(true);
    }

    warn!(
        channel_id,
        user_id = ctx.author().id.get(),
        command = %ctx.command().name,
        "command from channel outside allow-list"
    );

    ctx.send(
        CreateReply::default()
            .content("This channel is not set up for market digests.")
            .ephemeral(true),
    )
    .await?;

    Ok(false)
}
