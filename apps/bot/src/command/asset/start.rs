use std::iter::once;

use ::serenity::all::{
    CreateActionRow, CreateSelectMenu, CreateSelectMenuKind, CreateSelectMenuOption,
};
use market::Selection;
use market::asset::{ALL_ASSETS_PHRASE, ASSETS};
use poise::CreateReply;
use poise::serenity_prelude as serenity;
use tracing::{debug, info, warn};

use crate::command::ensure_allowed;
use crate::{Context, Data, Error, delivery};

pub const SELECT_ASSET_ID: &str = "select_asset";

const NOT_ALLOWED_TEXT: &str = "This channel is not set up for market digests.";
const UNKNOWN_SELECTION_TEXT: &str = "That selection is no longer available. Run /start again.";

fn ephemeral(text: &str) -> serenity::CreateInteractionResponse {
    serenity::CreateInteractionResponse::Message(
        serenity::CreateInteractionResponseMessage::new()
            .content(text)
            .ephemeral(true),
    )
}

pub fn menu_reply() -> CreateReply {
    let opts: Vec<CreateSelectMenuOption> = ASSETS
        .iter()
        .map(|a| CreateSelectMenuOption::new(a.display_name, a.display_name).description(a.symbol))
        .chain(once(CreateSelectMenuOption::new(
            ALL_ASSETS_PHRASE,
            ALL_ASSETS_PHRASE,
        )))
        .collect();

    let menu = CreateSelectMenu::new(
        SELECT_ASSET_ID,
        CreateSelectMenuKind::String { options: opts },
    )
    .placeholder("Choose an asset...")
    .min_values(1)
    .max_values(1);

    CreateReply::default()
        .content("Pick an asset for its market digest:")
        .components(vec![CreateActionRow::SelectMenu(menu)])
}

#[poise::command(slash_command)]
pub async fn start(ctx: Context<'_>) -> Result<(), Error> {
    if !ensure_allowed(ctx).await? {
        return Ok(());
    }

    info!(user_id = ctx.author().id.get(), "start: presenting asset menu");
    ctx.send(menu_reply()).await?;
    Ok(())
}

pub async fn handle_component(
    ctx: &serenity::Context,
    data: &Data,
    interaction: &serenity::ComponentInteraction,
) -> Result<(), Error> {
    let id = interaction.data.custom_id.as_str();
    let user_id = interaction.user.id.get();
    let channel_id = interaction.channel_id;

    if id != SELECT_ASSET_ID {
        debug!(user_id, custom_id = id, "ignored component");
        return Ok(());
    }

    if !data.config.is_allowed(channel_id.get()) {
        warn!(user_id, %channel_id, "menu selection from channel outside allow-list");

        interaction
            .create_response(ctx, ephemeral(NOT_ALLOWED_TEXT))
            .await?;
        return Ok(());
    }

    let values = match &interaction.data.kind {
        serenity::ComponentInteractionDataKind::StringSelect { values } => values.clone(),
        _ => vec![],
    };

    let Some(selection) = values.first().and_then(|v| Selection::parse(v)) else {
        debug!(user_id, ?values, "selection did not match any asset");
        interaction
            .create_response(ctx, ephemeral(UNKNOWN_SELECTION_TEXT))
            .await?;
        return Ok(());
    };

    let assets = selection.assets();
    info!(user_id, count = assets.len(), "menu: building digest");

    // building can outlive the 3s interaction deadline
    interaction.defer(ctx).await?;

    let reports = data.digest.reports(&assets).await;
    let sent = delivery::send_reports(&ctx.http, channel_id, &reports).await;

    info!(user_id, sent, "menu: digest delivered");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_selection_gets_private_reply() {
        let json = serde_json::to_value(ephemeral(UNKNOWN_SELECTION_TEXT)).unwrap();

        // 4 = channel message with source, 64 = ephemeral flag
        assert_eq!(json["type"], 4);
        assert_eq!(json["data"]["content"], UNKNOWN_SELECTION_TEXT);
        assert_eq!(json["data"]["flags"], 64);
    }

    #[test]
    fn stale_menu_value_does_not_parse() {
        assert!(Selection::parse("Dogecoin").is_none());
    }
}
