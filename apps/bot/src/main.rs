use std::{sync::Arc, time::Duration};

use anyhow::Result;
use bot::{Data, build_digest, command, config::Config};
use poise::{Framework, FrameworkOptions};
use serenity::all::{
    ActivityData, ChannelId, ClientBuilder, FullEvent, GatewayIntents, Interaction,
};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod daily;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = Config::from_env()?;
    info!(
        allowed_channels = config.allowed_channels.len(),
        rsi_source = ?config.rsi_source,
        "configuration loaded"
    );

    let digest = Arc::new(build_digest(&config).await?);

    let intents = GatewayIntents::non_privileged();
    let commands = command::asset::commands();

    let framework = Framework::builder()
        .options(FrameworkOptions {
            event_handler: |serenity_ctx, event, _framework_ctx, data| {
                Box::pin(async move {
                    if let FullEvent::InteractionCreate { interaction, .. } = event
                        && let Interaction::Component(component) = interaction
                        && let Err(e) =
                            command::asset::handle_component(serenity_ctx, data, component).await
                    {
                        error!(error = ?e, "component handling failed");
                    }
                    Ok(())
                })
            },
            commands,
            ..Default::default()
        })
        .setup({
            let digest = Arc::clone(&digest);
            let config = config.clone();

            move |ctx, ready, framework| {
                let digest = Arc::clone(&digest);
                let config = config.clone();

                Box::pin(async move {
                    info!(
                        "{} [{}] connected successfully!",
                        ready.user.name, ready.user.id
                    );

                    poise::builtins::register_globally(ctx, &framework.options().commands).await?;

                    let ctx_clone = ctx.clone();
                    let version = config.version.clone();
                    tokio::spawn(async move {
                        let mut show_version = true;
                        let mut tick = tokio::time::interval(Duration::from_secs(30));

                        loop {
                            tick.tick().await;

                            let text = if show_version {
                                if version.starts_with('v') {
                                    version.clone()
                                } else {
                                    format!("Version - {}", version)
                                }
                            } else {
                                let now = chrono::Local::now();
                                format!("Time - {}", now.format("%H:%M (%:z)"))
                            };

                            ctx_clone.set_activity(Some(ActivityData::custom(text)));
                            show_version = !show_version;
                        }
                    });

                    Ok(Data { digest, config })
                })
            }
        })
        .build();

    let mut client = ClientBuilder::new(&config.discord_token, intents)
        .framework(framework)
        .await?;

    let http = client.http.clone();
    let channels: Vec<ChannelId> = config
        .allowed_channels
        .iter()
        .copied()
        .map(ChannelId::new)
        .collect();

    let sched = JobScheduler::new().await?;

    let digest_job = Arc::clone(&digest);

    sched
        .add(Job::new_async_tz(
            config.digest_cron.as_str(),
            config.digest_tz,
            move |_uuid, _l| {
                let http = http.clone();
                let channels = channels.clone();
                let digest = Arc::clone(&digest_job);

                Box::pin(async move {
                    daily::run_daily(http, channels, digest).await;
                })
            },
        )?)
        .await?;

    sched.shutdown_on_ctrl_c();
    sched.start().await?;
    info!(cron = %config.digest_cron, tz = %config.digest_tz, "digest scheduled");

    tokio::spawn(async move {
        if let Err(why) = client.start().await {
            error!("Client error: {why:?}");
        }
    });

    shutdown_signal().await?;

    info!("Shutdown complete.");
    Ok(())
}

async fn shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::{
            select,
            signal::unix::{SignalKind, signal},
        };
        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;
        select! {
            _ = sigterm.recv() => {},
            _ = sigint.recv()  => {},
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
    }

    Ok(())
}
