use anyhow::{Context, Result, bail};
use clap::Args;
use engine::{
    AdapterSet, Disposition, EventKind, Processed, SubscriptionStatus, SyncController,
};
use shared::{
    config::SyncConfig,
    models::{ConversationId, FetchMode},
};
use tracing::info;

use super::{format_message, load_initial, print_messages};

#[derive(Args, Debug)]
#[command(about = "Print a conversation and then every live change to it")]
pub struct FollowArgs {
    /// Conversation identifier to follow
    #[arg(long, alias = "conv")]
    pub conversation: String,

    /// Backend to read from (live or platform). Defaults to the configured mode.
    #[arg(long)]
    pub mode: Option<FetchMode>,
}

pub async fn run(config: &SyncConfig, args: FollowArgs) -> Result<()> {
    let adapters = AdapterSet::from_config(config).context("failed to set up backends")?;
    let conversation_id = ConversationId::from(args.conversation);
    let mode = args.mode.unwrap_or(config.fetch_mode);

    let mut controller = SyncController::new(adapters);
    controller.start(conversation_id.clone(), mode);
    load_initial(&mut controller, &conversation_id).await?;
    print_messages(controller.state().items());

    if mode == FetchMode::Platform {
        eprintln!("platform mode has no push channel; nothing to follow");
        controller.stop();
        return Ok(());
    }

    println!("Following conversation {conversation_id}... (press Ctrl+C to stop)");
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let outcome = loop {
        if let SubscriptionStatus::Closed(err) = &controller.state().subscription {
            break Err(err.clone());
        }
        tokio::select! {
            _ = &mut shutdown => {
                info!(conversation_id = %conversation_id, "interrupted");
                break Ok(());
            }
            processed = controller.process_next() => {
                let Some(processed) = processed else {
                    break Ok(());
                };
                if processed.disposition != Disposition::Applied {
                    continue;
                }
                match processed.kind {
                    EventKind::MessagePushed => print_change(&controller, &processed, "+"),
                    EventKind::MessageUpdated => print_change(&controller, &processed, "~"),
                    EventKind::SubscriptionFailed => {
                        if let Some(err) = controller.state().subscription.error() {
                            eprintln!("push channel error: {err}");
                        }
                    }
                    _ => {}
                }
            }
        }
    };
    controller.stop();

    if let Err(err) = outcome {
        bail!("stopped following {conversation_id}: {err}");
    }
    Ok(())
}

fn print_change(controller: &SyncController, processed: &Processed, marker: &str) {
    if let Some(message) = processed
        .message_id
        .as_ref()
        .and_then(|id| controller.state().window.get(id))
    {
        println!("{marker} {}", format_message(message));
    }
}
