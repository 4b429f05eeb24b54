use anyhow::{Context, Result};
use clap::Args;
use engine::{AdapterSet, SyncController};
use shared::{
    config::SyncConfig,
    models::{ConversationId, FetchMode},
};
use tracing::warn;

use super::{load_initial, print_messages};

#[derive(Args, Debug)]
#[command(about = "Print the history of a conversation, oldest first")]
pub struct HistoryArgs {
    /// Conversation identifier to load
    #[arg(long, alias = "conv")]
    pub conversation: String,

    /// Backend to read from (live or platform). Defaults to the configured mode.
    #[arg(long)]
    pub mode: Option<FetchMode>,

    /// How many older pages to load after the newest one
    #[arg(long, default_value_t = 0)]
    pub pages: u32,

    /// Print the messages as a JSON array instead of text
    #[arg(long)]
    pub json: bool,
}

pub async fn run(config: &SyncConfig, args: HistoryArgs) -> Result<()> {
    let adapters = AdapterSet::from_config(config).context("failed to set up backends")?;
    let conversation_id = ConversationId::from(args.conversation);
    let mode = args.mode.unwrap_or(config.fetch_mode);

    let mut controller = SyncController::new(adapters);
    controller.start_history(conversation_id.clone(), mode);
    load_initial(&mut controller, &conversation_id).await?;

    for _ in 0..args.pages {
        if !controller.load_previous() {
            break;
        }
        controller.settle().await;
        if let Some(err) = controller.state().requests.previous.error() {
            warn!(conversation_id = %conversation_id, error = %err, "stopped paging back");
            eprintln!("warning: could not load older messages: {err}");
            break;
        }
    }
    controller.stop();

    let messages = controller.state().items();
    if args.json {
        let rendered =
            serde_json::to_string_pretty(messages).context("failed to render messages")?;
        println!("{rendered}");
    } else {
        print_messages(messages);
        if controller.state().cursor().is_none() {
            println!("-- start of conversation --");
        }
    }

    Ok(())
}
