use std::sync::Arc;

use intentflow::config::EngineConfig;
use intentflow::kernel::dialog::ActionDialog;
use intentflow::kernel::event::{InboundMessage, OutboundMessage};
use intentflow::kernel::runtime::DialogRuntime;
use intentflow::nlu::service::NluService;
use intentflow::services::nlu::HttpNluService;
use intentflow::demo;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // 2. Config: optional path as the first argument
    let config = match std::env::args().nth(1) {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::default(),
    };

    // 3. NLU services: configured endpoints, or the offline keyword model
    let services: Vec<Arc<dyn NluService>> = if config.services.is_empty() {
        tracing::info!("No NLU services configured, using the offline keyword model");
        vec![Arc::new(demo::travel_nlu("keywords")?)]
    } else {
        config
            .services
            .iter()
            .map(|s| Arc::new(HttpNluService::new(s)) as Arc<dyn NluService>)
            .collect()
    };

    let mut builder = ActionDialog::builder(
        Arc::new(demo::travel_registry()?),
        Arc::new(demo::travel_handlers()?),
    )
    .config(&config);
    for service in services {
        builder = builder.service(service);
    }
    let dialog = Arc::new(builder.build()?);

    // 4. Runtime + channels
    let (tx_input, rx_input) = mpsc::channel::<InboundMessage>(100);
    let (tx_output, mut rx_output) = mpsc::unbounded_channel::<OutboundMessage>();
    let shutdown = CancellationToken::new();
    let mut runtime = DialogRuntime::new(dialog, rx_input, tx_output, shutdown.clone());

    let printer = tokio::spawn(async move {
        while let Some(message) = rx_output.recv().await {
            println!("bot> {}", message.text);
        }
    });

    let conversation_id = Uuid::new_v4().to_string();
    tracing::info!("Conversation {} started. Type a request, Ctrl+C to stop.", conversation_id);

    // 5. Stdin reader
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if line.trim().is_empty() {
                continue;
            }
            if tx_input.send(InboundMessage::text(&conversation_id, &line)).await.is_err() {
                break;
            }
        }
        // EOF: the sender drops here and the runtime exits once the queue drains.
    });

    let ctrl_c = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    runtime.run().await;

    // Dropping the runtime closes the outbound channel; let the printer drain it.
    drop(runtime);
    printer.await?;
    Ok(())
}
