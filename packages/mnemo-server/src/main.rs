//! Process entry point: load configuration, wire the tiered-memory stack
//! together, and serve the WebSocket control channel until shutdown.

use std::sync::Arc;

use clap::Parser;
use mnemo_server::backend::{InMemoryIndexBackend, OpenAiLlmClient};
use mnemo_server::bundle::Bundle;
use mnemo_server::cli::Cli;
use mnemo_server::compressor::Compressor;
use mnemo_server::config::{EnvFile, Settings};
use mnemo_server::dispatcher::Dispatcher;
use mnemo_server::dump;
use mnemo_server::network::{ConnectionConfig, NetworkConfig, NetworkModule};
use mnemo_server::processor::Processor;
use mnemo_server::scheduler::DecayScheduler;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let settings = Settings::load_or_init(&cli.config)?;
    let env = EnvFile::load(&cli.env_file)?;

    let backend = Arc::new(InMemoryIndexBackend::new());
    let user_log_root = std::path::PathBuf::from("users");

    if cli.dump {
        let user_log = mnemo_server::store::FileUserLogStore::new(
            user_log_root,
            settings.user_db.max_size_per_user,
        );
        dump::write_to(backend.as_ref(), &user_log, std::path::Path::new("dump.json")).await?;
        info!("wrote dump.json");
        return Ok(());
    }

    let api_key = env.get_or_env("OPENAI_API_KEY").unwrap_or_default();
    let llm: Arc<dyn mnemo_server::backend::LLMClient> = Arc::new(OpenAiLlmClient::new(
        settings.openllm.base_url.clone(),
        settings.openllm.model.clone(),
        settings.openllm.temp,
        settings.openllm.max_completion_tokens,
        api_key,
    ));

    let clock = Arc::new(mnemo_core::SystemClock);

    let (compressor, _compressor_handle) = Compressor::spawn(
        llm.clone(),
        backend.clone(),
        clock.clone(),
        settings.compression.clone(),
        settings.long_vdb.max_memory_lifetime,
    );

    let bundle = Arc::new(Bundle::new(
        backend,
        settings.clone(),
        Arc::new(compressor),
        clock.clone(),
        std::path::PathBuf::from("users"),
        std::path::PathBuf::from("decay_meta/decay.json"),
    ));

    let (scheduler, _scheduler_handle) = DecayScheduler::spawn(bundle.decaying());

    let processor = Arc::new(Processor::new(llm, std::path::PathBuf::from("prompt_template.txt")));
    let dispatcher = Arc::new(Dispatcher::new(bundle, processor, clock));

    let network_config = NetworkConfig {
        host: settings.wss.host.clone(),
        port: settings.wss.port,
        connection: ConnectionConfig::default(),
        ..NetworkConfig::default()
    };

    let mut network = NetworkModule::new(network_config, dispatcher);
    let port = network.start().await?;
    info!(port, "listening");

    let shutdown_ctrl = network.shutdown_controller();

    // A client `close` message drives the same `ShutdownController` a
    // Ctrl-C does, so this one task cancels the decay scheduler regardless
    // of which one fired.
    let mut shutdown_rx = shutdown_ctrl.shutdown_receiver();
    tokio::spawn(async move {
        if shutdown_rx.changed().await.is_ok() {
            scheduler.cancel();
        }
    });

    network
        .serve(async move {
            let mut shutdown_rx = shutdown_ctrl.shutdown_receiver();
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = shutdown_rx.changed() => {}
            }
        })
        .await?;

    Ok(())
}

fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
