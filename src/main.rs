use anyhow::Result;
use std::{sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use cider_link::{
    api::{CiderClient, PlaybackEvent, PlaybackSource},
    cache::ArtworkLoader,
    sharing::ChannelTransport,
    Config, Engine,
};

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Loader for headless runs: there is no texture manager, only logs.
struct LoggingLoader;

impl ArtworkLoader for LoggingLoader {
    fn load(&self, url: &str, key: &str) {
        debug!("🖼️ Cargando artwork {} desde {}", key, url);
    }

    fn release(&self, key: &str) {
        debug!("🗑️ Liberando artwork {}", key);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Inicializar logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("cider_link=debug".parse()?)
                .add_directive("reqwest=info".parse()?),
        )
        .init();

    info!("🎵 Iniciando Cider Link v{}", env!("CARGO_PKG_VERSION"));

    // Cargar configuración
    let config = Config::load()?;
    info!("{}", config.summary());

    let client = CiderClient::new()?;

    if std::env::args().any(|arg| arg == "--health-check") {
        return health_check(&client, &config).await;
    }

    // Sin red de juego: los paquetes salientes sólo se registran
    let (transport, outbound) = ChannelTransport::pair();
    tokio::spawn(async move {
        while let Ok((channel, payload)) = outbound.recv_async().await {
            debug!("📤 {} bytes en {}", payload.len(), channel);
        }
    });

    let engine = Arc::new(Engine::new(
        config,
        Arc::new(client.clone()),
        client,
        Arc::new(LoggingLoader),
        Arc::new(transport),
    ));

    engine.subscribe(Arc::new(|event: &PlaybackEvent| -> anyhow::Result<()> {
        match event {
            PlaybackEvent::TrackChanged { new, .. } => info!("🎶 Reproduciendo: {}", new),
            PlaybackEvent::PlaybackChanged { playing: true } => info!("▶️ Reproducción reanudada"),
            PlaybackEvent::PlaybackChanged { playing: false } => info!("⏸️ Reproducción pausada"),
            PlaybackEvent::Disconnected => warn!("🔌 Desconectado de Cider"),
            PlaybackEvent::PositionChanged { .. } => {}
        }
        Ok(())
    }));

    engine.on_session_joined().await;

    // Mantenimiento periódico de cachés
    let cancel = CancellationToken::new();
    let sweeper = {
        let engine = engine.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => engine.sweep(),
                }
            }
        })
    };

    info!("🚀 Cider Link iniciado exitosamente");
    tokio::signal::ctrl_c().await?;
    info!("⚠️ Señal de shutdown recibida, cerrando...");

    cancel.cancel();
    sweeper.await?;
    engine.on_session_left();
    engine.shutdown().await;

    Ok(())
}

async fn health_check(client: &CiderClient, config: &Config) -> Result<()> {
    client.is_active(&config.connection_settings()).await?;
    println!("OK");
    Ok(())
}
