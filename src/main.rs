use anyhow::{Context, Result};
use clap::Parser;
use sport_panel::{
    init_tracing, server, ChartRenderer, CsvWeightStore, EndomondoSensor, PanelConfig,
    Rasterizer, SportPanel, TokioScheduler,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "Weight and workout panel for the home dashboard")]
struct Args {
    /// Path to configuration file (JSON5 format)
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Workout sensor endpoint
    #[arg(long)]
    sensor_url: Option<String>,
    /// CSV file holding the weight history
    #[arg(long)]
    weights: Option<PathBuf>,
    /// Height of the rendered graph in pixels
    #[arg(long)]
    height: Option<u32>,
    /// Visible width of the graph container
    #[arg(long)]
    viewport_width: Option<f64>,
    /// Record this weight before rendering
    #[arg(long)]
    add_weight: Option<f64>,
    /// Where to write the graph in one-shot mode
    #[arg(long, default_value = "weight-graph.png")]
    output: PathBuf,
    /// HTTP server port
    #[arg(long, default_value = "8080")]
    port: u16,
    /// Enable HTTP server mode
    #[arg(long, default_value = "false")]
    serve: bool,
    /// Override log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

impl Args {
    fn apply(&self, config: &mut PanelConfig) {
        if let Some(url) = &self.sensor_url {
            config.sensor.url = url.clone();
        }
        if let Some(path) = &self.weights {
            config.store.path = path.clone();
        }
        if let Some(height) = self.height {
            config.viewport.height = height;
        }
        if let Some(width) = self.viewport_width {
            config.viewport.width = width;
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => PanelConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config from {:?}", path))?,
        None => PanelConfig::default(),
    };
    args.apply(&mut config);
    config
        .validate()
        .context("Invalid configuration after command-line overrides")?;

    init_tracing(&config.logging.level)?;

    let store = CsvWeightStore::new(&config.store.path);
    let sensor = EndomondoSensor::new(&config.sensor).context("Failed to build sensor client")?;
    let renderer = ChartRenderer::new(config.chart.clone(), Rasterizer::new());

    info!("Weight history: {}", config.store.path.display());
    info!("Workout sensor: {}", sensor.url());

    let mut panel = SportPanel::new(store, sensor, renderer, &config);

    if args.serve {
        let snapshot = panel.subscribe();
        let (commands, receiver) = mpsc::channel(16);
        let panel_task = tokio::spawn(panel.run(TokioScheduler::new(), receiver));

        let app = server::create_router(commands, snapshot);
        let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;

        info!("Serving weight graph on http://{}/sport/weight-graph.png", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = tokio::signal::ctrl_c().await;
            })
            .await
            .context("HTTP server failed")?;

        // The router held the last command sender; the panel loop ends with it
        panel_task.await.context("Sport panel task failed")?;
    } else {
        match args.add_weight {
            Some(value) => panel
                .save_weight_value(value)
                .await
                .with_context(|| format!("Failed to save weight {}", value))?,
            None => {
                panel.update_data(true).await;
            }
        }

        let texture = panel
            .texture()
            .context("Weight graph could not be rendered")?;
        std::fs::write(&args.output, texture.png())
            .with_context(|| format!("Failed to write {}", args.output.display()))?;

        info!(
            "Weight graph written to {} ({}x{})",
            args.output.display(),
            texture.width(),
            texture.height()
        );
        if let Some(weight) = panel.last_weight() {
            info!("Last weight: {:.1}", weight);
        }
    }

    Ok(())
}
