//! The sport panel: weight graph, workout poll and viewport.

use chrono::{DateTime, Duration as ChronoDuration, Local};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error, info, warn};

use crate::bitmap::Texture;
use crate::config::PanelConfig;
use crate::refresh::RefreshController;
use crate::scheduler::Scheduler;
use crate::sensor::{WorkoutSource, WorkoutSummary};
use crate::store::{MeasurementStore, StoreError};
use crate::viewport::ScrollViewport;
use crate::weight::ChartRenderer;

/// State published after every change, for readers outside the panel task.
#[derive(Debug, Clone, Default)]
pub struct PanelSnapshot {
    pub texture: Option<Arc<Texture>>,
    pub last_weight: Option<f64>,
    pub last_total_distance: f64,
    pub viewport_x: f64,
    pub rendered_at: Option<DateTime<Local>>,
}

/// Requests handled by [`SportPanel::run`].
#[derive(Debug)]
pub enum PanelCommand {
    SaveWeight {
        value: f64,
        reply: oneshot::Sender<Result<(), StoreError>>,
    },
    PanTo {
        x: f64,
        reply: oneshot::Sender<f64>,
    },
    Resize {
        width: f64,
        height: u32,
        reply: oneshot::Sender<()>,
    },
}

pub struct SportPanel<S, G> {
    store: S,
    sensor: G,
    renderer: ChartRenderer,
    refresh: RefreshController,
    viewport: ScrollViewport,
    height: u32,
    first_poll_delay: Duration,
    poll_interval: Duration,
    last_weight: Option<f64>,
    last_workouts: Option<WorkoutSummary>,
    texture: Option<Arc<Texture>>,
    rendered_at: Option<DateTime<Local>>,
    snapshot: watch::Sender<PanelSnapshot>,
}

impl<S, G> SportPanel<S, G>
where
    S: MeasurementStore,
    G: WorkoutSource,
{
    pub fn new(store: S, sensor: G, renderer: ChartRenderer, config: &PanelConfig) -> Self {
        let viewport = ScrollViewport::new(config.viewport.width, config.viewport.margin);
        let (snapshot, _) = watch::channel(PanelSnapshot {
            viewport_x: viewport.x(),
            ..PanelSnapshot::default()
        });

        Self {
            store,
            sensor,
            renderer,
            refresh: RefreshController::new(),
            viewport,
            height: config.viewport.height,
            first_poll_delay: Duration::from_millis(config.refresh.first_poll_delay_ms),
            poll_interval: Duration::from_millis(config.refresh.poll_interval_ms),
            last_weight: None,
            last_workouts: None,
            texture: None,
            rendered_at: None,
            snapshot,
        }
    }

    /// Most recent weight seen by the last render.
    pub fn last_weight(&self) -> Option<f64> {
        self.last_weight
    }

    pub fn last_total_distance(&self) -> f64 {
        self.refresh.last_total_distance()
    }

    pub fn viewport(&self) -> &ScrollViewport {
        &self.viewport
    }

    pub fn texture(&self) -> Option<Arc<Texture>> {
        self.texture.clone()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn sensor(&self) -> &G {
        &self.sensor
    }

    pub fn subscribe(&self) -> watch::Receiver<PanelSnapshot> {
        self.snapshot.subscribe()
    }

    /// Poll the workout sensor and redraw the graph if needed.
    ///
    /// Returns whether the graph was redrawn.
    pub async fn update_data(&mut self, force: bool) -> bool {
        let data = match self.sensor.read_workouts().await {
            Ok(summary) => Some(summary),
            Err(e) => {
                warn!("Failed to read workout sensor: {}", e);
                None
            }
        };

        let rendered = if self.refresh.observe(data.as_ref(), force) {
            self.set_graph(data.as_ref())
        } else {
            debug!(
                "Total distance unchanged at {}, keeping weight graph",
                self.refresh.last_total_distance()
            );
            false
        };

        self.last_workouts = data;
        self.publish();
        rendered
    }

    /// Redraw the weight graph from the store. On failure the previous
    /// texture stays in place.
    pub fn set_graph(&mut self, workouts: Option<&WorkoutSummary>) -> bool {
        info!("Rerendering weight graph...");

        let now = Local::now();
        let since = now.naive_local()
            - ChronoDuration::days(i64::from(self.renderer.config().show_last_days));

        let measurements = match self.store.get_weights(since) {
            Ok(measurements) => measurements,
            Err(e) => {
                error!("Failed to load weight history: {}", e);
                return false;
            }
        };

        if let Some(last) = measurements.last() {
            self.last_weight = Some(last.value);
        }

        match self
            .renderer
            .render(now.date_naive(), &measurements, workouts, self.height)
        {
            Ok(texture) => {
                self.viewport.set_content_width(f64::from(texture.width()));
                self.texture = Some(Arc::new(texture));
                self.rendered_at = Some(now);
                true
            }
            Err(e) => {
                error!("Failed to render weight graph: {}", e);
                false
            }
        }
    }

    /// Store a new weight and redraw the graph regardless of sensor state.
    pub async fn save_weight_value(&mut self, value: f64) -> Result<(), StoreError> {
        self.store.add_weight(value)?;
        info!("Saved weight {}", value);

        self.update_data(true).await;
        Ok(())
    }

    /// Move the graph container, returning the clamped offset.
    pub fn pan_to(&mut self, x: f64) -> f64 {
        let x = self.viewport.pan_to(x);
        self.publish();
        x
    }

    /// Apply new container geometry. A new height needs a new texture,
    /// drawn from the last poll without asking the sensor again.
    pub fn resize(&mut self, width: f64, height: u32) {
        self.viewport.resize(width);

        if height != self.height {
            self.height = height;
            let workouts = self.last_workouts.take();
            self.set_graph(workouts.as_ref());
            self.last_workouts = workouts;
        }
        self.publish();
    }

    /// Drive the panel: poll on the scheduler's ticks and serve commands
    /// until the command channel closes.
    pub async fn run<T: Scheduler>(
        mut self,
        mut scheduler: T,
        mut commands: mpsc::Receiver<PanelCommand>,
    ) {
        scheduler.schedule_once(self.first_poll_delay);
        scheduler.schedule_repeating(self.poll_interval);

        info!(
            "Sport panel running (first poll after {:?}, then every {:?})",
            self.first_poll_delay, self.poll_interval
        );

        loop {
            tokio::select! {
                biased;

                Some(at) = scheduler.next_tick() => {
                    debug!("Refresh tick at {:?}", at);
                    self.update_data(false).await;
                }
                command = commands.recv() => match command {
                    Some(command) => self.handle(command).await,
                    None => break,
                },
            }
        }

        info!("Sport panel stopped");
    }

    async fn handle(&mut self, command: PanelCommand) {
        match command {
            PanelCommand::SaveWeight { value, reply } => {
                let result = self.save_weight_value(value).await;
                if let Err(e) = &result {
                    error!("Failed to save weight {}: {}", value, e);
                }
                let _ = reply.send(result);
            }
            PanelCommand::PanTo { x, reply } => {
                let _ = reply.send(self.pan_to(x));
            }
            PanelCommand::Resize {
                width,
                height,
                reply,
            } => {
                self.resize(width, height);
                let _ = reply.send(());
            }
        }
    }

    fn publish(&self) {
        self.snapshot.send_replace(PanelSnapshot {
            texture: self.texture.clone(),
            last_weight: self.last_weight,
            last_total_distance: self.refresh.last_total_distance(),
            viewport_x: self.viewport.x(),
            rendered_at: self.rendered_at,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitmap::Rasterizer;
    use crate::scheduler::VirtualScheduler;
    use crate::sensor::SensorError;
    use crate::store::{Measurement, MemoryWeightStore};
    use std::collections::{BTreeMap, VecDeque};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Replays canned sensor results; answers "no data" once exhausted.
    #[derive(Default)]
    struct ScriptedSource {
        responses: Mutex<VecDeque<Result<WorkoutSummary, SensorError>>>,
        calls: AtomicUsize,
    }

    impl ScriptedSource {
        fn new(responses: Vec<Result<WorkoutSummary, SensorError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl WorkoutSource for ScriptedSource {
        async fn read_workouts(&self) -> Result<WorkoutSummary, SensorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(SensorError::Status("offline".to_string())))
        }
    }

    fn summary(total: f64) -> Result<WorkoutSummary, SensorError> {
        Ok(WorkoutSummary {
            total_distance: total,
            distance_by_day: BTreeMap::new(),
        })
    }

    fn panel(
        store: MemoryWeightStore,
        responses: Vec<Result<WorkoutSummary, SensorError>>,
    ) -> SportPanel<MemoryWeightStore, ScriptedSource> {
        let config = PanelConfig::default();
        let renderer = ChartRenderer::new(config.chart.clone(), Rasterizer::without_fonts());
        SportPanel::new(store, ScriptedSource::new(responses), renderer, &config)
    }

    fn hours_ago(hours: i64, value: f64) -> Measurement {
        Measurement::new(
            Local::now().naive_local() - ChronoDuration::hours(hours),
            value,
        )
    }

    #[tokio::test]
    async fn test_first_poll_renders() {
        let mut panel = panel(MemoryWeightStore::new(), vec![summary(10.0)]);

        assert!(panel.update_data(false).await);
        assert_eq!(panel.last_total_distance(), 10.0);

        let texture = panel.texture().unwrap();
        assert_eq!(texture.size(), (450, 240));
    }

    #[tokio::test]
    async fn test_unchanged_distance_keeps_graph() {
        let mut panel = panel(
            MemoryWeightStore::new(),
            vec![summary(10.0), summary(10.0), summary(12.0)],
        );

        assert!(panel.update_data(false).await);
        let first = panel.texture().unwrap();

        assert!(!panel.update_data(false).await);
        assert!(Arc::ptr_eq(&first, &panel.texture().unwrap()));

        assert!(panel.update_data(false).await);
        assert_eq!(panel.last_total_distance(), 12.0);
    }

    #[tokio::test]
    async fn test_sensor_failure_renders_and_resets_distance() {
        let mut panel = panel(
            MemoryWeightStore::new(),
            vec![summary(10.0), Err(SensorError::Status("error".to_string()))],
        );

        panel.update_data(false).await;
        assert!(panel.update_data(false).await);
        assert_eq!(panel.last_total_distance(), 0.0);
        assert!(panel.texture().is_some());
    }

    #[tokio::test]
    async fn test_save_weight_forces_render() {
        let mut panel = panel(MemoryWeightStore::new(), vec![summary(10.0), summary(10.0)]);
        panel.update_data(false).await;
        let before = panel.texture().unwrap();

        panel.save_weight_value(83.4).await.unwrap();

        assert_eq!(panel.store().measurements().len(), 1);
        assert_eq!(panel.store().measurements()[0].value, 83.4);
        assert_eq!(panel.last_weight(), Some(83.4));
        assert!(!Arc::ptr_eq(&before, &panel.texture().unwrap()));
        assert_eq!(panel.sensor.calls(), 2);
    }

    #[tokio::test]
    async fn test_last_weight_tracks_latest_measurement() {
        let store = MemoryWeightStore::with_measurements(vec![
            hours_ago(24 * 40, 90.0),
            hours_ago(48, 85.0),
            hours_ago(2, 84.1),
        ]);
        let mut panel = panel(store, vec![]);
        assert_eq!(panel.last_weight(), None);

        panel.update_data(false).await;
        assert_eq!(panel.last_weight(), Some(84.1));
    }

    #[tokio::test]
    async fn test_render_scrolls_to_newest_days() {
        let mut panel = panel(MemoryWeightStore::new(), vec![summary(1.0)]);
        panel.update_data(false).await;

        // -450 + 300 - 20
        assert_eq!(panel.viewport().x(), -170.0);
        assert_eq!(panel.pan_to(100.0), -20.0);
        assert_eq!(panel.pan_to(-1000.0), -170.0);
    }

    #[tokio::test]
    async fn test_resize_rerenders_on_new_height() {
        let mut panel = panel(MemoryWeightStore::new(), vec![summary(1.0)]);
        panel.update_data(false).await;

        panel.resize(400.0, 320);
        assert_eq!(panel.texture().unwrap().size(), (450, 320));
        assert_eq!(panel.viewport().x(), -70.0);
    }

    #[tokio::test]
    async fn test_resize_keeps_sensor_state() {
        let mut panel = panel(MemoryWeightStore::new(), vec![summary(7.0)]);
        panel.update_data(false).await;
        let before = panel.texture().unwrap();

        panel.resize(300.0, 200);
        assert_eq!(panel.sensor().calls(), 1);
        assert_eq!(panel.last_total_distance(), 7.0);
        assert!(!Arc::ptr_eq(&before, &panel.texture().unwrap()));

        // Same height, geometry only
        let after = panel.texture().unwrap();
        panel.resize(320.0, 200);
        assert!(Arc::ptr_eq(&after, &panel.texture().unwrap()));
        assert_eq!(panel.sensor().calls(), 1);
    }

    #[tokio::test]
    async fn test_snapshot_is_published() {
        let mut panel = panel(
            MemoryWeightStore::with_measurements(vec![hours_ago(1, 84.0)]),
            vec![summary(7.5)],
        );
        let snapshot = panel.subscribe();
        assert!(snapshot.borrow().texture.is_none());

        panel.update_data(false).await;

        let current = snapshot.borrow().clone();
        assert!(current.texture.is_some());
        assert!(current.rendered_at.is_some());
        assert_eq!(current.last_weight, Some(84.0));
        assert_eq!(current.last_total_distance, 7.5);
        assert_eq!(current.viewport_x, -170.0);
    }

    #[tokio::test]
    async fn test_run_polls_on_schedule() {
        let panel = panel(
            MemoryWeightStore::new(),
            vec![summary(5.0), summary(5.0), summary(6.0), summary(6.0)],
        );
        let snapshot = panel.subscribe();
        let (tx, rx) = mpsc::channel(4);
        drop(tx);

        // Ticks at 1s, 3s, 6s and 9s
        panel
            .run(VirtualScheduler::new().until(Duration::from_secs(10)), rx)
            .await;

        let current = snapshot.borrow().clone();
        assert_eq!(current.last_total_distance, 6.0);
        assert!(current.texture.is_some());
    }

    #[tokio::test]
    async fn test_run_serves_commands() {
        let panel = panel(MemoryWeightStore::new(), vec![]);
        let snapshot = panel.subscribe();
        let (tx, rx) = mpsc::channel(4);

        let task = tokio::spawn(panel.run(VirtualScheduler::new().until(Duration::ZERO), rx));

        let (reply, response) = oneshot::channel();
        tx.send(PanelCommand::SaveWeight { value: 82.5, reply })
            .await
            .unwrap();
        response.await.unwrap().unwrap();
        assert_eq!(snapshot.borrow().last_weight, Some(82.5));

        let (reply, response) = oneshot::channel();
        tx.send(PanelCommand::PanTo { x: 25.0, reply }).await.unwrap();
        assert_eq!(response.await.unwrap(), -20.0);

        let (reply, response) = oneshot::channel();
        tx.send(PanelCommand::Resize {
            width: 300.0,
            height: 200,
            reply,
        })
        .await
        .unwrap();
        response.await.unwrap();
        assert_eq!(snapshot.borrow().texture.as_ref().unwrap().height(), 200);

        drop(tx);
        task.await.unwrap();
    }
}
