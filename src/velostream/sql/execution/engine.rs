//! Streaming SQL Execution Engine
//!
//! Runs one continuous query over records pushed by any number of producers.
//!
//! ```text
//! emit() ──► WHERE ──► project ─────────────────┐
//!              │                                 ▼
//!              └──► window / aggregate ──► result queue (bounded) ──► dispatcher ──► sinks
//!                        ▲                       ▲
//!          timer (tick) ─┘      trigger() / stop()┘
//! ```
//!
//! `emit` never blocks on sinks: fired batches go through a bounded `mpsc` queue with
//! `try_send`, and a full queue drops the batch, counts it and logs a warning. A
//! dispatcher task invokes the sinks; a panicking sink is caught and logged. A timer
//! task closes time-based windows every `tick_interval_ms`.
//!
//! ## Lifecycle
//!
//! `execute` validates and plans the query atomically, then spawns the background
//! tasks on the current Tokio runtime. `stop` fires or discards open windows
//! (`flush_on_stop`), signals the tasks through a `broadcast` channel and waits for
//! them up to `shutdown_timeout_ms`. After `stop`, `emit` returns
//! [`SqlError::StreamError`].

use crate::velostream::sql::SqlError;
use crate::velostream::sql::ast::StreamingQuery;
use crate::velostream::sql::config::EngineConfig;
use crate::velostream::sql::execution::expression::FunctionRegistry;
use crate::velostream::sql::execution::planner::QueryPlan;
use crate::velostream::sql::execution::processors::{QueryProcessor, RecordOutcome};
use crate::velostream::sql::execution::types::{FieldValue, ResultBatch, StreamRecord};
use crate::velostream::sql::execution::window_v2::{Clock, SystemClock, WindowStats};
use crate::velostream::sql::parser::StreamingSqlParser;
use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

/// Result consumer, invoked once per batch.
pub type ResultSink = Arc<dyn Fn(&ResultBatch) + Send + Sync>;

const STATE_IDLE: u8 = 0;
const STATE_RUNNING: u8 = 1;
const STATE_STOPPED: u8 = 2;

#[derive(Debug, Default)]
struct EngineCounters {
    records_received: AtomicU64,
    records_filtered: AtomicU64,
    records_projected: AtomicU64,
    records_windowed: AtomicU64,
    records_over_limit: AtomicU64,
    records_duplicate: AtomicU64,
    record_errors: AtomicU64,
    batches_queued: AtomicU64,
    batches_dropped: AtomicU64,
    batches_delivered: AtomicU64,
    sink_panics: AtomicU64,
}

/// Snapshot of engine counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub records_received: u64,
    /// WHERE false or failed
    pub records_filtered: u64,
    /// Emitted directly by a non-windowed query
    pub records_projected: u64,
    /// Folded into windows
    pub records_windowed: u64,
    /// Arrived after a non-windowed query reached LIMIT
    pub records_over_limit: u64,
    /// Repeated a row a non-windowed DISTINCT query already emitted
    pub records_duplicate: u64,
    /// Failed inside the pipeline
    pub record_errors: u64,
    pub batches_queued: u64,
    /// Dropped because the result queue was full
    pub batches_dropped: u64,
    pub batches_delivered: u64,
    pub sink_panics: u64,
    /// Window statistics of a windowed query
    pub window: Option<WindowStats>,
}

/// Sending side of the result queue.
#[derive(Clone)]
struct ResultQueue {
    tx: mpsc::Sender<ResultBatch>,
    counters: Arc<EngineCounters>,
}

impl ResultQueue {
    fn push(&self, batch: ResultBatch) {
        match self.tx.try_send(batch) {
            Ok(()) => {
                self.counters.batches_queued.fetch_add(1, Ordering::Relaxed);
            }
            Err(TrySendError::Full(batch)) => {
                let dropped = self.counters.batches_dropped.fetch_add(1, Ordering::Relaxed) + 1;
                warn!(
                    "Result queue full, dropped batch of {} row(s) for window {:?} ({} dropped so far)",
                    batch.len(),
                    batch.window,
                    dropped
                );
            }
            Err(TrySendError::Closed(_)) => {
                self.counters.batches_dropped.fetch_add(1, Ordering::Relaxed);
                warn!("Result queue closed, dropped batch");
            }
        }
    }

    fn push_all(&self, batches: Vec<ResultBatch>) -> usize {
        let count = batches.len();
        for batch in batches {
            self.push(batch);
        }
        count
    }
}

/// A running query and its background tasks.
struct Pipeline {
    processor: Arc<QueryProcessor>,
    queue: ResultQueue,
    config: EngineConfig,
    shutdown_tx: broadcast::Sender<()>,
    dispatcher: JoinHandle<()>,
    timer: Option<JoinHandle<()>>,
}

pub struct StreamExecutionEngine {
    config: EngineConfig,
    registry: Arc<FunctionRegistry>,
    clock: Arc<dyn Clock>,
    sinks: Arc<RwLock<Vec<ResultSink>>>,
    pipeline: RwLock<Option<Pipeline>>,
    /// Window statistics captured at stop
    final_window_stats: RwLock<Option<WindowStats>>,
    counters: Arc<EngineCounters>,
    state: AtomicU8,
}

impl StreamExecutionEngine {
    /// Engine with the global function registry and the system clock.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            registry: FunctionRegistry::global(),
            clock: Arc::new(SystemClock),
            sinks: Arc::new(RwLock::new(Vec::new())),
            pipeline: RwLock::new(None),
            final_window_stats: RwLock::new(None),
            counters: Arc::new(EngineCounters::default()),
            state: AtomicU8::new(STATE_IDLE),
        }
    }

    pub fn with_registry(mut self, registry: Arc<FunctionRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<FunctionRegistry> {
        &self.registry
    }

    /// Parse, validate and start a query. Must be called inside a Tokio runtime.
    pub fn execute(&self, sql: &str) -> Result<(), SqlError> {
        let query = StreamingSqlParser::new().parse(sql)?;
        self.execute_query(query)
    }

    /// Validate and start an already parsed query.
    ///
    /// Fails without changing engine state when the query is invalid, the engine is
    /// already running a query, or there is no Tokio runtime.
    pub fn execute_query(&self, query: StreamingQuery) -> Result<(), SqlError> {
        match self.state.load(Ordering::SeqCst) {
            STATE_RUNNING => {
                return Err(SqlError::configuration_error(
                    "Engine is already running a query",
                ));
            }
            STATE_STOPPED => return Err(SqlError::stream_error("Engine has been stopped")),
            _ => {}
        }

        let config = self.config.resolve_overrides(&query.properties)?;
        let source = query.from.clone();
        let plan = Arc::new(QueryPlan::build(query, Arc::clone(&self.registry))?);
        let processor = Arc::new(QueryProcessor::new(plan, &config, Arc::clone(&self.clock))?);
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            SqlError::configuration_error("execute must be called within a Tokio runtime")
        })?;

        let mut slot = self.write_pipeline();
        if self
            .state
            .compare_exchange(STATE_IDLE, STATE_RUNNING, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(SqlError::configuration_error(
                "Engine is already running a query",
            ));
        }

        let (tx, rx) = mpsc::channel(config.result_queue_capacity);
        let (shutdown_tx, _) = broadcast::channel(4);
        let queue = ResultQueue {
            tx,
            counters: Arc::clone(&self.counters),
        };

        let dispatcher = runtime.spawn(dispatch_loop(
            rx,
            Arc::clone(&self.sinks),
            Arc::clone(&self.counters),
            shutdown_tx.subscribe(),
        ));
        let time_based = processor
            .plan()
            .window
            .as_ref()
            .is_some_and(|spec| spec.is_time_based());
        let timer = time_based.then(|| {
            runtime.spawn(timer_loop(
                Arc::clone(&processor),
                queue.clone(),
                config.tick_interval(),
                shutdown_tx.subscribe(),
            ))
        });

        info!(
            "Started query over '{}' ({})",
            source,
            if processor.is_windowed() {
                "windowed"
            } else {
                "record-at-a-time"
            }
        );
        *slot = Some(Pipeline {
            processor,
            queue,
            config,
            shutdown_tx,
            dispatcher,
            timer,
        });
        Ok(())
    }

    /// Register a result consumer. Sinks added later see only later batches.
    pub fn add_sink<F>(&self, sink: F)
    where
        F: Fn(&ResultBatch) + Send + Sync + 'static,
    {
        let mut sinks = self.sinks.write().unwrap_or_else(|poisoned| {
            warn!("Sink list lock poisoned, recovering");
            poisoned.into_inner()
        });
        sinks.push(Arc::new(sink));
    }

    /// Ingest one record.
    ///
    /// Returns an error only when the engine is not running; per-record evaluation
    /// failures are logged and counted in [`EngineStats`]. `stop` waits for emits
    /// already in progress before it flushes the windows.
    pub fn emit(&self, record: StreamRecord) -> Result<(), SqlError> {
        let guard = self.read_pipeline();
        let pipeline = self.running(&guard)?;
        self.counters.records_received.fetch_add(1, Ordering::Relaxed);

        match pipeline.processor.process(&record) {
            Ok(result) => {
                let counter = match result.outcome {
                    RecordOutcome::Filtered => &self.counters.records_filtered,
                    RecordOutcome::Projected => &self.counters.records_projected,
                    RecordOutcome::Windowed => &self.counters.records_windowed,
                    RecordOutcome::Duplicate => &self.counters.records_duplicate,
                    RecordOutcome::LimitReached => &self.counters.records_over_limit,
                };
                counter.fetch_add(1, Ordering::Relaxed);
                pipeline.queue.push_all(result.batches);
            }
            Err(e) => {
                self.counters.record_errors.fetch_add(1, Ordering::Relaxed);
                warn!("Record processing failed: {}", e);
            }
        }
        Ok(())
    }

    pub fn emit_fields(&self, fields: HashMap<String, FieldValue>) -> Result<(), SqlError> {
        self.emit(StreamRecord::new(fields))
    }

    /// Ingest a JSON object. Malformed JSON is returned as an error.
    pub fn emit_json(&self, json: &str) -> Result<(), SqlError> {
        let record = StreamRecord::from_json(json)?;
        self.emit(record)
    }

    /// Fire every open window now. Returns the number of batches fired.
    pub fn trigger(&self) -> Result<usize, SqlError> {
        let guard = self.read_pipeline();
        let pipeline = self.running(&guard)?;
        let fired = pipeline.queue.push_all(pipeline.processor.trigger());
        debug!("Manual trigger fired {} window(s)", fired);
        Ok(fired)
    }

    /// Close time-based windows that are due. The timer task calls this periodically.
    pub fn poll_windows(&self) -> Result<usize, SqlError> {
        let guard = self.read_pipeline();
        let pipeline = self.running(&guard)?;
        Ok(pipeline.queue.push_all(pipeline.processor.poll()))
    }

    pub fn is_running(&self) -> bool {
        self.state.load(Ordering::SeqCst) == STATE_RUNNING
    }

    pub fn stats(&self) -> EngineStats {
        let c = &self.counters;
        let window = match self.read_pipeline().as_ref() {
            Some(pipeline) => pipeline.processor.window_stats(),
            None => self
                .final_window_stats
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .clone(),
        };
        EngineStats {
            records_received: c.records_received.load(Ordering::Relaxed),
            records_filtered: c.records_filtered.load(Ordering::Relaxed),
            records_projected: c.records_projected.load(Ordering::Relaxed),
            records_windowed: c.records_windowed.load(Ordering::Relaxed),
            records_over_limit: c.records_over_limit.load(Ordering::Relaxed),
            records_duplicate: c.records_duplicate.load(Ordering::Relaxed),
            record_errors: c.record_errors.load(Ordering::Relaxed),
            batches_queued: c.batches_queued.load(Ordering::Relaxed),
            batches_dropped: c.batches_dropped.load(Ordering::Relaxed),
            batches_delivered: c.batches_delivered.load(Ordering::Relaxed),
            sink_panics: c.sink_panics.load(Ordering::Relaxed),
            window,
        }
    }

    /// Stop the query: flush or discard open windows, deliver queued batches and
    /// wait for the background tasks. Stopping an idle or stopped engine is a no-op.
    pub async fn stop(&self) -> Result<(), SqlError> {
        if self
            .state
            .compare_exchange(STATE_RUNNING, STATE_STOPPED, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            self.state
                .compare_exchange(STATE_IDLE, STATE_STOPPED, Ordering::SeqCst, Ordering::SeqCst)
                .ok();
            return Ok(());
        }

        let Some(pipeline) = self.write_pipeline().take() else {
            return Ok(());
        };
        let timeout = pipeline.config.shutdown_timeout();
        info!("Stopping query (timeout: {:?})", timeout);

        if pipeline.config.flush_on_stop {
            let batches = pipeline.processor.trigger();
            debug!("Flushing {} open window(s) on stop", batches.len());
            for batch in batches {
                match tokio::time::timeout(timeout, pipeline.queue.tx.send(batch)).await {
                    Ok(Ok(())) => {
                        self.counters.batches_queued.fetch_add(1, Ordering::Relaxed);
                    }
                    _ => {
                        self.counters.batches_dropped.fetch_add(1, Ordering::Relaxed);
                        warn!("Could not enqueue flushed batch during stop");
                    }
                }
            }
        } else {
            let dropped = pipeline.processor.discard();
            if dropped > 0 {
                info!("Discarded {} open window(s) on stop", dropped);
            }
        }

        *self
            .final_window_stats
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = pipeline.processor.window_stats();

        if let Err(e) = pipeline.shutdown_tx.send(()) {
            warn!("Failed to send shutdown signal: {:?}", e);
        }

        let Pipeline {
            mut dispatcher,
            timer,
            ..
        } = pipeline;

        if let Some(mut timer) = timer {
            if tokio::time::timeout(timeout, &mut timer).await.is_err() {
                warn!("Timer task timed out (forcing abort)");
                timer.abort();
            }
        }
        match tokio::time::timeout(timeout, &mut dispatcher).await {
            Ok(Ok(())) => info!("Query stopped"),
            Ok(Err(e)) => error!("Dispatcher task failed: {:?}", e),
            Err(_) => {
                warn!("Dispatcher task timed out (forcing abort)");
                dispatcher.abort();
            }
        }
        Ok(())
    }

    /// The running pipeline behind a held read guard. `stop` takes the pipeline
    /// under the write lock, so it cannot flush while a guard is alive.
    fn running<'a>(&self, guard: &'a Option<Pipeline>) -> Result<&'a Pipeline, SqlError> {
        match self.state.load(Ordering::SeqCst) {
            STATE_IDLE => {
                return Err(SqlError::stream_error(
                    "No query is running; call execute first",
                ));
            }
            STATE_STOPPED => return Err(SqlError::stream_error("Engine has been stopped")),
            _ => {}
        }
        guard
            .as_ref()
            .ok_or_else(|| SqlError::stream_error("Engine has been stopped"))
    }

    fn read_pipeline(&self) -> RwLockReadGuard<'_, Option<Pipeline>> {
        self.pipeline.read().unwrap_or_else(|poisoned| {
            warn!("Pipeline lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn write_pipeline(&self) -> RwLockWriteGuard<'_, Option<Pipeline>> {
        self.pipeline.write().unwrap_or_else(|poisoned| {
            warn!("Pipeline lock poisoned, recovering");
            poisoned.into_inner()
        })
    }
}

/// Deliver queued batches to the sinks until shutdown, then drain what is left.
async fn dispatch_loop(
    mut rx: mpsc::Receiver<ResultBatch>,
    sinks: Arc<RwLock<Vec<ResultSink>>>,
    counters: Arc<EngineCounters>,
    mut shutdown: broadcast::Receiver<()>,
) {
    debug!("Result dispatcher started");
    loop {
        tokio::select! {
            biased;
            batch = rx.recv() => match batch {
                Some(batch) => deliver(&batch, &sinks, &counters),
                None => break,
            },
            _ = shutdown.recv() => {
                while let Ok(batch) = rx.try_recv() {
                    deliver(&batch, &sinks, &counters);
                }
                break;
            }
        }
    }
    debug!("Result dispatcher terminated");
}

fn deliver(batch: &ResultBatch, sinks: &RwLock<Vec<ResultSink>>, counters: &EngineCounters) {
    let sinks: Vec<ResultSink> = sinks
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .clone();
    for sink in sinks {
        if catch_unwind(AssertUnwindSafe(|| sink(batch))).is_err() {
            counters.sink_panics.fetch_add(1, Ordering::Relaxed);
            error!("Sink panicked while handling a batch of {} row(s)", batch.len());
        }
    }
    counters.batches_delivered.fetch_add(1, Ordering::Relaxed);
}

/// Periodically close due time-based windows.
async fn timer_loop(
    processor: Arc<QueryProcessor>,
    queue: ResultQueue,
    period: std::time::Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                let fired = queue.push_all(processor.poll());
                if fired > 0 {
                    debug!("Timer fired {} window(s)", fired);
                }
            }
            _ = shutdown.recv() => break,
        }
    }
    debug!("Window timer terminated");
}
