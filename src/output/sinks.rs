//! Product sinks: memory, channel, JSON lines, SQLite and fan-out

use crate::model::ProductDocument;
use crate::output::traits::{FailureRecord, ProductSink, SinkError, SinkResult};
use crate::storage::{ProductStore, RunStatus, SqliteStore};
use async_trait::async_trait;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

fn lock<T>(mutex: &Mutex<T>) -> SinkResult<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| SinkError::Rejected("sink lock poisoned".to_string()))
}

/// Runs file or database work on the blocking pool, holding `state`'s lock
async fn blocking<T, R, F>(state: &Arc<Mutex<T>>, work: F) -> SinkResult<R>
where
    T: Send + 'static,
    R: Send + 'static,
    F: FnOnce(&mut T) -> SinkResult<R> + Send + 'static,
{
    let state = Arc::clone(state);
    tokio::task::spawn_blocking(move || {
        let mut guard = lock(&state)?;
        work(&mut guard)
    })
    .await?
}

/// Collects everything in memory
#[derive(Default)]
pub struct MemorySink {
    products: Mutex<Vec<ProductDocument>>,
    failures: Mutex<Vec<FailureRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn products(&self) -> Vec<ProductDocument> {
        match self.products.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn failures(&self) -> Vec<FailureRecord> {
        match self.failures.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl ProductSink for MemorySink {
    async fn put_product(&self, doc: &ProductDocument) -> SinkResult<()> {
        lock(&self.products)?.push(doc.clone());
        Ok(())
    }

    async fn record_failure(&self, failure: &FailureRecord) -> SinkResult<()> {
        lock(&self.failures)?.push(failure.clone());
        Ok(())
    }
}

/// Forwards products to a bounded channel
///
/// Backpressure from a slow consumer suspends the emitting step; a dropped
/// receiver is a sink failure.
pub struct ChannelSink {
    tx: mpsc::Sender<ProductDocument>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<ProductDocument>) -> Self {
        Self { tx }
    }

    /// Creates a sink and the receiving end of its channel
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ProductDocument>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

#[async_trait]
impl ProductSink for ChannelSink {
    async fn put_product(&self, doc: &ProductDocument) -> SinkResult<()> {
        self.tx
            .send(doc.clone())
            .await
            .map_err(|_| SinkError::Closed)
    }
}

/// Appends one JSON document per line
pub struct JsonLinesSink {
    writer: Arc<Mutex<BufWriter<File>>>,
}

impl JsonLinesSink {
    pub fn open(path: &Path) -> SinkResult<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            writer: Arc::new(Mutex::new(BufWriter::new(file))),
        })
    }
}

#[async_trait]
impl ProductSink for JsonLinesSink {
    async fn put_product(&self, doc: &ProductDocument) -> SinkResult<()> {
        let mut line = serde_json::to_string(doc)?;
        line.push('\n');
        blocking(&self.writer, move |writer| {
            writer.write_all(line.as_bytes())?;
            writer.flush()?;
            Ok(())
        })
        .await
    }

    async fn finish(&self) -> SinkResult<()> {
        blocking(&self.writer, |writer| Ok(writer.flush()?)).await
    }
}

/// Upserts products by identity and logs failures into SQLite
///
/// Statements run on tokio's blocking pool.
pub struct SqliteSink {
    store: Arc<Mutex<SqliteStore>>,
    run_id: i64,
    cancel: Option<CancellationToken>,
}

impl SqliteSink {
    /// Opens the database and starts a run
    pub fn open(path: &Path, config_hash: &str) -> SinkResult<Self> {
        Self::with_store(SqliteStore::new(path)?, config_hash)
    }

    pub fn with_store(mut store: SqliteStore, config_hash: &str) -> SinkResult<Self> {
        let run_id = store.create_run(config_hash)?;
        tracing::info!("Recording run {} in the product database", run_id);
        Ok(Self {
            store: Arc::new(Mutex::new(store)),
            run_id,
            cancel: None,
        })
    }

    /// Marks the run interrupted instead of completed if `token` fired
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn run_id(&self) -> i64 {
        self.run_id
    }

    pub fn product_count(&self) -> SinkResult<u64> {
        Ok(lock(&self.store)?.count_products()?)
    }
}

#[async_trait]
impl ProductSink for SqliteSink {
    async fn put_product(&self, doc: &ProductDocument) -> SinkResult<()> {
        let run_id = self.run_id;
        let doc = doc.clone();
        blocking(&self.store, move |store| {
            store.upsert_product(Some(run_id), &doc)?;
            Ok(())
        })
        .await
    }

    async fn record_failure(&self, failure: &FailureRecord) -> SinkResult<()> {
        let run_id = self.run_id;
        let failure = failure.clone();
        blocking(&self.store, move |store| {
            Ok(store.record_failure(Some(run_id), &failure)?)
        })
        .await
    }

    async fn finish(&self) -> SinkResult<()> {
        let status = match &self.cancel {
            Some(token) if token.is_cancelled() => RunStatus::Interrupted,
            _ => RunStatus::Completed,
        };
        let run_id = self.run_id;
        blocking(&self.store, move |store| Ok(store.finish_run(run_id, status)?)).await
    }
}

/// Logs products instead of storing them
#[derive(Default)]
pub struct LogSink;

#[async_trait]
impl ProductSink for LogSink {
    async fn put_product(&self, doc: &ProductDocument) -> SinkResult<()> {
        tracing::info!(
            "Product {} '{}' with {} SKUs (ordinal {:?})",
            doc.product.identity,
            doc.product.title,
            doc.product.sku_items.len(),
            doc.ordinal
        );
        Ok(())
    }

    async fn record_failure(&self, failure: &FailureRecord) -> SinkResult<()> {
        tracing::warn!("{} failure at {}: {}", failure.kind, failure.url, failure.message);
        Ok(())
    }
}

/// Delivers to every inner sink in order; the first rejection wins
pub struct FanoutSink {
    sinks: Vec<Arc<dyn ProductSink>>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<Arc<dyn ProductSink>>) -> Self {
        Self { sinks }
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

#[async_trait]
impl ProductSink for FanoutSink {
    async fn put_product(&self, doc: &ProductDocument) -> SinkResult<()> {
        for sink in &self.sinks {
            sink.put_product(doc).await?;
        }
        Ok(())
    }

    async fn record_failure(&self, failure: &FailureRecord) -> SinkResult<()> {
        for sink in &self.sinks {
            sink.record_failure(failure).await?;
        }
        Ok(())
    }

    async fn finish(&self) -> SinkResult<()> {
        for sink in &self.sinks {
            sink.finish().await?;
        }
        Ok(())
    }
}
