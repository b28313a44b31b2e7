//! Drives record generation across the topology.
//!
//! Two modes share one plan:
//! - [`Orchestrator::records`] yields every record lazily, device after
//!   device, in topology order. For a given seed the output is reproducible.
//! - [`Orchestrator::run`] generates devices in parallel on blocking workers
//!   and streams batches into a bounded channel. Identity interleaving across
//!   devices depends on scheduling in this mode.

use crate::builder::MediaRecordBuilder;
use crate::config::GeneratorConfig;
use crate::error::{GeneratorError, Result};
use crate::identity::IdentityRegistry;
use crate::random::{derive_seed, rng_from_seed, SimRng};
use crate::record::MediaRecord;
use crate::topology::{DeviceAddress, Topology};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Capture windows longer than this get an informational note.
const LONG_WINDOW_DAYS: i64 = 90;

/// Stream index reserved for count resolution; device streams use their ordinal.
const PLAN_STREAM: u64 = u64::MAX;

/// Records assigned to one device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DevicePlan {
    pub address: DeviceAddress,
    /// Position in topology order
    pub ordinal: u64,
    pub count: u32,
    /// First sequence index; the device owns `first_sequence..first_sequence + count`
    pub first_sequence: u64,
    /// Seed of the device's random stream
    pub seed: u64,
}

impl DevicePlan {
    pub fn sequences(&self) -> std::ops::Range<u64> {
        self.first_sequence..self.first_sequence + u64::from(self.count)
    }
}

/// Summary of a parallel generation run.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationReport {
    pub seed: u64,
    pub devices: usize,
    pub planned: u64,
    pub generated: u64,
    pub batches: u64,
    pub identities: usize,
    pub cancelled: bool,
    pub elapsed: Duration,
}

pub struct Orchestrator {
    topology: Arc<Topology>,
    builder: Arc<MediaRecordBuilder>,
    plan: Vec<DevicePlan>,
    seed: u64,
    batch_size: usize,
    workers: usize,
}

impl Orchestrator {
    /// Resolve the per-device counts and set up a fresh identity registry.
    ///
    /// `now` fixes the end of the capture window for the whole run.
    pub fn new(config: &GeneratorConfig, topology: Arc<Topology>, now: DateTime<Utc>) -> Result<Self> {
        config.validate()?;

        let seed = config.generation.seed.unwrap_or_else(rand::random);
        let days_back = config.date_range.days_back;
        if days_back > LONG_WINDOW_DAYS {
            info!(
                days_back = days_back,
                "Capture window exceeds {} days; using the configured value", LONG_WINDOW_DAYS
            );
        }

        let registry = Arc::new(IdentityRegistry::new());
        let builder = Arc::new(MediaRecordBuilder::new(config, registry, now)?);
        let plan = plan_devices(config, &topology, seed);

        info!(
            seed = seed,
            devices = plan.len(),
            records = plan.iter().map(|p| u64::from(p.count)).sum::<u64>(),
            days_back = days_back,
            "Generation planned"
        );

        Ok(Self {
            topology,
            builder,
            plan,
            seed,
            batch_size: config.generation.batch_size,
            workers: config.generation.workers,
        })
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn plan(&self) -> &[DevicePlan] {
        &self.plan
    }

    pub fn total_records(&self) -> u64 {
        self.plan.iter().map(|p| u64::from(p.count)).sum()
    }

    pub fn registry(&self) -> &Arc<IdentityRegistry> {
        self.builder.registry()
    }

    pub fn builder(&self) -> &MediaRecordBuilder {
        &self.builder
    }

    /// Every planned record, lazily, in topology order.
    pub fn records(&self) -> RecordStream<'_> {
        RecordStream {
            orchestrator: self,
            device: 0,
            offset: 0,
            rng: None,
        }
    }

    /// Generate all devices in parallel and send batches of `batch_size`
    /// records on `tx`, waiting for capacity rather than dropping.
    ///
    /// On cancellation, workers stop after their current record, the partial
    /// batch is flushed and the report is returned with `cancelled` set.
    #[instrument(skip_all, fields(seed = self.seed))]
    pub async fn run(&self, tx: mpsc::Sender<Vec<MediaRecord>>, cancel: CancellationToken) -> Result<GenerationReport> {
        let started = Instant::now();
        let stop = cancel.child_token();

        let (record_tx, record_rx) = mpsc::channel::<MediaRecord>(self.batch_size);
        let batcher = tokio::spawn(batch_records(record_rx, tx, self.batch_size));

        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut workers = JoinSet::new();
        for plan in self.plan.iter().copied() {
            let permit = tokio::select! {
                biased;
                _ = stop.cancelled() => break,
                permit = Arc::clone(&semaphore).acquire_owned() => permit
                    .map_err(|_| GeneratorError::invariant("worker semaphore closed"))?,
            };

            let topology = Arc::clone(&self.topology);
            let builder = Arc::clone(&self.builder);
            let record_tx = record_tx.clone();
            let stop = stop.clone();
            workers.spawn_blocking(move || {
                let _permit = permit;
                let result = generate_device(&topology, &builder, plan, &record_tx, &stop);
                if result.is_err() {
                    stop.cancel();
                }
                result
            });
        }
        drop(record_tx);

        let mut generated = 0u64;
        let mut failure: Option<GeneratorError> = None;
        while let Some(joined) = workers.join_next().await {
            let outcome = joined
                .map_err(|e| GeneratorError::invariant(format!("generation worker failed: {e}")))
                .and_then(|result| result);
            match outcome {
                Ok(count) => generated += count,
                Err(e) => {
                    stop.cancel();
                    failure.get_or_insert(e);
                }
            }
        }

        let batches = batcher
            .await
            .map_err(|e| GeneratorError::invariant(format!("batcher failed: {e}")))?;
        if let Some(e) = failure {
            return Err(e);
        }
        let batches = batches?;

        let report = GenerationReport {
            seed: self.seed,
            devices: self.plan.len(),
            planned: self.total_records(),
            generated,
            batches,
            identities: self.registry().len(),
            cancelled: cancel.is_cancelled(),
            elapsed: started.elapsed(),
        };
        if report.cancelled {
            warn!(generated = report.generated, planned = report.planned, "Generation cancelled");
        } else {
            info!(
                generated = report.generated,
                batches = report.batches,
                identities = report.identities,
                elapsed_ms = report.elapsed.as_millis() as u64,
                "Generation complete"
            );
        }
        Ok(report)
    }
}

/// Resolve each device's count once and hand out contiguous sequence ranges.
fn plan_devices(config: &GeneratorConfig, topology: &Topology, seed: u64) -> Vec<DevicePlan> {
    let mut count_rng = rng_from_seed(derive_seed(seed, PLAN_STREAM));
    let mut next_sequence = 0u64;

    topology
        .addresses()
        .into_iter()
        .enumerate()
        .map(|(ordinal, address)| {
            let ordinal = ordinal as u64;
            let count = config.media_count_per_device.resolve(&mut count_rng);
            let plan = DevicePlan {
                address,
                ordinal,
                count,
                first_sequence: next_sequence,
                seed: derive_seed(seed, ordinal),
            };
            next_sequence += u64::from(count);
            plan
        })
        .collect()
}

fn generate_device(
    topology: &Topology,
    builder: &MediaRecordBuilder,
    plan: DevicePlan,
    record_tx: &mpsc::Sender<MediaRecord>,
    stop: &CancellationToken,
) -> Result<u64> {
    let device = topology
        .resolve(plan.address)
        .ok_or_else(|| GeneratorError::invariant(format!("planned device {:?} not in topology", plan.address)))?;
    let mut rng = rng_from_seed(plan.seed);
    let mut generated = 0u64;

    for sequence in plan.sequences() {
        if stop.is_cancelled() {
            debug!(device_id = %device.device.id, generated = generated, "Device generation stopped");
            break;
        }
        let record = builder.build(device, sequence, &mut rng)?;
        record_tx.blocking_send(record).map_err(|_| GeneratorError::SinkClosed)?;
        generated += 1;
        metrics::counter!("generator.records.generated").increment(1);
    }

    debug!(
        tenant_id = %device.tenant.id,
        device_id = %device.device.id,
        generated = generated,
        "Device generation finished"
    );
    Ok(generated)
}

/// Group records into batches; the final partial batch is flushed once every
/// worker has dropped its sender.
async fn batch_records(
    mut rx: mpsc::Receiver<MediaRecord>,
    tx: mpsc::Sender<Vec<MediaRecord>>,
    batch_size: usize,
) -> Result<u64> {
    let mut batch = Vec::with_capacity(batch_size);
    let mut sent = 0u64;

    while let Some(record) = rx.recv().await {
        batch.push(record);
        if batch.len() >= batch_size {
            let full = std::mem::replace(&mut batch, Vec::with_capacity(batch_size));
            tx.send(full).await.map_err(|_| GeneratorError::SinkClosed)?;
            sent += 1;
            metrics::counter!("generator.batches.sent").increment(1);
        }
    }

    if !batch.is_empty() {
        debug!(records = batch.len(), "Flushing partial batch");
        tx.send(batch).await.map_err(|_| GeneratorError::SinkClosed)?;
        sent += 1;
        metrics::counter!("generator.batches.sent").increment(1);
    }
    Ok(sent)
}

/// Lazy, finite sequence of records in topology order.
pub struct RecordStream<'a> {
    orchestrator: &'a Orchestrator,
    device: usize,
    offset: u32,
    rng: Option<SimRng>,
}

impl Iterator for RecordStream<'_> {
    type Item = Result<MediaRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let plan = *self.orchestrator.plan.get(self.device)?;
            if self.offset >= plan.count {
                self.device += 1;
                self.offset = 0;
                self.rng = None;
                continue;
            }

            let Some(device) = self.orchestrator.topology.resolve(plan.address) else {
                self.device = self.orchestrator.plan.len();
                return Some(Err(GeneratorError::invariant(format!(
                    "planned device {:?} not in topology",
                    plan.address
                ))));
            };
            let rng = self.rng.get_or_insert_with(|| rng_from_seed(plan.seed));
            let sequence = plan.first_sequence + u64::from(self.offset);
            self.offset += 1;
            return Some(self.orchestrator.builder.build(device, sequence, rng));
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining: u64 = self
            .orchestrator
            .plan
            .iter()
            .skip(self.device)
            .map(|p| u64::from(p.count))
            .sum::<u64>()
            .saturating_sub(u64::from(self.offset));
        let remaining = usize::try_from(remaining).unwrap_or(usize::MAX);
        (remaining, Some(remaining))
    }
}
