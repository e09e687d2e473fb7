//! # Analysis Pipeline Module
//!
//! Glues the detector and the tuner session together and runs them either
//! inline ([`Analyzer`]) or on a dedicated thread ([`AnalysisWorker`]).
//!
//! ## Architecture
//! - **Capture side**: the host's audio callback sends [`AudioBlock`]s
//! - **Analysis thread**: owns the only [`Analyzer`], so the session has a
//!   single writer
//! - **Communication**: crossbeam channels; FIFO order means readings come
//!   back in the order the blocks were sent

use std::thread::{self, JoinHandle};
use std::time::Instant;

use anyhow::{Context, Result, anyhow};
use crossbeam_channel::{Receiver, Sender, TrySendError};
use tracing::{debug, info, warn};

use crate::TunerReading;
use crate::config::TunerSettings;
use crate::pitch::PitchDetector;
use crate::preprocess;
use crate::tuner::TunerSession;
use crate::tuning::Tuning;

/// Readings the worker holds for a host that is not draining them.
pub const READING_QUEUE_LEN: usize = 64;

/// One block of mono audio as delivered by the capture side.
#[derive(Debug, Clone)]
pub struct AudioBlock {
    pub samples: Vec<f32>,
    /// Sample rate in Hz.
    pub sample_rate: f64,
    /// When the block was captured; drives the stability hold.
    pub captured_at: Instant,
}

impl AudioBlock {
    /// A block stamped with the current time.
    pub fn new(samples: Vec<f32>, sample_rate: f64) -> Self {
        Self {
            samples,
            sample_rate,
            captured_at: Instant::now(),
        }
    }
}

/// Runs the whole chain on one block at a time.
#[derive(Debug, Clone)]
pub struct Analyzer {
    detector: PitchDetector,
    session: TunerSession,
}

impl Analyzer {
    pub fn new(settings: &TunerSettings) -> Result<Self> {
        Ok(Self {
            detector: PitchDetector::new(settings.detector),
            session: settings.session()?,
        })
    }

    /// Analyses one block and advances the tuner session.
    ///
    /// A block the detector rejects still reaches the session, as a zero
    /// frequency, so the display falls back to "no signal".
    pub fn process_block(&mut self, samples: &[f32], sample_rate: f64, now: Instant) -> TunerReading {
        let level = preprocess::rms(samples);
        match self.detector.estimate(samples, sample_rate) {
            Some(estimate) => self
                .session
                .update(estimate.frequency, estimate.confidence, level, now),
            None => self.session.update(0.0, 0.0, level, now),
        }
    }

    pub fn process(&mut self, block: &AudioBlock) -> TunerReading {
        self.process_block(&block.samples, block.sample_rate, block.captured_at)
    }

    pub fn detector(&self) -> &PitchDetector {
        &self.detector
    }

    pub fn session(&self) -> &TunerSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut TunerSession {
        &mut self.session
    }

    /// Applies a runtime settings change to the session.
    pub fn apply(&mut self, command: TunerCommand) -> Result<()> {
        match command {
            TunerCommand::SetA4(a4) => self.session.set_a4(a4),
            TunerCommand::SetTuning(tuning) => self.session.set_tuning(tuning),
            TunerCommand::SelectString(index) => {
                self.session.select_string(index);
                Ok(())
            }
            TunerCommand::Reset => {
                self.session.reset();
                Ok(())
            }
        }
    }
}

/// Runtime changes a host can make while the worker is running.
#[derive(Debug, Clone, PartialEq)]
pub enum TunerCommand {
    SetA4(f64),
    SetTuning(Tuning),
    SelectString(usize),
    Reset,
}

/// Everything the analysis thread consumes, in one ordered stream.
#[derive(Debug, Clone)]
pub enum WorkerMessage {
    Block(AudioBlock),
    Command(TunerCommand),
}

/// A dedicated analysis thread.
///
/// Blocks and commands share one channel, so a command takes effect exactly
/// between the blocks it was sent between.
#[derive(Debug)]
pub struct AnalysisWorker {
    input_tx: Sender<WorkerMessage>,
    reading_rx: Receiver<TunerReading>,
    shutdown_tx: Sender<()>,
    thread_handle: Option<JoinHandle<()>>,
}

impl AnalysisWorker {
    /// Starts the analysis thread.
    ///
    /// Fails without spawning anything if the settings are invalid.
    pub fn spawn(settings: &TunerSettings) -> Result<Self> {
        let mut analyzer = Analyzer::new(settings)?;
        let (input_tx, input_rx) = crossbeam_channel::unbounded::<WorkerMessage>();
        let (reading_tx, reading_rx) = crossbeam_channel::bounded::<TunerReading>(READING_QUEUE_LEN);
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(1);

        let thread_handle = thread::Builder::new()
            .name("tuner-analysis".into())
            .spawn(move || {
                info!("analysis thread started");
                let mut blocks = 0u64;
                loop {
                    crossbeam_channel::select! {
                        recv(input_rx) -> msg => match msg {
                            Ok(WorkerMessage::Block(block)) => {
                                let reading = analyzer.process(&block);
                                blocks += 1;
                                match reading_tx.try_send(reading) {
                                    Ok(()) => {}
                                    Err(TrySendError::Full(_)) => {
                                        debug!(blocks, "reading queue full, dropping reading");
                                    }
                                    Err(TrySendError::Disconnected(_)) => {
                                        warn!("reading receiver dropped, stopping analysis");
                                        break;
                                    }
                                }
                            }
                            Ok(WorkerMessage::Command(command)) => {
                                debug!(?command, "applying tuner command");
                                if let Err(e) = analyzer.apply(command) {
                                    warn!("rejected tuner command: {e:#}");
                                }
                            }
                            Err(_) => {
                                info!("input channel closed");
                                break;
                            }
                        },
                        recv(shutdown_rx) -> _ => {
                            info!("received shutdown signal");
                            break;
                        },
                    }
                }
                info!(blocks, "analysis thread finished");
            })
            .context("failed to spawn analysis thread")?;

        Ok(Self {
            input_tx,
            reading_rx,
            shutdown_tx,
            thread_handle: Some(thread_handle),
        })
    }

    /// A sender the capture side can own.
    pub fn sender(&self) -> Sender<WorkerMessage> {
        self.input_tx.clone()
    }

    pub fn submit(&self, block: AudioBlock) -> Result<()> {
        self.input_tx
            .send(WorkerMessage::Block(block))
            .map_err(|_| anyhow!("analysis thread has stopped"))
    }

    pub fn command(&self, command: TunerCommand) -> Result<()> {
        self.input_tx
            .send(WorkerMessage::Command(command))
            .map_err(|_| anyhow!("analysis thread has stopped"))
    }

    /// Receiver of readings, one per submitted block, in submission order.
    ///
    /// At most [`READING_QUEUE_LEN`] readings are held; while the queue is
    /// full, readings for new blocks are dropped until the host drains it.
    pub fn readings(&self) -> &Receiver<TunerReading> {
        &self.reading_rx
    }

    /// Drains every reading that is ready without blocking.
    pub fn drain_readings(&self) -> Vec<TunerReading> {
        self.reading_rx.try_iter().collect()
    }

    /// Stops the thread after the block in progress and waits for it.
    pub fn shutdown(mut self) -> Result<()> {
        self.stop()
    }

    fn stop(&mut self) -> Result<()> {
        let Some(handle) = self.thread_handle.take() else {
            return Ok(());
        };
        let _ = self.shutdown_tx.try_send(());
        handle
            .join()
            .map_err(|_| anyhow!("analysis thread panicked"))
    }
}

impl Drop for AnalysisWorker {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!("error stopping analysis worker: {e:#}");
        }
    }
}
