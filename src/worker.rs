use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender};
use tracing::debug;

use crate::config::{PipelineConfig, VoiceParams};
use crate::error::{DspError, Result};
use crate::messages::{ProcessedFrame, SourceId};
use crate::pipeline::VoicePipeline;
use crate::stats::{RuntimeStats, RuntimeStatsHandle};

pub enum WorkerCommand {
    Frame {
        sequence: u64,
        bytes: Vec<u8>,
        params: VoiceParams,
    },
    Reset,
}

/// Outcome of one submitted frame, delivered in submission order.
#[derive(Debug)]
pub struct FrameResult {
    pub source: SourceId,
    pub sequence: u64,
    pub outcome: Result<ProcessedFrame>,
}

/// Owns one source's pipeline on a dedicated thread, so the source's frames
/// are processed one at a time and in the order they were submitted.
pub struct SourceWorker {
    source: SourceId,
    tx: Option<Sender<WorkerCommand>>,
    stop_tx: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
    stats: RuntimeStatsHandle,
    next_sequence: u64,
}

impl SourceWorker {
    pub fn spawn(source: SourceId, config: PipelineConfig, results: Sender<FrameResult>) -> Self {
        let stats = RuntimeStatsHandle::new();
        let (tx, rx) = crossbeam_channel::bounded(config.queue_capacity.max(1));
        let (stop_tx, stop_rx) = crossbeam_channel::bounded(1);

        let pipeline = VoicePipeline::new(source, config, stats.clone());
        let thread = std::thread::spawn(move || {
            run(pipeline, rx, stop_rx, results);
        });
        debug!(%source, "source worker started");

        Self {
            source,
            tx: Some(tx),
            stop_tx: Some(stop_tx),
            thread: Some(thread),
            stats,
            next_sequence: 0,
        }
    }

    pub fn source(&self) -> SourceId {
        self.source
    }

    /// Queues a frame, blocking while the queue is full. Returns the frame's sequence number.
    pub fn submit(&mut self, bytes: Vec<u8>, params: VoiceParams) -> Result<u64> {
        let sequence = self.next_sequence;
        self.send(WorkerCommand::Frame { sequence, bytes, params })?;
        self.next_sequence += 1;
        Ok(sequence)
    }

    /// Queues a state reset behind any frames already submitted.
    pub fn reset(&self) -> Result<()> {
        self.send(WorkerCommand::Reset)
    }

    pub fn stats(&self) -> RuntimeStats {
        self.stats.snapshot()
    }

    pub fn is_running(&self) -> bool {
        self.thread.is_some()
    }

    /// Stops the worker and waits for its thread. Queued frames are discarded.
    pub fn stop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        self.tx.take();

        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
            debug!(source = %self.source, "source worker stopped");
        }
    }

    fn send(&self, command: WorkerCommand) -> Result<()> {
        let tx = self.tx.as_ref().ok_or(DspError::WorkerStopped)?;
        tx.send(command).map_err(|_| DspError::WorkerStopped)
    }
}

impl Drop for SourceWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(
    mut pipeline: VoicePipeline,
    rx: Receiver<WorkerCommand>,
    stop_rx: Receiver<()>,
    results: Sender<FrameResult>,
) {
    loop {
        let command = crossbeam_channel::select! {
            recv(stop_rx) -> _ => break,
            recv(rx) -> msg => match msg {
                Ok(command) => command,
                Err(_) => break,
            },
        };

        match command {
            WorkerCommand::Frame { sequence, bytes, params } => {
                let outcome = pipeline.process_frame_with_policy(&bytes, &params);
                let result = FrameResult {
                    source: pipeline.source(),
                    sequence,
                    outcome,
                };
                if results.send(result).is_err() {
                    debug!(source = %pipeline.source(), "result receiver gone, stopping worker");
                    break;
                }
            }
            WorkerCommand::Reset => pipeline.reset(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pcm;
    use std::time::Duration;

    fn frame(seed: i16) -> Vec<u8> {
        let samples: Vec<i16> = (0..960).map(|i| ((i as i16 % 50) - 25) * seed).collect();
        pcm::i16_to_bytes(&samples)
    }

    fn recv(rx: &Receiver<FrameResult>) -> FrameResult {
        rx.recv_timeout(Duration::from_secs(10)).unwrap()
    }

    #[test]
    fn results_arrive_in_submission_order_and_match_inline_processing() {
        let (results_tx, results_rx) = crossbeam_channel::unbounded();
        let mut worker = SourceWorker::spawn(SourceId(4), PipelineConfig::default(), results_tx);
        let params = VoiceParams::default().with_reverb(0.7, 0.4).with_volume(0.8);

        let mut inline =
            VoicePipeline::new(SourceId(4), PipelineConfig::default(), RuntimeStatsHandle::new());
        for seed in 1..=5 {
            assert_eq!(worker.submit(frame(seed), params).unwrap(), (seed - 1) as u64);
        }
        for seed in 1..=5 {
            let result = recv(&results_rx);
            assert_eq!(result.source, SourceId(4));
            assert_eq!(result.sequence, (seed - 1) as u64);
            let expected = inline.process_frame(&frame(seed), &params).unwrap();
            assert_eq!(result.outcome.unwrap(), expected);
        }

        worker.stop();
        assert_eq!(worker.stats().frames_out, 5);
    }

    #[test]
    fn reset_command_restores_fresh_state() {
        let (results_tx, results_rx) = crossbeam_channel::unbounded();
        let mut worker = SourceWorker::spawn(SourceId(5), PipelineConfig::default(), results_tx);
        let params = VoiceParams::default().with_reverb(0.9, 0.6);

        worker.submit(frame(10), params).unwrap();
        worker.submit(frame(20), params).unwrap();
        worker.reset().unwrap();
        worker.submit(frame(10), params).unwrap();

        let first = recv(&results_rx).outcome.unwrap();
        let _second = recv(&results_rx);
        let after_reset = recv(&results_rx).outcome.unwrap();
        assert_eq!(first, after_reset);
        assert_eq!(worker.stats().resets, 1);
    }

    #[test]
    fn submit_after_stop_fails() {
        let (results_tx, _results_rx) = crossbeam_channel::unbounded();
        let mut worker = SourceWorker::spawn(SourceId(6), PipelineConfig::default(), results_tx);
        assert!(worker.is_running());
        worker.stop();
        assert!(!worker.is_running());
        assert_eq!(worker.submit(frame(1), VoiceParams::default()), Err(DspError::WorkerStopped));
        assert_eq!(worker.reset(), Err(DspError::WorkerStopped));
        worker.stop();
    }

    #[test]
    fn worker_exits_when_results_are_dropped() {
        let (results_tx, results_rx) = crossbeam_channel::unbounded();
        let mut worker = SourceWorker::spawn(SourceId(7), PipelineConfig::default(), results_tx);
        drop(results_rx);
        worker.submit(frame(1), VoiceParams::default()).unwrap();
        // Thread ends on its own; stop() must still join cleanly.
        worker.stop();
    }
}
