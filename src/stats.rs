use std::sync::{Arc, Mutex};

#[derive(Clone, Debug, Default)]
pub struct StageStats {
    pub samples: u64,
    pub total_ns: u128,
    pub max_ns: u64,
}

impl StageStats {
    pub fn record(&mut self, duration_ns: u64) {
        self.samples += 1;
        self.total_ns += duration_ns as u128;
        self.max_ns = self.max_ns.max(duration_ns);
    }

    pub fn avg_ns(&self) -> f64 {
        if self.samples == 0 {
            0.0
        } else {
            self.total_ns as f64 / self.samples as f64
        }
    }

    pub fn avg_ms(&self) -> f64 {
        self.avg_ns() / 1_000_000.0
    }

    pub fn max_ms(&self) -> f64 {
        self.max_ns as f64 / 1_000_000.0
    }
}

#[derive(Clone, Debug, Default)]
pub struct RuntimeStats {
    pub frames_in: u64,
    pub frames_out: u64,
    pub frames_dropped: u64,
    pub frames_passed_through: u64,
    pub pitch_failures: u64,
    pub resets: u64,

    pub gain_stage: StageStats,
    pub speed_stage: StageStats,
    pub pitch_stage: StageStats,
    pub reverb_stage: StageStats,
    pub total_frame: StageStats,
}

impl RuntimeStats {
    /// Timing slot for a stage name as reported by `AudioProcessor::name`.
    pub fn stage_mut(&mut self, stage: &str) -> Option<&mut StageStats> {
        match stage {
            "gain" => Some(&mut self.gain_stage),
            "speed" => Some(&mut self.speed_stage),
            "pitch" => Some(&mut self.pitch_stage),
            "reverb" => Some(&mut self.reverb_stage),
            _ => None,
        }
    }
}

#[derive(Clone, Default)]
pub struct RuntimeStatsHandle {
    inner: Arc<Mutex<RuntimeStats>>,
}

impl RuntimeStatsHandle {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(RuntimeStats::default())),
        }
    }

    pub fn reset(&self) {
        if let Ok(mut stats) = self.inner.lock() {
            *stats = RuntimeStats::default();
        }
    }

    pub fn update<F>(&self, update_fn: F)
    where
        F: FnOnce(&mut RuntimeStats),
    {
        if let Ok(mut stats) = self.inner.lock() {
            update_fn(&mut stats);
        }
    }

    pub fn snapshot(&self) -> RuntimeStats {
        if let Ok(stats) = self.inner.lock() {
            stats.clone()
        } else {
            RuntimeStats::default()
        }
    }
}
