//! Per-request stage tracking.

use std::time::{Duration, Instant};

use facedet_models::PipelineStage;
use tracing::debug;

use crate::error::{MediaError, MediaResult};

/// Current stage of one request plus per-stage timings.
#[derive(Debug)]
pub struct RequestState {
    stage: PipelineStage,
    started: Instant,
    last_mark: Instant,
    timings: Vec<(PipelineStage, Duration)>,
}

impl RequestState {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            stage: PipelineStage::Received,
            started: now,
            last_mark: now,
            timings: Vec::with_capacity(5),
        }
    }

    pub fn stage(&self) -> PipelineStage {
        self.stage
    }

    /// Move to `to`, refusing anything but the next stage in order.
    pub fn advance(&mut self, to: PipelineStage) -> MediaResult<()> {
        if to == PipelineStage::Failed || !self.stage.can_transition_to(to) {
            return Err(MediaError::internal(format!(
                "Illegal stage transition {} -> {}",
                self.stage, to
            )));
        }

        let now = Instant::now();
        let took = now - self.last_mark;
        debug!(stage = %to, stage_ms = took.as_secs_f64() * 1000.0, "Pipeline stage reached");

        self.timings.push((to, took));
        self.last_mark = now;
        self.stage = to;
        Ok(())
    }

    /// Mark the request failed, returning the stage it was working towards.
    pub fn fail(&mut self) -> PipelineStage {
        let attempted = self.stage.next().unwrap_or(self.stage);
        self.stage = PipelineStage::Failed;
        attempted
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed().as_secs_f64() * 1000.0
    }

    /// Time spent reaching each completed stage.
    pub fn timings(&self) -> &[(PipelineStage, Duration)] {
        &self.timings
    }
}

impl Default for RequestState {
    fn default() -> Self {
        Self::new()
    }
}
