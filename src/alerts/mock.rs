//! Scripted evaluators and sources for tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use super::config::AlertConfig;
use super::error::FetchError;
use super::evaluator::{Decision, Evaluator};
use crate::sources::TimeSeriesSource;

/// Shared count of evaluations
#[derive(Debug, Clone, Default)]
pub struct CallCounter(Arc<AtomicUsize>);

impl CallCounter {
    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// Cycles through a fixed activate/deactivate schedule
pub struct ScheduleEvaluator {
    schedule: Vec<bool>,
    fail: bool,
    calls: CallCounter,
}

impl ScheduleEvaluator {
    pub fn new(schedule: Vec<bool>) -> Self {
        let schedule = if schedule.is_empty() { vec![false] } else { schedule };
        Self {
            schedule,
            fail: false,
            calls: CallCounter::default(),
        }
    }

    /// Every evaluation fails with a network error
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(vec![])
        }
    }

    pub fn calls(&self) -> CallCounter {
        self.calls.clone()
    }
}

#[async_trait]
impl Evaluator for ScheduleEvaluator {
    fn kind(&self) -> &'static str {
        "mock"
    }

    async fn evaluate(&self, _rule: &AlertConfig) -> Result<Decision, FetchError> {
        let call = self.calls.0.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(FetchError::Network("mock source unavailable".to_string()));
        }

        if self.schedule[call % self.schedule.len()] {
            Ok(Decision::Activate(None))
        } else {
            Ok(Decision::Deactivate)
        }
    }
}

/// Time-series source returning a fixed value
pub struct StaticSeries(pub Option<f64>);

#[async_trait]
impl TimeSeriesSource for StaticSeries {
    async fn query(&self, _query: &str) -> Result<Option<f64>, FetchError> {
        Ok(self.0)
    }
}
