//! Prometheus metrics for admission decisions.
//!
//! Owned by `AppState` rather than registered globally, so every test
//! server gets its own registry.

use std::time::Duration;

use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};

use taskhub_core::{Decision, RouteClass};

pub struct Metrics {
    registry: Registry,
    decisions: IntCounterVec,
    evaluation_seconds: HistogramVec,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("taskhub".to_string()), None)?;

        let decisions = IntCounterVec::new(
            Opts::new(
                "rate_limit_decisions_total",
                "Admission decisions by outcome and route class",
            ),
            &["outcome", "route"],
        )?;
        registry.register(Box::new(decisions.clone()))?;

        let evaluation_seconds = HistogramVec::new(
            HistogramOpts::new(
                "rate_limit_evaluation_seconds",
                "Time spent deciding admission, store round-trip included",
            )
            .buckets(vec![0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5]),
            &["outcome"],
        )?;
        registry.register(Box::new(evaluation_seconds.clone()))?;

        Ok(Self {
            registry,
            decisions,
            evaluation_seconds,
        })
    }

    pub fn record_decision(&self, route: RouteClass, decision: &Decision, elapsed: Duration) {
        let outcome = decision.outcome();
        self.decisions
            .with_label_values(&[outcome, route.metric_label()])
            .inc();
        self.evaluation_seconds
            .with_label_values(&[outcome])
            .observe(elapsed.as_secs_f64());
    }

    /// Count of decisions recorded for an outcome and route.
    #[cfg(test)]
    pub fn decision_count(&self, outcome: &str, route: RouteClass) -> u64 {
        self.decisions
            .with_label_values(&[outcome, route.metric_label()])
            .get()
    }

    /// Prometheus text exposition format.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
