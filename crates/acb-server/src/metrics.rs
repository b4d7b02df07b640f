//! Prometheus metrics for the ledger server

use acb_common::{Amount, Result as AcbResult, ONE_TOKEN};
use acb_protocol::LedgerService;
use prometheus::{
    Encoder, Gauge, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::time::Instant;

/// Server-wide metric handles and their registry
pub struct ServerMetrics {
    registry: Registry,
    pub operations_total: IntCounterVec,
    pub operation_duration_seconds: HistogramVec,
    pub pool_liquidity_tokens: Gauge,
    pub pool_borrowed_tokens: Gauge,
    pub pool_risk_reserve_tokens: Gauge,
    pub pool_utilization_ratio: Gauge,
    pub active_loans: IntGauge,
    pub last_commit: IntGauge,
}

impl ServerMetrics {
    pub fn new() -> prometheus::Result<Self> {
        let metrics = Self {
            registry: Registry::new(),
            operations_total: IntCounterVec::new(
                Opts::new("acb_operations_total", "Ledger operations by outcome"),
                &["operation", "outcome"],
            )?,
            operation_duration_seconds: HistogramVec::new(
                HistogramOpts::new(
                    "acb_operation_duration_seconds",
                    "Ledger operation latency",
                )
                .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]),
                &["operation"],
            )?,
            pool_liquidity_tokens: Gauge::new(
                "acb_pool_liquidity_tokens",
                "Total pool liquidity in whole tokens",
            )?,
            pool_borrowed_tokens: Gauge::new(
                "acb_pool_borrowed_tokens",
                "Principal out on active loans in whole tokens",
            )?,
            pool_risk_reserve_tokens: Gauge::new(
                "acb_pool_risk_reserve_tokens",
                "Risk reserve in whole tokens",
            )?,
            pool_utilization_ratio: Gauge::new(
                "acb_pool_utilization_ratio",
                "Borrowed share of pool liquidity",
            )?,
            active_loans: IntGauge::new("acb_active_loans", "Loans currently active")?,
            last_commit: IntGauge::new("acb_ledger_last_commit", "Sequence of the last commit")?,
        };
        metrics.register()?;
        Ok(metrics)
    }

    fn register(&self) -> prometheus::Result<()> {
        self.registry.register(Box::new(self.operations_total.clone()))?;
        self.registry.register(Box::new(self.operation_duration_seconds.clone()))?;
        self.registry.register(Box::new(self.pool_liquidity_tokens.clone()))?;
        self.registry.register(Box::new(self.pool_borrowed_tokens.clone()))?;
        self.registry.register(Box::new(self.pool_risk_reserve_tokens.clone()))?;
        self.registry.register(Box::new(self.pool_utilization_ratio.clone()))?;
        self.registry.register(Box::new(self.active_loans.clone()))?;
        self.registry.register(Box::new(self.last_commit.clone()))?;
        Ok(())
    }

    /// Count an operation and record how long it took
    pub fn observe<T>(&self, operation: &str, started: Instant, result: &AcbResult<T>) {
        let outcome = match result {
            Ok(_) => "ok",
            Err(err) => err.kind(),
        };
        self.operations_total
            .with_label_values(&[operation, outcome])
            .inc();
        self.operation_duration_seconds
            .with_label_values(&[operation])
            .observe(started.elapsed().as_secs_f64());
    }

    /// Copy pool and ledger figures into the gauges
    pub fn refresh(&self, service: &LedgerService) {
        let pool = service.ledger().pool();
        let stats = service.stats();

        self.pool_liquidity_tokens.set(as_tokens(pool.total_liquidity));
        self.pool_borrowed_tokens.set(as_tokens(pool.total_borrowed));
        self.pool_risk_reserve_tokens.set(as_tokens(pool.risk_reserve));
        self.pool_utilization_ratio
            .set(pool.utilization_bps() as f64 / 10_000.0);
        self.active_loans.set(stats.active_loans as i64);
        self.last_commit.set(stats.last_commit as i64);
    }

    /// Text exposition of every registered metric
    pub fn render(&self) -> prometheus::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// Whole tokens as a float, for gauges only
fn as_tokens(amount: Amount) -> f64 {
    amount.value() as f64 / ONE_TOKEN as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use acb_common::{AcbError, ProtocolError};

    #[test]
    fn test_observe_counts_by_outcome() {
        let metrics = ServerMetrics::new().unwrap();
        let started = Instant::now();

        metrics.observe("deposit", started, &Ok::<_, AcbError>(()));
        metrics.observe::<()>(
            "deposit",
            started,
            &Err(ProtocolError::InvalidAmount { amount: Amount::ZERO }.into()),
        );

        assert_eq!(
            metrics.operations_total.with_label_values(&["deposit", "ok"]).get(),
            1
        );
        assert_eq!(
            metrics
                .operations_total
                .with_label_values(&["deposit", "invalid_amount"])
                .get(),
            1
        );

        let text = metrics.render().unwrap();
        assert!(text.contains("acb_operations_total"));
        assert!(text.contains("acb_operation_duration_seconds"));
    }
}
