// src/core/engine.rs
use crate::core::decision::{DecisionEngine, Evaluation, TradeDecision};
use crate::core::lifecycle::{OrderManager, Outcome};
use crate::error::TradeError;
use crate::types::{Notification, OpenedPosition};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    JustTraded,
}

#[derive(Debug)]
pub enum CycleOutcome {
    InsufficientFunds,
    Skipped(TradeDecision),
    Traded {
        decision: TradeDecision,
        position: OpenedPosition,
    },
    /// Order placement failed, already reported to the operator.
    TradeFailed(TradeError),
    /// Nothing was attempted: a read failed or the cycle panicked.
    Aborted(TradeError),
}

impl CycleOutcome {
    pub fn next_state(&self) -> LoopState {
        match self {
            CycleOutcome::Traded { .. } => LoopState::JustTraded,
            _ => LoopState::Idle,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Cadence {
    pub base_delay: Duration,
    pub traded_cooldown: Duration,
    pub insufficient_funds_backoff: Duration,
}

impl Cadence {
    /// Pause before the next iteration. The post-trade cooldown is applied
    /// separately, at the start of the next iteration.
    pub fn pause_after(&self, outcome: &CycleOutcome) -> Duration {
        match outcome {
            CycleOutcome::InsufficientFunds => self.insufficient_funds_backoff + self.base_delay,
            _ => self.base_delay,
        }
    }
}

pub struct TradingEngine {
    symbol: String,
    decision: DecisionEngine,
    orders: OrderManager,
    notify_sender: mpsc::Sender<Notification>,
    cadence: Cadence,
    last_error: Option<String>,
}

impl TradingEngine {
    pub fn new(
        symbol: String,
        decision: DecisionEngine,
        orders: OrderManager,
        notify_sender: mpsc::Sender<Notification>,
        cadence: Cadence,
    ) -> Self {
        Self {
            symbol,
            decision,
            orders,
            notify_sender,
            cadence,
            last_error: None,
        }
    }

    fn notify(&self, notification: Notification) {
        match self.notify_sender.try_send(notification) {
            Ok(_) => {}
            Err(mpsc::error::TrySendError::Full(n)) => {
                warn!("Notification queue full, dropping: {}", n);
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                error!("Notification channel closed! Notifier is likely dead.");
            }
        }
    }

    /// Runs forever. Stopped only by dropping the future (Ctrl+C in main).
    pub async fn run(&mut self) {
        info!("Engine loop running for {}", self.symbol);
        let mut state = LoopState::Idle;

        loop {
            if state == LoopState::JustTraded {
                info!("Cooling down {:?} after trade", self.cadence.traded_cooldown);
                tokio::time::sleep(self.cadence.traded_cooldown).await;
            }

            let outcome = self.run_cycle().await;
            state = outcome.next_state();

            tokio::time::sleep(self.cadence.pause_after(&outcome)).await;
        }
    }

    /// One decide-and-act pass. Never returns an error: every failure is
    /// folded into the outcome and reported.
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        info!("--------------------------------");
        let outcome = match AssertUnwindSafe(self.cycle()).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(panic) => {
                let msg = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                CycleOutcome::Aborted(TradeError::CyclePanicked(msg))
            }
        };
        self.report(&outcome);
        outcome
    }

    async fn cycle(&self) -> CycleOutcome {
        let decision = match self.decision.evaluate(&self.symbol).await {
            Ok(Evaluation::InsufficientFunds { .. }) => return CycleOutcome::InsufficientFunds,
            Ok(Evaluation::Evaluated(decision)) => decision,
            Err(e) => return CycleOutcome::Aborted(e),
        };

        if !decision.authorized {
            return CycleOutcome::Skipped(decision);
        }

        info!(
            "Signal: impact {} above threshold, opening {}",
            decision.price_impact, self.symbol
        );
        match self
            .orders
            .open_position(
                &self.symbol,
                decision.last_price,
                self.decision.min_order_value(),
            )
            .await
        {
            Outcome::Opened(position) => CycleOutcome::Traded { decision, position },
            Outcome::Failed(e) => CycleOutcome::TradeFailed(e),
        }
    }

    fn report(&mut self, outcome: &CycleOutcome) {
        match outcome {
            CycleOutcome::Aborted(e) => {
                warn!("⚠️ Cycle aborted: {}", e);
                let text = e.to_string();
                // одна и та же ошибка подряд уходит оператору один раз
                if self.last_error.as_deref() != Some(text.as_str()) {
                    self.notify(Notification::CycleError(text.clone()));
                    self.last_error = Some(text);
                }
                return;
            }
            CycleOutcome::InsufficientFunds => {
                info!("Backing off {:?}", self.cadence.insufficient_funds_backoff);
            }
            CycleOutcome::Skipped(d) => {
                info!("No trade (can_trade={}, impact={})", d.can_trade, d.price_impact);
            }
            CycleOutcome::Traded { decision, position } => {
                info!("📈 Position opened: {:?}", position);
                self.notify(Notification::TradeOpened {
                    position: position.clone(),
                    adjusted_prediction: decision.adjusted_prediction,
                    price_impact: decision.price_impact,
                });
            }
            CycleOutcome::TradeFailed(e) => {
                error!("Trade failed: {}", e);
                self.notify(Notification::TradeFailed {
                    symbol: self.symbol.clone(),
                    reason: e.to_string(),
                });
            }
        }
        self.last_error = None;
    }
}
