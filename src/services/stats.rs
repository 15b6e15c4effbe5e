//! Balance and windowed statistics.
//!
//! Both are pure functions of stored state: the same rows always produce
//! the same figures. Negative intermediate values (transient over-refund
//! bookkeeping) are allowed internally but clamped to zero at the response
//! boundary.

use crate::database::partner_store::Partner;
use crate::database::payment_store::{Payment, PaymentStore};
use crate::database::refund_store::{RefundStatus, RefundStore};
use crate::error::{AppError, AppResult};
use crate::providers::types::PaymentStatus;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatsPeriod {
    Days(i64),
    All,
}

impl StatsPeriod {
    pub fn parse(value: &str) -> AppResult<Self> {
        match value {
            "7d" => Ok(StatsPeriod::Days(7)),
            "30d" => Ok(StatsPeriod::Days(30)),
            "90d" => Ok(StatsPeriod::Days(90)),
            "all" => Ok(StatsPeriod::All),
            other => Err(AppError::validation_field(
                format!("unknown period '{}', expected 7d, 30d, 90d or all", other),
                "period",
            )),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StatsPeriod::Days(7) => "7d",
            StatsPeriod::Days(30) => "30d",
            StatsPeriod::Days(90) => "90d",
            _ => "all",
        }
    }

    fn cutoff(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            StatsPeriod::Days(days) => Some(now - Duration::days(*days)),
            StatsPeriod::All => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BalanceView {
    pub currency: String,
    /// Completed volume minus completed refunds minus commission, floored
    /// at zero.
    pub available: Decimal,
    pub pending: Decimal,
    pub total_received: Decimal,
    pub total_refunded: Decimal,
    pub commission: Decimal,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusBreakdown {
    pub count: u64,
    pub volume: Decimal,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodStats {
    pub count: u64,
    pub completed: u64,
    pub volume: Decimal,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyBucket {
    pub date: String,
    pub count: u64,
    pub volume: Decimal,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsView {
    pub period: &'static str,
    pub total: u64,
    pub completed: StatusBreakdown,
    pub pending: StatusBreakdown,
    pub failed: StatusBreakdown,
    /// completed / total, 0 when the window is empty.
    pub conversion_rate: f64,
    pub average_ticket: Decimal,
    /// Mean seconds from creation to completion, over completed payments.
    pub average_completion_secs: f64,
    pub methods: BTreeMap<&'static str, MethodStats>,
    pub daily: Vec<DailyBucket>,
}

pub struct StatsService {
    payments: Arc<dyn PaymentStore>,
    refunds: Arc<dyn RefundStore>,
}

impl StatsService {
    pub fn new(payments: Arc<dyn PaymentStore>, refunds: Arc<dyn RefundStore>) -> Self {
        Self { payments, refunds }
    }

    pub async fn balance(&self, partner: &Partner, currency: &str) -> AppResult<BalanceView> {
        let payments = self.payments.list_all_for_partner(partner.id).await?;
        let refunds = self.refunds.list_all_for_partner(partner.id).await?;

        let total_received: Decimal = payments
            .iter()
            .filter(|p| p.status == PaymentStatus::Completed)
            .map(|p| p.amount)
            .sum();
        let pending: Decimal = payments
            .iter()
            .filter(|p| p.status == PaymentStatus::Pending)
            .map(|p| p.amount)
            .sum();
        let total_refunded: Decimal = refunds
            .iter()
            .filter(|r| r.status == RefundStatus::Completed)
            .map(|r| r.amount)
            .sum();
        let commission = total_received * partner.commission_rate;
        let available = (total_received - total_refunded - commission).max(Decimal::ZERO);

        Ok(BalanceView {
            currency: currency.to_string(),
            available,
            pending: pending.max(Decimal::ZERO),
            total_received,
            total_refunded,
            commission,
        })
    }

    pub async fn stats(&self, partner_id: Uuid, period: StatsPeriod) -> AppResult<StatsView> {
        let payments = self.payments.list_all_for_partner(partner_id).await?;
        let cutoff = period.cutoff(Utc::now());
        let window: Vec<&Payment> = payments
            .iter()
            .filter(|p| cutoff.map_or(true, |c| p.created_at >= c))
            .collect();

        let mut completed = StatusBreakdown::default();
        let mut pending = StatusBreakdown::default();
        let mut failed = StatusBreakdown::default();
        let mut methods: BTreeMap<&'static str, MethodStats> = BTreeMap::new();
        let mut daily: BTreeMap<String, DailyBucket> = BTreeMap::new();
        let mut latency_total_secs = 0i64;

        for payment in &window {
            match payment.status {
                PaymentStatus::Completed => {
                    completed.count += 1;
                    completed.volume += payment.amount;
                    if let Some(done) = payment.completed_at {
                        latency_total_secs += (done - payment.created_at).num_seconds().max(0);
                    }
                }
                PaymentStatus::Pending => {
                    pending.count += 1;
                    pending.volume += payment.amount;
                }
                PaymentStatus::Failed
                | PaymentStatus::Expired
                | PaymentStatus::Cancelled => {
                    failed.count += 1;
                    failed.volume += payment.amount;
                }
            }

            let method = methods.entry(payment.method.as_str()).or_default();
            method.count += 1;
            if payment.status == PaymentStatus::Completed {
                method.completed += 1;
                method.volume += payment.amount;
            }

            // bucket by completion date when there is one, creation date
            // otherwise
            let key = payment
                .completed_at
                .unwrap_or(payment.created_at)
                .date_naive()
                .to_string();
            let bucket = daily.entry(key.clone()).or_insert(DailyBucket {
                date: key,
                count: 0,
                volume: Decimal::ZERO,
            });
            bucket.count += 1;
            if payment.status == PaymentStatus::Completed {
                bucket.volume += payment.amount;
            }
        }

        let total = window.len() as u64;
        let conversion_rate = if total > 0 {
            completed.count as f64 / total as f64
        } else {
            0.0
        };
        let average_ticket = if completed.count > 0 {
            completed.volume / Decimal::from(completed.count)
        } else {
            Decimal::ZERO
        };
        let average_completion_secs = if completed.count > 0 {
            latency_total_secs as f64 / completed.count as f64
        } else {
            0.0
        };
        Ok(StatsView {
            period: period.as_str(),
            total,
            completed,
            pending,
            failed,
            conversion_rate,
            average_ticket,
            average_completion_secs,
            methods,
            daily: daily.into_values().collect(),
        })
    }
}
