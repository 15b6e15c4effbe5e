//! In-memory store implementations. Used by the binary when `DATABASE_URL`
//! is unset and by the test suite; they honor the same contracts as the
//! Postgres stores, including the (partner, order_reference) uniqueness.

use crate::database::error::{StoreError, StoreResult};
use crate::database::partner_store::{Partner, PartnerStatus, PartnerStore};
use crate::database::payment_store::{Payment, PaymentPage, PaymentStore};
use crate::database::refund_store::{Refund, RefundPage, RefundStore};
use crate::database::usage_log_store::{UsageLogRecord, UsageLogStore};
use crate::providers::types::PaymentStatus;
use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
pub struct InMemoryPartnerStore {
    partners: RwLock<Vec<Partner>>,
}

impl InMemoryPartnerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add(&self, partner: Partner) {
        self.partners.write().await.push(partner);
    }
}

#[async_trait]
impl PartnerStore for InMemoryPartnerStore {
    async fn find_approved_by_api_key(&self, api_key: &str) -> StoreResult<Option<Partner>> {
        Ok(self
            .partners
            .read()
            .await
            .iter()
            .find(|p| p.api_key == api_key && p.status == PartnerStatus::Approved)
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Partner>> {
        Ok(self
            .partners
            .read()
            .await
            .iter()
            .find(|p| p.id == id)
            .cloned())
    }
}

#[derive(Default)]
pub struct InMemoryPaymentStore {
    payments: RwLock<Vec<Payment>>,
}

impl InMemoryPaymentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn page(mut items: Vec<Payment>, limit: i64, offset: i64) -> PaymentPage {
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let total = items.len() as i64;
        let items = items
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect();
        PaymentPage { items, total }
    }
}

#[async_trait]
impl PaymentStore for InMemoryPaymentStore {
    async fn insert(&self, payment: &Payment) -> StoreResult<()> {
        let mut payments = self.payments.write().await;
        if payments
            .iter()
            .any(|p| p.partner_id == payment.partner_id && p.order_reference == payment.order_reference)
        {
            return Err(StoreError::Duplicate {
                constraint: "payments_partner_order_reference_key".to_string(),
            });
        }
        payments.push(payment.clone());
        Ok(())
    }

    async fn update(&self, payment: &Payment) -> StoreResult<()> {
        let mut payments = self.payments.write().await;
        match payments.iter_mut().find(|p| p.id == payment.id) {
            Some(slot) => {
                *slot = payment.clone();
                Ok(())
            }
            None => Err(StoreError::Database {
                message: format!("payment {} does not exist", payment.id),
            }),
        }
    }

    async fn find_by_id(&self, partner_id: Uuid, id: Uuid) -> StoreResult<Option<Payment>> {
        Ok(self
            .payments
            .read()
            .await
            .iter()
            .find(|p| p.id == id && p.partner_id == partner_id)
            .cloned())
    }

    async fn find_by_order_reference(
        &self,
        partner_id: Uuid,
        order_reference: &str,
    ) -> StoreResult<Option<Payment>> {
        Ok(self
            .payments
            .read()
            .await
            .iter()
            .find(|p| p.partner_id == partner_id && p.order_reference == order_reference)
            .cloned())
    }

    async fn find_by_merchant_reference(
        &self,
        merchant_reference: &str,
    ) -> StoreResult<Option<Payment>> {
        Ok(self
            .payments
            .read()
            .await
            .iter()
            .find(|p| p.merchant_reference == merchant_reference)
            .cloned())
    }

    async fn list(
        &self,
        partner_id: Uuid,
        status: Option<PaymentStatus>,
        limit: i64,
        offset: i64,
    ) -> StoreResult<PaymentPage> {
        let items: Vec<Payment> = self
            .payments
            .read()
            .await
            .iter()
            .filter(|p| p.partner_id == partner_id)
            .filter(|p| status.map_or(true, |s| p.status == s))
            .cloned()
            .collect();
        Ok(Self::page(items, limit, offset))
    }

    async fn list_all_for_partner(&self, partner_id: Uuid) -> StoreResult<Vec<Payment>> {
        Ok(self
            .payments
            .read()
            .await
            .iter()
            .filter(|p| p.partner_id == partner_id)
            .cloned()
            .collect())
    }

    async fn list_with_webhook_activity(
        &self,
        partner_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> StoreResult<PaymentPage> {
        // most recent delivery activity first, matching the SQL ordering
        let mut items: Vec<Payment> = self
            .payments
            .read()
            .await
            .iter()
            .filter(|p| p.partner_id == partner_id && p.webhook_attempts > 0)
            .cloned()
            .collect();
        items.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        let total = items.len() as i64;
        let items = items
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect();
        Ok(PaymentPage { items, total })
    }
}

#[derive(Default)]
pub struct InMemoryRefundStore {
    refunds: RwLock<Vec<Refund>>,
}

impl InMemoryRefundStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RefundStore for InMemoryRefundStore {
    async fn insert(&self, refund: &Refund) -> StoreResult<()> {
        self.refunds.write().await.push(refund.clone());
        Ok(())
    }

    async fn list(&self, partner_id: Uuid, limit: i64, offset: i64) -> StoreResult<RefundPage> {
        let mut items: Vec<Refund> = self
            .refunds
            .read()
            .await
            .iter()
            .filter(|r| r.partner_id == partner_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let total = items.len() as i64;
        let items = items
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect();
        Ok(RefundPage { items, total })
    }

    async fn list_all_for_partner(&self, partner_id: Uuid) -> StoreResult<Vec<Refund>> {
        Ok(self
            .refunds
            .read()
            .await
            .iter()
            .filter(|r| r.partner_id == partner_id)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct InMemoryUsageLogStore {
    records: RwLock<Vec<UsageLogRecord>>,
}

impl InMemoryUsageLogStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn records(&self) -> Vec<UsageLogRecord> {
        self.records.read().await.clone()
    }
}

#[async_trait]
impl UsageLogStore for InMemoryUsageLogStore {
    async fn append(&self, record: UsageLogRecord) -> StoreResult<()> {
        self.records.write().await.push(record);
        Ok(())
    }
}
