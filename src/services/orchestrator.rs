//! Payment creation state machine.
//!
//! One entry point, `create_payment`, owning validation, idempotency, the
//! sandbox short-circuit, and the live provider dispatch. The binding rule
//! for live charges is pre-insert-before-provider-call: the row, carrying a
//! locally generated merchant reference, is persisted before any outbound
//! request, so an asynchronous provider notification racing the synchronous
//! response can always find it.

use crate::database::error::StoreError;
use crate::database::partner_store::Partner;
use crate::database::payment_store::{Payment, PaymentStore};
use crate::error::{AppError, AppResult};
use crate::middleware::auth::PartnerContext;
use crate::providers::adapter::ProviderAdapter;
use crate::providers::error::ProviderError;
use crate::providers::sandbox;
use crate::providers::types::{
    ChargeOutcome, ChargeRequest, PaymentMethod, PaymentStatus, ProviderFamily,
};
use crate::services::webhooks::WebhookDispatcher;
use chrono::Utc;
use regex::Regex;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, OnceLock};
use uuid::Uuid;

const MAX_ORDER_REFERENCE_LEN: usize = 64;

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email pattern"))
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePaymentRequest {
    #[serde(alias = "orderReference")]
    pub order_reference: String,
    pub amount: Decimal,
    pub currency: Option<String>,
    pub method: String,
    #[serde(alias = "customerName")]
    pub customer_name: String,
    #[serde(alias = "customerEmail")]
    pub customer_email: String,
    #[serde(alias = "customerPhone")]
    pub customer_phone: Option<String>,
    #[serde(alias = "returnUrl")]
    pub return_url: Option<String>,
    #[serde(alias = "cancelUrl")]
    pub cancel_url: Option<String>,
    #[serde(default)]
    pub metadata: Option<JsonValue>,
}

struct ValidatedRequest {
    order_reference: String,
    amount: Decimal,
    currency: String,
    method: PaymentMethod,
    customer_name: String,
    customer_email: String,
    customer_phone: Option<String>,
    return_url: Option<String>,
    cancel_url: Option<String>,
    metadata: JsonValue,
}

pub struct PaymentOrchestrator {
    payments: Arc<dyn PaymentStore>,
    adapters: HashMap<ProviderFamily, Arc<dyn ProviderAdapter>>,
    dispatcher: Arc<WebhookDispatcher>,
    base_currency: String,
}

impl PaymentOrchestrator {
    pub fn new(
        payments: Arc<dyn PaymentStore>,
        adapters: HashMap<ProviderFamily, Arc<dyn ProviderAdapter>>,
        dispatcher: Arc<WebhookDispatcher>,
        base_currency: String,
    ) -> Self {
        Self {
            payments,
            adapters,
            dispatcher,
            base_currency,
        }
    }

    pub async fn create_payment(
        &self,
        ctx: &PartnerContext,
        request: CreatePaymentRequest,
    ) -> AppResult<Payment> {
        let validated = self.validate(request)?;
        let partner = &ctx.partner;

        // Idempotency: one payment per (partner, order_reference), ever.
        if let Some(existing) = self
            .payments
            .find_by_order_reference(partner.id, &validated.order_reference)
            .await?
        {
            return Err(AppError::DuplicateOrderReference {
                order_reference: validated.order_reference,
                existing_id: existing.id,
                existing_status: existing.status,
            });
        }

        let payment = new_payment_row(partner, &validated, ctx.sandbox);

        if ctx.sandbox {
            self.create_sandbox(partner, payment).await
        } else {
            self.create_live(partner, payment, &validated).await
        }
    }

    fn validate(&self, request: CreatePaymentRequest) -> AppResult<ValidatedRequest> {
        let order_reference = request.order_reference.trim().to_string();
        if order_reference.is_empty() {
            return Err(AppError::validation_field(
                "order reference is required",
                "order_reference",
            ));
        }
        if order_reference.len() > MAX_ORDER_REFERENCE_LEN {
            return Err(AppError::validation_field(
                format!(
                    "order reference exceeds {} characters",
                    MAX_ORDER_REFERENCE_LEN
                ),
                "order_reference",
            ));
        }

        if request.amount <= Decimal::ZERO {
            return Err(AppError::validation_field(
                "amount must be greater than zero",
                "amount",
            ));
        }

        let method = PaymentMethod::from_str(&request.method).map_err(|_| {
            AppError::validation_field(
                format!("unknown payment method '{}'", request.method),
                "method",
            )
        })?;

        let customer_name = request.customer_name.trim().to_string();
        if customer_name.is_empty() {
            return Err(AppError::validation_field(
                "customer name is required",
                "customer_name",
            ));
        }

        let customer_email = request.customer_email.trim().to_string();
        if !email_regex().is_match(&customer_email) {
            return Err(AppError::validation_field(
                "customer email is not a valid address",
                "customer_email",
            ));
        }

        let customer_phone = request
            .customer_phone
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string);
        if method.requires_phone() && customer_phone.is_none() {
            return Err(AppError::validation_field(
                format!("a customer phone number is required for {}", method),
                "customer_phone",
            ));
        }

        let currency = request
            .currency
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_uppercase)
            .unwrap_or_else(|| self.base_currency.clone());
        if let Some(required) = method.required_currency() {
            if currency != required {
                return Err(AppError::validation_field(
                    format!("{} only accepts {}", method, required),
                    "currency",
                ));
            }
        }

        Ok(ValidatedRequest {
            order_reference,
            amount: request.amount,
            currency,
            method,
            customer_name,
            customer_email,
            customer_phone,
            return_url: request.return_url,
            cancel_url: request.cancel_url,
            metadata: request.metadata.unwrap_or_else(|| json!({})),
        })
    }

    /// Sandbox resolution: no live processor is contacted. Push methods
    /// resolve from the reserved-number table; everything else stays
    /// pending with synthetic provider artifacts.
    async fn create_sandbox(&self, partner: &Partner, mut payment: Payment) -> AppResult<Payment> {
        let status = if payment.method.requires_phone() {
            payment
                .customer_phone
                .as_deref()
                .map(sandbox::resolve_push_outcome)
                .unwrap_or(PaymentStatus::Pending)
        } else {
            PaymentStatus::Pending
        };

        let transaction_id = sandbox::synthetic_transaction_id(partner.id, &payment.order_reference);
        payment.status = status;
        payment.provider_transaction_id = Some(transaction_id.clone());
        if payment.method.is_reference_instrument() {
            let (entity, number) =
                sandbox::synthetic_reference(partner.id, &payment.order_reference);
            payment.reference_entity = Some(entity);
            payment.reference_number = Some(number);
        }
        if payment.method == PaymentMethod::Card {
            payment.client_secret = Some(format!("{}_secret", transaction_id));
        }
        match status {
            PaymentStatus::Completed => payment.completed_at = Some(Utc::now()),
            PaymentStatus::Failed => {
                payment.provider_error = Some("sandbox: reserved failure number".to_string());
            }
            _ => {}
        }

        self.insert_guarded(partner, payment.clone()).await?;

        tracing::info!(
            payment_id = %payment.id,
            status = %payment.status,
            "sandbox payment resolved"
        );
        if payment.status == PaymentStatus::Completed {
            self.dispatcher.dispatch_payment_event(partner, &payment);
        }
        Ok(payment)
    }

    /// Live dispatch: insert the pending row, then charge. A provider
    /// failure marks the row failed before the error surfaces, so the
    /// partner always has a durable record to query.
    async fn create_live(
        &self,
        partner: &Partner,
        mut payment: Payment,
        validated: &ValidatedRequest,
    ) -> AppResult<Payment> {
        let family = payment.method.family();
        let adapter = self
            .adapters
            .get(&family)
            .ok_or(ProviderError::NotConfigured { family })?;

        self.insert_guarded(partner, payment.clone()).await?;

        let charge = ChargeRequest {
            merchant_reference: payment.merchant_reference.clone(),
            amount: validated.amount,
            currency: validated.currency.clone(),
            method: validated.method,
            customer_name: validated.customer_name.clone(),
            customer_email: validated.customer_email.clone(),
            customer_phone: validated.customer_phone.clone(),
            return_url: validated.return_url.clone(),
            cancel_url: validated.cancel_url.clone(),
        };

        match adapter.create_charge(charge).await {
            Ok(outcome) => {
                apply_outcome(&mut payment, outcome);
                self.payments.update(&payment).await?;
                if payment.status == PaymentStatus::Completed {
                    self.dispatcher.dispatch_payment_event(partner, &payment);
                }
                Ok(payment)
            }
            Err(err) => {
                payment.status = PaymentStatus::Failed;
                payment.provider_error = Some(err.to_string());
                payment.updated_at = Utc::now();
                if let Err(update_err) = self.payments.update(&payment).await {
                    tracing::error!(
                        payment_id = %payment.id,
                        error = %update_err,
                        "failed to mark payment failed after provider error"
                    );
                }
                Err(AppError::Provider(err))
            }
        }
    }

    /// Insert that converts a uniqueness violation into the conflict error,
    /// covering the race where two identical creates pass the lookup.
    async fn insert_guarded(&self, partner: &Partner, payment: Payment) -> AppResult<()> {
        match self.payments.insert(&payment).await {
            Ok(()) => Ok(()),
            Err(StoreError::Duplicate { .. }) => {
                let existing = self
                    .payments
                    .find_by_order_reference(partner.id, &payment.order_reference)
                    .await?
                    .ok_or_else(|| {
                        AppError::internal("duplicate insert but no existing payment found")
                    })?;
                Err(AppError::DuplicateOrderReference {
                    order_reference: payment.order_reference,
                    existing_id: existing.id,
                    existing_status: existing.status,
                })
            }
            Err(err) => Err(err.into()),
        }
    }
}

fn new_payment_row(partner: &Partner, validated: &ValidatedRequest, sandbox: bool) -> Payment {
    let now = Utc::now();
    Payment {
        id: Uuid::new_v4(),
        partner_id: partner.id,
        order_reference: validated.order_reference.clone(),
        amount: validated.amount,
        currency: validated.currency.clone(),
        method: validated.method,
        status: PaymentStatus::Pending,
        customer_name: validated.customer_name.clone(),
        customer_email: validated.customer_email.clone(),
        customer_phone: validated.customer_phone.clone(),
        merchant_reference: format!("PG-{}", Uuid::new_v4().simple()),
        provider_transaction_id: None,
        reference_entity: None,
        reference_number: None,
        client_secret: None,
        sandbox,
        metadata: validated.metadata.clone(),
        provider_error: None,
        webhook_attempts: 0,
        webhook_last_event: None,
        webhook_last_error: None,
        webhook_history: json!([]),
        expires_at: now + validated.method.expiry_horizon(),
        completed_at: None,
        created_at: now,
        updated_at: now,
    }
}

fn apply_outcome(payment: &mut Payment, outcome: ChargeOutcome) {
    payment.status = outcome.status;
    if outcome.provider_transaction_id.is_some() {
        payment.provider_transaction_id = outcome.provider_transaction_id;
    }
    if let Some(reference) = outcome.reference {
        payment.reference_entity = Some(reference.entity);
        payment.reference_number = Some(reference.number);
    }
    if outcome.client_secret.is_some() {
        payment.client_secret = outcome.client_secret;
    }
    if let Some(provider_data) = outcome.provider_data {
        if let Some(map) = payment.metadata.as_object_mut() {
            map.insert("providerResponse".to_string(), provider_data);
        }
    }
    if payment.status == PaymentStatus::Completed {
        payment.completed_at = Some(Utc::now());
    }
    payment.updated_at = Utc::now();
}

/// Human instructions shaped by method class, returned alongside the
/// payment view on creation.
pub fn instructions_for(payment: &Payment) -> String {
    let minutes = payment.method.expiry_horizon().num_minutes();
    match payment.method {
        PaymentMethod::MobileMoneyPush | PaymentMethod::PushToPhoneEu => {
            let phone = payment.customer_phone.as_deref().unwrap_or("the customer's phone");
            format!(
                "A payment prompt was sent to {}. The customer must confirm within {} minutes.",
                phone, minutes
            )
        }
        PaymentMethod::BankReference | PaymentMethod::MultiBankReferenceEu => {
            match (&payment.reference_entity, &payment.reference_number) {
                (Some(entity), Some(number)) => format!(
                    "Pay at any ATM or banking app using entity {} and reference {}. \
                     The reference expires in {} hours.",
                    entity,
                    number,
                    minutes / 60
                ),
                _ => "A payment reference is being issued.".to_string(),
            }
        }
        PaymentMethod::Card => {
            "Complete the card checkout using the client secret.".to_string()
        }
    }
}
