//! Common test utilities for workflow engine integration tests.

#![allow(dead_code)]

use chrono::NaiveDate;
use rust_decimal::Decimal;
use service_core::cache::MemoryCache;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;
use workflow_service::config::EngineSettings;
use workflow_service::models::{
    Company, CreateCompany, CreateDeliveryNote, CreateInvoice, CreateOrder, CreateQuote,
    DeliveryItemDraft, Identity, InvoiceStatus, LineItemDraft, Role, Scope, ScopeCandidate,
};
use workflow_service::services::{
    ChainResolver, ConversionService, LifecycleService, ScopeResolver,
};
use workflow_service::store::{DocumentStore, MemoryStore};

/// Engine wired against in-process collaborators.
pub struct TestContext {
    pub store: Arc<dyn DocumentStore>,
    pub lifecycle: Arc<LifecycleService>,
    pub conversion: ConversionService,
    pub chain: ChainResolver,
    pub scope_resolver: ScopeResolver,
}

/// Create a test context with default engine settings.
pub fn setup() -> TestContext {
    setup_with(EngineSettings::default())
}

pub fn setup_with(settings: EngineSettings) -> TestContext {
    let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
    build_context(store, settings)
}

/// Wire the engine against a caller-supplied store (used to inject
/// misbehaving stores in numbering tests).
pub fn setup_with_store(store: Arc<dyn DocumentStore>, settings: EngineSettings) -> TestContext {
    build_context(store, settings)
}

fn build_context(store: Arc<dyn DocumentStore>, settings: EngineSettings) -> TestContext {
    // No-op after the first test in the process initializes it.
    service_core::observability::init_tracing("workflow-service", "warn");

    let cache = Arc::new(MemoryCache::new());
    let lifecycle = Arc::new(LifecycleService::new(
        store.clone(),
        cache,
        settings.clone(),
    ));
    let conversion = ConversionService::new(lifecycle.clone());
    let chain = ChainResolver::new(store.clone(), settings.chain_max_depth);
    let scope_resolver = ScopeResolver::new(store.clone());

    TestContext {
        store,
        lifecycle,
        conversion,
        chain,
        scope_resolver,
    }
}

/// A seeded tenant: one regular user, a customer company the user is a
/// member of, the tenant's own selling company, and a resolved scope.
pub struct TenantFixture {
    pub tenant_id: Uuid,
    pub identity: Identity,
    pub customer: Company,
    pub seller: Company,
    pub scope: Scope,
}

impl TestContext {
    pub async fn seed_tenant(&self) -> TenantFixture {
        let tenant_id = Uuid::new_v4();
        let identity = Identity {
            user_id: Uuid::new_v4(),
            role: Role::User,
            tenant_id: Some(tenant_id),
            active_tenant_id: None,
        };

        let customer = self
            .lifecycle
            .create_company(
                &identity,
                CreateCompany {
                    name: "Acme GmbH".into(),
                    email: Some("billing@acme.example".into()),
                    address: Some("1 Industrial Way".into()),
                    tax_id: Some("DE123456789".into()),
                },
            )
            .await
            .expect("seed customer company");
        let seller = self
            .lifecycle
            .create_company(
                &identity,
                CreateCompany {
                    name: "Northwind Trading".into(),
                    email: Some("sales@northwind.example".into()),
                    address: Some("2 Harbor St".into()),
                    tax_id: Some("DE987654321".into()),
                },
            )
            .await
            .expect("seed seller company");

        let scope = self
            .scope_resolver
            .resolve(&ScopeCandidate::from_path(customer.company_id), &identity)
            .await
            .expect("resolve seeded scope");

        TenantFixture {
            tenant_id,
            identity,
            customer,
            seller,
            scope,
        }
    }
}

pub fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::from_str(s).unwrap()
}

pub fn item(name: &str, quantity: &str, unit_price: &str) -> LineItemDraft {
    LineItemDraft::new(name, dec(quantity), dec(unit_price))
}

pub fn delivery_item(name: &str, quantity: &str, unit_price: &str) -> DeliveryItemDraft {
    DeliveryItemDraft {
        name: name.into(),
        description: None,
        quantity: dec(quantity),
        unit: "pcs".into(),
        unit_price: dec(unit_price),
    }
}

/// A single-item quote input: 2 × 10.00 at 19% tax.
pub fn quote_input(fixture: &TenantFixture) -> CreateQuote {
    CreateQuote {
        contact_id: None,
        seller_company_id: fixture.seller.company_id,
        status: None,
        issue_date: date("2025-01-15"),
        valid_until: Some(date("2025-02-15")),
        tax_rate: dec("19"),
        notes: Some("Net 30".into()),
        terms: None,
        items: vec![item("Widget", "2", "10")],
    }
}

pub fn order_input(fixture: &TenantFixture) -> CreateOrder {
    CreateOrder {
        contact_id: None,
        seller_company_id: fixture.seller.company_id,
        order_date: date("2025-01-20"),
        expected_delivery_date: None,
        purchase_order_number: None,
        tax_rate: Decimal::ZERO,
        notes: None,
        items: vec![item("Widget", "1", "100")],
    }
}

pub fn invoice_input(fixture: &TenantFixture, status: InvoiceStatus) -> CreateInvoice {
    CreateInvoice {
        contact_id: None,
        seller_company_id: fixture.seller.company_id,
        status: Some(status),
        issue_date: date("2025-01-20"),
        due_date: Some(date("2025-02-20")),
        tax_rate: dec("19"),
        vat_rate: None,
        currency: None,
        notes: None,
        items: vec![item("Service", "1", "100")],
    }
}

pub fn delivery_note_input(fixture: &TenantFixture) -> CreateDeliveryNote {
    CreateDeliveryNote {
        seller_company_id: fixture.seller.company_id,
        ship_date: None,
        shipping_address: Some("1 Industrial Way".into()),
        carrier: Some("DHL".into()),
        tracking_number: None,
        items: vec![delivery_item("Widget", "2", "10")],
    }
}
