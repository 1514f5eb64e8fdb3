//! Scope guard tests: tenant equality, company membership, candidate
//! extraction, and cross-scope document isolation.

mod common;

use common::setup;
use service_core::error::EngineError;
use uuid::Uuid;
use workflow_service::models::{Identity, Role, ScopeCandidate};

#[tokio::test]
async fn missing_company_candidate_is_rejected() {
    let ctx = setup();
    let fixture = ctx.seed_tenant().await;

    let err = ctx
        .scope_resolver
        .resolve(&ScopeCandidate::default(), &fixture.identity)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::MissingScope(_)));
}

#[tokio::test]
async fn identity_without_tenant_is_rejected() {
    let ctx = setup();
    let fixture = ctx.seed_tenant().await;

    let tenantless = Identity {
        user_id: fixture.identity.user_id,
        role: Role::User,
        tenant_id: None,
        active_tenant_id: None,
    };
    let err = ctx
        .scope_resolver
        .resolve(
            &ScopeCandidate::from_path(fixture.customer.company_id),
            &tenantless,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::UnauthorizedTenant(_)));
}

#[tokio::test]
async fn unknown_company_is_not_found() {
    let ctx = setup();
    let fixture = ctx.seed_tenant().await;

    let err = ctx
        .scope_resolver
        .resolve(&ScopeCandidate::from_path(Uuid::new_v4()), &fixture.identity)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
}

#[tokio::test]
async fn company_in_another_tenant_is_a_scope_mismatch() {
    let ctx = setup();
    let fixture_a = ctx.seed_tenant().await;
    let fixture_b = ctx.seed_tenant().await;

    let err = ctx
        .scope_resolver
        .resolve(
            &ScopeCandidate::from_path(fixture_b.customer.company_id),
            &fixture_a.identity,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::ScopeMismatch(_)));
}

#[tokio::test]
async fn non_member_is_rejected_but_admins_bypass_membership() {
    let ctx = setup();
    let fixture = ctx.seed_tenant().await;

    // A second user in the same tenant who never joined the company.
    let outsider = Identity {
        user_id: Uuid::new_v4(),
        role: Role::User,
        tenant_id: Some(fixture.tenant_id),
        active_tenant_id: None,
    };
    let err = ctx
        .scope_resolver
        .resolve(
            &ScopeCandidate::from_path(fixture.customer.company_id),
            &outsider,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::ScopeMismatch(_)));

    let admin = Identity {
        role: Role::TenantAdmin,
        ..outsider
    };
    let scope = ctx
        .scope_resolver
        .resolve(
            &ScopeCandidate::from_path(fixture.customer.company_id),
            &admin,
        )
        .await
        .unwrap();
    assert_eq!(scope.company_id(), fixture.customer.company_id);
    assert_eq!(scope.tenant_id(), fixture.tenant_id);
}

#[tokio::test]
async fn admins_never_bypass_tenant_equality() {
    let ctx = setup();
    let fixture_a = ctx.seed_tenant().await;
    let fixture_b = ctx.seed_tenant().await;

    let admin = Identity {
        user_id: Uuid::new_v4(),
        role: Role::TenantAdmin,
        tenant_id: Some(fixture_a.tenant_id),
        active_tenant_id: None,
    };
    let err = ctx
        .scope_resolver
        .resolve(
            &ScopeCandidate::from_path(fixture_b.customer.company_id),
            &admin,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::ScopeMismatch(_)));
}

#[tokio::test]
async fn documents_are_invisible_outside_their_scope() {
    let ctx = setup();
    let fixture_a = ctx.seed_tenant().await;
    let fixture_b = ctx.seed_tenant().await;

    let quote = ctx
        .lifecycle
        .create_quote(
            &fixture_a.scope,
            &fixture_a.identity,
            common::quote_input(&fixture_a),
        )
        .await
        .unwrap();

    // Another tenant's scope cannot read it.
    let err = ctx
        .lifecycle
        .get_quote(&fixture_b.scope, quote.quote_id)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));

    // A sibling company within the same tenant cannot read it either.
    let sibling_scope = ctx
        .scope_resolver
        .resolve(
            &ScopeCandidate::from_path(fixture_a.seller.company_id),
            &fixture_a.identity,
        )
        .await
        .unwrap();
    let err = ctx
        .lifecycle
        .get_quote(&sibling_scope, quote.quote_id)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
}

#[tokio::test]
async fn candidate_priority_prefers_the_route_parameter() {
    let ctx = setup();
    let fixture = ctx.seed_tenant().await;

    let candidate = ScopeCandidate {
        path: Some(fixture.customer.company_id),
        query: None,
        header: None,
        body: Some(Uuid::new_v4()),
    };
    let scope = ctx
        .scope_resolver
        .resolve(&candidate, &fixture.identity)
        .await
        .unwrap();
    assert_eq!(scope.company_id(), fixture.customer.company_id);
}
