use std::collections::BTreeMap;
use std::sync::Arc;

use checkout::{
    Cart, CartLine, CatalogService, CheckoutService, InMemoryPaymentGateway, ListProduct,
    PaymentInitiation, PaymentVerification, Secret, SignatureVerifier, UnconfiguredGateway,
};
use common::AggregateId;
use criterion::{Criterion, criterion_group, criterion_main};
use domain::{Aggregate, Money, ProductKind, Requester, Role, UserId};
use event_store::InMemoryEventStore;

fn list_digital(
    rt: &tokio::runtime::Runtime,
    store: &InMemoryEventStore,
    vendor: &Requester,
) -> AggregateId {
    let catalog = CatalogService::new(store.clone());
    rt.block_on(async {
        catalog
            .list_product(
                vendor,
                ListProduct {
                    name: "Bench Brushes".to_string(),
                    kind: ProductKind::Digital,
                    price: Money::from_rupees(250),
                    stock: 0,
                    asset_url: Some("https://cdn.example/brushes.zip".to_string()),
                },
            )
            .await
            .unwrap()
            .id()
            .unwrap()
    })
}

fn cart(product_id: AggregateId) -> Cart {
    Cart {
        lines: vec![CartLine {
            product_id,
            quantity: 1,
            options: BTreeMap::new(),
        }],
        shipping_address: None,
    }
}

fn bench_direct_checkout(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryEventStore::new();
    let vendor = Requester::new(UserId::new(), Role::Vendor);
    let buyer = Requester::new(UserId::new(), Role::Customer);
    let product_id = list_digital(&rt, &store, &vendor);
    let service = CheckoutService::new(
        store,
        Arc::new(UnconfiguredGateway),
        SignatureVerifier::default(),
    );
    let cart = cart(product_id);

    c.bench_function("checkout/direct_create_order", |b| {
        b.iter(|| rt.block_on(async { service.create_order(&buyer, &cart).await.unwrap() }))
    });
}

fn bench_gateway_checkout(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryEventStore::new();
    let vendor = Requester::new(UserId::new(), Role::Vendor);
    let buyer = Requester::new(UserId::new(), Role::Customer);
    let product_id = list_digital(&rt, &store, &vendor);
    let verifier = SignatureVerifier::new(Some(Secret::new("bench_secret".to_string())), None);
    let service = CheckoutService::new(
        store,
        Arc::new(InMemoryPaymentGateway::new()),
        verifier.clone(),
    );
    let cart = cart(product_id);

    c.bench_function("checkout/initiate_and_verify", |b| {
        b.iter(|| {
            rt.block_on(async {
                let PaymentInitiation::Gateway(params) =
                    service.initiate_payment(&buyer, &cart).await.unwrap()
                else {
                    unreachable!("in-memory gateway is available");
                };
                let verification = PaymentVerification {
                    signature: verifier
                        .sign_payment(&params.gateway_order_id, "pay_bench")
                        .unwrap(),
                    gateway_order_id: params.gateway_order_id,
                    gateway_payment_id: "pay_bench".to_string(),
                    original_payload: None,
                };
                service.verify_payment(&buyer, &verification).await.unwrap()
            })
        })
    });
}

criterion_group!(benches, bench_direct_checkout, bench_gateway_checkout);
criterion_main!(benches);
