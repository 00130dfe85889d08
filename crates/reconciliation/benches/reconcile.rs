use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use chrono::{Duration, Utc};
use stonetrade_core::{AggregateId, ClientId, Party, SellerId, TenantId};
use stonetrade_delegations::{AllocateStock, DelegationId};
use stonetrade_lots::{LotId, RegisterLot};
use stonetrade_offers::{AccessToken, AdvanceOffer, OfferId, OfferTransition};
use stonetrade_reconciliation::{FloorPricePolicy, Ledgers, OfferRequest};

/// Ledgers with `lot_count` lots, one delegation per lot and `offers_per_lot`
/// offers spread over every status.
fn populated_ledgers(lot_count: usize, offers_per_lot: usize) -> Ledgers {
    let tenant_id = TenantId::new();
    let now = Utc::now();
    let mut ledgers = Ledgers::new();
    let transitions: [&[OfferTransition]; 5] = [
        &[],
        &[OfferTransition::RequestReservation],
        &[OfferTransition::RequestReservation, OfferTransition::ApproveReservation],
        &[OfferTransition::FinalizeSale],
        &[OfferTransition::Cancel],
    ];

    for _ in 0..lot_count {
        let lot_id = LotId::new(AggregateId::new());
        ledgers
            .register_lot(RegisterLot {
                tenant_id,
                lot_id,
                code: format!("BENCH-{lot_id}"),
                total: (offers_per_lot as u64) * 4,
                base_cost: 3_000,
                floor_price: 5_000,
                occurred_at: now,
            })
            .unwrap();

        let delegation_id = DelegationId::new(AggregateId::new());
        ledgers
            .create_delegation(&AllocateStock {
                tenant_id,
                delegation_id,
                lot_id,
                seller_id: SellerId::new(),
                quantity: offers_per_lot as u64,
                agreed_min_price: 4_500,
                occurred_at: now,
            })
            .unwrap();

        for i in 0..offers_per_lot {
            let offer_id = OfferId::new(AggregateId::new());
            ledgers
                .place_offer(
                    OfferRequest {
                        tenant_id,
                        offer_id,
                        lot_id,
                        delegation_id: (i % 2 == 0).then_some(delegation_id),
                        client_id: ClientId::new(),
                        client_name: "Bench Client".to_string(),
                        final_price: 6_000,
                        quantity: 1,
                        access_token: AccessToken::generate(),
                        occurred_at: now,
                        expires_at: now + Duration::days(30),
                    },
                    FloorPricePolicy::Warn,
                )
                .unwrap();

            for transition in transitions[i % transitions.len()] {
                ledgers
                    .advance_offer(AdvanceOffer {
                        tenant_id,
                        offer_id,
                        transition: *transition,
                        actor: Party::Industry,
                        occurred_at: now,
                    })
                    .unwrap();
            }
        }
    }

    ledgers
}

fn bench_reconcile(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconcile");

    for (lots, offers) in [(10, 10), (100, 10), (100, 100)] {
        let ledgers = populated_ledgers(lots, offers);
        group.throughput(Throughput::Elements((lots * offers) as u64));
        group.bench_with_input(
            BenchmarkId::new("strict", format!("{lots}x{offers}")),
            &ledgers,
            |b, ledgers| {
                b.iter(|| black_box(ledgers.reconcile().unwrap()));
            },
        );
    }

    group.finish();
}

fn bench_kpis(c: &mut Criterion) {
    let ledgers = populated_ledgers(100, 100);
    let reconciliation = ledgers.reconcile().unwrap();

    c.bench_function("kpis_industry", |b| {
        b.iter(|| black_box(reconciliation.kpis(black_box(Party::Industry))));
    });
}

fn bench_place_offer(c: &mut Criterion) {
    let ledgers = populated_ledgers(100, 10);
    let lot = ledgers.lots().next().unwrap();
    let (tenant_id, lot_id) = (lot.tenant_id().unwrap(), lot.id_typed());
    let now = Utc::now();

    c.bench_function("place_offer_on_working_copy", |b| {
        b.iter(|| {
            let mut working = ledgers.clone();
            black_box(
                working
                    .place_offer(
                        OfferRequest {
                            tenant_id,
                            offer_id: OfferId::new(AggregateId::new()),
                            lot_id,
                            delegation_id: None,
                            client_id: ClientId::new(),
                            client_name: "Bench Client".to_string(),
                            final_price: 6_000,
                            quantity: 1,
                            access_token: AccessToken::generate(),
                            occurred_at: now,
                            expires_at: now + Duration::days(30),
                        },
                        FloorPricePolicy::Warn,
                    )
                    .unwrap(),
            )
        });
    });
}

criterion_group!(benches, bench_reconcile, bench_kpis, bench_place_offer);
criterion_main!(benches);
