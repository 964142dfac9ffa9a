// SPDX-License-Identifier: MIT

//! Points history filtering, pagination and reconciliation across
//! several point-moving engines.

use ecogrow::models::ledger::{LedgerDirection, LedgerQuery, PointsSource};
use ecogrow::models::Voucher;
use ecogrow::services::game::GameService;
use ecogrow::services::ledger::LedgerService;
use ecogrow::services::voucher::VoucherService;

mod common;
use common::{seed_user, test_db, test_notifier};

#[tokio::test]
async fn test_history_and_reconciliation_across_engines() {
    require_emulator!();

    let db = test_db().await;
    let game = GameService::new(db.clone(), test_notifier());
    let vouchers = VoucherService::new(db.clone());
    let ledger = LedgerService::new(db.clone());
    let user = seed_user(&db, "ledger-user-1", 0).await;
    let now = chrono::Utc::now();

    // Credit 20 through the game.
    let session = game.start_session(&user.id, now).await.unwrap();
    let fresh = db.get_user(&user.id).await.unwrap().unwrap();
    game.complete_session(&fresh, &session.id, now).await.unwrap();
    let fresh = db.get_user(&user.id).await.unwrap().unwrap();
    game.claim_reward(&fresh, &session.id, now).await.unwrap();

    // Debit 15 through a voucher.
    db.upsert_voucher(&Voucher {
        id: "voucher-ledger".to_string(),
        slug: "ledger-snack".to_string(),
        name: "Snack".to_string(),
        category: None,
        points_required: 15,
        stock: None,
        redeemed_count: 0,
        is_active: true,
        valid_from: None,
        valid_until: None,
    })
    .await
    .unwrap();
    vouchers.redeem(&user.id, "ledger-snack", now).await.unwrap();

    // Balance and ledger agree: 20 - 15.
    let reconciliation = ledger.reconcile(&user.id).await.unwrap();
    assert_eq!(reconciliation.balance, 5);
    assert_eq!(reconciliation.ledger_sum, 5);
    assert!(reconciliation.consistent);

    // Unfiltered history returns both entries, newest first.
    let page = ledger
        .history(&LedgerQuery::for_user(&user.id))
        .await
        .unwrap();
    assert_eq!(page.total, 2);
    assert_eq!(page.page_net, 5);

    // Source filter.
    let mut by_game = LedgerQuery::for_user(&user.id);
    by_game.sources = vec![PointsSource::Game];
    let page = ledger.history(&by_game).await.unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.entries[0].amount, 20);

    // Direction filter: debits only.
    let mut debits = LedgerQuery::for_user(&user.id);
    debits.direction = Some(LedgerDirection::Debit);
    let page = ledger.history(&debits).await.unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.entries[0].amount, -15);
    assert_eq!(page.entries[0].source, PointsSource::Voucher);

    // Pagination clamps: limit 1 splits the two entries.
    let mut paged = LedgerQuery::for_user(&user.id);
    paged.limit = 1;
    let first = ledger.history(&paged).await.unwrap();
    assert_eq!(first.entries.len(), 1);
    assert_eq!(first.total, 2);
    paged.page = 2;
    let second = ledger.history(&paged).await.unwrap();
    assert_eq!(second.entries.len(), 1);
    assert_ne!(first.entries[0].id, second.entries[0].id);
}

#[tokio::test]
async fn test_multi_source_filter() {
    require_emulator!();

    let db = test_db().await;
    let game = GameService::new(db.clone(), test_notifier());
    let ledger = LedgerService::new(db.clone());
    let user = seed_user(&db, "ledger-user-2", 0).await;
    let now = chrono::Utc::now();

    let session = game.start_session(&user.id, now).await.unwrap();
    let fresh = db.get_user(&user.id).await.unwrap().unwrap();
    game.complete_session(&fresh, &session.id, now).await.unwrap();
    let fresh = db.get_user(&user.id).await.unwrap().unwrap();
    game.claim_reward(&fresh, &session.id, now).await.unwrap();

    let mut query = LedgerQuery::for_user(&user.id);
    query.sources = vec![PointsSource::Game, PointsSource::Tree];
    let page = ledger.history(&query).await.unwrap();
    assert_eq!(page.total, 1);

    query.sources = vec![PointsSource::Tree, PointsSource::Voucher];
    let page = ledger.history(&query).await.unwrap();
    assert_eq!(page.total, 0);
}
