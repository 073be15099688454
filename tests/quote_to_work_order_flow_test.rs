//! End-to-end lifecycle: quote → conversion → issue → archive, with the
//! pricing, inventory, and cascade effects asserted at every step.

use std::sync::Arc;

use chrono::{Duration, Utc};
use glassworks_core::bootstrap::{Collections, CoreServices};
use glassworks_core::config::AppConfig;
use glassworks_core::errors::CoreError;
use glassworks_core::models::{
    Dimensions, InventoryItem, ItemKind, LineItem, MaterialUsage, QuoteStatus,
    StockTransactionType, WorkOrderStatus,
};
use glassworks_core::tenant::FixedTenant;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

fn start_services(tenant: Uuid) -> CoreServices {
    glassworks_core::logging::init("info");
    CoreServices::start(
        &AppConfig::default(),
        Arc::new(FixedTenant(tenant)),
        Collections::in_memory(),
        Vec::new(),
    )
}

async fn seed_glass(services: &CoreServices, tenant: Uuid, quantity: Decimal) -> InventoryItem {
    let item = InventoryItem {
        id: Uuid::new_v4(),
        tenant_id: tenant,
        name: "float glass 4mm".into(),
        code: "GL-4".into(),
        quantity,
        min_quantity: dec!(5),
        unit: "m2".into(),
        price: dec!(12),
        kind: ItemKind::Glass,
        glass_thickness_mm: Some(dec!(4)),
        created_at: Utc::now(),
    };
    services
        .collections
        .inventory_items
        .reconcile(tenant, vec![item.clone()])
        .await
        .unwrap();
    item
}

/// One glass line: 2 m² per unit at 10 €/m², three units, consuming 2 units
/// of the backing material per piece.
fn glass_line(material_id: Uuid) -> LineItem {
    LineItem {
        product_id: Some(Uuid::new_v4()),
        service_id: None,
        quantity: dec!(3),
        dimensions: Dimensions {
            width_mm: dec!(2000),
            height_mm: dec!(1000),
            area_m2: dec!(2),
        },
        unit_price: dec!(10),
        total_price: dec!(60),
        materials: vec![MaterialUsage {
            inventory_item_id: material_id,
            quantity: dec!(2),
            process_steps: vec![],
        }],
        process_steps: vec![],
    }
}

#[tokio::test]
async fn full_flow_from_quote_to_archive() {
    let tenant = Uuid::new_v4();
    let services = start_services(tenant);
    let glass = seed_glass(&services, tenant, dec!(20)).await;

    // Quote: 2 m² × 3 pcs × 10 €/m² = 60, VAT 25% → 75.
    let quote = services
        .quotes
        .create_quote(
            Uuid::new_v4(),
            vec![glass_line(glass.id)],
            Utc::now() + Duration::days(14),
        )
        .await
        .unwrap();
    assert_eq!(quote.status, QuoteStatus::Created);
    assert_eq!(quote.totals.product_amount, dec!(60));
    assert_eq!(quote.totals.vat_amount, dec!(15));
    assert_eq!(quote.totals.grand_total, dec!(75));

    // Conversion: draft order freezing the quote's grand total.
    let order = services
        .quotes
        .convert_to_work_order(quote.id)
        .await
        .unwrap();
    assert_eq!(order.status, WorkOrderStatus::Draft);
    assert_eq!(order.quote_id, Some(quote.id));
    assert_eq!(order.current_total, dec!(75));
    assert_eq!(order.original_quote_total, dec!(75));

    let quote = services.quotes.get(quote.id).await.unwrap();
    assert_eq!(quote.status, QuoteStatus::Converted);
    assert_eq!(quote.converted_to_work_order_id, Some(order.id));

    // A second conversion is guarded off.
    let err = services
        .quotes
        .convert_to_work_order(quote.id)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::GuardViolation(_)));

    // Issue: 2 × 3 = 6 units leave stock, one `out` row.
    let order = services
        .work_orders
        .issue(order.id, WorkOrderStatus::Pending)
        .await
        .unwrap();
    assert_eq!(order.status, WorkOrderStatus::Pending);

    let items = services.collections.inventory_items.view().await;
    assert_eq!(items[0].quantity, dec!(14));

    let ledger = services.collections.stock_transactions.view().await;
    let outs: Vec<_> = ledger
        .iter()
        .filter(|t| t.kind == StockTransactionType::Out)
        .collect();
    assert_eq!(outs.len(), 1);
    assert_eq!(outs[0].quantity, dec!(6));
    assert_eq!(outs[0].previous_quantity, dec!(20));
    assert_eq!(outs[0].new_quantity, dec!(14));
    assert_eq!(outs[0].work_order_id, Some(order.id));

    // Delivery note for the issued order.
    let note = services
        .work_orders
        .create_delivery_note(order.id)
        .await
        .unwrap();
    assert_eq!(note.note_number, "DN-0001");

    // Archive: one `return` row of 6, quantity back to pre-issue, cascades
    // to the delivery note and the quote.
    let outcome = services.work_orders.archive(order.id).await.unwrap();
    assert_eq!(outcome.restored_items, 1);
    assert!(outcome.cascade_failures.is_empty());

    let items = services
        .collections
        .inventory_items
        .load(tenant)
        .await
        .unwrap();
    assert_eq!(items[0].quantity, dec!(20));

    let ledger = services
        .collections
        .stock_transactions
        .load(tenant)
        .await
        .unwrap();
    let returns: Vec<_> = ledger
        .iter()
        .filter(|t| t.kind == StockTransactionType::Return)
        .collect();
    assert_eq!(returns.len(), 1);
    assert_eq!(returns[0].quantity, dec!(6));
    assert_eq!(returns[0].work_order_id, Some(order.id));

    let quote = services.quotes.get(quote.id).await.unwrap();
    assert_eq!(quote.status, QuoteStatus::Archived);
    let notes = services
        .collections
        .delivery_notes
        .load(tenant)
        .await
        .unwrap();
    assert_eq!(
        notes[0].status,
        glassworks_core::models::DeliveryNoteStatus::Archived
    );

    services.shutdown().await;
}

#[tokio::test]
async fn rejecting_an_accepted_quote_is_guarded_without_state_change() {
    let tenant = Uuid::new_v4();
    let services = start_services(tenant);
    let glass = seed_glass(&services, tenant, dec!(20)).await;

    let quote = services
        .quotes
        .create_quote(
            Uuid::new_v4(),
            vec![glass_line(glass.id)],
            Utc::now() + Duration::days(14),
        )
        .await
        .unwrap();
    services.quotes.accept(quote.id).await.unwrap();

    let err = services.quotes.reject(quote.id).await.unwrap_err();
    assert!(matches!(err, CoreError::GuardViolation(_)));
    assert_eq!(
        services.quotes.get(quote.id).await.unwrap().status,
        QuoteStatus::Accepted
    );

    services.shutdown().await;
}

#[tokio::test]
async fn expired_quotes_only_archive() {
    let tenant = Uuid::new_v4();
    let services = start_services(tenant);
    let glass = seed_glass(&services, tenant, dec!(20)).await;

    let quote = services
        .quotes
        .create_quote(
            Uuid::new_v4(),
            vec![glass_line(glass.id)],
            Utc::now() - Duration::days(1),
        )
        .await
        .unwrap();

    for result in [
        services.quotes.accept(quote.id).await,
        services.quotes.reject(quote.id).await,
        services
            .quotes
            .convert_to_work_order(quote.id)
            .await
            .map(|_| quote.clone()),
    ] {
        assert!(matches!(result.unwrap_err(), CoreError::GuardViolation(_)));
    }

    // The observed expiry was persisted on the first guarded attempt.
    assert_eq!(
        services.quotes.get(quote.id).await.unwrap().status,
        QuoteStatus::Expired
    );

    // Archiving still goes through.
    services.quotes.archive(quote.id).await.unwrap();
    assert_eq!(
        services.quotes.get(quote.id).await.unwrap().status,
        QuoteStatus::Archived
    );

    services.shutdown().await;
}

#[tokio::test]
async fn reopen_deletes_the_draft_order_and_requires_confirmation() {
    let tenant = Uuid::new_v4();
    let services = start_services(tenant);
    let glass = seed_glass(&services, tenant, dec!(20)).await;

    let quote = services
        .quotes
        .create_quote(
            Uuid::new_v4(),
            vec![glass_line(glass.id)],
            Utc::now() + Duration::days(14),
        )
        .await
        .unwrap();
    let order = services
        .quotes
        .convert_to_work_order(quote.id)
        .await
        .unwrap();

    // Unconfirmed reopen is refused outright.
    let err = services.quotes.reopen(quote.id, false).await.unwrap_err();
    assert!(matches!(err, CoreError::GuardViolation(_)));

    let reopened = services.quotes.reopen(quote.id, true).await.unwrap();
    assert_eq!(reopened.status, QuoteStatus::Created);
    assert_eq!(reopened.converted_to_work_order_id, None);
    assert!(services.work_orders.get(order.id).await.is_err());

    // The reopened quote can be converted again.
    services
        .quotes
        .convert_to_work_order(quote.id)
        .await
        .unwrap();

    services.shutdown().await;
}

#[tokio::test]
async fn reopen_is_refused_once_the_order_left_draft() {
    let tenant = Uuid::new_v4();
    let services = start_services(tenant);
    let glass = seed_glass(&services, tenant, dec!(20)).await;

    let quote = services
        .quotes
        .create_quote(
            Uuid::new_v4(),
            vec![glass_line(glass.id)],
            Utc::now() + Duration::days(14),
        )
        .await
        .unwrap();
    let order = services
        .quotes
        .convert_to_work_order(quote.id)
        .await
        .unwrap();
    services
        .work_orders
        .issue(order.id, WorkOrderStatus::InProgress)
        .await
        .unwrap();

    let err = services.quotes.reopen(quote.id, true).await.unwrap_err();
    assert!(matches!(err, CoreError::GuardViolation(_)));
    assert_eq!(
        services.quotes.get(quote.id).await.unwrap().status,
        QuoteStatus::Converted
    );

    services.shutdown().await;
}

#[tokio::test]
async fn item_edits_are_locked_after_created() {
    let tenant = Uuid::new_v4();
    let services = start_services(tenant);
    let glass = seed_glass(&services, tenant, dec!(20)).await;

    let quote = services
        .quotes
        .create_quote(
            Uuid::new_v4(),
            vec![glass_line(glass.id)],
            Utc::now() + Duration::days(14),
        )
        .await
        .unwrap();

    // Editable while created: totals follow the items.
    let mut bigger = glass_line(glass.id);
    bigger.quantity = dec!(4);
    let updated = services
        .quotes
        .update_items(quote.id, vec![bigger])
        .await
        .unwrap();
    assert_eq!(updated.totals.product_amount, dec!(80));
    assert_eq!(updated.totals.grand_total, dec!(100));

    services.quotes.accept(quote.id).await.unwrap();
    let err = services
        .quotes
        .update_items(quote.id, vec![glass_line(glass.id)])
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::GuardViolation(_)));

    services.shutdown().await;
}
