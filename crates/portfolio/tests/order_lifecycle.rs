use std::sync::Arc;

use thales_core::{OptionType, SymbolTable};
use thales_portfolio::{
    OptionContract, Order, OrderSide, OrderStatus, Portfolio, PortfolioError,
};

fn setup() -> (Portfolio, thales_core::SymbolId) {
    let symbols = Arc::new(SymbolTable::new());
    let id = symbols.intern("AAPL");
    (Portfolio::new(symbols), id)
}

#[test]
fn two_partial_fills_average_to_150() {
    let (portfolio, aapl) = setup();
    portfolio
        .add_order(Order::limit(1, aapl, OrderSide::Buy, 100, 152.0))
        .unwrap();

    assert!(portfolio.update_order(1, OrderStatus::PartiallyFilled, 50, 149.0));
    assert!(portfolio.update_order(1, OrderStatus::Filled, 50, 151.0));

    let order = portfolio.order(1).unwrap();
    assert_eq!(order.prices.average_fill, 150.0);
    assert_eq!(order.status, OrderStatus::Filled);
    assert_eq!(order.remaining_quantity(), 0);
}

#[test]
fn cancel_is_refused_after_terminal_states() {
    let (portfolio, aapl) = setup();
    for id in 1..=3 {
        portfolio
            .add_order(Order::market(id, aapl, OrderSide::Buy, 10))
            .unwrap();
    }

    assert!(portfolio.update_order(1, OrderStatus::Filled, 10, 5.0));
    assert!(portfolio.cancel_order(2));
    assert!(portfolio.update_order(3, OrderStatus::Rejected, 0, 0.0));

    for id in 1..=3 {
        assert!(!portfolio.cancel_order(id), "order {id} should be final");
    }
    assert_eq!(portfolio.order(2).unwrap().status, OrderStatus::Canceled);
}

#[test]
fn cancel_after_partial_fill_keeps_the_fill() {
    let (portfolio, aapl) = setup();
    portfolio
        .add_order(Order::market(1, aapl, OrderSide::Sell, 10))
        .unwrap();
    assert!(portfolio.update_order(1, OrderStatus::PartiallyFilled, 4, 3.0));
    assert!(portfolio.cancel_order(1));

    let order = portfolio.order(1).unwrap();
    assert_eq!(order.status, OrderStatus::Canceled);
    assert_eq!(order.filled_quantity, 4);
    assert_eq!(portfolio.position(aapl).unwrap().quantity, -4);
}

#[test]
fn fills_adopt_registered_contract_terms() {
    let (portfolio, _) = setup();
    let spy = portfolio.symbols().intern("SPY");
    let call = portfolio.symbols().intern("SPY 2025-06-20 C500");
    let expiry = chrono::NaiveDate::from_ymd_opt(2025, 6, 20).unwrap();
    portfolio
        .ensure_position(OptionContract::new(call, spy, OptionType::Call, expiry, 500.0))
        .unwrap();

    portfolio
        .add_order(Order::limit(1, call, OrderSide::Buy, 5, 12.5))
        .unwrap();
    assert!(portfolio.update_order(1, OrderStatus::Filled, 5, 12.5));

    let position = portfolio.position(call).unwrap();
    assert!(position.contract.is_option());
    assert_eq!(position.contract.underlying_id, spy);
    assert_eq!(position.quantity, 5);
    assert_eq!(position.last_price, 12.5);
}

#[test]
fn flip_through_orders_realizes_closed_part() {
    let (portfolio, aapl) = setup();
    portfolio
        .add_order(Order::market(1, aapl, OrderSide::Buy, 10))
        .unwrap();
    portfolio
        .add_order(Order::market(2, aapl, OrderSide::Sell, 15))
        .unwrap();

    assert!(portfolio.update_order(1, OrderStatus::Filled, 10, 100.0));
    assert!(portfolio.update_order(2, OrderStatus::Filled, 15, 104.0));

    let position = portfolio.position(aapl).unwrap();
    assert_eq!(position.quantity, -5);
    assert_eq!(position.average_price, 104.0);
    assert!((position.realized_pnl - 40.0).abs() < 1e-12);
    assert!((portfolio.total_realized_pnl() - 40.0).abs() < 1e-12);
}

#[test]
fn queries_filter_by_symbol_and_activity() {
    let (portfolio, aapl) = setup();
    let msft = portfolio.symbols().intern("MSFT");
    portfolio
        .add_order(Order::market(1, aapl, OrderSide::Buy, 1))
        .unwrap();
    portfolio
        .add_order(Order::market(2, msft, OrderSide::Buy, 1))
        .unwrap();
    portfolio
        .add_order(Order::market(3, aapl, OrderSide::Sell, 1))
        .unwrap();
    portfolio.cancel_order(3);

    assert_eq!(portfolio.orders_for(aapl).len(), 2);
    let open: Vec<u64> = portfolio.open_orders().iter().map(|o| o.order_id).collect();
    assert_eq!(open, vec![1, 2]);
    assert_eq!(portfolio.order_count(), 3);
}

#[test]
fn unknown_symbol_contracts_are_rejected() {
    let (portfolio, _) = setup();
    let stray = thales_core::SymbolId(500);
    assert_eq!(
        portfolio.ensure_position(OptionContract::unknown(stray)),
        Err(PortfolioError::UnknownSymbol(stray))
    );
}
