//! Interactive Brokers TWS / Gateway backend.
//!
//! TWS has no stop-loss or take-profit fields on a position. Here a
//! position's TP is its working LMT order on the closing side and its SL the
//! working STP order; modifying a level places a new protective order or
//! amends the existing one under the same order id.

use crate::config::TerminalConfig;
use crate::connection::{TerminalError, TradingTerminal};
use crate::orders::{ModificationRequest, RetCode, SubmitResult};
use crate::portfolio::{AccountSnapshot, Position, Side};
use crate::security_types::InstrumentInfo;
use ibapi::Client;
use ibapi::accounts::{AccountSummaries, AccountSummaryTags, PositionUpdate};
use ibapi::orders::{Order, Orders, PlaceOrder};
use ibapi::prelude::*;
use log::{debug, error, info, warn};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy)]
struct ProtectiveOrder {
    order_id: i32,
    price: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Protection {
    TakeProfit,
    StopLoss,
}

#[derive(Debug, Clone)]
struct Holding {
    account: String,
    contract: Contract,
    side: Side,
    quantity: f64,
    average_cost: f64,
    take_profit: Option<ProtectiveOrder>,
    stop_loss: Option<ProtectiveOrder>,
}

impl Holding {
    fn multiplier(&self) -> f64 {
        contract_multiplier(&self.contract)
    }

    fn closing_action(&self) -> Action {
        match self.side {
            Side::Buy => Action::Sell,
            Side::Sell => Action::Buy,
        }
    }
}

fn contract_multiplier(contract: &Contract) -> f64 {
    contract
        .multiplier
        .parse::<f64>()
        .ok()
        .filter(|m| *m > 0.0)
        .unwrap_or(1.0)
}

fn unreachable(e: impl std::fmt::Display) -> TerminalError {
    TerminalError::Unreachable(e.to_string())
}

pub struct TwsTerminal {
    config: TerminalConfig,
    client: Option<Client>,
    holdings: HashMap<u64, Holding>,
}

impl TwsTerminal {
    pub fn new(config: TerminalConfig) -> Self {
        Self {
            config,
            client: None,
            holdings: HashMap::new(),
        }
    }

    fn client(&self) -> Result<&Client, TerminalError> {
        self.client
            .as_ref()
            .ok_or_else(|| TerminalError::Unreachable("not connected to TWS".to_string()))
    }
}

fn read_holdings(client: &Client) -> Result<HashMap<u64, Holding>, TerminalError> {
    let mut holdings = HashMap::new();
    let subscription = client.positions().map_err(unreachable)?;

    while let Some(update) = subscription.next() {
        match update {
            PositionUpdate::Position(position) => {
                if position.position == 0.0 {
                    continue;
                }
                let mut contract = position.contract.clone();
                if contract.exchange.is_empty() {
                    contract.exchange = "SMART".to_string();
                }
                holdings.insert(
                    position.contract.contract_id as u64,
                    Holding {
                        account: position.account.clone(),
                        contract,
                        side: if position.position > 0.0 { Side::Buy } else { Side::Sell },
                        quantity: position.position.abs(),
                        average_cost: position.average_cost,
                        take_profit: None,
                        stop_loss: None,
                    },
                );
            }
            PositionUpdate::PositionEnd => {
                subscription.cancel();
                break;
            }
        }
    }
    Ok(holdings)
}

fn attach_protective_orders(
    client: &Client,
    holdings: &mut HashMap<u64, Holding>,
) -> Result<(), TerminalError> {
    let subscription = client.all_open_orders().map_err(unreachable)?;

    while let Some(item) = subscription.next() {
        let Orders::OrderData(data) = item else {
            continue;
        };
        let Some(holding) = holdings.get_mut(&(data.contract.contract_id as u64)) else {
            continue;
        };
        if data.order.action != holding.closing_action() {
            continue;
        }
        match data.order.order_type.as_str() {
            "LMT" => {
                if let Some(price) = data.order.limit_price {
                    holding.take_profit = Some(ProtectiveOrder {
                        order_id: data.order_id,
                        price,
                    });
                }
            }
            "STP" => {
                if let Some(price) = data.order.aux_price {
                    holding.stop_loss = Some(ProtectiveOrder {
                        order_id: data.order_id,
                        price,
                    });
                }
            }
            _ => {}
        }
    }
    Ok(())
}

fn unrealized_pnl(client: &Client, holding: &Holding) -> f64 {
    match client.pnl_single(&holding.account, holding.contract.contract_id, None) {
        Ok(subscription) => {
            let pnl = subscription
                .next()
                .map(|update| update.unrealized_pnl)
                .unwrap_or(0.0);
            subscription.cancel();
            pnl
        }
        Err(e) => {
            warn!("No P&L for {}: {}", holding.contract.symbol, e);
            0.0
        }
    }
}

fn protective_order(kind: Protection, holding: &Holding, price: f64) -> Order {
    let mut order = Order::default();
    order.action = holding.closing_action();
    order.total_quantity = holding.quantity;
    match kind {
        Protection::TakeProfit => {
            order.order_type = "LMT".to_string();
            order.limit_price = Some(price);
        }
        Protection::StopLoss => {
            order.order_type = "STP".to_string();
            order.aux_price = Some(price);
        }
    }
    order.tif = "GTC".to_string();
    order
}

fn place(
    client: &Client,
    order_id: i32,
    contract: &Contract,
    order: &Order,
) -> Result<SubmitResult, TerminalError> {
    let subscription = client
        .place_order(order_id, contract, order)
        .map_err(|e| TerminalError::Rejected(e.to_string()))?;

    while let Some(event) = subscription.next() {
        match event {
            PlaceOrder::OpenOrder(_) => {
                return Ok(SubmitResult::new(RetCode::DONE, "Order accepted"));
            }
            PlaceOrder::OrderStatus(status) => {
                return Ok(SubmitResult::new(RetCode::DONE, status.status));
            }
            // 2100-2199 are informational warnings
            PlaceOrder::Message(notice) if (2100..2200).contains(&notice.code) => {
                debug!("TWS notice {}: {}", notice.code, notice.message);
            }
            PlaceOrder::Message(notice) => {
                error!("TWS rejected order #{}: {} {}", order_id, notice.code, notice.message);
                let retcode = if notice.message.contains("Read-Only") {
                    RetCode::CLIENT_DISABLES_AT
                } else {
                    RetCode::REJECT
                };
                return Ok(SubmitResult::new(retcode, notice.message));
            }
            _ => {}
        }
    }
    Ok(SubmitResult::new(RetCode::REJECT, "No response from TWS"))
}

impl TradingTerminal for TwsTerminal {
    fn connect(&mut self) -> Result<bool, TerminalError> {
        let address = format!("{}:{}", self.config.host, self.config.port);
        match Client::connect(&address, self.config.client_id) {
            Ok(client) => {
                info!("Connected to TWS at {}", address);
                self.client = Some(client);
                Ok(true)
            }
            Err(e) => {
                warn!("Failed to connect to TWS at {}: {}", address, e);
                Ok(false)
            }
        }
    }

    fn list_open_positions(&mut self) -> Result<Vec<Position>, TerminalError> {
        let client = self.client()?;
        let mut holdings = read_holdings(client)?;
        attach_protective_orders(client, &mut holdings)?;

        let mut positions: Vec<Position> = holdings
            .iter()
            .map(|(ticket, holding)| Position {
                ticket: *ticket,
                symbol: holding.contract.symbol.clone(),
                side: holding.side,
                volume: holding.quantity,
                price_open: holding.average_cost / holding.multiplier(),
                tp: holding.take_profit.map(|o| o.price),
                sl: holding.stop_loss.map(|o| o.price),
                profit: unrealized_pnl(client, holding),
            })
            .collect();
        positions.sort_by_key(|p| p.ticket);

        self.holdings = holdings;
        Ok(positions)
    }

    fn account(&mut self) -> Result<Option<AccountSnapshot>, TerminalError> {
        let client = self.client()?;
        let subscription = client
            .account_summary("All", AccountSummaryTags::ALL)
            .map_err(unreachable)?;

        let mut balance = None;
        for update in &subscription {
            match update {
                AccountSummaries::Summary(summary) => {
                    if summary.tag == "NetLiquidation" {
                        balance = summary.value.parse::<f64>().ok();
                    }
                }
                AccountSummaries::End => {
                    subscription.cancel();
                    break;
                }
            }
        }

        // TWS has no auto-trading switch; read-only mode surfaces on submission.
        Ok(balance.map(|balance| AccountSnapshot {
            balance,
            trade_allowed: true,
        }))
    }

    fn instrument(&mut self, symbol: &str) -> Result<Option<InstrumentInfo>, TerminalError> {
        let Some(contract) = self
            .holdings
            .values()
            .find(|h| h.contract.symbol == symbol)
            .map(|h| h.contract.clone())
        else {
            return Ok(None);
        };
        let client = self.client()?;

        match client.contract_details(&contract) {
            Ok(details) => Ok(details.first().map(|d| {
                InstrumentInfo::new(d.min_tick, d.min_tick * contract_multiplier(&contract))
            })),
            Err(e) => {
                warn!("No contract details for {}: {}", symbol, e);
                Ok(None)
            }
        }
    }

    fn submit_modification(
        &mut self,
        request: &ModificationRequest,
    ) -> Result<SubmitResult, TerminalError> {
        let Some(holding) = self.holdings.get(&request.position).cloned() else {
            return Ok(SubmitResult::new(RetCode::REJECT, "Position not found"));
        };
        let client = self.client()?;

        let levels = [
            (Protection::TakeProfit, request.tp, holding.take_profit),
            (Protection::StopLoss, request.sl, holding.stop_loss),
        ];
        let mut changed = false;
        for (kind, target, existing) in levels {
            let Some(price) = target else {
                continue;
            };
            if existing.is_some_and(|o| o.price == price) {
                continue;
            }
            let order_id = existing
                .map(|o| o.order_id)
                .unwrap_or_else(|| client.next_order_id());
            let order = protective_order(kind, &holding, price);
            let result = place(client, order_id, &holding.contract, &order)?;
            if result.retcode != RetCode::DONE {
                return Ok(result);
            }
            info!(
                "{:?} for {} set to {} (order #{}, {})",
                kind, holding.contract.symbol, price, order_id, request.comment
            );
            changed = true;
        }

        if changed {
            Ok(SubmitResult::new(RetCode::DONE, "Protective orders updated"))
        } else {
            Ok(SubmitResult::new(RetCode::NO_CHANGES, "No changes"))
        }
    }

    fn disconnect(&mut self) {
        if self.client.take().is_some() {
            info!("Disconnected from TWS");
        }
        self.holdings.clear();
    }
}
