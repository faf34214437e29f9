//! Typed event factories
//!
//! One factory per public channel type turns a channel payload into a
//! [`MarketEvent`]. The caller picks `build` for a flat payload (one update)
//! and `build_snapshot` for an array of arrays. Field positions live with the
//! record types in `bfx-types`; factories only choose which record to decode.

use crate::events::{AccountEvent, MarketEvent, TradeKind};
use crate::subscription::SubscriptionRequest;
use bfx_types::{
    BalanceInfo, BookLevel, Candle, Channel, DecodeError, DerivativeStatus, FromRow,
    FundingBookEntry, FundingCredit, FundingInfo, FundingLoan, FundingOffer, FundingTrade,
    FundingTradeExecution, Liquidation, MarginInfo, Notification, Order, Position, RawBookEntry,
    RawFundingBookEntry, Ticker, Trade, TradeExecution, Wallet,
};
use serde_json::Value;

/// Builds market events for one channel type
pub trait EventFactory: Send + Sync {
    /// Decode a single update; `msg_type` is the mnemonic when the frame has one
    fn build(
        &self,
        request: &SubscriptionRequest,
        msg_type: Option<&str>,
        payload: &Value,
    ) -> Result<MarketEvent, DecodeError>;

    /// Decode a snapshot (array of rows)
    fn build_snapshot(
        &self,
        request: &SubscriptionRequest,
        rows: &Value,
    ) -> Result<MarketEvent, DecodeError>;
}

/// Factory for a channel type
pub fn factory_for(channel: Channel) -> &'static dyn EventFactory {
    match channel {
        Channel::Ticker => &TickerFactory,
        Channel::Trades => &TradesFactory,
        Channel::Book => &BookFactory,
        Channel::Candles => &CandlesFactory,
        Channel::Status => &StatusFactory,
    }
}

fn no_snapshot(kind: &str) -> DecodeError {
    DecodeError::shape(format!("{kind}: snapshots are not sent on this channel"))
}

struct TickerFactory;

impl EventFactory for TickerFactory {
    fn build(
        &self,
        _request: &SubscriptionRequest,
        _msg_type: Option<&str>,
        payload: &Value,
    ) -> Result<MarketEvent, DecodeError> {
        Ticker::decode(payload).map(MarketEvent::Ticker)
    }

    fn build_snapshot(
        &self,
        _request: &SubscriptionRequest,
        _rows: &Value,
    ) -> Result<MarketEvent, DecodeError> {
        Err(no_snapshot("ticker"))
    }
}

struct TradesFactory;

impl EventFactory for TradesFactory {
    fn build(
        &self,
        request: &SubscriptionRequest,
        msg_type: Option<&str>,
        payload: &Value,
    ) -> Result<MarketEvent, DecodeError> {
        let mnemonic = msg_type.unwrap_or("te");
        let kind = TradeKind::from_mnemonic(mnemonic)
            .ok_or_else(|| DecodeError::UnknownMessage(format!("trades: {mnemonic}")))?;
        if request.is_funding() {
            FundingTrade::decode(payload).map(|trade| MarketEvent::FundingTrade { kind, trade })
        } else {
            Trade::decode(payload).map(|trade| MarketEvent::Trade { kind, trade })
        }
    }

    fn build_snapshot(
        &self,
        request: &SubscriptionRequest,
        rows: &Value,
    ) -> Result<MarketEvent, DecodeError> {
        if request.is_funding() {
            FundingTrade::decode_all(rows).map(MarketEvent::FundingTradeSnapshot)
        } else {
            Trade::decode_all(rows).map(MarketEvent::TradeSnapshot)
        }
    }
}

struct BookFactory;

impl EventFactory for BookFactory {
    fn build(
        &self,
        request: &SubscriptionRequest,
        _msg_type: Option<&str>,
        payload: &Value,
    ) -> Result<MarketEvent, DecodeError> {
        match (request.is_raw_book(), request.is_funding()) {
            (false, false) => BookLevel::decode(payload).map(MarketEvent::BookUpdate),
            (false, true) => FundingBookEntry::decode(payload).map(MarketEvent::FundingBookUpdate),
            (true, false) => RawBookEntry::decode(payload).map(MarketEvent::RawBookUpdate),
            (true, true) => {
                RawFundingBookEntry::decode(payload).map(MarketEvent::RawFundingBookUpdate)
            }
        }
    }

    fn build_snapshot(
        &self,
        request: &SubscriptionRequest,
        rows: &Value,
    ) -> Result<MarketEvent, DecodeError> {
        match (request.is_raw_book(), request.is_funding()) {
            (false, false) => BookLevel::decode_all(rows).map(MarketEvent::BookSnapshot),
            (false, true) => {
                FundingBookEntry::decode_all(rows).map(MarketEvent::FundingBookSnapshot)
            }
            (true, false) => RawBookEntry::decode_all(rows).map(MarketEvent::RawBookSnapshot),
            (true, true) => {
                RawFundingBookEntry::decode_all(rows).map(MarketEvent::RawFundingBookSnapshot)
            }
        }
    }
}

struct CandlesFactory;

impl EventFactory for CandlesFactory {
    fn build(
        &self,
        _request: &SubscriptionRequest,
        _msg_type: Option<&str>,
        payload: &Value,
    ) -> Result<MarketEvent, DecodeError> {
        Candle::decode(payload).map(MarketEvent::Candle)
    }

    fn build_snapshot(
        &self,
        _request: &SubscriptionRequest,
        rows: &Value,
    ) -> Result<MarketEvent, DecodeError> {
        Candle::decode_all(rows).map(MarketEvent::CandleSnapshot)
    }
}

struct StatusFactory;

impl StatusFactory {
    fn is_liquidation_feed(request: &SubscriptionRequest) -> bool {
        request.target().starts_with("liq:")
    }
}

impl EventFactory for StatusFactory {
    fn build(
        &self,
        request: &SubscriptionRequest,
        _msg_type: Option<&str>,
        payload: &Value,
    ) -> Result<MarketEvent, DecodeError> {
        if Self::is_liquidation_feed(request) {
            Liquidation::decode(payload).map(|liq| MarketEvent::Liquidations(vec![liq]))
        } else {
            DerivativeStatus::decode(payload).map(MarketEvent::DerivativeStatus)
        }
    }

    fn build_snapshot(
        &self,
        request: &SubscriptionRequest,
        rows: &Value,
    ) -> Result<MarketEvent, DecodeError> {
        if Self::is_liquidation_feed(request) {
            Liquidation::decode_all(rows).map(MarketEvent::Liquidations)
        } else {
            Err(no_snapshot("status"))
        }
    }
}

/// Decode an authenticated channel message by its mnemonic
pub fn build_account_event(mnemonic: &str, payload: &Value) -> Result<AccountEvent, DecodeError> {
    use AccountEvent as E;

    let event = match mnemonic {
        "os" => E::OrderSnapshot(Order::decode_all(payload)?),
        "on" => E::OrderNew(Order::decode(payload)?),
        "ou" => E::OrderUpdate(Order::decode(payload)?),
        "oc" => E::OrderCancel(Order::decode(payload)?),
        "ps" => E::PositionSnapshot(Position::decode_all(payload)?),
        "pn" => E::PositionNew(Position::decode(payload)?),
        "pu" => E::PositionUpdate(Position::decode(payload)?),
        "pc" => E::PositionClose(Position::decode(payload)?),
        "ws" => E::WalletSnapshot(Wallet::decode_all(payload)?),
        "wu" => E::WalletUpdate(Wallet::decode(payload)?),
        "te" => E::TradeExecuted(TradeExecution::decode(payload)?),
        "tu" => E::TradeExecutionUpdate(TradeExecution::decode(payload)?),
        "fte" => E::FundingTradeExecuted(FundingTradeExecution::decode(payload)?),
        "ftu" => E::FundingTradeUpdate(FundingTradeExecution::decode(payload)?),
        "n" => E::Notification(Notification::decode(payload)?),
        "fos" => E::FundingOfferSnapshot(FundingOffer::decode_all(payload)?),
        "fon" => E::FundingOfferNew(FundingOffer::decode(payload)?),
        "fou" => E::FundingOfferUpdate(FundingOffer::decode(payload)?),
        "foc" => E::FundingOfferCancel(FundingOffer::decode(payload)?),
        "fcs" => E::FundingCreditSnapshot(FundingCredit::decode_all(payload)?),
        "fcn" => E::FundingCreditNew(FundingCredit::decode(payload)?),
        "fcu" => E::FundingCreditUpdate(FundingCredit::decode(payload)?),
        "fcc" => E::FundingCreditClose(FundingCredit::decode(payload)?),
        "fls" => E::FundingLoanSnapshot(FundingLoan::decode_all(payload)?),
        "fln" => E::FundingLoanNew(FundingLoan::decode(payload)?),
        "flu" => E::FundingLoanUpdate(FundingLoan::decode(payload)?),
        "flc" => E::FundingLoanClose(FundingLoan::decode(payload)?),
        "fiu" => E::FundingInfo(FundingInfo::decode(payload)?),
        "miu" => E::MarginInfo(MarginInfo::decode(payload)?),
        "bu" => E::BalanceInfo(BalanceInfo::decode(payload)?),
        other => return Err(DecodeError::UnknownMessage(format!("account: {other}"))),
    };
    Ok(event)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bfx_types::{BookLength, Frequency, Precision};
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn build(request: &SubscriptionRequest, msg_type: Option<&str>, payload: Value) -> MarketEvent {
        factory_for(request.channel)
            .build(request, msg_type, &payload)
            .unwrap()
    }

    fn build_snapshot(request: &SubscriptionRequest, rows: Value) -> MarketEvent {
        factory_for(request.channel)
            .build_snapshot(request, &rows)
            .unwrap()
    }

    #[test]
    fn test_trading_ticker() {
        let request = SubscriptionRequest::ticker("tSYM");
        let event = build(&request, None, json!([100, 1, 101, 1, 1, 0.01, 101, 1000, 110, 90]));
        let MarketEvent::Ticker(Ticker::Trading(ticker)) = event else {
            panic!("expected trading ticker, got {event:?}");
        };
        assert_eq!(ticker.bid, dec!(100));
        assert_eq!(ticker.bid_size, dec!(1));
        assert_eq!(ticker.ask, dec!(101));
        assert_eq!(ticker.last_price, dec!(101));
        assert_eq!(ticker.volume, dec!(1000));
        assert_eq!(ticker.high, dec!(110));
        assert_eq!(ticker.low, dec!(90));
    }

    #[test]
    fn test_funding_ticker_by_length() {
        let request = SubscriptionRequest::ticker("fUSD");
        let event = build(
            &request,
            None,
            json!([0.0002, 0.0001, 30, 1000, 0.0001, 2, 500, 0, 0, 0.0002, 1e6, 0.0003, 0.0001, null, null, 25000]),
        );
        assert!(matches!(event, MarketEvent::Ticker(Ticker::Funding(_))));
    }

    #[test]
    fn test_ticker_has_no_snapshot() {
        let request = SubscriptionRequest::ticker("tBTCUSD");
        assert!(factory_for(Channel::Ticker)
            .build_snapshot(&request, &json!([[1, 2, 3]]))
            .is_err());
    }

    #[test]
    fn test_trades_snapshot_and_updates() {
        let request = SubscriptionRequest::trades("tBTCUSD");
        let snapshot = build_snapshot(
            &request,
            json!([[401597393, 1574694475039i64, 0.005, 7244.9], [401597394, 1574694478808i64, -0.1, 7245.3]]),
        );
        let MarketEvent::TradeSnapshot(trades) = snapshot else {
            panic!("expected trade snapshot");
        };
        assert_eq!(trades.len(), 2);

        let update = build(&request, Some("tu"), json!([401597395, 1574694478808i64, 0.005, 7245.3]));
        assert!(matches!(
            update,
            MarketEvent::Trade {
                kind: TradeKind::Updated,
                ..
            }
        ));
    }

    #[test]
    fn test_funding_trades() {
        let request = SubscriptionRequest::trades("fUSD");
        let update = build(&request, Some("fte"), json!([133323543, 1574694605000i64, -59.84, 0.00023647, 2]));
        assert!(matches!(
            update,
            MarketEvent::FundingTrade {
                kind: TradeKind::Executed,
                ..
            }
        ));
    }

    #[test]
    fn test_unknown_trade_mnemonic() {
        let request = SubscriptionRequest::trades("tBTCUSD");
        let err = factory_for(Channel::Trades)
            .build(&request, Some("xx"), &json!([1, 2, 3, 4]))
            .unwrap_err();
        assert!(matches!(err, DecodeError::UnknownMessage(_)));
    }

    #[test]
    fn test_book_variants() {
        let aggregated =
            SubscriptionRequest::book("tBTCUSD", Precision::P0, Frequency::F0, BookLength::L25);
        assert!(matches!(
            build(&aggregated, None, json!([100, 1, 5])),
            MarketEvent::BookUpdate(_)
        ));
        assert!(matches!(
            build_snapshot(&aggregated, json!([[100, 1, 5], [101, 1, -4]])),
            MarketEvent::BookSnapshot(levels) if levels.len() == 2
        ));

        let raw = SubscriptionRequest::raw_book("tBTCUSD", BookLength::L25);
        assert!(matches!(
            build(&raw, None, json!([34006738527i64, 7150.9, -0.1])),
            MarketEvent::RawBookUpdate(_)
        ));

        let funding =
            SubscriptionRequest::book("fUSD", Precision::P0, Frequency::F0, BookLength::L25);
        assert!(matches!(
            build(&funding, None, json!([0.0003301, 30, 1, -3862.874])),
            MarketEvent::FundingBookUpdate(_)
        ));

        let raw_funding = SubscriptionRequest::raw_book("fUSD", BookLength::L25);
        assert!(matches!(
            build_snapshot(&raw_funding, json!([[658282397, 30, 0.000233, -530]])),
            MarketEvent::RawFundingBookSnapshot(entries) if entries.len() == 1
        ));
    }

    #[test]
    fn test_candles() {
        let request = SubscriptionRequest::candles("trade:1m:tBTCUSD");
        assert!(matches!(
            build(&request, None, json!([1574698260000i64, 7379.8, 7379.8, 7379.8, 7379.8, 0.5])),
            MarketEvent::Candle(_)
        ));
        assert!(matches!(
            build_snapshot(&request, json!([])),
            MarketEvent::CandleSnapshot(candles) if candles.is_empty()
        ));
    }

    #[test]
    fn test_liquidation_feed() {
        let request = SubscriptionRequest::status("liq:global");
        let rows = json!([["pos", 145400868, 1609144352338i64, null, "tETHF0:USTF0", -1.67, 730.96, null, 1, 1, null, 736.13]]);
        assert!(matches!(
            build_snapshot(&request, rows),
            MarketEvent::Liquidations(liqs) if liqs.len() == 1
        ));
    }

    #[test]
    fn test_short_payload_is_decode_error() {
        let request = SubscriptionRequest::ticker("tBTCUSD");
        let err = factory_for(Channel::Ticker)
            .build(&request, None, &json!([100, 1]))
            .unwrap_err();
        assert!(matches!(err, DecodeError::TooShort { .. }));
    }

    #[test]
    fn test_account_wallet_update() {
        let event = build_account_event("wu", &json!(["exchange", "BTC", 1.5, 0, 1.2])).unwrap();
        let AccountEvent::WalletUpdate(wallet) = event else {
            panic!("expected wallet update");
        };
        assert_eq!(wallet.currency, "BTC");
        assert_eq!(wallet.balance, dec!(1.5));
    }

    #[test]
    fn test_account_snapshots() {
        assert!(matches!(
            build_account_event("ws", &json!([])).unwrap(),
            AccountEvent::WalletSnapshot(w) if w.is_empty()
        ));
        assert!(matches!(
            build_account_event("os", &json!([])).unwrap(),
            AccountEvent::OrderSnapshot(o) if o.is_empty()
        ));
    }

    #[test]
    fn test_account_unknown_mnemonic() {
        let err = build_account_event("zz", &json!([])).unwrap_err();
        assert!(matches!(err, DecodeError::UnknownMessage(_)));
    }
}
