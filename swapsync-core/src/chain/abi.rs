//! Orderbook contract events.
//!
//! The three signatures the indexer filters on, declared with `sol!` so the
//! topic hashes and decoders come straight from the ABI. Enum-typed fields
//! (`Side`, `SaleKind`) are `uint8` on the wire, `OrderKey` is `bytes32`
//! and `Price` is `uint128`.

use alloy_primitives::{Address, B256, U256};
use alloy_sol_types::{sol, SolEvent};
use thiserror::Error;

use crate::chain::client::RpcLog;
use crate::entities::order::OrderType;

sol! {
    /// NFT asset reference carried by orders.
    #[derive(Debug)]
    struct Asset {
        uint256 tokenId;
        address collection;
        uint96 amount;
    }

    /// Full order tuple as embedded in `LogMatch`.
    #[derive(Debug)]
    struct OrderInfo {
        uint8 side;
        uint8 saleKind;
        address maker;
        Asset nft;
        uint128 price;
        uint64 expiry;
        uint64 salt;
    }

    /// Emitted when a new order is placed.
    #[derive(Debug)]
    event LogMake(
        bytes32 orderKey,
        uint8 indexed side,
        uint8 indexed saleKind,
        address indexed maker,
        Asset nft,
        uint128 price,
        uint64 expiry,
        uint64 salt
    );

    /// Emitted when the maker withdraws an order.
    #[derive(Debug)]
    event LogCancel(bytes32 indexed orderKey, address indexed maker);

    /// Emitted when two orders fill against each other.
    #[derive(Debug)]
    event LogMatch(
        bytes32 indexed makeOrderKey,
        bytes32 indexed takeOrderKey,
        OrderInfo makeOrder,
        OrderInfo takeOrder,
        uint128 fillPrice
    );
}

/// Topic0 of `LogMake`.
pub const LOG_MAKE_TOPIC: B256 = LogMake::SIGNATURE_HASH;
/// Topic0 of `LogCancel`.
pub const LOG_CANCEL_TOPIC: B256 = LogCancel::SIGNATURE_HASH;
/// Topic0 of `LogMatch`.
pub const LOG_MATCH_TOPIC: B256 = LogMatch::SIGNATURE_HASH;

/// `Side` values.
pub const SIDE_LIST: u8 = 0;
pub const SIDE_BID: u8 = 1;

/// `SaleKind` values.
pub const SALE_KIND_FIX_FOR_COLLECTION: u8 = 0;
pub const SALE_KIND_FIX_FOR_ITEM: u8 = 1;

/// Log payload did not match the declared ABI.
#[derive(Debug, Error)]
#[error("abi decoding failed: {0}")]
pub struct AbiError(#[from] alloy_sol_types::Error);

/// Decoded `LogMake`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MakeEvent {
    pub order_key: B256,
    pub side: u8,
    pub sale_kind: u8,
    pub maker: Address,
    pub token_id: U256,
    pub collection: Address,
    pub amount: u128,
    pub price: u128,
    pub expiry: u64,
    pub salt: u64,
}

/// Decoded `LogCancel`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancelEvent {
    pub order_key: B256,
    pub maker: Address,
}

/// One side of a decoded `LogMatch`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderSide {
    pub side: u8,
    pub sale_kind: u8,
    pub maker: Address,
    pub token_id: U256,
    pub collection: Address,
    pub amount: u128,
    pub price: u128,
    pub expiry: u64,
    pub salt: u64,
}

/// Decoded `LogMatch`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchEvent {
    pub make_order_key: B256,
    pub take_order_key: B256,
    pub make_order: OrderSide,
    pub take_order: OrderSide,
    pub fill_price: u128,
}

impl From<OrderInfo> for OrderSide {
    fn from(info: OrderInfo) -> Self {
        Self {
            side: info.side,
            sale_kind: info.saleKind,
            maker: info.maker,
            token_id: info.nft.tokenId,
            collection: info.nft.collection,
            amount: info.nft.amount.to::<u128>(),
            price: info.price,
            expiry: info.expiry,
            salt: info.salt,
        }
    }
}

pub fn decode_make(log: &RpcLog) -> Result<MakeEvent, AbiError> {
    let event = LogMake::decode_raw_log(log.topics.iter().copied(), log.data.as_ref(), true)?;
    Ok(MakeEvent {
        order_key: event.orderKey,
        side: event.side,
        sale_kind: event.saleKind,
        maker: event.maker,
        token_id: event.nft.tokenId,
        collection: event.nft.collection,
        amount: event.nft.amount.to::<u128>(),
        price: event.price,
        expiry: event.expiry,
        salt: event.salt,
    })
}

pub fn decode_cancel(log: &RpcLog) -> Result<CancelEvent, AbiError> {
    let event = LogCancel::decode_raw_log(log.topics.iter().copied(), log.data.as_ref(), true)?;
    Ok(CancelEvent {
        order_key: event.orderKey,
        maker: event.maker,
    })
}

pub fn decode_match(log: &RpcLog) -> Result<MatchEvent, AbiError> {
    let event = LogMatch::decode_raw_log(log.topics.iter().copied(), log.data.as_ref(), true)?;
    Ok(MatchEvent {
        make_order_key: event.makeOrderKey,
        take_order_key: event.takeOrderKey,
        make_order: event.makeOrder.into(),
        take_order: event.takeOrder.into(),
        fill_price: event.fillPrice,
    })
}

/// Order kind from the `(side, saleKind)` pair: listings sell, bids buy
/// either a whole collection or one item.
pub fn classify_order_type(side: u8, sale_kind: u8) -> OrderType {
    if side == SIDE_BID {
        if sale_kind == SALE_KIND_FIX_FOR_COLLECTION {
            OrderType::CollectionBid
        } else {
            OrderType::ItemBid
        }
    } else {
        OrderType::Listing
    }
}

/// The two halves of a match resolved into sale roles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchSides {
    pub sell_order_id: B256,
    pub buy_order_id: B256,
    pub seller: Address,
    pub buyer: Address,
    pub collection: Address,
    pub token_id: U256,
}

/// Work out who sold and who bought: the sell side is whichever order is a
/// listing, its counterparty is the buyer.
pub fn split_match(event: &MatchEvent) -> MatchSides {
    if event.make_order.side == SIDE_BID {
        // A seller took a standing bid.
        MatchSides {
            sell_order_id: event.take_order_key,
            buy_order_id: event.make_order_key,
            seller: event.take_order.maker,
            buyer: event.make_order.maker,
            collection: event.take_order.collection,
            token_id: event.take_order.token_id,
        }
    } else {
        // A buyer took a standing listing.
        MatchSides {
            sell_order_id: event.make_order_key,
            buy_order_id: event.take_order_key,
            seller: event.make_order.maker,
            buyer: event.take_order.maker,
            collection: event.make_order.collection,
            token_id: event.make_order.token_id,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use alloy_primitives::{address, b256, Bytes};

    #[test]
    fn topic_hashes_match_deployed_contract() {
        assert_eq!(
            LOG_MAKE_TOPIC,
            b256!("fc37f2ff950f95913eb7182357ba3c14df60ef354bc7d6ab1ba2815f249fffe6")
        );
        assert_eq!(
            LOG_CANCEL_TOPIC,
            b256!("0ac8bb53fac566d7afc05d8b4df11d7690a7b27bdc40b54e4060f9b21fb849bd")
        );
        assert_eq!(
            LOG_MATCH_TOPIC,
            b256!("f629aecab94607bc43ce4aebd564bf6e61c7327226a797b002de724b9944b20e")
        );
    }

    #[test]
    fn order_type_classification() {
        assert_eq!(
            classify_order_type(SIDE_LIST, SALE_KIND_FIX_FOR_ITEM),
            OrderType::Listing
        );
        assert_eq!(
            classify_order_type(SIDE_BID, SALE_KIND_FIX_FOR_COLLECTION),
            OrderType::CollectionBid
        );
        assert_eq!(
            classify_order_type(SIDE_BID, SALE_KIND_FIX_FOR_ITEM),
            OrderType::ItemBid
        );
    }

    #[test]
    fn cancel_decodes_from_raw_topics() {
        let order_key =
            b256!("00000000000000000000000000000000000000000000000000000000000000aa");
        let maker = address!("90b6bd4a40bbf27b01df00c5c27e25e10de887e1");
        let log = RpcLog {
            address: address!("0000000000000000000000000000000000000001"),
            topics: vec![
                LOG_CANCEL_TOPIC,
                order_key,
                B256::left_padding_from(maker.as_slice()),
            ],
            data: Bytes::new(),
            block_number: 1,
            transaction_hash: B256::ZERO,
            log_index: 0,
        };
        let event = decode_cancel(&log).unwrap();
        assert_eq!(event.order_key, order_key);
        assert_eq!(event.maker, maker);
    }

    fn order_side(side: u8, maker: Address) -> OrderSide {
        OrderSide {
            side,
            sale_kind: SALE_KIND_FIX_FOR_ITEM,
            maker,
            token_id: U256::from(42u64),
            collection: address!("c0ffee254729296a45a3885639ac7e10f9d54979"),
            amount: 1,
            price: 50,
            expiry: 0,
            salt: 7,
        }
    }

    #[test]
    fn match_split_when_buyer_takes_listing() {
        let seller = address!("1111111111111111111111111111111111111111");
        let buyer = address!("2222222222222222222222222222222222222222");
        let event = MatchEvent {
            make_order_key: b256!(
                "000000000000000000000000000000000000000000000000000000000000000a"
            ),
            take_order_key: b256!(
                "000000000000000000000000000000000000000000000000000000000000000b"
            ),
            make_order: order_side(SIDE_LIST, seller),
            take_order: order_side(SIDE_BID, buyer),
            fill_price: 50,
        };
        let sides = split_match(&event);
        assert_eq!(sides.sell_order_id, event.make_order_key);
        assert_eq!(sides.buy_order_id, event.take_order_key);
        assert_eq!(sides.seller, seller);
        assert_eq!(sides.buyer, buyer);
        assert_eq!(sides.token_id, U256::from(42u64));
    }

    #[test]
    fn match_split_when_seller_takes_bid() {
        let buyer = address!("3333333333333333333333333333333333333333");
        let seller = address!("4444444444444444444444444444444444444444");
        let event = MatchEvent {
            make_order_key: b256!(
                "000000000000000000000000000000000000000000000000000000000000000c"
            ),
            take_order_key: b256!(
                "000000000000000000000000000000000000000000000000000000000000000d"
            ),
            make_order: order_side(SIDE_BID, buyer),
            take_order: order_side(SIDE_LIST, seller),
            fill_price: 50,
        };
        let sides = split_match(&event);
        assert_eq!(sides.sell_order_id, event.take_order_key);
        assert_eq!(sides.buy_order_id, event.make_order_key);
        assert_eq!(sides.seller, seller);
        assert_eq!(sides.buyer, buyer);
    }
}
