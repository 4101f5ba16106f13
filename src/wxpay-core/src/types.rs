//! Typed request and response bodies.
//!
//! Amounts are in fen (1/100 CNY). Times are RFC 3339 with offset.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

type Timestamp = DateTime<FixedOffset>;

// =============================================================================
// Orders
// =============================================================================

/// Order amount.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Amount {
    /// Order total.
    #[serde(default)]
    pub total: i64,
    /// Amount paid by the payer.
    #[serde(default)]
    pub payer_total: i64,
    /// Currency, `CNY` for domestic merchants.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub currency: String,
    /// Payer currency.
    #[serde(default)]
    pub payer_currency: String,
}

/// Payer identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payer {
    /// Payer openid under the merchant's app.
    #[serde(default)]
    pub openid: String,
}

/// Merchant store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreInfo {
    /// Store id.
    pub id: String,
    /// Store name.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    /// Region code.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub area_code: String,
    /// Street address.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub address: String,
}

/// Payment scene.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneInfo {
    /// Payer client IP.
    #[serde(default)]
    pub payer_client_ip: String,
    /// Merchant device id.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub device_id: String,
    /// Store the payment happened at.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_info: Option<StoreInfo>,
}

/// Goods covered by a promotion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromotionGoods {
    /// Merchant goods id.
    pub goods_id: String,
    /// Quantity.
    pub quantity: i64,
    /// Unit price.
    pub unit_price: i64,
    /// Discount on these goods.
    pub discount_amount: i64,
    /// Goods remark.
    #[serde(default)]
    pub goods_remark: String,
}

/// Promotion applied to an order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Promotion {
    /// Coupon id.
    pub coupon_id: String,
    /// Promotion name.
    #[serde(default)]
    pub name: String,
    /// `GLOBAL` or `SINGLE`.
    #[serde(default)]
    pub scope: String,
    /// `CASH` or `NOCASH`.
    #[serde(default, rename = "type")]
    pub promotion_type: String,
    /// Coupon value.
    pub amount: i64,
    /// Campaign id.
    #[serde(default)]
    pub stock_id: String,
    /// Funded by the provider.
    #[serde(default)]
    pub wechatpay_contribute: i64,
    /// Funded by the merchant.
    #[serde(default)]
    pub merchant_contribute: i64,
    /// Funded by others.
    #[serde(default)]
    pub other_contribute: i64,
    /// Currency.
    #[serde(default)]
    pub currency: String,
    /// Goods covered.
    #[serde(default, rename = "goods_detail")]
    pub goods: Vec<PromotionGoods>,
}

/// Order query result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeQuery {
    /// App id.
    #[serde(default)]
    pub appid: String,
    /// Merchant id.
    #[serde(default)]
    pub mchid: String,
    /// Merchant trade number.
    #[serde(default)]
    pub out_trade_no: String,
    /// Provider transaction id.
    #[serde(default)]
    pub transaction_id: String,
    /// `JSAPI`, `NATIVE`, `APP`, ...
    #[serde(default)]
    pub trade_type: String,
    /// `SUCCESS`, `REFUND`, `NOTPAY`, `CLOSED`, ...
    #[serde(default)]
    pub trade_state: String,
    /// Human-readable trade state.
    #[serde(default)]
    pub trade_state_desc: String,
    /// Paying bank.
    #[serde(default)]
    pub bank_type: String,
    /// Merchant attachment.
    #[serde(default)]
    pub attach: String,
    /// Payment completion time.
    #[serde(default)]
    pub success_time: Option<Timestamp>,
    /// Payer.
    #[serde(default)]
    pub payer: Payer,
    /// Amount, present once paid.
    #[serde(default)]
    pub amount: Amount,
    /// Payment scene.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scene_info: Option<SceneInfo>,
    /// Promotions applied.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub promotion_detail: Vec<Promotion>,
}

// =============================================================================
// Refunds
// =============================================================================

/// Refund amounts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundsAmount {
    /// Amount to refund.
    pub refund: i64,
    /// Original order total.
    pub total: i64,
    /// Currency, `CNY`.
    pub currency: String,
    /// Cash paid by the payer.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub payer_total: i64,
    /// Amount returned to the payer.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub payer_refund: i64,
    /// Settlement refund.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub settlement_refund: i64,
    /// Settlement total.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub settlement_total: i64,
    /// Refunded promotion amount.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub discount_refund: i64,
}

/// Refunded goods line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundsGoodsDetail {
    /// Merchant goods id.
    pub merchant_goods_id: String,
    /// Provider goods id.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub wechatpay_goods_id: String,
    /// Goods name.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub goods_name: String,
    /// Unit price.
    pub unit_price: i64,
    /// Refund amount for this line.
    pub refund_amount: i64,
    /// Refund quantity.
    pub refund_quantity: i64,
}

/// Refund submission.
///
/// Exactly one of `transaction_id` and `out_trade_no` identifies the order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundsReq {
    /// Provider transaction id.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub transaction_id: String,
    /// Merchant trade number.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub out_trade_no: String,
    /// Merchant refund number, unique per merchant.
    pub out_refund_no: String,
    /// Refund reason shown to the payer.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,
    /// Refund result callback URL.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub notify_url: String,
    /// Funding account, `AVAILABLE`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub funds_account: String,
    /// Amounts.
    pub amount: RefundsAmount,
    /// Refunded goods.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub goods_detail: Vec<RefundsGoodsDetail>,
}

/// Promotion refund.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromotionDetail {
    /// Coupon id.
    pub promotion_id: String,
    /// `GLOBAL` or `SINGLE`.
    #[serde(default)]
    pub scope: String,
    /// `COUPON` or `DISCOUNT`.
    #[serde(default, rename = "type")]
    pub promotion_type: String,
    /// Coupon value.
    #[serde(default)]
    pub amount: i64,
    /// Refunded promotion amount.
    #[serde(default)]
    pub refund_amount: i64,
    /// Goods covered.
    #[serde(default, rename = "goods_detail", skip_serializing_if = "Vec::is_empty")]
    pub goods: Vec<RefundsGoodsDetail>,
}

/// Refund record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundsOrder {
    /// Provider refund id.
    pub refund_id: String,
    /// Merchant refund number.
    pub out_refund_no: String,
    /// Provider transaction id.
    #[serde(default)]
    pub transaction_id: String,
    /// Merchant trade number.
    #[serde(default)]
    pub out_trade_no: String,
    /// `ORIGINAL`, `BALANCE`, ...
    #[serde(default)]
    pub channel: String,
    /// Account receiving the refund.
    #[serde(default)]
    pub user_received_account: String,
    /// Refund completion time.
    #[serde(default)]
    pub success_time: Option<Timestamp>,
    /// Refund creation time.
    #[serde(default)]
    pub create_time: Option<Timestamp>,
    /// `SUCCESS`, `CLOSED`, `PROCESSING`, `ABNORMAL`.
    #[serde(default)]
    pub status: String,
    /// Funding account.
    #[serde(default)]
    pub funds_account: String,
    /// Amounts.
    #[serde(default)]
    pub amount: RefundsAmount,
    /// Promotion refunds.
    #[serde(default)]
    pub promotion_detail: Vec<PromotionDetail>,
}

// =============================================================================
// Bills
// =============================================================================

/// Bill download descriptor returned by the bill application endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bill {
    /// Absolute download URL.
    pub download_url: String,
    /// Digest algorithm, `SHA1`.
    #[serde(default)]
    pub hash_type: String,
    /// Hex digest of the uncompressed bill.
    #[serde(default)]
    pub hash_value: String,
    /// Compression requested, `GZIP` or empty.
    #[serde(default)]
    pub tar_type: String,
}

// =============================================================================
// Complaints
// =============================================================================

/// One page of a paginated list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    /// Items on this page.
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
    /// Offset of the first item.
    #[serde(default)]
    pub offset: u32,
    /// Page size.
    #[serde(default)]
    pub limit: u32,
    /// Total number of items.
    #[serde(default)]
    pub total_count: u32,
}

/// Order linked to a complaint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplaintOrderInfo {
    /// Provider transaction id.
    pub transaction_id: String,
    /// Merchant trade number.
    pub out_trade_no: String,
    /// Order amount.
    #[serde(default)]
    pub amount: i64,
}

/// Complaint detail.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Complaint {
    /// Complaint id.
    pub complaint_id: String,
    /// Complaint time.
    #[serde(default)]
    pub complaint_time: Option<Timestamp>,
    /// Complaint text.
    #[serde(default)]
    pub complaint_detail: String,
    /// Merchant complained about.
    #[serde(default, rename = "complainted_mchid")]
    pub complained_mchid: String,
    /// `PENDING`, `PROCESSING` or `PROCESSED`.
    #[serde(default)]
    pub complaint_state: String,
    /// Payer contact. Encrypted with the merchant public key on the wire;
    /// the client decrypts it when it can.
    #[serde(default)]
    pub payer_phone: String,
    /// Payer openid.
    #[serde(default)]
    pub payer_openid: String,
    /// Linked orders.
    #[serde(default, rename = "complaint_order_info")]
    pub orders: Vec<ComplaintOrderInfo>,
    /// Whether the order was fully refunded.
    #[serde(default)]
    pub complaint_full_refunded: bool,
    /// Whether a payer message awaits a reply.
    #[serde(default)]
    pub incoming_user_response: bool,
    /// How many times the payer complained.
    #[serde(default)]
    pub user_complaint_times: u32,
}

/// Complaint list page.
pub type ComplaintReply = Page<Complaint>;

/// Negotiation history entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NegotiationHistory {
    /// Log id.
    pub log_id: String,
    /// Operator.
    #[serde(default)]
    pub operator: String,
    /// Operation time.
    #[serde(default)]
    pub operate_time: String,
    /// Operation type.
    #[serde(default)]
    pub operate_type: String,
    /// Operation details.
    #[serde(default)]
    pub operate_details: String,
    /// Attached image ids.
    #[serde(default)]
    pub image_list: Vec<String>,
}

/// Negotiation history page.
pub type NegotiationHistoryReply = Page<NegotiationHistory>;

/// Complaint notification callback registration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplaintNotification {
    /// Merchant id.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub mchid: String,
    /// Callback URL.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_zero(v: &i64) -> bool {
    *v == 0
}
