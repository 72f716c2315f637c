use std::fmt::Debug;

use chrono::{DateTime, FixedOffset, Utc};
use log::*;
use lpg_common::{Secret, Twd};
use rand::Rng;
use serde::Serialize;
use thiserror::Error;

use crate::gateway::{check_mac_value, GatewayFields, CHECK_MAC_VALUE};

/// Fields the gateway rejects a payment request without.
pub const REQUIRED_FIELDS: [&str; 10] = [
    "MerchantID",
    "MerchantTradeNo",
    "MerchantTradeDate",
    "PaymentType",
    "TotalAmount",
    "TradeDesc",
    "ItemName",
    "ReturnURL",
    "ChoosePayment",
    "EncryptType",
];

const MAX_TRADE_NUMBER_LENGTH: usize = 20;
const PAYMENT_TYPE: &str = "aio";
const DEFAULT_CHOOSE_PAYMENT: &str = "ALL";
/// SHA-256
const ENCRYPT_TYPE: &str = "1";
const TRADE_DATE_FORMAT: &str = "%Y/%m/%d %H:%M:%S";
/// The gateway interprets trade dates in Taiwan time.
const GATEWAY_UTC_OFFSET_SECS: i32 = 8 * 3600;

#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("Missing required payment fields: {}", .0.join(", "))]
    MissingRequiredField(Vec<String>),
}

//--------------------------------------    GatewayConfig      ---------------------------------------------------------
#[derive(Clone, Default)]
pub struct GatewayConfig {
    pub merchant_id: String,
    pub hash_key: Secret<String>,
    pub hash_iv: Secret<String>,
    /// The checkout URL the customer's browser posts the payment form to
    pub api_url: String,
}

impl Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("merchant_id", &self.merchant_id)
            .field("api_url", &self.api_url)
            .field("hash_key", &self.hash_key)
            .field("hash_iv", &self.hash_iv)
            .finish()
    }
}

impl GatewayConfig {
    pub fn new(merchant_id: &str, hash_key: &str, hash_iv: &str, api_url: &str) -> Self {
        Self {
            merchant_id: merchant_id.to_string(),
            hash_key: Secret::new(hash_key.to_string()),
            hash_iv: Secret::new(hash_iv.to_string()),
            api_url: api_url.to_string(),
        }
    }

    pub fn is_complete(&self) -> bool {
        !(self.merchant_id.is_empty()
            || self.hash_key.reveal().is_empty()
            || self.hash_iv.reveal().is_empty()
            || self.api_url.is_empty())
    }
}

//--------------------------------------    PaymentRequest     ---------------------------------------------------------
/// The merchant-supplied part of a payment request. The client fills in the merchant id, constants and, unless given
/// here, the trade number and date.
#[derive(Debug, Clone, Default)]
pub struct PaymentRequest {
    pub merchant_trade_no: Option<String>,
    pub merchant_trade_date: Option<String>,
    pub total_amount: Twd,
    pub trade_desc: String,
    pub item_name: String,
    pub return_url: String,
    pub choose_payment: Option<String>,
    pub client_back_url: Option<String>,
    pub order_result_url: Option<String>,
    pub store_id: Option<String>,
    pub item_url: Option<String>,
    pub remark: Option<String>,
    pub choose_sub_payment: Option<String>,
    pub need_extra_paid_info: Option<String>,
    pub ignore_payment: Option<String>,
    pub platform_id: Option<String>,
    pub custom_fields: [Option<String>; 4],
    pub language: Option<String>,
}

impl PaymentRequest {
    pub fn new(total_amount: Twd, trade_desc: &str, item_name: &str, return_url: &str) -> Self {
        Self {
            total_amount,
            trade_desc: trade_desc.to_string(),
            item_name: item_name.to_string(),
            return_url: return_url.to_string(),
            ..Default::default()
        }
    }

    pub fn with_trade_number(mut self, trade_no: &str, trade_date: &str) -> Self {
        self.merchant_trade_no = Some(trade_no.to_string());
        self.merchant_trade_date = Some(trade_date.to_string());
        self
    }

    pub fn with_redirects(mut self, client_back_url: &str, order_result_url: &str) -> Self {
        self.client_back_url = Some(client_back_url.to_string());
        self.order_result_url = Some(order_result_url.to_string());
        self
    }

    /// Sets `CustomField{index}`. Indices outside 1..=4 are ignored.
    pub fn with_custom_field(mut self, index: usize, value: &str) -> Self {
        match index.checked_sub(1).and_then(|i| self.custom_fields.get_mut(i)) {
            Some(slot) => *slot = Some(value.to_string()),
            None => warn!("🧾️ CustomField{index} does not exist. Value ignored"),
        }
        self
    }

    pub fn with_language(mut self, language: Option<&str>) -> Self {
        self.language = language.map(String::from);
        self
    }
}

/// Maps a site locale onto the gateway's checkout language. Traditional Chinese is the gateway default, so `tw` sends
/// no language at all.
pub fn language_for_locale(locale: &str) -> Option<&'static str> {
    match locale {
        "tw" => None,
        "jp" => Some("JPN"),
        "kr" => Some("KOR"),
        _ => Some("ENG"),
    }
}

//--------------------------------------      PaymentForm      ---------------------------------------------------------
/// A signed payment form. The customer's browser posts `fields` to `api_url`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentForm {
    pub api_url: String,
    #[serde(rename = "formData")]
    pub fields: GatewayFields,
}

impl PaymentForm {
    pub fn trade_number(&self) -> Option<&str> {
        self.fields.get("MerchantTradeNo")
    }
}

//--------------------------------------  PaymentGatewayClient ---------------------------------------------------------
#[derive(Debug, Clone)]
pub struct PaymentGatewayClient {
    config: GatewayConfig,
}

impl PaymentGatewayClient {
    pub fn new(config: GatewayConfig) -> Self {
        if !config.is_complete() {
            warn!("🧾️ The payment gateway configuration is incomplete. The gateway will reject payment requests.");
        }
        Self { config }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Generates a merchant trade number: six random hex digits followed by the last eight digits of the current
    /// millisecond timestamp. The result is always 14 characters long.
    pub fn generate_trade_number(&self, now: DateTime<Utc>) -> String {
        let prefix = rand::thread_rng().gen_range(0..0x100_0000u32);
        let millis = now.timestamp_millis().unsigned_abs().to_string();
        let suffix = &millis[millis.len().saturating_sub(8)..];
        let result = format!("{prefix:06x}{suffix}");
        debug_assert!(result.len() <= MAX_TRADE_NUMBER_LENGTH);
        result
    }

    /// Formats `now` as `yyyy/MM/dd HH:mm:ss` in the gateway's timezone.
    pub fn generate_trade_date(&self, now: DateTime<Utc>) -> String {
        match FixedOffset::east_opt(GATEWAY_UTC_OFFSET_SECS) {
            Some(tz) => now.with_timezone(&tz).format(TRADE_DATE_FORMAT).to_string(),
            None => now.format(TRADE_DATE_FORMAT).to_string(),
        }
    }

    pub fn build_signature(&self, fields: &GatewayFields) -> String {
        check_mac_value(fields, self.config.hash_key.reveal(), self.config.hash_iv.reveal())
    }

    /// Assembles the full form for the request, validates that every required field is present and signs it.
    pub fn build_payment_form(
        &self,
        request: &PaymentRequest,
        now: DateTime<Utc>,
    ) -> Result<PaymentForm, GatewayError> {
        let mut fields = GatewayFields::new();
        fields.insert("MerchantID", self.config.merchant_id.as_str());
        let trade_no = match request.merchant_trade_no.as_deref().filter(|s| !s.is_empty()) {
            Some(no) => no.to_string(),
            None => self.generate_trade_number(now),
        };
        fields.insert("MerchantTradeNo", trade_no);
        let trade_date = match request.merchant_trade_date.as_deref().filter(|s| !s.is_empty()) {
            Some(date) => date.to_string(),
            None => self.generate_trade_date(now),
        };
        fields.insert("MerchantTradeDate", trade_date);
        fields.insert("PaymentType", PAYMENT_TYPE);
        fields.insert("TotalAmount", request.total_amount.value().to_string());
        fields.insert("TradeDesc", request.trade_desc.trim());
        fields.insert("ItemName", request.item_name.as_str());
        fields.insert("ReturnURL", request.return_url.as_str());
        let choose_payment =
            request.choose_payment.as_deref().filter(|s| !s.is_empty()).unwrap_or(DEFAULT_CHOOSE_PAYMENT);
        fields.insert("ChoosePayment", choose_payment);
        fields.insert("EncryptType", ENCRYPT_TYPE);

        fields.insert_optional("ClientBackURL", request.client_back_url.as_deref());
        fields.insert_optional("OrderResultURL", request.order_result_url.as_deref());
        fields.insert_optional("StoreID", request.store_id.as_deref());
        fields.insert_optional("ItemURL", request.item_url.as_deref());
        fields.insert_optional("Remark", request.remark.as_deref());
        fields.insert_optional("ChooseSubPayment", request.choose_sub_payment.as_deref());
        fields.insert_optional("NeedExtraPaidInfo", request.need_extra_paid_info.as_deref());
        fields.insert_optional("IgnorePayment", request.ignore_payment.as_deref());
        fields.insert_optional("PlatformID", request.platform_id.as_deref());
        for (i, value) in request.custom_fields.iter().enumerate() {
            fields.insert_optional(format!("CustomField{}", i + 1), value.as_deref());
        }
        fields.insert_optional("Language", request.language.as_deref());

        let missing = REQUIRED_FIELDS
            .iter()
            .filter(|&&name| fields.get(name).map(str::is_empty).unwrap_or(true))
            .map(|&name| name.to_string())
            .collect::<Vec<String>>();
        if !missing.is_empty() {
            warn!("🧾️ Payment request is missing required fields: {}", missing.join(", "));
            return Err(GatewayError::MissingRequiredField(missing));
        }

        let mac = self.build_signature(&fields);
        fields.insert(CHECK_MAC_VALUE, mac);
        trace!("🧾️ Payment form for trade {} signed", fields.get("MerchantTradeNo").unwrap_or_default());
        Ok(PaymentForm { api_url: self.config.api_url.clone(), fields })
    }

    /// Returns true iff the received `CheckMacValue` matches the checksum of the remaining fields. A missing
    /// checksum is a mismatch.
    pub fn verify_callback(&self, fields: &GatewayFields) -> bool {
        let mut fields = fields.clone();
        let received = match fields.remove(CHECK_MAC_VALUE) {
            Some(mac) => mac,
            None => {
                debug!("🧾️ Callback has no {CHECK_MAC_VALUE}");
                return false;
            },
        };
        let expected = self.build_signature(&fields);
        received == expected
    }
}
