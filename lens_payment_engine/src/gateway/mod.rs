//! # Payment gateway client
//!
//! Builds signed payment requests for the ECPay all-in-one checkout, and verifies the `CheckMacValue` on the
//! notifications it posts back.
//!
//! The checksum is recomputed by the gateway from the exact same fields, so [`check_mac_value`] must be reproduced
//! bit-for-bit. Fields live in a [`GatewayFields`] map, which iterates in key order, so the signature does not depend
//! on the order in which fields were added.
mod client;
mod fields;
mod signature;

pub use client::{
    language_for_locale,
    GatewayConfig,
    GatewayError,
    PaymentForm,
    PaymentGatewayClient,
    PaymentRequest,
    REQUIRED_FIELDS,
};
pub use fields::GatewayFields;
pub use signature::{check_mac_value, encode_uri_component};

/// The form field that carries the checksum.
pub const CHECK_MAC_VALUE: &str = "CheckMacValue";
/// The field the local order id is round-tripped in.
pub const CORRELATION_FIELD: &str = "CustomField1";
/// The notification field carrying the gateway's result code.
pub const RETURN_CODE: &str = "RtnCode";
/// The `RtnCode` value that signals a successful payment.
pub const RETURN_CODE_SUCCESS: &str = "1";
