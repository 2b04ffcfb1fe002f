//! WebAssembly bindings for the U2F demo page.
//!
//! The page's JavaScript shell owns the `u2f.register` / `u2f.sign` calls.
//! These helpers give it the same fragment routing, countdown arithmetic and
//! response parsing the native controller uses.
//!
//! Every function returns a JSON string; failures carry an `error` field
//! instead of throwing.

use std::time::Duration;

use serde::Serialize;
use serde_json::json;
use u2f_core::{
    parse_registration, parse_signature, percent_remaining, AppId, DeviceResult, ParseError,
    RegisterResponse, RouteState, SignResponse,
};
use wasm_bindgen::prelude::*;

/// Initialize panic hook for better error messages in browser console.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// Result of parsing a raw device response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseReport<T> {
    /// Whether `parsed` holds a result
    pub ok: bool,
    /// Parsed message fields
    pub parsed: Option<T>,
    /// Device error code, when the response was `{"errorCode": n}`
    pub error_code: Option<u16>,
    /// Error message if parsing failed
    pub error: Option<String>,
}

impl<T> ParseReport<T> {
    fn failed(error_code: Option<u16>, error: String) -> Self {
        Self {
            ok: false,
            parsed: None,
            error_code,
            error: Some(error),
        }
    }
}

/// Resolve a fragment identifier (with or without `#`).
///
/// # Returns
/// `{"route", "fragment", "rewritten", "view", "nav"}`; `fragment` is what
/// the address bar should show.
#[wasm_bindgen]
pub fn normalize_route(fragment: &str) -> String {
    let mut state = RouteState::default();
    let rewritten = state.apply(fragment);
    let route = state.route();

    json!({
        "route": route,
        "fragment": state.displayed_fragment(),
        "rewritten": rewritten,
        "view": route.active_view(),
        "nav": route.nav_items(),
    })
    .to_string()
}

/// Parse the JSON handed to the `u2f.register` callback.
#[wasm_bindgen]
pub fn parse_registration_json(response_json: &str) -> String {
    to_json(&parse_response(response_json, parse_registration))
}

/// Parse the JSON handed to the `u2f.sign` callback.
#[wasm_bindgen]
pub fn parse_signature_json(response_json: &str) -> String {
    to_json(&parse_response(response_json, parse_signature))
}

fn parse_response<R, T>(
    response_json: &str,
    parse: fn(&R) -> Result<T, ParseError>,
) -> ParseReport<T>
where
    R: serde::de::DeserializeOwned,
{
    let result: DeviceResult<R> = match serde_json::from_str(response_json) {
        Ok(result) => result,
        Err(e) => return ParseReport::failed(None, format!("Invalid response JSON: {e}")),
    };

    match result {
        DeviceResult::Error { error_code } => {
            ParseReport::failed(Some(error_code.0), format!("Device error: {error_code}"))
        }
        DeviceResult::Success(response) => match parse(&response) {
            Ok(parsed) => ParseReport {
                ok: true,
                parsed: Some(parsed),
                error_code: None,
                error: None,
            },
            Err(e) => {
                console_warn(&format!("U2F response could not be parsed: {e}"));
                ParseReport::failed(None, e.to_string())
            }
        },
    }
}

/// Countdown percentage for a ceremony started at `started_at_ms`
/// (`Date.now()` milliseconds) with a budget of `budget_secs`.
#[wasm_bindgen]
pub fn countdown_percent(started_at_ms: f64, budget_secs: f64) -> u8 {
    percent_at(js_sys::Date::now(), started_at_ms, budget_secs)
}

fn percent_at(now_ms: f64, started_at_ms: f64, budget_secs: f64) -> u8 {
    // Float-to-int casts saturate, so NaN and negatives become 0
    let elapsed = Duration::from_millis((now_ms - started_at_ms).max(0.0) as u64);
    let total = Duration::from_millis((budget_secs * 1000.0).max(0.0) as u64);
    percent_remaining(elapsed, total)
}

/// Relying-party id for a page URL.
///
/// # Returns
/// `{"appId": "..."}` or `{"error": "..."}`
#[wasm_bindgen]
pub fn relying_party_id(page_url: &str) -> String {
    match AppId::from_origin(page_url) {
        Ok(app_id) => json!({ "appId": app_id }).to_string(),
        Err(e) => json!({ "error": e.to_string() }).to_string(),
    }
}

/// Get the library version.
#[wasm_bindgen]
pub fn get_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value)
        .unwrap_or_else(|e| json!({ "ok": false, "error": format!("Serialization error: {e}") }).to_string())
}

fn console_warn(message: &str) {
    #[cfg(target_arch = "wasm32")]
    web_sys::console::warn_1(&JsValue::from_str(message));
    #[cfg(not(target_arch = "wasm32"))]
    let _ = message;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn parse(json: &str) -> Value {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_normalize_route() {
        let reg = parse(&normalize_route("#reg"));
        assert_eq!(reg["route"], "registration");
        assert_eq!(reg["fragment"], "reg");
        assert_eq!(reg["rewritten"], false);
        assert_eq!(reg["nav"][0]["active"], true);

        let unknown = parse(&normalize_route("#whatever"));
        assert_eq!(unknown["route"], "about");
        assert_eq!(unknown["fragment"], "");
        assert_eq!(unknown["rewritten"], true);
        assert_eq!(unknown["view"], "registration_form");
    }

    #[test]
    fn test_parse_device_error() {
        let report = parse(&parse_registration_json(r#"{"errorCode": 4}"#));
        assert_eq!(report["ok"], false);
        assert_eq!(report["errorCode"], 4);
        assert_eq!(report["error"], "Device error: 4 (DEVICE_INELIGIBLE)");
        assert!(report["parsed"].is_null());
    }

    #[test]
    fn test_parse_invalid_json() {
        let report = parse(&parse_signature_json("not json"));
        assert_eq!(report["ok"], false);
        assert!(report["error"]
            .as_str()
            .unwrap()
            .starts_with("Invalid response JSON"));
    }

    #[test]
    fn test_parse_signature() {
        // flags 0x01, counter 7, 2-byte signature
        let signature_data = u2f_core::parser::websafe_encode([1, 0, 0, 0, 7, 0x30, 0x00]);
        let client_data = u2f_core::parser::websafe_encode(
            r#"{"typ":"navigator.id.getAssertion","challenge":"c","origin":"https://x.test"}"#,
        );
        let response = json!({
            "keyHandle": "a2g",
            "signatureData": signature_data,
            "clientData": client_data,
        });

        let report = parse(&parse_signature_json(&response.to_string()));
        assert_eq!(report["ok"], true, "{report}");
        assert_eq!(report["parsed"]["counter"], 7);
        assert_eq!(report["parsed"]["userPresence"], true);
        assert_eq!(report["parsed"]["clientData"]["origin"], "https://x.test");
    }

    #[test]
    fn test_parse_unparseable_signature() {
        let response = json!({
            "keyHandle": "a2g",
            "signatureData": "AQ",
            "clientData": "e30",
        });
        let report = parse(&parse_signature_json(&response.to_string()));
        assert_eq!(report["ok"], false);
        assert!(report["errorCode"].is_null());
        assert!(report["error"].is_string());
    }

    #[test]
    fn test_percent_at() {
        assert_eq!(percent_at(1_000.0, 1_000.0, 30.0), 100);
        assert_eq!(percent_at(16_000.0, 1_000.0, 30.0), 50);
        assert_eq!(percent_at(60_000.0, 1_000.0, 30.0), 0);
        // Clock skew and bad input never panic
        assert_eq!(percent_at(0.0, 5_000.0, 30.0), 100);
        assert_eq!(percent_at(f64::NAN, 0.0, 30.0), 100);
        assert_eq!(percent_at(1_000.0, 0.0, 0.0), 0);
    }

    #[test]
    fn test_relying_party_id() {
        let ok = parse(&relying_party_id("https://example.com:8443/u2f/index.html#reg"));
        assert_eq!(ok["appId"], "https://example.com:8443");

        let err = parse(&relying_party_id("not a url"));
        assert!(err["error"].as_str().unwrap().contains("Invalid origin"));
    }

    #[test]
    fn test_get_version() {
        assert_eq!(get_version(), env!("CARGO_PKG_VERSION"));
    }
}
