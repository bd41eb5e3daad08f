//! WiZ JSON-over-UDP messages
//!
//! Every request is a single datagram `{"method": .., "params": {..}}`.
//! Replies carry either `result` or `error`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use wiz_core::DeviceError;
use wiz_core::normalizer::brightness_to_percent;

pub(crate) const GET_PILOT: &str = "getPilot";
pub(crate) const SET_PILOT: &str = "setPilot";
pub(crate) const REGISTRATION: &str = "registration";

#[derive(Debug, Serialize)]
struct Request<'a, P: Serialize> {
    method: &'a str,
    params: P,
}

#[derive(Debug, Default, Serialize)]
struct Empty {}

/// `setPilot` parameters; unset fields are left unchanged by the bulb
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PilotParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    state: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    scene_id: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dimming: Option<u8>,
}

impl PilotParams {
    pub(crate) fn power(on: bool) -> Self {
        Self {
            state: Some(on),
            ..Self::default()
        }
    }

    /// Switch on with a scene, optionally at a 0-255 brightness
    pub(crate) fn scene(scene_id: u32, brightness: Option<u8>) -> Self {
        Self {
            state: Some(true),
            scene_id: Some(scene_id),
            dimming: brightness.map(brightness_to_percent),
        }
    }
}

/// Registration parameters used to make bulbs announce themselves
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RegistrationParams {
    phone_mac: &'static str,
    register: bool,
    phone_ip: &'static str,
    id: &'static str,
}

#[derive(Debug, Deserialize)]
struct Reply {
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<ReplyError>,
}

#[derive(Debug, Deserialize)]
struct ReplyError {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

fn encode<P: Serialize>(method: &str, params: P) -> Vec<u8> {
    // Serializing these plain structs cannot fail
    serde_json::to_vec(&Request { method, params }).unwrap_or_default()
}

pub(crate) fn get_pilot() -> Vec<u8> {
    encode(GET_PILOT, Empty {})
}

pub(crate) fn set_pilot(params: PilotParams) -> Vec<u8> {
    encode(SET_PILOT, params)
}

pub(crate) fn registration() -> Vec<u8> {
    encode(
        REGISTRATION,
        RegistrationParams {
            phone_mac: "AAAAAAAAAAAA",
            register: false,
            phone_ip: "1.2.3.4",
            id: "1",
        },
    )
}

/// Outcome of decoding one datagram
#[derive(Debug)]
pub(crate) enum Decoded {
    /// Reply to the request that was sent
    Result(Value),
    /// Reply to some other request; keep waiting
    Unrelated,
}

/// Decode a reply to `method` received from `address`
pub(crate) fn decode_reply(
    bytes: &[u8],
    method: &str,
    address: &str,
) -> Result<Decoded, DeviceError> {
    let reply: Reply = serde_json::from_slice(bytes)
        .map_err(|e| DeviceError::protocol(address, format!("malformed reply: {}", e)))?;

    if reply.method.as_deref().is_some_and(|m| m != method) {
        return Ok(Decoded::Unrelated);
    }

    if let Some(error) = reply.error {
        return Err(DeviceError::protocol(
            address,
            format!("bulb error {}: {}", error.code, error.message),
        ));
    }

    match reply.result {
        Some(result @ Value::Object(_)) => Ok(Decoded::Result(result)),
        Some(other) => Err(DeviceError::protocol(
            address,
            format!("unexpected result: {}", other),
        )),
        None => Err(DeviceError::protocol(address, "reply has no result")),
    }
}

/// Check a `setPilot` result
pub(crate) fn ensure_success(result: &Value, address: &str) -> Result<(), DeviceError> {
    match result.get("success").and_then(Value::as_bool) {
        Some(false) => Err(DeviceError::protocol(address, "bulb rejected the command")),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiz_core::FailureKind;

    fn as_json(bytes: Vec<u8>) -> Value {
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_request_encoding() {
        assert_eq!(
            as_json(get_pilot()),
            json!({ "method": "getPilot", "params": {} })
        );
        assert_eq!(
            as_json(set_pilot(PilotParams::power(false))),
            json!({ "method": "setPilot", "params": { "state": false } })
        );
        assert_eq!(
            as_json(set_pilot(PilotParams::scene(11, Some(255)))),
            json!({
                "method": "setPilot",
                "params": { "state": true, "sceneId": 11, "dimming": 100 }
            })
        );
        assert_eq!(
            as_json(set_pilot(PilotParams::scene(4, None))),
            json!({ "method": "setPilot", "params": { "state": true, "sceneId": 4 } })
        );
    }

    #[test]
    fn test_registration_encoding() {
        let message = as_json(registration());
        assert_eq!(message["method"], "registration");
        assert_eq!(message["params"]["register"], false);
        assert_eq!(message["params"]["phoneMac"], "AAAAAAAAAAAA");
    }

    #[test]
    fn test_decode_result() {
        let bytes = br#"{"method":"getPilot","env":"pro","result":{"state":true,"sceneId":11}}"#;
        match decode_reply(bytes, GET_PILOT, "10.0.0.5").unwrap() {
            Decoded::Result(result) => assert_eq!(result["sceneId"], 11),
            Decoded::Unrelated => panic!("expected a result"),
        }
    }

    #[test]
    fn test_decode_unrelated_method() {
        let bytes = br#"{"method":"syncPilot","params":{"state":true}}"#;
        assert!(matches!(
            decode_reply(bytes, GET_PILOT, "10.0.0.5").unwrap(),
            Decoded::Unrelated
        ));
    }

    #[test]
    fn test_decode_failures_are_protocol_errors() {
        let cases: [&[u8]; 4] = [
            b"not json",
            br#"{"method":"setPilot","error":{"code":-32600,"message":"Invalid Request"}}"#,
            br#"{"method":"setPilot"}"#,
            br#"{"method":"setPilot","result":[1,2]}"#,
        ];
        for bytes in cases {
            let err = decode_reply(bytes, SET_PILOT, "10.0.0.5").unwrap_err();
            assert_eq!(err.kind(), FailureKind::Protocol, "{:?}", err);
        }
    }

    #[test]
    fn test_ensure_success() {
        assert!(ensure_success(&json!({ "success": true }), "a").is_ok());
        assert!(ensure_success(&json!({}), "a").is_ok());
        assert!(ensure_success(&json!({ "success": false }), "a").is_err());
    }
}
