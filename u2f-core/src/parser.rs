//! Parsing of raw U2F device responses.
//!
//! Converts the websafe-base64 payloads returned by `u2f.register` and
//! `u2f.sign` into structured fields. Signatures are not verified here; this
//! module only decodes the FIDO U2F raw message formats.
//!
//! Every function returns a [`ParseError`] on malformed input and never
//! panics, so callers can store the failure instead of aborting a ceremony.

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::protocol::{RegisterResponse, SignResponse};

/// Websafe base64: URL alphabet, unpadded on encode, padding optional on decode.
const WEBSAFE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Reserved first byte of a registration response message.
const REGISTRATION_RESERVED_BYTE: u8 = 0x05;

/// Uncompressed P-256 point: 0x04 || X (32) || Y (32).
const PUBLIC_KEY_LEN: usize = 65;
const UNCOMPRESSED_POINT_TAG: u8 = 0x04;

const DER_SEQUENCE_TAG: u8 = 0x30;

const USER_PRESENCE_FLAG: u8 = 0x01;

#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ParseError {
    #[error("{field} is not valid websafe base64: {reason}")]
    Base64 { field: &'static str, reason: String },

    #[error("{field} truncated: needed {needed} bytes, {available} available")]
    Truncated {
        field: &'static str,
        needed: usize,
        available: usize,
    },

    #[error("Unexpected reserved byte 0x{0:02x} (expected 0x05)")]
    ReservedByte(u8),

    #[error("Public key is not an uncompressed point (tag 0x{0:02x})")]
    PublicKeyFormat(u8),

    #[error("Key handle is empty")]
    EmptyKeyHandle,

    #[error("Attestation certificate: {0}")]
    Certificate(String),

    #[error("Signature is empty")]
    EmptySignature,

    #[error("Client data: {0}")]
    ClientData(String),
}

/// Decoded `clientData` JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientData {
    pub typ: String,
    pub challenge: String,
    pub origin: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cid_pubkey: Option<serde_json::Value>,
}

/// Structured registration result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedRegistration {
    /// Websafe base64, unpadded; the form `u2f.sign` expects.
    pub key_handle: String,
    /// Hex-encoded uncompressed P-256 public key.
    pub public_key: String,
    /// Hex-encoded DER attestation certificate.
    pub attestation_certificate: String,
    /// Hex-encoded DER ECDSA signature.
    pub signature: String,
    pub client_data: ClientData,
}

/// Structured signing result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedSignature {
    pub key_handle: String,
    pub user_presence: bool,
    pub counter: u32,
    /// Hex-encoded DER ECDSA signature.
    pub signature: String,
    pub client_data: ClientData,
}

pub type ParseResult<T> = std::result::Result<T, ParseError>;

/// Encode bytes as unpadded websafe base64.
pub fn websafe_encode(bytes: impl AsRef<[u8]>) -> String {
    WEBSAFE.encode(bytes)
}

/// Decode websafe base64, with or without padding.
pub fn websafe_decode(field: &'static str, encoded: &str) -> ParseResult<Vec<u8>> {
    WEBSAFE
        .decode(encoded.trim())
        .map_err(|e| ParseError::Base64 {
            field,
            reason: e.to_string(),
        })
}

/// Parse a successful registration payload.
pub fn parse_registration(response: &RegisterResponse) -> ParseResult<ParsedRegistration> {
    let data = websafe_decode("registrationData", &response.registration_data)?;
    let mut reader = Reader::new("registrationData", &data);

    let reserved = reader.byte()?;
    if reserved != REGISTRATION_RESERVED_BYTE {
        return Err(ParseError::ReservedByte(reserved));
    }

    let public_key = reader.take(PUBLIC_KEY_LEN)?;
    if public_key[0] != UNCOMPRESSED_POINT_TAG {
        return Err(ParseError::PublicKeyFormat(public_key[0]));
    }

    let key_handle_len = reader.byte()? as usize;
    if key_handle_len == 0 {
        return Err(ParseError::EmptyKeyHandle);
    }
    let key_handle = reader.take(key_handle_len)?;

    let cert_len = der_element_len(reader.rest())?;
    let certificate = reader.take(cert_len)?;

    let signature = reader.rest();
    if signature.is_empty() {
        return Err(ParseError::EmptySignature);
    }

    Ok(ParsedRegistration {
        key_handle: websafe_encode(key_handle),
        public_key: hex::encode(public_key),
        attestation_certificate: hex::encode(certificate),
        signature: hex::encode(signature),
        client_data: parse_client_data(&response.client_data)?,
    })
}

/// Parse a successful signing payload.
pub fn parse_signature(response: &SignResponse) -> ParseResult<ParsedSignature> {
    let data = websafe_decode("signatureData", &response.signature_data)?;
    let mut reader = Reader::new("signatureData", &data);

    let flags = reader.byte()?;
    let counter = reader.take(4)?;
    let counter = u32::from_be_bytes([counter[0], counter[1], counter[2], counter[3]]);

    let signature = reader.rest();
    if signature.is_empty() {
        return Err(ParseError::EmptySignature);
    }

    Ok(ParsedSignature {
        key_handle: response.key_handle.clone(),
        user_presence: flags & USER_PRESENCE_FLAG != 0,
        counter,
        signature: hex::encode(signature),
        client_data: parse_client_data(&response.client_data)?,
    })
}

/// Decode the websafe-base64 `clientData` JSON.
pub fn parse_client_data(encoded: &str) -> ParseResult<ClientData> {
    let json = websafe_decode("clientData", encoded)?;
    serde_json::from_slice(&json).map_err(|e| ParseError::ClientData(e.to_string()))
}

/// Total length (header + content) of the DER element at the start of `data`.
fn der_element_len(data: &[u8]) -> ParseResult<usize> {
    let (&tag, rest) = data
        .split_first()
        .ok_or_else(|| ParseError::Certificate("missing".into()))?;
    if tag != DER_SEQUENCE_TAG {
        return Err(ParseError::Certificate(format!(
            "expected SEQUENCE tag, found 0x{tag:02x}"
        )));
    }

    let (&first, rest) = rest
        .split_first()
        .ok_or_else(|| ParseError::Certificate("missing length".into()))?;

    let (header_len, content_len) = if first & 0x80 == 0 {
        (2, first as usize)
    } else {
        let octets = (first & 0x7f) as usize;
        if octets == 0 || octets > 4 || rest.len() < octets {
            return Err(ParseError::Certificate(format!(
                "unsupported length encoding 0x{first:02x}"
            )));
        }
        let len = rest[..octets]
            .iter()
            .fold(0usize, |acc, &b| (acc << 8) | b as usize);
        (2 + octets, len)
    };

    header_len
        .checked_add(content_len)
        .ok_or_else(|| ParseError::Certificate("length overflow".into()))
}

/// Bounds-checked cursor over a decoded message.
struct Reader<'a> {
    field: &'static str,
    data: &'a [u8],
}

impl<'a> Reader<'a> {
    fn new(field: &'static str, data: &'a [u8]) -> Self {
        Self { field, data }
    }

    fn take(&mut self, n: usize) -> ParseResult<&'a [u8]> {
        if self.data.len() < n {
            return Err(ParseError::Truncated {
                field: self.field,
                needed: n,
                available: self.data.len(),
            });
        }
        let (head, tail) = self.data.split_at(n);
        self.data = tail;
        Ok(head)
    }

    fn byte(&mut self) -> ParseResult<u8> {
        Ok(self.take(1)?[0])
    }

    fn rest(&self) -> &'a [u8] {
        self.data
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn client_data(typ: &str, challenge: &str) -> String {
        websafe_encode(
            serde_json::json!({
                "typ": typ,
                "challenge": challenge,
                "origin": "https://demo.example.com",
            })
            .to_string(),
        )
    }

    pub(crate) fn registration_bytes(key_handle: &[u8]) -> Vec<u8> {
        let mut data = vec![0x05, 0x04];
        data.extend_from_slice(&[0xAA; 64]);
        data.push(key_handle.len() as u8);
        data.extend_from_slice(key_handle);
        // SEQUENCE with a long-form length of 130 bytes
        data.extend_from_slice(&[0x30, 0x81, 0x82]);
        data.extend_from_slice(&[0xCC; 130]);
        data.extend_from_slice(&[0x30, 0x45, 0x02, 0x21, 0x00]);
        data
    }

    #[test]
    fn test_parse_registration() {
        let response = RegisterResponse {
            registration_data: websafe_encode(registration_bytes(b"handle-123")),
            client_data: client_data("navigator.id.finishEnrollment", "chal"),
            version: Some("U2F_V2".into()),
        };

        let parsed = parse_registration(&response).unwrap();
        assert_eq!(parsed.key_handle, websafe_encode(b"handle-123"));
        assert_eq!(parsed.public_key.len(), 130);
        assert!(parsed.public_key.starts_with("04aa"));
        assert_eq!(parsed.attestation_certificate.len(), (3 + 130) * 2);
        assert_eq!(parsed.signature, "3045022100");
        assert_eq!(parsed.client_data.challenge, "chal");
        assert_eq!(parsed.client_data.typ, "navigator.id.finishEnrollment");
    }

    #[test]
    fn test_parse_registration_accepts_padded_base64() {
        let padded = base64::engine::general_purpose::URL_SAFE
            .encode(registration_bytes(b"kh"));
        let response = RegisterResponse {
            registration_data: padded,
            client_data: client_data("navigator.id.finishEnrollment", "c"),
            version: None,
        };
        assert!(parse_registration(&response).is_ok());
    }

    #[test]
    fn test_parse_registration_rejects_malformed() {
        let good = registration_bytes(b"kh");
        let cd = client_data("navigator.id.finishEnrollment", "c");
        let reg = |bytes: &[u8]| RegisterResponse {
            registration_data: websafe_encode(bytes),
            client_data: cd.clone(),
            version: None,
        };

        let mut wrong_reserved = good.clone();
        wrong_reserved[0] = 0x00;
        assert_eq!(
            parse_registration(&reg(&wrong_reserved)),
            Err(ParseError::ReservedByte(0x00))
        );

        let mut compressed = good.clone();
        compressed[1] = 0x02;
        assert_eq!(
            parse_registration(&reg(&compressed)),
            Err(ParseError::PublicKeyFormat(0x02))
        );

        assert!(matches!(
            parse_registration(&reg(&good[..40])),
            Err(ParseError::Truncated { .. })
        ));

        // Certificate present but no signature after it
        let no_sig = &good[..good.len() - 5];
        assert_eq!(
            parse_registration(&reg(no_sig)),
            Err(ParseError::EmptySignature)
        );

        assert!(matches!(
            parse_registration(&RegisterResponse {
                registration_data: "***".into(),
                client_data: cd.clone(),
                version: None,
            }),
            Err(ParseError::Base64 { .. })
        ));
    }

    #[test]
    fn test_parse_registration_rejects_bad_client_data() {
        let response = RegisterResponse {
            registration_data: websafe_encode(registration_bytes(b"kh")),
            client_data: websafe_encode(b"not json"),
            version: None,
        };
        assert!(matches!(
            parse_registration(&response),
            Err(ParseError::ClientData(_))
        ));
    }

    #[test]
    fn test_parse_signature() {
        let mut data = vec![0x01, 0x00, 0x00, 0x01, 0x2c];
        data.extend_from_slice(&[0x30, 0x44]);

        let response = SignResponse {
            key_handle: "a2g".into(),
            signature_data: websafe_encode(&data),
            client_data: client_data("navigator.id.getAssertion", "SigningChallenge"),
        };

        let parsed = parse_signature(&response).unwrap();
        assert!(parsed.user_presence);
        assert_eq!(parsed.counter, 300);
        assert_eq!(parsed.signature, "3044");
        assert_eq!(parsed.key_handle, "a2g");
        assert_eq!(parsed.client_data.challenge, "SigningChallenge");
    }

    #[test]
    fn test_parse_signature_rejects_short_data() {
        let response = SignResponse {
            key_handle: "a2g".into(),
            signature_data: websafe_encode([0x01, 0x00, 0x00, 0x00, 0x01]),
            client_data: client_data("navigator.id.getAssertion", "c"),
        };
        assert_eq!(parse_signature(&response), Err(ParseError::EmptySignature));

        let response = SignResponse {
            signature_data: String::new(),
            ..response
        };
        assert!(matches!(
            parse_signature(&response),
            Err(ParseError::Truncated { needed: 1, available: 0, .. })
        ));
    }

    #[test]
    fn test_der_length_forms() {
        assert_eq!(der_element_len(&[0x30, 0x03, 1, 2, 3]).unwrap(), 5);
        assert_eq!(der_element_len(&[0x30, 0x82, 0x01, 0x00]).unwrap(), 4 + 256);
        assert!(der_element_len(&[0x02, 0x01]).is_err());
        assert!(der_element_len(&[0x30, 0x80]).is_err());
        assert!(der_element_len(&[0x30, 0x85, 1, 1, 1, 1, 1]).is_err());
        assert!(der_element_len(&[]).is_err());
    }
}
