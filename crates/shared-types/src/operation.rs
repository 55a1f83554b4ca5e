//! # Operation Table
//!
//! The fixed set of upstream operations. Each operation has a stable name used
//! in logs and HTTP routes, a camelCase routing key used on the message bus,
//! and an upstream HTTP method and path.
//!
//! | Operation            | Routing key                 | Method | Upstream path                                   |
//! |----------------------|-----------------------------|--------|-------------------------------------------------|
//! | `enroll-data`        | `enrollData`                | POST   | `/visaIdCredential/v1/enrollData`               |
//! | `enroll-instruments` | `enrollPaymentInstruments`  | POST   | `/visaIdCredential/v1/enrollPaymentInstruments` |
//! | `get-status`         | `requestStatus`             | GET    | `/visaIdCredential/v1/requestStatus/{id}`       |
//! | `manage-instruments` | `managePaymentInstruments`  | PUT    | `/visaIdCredential/v1/managePaymentInstruments` |
//! | `manage-consumer`    | `manageConsumerInformation` | PUT    | `/visaIdCredential/v1/manageConsumerInformation`|
//! | `delete-consumer`    | `deleteConsumerInformation` | POST   | `/visaIdCredential/v1/deleteConsumerInformation`|
//! | `delete-instruments` | `deletePaymentInstruments`  | POST   | `/visaIdCredential/v1/deletePaymentInstruments` |
//! | `get-data`           | `getData`                   | POST   | `/visaIdCredential/v1/getData`                  |

use crate::models::*;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// HTTP verb used for an upstream call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One of the eight upstream operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Operation {
    EnrollData,
    EnrollInstruments,
    GetStatus,
    ManageInstruments,
    ManageConsumer,
    DeleteConsumer,
    DeleteInstruments,
    GetData,
}

/// Routing key or operation name that is not in the table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported operation: {0}")]
pub struct UnknownOperation(pub String);

impl Operation {
    /// Every operation, in table order.
    pub const ALL: [Operation; 8] = [
        Operation::EnrollData,
        Operation::EnrollInstruments,
        Operation::GetStatus,
        Operation::ManageInstruments,
        Operation::ManageConsumer,
        Operation::DeleteConsumer,
        Operation::DeleteInstruments,
        Operation::GetData,
    ];

    /// Stable kebab-case name
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::EnrollData => "enroll-data",
            Operation::EnrollInstruments => "enroll-instruments",
            Operation::GetStatus => "get-status",
            Operation::ManageInstruments => "manage-instruments",
            Operation::ManageConsumer => "manage-consumer",
            Operation::DeleteConsumer => "delete-consumer",
            Operation::DeleteInstruments => "delete-instruments",
            Operation::GetData => "get-data",
        }
    }

    /// Routing key on the request exchange, also the request queue suffix.
    pub fn routing_key(&self) -> &'static str {
        match self {
            Operation::EnrollData => "enrollData",
            Operation::EnrollInstruments => "enrollPaymentInstruments",
            Operation::GetStatus => "requestStatus",
            Operation::ManageInstruments => "managePaymentInstruments",
            Operation::ManageConsumer => "manageConsumerInformation",
            Operation::DeleteConsumer => "deleteConsumerInformation",
            Operation::DeleteInstruments => "deletePaymentInstruments",
            Operation::GetData => "getData",
        }
    }

    pub fn from_routing_key(key: &str) -> Result<Self, UnknownOperation> {
        Self::ALL
            .into_iter()
            .find(|op| op.routing_key() == key)
            .ok_or_else(|| UnknownOperation(key.to_string()))
    }

    pub fn method(&self) -> HttpMethod {
        match self {
            Operation::GetStatus => HttpMethod::Get,
            Operation::ManageInstruments | Operation::ManageConsumer => HttpMethod::Put,
            _ => HttpMethod::Post,
        }
    }

    /// Upstream path. For get-status the request trace id is appended as a
    /// further path segment.
    pub fn path(&self) -> &'static str {
        match self {
            Operation::EnrollData => "/visaIdCredential/v1/enrollData",
            Operation::EnrollInstruments => "/visaIdCredential/v1/enrollPaymentInstruments",
            Operation::GetStatus => "/visaIdCredential/v1/requestStatus",
            Operation::ManageInstruments => "/visaIdCredential/v1/managePaymentInstruments",
            Operation::ManageConsumer => "/visaIdCredential/v1/manageConsumerInformation",
            Operation::DeleteConsumer => "/visaIdCredential/v1/deleteConsumerInformation",
            Operation::DeleteInstruments => "/visaIdCredential/v1/deletePaymentInstruments",
            Operation::GetData => "/visaIdCredential/v1/getData",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = UnknownOperation;

    /// Accepts either the kebab-case name or the routing key.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|op| op.as_str() == s || op.routing_key() == s)
            .ok_or_else(|| UnknownOperation(s.to_string()))
    }
}

/// A typed request for one operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationRequest {
    EnrollData(EnrollDataRequest),
    EnrollInstruments(EnrollPaymentInstrumentsRequest),
    GetStatus(RequestStatusQuery),
    ManageInstruments(ManagePaymentInstrumentsRequest),
    ManageConsumer(ManageConsumerInformationRequest),
    DeleteConsumer(DeleteConsumerInformationRequest),
    DeleteInstruments(DeletePaymentInstrumentsRequest),
    GetData(GetDataRequest),
}

impl OperationRequest {
    pub fn operation(&self) -> Operation {
        match self {
            OperationRequest::EnrollData(_) => Operation::EnrollData,
            OperationRequest::EnrollInstruments(_) => Operation::EnrollInstruments,
            OperationRequest::GetStatus(_) => Operation::GetStatus,
            OperationRequest::ManageInstruments(_) => Operation::ManageInstruments,
            OperationRequest::ManageConsumer(_) => Operation::ManageConsumer,
            OperationRequest::DeleteConsumer(_) => Operation::DeleteConsumer,
            OperationRequest::DeleteInstruments(_) => Operation::DeleteInstruments,
            OperationRequest::GetData(_) => Operation::GetData,
        }
    }

    /// Decode an inbound payload for `operation`.
    ///
    /// A get-status payload that is not JSON is read as the raw UTF-8 request
    /// trace id.
    pub fn decode(operation: Operation, payload: &[u8]) -> Result<Self, serde_json::Error> {
        Ok(match operation {
            Operation::EnrollData => Self::EnrollData(serde_json::from_slice(payload)?),
            Operation::EnrollInstruments => {
                Self::EnrollInstruments(serde_json::from_slice(payload)?)
            }
            Operation::GetStatus => Self::GetStatus(decode_status_query(payload)?),
            Operation::ManageInstruments => {
                Self::ManageInstruments(serde_json::from_slice(payload)?)
            }
            Operation::ManageConsumer => Self::ManageConsumer(serde_json::from_slice(payload)?),
            Operation::DeleteConsumer => Self::DeleteConsumer(serde_json::from_slice(payload)?),
            Operation::DeleteInstruments => {
                Self::DeleteInstruments(serde_json::from_slice(payload)?)
            }
            Operation::GetData => Self::GetData(serde_json::from_slice(payload)?),
        })
    }

    /// JSON request body, `None` for operations sent without one.
    pub fn body(&self) -> Result<Option<serde_json::Value>, serde_json::Error> {
        let value = match self {
            OperationRequest::EnrollData(r) => serde_json::to_value(r)?,
            OperationRequest::EnrollInstruments(r) => serde_json::to_value(r)?,
            OperationRequest::GetStatus(_) => return Ok(None),
            OperationRequest::ManageInstruments(r) => serde_json::to_value(r)?,
            OperationRequest::ManageConsumer(r) => serde_json::to_value(r)?,
            OperationRequest::DeleteConsumer(r) => serde_json::to_value(r)?,
            OperationRequest::DeleteInstruments(r) => serde_json::to_value(r)?,
            OperationRequest::GetData(r) => serde_json::to_value(r)?,
        };
        Ok(Some(value))
    }

    /// Extra path segment appended to [`Operation::path`].
    pub fn path_param(&self) -> Option<&str> {
        match self {
            OperationRequest::GetStatus(q) => Some(q.request_trace_id.as_str()),
            _ => None,
        }
    }

    /// Encode as a bus payload that [`OperationRequest::decode`] reads back.
    pub fn to_payload(&self) -> Result<Vec<u8>, serde_json::Error> {
        match self {
            OperationRequest::GetStatus(q) => serde_json::to_vec(q),
            other => match other.body()? {
                Some(body) => serde_json::to_vec(&body),
                None => Ok(Vec::new()),
            },
        }
    }
}

fn decode_status_query(payload: &[u8]) -> Result<RequestStatusQuery, serde_json::Error> {
    match serde_json::from_slice::<RequestStatusQuery>(payload) {
        Ok(q) => Ok(q),
        Err(json_err) => {
            if let Ok(id) = serde_json::from_slice::<String>(payload) {
                if !id.trim().is_empty() {
                    return Ok(RequestStatusQuery {
                        request_trace_id: id.trim().to_string(),
                    });
                }
            }
            match std::str::from_utf8(payload) {
                Ok(raw) if is_raw_trace_id(raw) => Ok(RequestStatusQuery {
                    request_trace_id: raw.trim().to_string(),
                }),
                _ => Err(json_err),
            }
        }
    }
}

fn is_raw_trace_id(raw: &str) -> bool {
    let trimmed = raw.trim();
    !trimmed.is_empty()
        && !trimmed.starts_with('{')
        && !trimmed.starts_with('[')
        && !trimmed.chars().any(char::is_whitespace)
}

/// A typed upstream success body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum OperationResponse {
    RequestId(RequestIdResponse),
    Status(RequestStatusResponse),
    Data(GetDataResponse),
}

impl OperationResponse {
    /// Decode the upstream success body for `operation`.
    pub fn decode(operation: Operation, body: &[u8]) -> Result<Self, serde_json::Error> {
        Ok(match operation {
            Operation::GetStatus => Self::Status(serde_json::from_slice(body)?),
            Operation::GetData => Self::Data(serde_json::from_slice(body)?),
            _ => Self::RequestId(serde_json::from_slice(body)?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routing_keys_round_trip() {
        for op in Operation::ALL {
            assert_eq!(Operation::from_routing_key(op.routing_key()).unwrap(), op);
            assert_eq!(op.as_str().parse::<Operation>().unwrap(), op);
        }
        assert!(Operation::from_routing_key("enroll").is_err());
    }

    #[test]
    fn test_methods() {
        assert_eq!(Operation::GetStatus.method(), HttpMethod::Get);
        assert_eq!(Operation::ManageConsumer.method(), HttpMethod::Put);
        assert_eq!(Operation::ManageInstruments.method(), HttpMethod::Put);
        assert_eq!(Operation::DeleteConsumer.method(), HttpMethod::Post);
    }

    #[test]
    fn test_status_query_accepts_raw_id() {
        let req = OperationRequest::decode(Operation::GetStatus, b"trace-123").unwrap();
        assert_eq!(req.path_param(), Some("trace-123"));
        assert!(req.body().unwrap().is_none());
    }

    #[test]
    fn test_status_query_accepts_json() {
        let req = OperationRequest::decode(
            Operation::GetStatus,
            br#"{"requestTraceId":"trace-9"}"#,
        )
        .unwrap();
        assert_eq!(req.path_param(), Some("trace-9"));
    }

    #[test]
    fn test_status_query_rejects_garbage() {
        assert!(OperationRequest::decode(Operation::GetStatus, b"").is_err());
        assert!(OperationRequest::decode(Operation::GetStatus, b"{broken").is_err());
    }

    #[test]
    fn test_decode_rejects_malformed_body() {
        assert!(OperationRequest::decode(Operation::EnrollData, b"{not json").is_err());
        assert!(OperationRequest::decode(Operation::GetData, b"{}").is_err());
    }

    #[test]
    fn test_payload_round_trip() {
        let req = OperationRequest::GetData(GetDataRequest {
            intent: Intent::new("PRODUCT_CODE", "CLICK_TO_PAY"),
            consumer_information: ConsumerInformationIdRef::new("c-1"),
        });
        let payload = req.to_payload().unwrap();
        let decoded = OperationRequest::decode(Operation::GetData, &payload).unwrap();
        assert_eq!(decoded, req);
    }

    #[test]
    fn test_response_decode_by_operation() {
        let body = br#"{"requestTraceId":"abc"}"#;
        let resp = OperationResponse::decode(Operation::EnrollData, body).unwrap();
        assert_eq!(
            resp,
            OperationResponse::RequestId(RequestIdResponse {
                request_trace_id: "abc".into()
            })
        );
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["requestTraceId"], "abc");
    }
}
