use crate::error::Error;
use crate::models::{Epoch, FixedPoint, RewardEvent};
use crate::services::http_client::{is_transient_status, read_capped};
use crate::services::reconciliation::RewardSource;
use crate::services::retry::{retry_with_backoff, FetchError, RetryError, RetryPolicy};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use log::{debug, info};
use reqwest::Client;
use serde::Deserialize;

pub const DELEGATOR_REWARDS_PAID_EVENT: &str =
    "A.8624b52f9ddcd04a.FlowIDTableStaking.DelegatorRewardsPaid";

/// Reads epoch payout transactions from a Flow Access node's HTTP API.
pub struct FlowAccessClient {
    client: Client,
    base_url: String,
    retry: RetryPolicy,
    max_response_bytes: usize,
}

impl FlowAccessClient {
    pub fn new(
        client: Client,
        base_url: impl Into<String>,
        retry: RetryPolicy,
        max_response_bytes: usize,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            retry,
            max_response_bytes,
        }
    }

    pub async fn get_transaction_result(
        &self,
        transaction_id: &str,
    ) -> Result<TransactionResult, Error> {
        let url = format!("{}/v1/transaction_results/{}", self.base_url, transaction_id);
        let url = url.as_str();
        retry_with_backoff(&self.retry, transaction_id, move || self.try_fetch(url))
            .await
            .map_err(|e| match e {
                RetryError::Fatal(e) => e,
                RetryError::Exhausted {
                    attempts,
                    last_error,
                } => Error::RewardFetchFailed {
                    transaction_id: transaction_id.to_string(),
                    attempts,
                    reason: last_error,
                },
            })
    }

    async fn try_fetch(&self, url: &str) -> Result<TransactionResult, FetchError> {
        debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Transient(e.to_string()))?;

        let status = response.status();
        if is_transient_status(status) {
            return Err(FetchError::Transient(format!("HTTP {status}")));
        }
        if !status.is_success() {
            return Err(FetchError::Fatal(Error::SourceUnavailable(format!(
                "GET {url}: HTTP {status}"
            ))));
        }

        let body = read_capped(response, self.max_response_bytes).await?;
        serde_json::from_slice(&body)
            .map_err(|e| FetchError::Fatal(Error::decode(format!("transaction result: {e}"))))
    }
}

#[async_trait]
impl RewardSource for FlowAccessClient {
    async fn epoch_rewards(&self, epoch: &Epoch) -> Result<Vec<RewardEvent>, Error> {
        let result = self.get_transaction_result(&epoch.transaction_id).await?;
        let rewards = decode_rewards_paid(&result.events)?;
        info!(
            "Transaction {} ({}) emitted {} delegator reward events",
            epoch.transaction_id,
            result.status,
            rewards.len()
        );
        Ok(rewards)
    }
}

#[derive(Debug, Deserialize)]
pub struct TransactionResult {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub events: Vec<FlowEvent>,
}

#[derive(Debug, Deserialize)]
pub struct FlowEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub payload: String,
}

#[derive(Debug, Deserialize)]
struct CadenceEvent {
    value: CadenceComposite,
}

#[derive(Debug, Deserialize)]
struct CadenceComposite {
    #[serde(default)]
    id: String,
    fields: Vec<CadenceField>,
}

#[derive(Debug, Deserialize)]
struct CadenceField {
    #[serde(default)]
    name: String,
    value: CadenceValue,
}

#[derive(Debug, Deserialize)]
struct CadenceValue {
    #[serde(rename = "type")]
    kind: String,
    value: serde_json::Value,
}

impl CadenceComposite {
    /// Returns the textual value of field `index`, checking its Cadence type.
    fn field(&self, index: usize, kind: &str) -> Result<&str, Error> {
        let field = self.fields.get(index).ok_or_else(|| {
            Error::decode(format!(
                "{}: missing field {index} (found {})",
                self.id,
                self.fields.len()
            ))
        })?;
        if field.value.kind != kind {
            return Err(Error::decode(format!(
                "{}: field {} is {}, expected {kind}",
                self.id, field.name, field.value.kind
            )));
        }
        field.value.value.as_str().ok_or_else(|| {
            Error::decode(format!("{}: field {} is not a string", self.id, field.name))
        })
    }
}

/// Picks the `DelegatorRewardsPaid` events out of a transaction's event log.
pub fn decode_rewards_paid(events: &[FlowEvent]) -> Result<Vec<RewardEvent>, Error> {
    events
        .iter()
        .filter(|e| e.event_type == DELEGATOR_REWARDS_PAID_EVENT)
        .map(decode_reward_event)
        .collect()
}

// DelegatorRewardsPaid(nodeID: String, delegatorID: UInt32, amount: UFix64)
fn decode_reward_event(event: &FlowEvent) -> Result<RewardEvent, Error> {
    let payload = STANDARD
        .decode(event.payload.trim())
        .map_err(|e| Error::decode(format!("event payload is not base64: {e}")))?;
    let event: CadenceEvent = serde_json::from_slice(&payload)
        .map_err(|e| Error::decode(format!("event payload is not JSON-Cadence: {e}")))?;
    let composite = event.value;

    let node_id = composite.field(0, "String")?.to_string();
    let delegator_id = composite
        .field(1, "UInt32")?
        .parse()
        .map_err(|e| Error::decode(format!("{}: delegatorID: {e}", composite.id)))?;
    let amount: FixedPoint = composite.field(2, "UFix64")?.parse()?;

    Ok(RewardEvent {
        node_id,
        delegator_id,
        amount,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn encode_rewards_paid(node_id: &str, delegator_id: u32, amount: &str) -> FlowEvent {
        let payload = json!({
            "type": "Event",
            "value": {
                "id": DELEGATOR_REWARDS_PAID_EVENT,
                "fields": [
                    { "name": "nodeID", "value": { "type": "String", "value": node_id } },
                    { "name": "delegatorID", "value": { "type": "UInt32", "value": delegator_id.to_string() } },
                    { "name": "amount", "value": { "type": "UFix64", "value": amount } }
                ]
            }
        });
        FlowEvent {
            event_type: DELEGATOR_REWARDS_PAID_EVENT.to_string(),
            payload: STANDARD.encode(payload.to_string()),
        }
    }

    fn other_event() -> FlowEvent {
        FlowEvent {
            event_type: "A.1654653399040a61.FlowToken.TokensDeposited".to_string(),
            payload: STANDARD.encode(r#"{"type":"Event","value":{"id":"x","fields":[]}}"#),
        }
    }

    #[test]
    fn keeps_only_rewards_paid_events() {
        let events = vec![
            other_event(),
            encode_rewards_paid("node-a", 3, "12.50000000"),
            other_event(),
            encode_rewards_paid("node-b", 0, "0.00000001"),
        ];
        let rewards = decode_rewards_paid(&events).unwrap();
        assert_eq!(
            rewards,
            vec![
                RewardEvent {
                    node_id: "node-a".to_string(),
                    delegator_id: 3,
                    amount: FixedPoint(1_250_000_000),
                },
                RewardEvent {
                    node_id: "node-b".to_string(),
                    delegator_id: 0,
                    amount: FixedPoint(1),
                },
            ]
        );
    }

    #[test]
    fn mistyped_field_is_decode_error() {
        let mut event = encode_rewards_paid("node-a", 3, "1.0");
        let payload = json!({
            "type": "Event",
            "value": {
                "id": DELEGATOR_REWARDS_PAID_EVENT,
                "fields": [
                    { "name": "nodeID", "value": { "type": "String", "value": "node-a" } },
                    { "name": "delegatorID", "value": { "type": "UInt64", "value": "3" } },
                    { "name": "amount", "value": { "type": "UFix64", "value": "1.0" } }
                ]
            }
        });
        event.payload = STANDARD.encode(payload.to_string());
        assert!(matches!(decode_rewards_paid(&[event]), Err(Error::Decode(_))));
    }

    #[test]
    fn short_field_list_is_decode_error() {
        let mut event = encode_rewards_paid("node-a", 3, "1.0");
        let payload = json!({
            "type": "Event",
            "value": {
                "id": DELEGATOR_REWARDS_PAID_EVENT,
                "fields": [
                    { "name": "nodeID", "value": { "type": "String", "value": "node-a" } }
                ]
            }
        });
        event.payload = STANDARD.encode(payload.to_string());
        assert!(matches!(decode_rewards_paid(&[event]), Err(Error::Decode(_))));
    }

    #[test]
    fn garbage_payload_is_decode_error() {
        let mut event = encode_rewards_paid("node-a", 3, "1.0");
        event.payload = "%%%".to_string();
        assert!(matches!(decode_rewards_paid(&[event]), Err(Error::Decode(_))));
    }

    #[test]
    fn decodes_access_api_transaction_result() {
        let event = encode_rewards_paid("node-a", 3, "2.0");
        let body = json!({
            "block_id": "7bc4",
            "status": "Sealed",
            "status_code": 0,
            "error_message": "",
            "events": [
                {
                    "type": event.event_type,
                    "transaction_id": "ab12",
                    "transaction_index": "0",
                    "event_index": "4",
                    "payload": event.payload
                }
            ]
        });
        let result: TransactionResult = serde_json::from_value(body).unwrap();
        assert_eq!(result.status, "Sealed");
        let rewards = decode_rewards_paid(&result.events).unwrap();
        assert_eq!(rewards[0].amount, FixedPoint(200_000_000));
    }

    mod http {
        use super::*;
        use chrono::{TimeZone, Utc};
        use reqwest::StatusCode;
        use std::sync::Mutex;
        use std::time::Duration;
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, Request, ResponseTemplate};

        const TX: &str = "ab12";

        fn policy(max_attempts: u32) -> RetryPolicy {
            RetryPolicy {
                max_attempts,
                initial_delay: Duration::from_millis(1),
                multiplier: 2,
                max_delay: Duration::from_millis(4),
            }
        }

        fn test_client(
            server: &MockServer,
            max_attempts: u32,
            max_bytes: usize,
        ) -> FlowAccessClient {
            FlowAccessClient::new(Client::new(), server.uri(), policy(max_attempts), max_bytes)
        }

        fn epoch() -> Epoch {
            Epoch {
                timestamp: Utc.with_ymd_and_hms(2021, 5, 5, 17, 2, 10).unwrap(),
                transaction_id: TX.to_string(),
            }
        }

        fn sealed_result() -> serde_json::Value {
            let event = encode_rewards_paid("node-a", 3, "1.5");
            json!({
                "status": "Sealed",
                "events": [{ "type": event.event_type, "payload": event.payload }]
            })
        }

        async fn respond_with(server: &MockServer, response: impl wiremock::Respond + 'static) {
            Mock::given(method("GET"))
                .and(path(format!("/v1/transaction_results/{TX}")))
                .respond_with(response)
                .mount(server)
                .await;
        }

        #[tokio::test]
        async fn unavailable_twice_then_sealed() {
            let server = MockServer::start().await;
            let times: Mutex<u32> = Mutex::new(0);
            let body = sealed_result();
            respond_with(&server, move |_: &Request| {
                let mut times = times.lock().unwrap();
                *times += 1;
                if *times <= 2 {
                    ResponseTemplate::new(StatusCode::SERVICE_UNAVAILABLE.as_u16())
                } else {
                    ResponseTemplate::new(200).set_body_json(body.clone())
                }
            })
            .await;

            let client = test_client(&server, 5, 1_000_000);
            let rewards = client.epoch_rewards(&epoch()).await.unwrap();

            assert_eq!(rewards.len(), 1);
            assert_eq!(rewards[0].amount, FixedPoint(150_000_000));
            assert_eq!(server.received_requests().await.unwrap().len(), 3);
        }

        #[tokio::test]
        async fn exhausted_retries_name_the_transaction() {
            let server = MockServer::start().await;
            respond_with(&server, ResponseTemplate::new(502)).await;

            let client = test_client(&server, 3, 1_000_000);
            match client.epoch_rewards(&epoch()).await {
                Err(Error::RewardFetchFailed {
                    transaction_id,
                    attempts,
                    reason,
                }) => {
                    assert_eq!(transaction_id, TX);
                    assert_eq!(attempts, 3);
                    assert!(reason.contains("502"), "{reason}");
                }
                other => panic!("unexpected {other:?}"),
            }
            assert_eq!(server.received_requests().await.unwrap().len(), 3);
        }

        #[tokio::test]
        async fn unknown_transaction_is_not_retried() {
            let server = MockServer::start().await;
            respond_with(&server, ResponseTemplate::new(404)).await;

            let client = test_client(&server, 5, 1_000_000);
            let result = client.epoch_rewards(&epoch()).await;

            assert!(matches!(result, Err(Error::SourceUnavailable(_))));
            assert_eq!(server.received_requests().await.unwrap().len(), 1);
        }

        #[tokio::test]
        async fn oversized_body_is_fatal() {
            let server = MockServer::start().await;
            respond_with(&server, ResponseTemplate::new(200).set_body_json(sealed_result())).await;

            let client = test_client(&server, 5, 16);
            let result = client.epoch_rewards(&epoch()).await;

            assert!(matches!(result, Err(Error::Decode(_))));
            assert_eq!(server.received_requests().await.unwrap().len(), 1);
        }
    }
}
