use crate::error::Error;
use crate::models::{DelegationPage, DelegationRecord, FlowAddress, PageCursor};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::info;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

const ACCOUNT_TRANSACTIONS_QUERY: &str = r#"
query AccountTransactionsQuery($address: ID!, $role: TransactionRole, $first: Int!, $after: ID) {
  account(id: $address) {
    transactions(first: $first, after: $after, role: $role) {
      pageInfo {
        hasNextPage
        endCursor
      }
      edges {
        node {
          hash
          time
          events(typeId: "A.8624b52f9ddcd04a.FlowIDTableStaking.NewDelegatorCreated") {
            edges {
              node {
                type {
                  id
                }
                fields
              }
            }
          }
          status
        }
      }
    }
  }
}
"#;

/// One page of an address's delegation-creation events.
#[async_trait]
pub trait DelegationDirectory {
    async fn fetch_page(
        &self,
        address: &FlowAddress,
        after: Option<&str>,
    ) -> Result<DelegationPage, Error>;
}

/// Follows the page cursor until the directory reports no further pages.
/// A failure on any page discards everything collected so far.
pub async fn list_delegations<D>(
    directory: &D,
    address: &FlowAddress,
) -> Result<Vec<DelegationRecord>, Error>
where
    D: DelegationDirectory + Sync + ?Sized,
{
    let mut records = Vec::new();
    let mut cursor = PageCursor {
        has_next_page: true,
        end_cursor: None,
    };
    let mut page_number = 0;

    while cursor.has_next_page {
        page_number += 1;
        let page = directory
            .fetch_page(address, cursor.end_cursor.as_deref())
            .await?;
        info!(
            "Fetched {} delegation records on page {}",
            page.records.len(),
            page_number
        );
        records.extend(page.records);

        if page.cursor.has_next_page && page.cursor.end_cursor.is_none() {
            return Err(Error::DirectoryQueryFailed(
                "page reports more results but no end cursor".to_string(),
            ));
        }
        cursor = page.cursor;
    }

    info!("Total delegation records fetched: {}", records.len());
    Ok(records)
}

pub struct FlowscanClient {
    client: Client,
    endpoint: String,
    page_size: u32,
}

impl FlowscanClient {
    pub fn new(client: Client, endpoint: impl Into<String>, page_size: u32) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            page_size,
        }
    }
}

#[async_trait]
impl DelegationDirectory for FlowscanClient {
    async fn fetch_page(
        &self,
        address: &FlowAddress,
        after: Option<&str>,
    ) -> Result<DelegationPage, Error> {
        let mut variables = json!({
            "address": address.to_string(),
            "first": self.page_size,
        });
        if let Some(after) = after {
            variables["after"] = json!(after);
        }

        let response = self
            .client
            .post(&self.endpoint)
            .json(&json!({ "query": ACCOUNT_TRANSACTIONS_QUERY, "variables": variables }))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| Error::DirectoryQueryFailed(e.to_string()))?;

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::DirectoryQueryFailed(e.to_string()))?;

        decode_page(&body)
    }
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct AccountData {
    account: Option<Account>,
}

#[derive(Debug, Deserialize)]
struct Account {
    transactions: Connection<TransactionNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", bound(deserialize = "N: Deserialize<'de>"))]
struct Connection<N> {
    #[serde(default)]
    page_info: Option<PageInfo>,
    #[serde(default)]
    edges: Vec<Edge<N>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    has_next_page: bool,
    end_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Edge<N> {
    node: N,
}

#[derive(Debug, Deserialize)]
struct TransactionNode {
    time: String,
    events: Connection<EventNode>,
}

#[derive(Debug, Deserialize)]
struct EventNode {
    fields: Vec<EventField>,
}

#[derive(Debug, Deserialize)]
struct EventField {
    #[serde(rename = "type", default)]
    kind: String,
    value: serde_json::Value,
}

impl EventField {
    fn as_text(&self) -> Option<&str> {
        self.value.as_str()
    }
}

fn decode_page(body: &[u8]) -> Result<DelegationPage, Error> {
    let response: GraphQlResponse<AccountData> = serde_json::from_slice(body)
        .map_err(|e| Error::decode(format!("flowscan response: {e}")))?;

    if !response.errors.is_empty() {
        let messages: Vec<_> = response.errors.into_iter().map(|e| e.message).collect();
        return Err(Error::DirectoryQueryFailed(messages.join("; ")));
    }

    let Some(account) = response.data.and_then(|d| d.account) else {
        return Ok(DelegationPage::default());
    };

    let transactions = account.transactions;
    let mut records = Vec::new();
    for edge in transactions.edges {
        let created_at = DateTime::parse_from_rfc3339(&edge.node.time)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| Error::decode(format!("transaction time {:?}: {e}", edge.node.time)))?;

        for event in edge.node.events.edges {
            records.push(delegation_from_fields(&event.node.fields, created_at)?);
        }
    }

    let page_info = transactions
        .page_info
        .ok_or_else(|| Error::decode("flowscan response: transactions without pageInfo"))?;
    let cursor = PageCursor {
        has_next_page: page_info.has_next_page,
        end_cursor: page_info.end_cursor,
    };

    Ok(DelegationPage { records, cursor })
}

// NewDelegatorCreated(nodeID: String, delegatorID: UInt32)
fn delegation_from_fields(
    fields: &[EventField],
    created_at: DateTime<Utc>,
) -> Result<DelegationRecord, Error> {
    if fields.len() < 2 {
        return Err(Error::decode(format!(
            "NewDelegatorCreated: expected 2 fields, found {}",
            fields.len()
        )));
    }

    let node_id = fields[0]
        .as_text()
        .ok_or_else(|| Error::decode(format!("nodeID has kind {:?}", fields[0].kind)))?;
    let delegator_id = fields[1]
        .as_text()
        .and_then(|v| v.parse::<u32>().ok())
        .ok_or_else(|| Error::decode(format!("delegatorID {} is not a UInt32", fields[1].value)))?;

    Ok(DelegationRecord {
        node_id: node_id.to_string(),
        delegator_id,
        created_at: Some(created_at),
    })
}
