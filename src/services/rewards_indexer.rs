use crate::error::Error;
use crate::models::{Epoch, FixedPoint, FlowAddress, RewardEvent};
use crate::services::http_client::{is_transient_status, read_capped};
use crate::services::reconciliation::RewardSource;
use crate::services::retry::{retry_with_backoff, FetchError, RetryError, RetryPolicy};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use log::info;
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::OnceCell;

#[derive(Debug, Clone, Deserialize)]
pub struct IndexedReward {
    pub node_id: String,
    pub delegator_id: u32,
    pub height: u64,
    pub amount: FixedPoint,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct DelegationRewardsPage {
    delegation_rewards: Vec<IndexedReward>,
}

/// Pages through every reward the indexer holds for `address`. A page shorter
/// than `page_size` is the last one.
#[async_trait]
pub trait RewardsPageSource {
    async fn fetch_rewards_page(
        &self,
        address: &FlowAddress,
        offset: u64,
        limit: u32,
    ) -> Result<Vec<IndexedReward>, Error>;
}

pub async fn list_indexed_rewards<S>(
    source: &S,
    address: &FlowAddress,
    page_size: u32,
) -> Result<Vec<IndexedReward>, Error>
where
    S: RewardsPageSource + Sync + ?Sized,
{
    let mut rewards = Vec::new();
    let mut offset = 0u64;
    loop {
        let page = source.fetch_rewards_page(address, offset, page_size).await?;
        let fetched = page.len();
        info!("Fetched {} indexed rewards at offset {}", fetched, offset);
        rewards.extend(page);
        if fetched < page_size as usize {
            break;
        }
        offset += fetched as u64;
    }
    Ok(rewards)
}

pub struct RewardsIndexerClient {
    client: Client,
    base_url: String,
    retry: RetryPolicy,
    max_response_bytes: usize,
}

impl RewardsIndexerClient {
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

    async fn try_fetch(&self, url: &str) -> Result<Vec<IndexedReward>, FetchError> {
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
        let page: DelegationRewardsPage = serde_json::from_slice(&body)
            .map_err(|e| FetchError::Fatal(Error::decode(format!("delegation rewards: {e}"))))?;
        Ok(page.delegation_rewards)
    }
}

#[async_trait]
impl RewardsPageSource for RewardsIndexerClient {
    async fn fetch_rewards_page(
        &self,
        address: &FlowAddress,
        offset: u64,
        limit: u32,
    ) -> Result<Vec<IndexedReward>, Error> {
        let url = format!(
            "{}/accounts/{}/delegation_rewards?offset={}&limit={}",
            self.base_url, address, offset, limit
        );
        let url = url.as_str();
        retry_with_backoff(&self.retry, url, move || self.try_fetch(url))
            .await
            .map_err(|e| match e {
                RetryError::Fatal(e) => e,
                RetryError::Exhausted {
                    attempts,
                    last_error,
                } => Error::SourceUnavailable(format!(
                    "GET {url} failed after {attempts} attempts: {last_error}"
                )),
            })
    }
}

/// Serves epoch rewards out of the indexer's pre-aggregated history, fetched
/// once on first use. Rewards are attributed to an epoch when their timestamp
/// lies within `window` of the epoch's timestamp.
pub struct IndexedRewardSource<S> {
    pages: S,
    address: FlowAddress,
    page_size: u32,
    window: Duration,
    rewards: OnceCell<Vec<IndexedReward>>,
}

impl<S> IndexedRewardSource<S>
where
    S: RewardsPageSource + Sync,
{
    pub fn new(pages: S, address: FlowAddress, page_size: u32, window: Duration) -> Self {
        Self {
            pages,
            address,
            page_size,
            window,
            rewards: OnceCell::new(),
        }
    }

    async fn all_rewards(&self) -> Result<&[IndexedReward], Error> {
        let rewards = self
            .rewards
            .get_or_try_init(|| list_indexed_rewards(&self.pages, &self.address, self.page_size))
            .await?;
        Ok(rewards.as_slice())
    }
}

#[async_trait]
impl<S> RewardSource for IndexedRewardSource<S>
where
    S: RewardsPageSource + Send + Sync,
{
    async fn epoch_rewards(&self, epoch: &Epoch) -> Result<Vec<RewardEvent>, Error> {
        let rewards = self.all_rewards().await?;
        Ok(rewards
            .iter()
            .filter(|r| {
                (r.timestamp - epoch.timestamp).num_seconds().abs() <= self.window.num_seconds()
            })
            .map(|r| RewardEvent {
                node_id: r.node_id.clone(),
                delegator_id: r.delegator_id,
                amount: r.amount,
            })
            .collect())
    }
}
