use crate::error::Error;
use crate::models::datetime_utils::parse_timestamp;
use crate::models::{sort_epochs, Epoch};
use log::info;
use reqwest::Client;
use std::io::Read;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub enum EpochSource {
    Remote(String),
    File(PathBuf),
}

/// Loads the epoch list once, sorted by timestamp. Any failure aborts; there is no retry.
pub async fn list_epochs(source: &EpochSource, client: &Client) -> Result<Vec<Epoch>, Error> {
    let body = match source {
        EpochSource::Remote(url) => {
            info!("Fetching epoch list from {}", url);
            fetch_remote(client, url).await?
        }
        EpochSource::File(path) => {
            info!("Reading epoch list from {}", path.display());
            tokio::fs::read(path).await.map_err(|e| {
                Error::SourceUnavailable(format!("failed to read {}: {e}", path.display()))
            })?
        }
    };

    let mut epochs = parse_epochs_csv(body.as_slice())?;
    if epochs.is_empty() {
        return Err(Error::SourceUnavailable("epoch list is empty".to_string()));
    }
    sort_epochs(&mut epochs);
    info!("Loaded {} epochs", epochs.len());
    Ok(epochs)
}

async fn fetch_remote(client: &Client, url: &str) -> Result<Vec<u8>, Error> {
    let unavailable = |e: reqwest::Error| Error::SourceUnavailable(format!("GET {url}: {e}"));
    let response = client
        .get(url)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(unavailable)?;
    let bytes = response.bytes().await.map_err(unavailable)?;
    Ok(bytes.to_vec())
}

/// Parses `timestamp,transaction_id` rows. A leading header row is skipped.
pub fn parse_epochs_csv<R: Read>(reader: R) -> Result<Vec<Epoch>, Error> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut epochs = Vec::new();
    for (index, row) in csv_reader.records().enumerate() {
        let row = row.map_err(|e| Error::SourceUnavailable(format!("malformed epoch CSV: {e}")))?;
        let line = index + 1;

        let (Some(timestamp), Some(transaction_id)) = (row.get(0), row.get(1)) else {
            return Err(Error::SourceUnavailable(format!(
                "epoch CSV line {line}: expected 2 columns, found {}",
                row.len()
            )));
        };

        if index == 0 && timestamp.eq_ignore_ascii_case("timestamp") {
            continue;
        }

        let timestamp = parse_timestamp(timestamp)
            .map_err(|e| Error::SourceUnavailable(format!("epoch CSV line {line}: {e}")))?;
        let transaction_id = transaction_id.trim_start_matches("0x");
        if transaction_id.is_empty() || !transaction_id.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(Error::SourceUnavailable(format!(
                "epoch CSV line {line}: invalid transaction id {transaction_id:?}"
            )));
        }

        epochs.push(Epoch {
            timestamp,
            transaction_id: transaction_id.to_ascii_lowercase(),
        });
    }
    Ok(epochs)
}
