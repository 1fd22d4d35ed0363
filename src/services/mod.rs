pub mod epoch_source;
pub mod flow_access;
pub mod flowscan;
pub mod http_client;
pub mod reconciliation;
pub mod retry;
pub mod rewards_indexer;
