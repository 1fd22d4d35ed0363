use chrono::{DateTime, Utc};

/// One delegator slot an address controls on one staking node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelegationRecord {
    pub node_id: String,
    pub delegator_id: u32,
    pub created_at: Option<DateTime<Utc>>,
}

impl DelegationRecord {
    pub fn matches(&self, node_id: &str, delegator_id: u32) -> bool {
        self.node_id == node_id && self.delegator_id == delegator_id
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageCursor {
    pub has_next_page: bool,
    pub end_cursor: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct DelegationPage {
    pub records: Vec<DelegationRecord>,
    pub cursor: PageCursor,
}
