use super::{Epoch, FixedPoint};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewardEvent {
    pub node_id: String,
    pub delegator_id: u32,
    pub amount: FixedPoint,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpochTotal {
    pub epoch: Epoch,
    pub amounts: Vec<FixedPoint>,
    pub total: FixedPoint,
}
