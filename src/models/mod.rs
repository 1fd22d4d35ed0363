mod address;
mod amount;
pub mod datetime_utils;
mod delegation;
mod epoch;
mod reward;

pub use address::FlowAddress;
pub use amount::FixedPoint;
pub use delegation::{DelegationPage, DelegationRecord, PageCursor};
pub use epoch::{filter_epochs, sort_epochs, DateRange, Epoch, RangeEnd};
pub use reward::{EpochTotal, RewardEvent};
