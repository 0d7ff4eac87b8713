//! World partition: actors, their controllers and the tick that moves them

pub mod actor;
pub mod partition;
pub mod runner;

pub use actor::Actor;
pub use partition::{Outbound, Partition, PartitionError, Recipient};
pub use runner::{ObserverFrame, PartitionHandle, PartitionInput, PartitionRequest, PartitionRunner};
