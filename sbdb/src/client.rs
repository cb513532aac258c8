use crate::record::{AddressSet, LogicalRouter, LogicalSwitch, Meter, MeterBand};
use async_trait::async_trait;

/// Optional database-side features the manager probes at startup.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Capability {
    Sctp,
    ChassisTemplateVar,
}

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("transaction failed: {0}")]
    Transaction(String),

    #[error("database unavailable: {0}")]
    Unavailable(String),
}

/// One prepared operation. Transactions are built as operation lists and
/// committed in a single `transact` call.
#[derive(Clone, Debug, PartialEq)]
pub enum Op {
    CreateOrUpdateMeter { meter: Meter, bands: Vec<MeterBand> },
    CreateOrUpdateLogicalSwitch { switch: LogicalSwitch },
    CreateOrUpdateLogicalRouter { router: LogicalRouter },
    CreateOrUpdateAddressSet { set: AddressSet },
    DeleteLogicalSwitch { name: String },
    DeleteLogicalRouter { name: String },
    DeleteAddressSet { name: String },
}

/// Contract with the southbound transaction client. Single-writer from the
/// caller's perspective; the core never retries failed transactions.
#[async_trait]
pub trait SouthboundClient: Send + Sync {
    /// The zone this database instance serves.
    async fn zone(&self) -> Result<String, DbError>;

    async fn probe(&self, capability: Capability) -> Result<bool, DbError>;

    async fn find_logical_switches(
        &self,
        pred: &(dyn for<'a> Fn(&'a LogicalSwitch) -> bool + Send + Sync),
    ) -> Result<Vec<LogicalSwitch>, DbError>;

    async fn find_logical_routers(
        &self,
        pred: &(dyn for<'a> Fn(&'a LogicalRouter) -> bool + Send + Sync),
    ) -> Result<Vec<LogicalRouter>, DbError>;

    async fn find_address_sets(
        &self,
        pred: &(dyn for<'a> Fn(&'a AddressSet) -> bool + Send + Sync),
    ) -> Result<Vec<AddressSet>, DbError>;

    /// Commits the prepared operation list in one call.
    async fn transact(&self, ops: Vec<Op>) -> Result<(), DbError>;
}
