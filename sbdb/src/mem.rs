//! In-memory southbound store. Backs the controller and manager tests; the
//! production client lives outside this repository.

use crate::client::{Capability, DbError, Op, SouthboundClient};
use crate::record::{AddressSet, LogicalRouter, LogicalSwitch, Meter, MeterBand};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};

#[derive(Default)]
struct State {
    zone: String,
    capabilities: HashSet<Capability>,
    switches: BTreeMap<String, LogicalSwitch>,
    routers: BTreeMap<String, LogicalRouter>,
    address_sets: BTreeMap<String, AddressSet>,
    meters: BTreeMap<String, (Meter, Vec<MeterBand>)>,
    fail_transactions: bool,
}

#[derive(Default)]
pub struct MemSouthbound {
    state: Mutex<State>,
}

impl MemSouthbound {
    pub fn new(zone: impl Into<String>) -> Self {
        let db = Self::default();
        db.state.lock().zone = zone.into();
        db
    }

    pub fn set_zone(&self, zone: impl Into<String>) {
        self.state.lock().zone = zone.into();
    }

    pub fn grant(&self, capability: Capability) {
        self.state.lock().capabilities.insert(capability);
    }

    pub fn insert_switch(&self, switch: LogicalSwitch) {
        let mut state = self.state.lock();
        state.switches.insert(switch.name.clone(), switch);
    }

    pub fn insert_router(&self, router: LogicalRouter) {
        let mut state = self.state.lock();
        state.routers.insert(router.name.clone(), router);
    }

    pub fn insert_address_set(&self, set: AddressSet) {
        let mut state = self.state.lock();
        state.address_sets.insert(set.name.clone(), set);
    }

    /// Makes every subsequent transaction fail, for error-path tests.
    pub fn fail_transactions(&self, fail: bool) {
        self.state.lock().fail_transactions = fail;
    }

    pub fn switch_names(&self) -> Vec<String> {
        self.state.lock().switches.keys().cloned().collect()
    }

    pub fn router_names(&self) -> Vec<String> {
        self.state.lock().routers.keys().cloned().collect()
    }

    pub fn address_set_names(&self) -> Vec<String> {
        self.state.lock().address_sets.keys().cloned().collect()
    }

    pub fn meter(&self, name: &str) -> Option<(Meter, Vec<MeterBand>)> {
        self.state.lock().meters.get(name).cloned()
    }
}

#[async_trait]
impl SouthboundClient for MemSouthbound {
    async fn zone(&self) -> Result<String, DbError> {
        Ok(self.state.lock().zone.clone())
    }

    async fn probe(&self, capability: Capability) -> Result<bool, DbError> {
        Ok(self.state.lock().capabilities.contains(&capability))
    }

    async fn find_logical_switches(
        &self,
        pred: &(dyn for<'a> Fn(&'a LogicalSwitch) -> bool + Send + Sync),
    ) -> Result<Vec<LogicalSwitch>, DbError> {
        let state = self.state.lock();
        Ok(state.switches.values().filter(|s| pred(s)).cloned().collect())
    }

    async fn find_logical_routers(
        &self,
        pred: &(dyn for<'a> Fn(&'a LogicalRouter) -> bool + Send + Sync),
    ) -> Result<Vec<LogicalRouter>, DbError> {
        let state = self.state.lock();
        Ok(state.routers.values().filter(|r| pred(r)).cloned().collect())
    }

    async fn find_address_sets(
        &self,
        pred: &(dyn for<'a> Fn(&'a AddressSet) -> bool + Send + Sync),
    ) -> Result<Vec<AddressSet>, DbError> {
        let state = self.state.lock();
        Ok(state
            .address_sets
            .values()
            .filter(|a| pred(a))
            .cloned()
            .collect())
    }

    async fn transact(&self, ops: Vec<Op>) -> Result<(), DbError> {
        let mut state = self.state.lock();
        if state.fail_transactions {
            return Err(DbError::Transaction("injected failure".to_string()));
        }
        for op in ops {
            match op {
                Op::CreateOrUpdateMeter { meter, bands } => {
                    state.meters.insert(meter.name.clone(), (meter, bands));
                }
                Op::CreateOrUpdateLogicalSwitch { switch } => {
                    state.switches.insert(switch.name.clone(), switch);
                }
                Op::CreateOrUpdateLogicalRouter { router } => {
                    state.routers.insert(router.name.clone(), router);
                }
                Op::CreateOrUpdateAddressSet { set } => {
                    state.address_sets.insert(set.name.clone(), set);
                }
                Op::DeleteLogicalSwitch { name } => {
                    state.switches.remove(&name);
                }
                Op::DeleteLogicalRouter { name } => {
                    state.routers.remove(&name);
                }
                Op::DeleteAddressSet { name } => {
                    state.address_sets.remove(&name);
                }
            }
        }
        Ok(())
    }
}
