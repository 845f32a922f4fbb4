//! One read-decode-publish pass over the configured registers.

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, error};

use crate::client::{RegisterClient, TransportError};
use crate::decode::{DecodeError, decode};
use crate::register::{RegisterError, RegisterMap, RegisterSpec};
use crate::state::BridgeState;
use crate::store::{PublishStore, StoreError};

/// Bus path of the freshness counter.
pub const UPDATE_INDEX_PATH: &str = "/UpdateIndex";

/// Why a single register was skipped this cycle.
#[derive(Debug, Error)]
pub enum RegisterFault {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

#[derive(Debug)]
pub struct RegisterFailure {
    pub register: &'static str,
    pub fault: RegisterFault,
}

/// A failure outside the per-register guards; the cycle is abandoned.
#[derive(Debug, Error)]
#[error("Store rejected write to '{path}': {source}")]
pub struct CycleError {
    pub path: String,
    #[source]
    pub source: StoreError,
}

/// Outcome of a completed cycle.
#[derive(Debug)]
pub struct CycleReport {
    /// Freshness counter after this cycle.
    pub update_index: u8,
    pub completed_at: DateTime<Utc>,
    /// Paths that received a new value, in poll order.
    pub updated: Vec<&'static str>,
    pub failures: Vec<RegisterFailure>,
}

/// Ordered list of registers polled on every tick.
#[derive(Debug, Clone)]
pub struct PollCycle {
    registers: Vec<RegisterSpec>,
}

impl PollCycle {
    /// Resolve `names` against the register map.
    ///
    /// Unknown names fail here, at startup, so polling never misses a lookup.
    pub fn new<S: AsRef<str>>(map: &RegisterMap, names: &[S]) -> Result<Self, RegisterError> {
        let registers = names
            .iter()
            .map(|name| map.lookup(name.as_ref()).cloned())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { registers })
    }

    /// Poll every register of the map in table order.
    pub fn all(map: &RegisterMap) -> Self {
        Self {
            registers: map.iter().cloned().collect(),
        }
    }

    pub fn registers(&self) -> &[RegisterSpec] {
        &self.registers
    }

    /// Run one cycle.
    ///
    /// Each register is read and decoded independently; a failed read or
    /// decode is logged and leaves the previously published value in place.
    /// Once every register was attempted the freshness counter advances by
    /// exactly one. A store error aborts the cycle without advancing it.
    pub async fn run<C: RegisterClient>(
        &self,
        client: &mut C,
        store: &mut PublishStore,
        state: &mut BridgeState,
    ) -> Result<CycleReport, CycleError> {
        let mut updated = Vec::with_capacity(self.registers.len());
        let mut failures = Vec::new();

        for spec in &self.registers {
            match read_register(client, spec).await {
                Ok(value) => {
                    store.write(spec.path, value).map_err(|source| CycleError {
                        path: spec.path.to_string(),
                        source,
                    })?;
                    debug!(
                        register = spec.name,
                        path = spec.path,
                        "{} = {} {}",
                        spec.description,
                        value,
                        spec.unit
                    );
                    updated.push(spec.path);
                }
                Err(fault) => {
                    error!(
                        register = spec.name,
                        address = spec.address,
                        error = %fault,
                        "Register read failed, keeping last published value"
                    );
                    failures.push(RegisterFailure {
                        register: spec.name,
                        fault,
                    });
                }
            }
        }

        let next_index = state.update_index().next();
        store
            .write(UPDATE_INDEX_PATH, next_index)
            .map_err(|source| CycleError {
                path: UPDATE_INDEX_PATH.to_string(),
                source,
            })?;

        let completed_at = Utc::now();
        let update_index = state.complete_cycle(completed_at, failures.len());

        debug!(
            update_index,
            updated = updated.len(),
            failed = failures.len(),
            "Poll cycle complete"
        );

        Ok(CycleReport {
            update_index,
            completed_at,
            updated,
            failures,
        })
    }
}

async fn read_register<C: RegisterClient>(
    client: &mut C,
    spec: &RegisterSpec,
) -> Result<f64, RegisterFault> {
    let words = client
        .read_holding_registers(spec.address, spec.word_count())
        .await?;
    Ok(decode(spec, &words)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::ValueFormat;
    use lambda_common::TelemetryValue;
    use std::collections::HashMap;

    /// Answers reads from a fixed table; missing addresses fail.
    #[derive(Default)]
    struct ScriptedClient {
        words: HashMap<u16, Vec<u16>>,
        reads: Vec<(u16, u16)>,
    }

    impl ScriptedClient {
        fn with(mut self, address: u16, words: &[u16]) -> Self {
            self.words.insert(address, words.to_vec());
            self
        }
    }

    impl RegisterClient for ScriptedClient {
        async fn connect(&mut self) -> Result<(), TransportError> {
            Ok(())
        }

        async fn read_holding_registers(
            &mut self,
            address: u16,
            count: u16,
        ) -> Result<Vec<u16>, TransportError> {
            self.reads.push((address, count));
            self.words
                .get(&address)
                .cloned()
                .ok_or_else(|| TransportError::Io("no response".to_string()))
        }

        async fn close(&mut self) {}
    }

    fn store_for(cycle: &PollCycle) -> PublishStore {
        let mut store = PublishStore::new("lambda_40");
        for spec in cycle.registers() {
            store
                .register_path(spec.path, 0u64, ValueFormat::for_unit(spec.unit), true, None)
                .unwrap();
        }
        store
            .register_path(UPDATE_INDEX_PATH, 0u64, ValueFormat::Plain, false, None)
            .unwrap();
        store
    }

    fn healthy_client() -> ScriptedClient {
        ScriptedClient::default()
            .with(1003, &[3])
            .with(1004, &[2345])
            .with(1016, &[455])
            .with(103, &[0xFFFF])
            .with(1020, &[0x0001, 0xE240])
    }

    #[tokio::test]
    async fn test_full_cycle() {
        let cycle = PollCycle::all(&RegisterMap::lambda());
        let mut store = store_for(&cycle);
        let mut state = BridgeState::new();
        let mut client = healthy_client();

        let report = cycle.run(&mut client, &mut store, &mut state).await.unwrap();

        assert_eq!(report.update_index, 1);
        assert_eq!(report.updated.len(), 5);
        assert!(report.failures.is_empty());
        assert_eq!(store.read("/State"), Some(&TelemetryValue::Gauge(3.0)));
        assert_eq!(store.read("/Temperature"), Some(&TelemetryValue::Gauge(23.45)));
        assert_eq!(
            store.read("/TargetTemperature"),
            Some(&TelemetryValue::Gauge(45.5))
        );
        assert_eq!(store.read("/Ac/Power"), Some(&TelemetryValue::Gauge(-1.0)));
        assert_eq!(
            store.read("/Ac/Energy/Forward"),
            Some(&TelemetryValue::Gauge(123.456))
        );
        assert_eq!(store.read(UPDATE_INDEX_PATH), Some(&TelemetryValue::Counter(1)));
        assert_eq!(
            client.reads,
            vec![(1003, 1), (1004, 1), (1016, 1), (103, 1), (1020, 2)]
        );
    }

    #[tokio::test]
    async fn test_failed_read_keeps_stale_value() {
        let cycle = PollCycle::all(&RegisterMap::lambda());
        let mut store = store_for(&cycle);
        let mut state = BridgeState::new();

        cycle
            .run(&mut healthy_client(), &mut store, &mut state)
            .await
            .unwrap();

        // Temperature stops answering, power changes.
        let mut client = healthy_client().with(103, &[1520]);
        client.words.remove(&1004);

        let report = cycle.run(&mut client, &mut store, &mut state).await.unwrap();

        assert_eq!(report.update_index, 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].register, "temp");
        assert!(matches!(
            report.failures[0].fault,
            RegisterFault::Transport(_)
        ));
        assert_eq!(store.read("/Temperature"), Some(&TelemetryValue::Gauge(23.45)));
        assert_eq!(store.read("/Ac/Power"), Some(&TelemetryValue::Gauge(1520.0)));
        assert!(!report.updated.contains(&"/Temperature"));
    }

    #[tokio::test]
    async fn test_short_read_is_a_decode_failure() {
        let map = RegisterMap::lambda();
        let cycle = PollCycle::new(&map, &["energy", "power"]).unwrap();
        let mut store = store_for(&cycle);
        let mut state = BridgeState::new();
        let mut client = ScriptedClient::default()
            .with(1020, &[0x0001])
            .with(103, &[900]);

        let report = cycle.run(&mut client, &mut store, &mut state).await.unwrap();

        assert!(matches!(report.failures[0].fault, RegisterFault::Decode(_)));
        assert_eq!(store.read("/Ac/Energy/Forward"), Some(&TelemetryValue::Counter(0)));
        assert_eq!(store.read("/Ac/Power"), Some(&TelemetryValue::Gauge(900.0)));
        assert_eq!(report.update_index, 1);
    }

    #[tokio::test]
    async fn test_everything_failing_still_counts_the_cycle() {
        let cycle = PollCycle::all(&RegisterMap::lambda());
        let mut store = store_for(&cycle);
        let mut state = BridgeState::new();

        let report = cycle
            .run(&mut ScriptedClient::default(), &mut store, &mut state)
            .await
            .unwrap();

        assert_eq!(report.failures.len(), 5);
        assert_eq!(report.update_index, 1);
        assert_eq!(state.failed_reads(), 5);
        assert!(state.last_update().is_some());
    }

    #[test]
    fn test_unknown_register_fails_at_construction() {
        let map = RegisterMap::lambda();
        let result = PollCycle::new(&map, &["state", "humidity"]);
        assert_eq!(
            result.unwrap_err(),
            RegisterError::UnknownRegister("humidity".to_string())
        );
    }

    #[tokio::test]
    async fn test_store_error_abandons_cycle() {
        let cycle = PollCycle::all(&RegisterMap::lambda());
        // No paths registered at all.
        let mut store = PublishStore::new("lambda_40");
        let mut state = BridgeState::new();

        let err = cycle
            .run(&mut healthy_client(), &mut store, &mut state)
            .await
            .unwrap_err();

        assert_eq!(err.path, "/State");
        assert_eq!(state.update_index().value(), 0);
        assert!(state.last_update().is_none());
    }

    #[tokio::test]
    async fn test_update_index_wraps() {
        let map = RegisterMap::lambda();
        let cycle = PollCycle::new(&map, &["power"]).unwrap();
        let mut store = store_for(&cycle);
        let mut state = BridgeState::new();
        let mut client = ScriptedClient::default().with(103, &[10]);

        let mut last = 0;
        for _ in 0..256 {
            last = cycle
                .run(&mut client, &mut store, &mut state)
                .await
                .unwrap()
                .update_index;
        }

        assert_eq!(last, 0);
        assert_eq!(store.read(UPDATE_INDEX_PATH), Some(&TelemetryValue::Counter(0)));
    }
}
