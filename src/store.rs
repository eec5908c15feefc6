// File: src/store.rs
//! In-memory alarm collection with optional persistence and a snapshot
//! subscriber (the running matcher).
use crate::context::SharedContext;
use crate::model::{AlarmPatch, AlarmRecord};
use crate::storage::LocalStorage;
use anyhow::Result;
use tokio::sync::watch;

#[derive(Debug, Default)]
pub struct AlarmStore {
    alarms: Vec<AlarmRecord>,
    ctx: Option<SharedContext>,
    subscriber: Option<watch::Sender<Vec<AlarmRecord>>>,
}

impl AlarmStore {
    /// A store that lives in memory only.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the persisted collection. Every later mutation is written back.
    pub fn load(ctx: SharedContext) -> Result<Self> {
        let alarms = LocalStorage::load_alarms(ctx.as_ref())?;
        log::debug!("Loaded {} alarm(s)", alarms.len());
        Ok(Self {
            alarms,
            ctx: Some(ctx),
            subscriber: None,
        })
    }

    /// Registers the matcher's snapshot channel and sends it the current list.
    pub fn subscribe(&mut self, tx: watch::Sender<Vec<AlarmRecord>>) {
        self.subscriber = Some(tx);
        self.publish();
    }

    pub fn alarms(&self) -> &[AlarmRecord] {
        &self.alarms
    }

    pub fn len(&self) -> usize {
        self.alarms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alarms.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&AlarmRecord> {
        self.alarms.iter().find(|a| a.id == id)
    }

    /// Resolves a full id or an unambiguous id prefix (as typed on the CLI).
    pub fn resolve_id(&self, prefix: &str) -> Option<String> {
        if self.get(prefix).is_some() {
            return Some(prefix.to_string());
        }
        let mut hits = self.alarms.iter().filter(|a| a.id.starts_with(prefix));
        match (hits.next(), hits.next()) {
            (Some(a), None) if !prefix.is_empty() => Some(a.id.clone()),
            _ => None,
        }
    }

    /// Appends `alarm`. With persistence, the append happens on the file's
    /// current contents, so alarms added by another process are kept and
    /// picked up here as well.
    pub fn add(&mut self, alarm: AlarmRecord) -> Result<()> {
        log::info!("Adding alarm {} ({})", alarm.id, alarm.repeat);
        match &self.ctx {
            Some(ctx) => {
                self.alarms = LocalStorage::modify_alarms(ctx.as_ref(), |list| list.push(alarm))?;
            }
            None => self.alarms.push(alarm),
        }
        self.publish();
        Ok(())
    }

    /// Returns the updated record, or `None` when `id` is unknown.
    pub fn update(&mut self, id: &str, patch: AlarmPatch) -> Result<Option<AlarmRecord>> {
        let Some(alarm) = self.alarms.iter_mut().find(|a| a.id == id) else {
            return Ok(None);
        };
        patch.apply(alarm);
        let updated = alarm.clone();
        self.commit()?;
        Ok(Some(updated))
    }

    pub fn delete(&mut self, id: &str) -> Result<bool> {
        let before = self.alarms.len();
        self.alarms.retain(|a| a.id != id);
        if self.alarms.len() == before {
            return Ok(false);
        }
        log::info!("Deleted alarm {}", id);
        self.commit()?;
        Ok(true)
    }

    /// Flips `enabled`. Returns the new state, or `None` when `id` is unknown.
    pub fn toggle(&mut self, id: &str) -> Result<Option<bool>> {
        let Some(alarm) = self.alarms.iter_mut().find(|a| a.id == id) else {
            return Ok(None);
        };
        alarm.enabled = !alarm.enabled;
        let state = alarm.enabled;
        self.commit()?;
        Ok(Some(state))
    }

    pub fn set_enabled(&mut self, id: &str, enabled: bool) -> Result<bool> {
        let patch = AlarmPatch {
            enabled: Some(enabled),
            ..Default::default()
        };
        Ok(self.update(id, patch)?.is_some())
    }

    fn commit(&mut self) -> Result<()> {
        self.publish();
        if let Some(ctx) = &self.ctx {
            LocalStorage::save_alarms(ctx.as_ref(), &self.alarms)?;
        }
        Ok(())
    }

    fn publish(&mut self) {
        let Some(tx) = &self.subscriber else {
            return;
        };
        if tx.send(self.alarms.clone()).is_err() {
            log::debug!("Alarm matcher gone, unsubscribing");
            self.subscriber = None;
        }
    }
}
