//! Door Safety Timer
//!
//! ## 概要
//! 解錠されたドアを一定時間後に自動で再施錠する安全タイマー。
//! - 解錠 → `now + auto_relock_delay` のデッドラインを設定
//! - デッドライン到達時にまだ解錠中なら設備レジストリへ施錠更新を1回発行
//! - 手動施錠でタイマーはキャンセル（更新は手動操作側が実施済み）
//! - 再解錠はデッドラインをリセット（延長ではなく now+delay で張り直し）
//!
//! ## 設計
//! ドアIDごとにタイマーハンドルを持つマップ。複数ドアが同時に
//! カウントダウンしてもハンドルを潰し合わない。世代カウンタで
//! 発火時の「まだ解錠中か」を判定する。
//!
//! デッドライン発火時の更新失敗はログのみ。UIは自動で再武装せず、
//! 次の手動操作まで物理状態とレジストリ状態が乖離し得る。

use crate::equipment_registry::{EquipmentUpdate, EquipmentUpdater};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Default auto-relock delay
pub const DEFAULT_AUTO_RELOCK_SECS: u64 = 10;

/// Door lock state as seen by the timer
#[derive(Debug, Clone, Serialize)]
pub struct DoorLockState {
    pub door_id: String,
    pub locked: bool,
    /// Set while an auto-relock deadline is pending
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_deadline: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct DoorEntry {
    locked: bool,
    /// Bumped on every transition; lets a fired deadline detect staleness
    generation: u64,
    pending: Option<JoinHandle<()>>,
    deadline: Option<DateTime<Utc>>,
}

/// Auto-relock safety timer, one deadline per door at most
pub struct DoorTimer {
    registry: Arc<dyn EquipmentUpdater>,
    relock_delay: Duration,
    doors: Mutex<HashMap<String, DoorEntry>>,
}

impl DoorTimer {
    pub fn new(registry: Arc<dyn EquipmentUpdater>, relock_delay: Duration) -> Self {
        Self {
            registry,
            relock_delay,
            doors: Mutex::new(HashMap::new()),
        }
    }

    /// A door was unlocked: arm (or reset) its auto-relock deadline
    ///
    /// Re-unlocking while a deadline is pending cancels and re-arms at
    /// `now + delay`; the original target time is discarded, never extended
    /// additively. Returns the new deadline.
    pub async fn unlocked(self: &Arc<Self>, door_id: &str) -> DateTime<Utc> {
        let mut doors = self.doors.lock().await;
        let entry = doors.entry(door_id.to_string()).or_default();

        if let Some(handle) = entry.pending.take() {
            handle.abort();
            debug!(door_id = %door_id, "Pending auto-relock deadline reset");
        }

        entry.locked = false;
        entry.generation += 1;
        let generation = entry.generation;

        let deadline =
            Utc::now() + chrono::Duration::milliseconds(self.relock_delay.as_millis() as i64);
        entry.deadline = Some(deadline);

        let timer = Arc::clone(self);
        let door = door_id.to_string();
        entry.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(timer.relock_delay).await;
            timer.fire(&door, generation).await;
        }));

        info!(
            door_id = %door_id,
            deadline = %deadline,
            delay_secs = self.relock_delay.as_secs(),
            "Auto-relock deadline armed"
        );
        deadline
    }

    /// A door was manually locked: cancel its pending deadline
    ///
    /// The timer issues no update here; the manual action already performed
    /// its own registry update.
    pub async fn locked(&self, door_id: &str) {
        let mut doors = self.doors.lock().await;
        let entry = doors.entry(door_id.to_string()).or_default();

        if let Some(handle) = entry.pending.take() {
            handle.abort();
            debug!(door_id = %door_id, "Pending auto-relock deadline cancelled by manual lock");
        }
        entry.locked = true;
        entry.generation += 1;
        entry.deadline = None;
    }

    /// Deadline expiry: relock if the door is still unlocked
    async fn fire(&self, door_id: &str, generation: u64) {
        {
            let mut doors = self.doors.lock().await;
            let Some(entry) = doors.get_mut(door_id) else {
                return;
            };
            // A newer transition supersedes this deadline
            if entry.generation != generation || entry.locked {
                return;
            }
            entry.locked = true;
            entry.pending = None;
            entry.deadline = None;
        }

        info!(door_id = %door_id, "Auto-relock deadline reached, issuing lock update");
        if let Err(e) = self
            .registry
            .update(door_id, EquipmentUpdate::lock(true))
            .await
        {
            // Logged and swallowed: registry and physical state may diverge
            // until the next manual interaction
            warn!(door_id = %door_id, error = %e, "Auto-relock update failed");
        }
    }

    /// A door's view was unmounted: cancel its deadline and forget it
    pub async fn release(&self, door_id: &str) {
        let mut doors = self.doors.lock().await;
        if let Some(mut entry) = doors.remove(door_id) {
            if let Some(handle) = entry.pending.take() {
                handle.abort();
                debug!(door_id = %door_id, "Pending auto-relock deadline released");
            }
        }
    }

    /// Cancel every pending deadline (process teardown)
    pub async fn shutdown(&self) {
        let mut doors = self.doors.lock().await;
        let mut cancelled = 0;
        for entry in doors.values_mut() {
            if let Some(handle) = entry.pending.take() {
                handle.abort();
                cancelled += 1;
            }
        }
        doors.clear();
        if cancelled > 0 {
            info!(cancelled = cancelled, "Door timers cancelled on shutdown");
        }
    }

    /// Whether a deadline is pending for the door
    pub async fn is_pending(&self, door_id: &str) -> bool {
        let doors = self.doors.lock().await;
        doors
            .get(door_id)
            .map(|entry| entry.deadline.is_some())
            .unwrap_or(false)
    }

    /// Snapshot of all known doors
    pub async fn snapshot(&self) -> Vec<DoorLockState> {
        let doors = self.doors.lock().await;
        let mut states: Vec<DoorLockState> = doors
            .iter()
            .map(|(door_id, entry)| DoorLockState {
                door_id: door_id.clone(),
                locked: entry.locked,
                pending_deadline: entry.deadline,
            })
            .collect();
        states.sort_by(|a, b| a.door_id.cmp(&b.door_id));
        states
    }
}
