//! Slot table and allocation policy.
//!
//! The slot allocator is responsible for:
//! - Filling a fixed number of slots left to right, in precedence order:
//!   on-board sensor, requested USB cameras, then fallback videos
//! - Skipping candidates that fail classification without aborting the run
//! - Reporting an incomplete table as an error
//!
//! It MUST NOT:
//! - Reorder or evict a source once placed
//! - Retry the on-board sensor after a failed bring-up

use crate::camera::{
    create_fallback_source, create_usb_device, init_on_board_sensor,
    platform_supports_on_board_sensor, DeviceIdentity, DeviceNamespace, FallbackScan, LinkControl,
};
use crate::config::HubConfig;
use crate::error::{ProvisionError, Result};

/// Number of streams served per run.
pub const CAMERA_SLOTS: usize = 4;

/// Fixed-capacity arena of optional sources, indexed `0..N`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlotTable<const N: usize = CAMERA_SLOTS> {
    slots: [Option<DeviceIdentity>; N],
}

impl<const N: usize> Default for SlotTable<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> SlotTable<N> {
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| None),
        }
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    /// Place `identity` in the first empty slot and return its index.
    ///
    /// A full table hands the identity back.
    pub fn occupy(&mut self, identity: DeviceIdentity) -> std::result::Result<usize, DeviceIdentity> {
        match self.slots.iter().position(Option::is_none) {
            Some(index) => {
                self.slots[index] = Some(identity);
                Ok(index)
            }
            None => Err(identity),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.slots.iter().all(Option::is_some)
    }

    pub fn filled(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn get(&self, index: usize) -> Option<&DeviceIdentity> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    pub fn iter(&self) -> impl Iterator<Item = Option<&DeviceIdentity>> {
        self.slots.iter().map(Option::as_ref)
    }

    /// Occupied slots with their indices, in slot order.
    pub fn occupied(&self) -> impl Iterator<Item = (usize, &DeviceIdentity)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|identity| (index, identity)))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AllocationState {
    Empty,
    Filling,
    Complete,
    Incomplete,
}

/// Outcome of one allocation pass.
#[derive(Clone, Debug)]
pub struct Allocation {
    pub table: SlotTable,
    pub state: AllocationState,
    /// False when the on-board sensor was not requested or was demoted.
    pub sensor_enabled: bool,
}

impl Allocation {
    /// The table, if every slot was filled.
    pub fn into_complete(self) -> Result<SlotTable> {
        match self.state {
            AllocationState::Complete => Ok(self.table),
            _ => Err(ProvisionError::CapacityExhausted {
                filled: self.table.filled(),
                capacity: self.table.capacity(),
            }),
        }
    }
}

pub struct SlotAllocator<'a> {
    config: &'a HubConfig,
    namespace: &'a DeviceNamespace,
    host: &'a str,
    link: &'a mut dyn LinkControl,
    table: SlotTable,
    state: AllocationState,
}

impl<'a> SlotAllocator<'a> {
    /// `host` is the platform identity used to gate the on-board sensor.
    pub fn new(
        config: &'a HubConfig,
        namespace: &'a DeviceNamespace,
        host: &'a str,
        link: &'a mut dyn LinkControl,
    ) -> Self {
        Self {
            config,
            namespace,
            host,
            link,
            table: SlotTable::new(),
            state: AllocationState::Empty,
        }
    }

    pub fn state(&self) -> AllocationState {
        self.state
    }

    pub fn allocate(mut self) -> Allocation {
        self.state = AllocationState::Filling;

        let sensor_enabled = self.config.mipi_enabled && self.place_on_board_sensor();
        self.place_usb_cameras();
        if !self.table.is_complete() {
            self.place_fallback_videos();
        }

        self.state = if self.table.is_complete() {
            AllocationState::Complete
        } else {
            AllocationState::Incomplete
        };
        log::debug!(
            "allocation finished: {} of {} slots filled",
            self.table.filled(),
            self.table.capacity()
        );

        Allocation {
            table: self.table,
            state: self.state,
            sensor_enabled,
        }
    }

    fn place_on_board_sensor(&mut self) -> bool {
        if !platform_supports_on_board_sensor(self.host) {
            log::warn!(
                "MIPI camera is not supported on '{}', continuing without it",
                self.host
            );
            return false;
        }
        match init_on_board_sensor(self.host, &mut *self.link) {
            Ok(identity) => self.place(identity),
            Err(err) => {
                log::warn!("cannot initialize MIPI camera: {err}; continuing without it");
                false
            }
        }
    }

    fn place_usb_cameras(&mut self) {
        let config = self.config;
        let namespace = self.namespace;
        for name in &config.usb_cameras {
            if self.table.is_complete() {
                log::warn!("all slots are filled, ignoring USB camera '{name}'");
                continue;
            }
            match create_usb_device(namespace, name) {
                Ok(identity) => {
                    self.place(identity);
                }
                Err(err) => log::warn!("skipping USB camera '{name}': {err}"),
            }
        }
    }

    fn place_fallback_videos(&mut self) {
        let scan = FallbackScan::new(&self.config.video_dir, &self.config.video_ext);
        let candidates = match scan.candidates() {
            Ok(candidates) => candidates,
            Err(err) => {
                log::warn!("cannot list fallback videos: {err}");
                return;
            }
        };
        for path in candidates {
            match create_fallback_source(&path) {
                Ok(identity) => {
                    self.place(identity);
                }
                Err(err) => log::warn!("skipping fallback video {}: {err}", path.display()),
            }
            if self.table.is_complete() {
                break;
            }
        }
    }

    fn place(&mut self, identity: DeviceIdentity) -> bool {
        match self.table.occupy(identity) {
            Ok(index) => {
                if let Some(placed) = self.table.get(index) {
                    log::info!("slot {}: {placed}", index + 1);
                }
                true
            }
            Err(identity) => {
                log::warn!("no free slot for {identity}");
                false
            }
        }
    }
}

/// Fill a slot table from `config` and require it to be complete.
pub fn allocate_slots(
    config: &HubConfig,
    namespace: &DeviceNamespace,
    host: &str,
    link: &mut dyn LinkControl,
) -> Result<SlotTable> {
    SlotAllocator::new(config, namespace, host, link)
        .allocate()
        .into_complete()
}
