// -------------------------------------------------------------------------------------------------
//  Copyright (C) 2015-2026 Nautech Systems Pty Ltd. All rights reserved.
//  https://nautechsystems.io
//
//  Licensed under the GNU Lesser General Public License Version 3.0 (the "License");
//  You may not use this file except in compliance with the License.
//  You may obtain a copy of the License at https://www.gnu.org/licenses/lgpl-3.0.en.html
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.
// -------------------------------------------------------------------------------------------------

//! Per-account registry of device models.

use std::sync::Arc;

use dashmap::DashMap;

use super::device::Device;

/// Maps `device_id` to its model. Devices are created lazily on first
/// observation and live for the lifetime of the owning account; the
/// registry is never shared across accounts.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: DashMap<u64, Arc<Device>>,
}

impl DeviceRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the device model, creating it on first observation.
    #[must_use]
    pub fn ensure(&self, device_id: u64) -> Arc<Device> {
        if let Some(device) = self.devices.get(&device_id) {
            return device.clone();
        }
        log::debug!("Adding new device with ID {device_id}");
        self.devices
            .entry(device_id)
            .or_insert_with(|| Arc::new(Device::new(device_id)))
            .clone()
    }

    /// Returns the device model if it has been observed.
    #[must_use]
    pub fn get(&self, device_id: u64) -> Option<Arc<Device>> {
        self.devices.get(&device_id).map(|entry| entry.clone())
    }

    /// Returns all known device models.
    #[must_use]
    pub fn all(&self) -> Vec<Arc<Device>> {
        self.devices.iter().map(|entry| entry.clone()).collect()
    }

    /// Returns the number of known devices.
    #[must_use]
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Returns `true` when no device has been observed yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Sends the terminal closed notification to every device's listeners.
    pub fn close_all_listeners(&self) {
        for entry in self.devices.iter() {
            entry.close_listeners();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lazy_creation_is_idempotent() {
        let registry = DeviceRegistry::new();
        let first = registry.ensure(1234);
        let second = registry.ensure(1234);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_get_unknown_device() {
        let registry = DeviceRegistry::new();
        assert!(registry.get(1).is_none());
        assert!(registry.is_empty());
    }
}
