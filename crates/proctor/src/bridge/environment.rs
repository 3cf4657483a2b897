use proctor_core::{HostEnvironment, ScreenGeometry};

use std::sync::{
    Mutex, MutexGuard,
    atomic::{AtomicBool, Ordering},
};

use tracing::{debug, error};

/// Latest geometry and connectivity reported by the browser.
pub struct BridgeEnvironment {
    geometry: Mutex<ScreenGeometry>,
    online: AtomicBool,
}

impl Default for BridgeEnvironment {
    fn default() -> Self {
        Self {
            geometry: Mutex::new(ScreenGeometry::default()),
            online: AtomicBool::new(true),
        }
    }
}

impl BridgeEnvironment {
    /// Record a new measurement.
    pub fn update_geometry(&self, geometry: ScreenGeometry) {
        debug!(?geometry, "Geometry updated");
        *self.lock() = geometry;
    }

    /// Record `navigator.onLine`.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    fn lock(&self) -> MutexGuard<'_, ScreenGeometry> {
        self.geometry.lock().unwrap_or_else(|e| {
            error!("Geometry lock poisoned, recovering: {}", e);
            e.into_inner()
        })
    }
}

impl HostEnvironment for BridgeEnvironment {
    fn screen_geometry(&self) -> ScreenGeometry {
        *self.lock()
    }

    fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}
