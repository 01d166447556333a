use std::sync::Mutex;

use lanegraph_core::algo::DensityGrid;
use lanegraph_core::model::GraphStore;

/// Outcome of one position report against the danger zone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneEvent {
    /// First report inside the zone
    Entered,
    /// Still inside; the event was already sent
    Inside,
    Outside,
}

/// Whether the caller is currently inside a high-density area
#[derive(Debug, Default)]
pub struct DangerZone {
    inside: bool,
}

impl DangerZone {
    pub fn update(&mut self, dangerous: bool) -> ZoneEvent {
        let was_inside = self.inside;
        self.inside = dangerous;
        match (dangerous, was_inside) {
            (true, false) => ZoneEvent::Entered,
            (true, true) => ZoneEvent::Inside,
            (false, _) => ZoneEvent::Outside,
        }
    }
}

pub struct AppState {
    pub store: GraphStore,
    pub density: Option<DensityGrid>,
    // Single tracked user, as there is no session handling
    pub zone: Mutex<DangerZone>,
}

impl AppState {
    pub fn new(store: GraphStore, density: Option<DensityGrid>) -> Self {
        Self {
            store,
            density,
            zone: Mutex::new(DangerZone::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entering_fires_once_until_left() {
        let mut zone = DangerZone::default();
        assert_eq!(zone.update(false), ZoneEvent::Outside);
        assert_eq!(zone.update(true), ZoneEvent::Entered);
        assert_eq!(zone.update(true), ZoneEvent::Inside);
        assert_eq!(zone.update(false), ZoneEvent::Outside);
        assert_eq!(zone.update(true), ZoneEvent::Entered);
    }
}
