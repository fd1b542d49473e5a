//! Deficit arithmetic for the task generator.
//!
//! Each function answers "how many open slots should this target imply
//! right now". The engine subtracts what is already queued and assigned and
//! enqueues exactly the difference.

use crate::construction::ConstructionSite;
use crate::production::ProductionStation;

/// Requests to add: `implied − (queued + assigned)`, never negative.
pub fn deficit(implied: u32, queued: u32, assigned: u32) -> u32 {
    implied.saturating_sub(queued + assigned)
}

/// Queued requests beyond what the target still implies. Used to trim a
/// queue when demand shrinks.
pub fn surplus(implied: u32, queued: u32, assigned: u32) -> u32 {
    (queued + assigned).saturating_sub(implied).min(queued)
}

pub fn node_gather_slots(remaining: u32, slots: u32) -> u32 {
    if remaining > 0 { slots } else { 0 }
}

/// Carriers worth binding to a site: enough full loads to cover what is
/// still undelivered, bounded by the per-site cap.
pub fn site_haul_slots(site: &ConstructionSite, carry_capacity: u32, max_haulers: u32) -> u32 {
    if site.is_complete() || site.materials_complete() {
        return 0;
    }
    site.total_remaining()
        .div_ceil(carry_capacity.max(1))
        .min(max_haulers)
}

pub fn site_build_slots(site: &ConstructionSite, max_builders: u32) -> u32 {
    if !site.is_complete() && site.materials_complete() {
        max_builders
    } else {
        0
    }
}

pub fn station_production_slots(station: &ProductionStation) -> u32 {
    if station.recipe().is_none() {
        return 0;
    }
    station.effective_max_workers().min(station.work_point_capacity())
}

pub fn station_hauler_slots(station: &ProductionStation) -> u32 {
    if station.recipe().is_some() && station.requires_hauler_logistics() {
        station.max_haulers()
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{RecipeId, ResourceAmount, ResourceKind};
    use crate::production::{Recipe, StationSpec, StationTuning};

    const WOOD: ResourceKind = ResourceKind(0);

    #[test]
    fn test_deficit_and_surplus() {
        assert_eq!(deficit(3, 1, 1), 1);
        assert_eq!(deficit(3, 2, 2), 0);
        assert_eq!(surplus(1, 3, 0), 2);
        assert_eq!(surplus(1, 1, 3), 1);
        assert_eq!(surplus(5, 1, 1), 0);
    }

    #[test]
    fn test_node_slots_vanish_when_depleted() {
        assert_eq!(node_gather_slots(10, 3), 3);
        assert_eq!(node_gather_slots(0, 3), 0);
    }

    #[test]
    fn test_site_haul_slots_scale_with_remaining() {
        let site = ConstructionSite::new(&[ResourceAmount::new(WOOD, 25)], 10.0);
        assert_eq!(site_haul_slots(&site, 10, 5), 3);
        assert_eq!(site_haul_slots(&site, 10, 2), 2);
        assert_eq!(site_haul_slots(&site, 30, 5), 1);
        assert_eq!(site_build_slots(&site, 3), 0);
    }

    #[test]
    fn test_site_switches_from_haul_to_build() {
        let mut site = ConstructionSite::new(&[ResourceAmount::new(WOOD, 5)], 10.0);
        site.receive_delivery(WOOD, 5);
        assert_eq!(site_haul_slots(&site, 10, 3), 0);
        assert_eq!(site_build_slots(&site, 3), 3);
        site.add_work(10.0);
        assert_eq!(site_build_slots(&site, 3), 0);
    }

    #[test]
    fn test_station_slots() {
        let spec = StationSpec {
            work_points: 1,
            max_workers: 3,
            max_haulers: 2,
            require_hauler_logistics: true,
            ..StationSpec::default()
        };
        let mut station = ProductionStation::new(spec, StationTuning::default());
        assert_eq!(station_production_slots(&station), 0);
        assert_eq!(station_hauler_slots(&station), 0);

        station.set_recipe(Some(Recipe {
            id: RecipeId(0),
            name: "test".into(),
            inputs: vec![],
            outputs: vec![],
            craft_time_seconds: 1.0,
            batch_size: 1,
            specialization: None,
        }));
        assert_eq!(station_production_slots(&station), 1);
        assert_eq!(station_hauler_slots(&station), 2);
    }
}
