//! Stochastic parasite spawn policy.
use rand::{Rng, RngCore};

use crate::catalog::Item;
use crate::constants::{
    MSG_PARASITE_DISTRACTION, MSG_PARASITE_FATIGUE, MSG_PARASITE_PROCRASTINATION,
    PARASITE_DISTRACTION, PARASITE_FATIGUE, PARASITE_PROCRASTINATION,
};
use crate::grid::find_empty_position;
use crate::inventory::{Inventory, PlacedItem};
use crate::tuning::ParasiteTuning;

/// Parasite the policy wants to add, with the message key for the notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpawnProposal {
    pub parasite_id: &'static str,
    pub message_key: &'static str,
}

/// Decide whether a parasite appears this tick.
///
/// Nothing is drawn once `active` reaches the cap. Otherwise a single roll in
/// `[0, 1)` is compared, first match wins, against fatigue (late hours),
/// distraction (any hour) and procrastination (work-hours window).
pub fn check_parasite_spawn<R>(
    hour: f64,
    active: usize,
    tuning: &ParasiteTuning,
    rng: &mut R,
) -> Option<SpawnProposal>
where
    R: RngCore + ?Sized,
{
    if active >= tuning.max_active {
        return None;
    }
    let roll = rng.r#gen::<f64>();

    if hour >= tuning.fatigue_from_hour && roll < tuning.fatigue_chance {
        return Some(SpawnProposal {
            parasite_id: PARASITE_FATIGUE,
            message_key: MSG_PARASITE_FATIGUE,
        });
    }
    if roll < tuning.distraction_chance {
        return Some(SpawnProposal {
            parasite_id: PARASITE_DISTRACTION,
            message_key: MSG_PARASITE_DISTRACTION,
        });
    }
    let [start, end] = tuning.procrastination_hours;
    if (start..=end).contains(&hour) && roll < tuning.procrastination_chance {
        return Some(SpawnProposal {
            parasite_id: PARASITE_PROCRASTINATION,
            message_key: MSG_PARASITE_PROCRASTINATION,
        });
    }
    None
}

/// Place the parasite at the first free origin, bypassing energy and budget gates.
///
/// A full grid is not an error: the spawn is skipped and `None` returned.
pub fn spawn_parasite<R>(inventory: &mut Inventory, parasite: &Item, ids: &mut R) -> Option<PlacedItem>
where
    R: RngCore + ?Sized,
{
    let (x, y) = find_empty_position(inventory.grid(), parasite)?;
    inventory.force_place(parasite, x, y, ids).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Catalog, ItemKind};
    use crate::grid::GridMode;
    use rand::rngs::mock::StepRng;

    /// Generator whose `gen::<f64>()` yields approximately `value`.
    fn fixed_roll(value: f64) -> StepRng {
        let bits = (value * (1u64 << 53) as f64) as u64;
        StepRng::new(bits << 11, 0)
    }

    #[test]
    fn cap_blocks_without_drawing() {
        let tuning = ParasiteTuning::default();
        let mut rng = fixed_roll(0.0);
        assert_eq!(check_parasite_spawn(23.0, 3, &tuning, &mut rng), None);
    }

    #[test]
    fn fatigue_wins_late_at_night() {
        let tuning = ParasiteTuning::default();
        let proposal = check_parasite_spawn(22.5, 0, &tuning, &mut fixed_roll(0.3)).unwrap();
        assert_eq!(proposal.parasite_id, "para-fatigue");
        assert_eq!(proposal.message_key, "parasite.fatigue");
        assert_eq!(check_parasite_spawn(21.9, 0, &tuning, &mut fixed_roll(0.3)), None);
    }

    #[test]
    fn distraction_is_checked_before_procrastination() {
        let tuning = ParasiteTuning::default();
        let proposal = check_parasite_spawn(12.0, 1, &tuning, &mut fixed_roll(0.01)).unwrap();
        assert_eq!(proposal.parasite_id, "para-distraction");
        assert_eq!(check_parasite_spawn(12.0, 1, &tuning, &mut fixed_roll(0.5)), None);
    }

    #[test]
    fn procrastination_needs_work_hours() {
        let tuning = ParasiteTuning {
            distraction_chance: 0.0,
            ..ParasiteTuning::default()
        };
        let roll = || fixed_roll(0.01);
        assert_eq!(
            check_parasite_spawn(10.0, 0, &tuning, &mut roll()).map(|p| p.parasite_id),
            Some("para-procrastination")
        );
        assert_eq!(
            check_parasite_spawn(18.0, 0, &tuning, &mut roll()).map(|p| p.parasite_id),
            Some("para-procrastination")
        );
        assert_eq!(check_parasite_spawn(9.5, 0, &tuning, &mut roll()), None);
        assert_eq!(check_parasite_spawn(18.5, 0, &tuning, &mut roll()), None);
    }

    #[test]
    fn late_night_rate_tracks_fatigue_chance() {
        use rand::SeedableRng;
        use rand_chacha::ChaCha20Rng;

        let tuning = ParasiteTuning::default();
        let mut rng = ChaCha20Rng::from_seed([4u8; 32]);
        let spawns = (0..10_000)
            .filter(|_| check_parasite_spawn(23.0, 0, &tuning, &mut rng).is_some())
            .count();
        assert!((3_600..4_400).contains(&spawns), "spawns {spawns}");
    }

    #[test]
    fn spawn_uses_first_free_cell_and_skips_when_full() {
        let catalog = Catalog::builtin();
        let fatigue = catalog.item("para-fatigue").unwrap().clone();
        let mut ids = StepRng::new(1, 1);
        let mut inventory = Inventory::new(GridMode::Day);
        let spawned = spawn_parasite(&mut inventory, &fatigue, &mut ids).unwrap();
        assert_eq!((spawned.x, spawned.y), (0, 0));
        assert_eq!(spawned.item.kind, ItemKind::Parasite);

        let wall = crate::catalog::Item::new("wall", ItemKind::Task, 8, 6);
        let mut full = Inventory::new(GridMode::Day);
        full.force_place(&wall, 0, 0, &mut ids).unwrap();
        assert!(spawn_parasite(&mut full, &fatigue, &mut ids).is_none());
        assert_eq!(full.parasite_count(), 0);
    }
}
