use crate::domain::model::{EngineStorage, Part, PartCatalog, PartKind};
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedParts {
    /// Parts above the tier threshold, in module/slot order.
    pub keep: Vec<Part>,
    /// Parts at or below the threshold; destroyed.
    pub discarded: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UpgradeReport {
    pub replaced: usize,
    pub repaired: usize,
    pub installed: usize,
    /// Slots left empty because no fresh part of the desired tier exists.
    pub unavailable: usize,
}

/// Moves tiered parts in and out of engine storages. Locked storages are
/// skipped by every operation.
pub struct EnginePartAllocator<'a> {
    parts: &'a PartCatalog,
}

impl<'a> EnginePartAllocator<'a> {
    pub fn new(parts: &'a PartCatalog) -> Self {
        Self { parts }
    }

    /// Empties every unlocked slot, keeping parts whose tier is strictly above `tier`.
    pub fn extract_above_tier(&self, storages: &mut [EngineStorage], tier: u8) -> ExtractedParts {
        let mut extracted = ExtractedParts::default();

        for storage in unlocked(storages) {
            for slot in storage.slots.iter_mut() {
                if let Some(part) = slot.part.take() {
                    if part.tier > tier {
                        extracted.keep.push(part);
                    } else {
                        extracted.discarded += 1;
                    }
                }
            }
        }

        tracing::debug!(
            "Extracted {} engine parts above tier {}, discarded {}",
            extracted.keep.len(),
            tier,
            extracted.discarded
        );
        extracted
    }

    /// Fills empty slots with the highest-tier part of the matching kind.
    /// Returns the parts that found no slot.
    pub fn reinstall(&self, storages: &mut [EngineStorage], mut parts: Vec<Part>) -> Vec<Part> {
        // Stable: equal tiers keep their extraction order.
        parts.sort_by(|a, b| b.tier.cmp(&a.tier));

        let mut by_kind: BTreeMap<PartKind, VecDeque<Part>> = BTreeMap::new();
        for part in parts {
            by_kind.entry(part.kind).or_default().push_back(part);
        }

        for storage in unlocked(storages) {
            for slot in storage.slots.iter_mut().filter(|slot| slot.part.is_none()) {
                if let Some(part) = by_kind.get_mut(&slot.kind).and_then(VecDeque::pop_front) {
                    slot.part = Some(part);
                }
            }
        }

        let remainder: Vec<Part> = by_kind.into_values().flatten().collect();
        if !remainder.is_empty() {
            tracing::debug!("{} engine parts could not be reinstalled", remainder.len());
        }
        remainder
    }

    /// Brings every unlocked slot to at least `desired_tier`, repairing parts
    /// that already meet it.
    pub fn upgrade_or_repair_to_tier(
        &self,
        storages: &mut [EngineStorage],
        desired_tier: u8,
    ) -> UpgradeReport {
        let mut report = UpgradeReport::default();

        for storage in unlocked(storages) {
            for slot in storage.slots.iter_mut() {
                let installed_tier = slot.part.as_ref().map(|part| part.tier);
                match installed_tier {
                    Some(tier) if tier < desired_tier => {
                        slot.part = self.parts.fresh(slot.kind, desired_tier);
                        if slot.part.is_some() {
                            report.replaced += 1;
                        } else {
                            report.unavailable += 1;
                        }
                    }
                    Some(_) => {
                        if let Some(part) = slot.part.as_mut() {
                            part.condition = part.max_condition;
                            report.repaired += 1;
                        }
                    }
                    None if desired_tier > 0 => {
                        slot.part = self.parts.fresh(slot.kind, desired_tier);
                        if slot.part.is_some() {
                            report.installed += 1;
                        } else {
                            report.unavailable += 1;
                        }
                    }
                    None => {}
                }
            }
        }

        if report.unavailable > 0 {
            tracing::warn!(
                "No tier {} part available for {} engine slots",
                desired_tier,
                report.unavailable
            );
        }
        report
    }
}

fn unlocked(storages: &mut [EngineStorage]) -> impl Iterator<Item = &mut EngineStorage> {
    storages.iter_mut().filter(|storage| {
        if storage.locked {
            tracing::debug!("Skipping locked engine storage at socket {}", storage.socket);
        }
        !storage.locked
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::EngineSlot;

    const KINDS: [PartKind; 4] = [
        PartKind::Crankshaft,
        PartKind::Piston,
        PartKind::Piston,
        PartKind::Valve,
    ];

    fn part(kind: PartKind, tier: u8) -> Part {
        Part::new(kind, tier, 100.0)
    }

    fn storage_with(socket: usize, parts: &[Option<u8>]) -> EngineStorage {
        EngineStorage {
            socket,
            locked: false,
            slots: KINDS
                .iter()
                .zip(parts)
                .map(|(&kind, tier)| EngineSlot {
                    kind,
                    part: tier.map(|tier| part(kind, tier)),
                })
                .collect(),
        }
    }

    fn installed_tiers(storage: &EngineStorage) -> Vec<Option<u8>> {
        storage
            .slots
            .iter()
            .map(|slot| slot.part.as_ref().map(|part| part.tier))
            .collect()
    }

    #[test]
    fn test_extract_keeps_parts_above_tier_and_empties_slots() {
        let catalog = PartCatalog::standard(100.0);
        let allocator = EnginePartAllocator::new(&catalog);
        let mut storages = vec![storage_with(0, &[Some(3), Some(1), Some(2), None])];

        let extracted = allocator.extract_above_tier(&mut storages, 1);

        assert_eq!(extracted.discarded, 1);
        assert_eq!(
            extracted.keep,
            vec![part(PartKind::Crankshaft, 3), part(PartKind::Piston, 2)]
        );
        assert_eq!(installed_tiers(&storages[0]), vec![None, None, None, None]);
    }

    #[test]
    fn test_locked_storage_is_untouched() {
        let mut catalog = PartCatalog::standard(100.0);
        catalog.insert(PartKind::Valve, 3, 100.0);
        let allocator = EnginePartAllocator::new(&catalog);
        let mut locked = storage_with(1, &[Some(1), Some(1), None, Some(1)]);
        locked.locked = true;
        let before = locked.clone();
        let mut storages = vec![locked];

        let extracted = allocator.extract_above_tier(&mut storages, 0);
        assert!(extracted.keep.is_empty());
        assert_eq!(extracted.discarded, 0);

        let remainder = allocator.reinstall(&mut storages, vec![part(PartKind::Piston, 3)]);
        assert_eq!(remainder.len(), 1);

        let report = allocator.upgrade_or_repair_to_tier(&mut storages, 3);
        assert_eq!(report, UpgradeReport::default());
        assert_eq!(storages[0], before);
    }

    #[test]
    fn test_reinstall_places_highest_tier_first() {
        let catalog = PartCatalog::standard(100.0);
        let allocator = EnginePartAllocator::new(&catalog);
        let mut storages = vec![storage_with(0, &[None, None, Some(1), None])];

        let remainder = allocator.reinstall(
            &mut storages,
            vec![
                part(PartKind::Piston, 1),
                part(PartKind::Piston, 3),
                part(PartKind::Piston, 2),
                part(PartKind::Sparkplug, 3),
            ],
        );

        // One piston slot is occupied, so only the best piston goes in.
        assert_eq!(installed_tiers(&storages[0]), vec![None, Some(3), Some(1), None]);
        assert_eq!(
            remainder,
            vec![
                part(PartKind::Piston, 2),
                part(PartKind::Piston, 1),
                part(PartKind::Sparkplug, 3),
            ]
        );
    }

    #[test]
    fn test_extract_then_reinstall_conserves_parts() {
        let catalog = PartCatalog::standard(100.0);
        let allocator = EnginePartAllocator::new(&catalog);
        let mut storages = vec![
            storage_with(0, &[Some(3), Some(2), Some(3), Some(2)]),
            storage_with(2, &[Some(2), None, Some(3), Some(3)]),
        ];

        let extracted = allocator.extract_above_tier(&mut storages, 1);
        let count = extracted.keep.len();
        assert_eq!(count, 7);

        let remainder = allocator.reinstall(&mut storages, extracted.keep);
        assert!(remainder.is_empty());

        let installed: usize = storages
            .iter()
            .flat_map(|storage| storage.slots.iter())
            .filter(|slot| {
                slot.part
                    .as_ref()
                    .is_some_and(|installed| installed.kind == slot.kind)
            })
            .count();
        assert_eq!(installed, count);
    }

    #[test]
    fn test_upgrade_replaces_low_tier_and_fills_empty() {
        let catalog = PartCatalog::standard(100.0);
        let allocator = EnginePartAllocator::new(&catalog);
        let mut storages = vec![storage_with(0, &[Some(1), Some(3), None, Some(2)])];
        storages[0].slots[1].part = Some(part(PartKind::Piston, 3).damaged(10.0));

        let report = allocator.upgrade_or_repair_to_tier(&mut storages, 2);

        assert_eq!(installed_tiers(&storages[0]), vec![Some(2), Some(3), Some(2), Some(2)]);
        assert_eq!(storages[0].slots[1].part.as_ref().unwrap().condition, 100.0);
        assert_eq!(
            report,
            UpgradeReport {
                replaced: 1,
                repaired: 2,
                installed: 1,
                unavailable: 0,
            }
        );
    }

    #[test]
    fn test_upgrade_tier_zero_only_repairs() {
        let catalog = PartCatalog::standard(100.0);
        let allocator = EnginePartAllocator::new(&catalog);
        let mut storages = vec![storage_with(0, &[None, None, None, None])];
        storages[0].slots[0].part = Some(part(PartKind::Crankshaft, 1).damaged(5.0));

        let report = allocator.upgrade_or_repair_to_tier(&mut storages, 0);

        assert_eq!(report.repaired, 1);
        assert_eq!(report.installed, 0);
        assert_eq!(installed_tiers(&storages[0]), vec![Some(1), None, None, None]);
    }

    #[test]
    fn test_tier_monotonicity_with_catalog_exhaustion() {
        let mut catalog = PartCatalog::standard(100.0);
        catalog.remove(PartKind::Valve, 3);
        let allocator = EnginePartAllocator::new(&catalog);
        let mut storages = vec![storage_with(0, &[Some(1), Some(2), None, Some(1)])];

        let report = allocator.upgrade_or_repair_to_tier(&mut storages, 3);

        for slot in &storages[0].slots {
            match &slot.part {
                Some(installed) => assert!(installed.tier >= 3),
                None => assert_eq!(slot.kind, PartKind::Valve),
            }
        }
        assert_eq!(report.unavailable, 1);
        assert_eq!(report.replaced + report.installed, 3);
    }
}
