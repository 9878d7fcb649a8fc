use crate::net::{FieldValue, sequence_greater_than};

bitflags::bitflags! {
    /// One bit per replicated property. Single bits double as keys in the
    /// per-observer acknowledgement table.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FieldMask: u8 {
        const TRANSFORM = 1 << 0;
        const HEALTH = 1 << 1;
        const BOUND_WEAPON = 1 << 2;
        const OWNER = 1 << 3;
        const HIT_OUTCOME = 1 << 4;

        const COMBATANT = Self::TRANSFORM.bits() | Self::HEALTH.bits() | Self::BOUND_WEAPON.bits();
        const WEAPON = Self::TRANSFORM.bits() | Self::OWNER.bits() | Self::HIT_OUTCOME.bits();
    }
}

impl FieldMask {
    pub fn of(value: &FieldValue) -> Self {
        match value {
            FieldValue::Transform { .. } => Self::TRANSFORM,
            FieldValue::Health(_) => Self::HEALTH,
            FieldValue::BoundWeapon(_) => Self::BOUND_WEAPON,
            FieldValue::Owner(_) => Self::OWNER,
            FieldValue::HitOutcome { .. } => Self::HIT_OUTCOME,
        }
    }
}

/// A property owned by the authority and mirrored elsewhere. The version
/// starts at 1 and moves forward on every authoritative write; mirrors
/// accept a value only when its version is newer than theirs.
#[derive(Debug, Clone, PartialEq)]
pub struct Replicated<T> {
    value: T,
    version: u32,
}

impl<T: Clone + PartialEq> Replicated<T> {
    pub fn new(value: T) -> Self {
        Self { value, version: 1 }
    }

    /// Mirror-side constructor for a value first seen at `version`.
    pub fn received(value: T, version: u32) -> Self {
        Self { value, version }
    }

    pub fn get(&self) -> &T {
        &self.value
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// Writes `value`, bumping the version only when it actually changes.
    pub(crate) fn set(&mut self, value: T) -> bool {
        if self.value == value {
            return false;
        }
        self.force(value);
        true
    }

    /// Writes `value` and always bumps the version, so mirrors see a fresh
    /// change even when the value repeats.
    pub(crate) fn force(&mut self, value: T) {
        self.value = value;
        self.version = self.version.wrapping_add(1);
    }

    /// Returns the previous value when the incoming version is newer.
    pub(crate) fn apply(&mut self, value: T, version: u32) -> Option<T> {
        if !sequence_greater_than(version, self.version) {
            return None;
        }
        self.version = version;
        Some(std::mem::replace(&mut self.value, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_only_bumps_on_change() {
        let mut field = Replicated::new(100.0f32);
        assert_eq!(field.version(), 1);

        assert!(!field.set(100.0));
        assert_eq!(field.version(), 1);

        assert!(field.set(80.0));
        assert_eq!(field.version(), 2);
    }

    #[test]
    fn force_bumps_for_identical_values() {
        let mut field = Replicated::new(Some(3u32));
        field.force(Some(3));
        field.force(Some(3));
        assert_eq!(field.version(), 3);
    }

    #[test]
    fn apply_ignores_stale_and_duplicate_versions() {
        let mut mirror = Replicated::received(100.0f32, 4);

        assert_eq!(mirror.apply(90.0, 4), None);
        assert_eq!(mirror.apply(95.0, 3), None);
        assert_eq!(*mirror.get(), 100.0);

        assert_eq!(mirror.apply(60.0, 6), Some(100.0));
        assert_eq!(mirror.apply(80.0, 5), None);
        assert_eq!(*mirror.get(), 60.0);
    }

    #[test]
    fn field_masks_partition_entity_kinds() {
        assert!(FieldMask::COMBATANT.contains(FieldMask::HEALTH));
        assert!(!FieldMask::WEAPON.contains(FieldMask::HEALTH));
        assert_eq!(
            FieldMask::COMBATANT & FieldMask::WEAPON,
            FieldMask::TRANSFORM
        );
        assert_eq!(FieldMask::of(&FieldValue::Owner(None)), FieldMask::OWNER);
    }
}
