use crate::medication::MedicationId;

pub const MEDICATION_TAG_PREFIX: &str = "medication-";
pub const PUSH_TAG_PREFIX: &str = "push-";

/// The fixed-width time suffix keeps ids containing `-` distinct.
pub fn tag_for(medication_id: &MedicationId, time_of_day: &str) -> String {
    format!("{MEDICATION_TAG_PREFIX}{medication_id}-{time_of_day}")
}

/// Content-derived tag for server pushes that carry no explicit tag, so a
/// redelivered payload replaces its earlier copy instead of stacking.
pub fn push_tag(title: &str, body: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(title.as_bytes());
    hasher.update(&[0]);
    hasher.update(body.as_bytes());
    let digest = hasher.finalize().to_hex();
    format!("{PUSH_TAG_PREFIX}{}", &digest.as_str()[..16])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn formats_medication_tag() {
        assert_eq!(tag_for(&MedicationId::from(1u64), "08:00"), "medication-1-08:00");
    }

    #[test]
    fn identical_inputs_match() {
        let id = MedicationId::from("42");
        assert_eq!(tag_for(&id, "20:00"), tag_for(&id.clone(), "20:00"));
    }

    #[test]
    fn distinct_pairs_never_collide() {
        let ids = ["1", "11", "1-1", "1-08", "abc", "a-b-c", "08:00"];
        let times = ["00:00", "08:00", "08:01", "18:00", "23:59"];
        let mut seen = HashSet::new();
        for id in ids {
            for time in times {
                let tag = tag_for(&MedicationId::from(id), time);
                assert!(seen.insert(tag.clone()), "collision on {tag}");
            }
        }
    }

    #[test]
    fn push_tag_is_content_stable() {
        let first = push_tag("Medicine Reminder", "Time to take Aspirin");
        assert_eq!(first, push_tag("Medicine Reminder", "Time to take Aspirin"));
        assert_ne!(first, push_tag("Medicine Reminder", "Time to take Ibuprofen"));
        assert!(first.starts_with(PUSH_TAG_PREFIX));
    }
}
