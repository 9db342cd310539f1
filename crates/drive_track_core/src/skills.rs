//! crates/drive_track_core/src/skills.rs
//!
//! The fixed driving-competency checklist and helpers over a profile's copy of it.

use crate::domain::Skill;
use serde::Serialize;

struct CatalogEntry {
    id: u32,
    title: &'static str,
    teaching_points: &'static [&'static str],
}

const CATALOG: &[CatalogEntry] = &[
    CatalogEntry { id: 1, title: "Pre-Drive Vehicle Check", teaching_points: &["Walk around the vehicle and check tires", "Look for fluid leaks under the car", "Confirm lights and signals work"] },
    CatalogEntry { id: 2, title: "Proper Seating & Mirror Adjustment", teaching_points: &["Adjust seat so wrists rest on top of the wheel", "Set mirrors to minimize blind spots", "Fasten seat belt before starting"] },
    CatalogEntry { id: 3, title: "Starting & Stopping the Engine", teaching_points: &["Foot on the brake before starting", "Check gauges after the engine starts", "Shift to park and set the parking brake before turning off"] },
    CatalogEntry { id: 4, title: "Checking Blind Spots", teaching_points: &["Glance over the shoulder before moving laterally", "Keep the glance brief", "Check again before every lane change"] },
    CatalogEntry { id: 5, title: "Backing Up Straight", teaching_points: &["Turn body to look through the rear window", "Use slow, controlled speed", "Keep one hand at the top of the wheel"] },
    CatalogEntry { id: 6, title: "Backing Up & Turning", teaching_points: &["Turn the wheel in the direction you want the rear to go", "Check both front corners while turning", "Stop if a pedestrian approaches"] },
    CatalogEntry { id: 7, title: "Parking on a Hill", teaching_points: &["Uphill with curb: wheels away from the curb", "Downhill: wheels toward the curb", "Always set the parking brake"] },
    CatalogEntry { id: 8, title: "Angle Parking", teaching_points: &["Signal and position wide of the space", "Turn when the mirror lines up with the line", "Center the car and straighten the wheels"] },
    CatalogEntry { id: 9, title: "Perpendicular Parking", teaching_points: &["Leave enough room from parked cars", "Turn sharply when the front bumper passes the line", "Check both sides while entering"] },
    CatalogEntry { id: 10, title: "Parallel Parking", teaching_points: &["Align with the car ahead of the space", "Reverse while turning toward the curb", "Finish within 18 inches of the curb"] },
    CatalogEntry { id: 11, title: "Pulling Away from a Curb", teaching_points: &["Signal before moving", "Check mirrors and blind spot", "Accelerate smoothly into traffic"] },
    CatalogEntry { id: 12, title: "Approaching Intersections", teaching_points: &["Scan left, center, right", "Cover the brake", "Obey right-of-way rules"] },
    CatalogEntry { id: 13, title: "Right Turns", teaching_points: &["Signal well ahead", "Stay close to the right edge", "Yield to pedestrians and cyclists"] },
    CatalogEntry { id: 14, title: "Left Turns", teaching_points: &["Keep wheels straight while waiting", "Yield to oncoming traffic", "Turn into the nearest lane"] },
    CatalogEntry { id: 15, title: "Driving Straight", teaching_points: &["Look far ahead down the road", "Keep the car centered in the lane", "Make small steering corrections"] },
    CatalogEntry { id: 16, title: "Lane Changes", teaching_points: &["Signal, mirror, blind spot", "Keep speed steady", "Move gradually into the new lane"] },
    CatalogEntry { id: 17, title: "Passing", teaching_points: &["Pass only where it is legal", "Ensure a clear gap ahead", "Return to the lane when the passed car is visible in the mirror"] },
    CatalogEntry { id: 18, title: "Being Passed", teaching_points: &["Stay in your lane", "Do not speed up", "Leave room for the passing car to merge"] },
    CatalogEntry { id: 19, title: "U-Turns", teaching_points: &["Check local rules", "Confirm clear visibility in both directions", "Turn from the leftmost lane"] },
    CatalogEntry { id: 20, title: "Following Distance", teaching_points: &["Keep at least three seconds behind", "Increase the gap in bad weather", "Pick a fixed point to count seconds"] },
    CatalogEntry { id: 21, title: "Speed Control", teaching_points: &["Watch posted limits", "Adjust for conditions", "Check the speedometer regularly"] },
    CatalogEntry { id: 22, title: "Curves", teaching_points: &["Slow down before entering the curve", "Look through the curve", "Accelerate gently on exit"] },
    CatalogEntry { id: 23, title: "Hills", teaching_points: &["Maintain speed uphill", "Use lower gears downhill", "Watch for hidden traffic at crests"] },
    CatalogEntry { id: 24, title: "Narrow Roads", teaching_points: &["Reduce speed", "Keep to the right", "Be ready to stop for oncoming traffic"] },
    CatalogEntry { id: 25, title: "Residential Areas", teaching_points: &["Watch for children and pets", "Expect cars backing out of driveways", "Keep speed low"] },
    CatalogEntry { id: 26, title: "Business/Shopping Areas", teaching_points: &["Watch for cars entering and leaving lots", "Expect sudden stops", "Look out for pedestrians"] },
    CatalogEntry { id: 27, title: "Arterial Streets", teaching_points: &["Choose the correct lane early", "Anticipate signal changes", "Keep pace with traffic"] },
    CatalogEntry { id: 28, title: "Freeways", teaching_points: &["Match freeway speed on the on-ramp", "Merge into a gap without stopping", "Signal early for exits"] },
    CatalogEntry { id: 29, title: "Night Driving", teaching_points: &["Use high beams only when no one is ahead", "Slow down to stay within headlight range", "Avoid looking into oncoming lights"] },
    CatalogEntry { id: 30, title: "Rain/Adverse Weather", teaching_points: &["Turn on headlights", "Double the following distance", "Avoid sudden braking or steering"] },
];

/// The full catalog with every skill marked incomplete. This is what a profile
/// is seeded with on its first visit.
pub fn catalog() -> Vec<Skill> {
    CATALOG
        .iter()
        .map(|entry| Skill {
            id: entry.id,
            title: entry.title.to_string(),
            teaching_points: entry.teaching_points.iter().map(|p| p.to_string()).collect(),
            completed: false,
        })
        .collect()
}

pub fn catalog_len() -> usize {
    CATALOG.len()
}

/// Flips the completion flag of one skill and returns its new value, or `None`
/// if no skill has that id.
pub fn toggle(skills: &mut [Skill], skill_id: u32) -> Option<bool> {
    let skill = skills.iter_mut().find(|s| s.id == skill_id)?;
    skill.completed = !skill.completed;
    Some(skill.completed)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkillProgress {
    pub completed: usize,
    pub total: usize,
    pub percentage: f64,
}

/// Progress is measured against the catalog size, not the length of the
/// stored list.
pub fn progress(skills: &[Skill]) -> SkillProgress {
    let completed = skills.iter().filter(|s| s.completed).count();
    let total = catalog_len();
    let percentage = if total > 0 {
        completed as f64 / total as f64 * 100.0
    } else {
        0.0
    };
    SkillProgress { completed, total, percentage }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn catalog_has_thirty_unique_incomplete_skills() {
        let skills = catalog();
        assert_eq!(skills.len(), 30);
        let ids: HashSet<_> = skills.iter().map(|s| s.id).collect();
        assert_eq!(ids.len(), 30);
        assert!(skills.iter().all(|s| !s.completed && !s.teaching_points.is_empty()));
    }

    #[test]
    fn toggle_flips_exactly_one_skill() {
        let mut skills = catalog();
        assert_eq!(toggle(&mut skills, 10), Some(true));
        assert_eq!(skills.iter().filter(|s| s.completed).count(), 1);
        assert_eq!(toggle(&mut skills, 10), Some(false));
        assert_eq!(toggle(&mut skills, 99), None);
    }

    #[test]
    fn progress_counts_completed() {
        let mut skills = catalog();
        for id in 1..=6 {
            toggle(&mut skills, id);
        }
        let p = progress(&skills);
        assert_eq!(p.completed, 6);
        assert_eq!(p.total, 30);
        assert!((p.percentage - 20.0).abs() < 1e-9);
    }
}
