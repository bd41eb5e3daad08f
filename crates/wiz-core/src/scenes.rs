//! WiZ scene catalogue
//!
//! Scene identifiers are fixed by the bulb firmware. `1000` is the Rhythm
//! schedule, reported by the bulb through `schdPsetId` rather than `sceneId`.

/// Scene id the bulb reports while following a Rhythm schedule
pub const RHYTHM_SCENE_ID: u32 = 1000;

/// Every scene a WiZ bulb accepts, by id
pub const SCENES: &[(u32, &str)] = &[
    (1, "Ocean"),
    (2, "Romance"),
    (3, "Sunset"),
    (4, "Party"),
    (5, "Fireplace"),
    (6, "Cozy"),
    (7, "Forest"),
    (8, "Pastel Colors"),
    (9, "Wake up"),
    (10, "Bedtime"),
    (11, "Warm White"),
    (12, "Daylight"),
    (13, "Cool white"),
    (14, "Night light"),
    (15, "Focus"),
    (16, "Relax"),
    (17, "True colors"),
    (18, "TV time"),
    (19, "Plantgrowth"),
    (20, "Spring"),
    (21, "Summer"),
    (22, "Fall"),
    (23, "Deepdive"),
    (24, "Jungle"),
    (25, "Mojito"),
    (26, "Club"),
    (27, "Christmas"),
    (28, "Halloween"),
    (29, "Candlelight"),
    (30, "Golden white"),
    (31, "Pulse"),
    (32, "Steampunk"),
    (RHYTHM_SCENE_ID, "Rhythm"),
];

/// Look up a scene name
pub fn scene_name(scene_id: u32) -> Option<&'static str> {
    SCENES
        .iter()
        .find(|(id, _)| *id == scene_id)
        .map(|(_, name)| *name)
}

/// Whether a bulb can be switched to this scene
///
/// Rhythm is reported by bulbs but cannot be selected with a scene command.
pub fn is_selectable(scene_id: u32) -> bool {
    scene_id != RHYTHM_SCENE_ID && scene_name(scene_id).is_some()
}
