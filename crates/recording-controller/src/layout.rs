//! Mix layout engine.
//!
//! Pure layout state: maps the ordered sequence of active participants
//! (insertion order = join order) to rectangular regions on a fixed 640x480
//! canvas. Geometry is recomputed when a participant joins; when a
//! participant leaves only its region is removed and the survivors keep their
//! prior geometry. That asymmetry is a preserved behavioral property of the
//! system, not an oversight.
//!
//! The engine is deterministic in (current regions, joining/leaving
//! participant) alone, so a layout is always re-derivable from its region
//! list.

use serde::{Deserialize, Serialize};

/// Fixed canvas width in pixels.
pub const CANVAS_WIDTH: u32 = 640;

/// Fixed canvas height in pixels.
pub const CANVAS_HEIGHT: u32 = 480;

/// Canvas background color.
pub const BACKGROUND_COLOR: &str = "#00ff00";

/// Compositing order, constant for all regions.
const REGION_Z_ORDER: u32 = 1;

/// Opacity, constant for all regions.
const REGION_ALPHA: f32 = 1.0;

const HALF_WIDTH: u32 = CANVAS_WIDTH / 2;
const HALF_HEIGHT: u32 = CANVAS_HEIGHT / 2;

/// Remote participant identifier within a channel.
pub type ParticipantId = u32;

/// One participant's placement within the mix canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Region {
    /// The remote participant this region displays.
    #[serde(rename = "uid")]
    pub participant_id: ParticipantId,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub z_order: u32,
    pub alpha: f32,
}

impl Region {
    /// A region covering the whole canvas.
    fn full_canvas(participant_id: ParticipantId) -> Self {
        Self {
            participant_id,
            x: 0,
            y: 0,
            width: CANVAS_WIDTH,
            height: CANVAS_HEIGHT,
            z_order: REGION_Z_ORDER,
            alpha: REGION_ALPHA,
        }
    }

    fn set_geometry(&mut self, x: u32, y: u32, width: u32, height: u32) {
        self.x = x;
        self.y = y;
        self.width = width;
        self.height = height;
    }
}

/// Full description of how participant streams are composited into one canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MixLayout {
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub background_color: String,
    /// Ordered by join time.
    pub regions: Vec<Region>,
}

impl Default for MixLayout {
    fn default() -> Self {
        Self::new()
    }
}

impl MixLayout {
    /// An empty layout on the fixed canvas.
    #[must_use]
    pub fn new() -> Self {
        Self {
            canvas_width: CANVAS_WIDTH,
            canvas_height: CANVAS_HEIGHT,
            background_color: BACKGROUND_COLOR.to_string(),
            regions: Vec::new(),
        }
    }

    /// Whether a region exists for the given participant.
    #[must_use]
    pub fn contains(&self, participant_id: ParticipantId) -> bool {
        self.regions
            .iter()
            .any(|r| r.participant_id == participant_id)
    }

    /// Append a region for a newly joined participant, rearranging existing
    /// regions per the canvas-filling policy.
    ///
    /// The policy is keyed off the region count before the append:
    ///
    /// | before | result |
    /// |--------|--------|
    /// | 0      | new region fills the canvas |
    /// | 1      | side-by-side halves |
    /// | 2      | two quadrants on top, new region bottom-left |
    /// | 3      | new region bottom-right, others untouched |
    /// | >=4    | new region appended at full canvas |
    ///
    /// The >=4 case produces overlapping regions. That matches the observed
    /// behavior of the system this replaces and is kept as-is pending product
    /// clarification; callers must not rely on it being sensible.
    ///
    /// Joins are unconditional appends: a participant that already has a
    /// region gets a second one. Callers that care should check
    /// [`MixLayout::contains`] first.
    pub fn apply_join(&mut self, participant_id: ParticipantId) {
        let mut region = Region::full_canvas(participant_id);
        match self.regions.len() {
            0 => {}
            1 => {
                if let Some(first) = self.regions.first_mut() {
                    first.set_geometry(0, 0, HALF_WIDTH, CANVAS_HEIGHT);
                }
                region.set_geometry(HALF_WIDTH, 0, HALF_WIDTH, CANVAS_HEIGHT);
            }
            2 => {
                let mut existing = self.regions.iter_mut();
                if let Some(first) = existing.next() {
                    first.set_geometry(0, 0, HALF_WIDTH, HALF_HEIGHT);
                }
                if let Some(second) = existing.next() {
                    second.set_geometry(HALF_WIDTH, 0, HALF_WIDTH, HALF_HEIGHT);
                }
                region.set_geometry(0, HALF_HEIGHT, HALF_WIDTH, HALF_HEIGHT);
            }
            3 => {
                region.set_geometry(HALF_WIDTH, HALF_HEIGHT, HALF_WIDTH, HALF_HEIGHT);
            }
            // 5th and later participants keep the full-canvas default.
            _ => {}
        }
        self.regions.push(region);
    }

    /// Remove the region for a leaving participant.
    ///
    /// Remaining regions are not rearranged. Returns whether a region was
    /// actually removed.
    pub fn apply_leave(&mut self, participant_id: ParticipantId) -> bool {
        let before = self.regions.len();
        self.regions.retain(|r| r.participant_id != participant_id);
        self.regions.len() != before
    }
}
