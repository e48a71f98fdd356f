use kouhyou_core::config::GapWindow;
use kouhyou_core::record::{GAP_FLAG_TRUE, TimelineEntry};
use tracing::info;

/// Recompute `crossed_data_gap` for every entry: `"true"` when the observed
/// interval spans `window`, empty otherwise. Returns the number flagged.
pub fn apply_gap_flags(timeline: &mut [TimelineEntry], window: &GapWindow) -> usize {
    let mut flagged = 0;
    for entry in timeline.iter_mut() {
        if window.crossed_by(entry) {
            entry.crossed_data_gap = GAP_FLAG_TRUE.to_string();
            flagged += 1;
        } else {
            entry.crossed_data_gap.clear();
        }
    }
    info!(
        flagged,
        total = timeline.len(),
        start = %window.start,
        end = %window.end,
        "applied data-gap flags"
    );
    flagged
}
