//! Copy resolver
//!
//! Maps a snapshot to user-facing display copy. Total over every reachable
//! state: the match is exhaustive with no wildcard arm, so adding a stage
//! without copy fails to compile instead of failing at runtime.

use crate::models::{ReversalState, Stage, StageCopy};

const DEGRADED_SUFFIX: &str =
    " Some inputs were unavailable this cycle; treat this reading as provisional.";

/// Resolve display copy for a snapshot. Pure and deterministic: the same
/// state always produces the same copy.
pub fn resolve(state: &ReversalState) -> StageCopy {
    let template = template_for(state.stage);

    let mut one_liner = template.one_liner.to_string();
    if state.degraded {
        one_liner.push_str(DEGRADED_SUFFIX);
    }

    StageCopy {
        title: template.title,
        display_stage: state.stage.display_name(),
        tags: template.tags.to_vec(),
        one_liner,
        next: template.next.to_vec(),
    }
}

struct StageTemplate {
    title: &'static str,
    one_liner: &'static str,
    tags: &'static [&'static str],
    next: &'static [&'static str],
}

fn template_for(stage: Stage) -> StageTemplate {
    match stage {
        Stage::Baseline => StageTemplate {
            title: "No reversal signal",
            one_liner: "Structure and sentiment are both quiet; nothing here argues for a bottom.",
            tags: &["neutral", "low-signal"],
            next: &[
                "Wait for the first structural gate to open",
                "Re-check after the next evaluation cycle",
            ],
        },
        Stage::Watch => StageTemplate {
            title: "Early reversal interest",
            one_liner: "A few conditions are turning but the structure is far from complete.",
            tags: &["early", "watchlist"],
            next: &[
                "Track the gate count cycle over cycle",
                "Watch for the long moving average reclaim",
                "No positioning implied yet",
            ],
        },
        Stage::Prepare => StageTemplate {
            title: "Reversal structure building",
            one_liner: "Most structural gates are open and the composite is firming; this is the positioning window.",
            tags: &["constructive", "positioning-window"],
            next: &[
                "Review which gate is still closed",
                "Size entries for a failed-reversal scenario",
                "Watch the narrative score for confirmation",
            ],
        },
        Stage::Confirmed => StageTemplate {
            title: "Reversal confirmed",
            one_liner: "Every structural gate is open with a strong composite; the bear-to-bull case is as complete as this index gets.",
            tags: &["confirmed", "risk-on"],
            next: &[
                "Expect chop; confirmation is not a straight line",
                "Track whether the gates stay open on pullbacks",
            ],
        },
        Stage::Overheated => StageTemplate {
            title: "Enthusiasm without structure",
            one_liner: "Sentiment and cycle scores want to run but the structural gates have not opened; the composite is pinned at its cap.",
            tags: &["caution", "cap-bound"],
            next: &[
                "Treat the capped score as a warning, not a signal",
                "Wait for structural gates before acting on sentiment",
            ],
        },
    }
}
