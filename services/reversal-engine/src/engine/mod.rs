//! Phase engine
//!
//! Pure scoring core: condition results and raw sub-scores in, an immutable
//! `ReversalState` snapshot out. All I/O and state-holding lives in the hub;
//! this module never touches a clock, a socket, or a lock.

pub mod hub;

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::config::{ScoringCfg, StageCfg};
use crate::models::{
    ConditionGroup, ConditionResult, CycleZone, ReversalState, Stage, StageReason, SubScores,
};

/// Raw inputs for one engine pass.
///
/// `None` sub-scores mean the upstream source produced nothing this cycle;
/// they are substituted per-component from the last known good values.
#[derive(Debug, Clone)]
pub struct EngineInputs<'a> {
    pub conditions: &'a [ConditionResult],
    pub trend_raw: Option<f64>,
    pub cycle_base_raw: Option<f64>,
    pub cycle_user_raw: f64,
    pub narrative_raw: Option<f64>,
    /// Degradation already detected upstream (stale series, fetch failures)
    pub carried_reasons: Vec<String>,
    pub evaluated_at: DateTime<Utc>,
}

pub struct PhaseEngine {
    scoring: ScoringCfg,
    stages: StageCfg,
}

impl PhaseEngine {
    pub fn new(scoring: ScoringCfg, stages: StageCfg) -> Self {
        Self { scoring, stages }
    }

    /// Run one full scoring pass.
    ///
    /// Order is fixed: substitute missing components, clamp each component to
    /// its own maximum, sum, then apply the gate cap to the sum. The cap is a
    /// ceiling on the composite, never a scaling factor.
    pub fn evaluate(&self, inputs: EngineInputs, last_good: &SubScores) -> ReversalState {
        let mut reasons = inputs.carried_reasons;
        let mut degraded = !reasons.is_empty();

        let (trend_raw, trend_substituted) =
            resolve_component("trend", inputs.trend_raw, last_good.trend, &mut reasons);
        let (cycle_base_raw, cycle_substituted) = resolve_component(
            "cycle",
            inputs.cycle_base_raw,
            last_good.cycle_base,
            &mut reasons,
        );
        let (cycle_user_raw, user_substituted) = resolve_component(
            "cycle adjustment",
            Some(inputs.cycle_user_raw),
            last_good.cycle_user,
            &mut reasons,
        );
        let (narrative_raw, narrative_substituted) = resolve_component(
            "narrative",
            inputs.narrative_raw,
            last_good.narrative,
            &mut reasons,
        );
        degraded |=
            trend_substituted || cycle_substituted || user_substituted || narrative_substituted;

        let s = &self.scoring;
        let trend_component = trend_raw.clamp(0.0, s.trend_max);
        let cycle_base = cycle_base_raw.clamp(0.0, s.cycle_base_max);
        let cycle_user = cycle_user_raw.clamp(0.0, s.cycle_user_max);
        let cycle_component = (cycle_base + cycle_user).clamp(0.0, s.cycle_max);
        let narrative_component = narrative_raw.clamp(0.0, s.narrative_max);

        let raw_composite = trend_component + cycle_component + narrative_component;

        let gate_total = inputs
            .conditions
            .iter()
            .filter(|c| c.group == ConditionGroup::Gate)
            .count() as u32;
        let gates_passed = crate::conditions::gate_count(inputs.conditions);

        let phase_cap = self.phase_cap(gates_passed);
        let final_score = raw_composite.min(phase_cap as f64);
        let cap_binding = raw_composite > phase_cap as f64;

        let (stage, stage_reason) =
            self.classify(gates_passed, gate_total, final_score, cap_binding);
        let cycle_zone = self.cycle_zone(cycle_component);

        ReversalState {
            final_score,
            phase_cap,
            trend_score_raw: trend_raw,
            cycle_score_raw: cycle_base_raw + cycle_user_raw,
            cycle_base: cycle_base_raw,
            cycle_user: cycle_user_raw,
            narrative_score_raw: narrative_raw,
            trend_component,
            cycle_component,
            narrative_component,
            gates_passed,
            stage,
            stage_reason,
            cycle_zone,
            degraded,
            degraded_reasons: reasons,
            evaluated_at: inputs.evaluated_at,
        }
    }

    /// Gate count to composite ceiling via the configured bands.
    /// Counts beyond the last band saturate at its cap.
    fn phase_cap(&self, gates_passed: u32) -> u32 {
        for band in &self.scoring.cap_bands {
            if gates_passed <= band.max_gates {
                return band.cap;
            }
        }
        self.scoring.cap_bands.last().map(|b| b.cap).unwrap_or(100)
    }

    /// Ordered, mutually exclusive stage predicates. The first match wins
    /// and there is no fallthrough past `Baseline`.
    fn classify(
        &self,
        gates_passed: u32,
        gate_total: u32,
        final_score: f64,
        cap_binding: bool,
    ) -> (Stage, StageReason) {
        let st = &self.stages;

        if gate_total > 0 && gates_passed == gate_total && final_score >= st.confirmed_min_score {
            return (Stage::Confirmed, StageReason::ScoreThreshold);
        }

        // Overheated means the composite is pinned at the lowest cap band:
        // the sum wants to run but almost no structural gate is open.
        let low_band_gates = self.scoring.cap_bands.first().map(|b| b.max_gates).unwrap_or(0);
        if cap_binding && gates_passed <= low_band_gates {
            return (Stage::Overheated, StageReason::ScoreThreshold);
        }

        // Each stage checks its gate-count guarantee before its bare score
        // threshold. When a snapshot satisfies both, the guarantee is the
        // recorded reason; that priority is a deliberate tie-break.
        if gates_passed >= st.prepare_guarantee_gates && final_score >= st.prepare_guarantee_score {
            return (Stage::Prepare, StageReason::ZoneGuarantee);
        }
        if final_score >= st.prepare_min_score {
            return (Stage::Prepare, StageReason::ScoreThreshold);
        }

        if gates_passed >= st.watch_guarantee_gates && final_score >= st.watch_guarantee_score {
            return (Stage::Watch, StageReason::ZoneGuarantee);
        }
        if final_score >= st.watch_min_score {
            return (Stage::Watch, StageReason::ScoreThreshold);
        }

        (Stage::Baseline, StageReason::ScoreThreshold)
    }

    /// Band the clamped cycle component into a coarse zone label
    fn cycle_zone(&self, cycle_component: f64) -> CycleZone {
        let max = self.scoring.cycle_max;
        let fraction = if max > 0.0 { cycle_component / max } else { 0.0 };
        if fraction < 0.2 {
            CycleZone::Capitulation
        } else if fraction < 0.5 {
            CycleZone::Accumulation
        } else if fraction < 0.8 {
            CycleZone::Recovery
        } else {
            CycleZone::Expansion
        }
    }
}

fn resolve_component(
    label: &str,
    raw: Option<f64>,
    fallback: f64,
    reasons: &mut Vec<String>,
) -> (f64, bool) {
    match raw {
        Some(value) if value.is_finite() => (value, false),
        Some(value) => {
            warn!(
                component = label,
                value, "Non-finite sub-score, substituting last known good"
            );
            reasons.push(format!(
                "{} sub-score was non-finite, using last known good",
                label
            ));
            (fallback, true)
        }
        None => {
            reasons.push(format!(
                "{} sub-score unavailable, using last known good",
                label
            ));
            (fallback, true)
        }
    }
}
