use crate::blockchain::{CandidateBlock, ChainReader};
use crate::config::GuardConfig;
use crate::error::{ChainError, Result};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{error, info};

use super::aggregate::{aggregate, PenaltyEntry, PenaltyMap};
use super::difficulty::multiplier;
use super::latch::SyncLatch;
use super::penalty::score;

/// Outcome of one evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    Accept,
    Reject { penalty: i64 },
}

impl Verdict {
    pub fn is_accept(&self) -> bool {
        matches!(self, Verdict::Accept)
    }

    pub fn penalty(&self) -> i64 {
        match self {
            Verdict::Accept => 0,
            Verdict::Reject { penalty } => *penalty,
        }
    }

    pub fn into_result(self) -> Result<()> {
        match self {
            Verdict::Accept => Ok(()),
            Verdict::Reject { penalty } => Err(ChainError::RejectedReorg { penalty }),
        }
    }
}

/// Everything one evaluation looked at and decided.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GuardReport {
    pub synced: bool,
    /// Guard enabled and tip past the activation height.
    pub active: bool,
    /// Per-block scoring actually ran.
    pub scored: bool,
    pub tip: u64,
    pub difficulty: u64,
    pub incoming_height: Option<u64>,
    pub segment_len: usize,
    pub entries: Vec<PenaltyEntry>,
    pub raw_penalty: i64,
    pub multiplier: u64,
    pub penalty: i64,
    pub verdict: Verdict,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GuardStats {
    pub evaluations: u64,
    pub rejections: u64,
    pub last_penalty: i64,
}

/// Reorg attack guard. One instance per local chain, shared by every
/// peer connection that delivers segments for it.
#[derive(Debug)]
pub struct ChainGuard {
    config: GuardConfig,
    latch: SyncLatch,
    stats: Mutex<GuardStats>,
}

impl ChainGuard {
    pub fn new(config: GuardConfig) -> Self {
        Self::with_sync_status(config, false)
    }

    /// Start with a known sync status, e.g. when the node was told it is at the network tip.
    pub fn with_sync_status(config: GuardConfig, synced: bool) -> Self {
        Self {
            config,
            latch: SyncLatch::with_status(synced),
            stats: Mutex::new(GuardStats::default()),
        }
    }

    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    pub fn is_synced(&self) -> bool {
        self.latch.is_synced()
    }

    pub fn stats(&self) -> GuardStats {
        *self.stats.lock()
    }

    pub fn evaluate<C, B>(&self, chain: &C, segment: &[B]) -> Verdict
    where
        C: ChainReader + ?Sized,
        B: CandidateBlock,
    {
        self.evaluate_detailed(chain, segment).verdict
    }

    /// Like [`evaluate`](Self::evaluate), with Reject mapped to [`ChainError::RejectedReorg`].
    pub fn check<C, B>(&self, chain: &C, segment: &[B]) -> Result<()>
    where
        C: ChainReader + ?Sized,
        B: CandidateBlock,
    {
        self.evaluate(chain, segment).into_result()
    }

    pub fn evaluate_detailed<C, B>(&self, chain: &C, segment: &[B]) -> GuardReport
    where
        C: ChainReader + ?Sized,
        B: CandidateBlock,
    {
        // Read once; every step below works off this snapshot.
        let tip = chain.current_tip();
        let multi = multiplier(tip.difficulty);

        let Some(first) = segment.first() else {
            let synced = self.latch.is_synced();
            info!(
                synced,
                number = tip.height,
                incoming_number = ?None::<u64>,
                penalty = 0i64,
                "checking legitimacy of the chain"
            );
            let report = GuardReport {
                synced,
                active: false,
                scored: false,
                tip: tip.height,
                difficulty: tip.difficulty,
                incoming_height: None,
                segment_len: 0,
                entries: Vec::new(),
                raw_penalty: 0,
                multiplier: multi,
                penalty: 0,
                verdict: Verdict::Accept,
            };
            self.record(&report);
            return report;
        };
        let incoming = first.height();

        let synced = self.latch.update(tip.height, incoming);
        let active = self.config.enabled && tip.height > self.config.activation_height;
        let scored = active && synced && segment.len() >= self.config.min_segment_length;

        let mut penalties = PenaltyMap::new();
        if scored {
            for block in segment {
                penalties.record(block.height(), score(tip.height, block.height()));
            }
        }

        let raw_penalty = aggregate(&penalties);
        let penalty = raw_penalty
            .saturating_mul(i64::try_from(multi).unwrap_or(i64::MAX))
            .max(0);

        info!(
            synced,
            number = tip.height,
            incoming_number = incoming,
            penalty,
            "checking legitimacy of the chain"
        );

        let verdict = if penalty > 0 {
            error!(penalty, "chain is malicious and will be rejected");
            Verdict::Reject { penalty }
        } else {
            Verdict::Accept
        };

        let report = GuardReport {
            synced,
            active,
            scored,
            tip: tip.height,
            difficulty: tip.difficulty,
            incoming_height: Some(incoming),
            segment_len: segment.len(),
            entries: penalties.ordered(),
            raw_penalty,
            multiplier: multi,
            penalty,
            verdict,
        };
        self.record(&report);
        report
    }

    fn record(&self, report: &GuardReport) {
        let mut stats = self.stats.lock();
        stats.evaluations += 1;
        stats.last_penalty = report.penalty;
        if !report.verdict.is_accept() {
            stats.rejections += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::ChainTip;
    use std::sync::Arc;
    use tracing::field::{Field, Visit};
    use tracing::{Event, Level, Subscriber};
    use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

    const TIP: ChainTip = ChainTip {
        height: 1000,
        difficulty: 100_000_000,
    };

    fn synced_guard() -> ChainGuard {
        ChainGuard::with_sync_status(
            GuardConfig {
                enabled: true,
                activation_height: 0,
                min_segment_length: 5,
            },
            true,
        )
    }

    #[test]
    fn test_deep_reorg_rejected() {
        let guard = synced_guard();
        let segment: Vec<u64> = (990..=994).collect();
        let report = guard.evaluate_detailed(&TIP, &segment);

        assert!(report.scored);
        assert_eq!(report.raw_penalty, 10 + 9 + 8 + 7 + 6);
        assert_eq!(report.multiplier, 5);
        assert_eq!(report.verdict, Verdict::Reject { penalty: 200 });
    }

    #[test]
    fn test_flat_reorg_at_ten_deep() {
        // Five copies of height 990 collapse to one entry.
        let guard = synced_guard();
        let segment = [990u64; 5];
        let report = guard.evaluate_detailed(&TIP, &segment);
        assert_eq!(report.entries, vec![PenaltyEntry { height: 990, value: 10 }]);
        assert_eq!(report.verdict, Verdict::Reject { penalty: 50 });
    }

    #[test]
    fn test_short_segment_skips_scoring() {
        let guard = synced_guard();
        let report = guard.evaluate_detailed(&TIP, &[999u64, 1000, 1001]);
        assert!(!report.scored);
        assert!(report.entries.is_empty());
        assert_eq!(report.verdict, Verdict::Accept);
    }

    #[test]
    fn test_forward_extension_clamped() {
        let guard = synced_guard();
        let segment: Vec<u64> = (1001..=1005).collect();
        let report = guard.evaluate_detailed(&TIP, &segment);
        assert_eq!(report.raw_penalty, -5);
        assert_eq!(report.penalty, 0);
        assert_eq!(report.verdict, Verdict::Accept);
    }

    #[test]
    fn test_inactive_below_activation_height() {
        let guard = ChainGuard::with_sync_status(
            GuardConfig {
                activation_height: 1000,
                ..GuardConfig::default()
            },
            true,
        );
        let segment: Vec<u64> = (900..=950).collect();
        let report = guard.evaluate_detailed(&TIP, &segment);
        assert!(!report.active);
        assert_eq!(report.verdict, Verdict::Accept);
    }

    #[test]
    fn test_disabled_guard_accepts_but_latches() {
        let guard = ChainGuard::new(GuardConfig {
            enabled: false,
            ..GuardConfig::default()
        });
        assert!(guard.evaluate(&TIP, &[1001u64]).is_accept());
        assert!(guard.is_synced());
        let segment: Vec<u64> = (900..=950).collect();
        assert!(guard.evaluate(&TIP, &segment).is_accept());
    }

    #[test]
    fn test_unsynced_guard_does_not_score() {
        let guard = ChainGuard::new(GuardConfig::default());
        let segment: Vec<u64> = (990..=994).collect();
        let report = guard.evaluate_detailed(&TIP, &segment);
        assert!(!report.synced);
        assert!(report.active);
        assert!(!report.scored);
        assert_eq!(report.verdict, Verdict::Accept);
    }

    type Captured = Arc<Mutex<Vec<(Level, Vec<&'static str>)>>>;

    /// Collects level and field names of every event.
    struct CaptureLayer(Captured);

    struct FieldNames(Vec<&'static str>);

    impl Visit for FieldNames {
        fn record_debug(&mut self, field: &Field, _value: &dyn std::fmt::Debug) {
            self.0.push(field.name());
        }
    }

    impl<S: Subscriber> Layer<S> for CaptureLayer {
        fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
            let mut names = FieldNames(Vec::new());
            event.record(&mut names);
            self.0.lock().push((*event.metadata().level(), names.0));
        }
    }

    fn capture_events(f: impl FnOnce()) -> Vec<(Level, Vec<&'static str>)> {
        let captured: Captured = Arc::new(Mutex::new(Vec::new()));
        let subscriber = tracing_subscriber::registry().with(CaptureLayer(Arc::clone(&captured)));
        tracing::subscriber::with_default(subscriber, f);
        let events = captured.lock().clone();
        events
    }

    #[test]
    fn test_every_call_emits_check_record() {
        let guard = synced_guard();
        let empty: [u64; 0] = [];
        let attack: Vec<u64> = (990..=994).collect();

        for events in [
            capture_events(|| {
                guard.evaluate(&TIP, &empty);
            }),
            capture_events(|| {
                guard.evaluate(&TIP, &attack);
            }),
        ] {
            let infos: Vec<_> = events.iter().filter(|(level, _)| *level == Level::INFO).collect();
            assert_eq!(infos.len(), 1);
            for field in ["synced", "number", "incoming_number", "penalty"] {
                assert!(infos[0].1.contains(&field), "missing field {}", field);
            }
        }

        let events = capture_events(|| {
            guard.evaluate(&TIP, &attack);
        });
        assert_eq!(events.iter().filter(|(level, _)| *level == Level::ERROR).count(), 1);
    }

    #[test]
    fn test_empty_segment_accepts() {
        let guard = synced_guard();
        let empty: [u64; 0] = [];
        let report = guard.evaluate_detailed(&TIP, &empty);
        assert_eq!(report.incoming_height, None);
        assert_eq!(report.verdict, Verdict::Accept);
        assert!(guard.check(&TIP, &empty).is_ok());
    }

    #[test]
    fn test_multiplier_follows_difficulty() {
        let guard = synced_guard();
        let hard = ChainTip {
            height: 1000,
            difficulty: 100_000_000_000,
        };
        let segment: Vec<u64> = (990..=994).collect();
        assert_eq!(guard.evaluate(&hard, &segment), Verdict::Reject { penalty: 40 });
    }

    #[test]
    fn test_check_maps_reject_to_error() {
        let guard = synced_guard();
        let segment: Vec<u64> = (990..=994).collect();
        assert_eq!(
            guard.check(&TIP, &segment),
            Err(ChainError::RejectedReorg { penalty: 200 })
        );
    }

    #[test]
    fn test_stats_counted() {
        let guard = synced_guard();
        let attack: Vec<u64> = (990..=994).collect();
        let extension: Vec<u64> = (1001..=1005).collect();
        guard.evaluate(&TIP, &attack);
        guard.evaluate(&TIP, &extension);
        let stats = guard.stats();
        assert_eq!(stats.evaluations, 2);
        assert_eq!(stats.rejections, 1);
        assert_eq!(stats.last_penalty, 0);
    }

    #[test]
    fn test_verdict_serializes_tagged() {
        let json = serde_json::to_string(&Verdict::Reject { penalty: 7 }).unwrap();
        assert_eq!(json, r#"{"verdict":"reject","penalty":7}"#);
        let json = serde_json::to_string(&Verdict::Accept).unwrap();
        assert_eq!(json, r#"{"verdict":"accept"}"#);
    }
}
