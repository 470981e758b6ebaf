//! Confidence calibration: vendor-native signals to a canonical 0–1 score.

use std::collections::HashMap;

use leadcascade_shared::{
    CalibrationConfig, NativeConfidence, ProviderConfig, ProviderKind, ProviderOutcome,
};

/// Mapping from one provider's native confidence to the canonical scale.
#[derive(Debug, Clone, PartialEq)]
pub struct Calibration {
    /// Divisor for numeric scores (100 for percentages, 10 for 1–10 scales).
    pub probability_scale: f64,
    /// Canonical score per lowercase label. Unknown labels score 0.
    pub labels: HashMap<String, f64>,
    /// Canonical score for a bare "found".
    pub found: f64,
    /// Trust multiplier applied last.
    pub weight: f64,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            probability_scale: 100.0,
            labels: HashMap::new(),
            found: 0.5,
            weight: 1.0,
        }
    }
}

impl Calibration {
    /// Built-in table for a vendor dialect.
    pub fn for_kind(kind: ProviderKind) -> Self {
        match kind {
            ProviderKind::Hunter => Self::default(),
            ProviderKind::PeopleDataLabs => Self {
                probability_scale: 10.0,
                ..Self::default()
            },
            ProviderKind::Apollo => Self {
                labels: [
                    ("verified", 0.95),
                    ("likely_to_engage", 0.85),
                    ("guessed", 0.6),
                    ("extrapolated", 0.55),
                    ("unavailable", 0.0),
                    ("bounced", 0.0),
                ]
                .into_iter()
                .map(|(label, score)| (label.to_string(), score))
                .collect(),
                ..Self::default()
            },
            ProviderKind::Lusha => Self {
                found: 0.75,
                ..Self::default()
            },
        }
    }

    /// Layer configured overrides on top of this table.
    pub fn with_overrides(mut self, overrides: &CalibrationConfig) -> Self {
        if let Some(scale) = overrides.probability_scale.filter(|s| *s > 0.0) {
            self.probability_scale = scale;
        }
        for (label, score) in &overrides.labels {
            self.labels.insert(label.to_lowercase(), *score);
        }
        if let Some(found) = overrides.found {
            self.found = found;
        }
        if let Some(weight) = overrides.weight {
            self.weight = weight;
        }
        self
    }

    /// Canonical score for a native signal, clamped to [0, 1].
    pub fn score(&self, native: &NativeConfidence) -> f64 {
        let raw = match native {
            NativeConfidence::Probability(p) => p / self.probability_scale,
            NativeConfidence::Label(label) => self
                .labels
                .get(&label.to_lowercase())
                .copied()
                .unwrap_or(0.0),
            NativeConfidence::Found(true) => self.found,
            NativeConfidence::Found(false) | NativeConfidence::Absent => 0.0,
        };
        let weighted = raw * self.weight;
        if weighted.is_nan() { 0.0 } else { weighted.clamp(0.0, 1.0) }
    }
}

/// Per-provider calibration tables.
#[derive(Debug, Clone, Default)]
pub struct ConfidenceScorer {
    tables: HashMap<String, Calibration>,
}

impl ConfidenceScorer {
    pub fn from_providers(providers: &[ProviderConfig]) -> Self {
        let tables = providers
            .iter()
            .map(|p| {
                let base = Calibration::for_kind(p.kind);
                let table = match &p.calibration {
                    Some(overrides) => base.with_overrides(overrides),
                    None => base,
                };
                (p.name.clone(), table)
            })
            .collect();
        Self { tables }
    }

    /// Register or replace the table for one provider.
    pub fn set(&mut self, provider: &str, calibration: Calibration) {
        self.tables.insert(provider.to_string(), calibration);
    }

    /// Canonical confidence of an outcome. Failed or empty outcomes score 0.
    pub fn score(&self, outcome: &ProviderOutcome) -> f64 {
        if !outcome.succeeded || !outcome.has_contact_data() {
            return 0.0;
        }
        match self.tables.get(&outcome.provider_name) {
            Some(table) => table.score(&outcome.native_confidence),
            None => Calibration::default().score(&outcome.native_confidence),
        }
    }
}

/// Index of the outcome to use: highest confidence among those carrying
/// data, earliest invoked on an exact tie.
pub fn select_best(outcomes: &[ProviderOutcome]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, outcome) in outcomes.iter().enumerate() {
        if !outcome.succeeded || !outcome.has_contact_data() {
            continue;
        }
        match best {
            Some(b) if outcomes[b].confidence >= outcome.confidence => {}
            _ => best = Some(i),
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use leadcascade_shared::{ProviderErrorKind, RateLimit};

    fn outcome(provider: &str, confidence: f64) -> ProviderOutcome {
        ProviderOutcome {
            confidence,
            ..ProviderOutcome::matched(
                provider,
                Some(format!("x@{provider}.io")),
                None,
                NativeConfidence::Absent,
            )
        }
    }

    #[test]
    fn default_tables_per_kind() {
        let hunter = Calibration::for_kind(ProviderKind::Hunter);
        assert_eq!(hunter.score(&NativeConfidence::Probability(85.0)), 0.85);

        let pdl = Calibration::for_kind(ProviderKind::PeopleDataLabs);
        assert_eq!(pdl.score(&NativeConfidence::Probability(9.0)), 0.9);

        let apollo = Calibration::for_kind(ProviderKind::Apollo);
        assert_eq!(apollo.score(&NativeConfidence::Label("Verified".into())), 0.95);
        assert_eq!(apollo.score(&NativeConfidence::Label("mystery".into())), 0.0);

        let lusha = Calibration::for_kind(ProviderKind::Lusha);
        assert_eq!(lusha.score(&NativeConfidence::Found(true)), 0.75);
        assert_eq!(lusha.score(&NativeConfidence::Found(false)), 0.0);
        assert_eq!(lusha.score(&NativeConfidence::Absent), 0.0);
    }

    #[test]
    fn scores_are_clamped() {
        let hunter = Calibration::for_kind(ProviderKind::Hunter);
        assert_eq!(hunter.score(&NativeConfidence::Probability(140.0)), 1.0);
        assert_eq!(hunter.score(&NativeConfidence::Probability(-3.0)), 0.0);
        assert_eq!(hunter.score(&NativeConfidence::Probability(f64::NAN)), 0.0);
    }

    #[test]
    fn overrides_layer_on_defaults() {
        let overrides = CalibrationConfig {
            labels: [("Guessed".to_string(), 0.7)].into_iter().collect(),
            weight: Some(0.5),
            ..Default::default()
        };
        let table = Calibration::for_kind(ProviderKind::Apollo).with_overrides(&overrides);
        assert_eq!(table.score(&NativeConfidence::Label("guessed".into())), 0.35);
        assert_eq!(table.score(&NativeConfidence::Label("verified".into())), 0.475);
    }

    #[test]
    fn failed_and_empty_outcomes_score_zero() {
        let mut config = ProviderConfig::new(
            "hunter",
            ProviderKind::Hunter,
            0.01,
            RateLimit {
                requests: 1,
                window_ms: 1000,
            },
        );
        config.calibration = None;
        let scorer = ConfidenceScorer::from_providers(&[config]);

        let empty = ProviderOutcome {
            native_confidence: NativeConfidence::Probability(99.0),
            ..ProviderOutcome::no_match("hunter")
        };
        assert_eq!(scorer.score(&empty), 0.0);

        let failed = ProviderOutcome::failed("hunter", ProviderErrorKind::Timeout, "slow");
        assert_eq!(scorer.score(&failed), 0.0);

        let hit = ProviderOutcome::matched(
            "hunter",
            Some("jane@acme.io".into()),
            None,
            NativeConfidence::Probability(72.0),
        );
        assert_eq!(scorer.score(&hit), 0.72);
    }

    #[test]
    fn selection_prefers_highest_then_earliest() {
        let outcomes = vec![outcome("a", 0.3), outcome("b", 0.85), outcome("c", 0.85)];
        assert_eq!(select_best(&outcomes), Some(1));

        let ties = vec![outcome("a", 0.5), outcome("b", 0.5)];
        assert_eq!(select_best(&ties), Some(0));

        let none = vec![
            ProviderOutcome::no_match("a"),
            ProviderOutcome::failed("b", ProviderErrorKind::Auth, "401"),
        ];
        assert_eq!(select_best(&none), None);
    }
}
