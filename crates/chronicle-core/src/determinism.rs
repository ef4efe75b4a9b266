//! Determinism advisory: per-dimension analyses behind the `advisory`
//! command.
//!
//! Unlike the reconstructor's single 0-100 score, these analyses look at
//! one dimension at a time and attach a risk verdict plus a
//! recommendation. They are advisory only; nothing here affects the
//! chain or the reconstruction report.

use serde::{Deserialize, Serialize};

use crate::payload::{CodePayload, ConfigPayload, EnvironmentPayload};

/// Risk verdict attached to an analysis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    /// Dimension captured with high confidence.
    Low,
    /// Partially captured; replay may diverge.
    Medium,
    /// Poorly captured; replay not advisable.
    #[default]
    High,
}

/// Outcome of analyzing one state dimension (or the summary of all).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeterminismAnalysis {
    /// 0-100 confidence score for this dimension.
    pub score: f64,
    /// Hard problems that block deterministic replay.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub violations: Vec<String>,
    /// Soft problems worth knowing about.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    /// Risk verdict derived from the score.
    pub risk_level: RiskLevel,
    /// Human-readable advice.
    pub recommendation: String,
    /// Whether replay is advisable at all.
    pub can_replay: bool,
    /// External dependencies detected, when any.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub external_deps: Vec<String>,
}

impl DeterminismAnalysis {
    fn full() -> Self {
        Self {
            score: 100.0,
            can_replay: true,
            ..Self::default()
        }
    }

    /// Pretty-prints the analysis as JSON.
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

/// Analyzes the environment dimension.
#[must_use]
pub fn analyze_environment(env: Option<&EnvironmentPayload>) -> DeterminismAnalysis {
    let mut analysis = DeterminismAnalysis::full();

    let Some(env) = env else {
        analysis.score = 0.0;
        analysis
            .violations
            .push("no environment snapshot".to_string());
        analysis.can_replay = false;
        analysis.risk_level = RiskLevel::High;
        analysis.recommendation =
            "Environment unknown; reconstruction will likely fail".to_string();
        return analysis;
    };

    if env.time_source != "system" && env.time_source != "virtualized" && env.time_source != "fixed"
    {
        analysis
            .warnings
            .push(format!("unknown time source: {}", env.time_source));
        analysis.score -= 10.0;
    }

    if env.runtime.contains("nondeterministic") {
        analysis
            .violations
            .push("runtime flagged as nondeterministic".to_string());
        analysis.can_replay = false;
        analysis.score -= 30.0;
    }

    if analysis.score >= 80.0 {
        analysis.risk_level = RiskLevel::Low;
        analysis.recommendation =
            "Environment state captured with high confidence; replay advisable".to_string();
    } else if analysis.score >= 50.0 {
        analysis.risk_level = RiskLevel::Medium;
        analysis.recommendation =
            "Environment partially captured; some nondeterminism likely".to_string();
    } else {
        analysis.risk_level = RiskLevel::High;
        analysis.can_replay = false;
        analysis.recommendation =
            "Environment poorly captured; replay not recommended".to_string();
    }

    analysis
}

/// Analyzes the code dimension.
#[must_use]
pub fn analyze_code(code: Option<&CodePayload>) -> DeterminismAnalysis {
    let mut analysis = DeterminismAnalysis::full();

    let Some(code) = code else {
        analysis.score = 0.0;
        analysis.violations.push("no code snapshot".to_string());
        analysis.can_replay = false;
        analysis.risk_level = RiskLevel::High;
        analysis.recommendation =
            "Code version unknown; replay will use whatever is deployed".to_string();
        return analysis;
    };

    if code.commit.is_empty() {
        analysis.violations.push("commit hash missing".to_string());
        analysis.can_replay = false;
        analysis.score -= 40.0;
    }

    if analysis.score >= 80.0 {
        analysis.risk_level = RiskLevel::Low;
        analysis.recommendation =
            "Code version pinned; deterministic replay possible".to_string();
    } else {
        analysis.risk_level = RiskLevel::High;
        analysis.can_replay = false;
        analysis.recommendation =
            "Code version not fully captured; replay will be nondeterministic".to_string();
    }

    analysis
}

/// Analyzes the configuration dimension.
#[must_use]
pub fn analyze_config(config: Option<&ConfigPayload>) -> DeterminismAnalysis {
    let mut analysis = DeterminismAnalysis::full();

    let Some(config) = config else {
        analysis.score = 0.0;
        analysis.violations.push("no config snapshot".to_string());
        analysis.can_replay = false;
        analysis.risk_level = RiskLevel::High;
        analysis.recommendation =
            "Configuration not captured; replay will use live config".to_string();
        return analysis;
    };

    if config.hash.is_empty() {
        analysis
            .warnings
            .push("config hash missing (integrity cannot be verified)".to_string());
        analysis.score -= 10.0;
    }

    if config.snapshot.is_empty() {
        analysis
            .violations
            .push("config snapshot empty".to_string());
        analysis.can_replay = false;
        analysis.score -= 50.0;
    }

    if analysis.score >= 80.0 {
        analysis.risk_level = RiskLevel::Low;
        analysis.recommendation =
            "Configuration captured with integrity; replay will use recorded config".to_string();
    } else if analysis.score >= 50.0 {
        analysis.risk_level = RiskLevel::Medium;
        analysis.recommendation =
            "Configuration partially captured; some replay errors likely".to_string();
    } else {
        analysis.risk_level = RiskLevel::High;
        analysis.can_replay = false;
        analysis.recommendation =
            "Configuration not usable; replay will be nondeterministic".to_string();
    }

    analysis
}

/// Combines the three per-dimension analyses into one verdict.
#[must_use]
pub fn summarize(
    env: &DeterminismAnalysis,
    code: &DeterminismAnalysis,
    config: &DeterminismAnalysis,
) -> DeterminismAnalysis {
    let mut summary = DeterminismAnalysis {
        score: (env.score + code.score + config.score) / 3.0,
        ..DeterminismAnalysis::default()
    };

    for analysis in [env, code, config] {
        summary.violations.extend(analysis.violations.iter().cloned());
        summary.warnings.extend(analysis.warnings.iter().cloned());
    }

    summary.can_replay = env.can_replay && code.can_replay && config.can_replay;

    if summary.score >= 80.0 {
        summary.risk_level = RiskLevel::Low;
        summary.recommendation =
            "All three dimensions well-captured; deterministic replay is highly likely"
                .to_string();
    } else if summary.score >= 50.0 {
        summary.risk_level = RiskLevel::Medium;
        summary.recommendation =
            "Partial capture across dimensions; replay possible but with caveats".to_string();
    } else {
        summary.risk_level = RiskLevel::High;
        summary.recommendation =
            "Insufficient capture; treat reconstruction as forensic only, not authoritative"
                .to_string();
    }

    summary
}
