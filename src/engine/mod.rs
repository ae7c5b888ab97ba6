// Encoding decision engine - independent of the CLI

pub mod core;
pub mod device_table;
pub mod error;
pub mod hardware;
pub mod probe;
pub mod process;
pub mod validate;

pub use self::core::*;
pub use error::{EngineError, ErrorCategory};
pub use hardware::{CapabilityCache, CapabilityProber, CapabilitySnapshot, ProbeSettings};
pub use probe::{SourceInspector, SourceProfile};
pub use validate::{SkipDecision, Validator, should_skip_as_optimal};

use serde::Serialize;
use std::time::Duration;
use tracing::{info, warn};

/// Final answer for one job.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
    Encode {
        command: CommandVector,
        encoder: EncoderChoice,
    },
    Skip {
        reason: String,
    },
    Refuse {
        category: ErrorCategory,
        message: String,
        remediation: Option<String>,
    },
}

impl Decision {
    fn refuse(err: &EngineError) -> Self {
        Self::Refuse {
            category: err.category(),
            message: err.to_string(),
            remediation: err.remediation().map(str::to_string),
        }
    }

    pub fn command(&self) -> Option<&CommandVector> {
        match self {
            Self::Encode { command, .. } => Some(command),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobOutcome {
    pub decision: Decision,
    /// Advisory decision log, oldest first
    pub log: Vec<String>,
    pub warnings: Vec<String>,
}

/// Planning facade: owns the prober, inspector, validator and snapshot cache.
pub struct Engine {
    settings: RawSettings,
    prober: CapabilityProber,
    inspector: SourceInspector,
    validator: Validator,
    cache: CapabilityCache,
}

impl Engine {
    pub fn new(settings: RawSettings, probe: ProbeSettings) -> Self {
        Self::with_prober(settings, CapabilityProber::new(probe))
    }

    /// Build around an existing prober (custom device table, tests)
    pub fn with_prober(settings: RawSettings, prober: CapabilityProber) -> Self {
        let probe = prober.settings().clone();
        let inspector = SourceInspector::new(probe.clone());
        Self {
            settings,
            validator: Validator::new(inspector.clone()),
            inspector,
            cache: CapabilityCache::new(Duration::from_secs(probe.capability_cache_secs)),
            prober,
        }
    }

    pub fn settings(&self) -> &RawSettings {
        &self.settings
    }

    pub fn inspector(&self) -> &SourceInspector {
        &self.inspector
    }

    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    /// Current capability snapshot, from the cache when still fresh.
    pub fn capabilities(&mut self) -> CapabilitySnapshot {
        self.cache.get_or_probe(&self.prober)
    }

    /// Validate, check optimality, resolve the policy and build the command.
    pub fn plan_job(&mut self, job: &JobRequest) -> JobOutcome {
        let snapshot = self.capabilities();
        self.plan_with_snapshot(job, &snapshot)
    }

    /// [`Engine::plan_job`] against a caller-supplied snapshot.
    pub fn plan_with_snapshot(&self, job: &JobRequest, snapshot: &CapabilitySnapshot) -> JobOutcome {
        let mut log = Vec::new();
        let mut warnings = Vec::new();
        let decision = match self.decide(job, snapshot, &mut log, &mut warnings) {
            Ok(decision) => decision,
            Err(e) => {
                warn!(input = %job.input.display(), category = %e.category(), error = %e, "job refused");
                log.push(format!("refused: {}", e));
                Decision::refuse(&e)
            }
        };
        JobOutcome {
            decision,
            log,
            warnings,
        }
    }

    fn decide(
        &self,
        job: &JobRequest,
        snapshot: &CapabilitySnapshot,
        log: &mut Vec<String>,
        warnings: &mut Vec<String>,
    ) -> Result<Decision, EngineError> {
        // Broken settings refuse before any file is touched
        let mut policy = resolve_policy(&self.settings)?;

        let source = self.validator.validate(&job.input)?;
        log.push(format!(
            "source: {} {}-bit {}x{} {:.1}s {} bps{}",
            source.codec.as_str(),
            source.bit_depth,
            source.width,
            source.height,
            source.duration_seconds,
            source.video_bitrate_bps,
            if source.is_hdr { " hdr" } else { "" }
        ));

        let skip = should_skip_as_optimal(&source, &policy);
        if skip.skip {
            info!(input = %job.input.display(), reason = %skip.reason, "job skipped");
            log.push(format!("skip: {}", skip.reason));
            return Ok(Decision::Skip {
                reason: skip.reason,
            });
        }
        log.push(skip.reason);

        policy.container = Some(job.container(policy.container.as_deref()));

        let selection = select_encoder(&policy, snapshot, &source)?;
        log.extend(selection.decisions);
        warnings.extend(validate::bitrate_warnings(&policy, &source));

        let command = build_job_command(
            &source,
            snapshot,
            &policy,
            &selection.choice,
            &job.input,
            &job.output,
        )?;
        info!(input = %job.input.display(), encoder = %selection.choice.name, "command built");

        Ok(Decision::Encode {
            command,
            encoder: selection.choice,
        })
    }

    /// Tracker seeded with the source duration (0 when unknown).
    pub fn progress_tracker(&self, source: &SourceProfile) -> ProgressTracker {
        ProgressTracker::new(source.duration_seconds)
    }
}
