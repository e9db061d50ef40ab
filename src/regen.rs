//! Generate, validate, and regenerate the failing tail
//!
//! Each retry freezes everything before a measure boundary safely behind the
//! failure frontier and regenerates the rest with wider gaps and fewer
//! hazards.

use crate::error::Result;
use crate::generator::{GenerationContext, MapRequest, ResumeOptions, Tuning, generate};
use crate::settings::{GeneratorSettings, RetryPolicy};
use crate::validator::{ValidationFailure, ValidationOutcome, Validator};

/// Result of the retry loop
#[derive(Debug, Clone)]
pub struct GenerationReport {
    /// Last generated context; its `autoplay_log` is the validator's proof on success
    pub ctx: GenerationContext,
    pub outcome: ValidationOutcome,
    /// Attempts made, first one included
    pub attempts: u32,
}

impl GenerationReport {
    pub fn is_playable(&self) -> bool {
        self.outcome.is_success()
    }

    /// Diagnostic of the final failed attempt
    pub fn failure(&self) -> Option<&ValidationFailure> {
        match &self.outcome {
            ValidationOutcome::Failed(failure) => Some(failure),
            ValidationOutcome::Success(_) => None,
        }
    }
}

/// Resume time for a failed attempt: the measure boundary at or before the
/// reference time of `failure.x - backoff_px`
pub fn resume_time_for(
    failure: &ValidationFailure,
    ctx: &GenerationContext,
    request: &MapRequest,
    policy: &RetryPolicy,
) -> f64 {
    let t = ctx.time_at_x(failure.x - policy.backoff_px);
    request.measure_floor(t)
}

/// Tuning for a 0-based attempt
pub fn tuning_for(policy: &RetryPolicy, attempt: u32) -> Tuning {
    Tuning {
        attempt,
        safety_multiplier: policy.safety_multiplier(attempt),
        hazard_multiplier: policy.hazard_multiplier(attempt),
    }
}

/// Run generate and validate until the map is proven playable or the policy's
/// attempts run out.
///
/// `on_progress(attempt, fraction)` is called at every validator yield.
pub fn generate_playable(
    request: &MapRequest,
    settings: &GeneratorSettings,
    policy: &RetryPolicy,
    mut on_progress: impl FnMut(u32, f64),
) -> Result<GenerationReport> {
    request.validate()?;
    let max_attempts = policy.max_attempts.max(1);

    let mut resume: Option<ResumeOptions> = None;
    let mut attempt = 0;
    loop {
        let tuning = tuning_for(policy, attempt);
        let mut ctx = generate(request, settings, tuning, resume.as_ref());
        let outcome = Validator::new(&ctx, settings).run(|p| on_progress(attempt, p));
        attempt += 1;

        match outcome {
            ValidationOutcome::Success(log) => {
                log::info!("Map is playable after {} attempt(s)", attempt);
                ctx.autoplay_log = log.clone();
                return Ok(GenerationReport {
                    ctx,
                    outcome: ValidationOutcome::Success(log),
                    attempts: attempt,
                });
            }
            ValidationOutcome::Failed(failure) => {
                if attempt >= max_attempts {
                    log::warn!(
                        "Giving up after {} attempts; last failure at x={:.0}",
                        attempt,
                        failure.x
                    );
                    return Ok(GenerationReport {
                        ctx,
                        outcome: ValidationOutcome::Failed(failure),
                        attempts: attempt,
                    });
                }
                let time = resume_time_for(&failure, &ctx, request, policy);
                log::info!(
                    "Attempt {} failed at x={:.0} (near {:?}); regenerating from {:.2}s",
                    attempt,
                    failure.x,
                    failure.near_obstacles,
                    time
                );
                resume = if time > 0.0 {
                    Some(ResumeOptions::from_context(&ctx, time))
                } else {
                    None
                };
            }
        }
    }
}
