//! CLI output formatting

use crate::{
    cli::dry_run::DisplayRequest,
    core::StateSnapshot,
    execution::{PipelineEvent, SkipReason},
    tag::RefreshOutcome,
};
use console::Emoji;
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "!");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");

/// Format a controller state for display
pub fn format_state(state: &StateSnapshot) -> String {
    match state {
        StateSnapshot::Configurable { .. } => style(state.to_string()).dim().to_string(),
        StateSnapshot::Configured => style("CONFIGURED").blue().to_string(),
        StateSnapshot::RequestAds => style("REQUEST ADS").yellow().to_string(),
        StateSnapshot::Finished => style("FINISHED").green().to_string(),
        StateSnapshot::SpaFinished { href } => {
            format!("{} {}", style("SPA FINISHED").green(), style(href).dim())
        }
        StateSnapshot::Error { reason } => {
            format!("{} {}", style("ERROR").red(), style(reason).dim())
        }
    }
}

/// Format a pipeline event for display
pub fn format_pipeline_event(event: &PipelineEvent) -> String {
    match event {
        PipelineEvent::RunStarted {
            request_id,
            request_ads_calls,
            bucket,
            slots,
            ..
        } => {
            let bucket = bucket
                .as_deref()
                .map(|name| format!(", bucket {}", style(name).cyan()))
                .unwrap_or_default();
            format!(
                "{} Run #{} (cycle {}{}) with {} slot(s)",
                ROCKET,
                style(request_id).bold(),
                request_ads_calls,
                bucket,
                style(slots).cyan()
            )
        }
        PipelineEvent::PhaseStarted { phase, .. } => {
            format!("{} {}", SPINNER, style(phase).cyan())
        }
        PipelineEvent::StepCompleted { step, elapsed, .. } => format!(
            "  {} {} {}",
            CHECK,
            style(step).green(),
            style(format_duration(*elapsed)).dim()
        ),
        PipelineEvent::StepFailed {
            phase, step, error, ..
        } => format!(
            "  {} {} ({}): {}",
            CROSS,
            style(step).red(),
            phase,
            style(error).dim()
        ),
        PipelineEvent::RunSkipped { request_id, reason } => {
            let reason = match reason {
                SkipReason::NoSlots => "no slots",
                SkipReason::NoDefinedSlots => "no slots defined",
            };
            format!("{} Run #{} skipped: {}", WARN, request_id, style(reason).yellow())
        }
        PipelineEvent::RunCompleted {
            request_id, slots, ..
        } => format!(
            "{} Run #{} requested {}",
            CHECK,
            request_id,
            style(slots.join(", ")).bold()
        ),
        PipelineEvent::RunFailed { request_id, error } => {
            format!("{} Run #{} {}: {}", CROSS, request_id, style("failed").red(), error)
        }
    }
}

/// Format the result of a refresh call
pub fn format_refresh_outcome(target: &str, outcome: &RefreshOutcome) -> String {
    match outcome {
        RefreshOutcome::Queued(_) => format!(
            "{} {} queued for the next cycle",
            INFO,
            style(target).cyan()
        ),
        RefreshOutcome::Refreshed => format!("{} {} refreshed", CHECK, style(target).green()),
        RefreshOutcome::Skipped => format!(
            "{} {} {}",
            WARN,
            style(target).yellow(),
            style("nothing to refresh").dim()
        ),
        RefreshOutcome::Failed(error) => {
            format!("{} {}: {}", CROSS, style(target).red(), style(error).dim())
        }
    }
}

/// Format a recorded ad server request
pub fn format_display_request(request: &DisplayRequest) -> String {
    let mut lines = vec![format!(
        "{} Request #{} (cycle {}){}",
        INFO,
        style(request.request_id).bold(),
        request.request_ads_calls,
        request
            .bucket
            .as_deref()
            .map(|name| format!(" bucket {}", style(name).cyan()))
            .unwrap_or_default()
    )];
    for slot in &request.slots {
        let sizes: Vec<String> = slot.sizes.iter().map(|[w, h]| format!("{}x{}", w, h)).collect();
        lines.push(format!(
            "    {} {} [{}]",
            style(&slot.dom_id).bold(),
            style(&slot.ad_unit_path).dim(),
            sizes.join(", ")
        ));
    }
    lines.join("\n")
}

fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis < 1000 {
        format!("{}ms", millis)
    } else {
        format!("{:.1}s", duration.as_secs_f64())
    }
}
