use anyhow::Result;
use colored::Colorize;
use raidbot_engine::{Decision, SessionOutcome, SessionStats};
use std::io::Write;

fn outcome_label(outcome: Option<SessionOutcome>) -> &'static str {
    match outcome {
        Some(SessionOutcome::Timeout) => "session budget reached",
        Some(SessionOutcome::CycleLimit) => "cycle limit reached",
        None => "not finished",
    }
}

pub fn generate_console_report(out: &mut dyn Write, stats: &SessionStats) -> Result<()> {
    writeln!(out)?;
    writeln!(
        out,
        "{}",
        format!("📊 Session Summary [{}]", stats.run_tag)
            .bright_cyan()
            .bold()
    )?;
    writeln!(out, "{}", "==============================".cyan())?;
    writeln!(out, "Stopped: {}", outcome_label(stats.outcome))?;
    writeln!(out, "Elapsed: {:?}", stats.elapsed)?;
    writeln!(out, "Cycles: {}", stats.cycles)?;
    writeln!(out, "Attacks: {}", stats.attacks.to_string().green())?;
    writeln!(out, "Skips: {}", stats.skips.to_string().yellow())?;
    writeln!(out, "Attack rate: {:.1}%", stats.attack_rate())?;
    if let Some(gold) = stats.best_gold() {
        writeln!(out, "Best gold: {gold}")?;
    }
    writeln!(out)?;

    writeln!(out, "{}", "⚠️  Degraded Cycles".bright_yellow().bold())?;
    writeln!(out, "{}", "==================".yellow())?;
    writeln!(out, "Zero readings: {}", stats.zero_readings)?;
    writeln!(out, "OCR retries: {}", stats.ocr_retries)?;
    writeln!(out, "Recoveries: {}", stats.recoveries)?;
    writeln!(out, "User interrupts: {}", stats.interrupts)?;
    writeln!(out, "Keep-alive taps: {}", stats.keepalive_taps)?;
    let failures = stats.transport_errors + stats.recognition_errors + stats.artifact_errors;
    let failures = if failures == 0 {
        failures.to_string().green()
    } else {
        failures.to_string().red()
    };
    writeln!(
        out,
        "Errors: {failures} (transport {}, OCR {}, artifacts {})",
        stats.transport_errors, stats.recognition_errors, stats.artifact_errors
    )?;
    Ok(())
}

pub fn generate_json_report(out: &mut dyn Write, stats: &SessionStats) -> Result<()> {
    let json_output = serde_json::to_string_pretty(stats)?;
    writeln!(out, "{json_output}")?;
    Ok(())
}

pub fn generate_markdown_report(out: &mut dyn Write, stats: &SessionStats) -> Result<()> {
    writeln!(out, "# Raidbot Session Report ({})\n", stats.run_tag)?;

    writeln!(out, "## Summary\n")?;
    writeln!(out, "- **Stopped**: {}", outcome_label(stats.outcome))?;
    writeln!(out, "- **Elapsed**: {:?}", stats.elapsed)?;
    writeln!(out, "- **Cycles**: {}", stats.cycles)?;
    writeln!(out, "- **Attacks**: {}", stats.attacks)?;
    writeln!(out, "- **Skips**: {}", stats.skips)?;
    writeln!(out, "- **Attack rate**: {:.1}%", stats.attack_rate())?;
    writeln!(out, "- **Zero readings**: {}", stats.zero_readings)?;
    writeln!(out, "- **Recoveries**: {}", stats.recoveries)?;
    writeln!(out, "- **User interrupts**: {}\n", stats.interrupts)?;

    writeln!(out, "## Decisions\n")?;
    if stats.decisions.is_empty() {
        writeln!(out, "_No bases judged._")?;
        return Ok(());
    }
    writeln!(out, "| Cycle | Gold | Elixir | Dark | Decision | Why |")?;
    writeln!(out, "|------:|-----:|-------:|-----:|----------|-----|")?;
    for record in &stats.decisions {
        let icon = match record.decision {
            Decision::Attack => "⚔️",
            Decision::Skip => "⏭️",
        };
        writeln!(
            out,
            "| {} | {} | {} | {} | {icon} {} | {} |",
            record.cycle,
            record.reading.gold,
            record.reading.elixir,
            record.reading.dark,
            record.decision,
            record.rationale
        )?;
    }
    Ok(())
}
