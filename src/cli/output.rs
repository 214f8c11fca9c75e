//! Handles all user-facing output for the CLI: diagnostics, progress events
//! and the colored macro expansion trace.

use difference::{Changeset, Difference};
use miette::{GraphicalReportHandler, Report};
use std::{io::Write, path::Path};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::{
    errors::{CompileError, Warning},
    macros::MacroExpansionStep,
    modules::CompileEvent,
};

// ============================================================================
// DIAGNOSTICS
// ============================================================================

pub fn print_error(error: CompileError) {
    let report = Report::new(error);
    eprintln!("{report:?}");
}

pub fn print_warnings(warnings: &[Warning]) {
    let handler = GraphicalReportHandler::new();
    for warning in warnings {
        let mut rendered = String::new();
        if handler.render_report(&mut rendered, warning).is_err() {
            rendered = format!("warning: {warning}");
        }
        eprintln!("{rendered}");
    }
}

// ============================================================================
// PROGRESS
// ============================================================================

pub fn print_events(events: &[CompileEvent]) {
    let mut stderr = StandardStream::stderr(ColorChoice::Auto);
    for event in events {
        let color = match event {
            CompileEvent::Read { .. } => Color::Blue,
            CompileEvent::CacheHit { .. } => Color::Cyan,
            CompileEvent::Deferred { .. } => Color::Yellow,
            CompileEvent::Expanded { .. } => Color::Magenta,
            CompileEvent::Generated { .. } => Color::Green,
        };
        let _ = stderr.set_color(ColorSpec::new().set_fg(Some(color)).set_bold(true));
        let _ = write!(stderr, "  sprig ");
        let _ = stderr.reset();
        let _ = writeln!(stderr, "{event}");
    }
}

pub fn print_summary(modules: usize, out_dir: &Path) {
    let mut stdout = StandardStream::stdout(ColorChoice::Auto);
    let _ = stdout.set_color(ColorSpec::new().set_fg(Some(Color::Green)).set_bold(true));
    let _ = write!(stdout, "Compiled");
    let _ = stdout.reset();
    let _ = writeln!(stdout, " {modules} module(s) into {}", out_dir.display());
}

// ============================================================================
// MACRO TRACE
// ============================================================================

/// Prints a macro expansion trace with a word diff per step.
pub fn print_trace(trace: &[MacroExpansionStep]) {
    let mut stdout = StandardStream::stdout(ColorChoice::Auto);
    for (i, step) in trace.iter().enumerate() {
        let _ = stdout.set_color(ColorSpec::new().set_fg(Some(Color::Yellow)).set_bold(true));
        let _ = writeln!(stdout, "--- Step {}: {} ({}) ---", i, step.macro_name, step.provenance);
        let _ = stdout.reset();

        let before = step.input.to_string();
        let after = step.output.to_string();
        let changeset = Changeset::new(&before, &after, " ");
        print_diff(&mut stdout, &changeset.diffs);
        let _ = writeln!(stdout);
    }
}

fn print_diff(stdout: &mut StandardStream, diffs: &[Difference]) {
    for diff in diffs {
        let (color, text) = match diff {
            Difference::Same(x) => (None, x),
            Difference::Add(x) => (Some(Color::Green), x),
            Difference::Rem(x) => (Some(Color::Red), x),
        };
        match color {
            Some(color) => {
                let _ = stdout.set_color(ColorSpec::new().set_fg(Some(color)));
                let marker = if matches!(diff, Difference::Add(_)) { "+" } else { "-" };
                let _ = writeln!(stdout, "{marker} {text}");
            }
            None => {
                let _ = stdout.reset();
                let _ = writeln!(stdout, "  {text}");
            }
        }
    }
    let _ = stdout.reset();
}
