// Terminal output for `validate` and `gather`
use colored::Colorize;
use exporter_core::ScriptSpec;
use exporter_metrics::GatherError;

pub fn title(text: &str) {
    println!("{}", text.bold().cyan());
    println!("{}", "-".repeat(text.chars().count()).cyan());
}

pub fn verdict(ok: bool, text: &str) {
    if ok {
        println!("{} {}", "ok".green().bold(), text.green());
    } else {
        eprintln!("{} {}", "invalid".red().bold(), text.red());
    }
}

/// One indented block per configured script.
pub fn script_entry(position: usize, script: &ScriptSpec) {
    println!("\n  {}: {}", position, script.name().green());
    println!("    Command: {}", script.command().description());
    println!("    Timeout: {}", humantime::format_duration(script.timeout()));
    if script.raw_output() {
        println!("    Output: {}", "raw".yellow());
    }
}

/// Gather errors on stderr, prefixed with the script they belong to so
/// they stay readable next to the exposition text on stdout.
pub fn gather_errors(errors: &[GatherError]) {
    for error in errors {
        let origin = error.script().unwrap_or("merge");
        eprintln!("{} {}", format!("[{}]", origin).yellow().bold(), error);
    }
}

pub fn notice(text: &str) {
    eprintln!("{} {}", "note:".yellow().bold(), text);
}
