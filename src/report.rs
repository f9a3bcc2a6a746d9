//! Console rendering of a [`Report`].

use crate::driver::Report;
use colored::*;
use std::fmt::Write;
use std::time::Duration;

const WIDTH: usize = 50;

fn ms(duration: Duration) -> String {
    format!("{:.2}ms", duration.as_secs_f64() * 1000.0)
}

fn row(out: &mut String, label: &str, value: &str) {
    let pad = WIDTH.saturating_sub(label.len() + 2);
    let _ = writeln!(out, "│ {}{:>pad$} │", label, value, pad = pad);
}

fn rule(out: &mut String, left: char, right: char) {
    let _ = writeln!(out, "{}{}{}", left, "─".repeat(WIDTH), right);
}

/// Plain-text table of the final timings.
pub fn render(report: &Report) -> String {
    let mut out = String::new();
    rule(&mut out, '┌', '┐');
    row(&mut out, "PIPELINING BENCHMARK", "");
    rule(&mut out, '├', '┤');
    row(&mut out, "Unit batch size:", &report.unit.batch_size.to_string());
    row(&mut out, "With pipelining:", &ms(report.unit.pipelined.elapsed()));
    row(&mut out, "Without pipelining:", &ms(report.unit.unpipelined.elapsed()));
    rule(&mut out, '├', '┤');
    row(&mut out, "Sequential runs:", &report.sequential.samples.len().to_string());
    row(&mut out, "Sequential total:", &ms(report.sequential.wall));
    row(&mut out, "Sequential avg per run:", &ms(report.sequential.wall_per_run()));
    rule(&mut out, '├', '┤');
    row(&mut out, "Concurrent runs:", &report.concurrent.samples.len().to_string());
    row(&mut out, "Concurrent avg duration:", &ms(report.concurrent.mean));
    rule(&mut out, '└', '┘');
    out
}

/// Print the report to stdout.
pub fn print(report: &Report) {
    println!();
    println!("{}", "📈 FINAL RESULTS:".green().bold());
    print!("{}", render(report));

    let pipelined = report.unit.pipelined.elapsed().as_secs_f64();
    let unpipelined = report.unit.unpipelined.elapsed().as_secs_f64();
    if pipelined > 0.0 {
        println!(
            "{} {}",
            "Pipelining speedup:".dimmed(),
            format!("{:.1}x", unpipelined / pipelined).cyan()
        );
    }
}
