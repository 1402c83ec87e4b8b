use colored::Colorize;

use crate::scenario::{RunReport, Scenario};

fn verdict(ok: bool) -> colored::ColoredString {
    if ok {
        "ok".green()
    } else {
        "FAILED".red().bold()
    }
}

pub fn render_pretty(report: &RunReport) -> String {
    let title = match report.scenario {
        Scenario::Spsc => "SPSC circular queue",
        Scenario::Mpmc => "MPMC circular queue",
    };
    let mut out = String::new();
    out.push_str(&format!(
        "{}  capacity={} producers={} consumers={}\n",
        title.bold(),
        report.capacity,
        report.producers,
        report.consumers
    ));
    out.push_str(&format!(
        "  items         : {} sent / {} received\n",
        report.items_sent, report.items_received
    ));
    out.push_str(&format!(
        "  elapsed       : {:.2} ms ({:.0} items/s)\n",
        report.elapsed_ms, report.throughput_per_sec
    ));
    if let Some(fifo) = report.fifo_ok {
        out.push_str(&format!("  fifo          : {}\n", verdict(fifo)));
    }
    if let Some(order) = report.producer_order_ok {
        out.push_str(&format!("  producer order: {}\n", verdict(order)));
    }
    out.push_str(&format!(
        "  exactly once  : {}\n",
        verdict(report.exactly_once_ok)
    ));
    if report.timed_out {
        out.push_str(&format!("  {}\n", "deadline expired".red()));
    }
    let status = if report.passed() {
        "PASS".green().bold()
    } else {
        "FAIL".red().bold()
    };
    out.push_str(&format!("{}\n", status));
    out
}
