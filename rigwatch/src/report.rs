//! Plain-text rendering of device views for the terminal.

use std::fmt::Write as _;

use rigwatch::{DevicePeaks, DeviceView, TempBand, TempRange, TickOutcome, TickReport};

fn num(v: f64) -> String {
    // 72.0 -> "72", 41.46 -> "41.46"
    let s = format!("{v:.2}");
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}

fn opt(v: Option<f64>, unit: &str) -> String {
    v.map(|v| format!("{}{unit}", num(v)))
        .unwrap_or_else(|| "-".to_string())
}

fn temps(range: Option<TempRange>) -> String {
    match range {
        Some(r) => format!(
            "max {}°C ({}), min {}°C ({})",
            num(r.max),
            TempBand::classify(r.max).label(),
            num(r.min),
            TempBand::classify(r.min).label()
        ),
        None => "n/a".to_string(),
    }
}

pub fn peaks_line(peaks: &DevicePeaks) -> String {
    let mut line = format!(
        "cpu {} / {}  gpu {} / {}  ram {}",
        opt(peaks.cpu_temp, "°C"),
        opt(peaks.cpu_usage, "%"),
        opt(peaks.gpu_temp, "°C"),
        opt(peaks.gpu_usage, "%"),
        opt(peaks.ram_usage, "%"),
    );
    for d in &peaks.disks {
        let _ = write!(line, "  {} {}%", d.label(), num(d.value));
    }
    line
}

pub fn device_block(view: &DeviceView) -> String {
    let snap = &view.snapshot;
    let mut out = format!("{} ({})", snap.device_name, snap.device_id);
    if view.acknowledged {
        out.push_str("  [acknowledged]");
    } else if !view.warnings.is_empty() {
        let _ = write!(out, "  [{} warning(s)]", view.warnings.len());
    }
    let _ = write!(out, "\n  cpu temp: {}", temps(view.cpu_temps()));
    let _ = write!(out, "\n  gpu temp: {}", temps(view.gpu_temps()));
    let _ = write!(out, "\n  peaks:    {}", peaks_line(&view.peaks));
    for w in &view.warnings {
        let _ = write!(out, "\n  ! {w}");
    }
    out
}

pub fn table(views: &[DeviceView]) -> String {
    if views.is_empty() {
        return "no devices".to_string();
    }
    views
        .iter()
        .map(device_block)
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn tick_line(report: &TickReport, views: &[DeviceView]) -> String {
    let warned = views.iter().filter(|v| !v.warnings.is_empty()).count();
    let head = match report.outcome {
        TickOutcome::Sampled { tick } => format!(
            "tick {tick}: {}/{} devices sampled",
            report.ingested,
            views.len()
        ),
        TickOutcome::CycleClosed { updated } => format!(
            "cycle closed: peaks updated for {updated} device(s), {warned} with warnings"
        ),
    };
    match &report.error {
        Some(e) => format!("{head} (fetch failed: {e})"),
        None => head,
    }
}
