use std::fmt::Write;

use super::{BlockMetrics, OverviewResult, Status};

pub const PLACEHOLDER: &str = "—";

pub fn fmt_money(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("US$ {:.4}", v),
        None => PLACEHOLDER.to_string(),
    }
}

/// Value already in percent: `12.5` → `12.50%`.
pub fn fmt_pct(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.2}%", v),
        None => PLACEHOLDER.to_string(),
    }
}

/// Fraction as percent: `0.3` → `30.00%`.
pub fn fmt_ratio_pct(ratio: f64) -> String {
    format!("{:.2}%", ratio * 100.0)
}

/// Period-grouped thousands, as the reports print them: `1.234.567`.
pub fn fmt_count(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push('.');
        }
        out.push(c);
    }
    out
}

fn status_label(status: Status) -> &'static str {
    match status {
        Status::Good => "good",
        Status::Below => "below",
        Status::Unknown => PLACEHOLDER,
    }
}

fn block_lines(out: &mut String, title: &str, block: Option<&BlockMetrics>) {
    let Some(b) = block else {
        let _ = writeln!(out, "  {title}: {PLACEHOLDER}");
        return;
    };
    let _ = writeln!(
        out,
        "  {title} [{}]: requests {} | clicks {} | CTR {} | match rate {} | CPC {}",
        b.label,
        fmt_count(b.requests),
        fmt_count(b.clicks),
        fmt_pct(b.ctr_pct),
        fmt_pct(b.match_rate_pct),
        fmt_money(b.cpc),
    );
    if let Some(imp) = b.impressions {
        let _ = writeln!(out, "    impressions {}", fmt_count(imp));
    }
}

/// Plain-text rendering for terminals and logs.
pub fn render(result: &OverviewResult) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "P1");
    let _ = writeln!(out, "  clicks (total): {}", fmt_count(result.p1.clicks_total));
    block_lines(&mut out, "interstitial/offerwall", result.p1.interstitial.as_ref());
    block_lines(&mut out, "mob_top", result.p1.mob_top.as_ref());

    let _ = writeln!(out, "P2");
    let _ = writeln!(out, "  clicks (total): {}", fmt_count(result.p2.clicks_total));
    block_lines(&mut out, "mob_top", result.p2.mob_top.as_ref());
    block_lines(&mut out, "rewarded", result.p2.rewarded.as_ref());

    let t = &result.target;
    let _ = writeln!(out, "Target CPC (P1)");
    let _ = writeln!(out, "  loss: {}", fmt_ratio_pct(t.loss));
    let _ = writeln!(out, "  target CPC: {}", fmt_money(Some(t.target_cpc)));
    let _ = writeln!(
        out,
        "  interstitial: {}  mob_top: {}",
        status_label(t.interstitial_status),
        status_label(t.mob_top_status)
    );

    match &result.corrected {
        Some(c) => {
            let _ = writeln!(out, "Corrected CPC (P2 {})", c.block);
            let user_loss = c.user_loss.map(|l| fmt_count(l.round() as u64));
            let _ = writeln!(
                out,
                "  user loss: {}",
                user_loss.as_deref().unwrap_or(PLACEHOLDER)
            );
            let _ = writeln!(out, "  corrected CPC: {}", fmt_money(c.corrected_cpc));
            let _ = writeln!(out, "  mob_top CPC (P2): {}", fmt_money(c.mob_top_cpc));
            let _ = writeln!(out, "  status: {}", status_label(c.status));
        }
        None => {
            let _ = writeln!(out, "Corrected CPC: no rewarded/offerwall row in P2");
        }
    }

    if !result.recommendations.is_empty() {
        let _ = writeln!(out, "Recommendations");
        for r in &result.recommendations {
            let action = r.action.map(|a| a.as_str()).unwrap_or(PLACEHOLDER);
            let _ = writeln!(out, "  {}: {}", r.block, action);
            for band in &r.bands {
                let _ = writeln!(out, "    {}", band.describe());
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn money_and_percent_placeholders() {
        assert_eq!(fmt_money(Some(0.5)), "US$ 0.5000");
        assert_eq!(fmt_money(None), "—");
        assert_eq!(fmt_pct(Some(12.5)), "12.50%");
        assert_eq!(fmt_pct(None), "—");
        assert_eq!(fmt_ratio_pct(0.3), "30.00%");
    }

    #[test]
    fn counts_use_period_grouping() {
        assert_eq!(fmt_count(0), "0");
        assert_eq!(fmt_count(999), "999");
        assert_eq!(fmt_count(1000), "1.000");
        assert_eq!(fmt_count(1_234_567), "1.234.567");
    }
}
