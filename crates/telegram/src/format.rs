use std::collections::BTreeMap;
use std::fmt::Write;

use common::{Strength, Timeframe, Verdict};

/// Render an evaluation as a Telegram HTML message.
///
/// Returns an empty string when there is nothing to report; callers skip
/// sending in that case.
pub fn render_report(timeframe: Timeframe, results: &BTreeMap<String, Vec<Verdict>>) -> String {
    let mut body = String::new();

    for (ticker, verdicts) in results {
        let _ = writeln!(body, "<b>{}</b>", escape(ticker));
        for v in verdicts {
            let _ = writeln!(
                body,
                "<code>{} {}: {}</code>",
                marker(v),
                escape(&v.strategy),
                escape(&v.evaluation_message)
            );
        }
        body.push('\n');
    }

    if body.is_empty() {
        return body;
    }
    format!("<b><u>{timeframe}</u></b>\n{body}")
}

fn marker(v: &Verdict) -> &'static str {
    match (v.is_fulfilled, v.strength) {
        (true, Some(Strength::Key)) => "🎯",
        (true, _) => "✅",
        (false, _) => "❌",
    }
}

/// Telegram HTML mode only needs these three escaped.
fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_results_render_nothing() {
        assert_eq!(render_report(Timeframe::D1, &BTreeMap::new()), "");
    }

    #[test]
    fn renders_sections_and_markers() {
        let mut results = BTreeMap::new();
        results.insert(
            "AAPL".to_string(),
            vec![
                Verdict::new("rsi30", true, "Strong Buy! RSI of 28.10 in rsi30 zone")
                    .with_strength(Strength::Strong),
                Verdict::new("rsi40", true, "Key Buy! RSI of 39.00 in rsi40 zone")
                    .with_strength(Strength::Key),
                Verdict::new("sma200", false, "lack 200 data"),
            ],
        );
        results.insert(
            "BITCOIN".to_string(),
            vec![Verdict::new("fng", false, "Neutral Notify! Neutral(50)")],
        );

        let expected = "<b><u>D1</u></b>\n\
            <b>AAPL</b>\n\
            <code>✅ rsi30: Strong Buy! RSI of 28.10 in rsi30 zone</code>\n\
            <code>🎯 rsi40: Key Buy! RSI of 39.00 in rsi40 zone</code>\n\
            <code>❌ sma200: lack 200 data</code>\n\
            \n\
            <b>BITCOIN</b>\n\
            <code>❌ fng: Neutral Notify! Neutral(50)</code>\n\
            \n";
        assert_eq!(render_report(Timeframe::D1, &results), expected);
    }

    #[test]
    fn escapes_html_in_messages() {
        let mut results = BTreeMap::new();
        results.insert(
            "X".to_string(),
            vec![Verdict::new("fng", false, "fng error: HTTP 502: <html>")],
        );
        let out = render_report(Timeframe::H4, &results);
        assert!(out.contains("HTTP 502: &lt;html&gt;"));
    }
}
