//! Results presenter.
//!
//! Pure functions from the latest detection list (and view state) to text.
//! Nothing here holds state; rendering the same input twice gives the same output.

use crate::coordinator::ViewState;
use crate::detect::Detection;

/// Shown when there is nothing to list.
pub const EMPTY_PLACEHOLDER: &str = "No objects detected. Start recognition to see results.";

/// Lower bound (inclusive) of the high tier.
pub const HIGH_CONFIDENCE: f64 = 0.8;
/// Lower bound (inclusive) of the medium tier.
pub const MEDIUM_CONFIDENCE: f64 = 0.5;

const BAR_WIDTH: usize = 20;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tier {
    High,
    Medium,
    Low,
}

impl Tier {
    pub fn of(confidence: f64) -> Self {
        if confidence >= HIGH_CONFIDENCE {
            Tier::High
        } else if confidence >= MEDIUM_CONFIDENCE {
            Tier::Medium
        } else {
            Tier::Low
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Tier::High => "high",
            Tier::Medium => "medium",
            Tier::Low => "low",
        }
    }

    fn ansi_color(self) -> &'static str {
        match self {
            Tier::High => "\x1b[32m",
            Tier::Medium => "\x1b[33m",
            Tier::Low => "\x1b[31m",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Row {
    pub name: String,
    pub confidence: f64,
    /// e.g. `"92.0%"`
    pub percent: String,
    pub tier: Tier,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Presentation {
    Empty(&'static str),
    Rows(Vec<Row>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderStyle {
    Plain,
    Color,
}

/// Confidence scaled to a percentage with one decimal.
pub fn format_percent(confidence: f64) -> String {
    format!("{:.1}%", confidence * 100.0)
}

/// Bucket and order detections for display, most confident first.
pub fn present(detections: &[Detection]) -> Presentation {
    if detections.is_empty() {
        return Presentation::Empty(EMPTY_PLACEHOLDER);
    }
    let mut rows: Vec<Row> = detections
        .iter()
        .map(|d| Row {
            name: d.name.clone(),
            confidence: d.confidence,
            percent: format_percent(d.confidence),
            tier: Tier::of(d.confidence),
        })
        .collect();
    rows.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    Presentation::Rows(rows)
}

pub fn render(presentation: &Presentation, style: RenderStyle) -> String {
    let rows = match presentation {
        Presentation::Empty(placeholder) => return format!("  {}\n", placeholder),
        Presentation::Rows(rows) => rows,
    };
    let name_width = rows.iter().map(|r| r.name.chars().count()).max().unwrap_or(0);
    let mut out = String::new();
    for row in rows {
        let filled = (row.confidence.clamp(0.0, 1.0) * BAR_WIDTH as f64).round() as usize;
        let bar = format!("{}{}", "#".repeat(filled), "-".repeat(BAR_WIDTH - filled));
        match style {
            RenderStyle::Plain => out.push_str(&format!(
                "  {:<width$}  [{}] {:>6}  {}\n",
                row.name,
                bar,
                row.percent,
                row.tier.name(),
                width = name_width
            )),
            RenderStyle::Color => out.push_str(&format!(
                "  {:<width$}  {}[{}] {:>6}\x1b[0m\n",
                row.name,
                row.tier.ansi_color(),
                bar,
                row.percent,
                width = name_width
            )),
        }
    }
    out
}

/// Full display: status line, error if any, then the results.
pub fn render_view(view: &ViewState, style: RenderStyle) -> String {
    let status = match (view.capturing, view.recognizing) {
        (true, true) => "capturing (recognizing...)",
        (true, false) => "capturing",
        (false, true) => "stopped (finishing last recognition...)",
        (false, false) => "stopped",
    };
    let mut out = format!("[{}]\n", status);
    if let Some(error) = &view.error {
        out.push_str(&format!("  error: {}\n", error));
    }
    out.push_str(&render(&present(&view.detections), style));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_boundaries() {
        assert_eq!(Tier::of(0.8), Tier::High);
        assert_eq!(Tier::of(0.79999), Tier::Medium);
        assert_eq!(Tier::of(0.5), Tier::Medium);
        assert_eq!(Tier::of(0.49999), Tier::Low);
        assert_eq!(Tier::of(1.0), Tier::High);
        assert_eq!(Tier::of(0.0), Tier::Low);
    }

    #[test]
    fn percent_has_one_decimal() {
        assert_eq!(format_percent(0.92), "92.0%");
        assert_eq!(format_percent(0.4567), "45.7%");
        assert_eq!(format_percent(1.0), "100.0%");
        assert_eq!(format_percent(0.0), "0.0%");
    }

    #[test]
    fn empty_list_shows_placeholder() {
        let p = present(&[]);
        assert_eq!(p, Presentation::Empty(EMPTY_PLACEHOLDER));
        assert!(render(&p, RenderStyle::Plain).contains("Start recognition"));
    }

    #[test]
    fn rows_sorted_most_confident_first() {
        let p = present(&[
            Detection::new("cup", 0.55),
            Detection::new("cat", 0.92),
            Detection::new("dog", 0.3),
        ]);
        let Presentation::Rows(rows) = p else {
            panic!("expected rows");
        };
        let names: Vec<_> = rows.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["cat", "cup", "dog"]);
        let tiers: Vec<_> = rows.iter().map(|r| r.tier).collect();
        assert_eq!(tiers, vec![Tier::High, Tier::Medium, Tier::Low]);
    }

    #[test]
    fn rendering_is_idempotent() {
        let p = present(&[Detection::new("cat", 0.92)]);
        let first = render(&p, RenderStyle::Plain);
        assert_eq!(first, render(&p, RenderStyle::Plain));
        assert!(first.contains("92.0%"));
        assert!(first.contains("high"));
        assert!(first.contains("[##################--]"));
    }

    #[test]
    fn color_style_uses_tier_color() {
        let out = render(&present(&[Detection::new("cat", 0.3)]), RenderStyle::Color);
        assert!(out.contains("\x1b[31m"));
        assert!(out.ends_with("\x1b[0m\n"));
    }

    #[test]
    fn view_shows_error_and_placeholder() {
        let view = ViewState {
            capturing: true,
            recognizing: false,
            detections: vec![],
            error: Some("Recognition service is unreachable.".into()),
        };
        let out = render_view(&view, RenderStyle::Plain);
        assert!(out.starts_with("[capturing]\n"));
        assert!(out.contains("error: Recognition service is unreachable."));
        assert!(out.contains(EMPTY_PLACEHOLDER));
    }
}
