//! Pure presentation of session snapshots.
//!
//! Nothing here performs I/O or keeps state: a [`Snapshot`] (or a bare
//! [`RecognitionResult`]) goes in, a [`ResultView`] or a finished string
//! comes out. The uploader owns every side effect; callers re-render
//! whenever the watch channel publishes a new snapshot.
//!
//! ## Confidence colours
//!
//! With `v = confidence / 100` each chip is painted
//! `rgb(255·(1−v), 255·v, 0)`: pure red at 0, pure green at 100, channels
//! rounded to the nearest integer. The legend below the chips is a fixed
//! red → yellow → green gradient and does not depend on the data.

use crate::config::Engine;
use crate::error::OcrViewError;
use crate::output::{clamp_confidence, RecognitionResult};
use crate::state::Snapshot;
use serde::Serialize;
use std::fmt::Write as _;

/// An sRGB colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const RED: Rgb = Rgb { r: 255, g: 0, b: 0 };
    pub const YELLOW: Rgb = Rgb { r: 255, g: 255, b: 0 };
    pub const GREEN: Rgb = Rgb { r: 0, g: 255, b: 0 };

    /// CSS functional notation, e.g. `rgb(255, 0, 0)`.
    pub fn css(&self) -> String {
        format!("rgb({}, {}, {})", self.r, self.g, self.b)
    }

    fn ansi_bg(&self) -> String {
        format!("\x1b[48;2;{};{};{}m", self.r, self.g, self.b)
    }
}

/// Chip colour for a confidence score in `0..=100`.
///
/// Out-of-range input is clamped first.
pub fn confidence_color(confidence: f64) -> Rgb {
    let v = clamp_confidence(confidence) / 100.0;
    Rgb {
        r: channel(255.0 * (1.0 - v)),
        g: channel(255.0 * v),
        b: 0,
    }
}

fn channel(x: f64) -> u8 {
    x.round().clamp(0.0, 255.0) as u8
}

// ── Legend ───────────────────────────────────────────────────────────────

/// Gradient stops of the legend bar, left to right.
pub const LEGEND_STOPS: [Rgb; 3] = [Rgb::RED, Rgb::YELLOW, Rgb::GREEN];

/// Labels under the legend bar: left edge, centre, right edge.
pub const LEGEND_LABELS: [&str; 3] = ["0%", "50%", "100%"];

/// Colour of the legend gradient at position `t` in `0.0..=1.0`.
pub fn legend_color(t: f64) -> Rgb {
    let t = t.clamp(0.0, 1.0);
    let (from, to, local) = if t <= 0.5 {
        (LEGEND_STOPS[0], LEGEND_STOPS[1], t * 2.0)
    } else {
        (LEGEND_STOPS[1], LEGEND_STOPS[2], (t - 0.5) * 2.0)
    };
    let mix = |a: u8, b: u8| channel(a as f64 + (b as f64 - a as f64) * local);
    Rgb {
        r: mix(from.r, to.r),
        g: mix(from.g, to.g),
        b: mix(from.b, to.b),
    }
}

// ── View model ───────────────────────────────────────────────────────────

/// One rendered fragment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chip {
    pub text: String,
    pub confidence: f64,
    pub color: Rgb,
}

/// Everything needed to draw a result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultView {
    pub engine: Engine,
    /// Badge label naming the engine.
    pub badge: &'static str,
    /// One chip per item, in detection order.
    pub chips: Vec<Chip>,
}

/// Project a result into its view; `None` renders nothing.
pub fn render_result(result: Option<&RecognitionResult>) -> Option<ResultView> {
    let result = result?;
    Some(ResultView {
        engine: result.engine,
        badge: result.engine.label(),
        chips: result
            .items
            .iter()
            .map(|item| Chip {
                text: item.text.clone(),
                confidence: item.confidence,
                color: confidence_color(item.confidence),
            })
            .collect(),
    })
}

// ── Output formats ───────────────────────────────────────────────────────

/// Target representation for [`render`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// 24-bit ANSI colours for terminals. (default)
    #[default]
    Ansi,
    /// No escape codes; confidence printed next to each fragment.
    Plain,
    /// Standalone HTML fragment.
    Html,
    /// The [`ResultView`] as JSON (`null` when there is no result).
    Json,
}

/// Render the whole session: engine selector, upload status, result.
///
/// JSON output covers the result view only.
pub fn render(snapshot: &Snapshot, format: OutputFormat) -> Result<String, OcrViewError> {
    let view = render_result(snapshot.result.as_deref());
    let out = match format {
        OutputFormat::Ansi => {
            let mut s = status_ansi(snapshot);
            if let Some(ref v) = view {
                s.push('\n');
                s.push_str(&to_ansi(v, 80));
            }
            s
        }
        OutputFormat::Plain => {
            let mut s = status_plain(snapshot);
            if let Some(ref v) = view {
                s.push('\n');
                s.push_str(&to_plain(v));
            }
            s
        }
        OutputFormat::Html => to_html(
            view.as_ref(),
            snapshot.upload.preview.as_ref().map(|p| p.url.as_str()),
        ),
        OutputFormat::Json => serde_json::to_string_pretty(&view)
            .map_err(|e| OcrViewError::Internal(format!("serialise view: {e}")))?,
    };
    Ok(out)
}

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";

/// Chips wrapped at `width` columns, followed by the legend.
pub fn to_ansi(view: &ResultView, width: usize) -> String {
    let mut out = format!(
        "{BOLD}Recognition Result{RESET}  {}\x1b[30m {} {RESET}\n",
        badge_color(view.engine).ansi_bg(),
        view.badge
    );

    let mut line_len = 0;
    for chip in &view.chips {
        let chip_len = chip.text.chars().count() + 2;
        if line_len > 0 && line_len + chip_len + 1 > width {
            out.push('\n');
            line_len = 0;
        }
        if line_len > 0 {
            out.push(' ');
            line_len += 1;
        }
        let _ = write!(out, "{}\x1b[30m {} {RESET}", chip.color.ansi_bg(), chip.text);
        line_len += chip_len;
    }
    if view.chips.is_empty() {
        let _ = write!(out, "{DIM}(no text recognised){RESET}");
    }
    out.push_str("\n\n");
    out.push_str(&legend_ansi(width.min(42)));
    out
}

/// The static legend: caption, gradient bar, and 0/50/100 % labels.
pub fn legend_ansi(width: usize) -> String {
    let width = width.max(LEGEND_LABELS.iter().map(|l| l.len()).sum::<usize>() + 2);
    let mut out = format!("{DIM}Confidence Level Indicator:{RESET}\n");
    for i in 0..width {
        let t = i as f64 / (width - 1) as f64;
        out.push_str(&legend_color(t).ansi_bg());
        out.push(' ');
    }
    out.push_str(RESET);
    out.push('\n');
    out.push_str(&legend_labels(width));
    out.push('\n');
    out
}

fn legend_labels(width: usize) -> String {
    let [left, mid, right] = LEGEND_LABELS;
    let mid_start = (width - mid.len()) / 2;
    let mut s = String::with_capacity(width);
    s.push_str(left);
    s.push_str(&" ".repeat(mid_start.saturating_sub(left.len())));
    s.push_str(mid);
    let used = s.len();
    s.push_str(&" ".repeat(width.saturating_sub(used + right.len())));
    s.push_str(right);
    s
}

/// Fragments with their scores, one per line.
pub fn to_plain(view: &ResultView) -> String {
    let mut out = format!("Recognition Result [{}]\n", view.badge);
    for chip in &view.chips {
        let _ = writeln!(out, "{:>6.2}%  {}", chip.confidence, chip.text);
    }
    if view.chips.is_empty() {
        out.push_str("(no text recognised)\n");
    }
    out
}

/// HTML fragment: optional preview, result card, legend.
///
/// `preview_src` goes into an `<img src>` as given (a `file://` URL or a
/// `data:` URL).
pub fn to_html(view: Option<&ResultView>, preview_src: Option<&str>) -> String {
    let mut out = String::from("<div class=\"ocrview\">\n");
    if let Some(src) = preview_src {
        let _ = writeln!(
            out,
            "  <img class=\"preview\" src=\"{}\" alt=\"Preview\" style=\"max-width:100%;max-height:300px\">",
            escape_html(src)
        );
    }
    if let Some(view) = view {
        out.push_str("  <section class=\"result\">\n");
        let _ = writeln!(
            out,
            "    <h2>Recognition Result <span class=\"badge badge-{}\">{}</span></h2>",
            view.engine.as_str(),
            escape_html(view.badge)
        );
        out.push_str("    <div class=\"chips\">\n");
        for chip in &view.chips {
            let _ = writeln!(
                out,
                "      <span class=\"chip\" title=\"{:.2}%\" style=\"display:inline-block;padding:4px;margin:4px;border-radius:4px;background-color:{}\">{}</span>",
                chip.confidence,
                chip.color.css(),
                escape_html(&chip.text)
            );
        }
        out.push_str("    </div>\n");
        out.push_str(&legend_html());
        out.push_str("  </section>\n");
    }
    out.push_str("</div>\n");
    out
}

fn legend_html() -> String {
    let stops = LEGEND_STOPS
        .iter()
        .map(|c| c.css())
        .collect::<Vec<_>>()
        .join(", ");
    let labels = LEGEND_LABELS
        .iter()
        .map(|l| format!("<span>{l}</span>"))
        .collect::<String>();
    format!(
        "    <div class=\"legend\">\n      <p>Confidence Level Indicator:</p>\n      \
         <div style=\"height:20px;border-radius:4px;background:linear-gradient(to right, {stops})\"></div>\n      \
         <div style=\"display:flex;justify-content:space-between\">{labels}</div>\n    </div>\n"
    )
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

fn badge_color(engine: Engine) -> Rgb {
    match engine {
        Engine::EasyOcr => Rgb { r: 0x19, g: 0x76, b: 0xd2 },
        Engine::Local => Rgb { r: 0x9c, g: 0x27, b: 0xb0 },
    }
}

// ── Uploader status ──────────────────────────────────────────────────────

fn status_lines(snapshot: &Snapshot) -> Vec<String> {
    let mut lines = Vec::new();
    let selector = Engine::ALL
        .iter()
        .map(|e| {
            let mark = if *e == snapshot.engine { "(•)" } else { "( )" };
            format!("{mark} {}", e.label())
        })
        .collect::<Vec<_>>()
        .join("  ");
    lines.push(format!("Engine: {selector}"));

    let up = &snapshot.upload;
    lines.push(
        if up.loading {
            "Recognising…"
        } else if up.dragging {
            "Release to upload"
        } else {
            "Drag and drop an image here, or pick a file"
        }
        .to_string(),
    );

    if let Some(ref p) = up.preview {
        let dims = p
            .dimensions
            .map(|(w, h)| format!(" {w}×{h}"))
            .unwrap_or_default();
        lines.push(format!("Preview: {}{} {}", p.file_name, dims, p.url));
    }
    lines
}

/// Selector, drop-zone status, preview and error banner.
pub fn status_plain(snapshot: &Snapshot) -> String {
    let mut lines = status_lines(snapshot);
    if let Some(ref e) = snapshot.upload.error {
        lines.push(format!("Error: {e}"));
    }
    lines.join("\n") + "\n"
}

/// [`status_plain`] with ANSI emphasis.
pub fn status_ansi(snapshot: &Snapshot) -> String {
    let mut lines = status_lines(snapshot);
    if let Some(ref e) = snapshot.upload.error {
        lines.push(format!("\x1b[31m✗ {e}{RESET}"));
    }
    lines.join("\n") + "\n"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::UploadError;
    use crate::output::RecognizedItem;
    use std::sync::Arc;

    fn sample(engine: Engine) -> RecognitionResult {
        RecognitionResult::new(
            engine,
            vec![RecognizedItem::new("A", 90.0), RecognizedItem::new("B", 10.0)],
        )
    }

    #[test]
    fn color_endpoints_and_midpoint() {
        assert_eq!(confidence_color(0.0), Rgb::RED);
        assert_eq!(confidence_color(100.0), Rgb::GREEN);
        let mid = confidence_color(50.0);
        assert_eq!(mid.r, mid.g);
        assert_eq!(mid.b, 0);
    }

    #[test]
    fn color_follows_linear_formula() {
        for c in [0.0_f64, 12.5, 33.3, 47.0, 50.0, 66.6, 90.0, 99.9, 100.0] {
            let v = c / 100.0;
            let expected = Rgb {
                r: (255.0 * (1.0 - v)).round() as u8,
                g: (255.0 * v).round() as u8,
                b: 0,
            };
            assert_eq!(confidence_color(c), expected, "confidence {c}");
        }
    }

    #[test]
    fn color_clamps_out_of_range() {
        assert_eq!(confidence_color(-20.0), Rgb::RED);
        assert_eq!(confidence_color(250.0), Rgb::GREEN);
    }

    #[test]
    fn legend_gradient_hits_stops() {
        assert_eq!(legend_color(0.0), Rgb::RED);
        assert_eq!(legend_color(0.5), Rgb::YELLOW);
        assert_eq!(legend_color(1.0), Rgb::GREEN);
    }

    #[test]
    fn nothing_to_render_without_result() {
        assert_eq!(render_result(None), None);
        let html = to_html(None, None);
        assert!(!html.contains("Recognition Result"));
        assert_eq!(
            render(&Snapshot::default(), OutputFormat::Json).unwrap(),
            "null"
        );
    }

    #[test]
    fn chips_preserve_order_once_each() {
        let view = render_result(Some(&sample(Engine::Local))).unwrap();
        let texts: Vec<_> = view.chips.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["A", "B"]);

        let html = to_html(Some(&view), None);
        assert_eq!(html.matches(">A</span>").count(), 1);
        assert_eq!(html.matches(">B</span>").count(), 1);
        assert!(html.find(">A</span>").unwrap() < html.find(">B</span>").unwrap());
    }

    #[test]
    fn badge_reflects_engine() {
        let view = render_result(Some(&sample(Engine::EasyOcr))).unwrap();
        assert_eq!(view.badge, "EasyOCR");
        let view = render_result(Some(&sample(Engine::Local))).unwrap();
        assert_eq!(view.badge, "Local Model");
    }

    #[test]
    fn html_escapes_text() {
        let r = RecognitionResult::new(Engine::Local, vec![RecognizedItem::new("<b>&", 50.0)]);
        let html = to_html(render_result(Some(&r)).as_ref(), None);
        assert!(html.contains("&lt;b&gt;&amp;"));
        assert!(!html.contains("<b>&"));
    }

    fn sample_80_20() -> RecognitionResult {
        RecognitionResult::new(
            Engine::Local,
            vec![RecognizedItem::new("hi", 80.0), RecognizedItem::new("lo", 20.0)],
        )
    }

    #[test]
    fn html_uses_chip_colors_and_legend() {
        let view = render_result(Some(&sample_80_20())).unwrap();
        let html = to_html(Some(&view), Some("file:///tmp/p.png"));
        assert!(html.contains("background-color:rgb(51, 204, 0)"));
        assert!(html.contains("background-color:rgb(204, 51, 0)"));
        assert!(html.contains("linear-gradient(to right, rgb(255, 0, 0), rgb(255, 255, 0), rgb(0, 255, 0))"));
        assert!(html.contains("src=\"file:///tmp/p.png\""));
        for label in LEGEND_LABELS {
            assert!(html.contains(&format!("<span>{label}</span>")));
        }
    }

    #[test]
    fn ansi_paints_chip_backgrounds() {
        let view = render_result(Some(&sample_80_20())).unwrap();
        let out = to_ansi(&view, 80);
        assert!(out.contains("\x1b[48;2;51;204;0m\x1b[30m hi "));
        assert!(out.contains("\x1b[48;2;204;51;0m\x1b[30m lo "));
        assert!(out.contains("100%"));
    }

    #[test]
    fn legend_labels_span_width() {
        let labels = legend_labels(42);
        assert_eq!(labels.len(), 42);
        assert!(labels.starts_with("0%"));
        assert!(labels.ends_with("100%"));
        assert!(labels.contains(" 50% "));
    }

    #[test]
    fn plain_status_shows_error_and_selection() {
        let mut snap = Snapshot {
            engine: Engine::EasyOcr,
            ..Snapshot::default()
        };
        snap.upload.error = Some(UploadError::validation(UploadError::NOT_AN_IMAGE));
        let out = render(&snap, OutputFormat::Plain).unwrap();
        assert!(out.contains("( ) Local Model  (•) EasyOCR"));
        assert!(out.contains("Error: Please upload an image file"));
        assert!(!out.contains("Recognition Result"));
    }

    #[test]
    fn render_includes_result_after_status() {
        let snap = Snapshot {
            result: Some(Arc::new(sample(Engine::EasyOcr))),
            ..Snapshot::default()
        };
        let out = render(&snap, OutputFormat::Plain).unwrap();
        let status_at = out.find("Engine:").unwrap();
        let result_at = out.find("Recognition Result [EasyOCR]").unwrap();
        assert!(status_at < result_at);
        assert!(out.contains(" 90.00%  A"));
    }
}
