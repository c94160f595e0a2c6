use chrono::{Duration, NaiveDate};
use std::fmt::Write as _;

use crate::bitmap::{Rasterizer, RenderError, Texture};
use crate::config::ChartConfig;
use crate::sensor::WorkoutSummary;
use crate::store::Measurement;

/// Width reserved left of the plot for the weight axis labels.
pub const YAXIS_WIDTH: u32 = 34;

const MARGIN_RIGHT: u32 = 8;
const MARGIN_TOP: u32 = 8;
const MARGIN_BOTTOM: u32 = 36;

const LINE_COLOR: &str = "white";
const ANNOTATION_COLOR: &str = "#eeffee";

// ============================================================================
// Layer 1: Data Shaping
// ============================================================================

/// One slot per day of the shown window, oldest first. Days without a
/// measurement hold `None` and render as gaps.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphPoints {
    points: Vec<(NaiveDate, Option<f64>)>,
}

impl GraphPoints {
    /// Build the `days`-long window ending at `today`.
    ///
    /// Measurements outside the window are ignored. For several measurements
    /// on one day the last one wins.
    pub fn build(today: NaiveDate, days: u32, measurements: &[Measurement]) -> Self {
        let days = days.max(1);
        let first_day = today - Duration::days(i64::from(days) - 1);

        let mut points: Vec<(NaiveDate, Option<f64>)> = (0..days)
            .map(|offset| (first_day + Duration::days(i64::from(offset)), None))
            .collect();

        for measurement in measurements {
            let date = measurement.date();
            if date < first_day || date > today {
                continue;
            }
            let idx = (date - first_day).num_days() as usize;
            points[idx].1 = Some(measurement.value);
        }

        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(NaiveDate, Option<f64>)> {
        self.points.iter()
    }

    pub fn first_day(&self) -> NaiveDate {
        self.points[0].0
    }

    pub fn last_day(&self) -> NaiveDate {
        self.points[self.points.len() - 1].0
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.first_day() && date <= self.last_day()
    }

    /// Position of `date` in days from the first day of the window.
    pub fn day_offset(&self, date: NaiveDate) -> f64 {
        (date - self.first_day()).num_days() as f64
    }

    /// Number of days that carry a measurement.
    pub fn measured_days(&self) -> usize {
        self.points.iter().filter(|(_, v)| v.is_some()).count()
    }
}

/// Text placed vertically on top of the plot at a given day.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub date: NaiveDate,
    pub text: String,
}

/// Distance labels for the days inside the window, plus the running total one
/// day past its end.
pub fn workout_annotations(points: &GraphPoints, workouts: &WorkoutSummary) -> Vec<Annotation> {
    let mut annotations = Vec::new();

    for (key, distance) in &workouts.distance_by_day {
        let Ok(date) = NaiveDate::parse_from_str(key, "%Y-%m-%d") else {
            tracing::debug!("Skipping workout day with malformed date '{}'", key);
            continue;
        };
        if !points.contains(date) {
            continue;
        }

        annotations.push(Annotation {
            date,
            text: format_distance(distance),
        });
    }

    annotations.push(Annotation {
        date: points.last_day() + Duration::days(1),
        text: format!("Total: {:.1}", workouts.total_distance),
    });

    annotations
}

/// Integers print as reported ("5"). Fractional distances are rounded to
/// two decimals and keep at least one fractional digit ("5.0", "3.14").
fn format_distance(distance: &serde_json::Number) -> String {
    match distance.as_f64() {
        Some(value) if distance.is_f64() => format!("{:?}", (value * 100.0).round() / 100.0),
        _ => distance.to_string(),
    }
}

// ============================================================================
// Layer 2: SVG Generation - Weight Graph
// ============================================================================

pub fn generate_weight_svg(
    points: &GraphPoints,
    annotations: &[Annotation],
    width: u32,
    height: u32,
    config: &ChartConfig,
) -> String {
    let chart_width = width.saturating_sub(YAXIS_WIDTH + MARGIN_RIGHT).max(1) as f64;
    let chart_height = height.saturating_sub(MARGIN_TOP + MARGIN_BOTTOM).max(1) as f64;
    let plot_left = YAXIS_WIDTH as f64;
    let plot_top = MARGIN_TOP as f64;
    let plot_bottom = plot_top + chart_height;

    // One spare day on each side of the window
    let x_min = -1.0;
    let x_max = points.len() as f64;
    let (y_min, y_max) = (config.y_min, config.y_max);

    let x_to_pixel = |days: f64| -> f64 { plot_left + (days - x_min) / (x_max - x_min) * chart_width };

    let y_to_pixel = |weight: f64| -> f64 { plot_top + (y_max - weight) / (y_max - y_min) * chart_height };

    let mut svg = format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{}" height="{}" viewBox="0 0 {} {}" font-family="sans-serif">"#,
        width, height, width, height
    );

    svg.push_str(&format!(
        r#"<defs><clipPath id="plotArea"><rect x="{}" y="{}" width="{}" height="{}"/></clipPath></defs>"#,
        plot_left, plot_top, chart_width, chart_height
    ));

    // Vertical grid lines, major ticks and date labels
    let major_every = config.major_tick_days.max(1) as usize;
    let last_idx = points.len() - 1;
    for (idx, (date, _)) in points.iter().enumerate() {
        let x = x_to_pixel(idx as f64);
        let major = (last_idx - idx) % major_every == 0;

        if major {
            svg.push_str(&format!(
                r#"<line x1="{x}" y1="{plot_top}" x2="{x}" y2="{plot_bottom}" stroke="{LINE_COLOR}" stroke-width="0.5" stroke-opacity="0.5"/>"#
            ));
            svg.push_str(&format!(
                r#"<line x1="{x}" y1="{plot_bottom}" x2="{x}" y2="{}" stroke="{LINE_COLOR}" stroke-width="1"/>"#,
                plot_bottom + 4.0
            ));

            let label_y = plot_bottom + 14.0;
            svg.push_str(&format!(
                r#"<text x="{x}" y="{label_y}" text-anchor="end" font-size="10" fill="{LINE_COLOR}" transform="rotate(-30 {x} {label_y})">{}</text>"#,
                date.format("%m-%d")
            ));
        } else {
            svg.push_str(&format!(
                r#"<line x1="{x}" y1="{plot_bottom}" x2="{x}" y2="{}" stroke="{LINE_COLOR}" stroke-width="1"/>"#,
                plot_bottom + 2.0
            ));
        }
    }

    // Horizontal grid lines and weight labels
    let mut weight = (y_min / 5.0).ceil() * 5.0;
    while weight <= y_max {
        let y = y_to_pixel(weight);
        svg.push_str(&format!(
            r#"<line x1="{plot_left}" y1="{y}" x2="{}" y2="{y}" stroke="{LINE_COLOR}" stroke-width="0.5" stroke-opacity="0.5"/>"#,
            plot_left + chart_width
        ));
        svg.push_str(&format!(
            r#"<line x1="{}" y1="{y}" x2="{plot_left}" y2="{y}" stroke="{LINE_COLOR}" stroke-width="1"/>"#,
            plot_left - 4.0
        ));
        svg.push_str(&format!(
            r#"<text x="{}" y="{}" text-anchor="end" font-size="10" fill="{LINE_COLOR}">{:.0}</text>"#,
            plot_left - 6.0,
            y + 3.0,
            weight
        ));
        weight += 5.0;
    }

    // Left and bottom spines only
    svg.push_str(&format!(
        r#"<line x1="{plot_left}" y1="{plot_top}" x2="{plot_left}" y2="{plot_bottom}" stroke="{LINE_COLOR}" stroke-width="1"/>"#
    ));
    svg.push_str(&format!(
        r#"<line x1="{plot_left}" y1="{plot_bottom}" x2="{}" y2="{plot_bottom}" stroke="{LINE_COLOR}" stroke-width="1"/>"#,
        plot_left + chart_width
    ));

    svg.push_str(r#"<g clip-path="url(#plotArea)">"#);

    // Weight line, broken at days without a measurement
    let mut segments: Vec<Vec<(f64, f64)>> = vec![Vec::new()];
    for (idx, (_, value)) in points.iter().enumerate() {
        match value {
            Some(weight) => {
                if let Some(segment) = segments.last_mut() {
                    segment.push((x_to_pixel(idx as f64), y_to_pixel(*weight)));
                }
            }
            None => {
                if segments.last().is_some_and(|s| !s.is_empty()) {
                    segments.push(Vec::new());
                }
            }
        }
    }
    for segment in segments.iter().filter(|s| s.len() > 1) {
        let mut path = String::new();
        for (i, (x, y)) in segment.iter().enumerate() {
            let _ = write!(path, "{}{},{} ", if i == 0 { 'M' } else { 'L' }, x, y);
        }
        svg.push_str(&format!(
            r#"<path class="weight-line" d="{}" stroke="{LINE_COLOR}" stroke-width="3" stroke-linejoin="round" fill="none"/>"#,
            path.trim_end()
        ));
    }

    // Markers
    for (idx, (_, value)) in points.iter().enumerate() {
        if let Some(weight) = value {
            svg.push_str(&format!(
                r#"<circle class="marker" cx="{}" cy="{}" r="3" fill="{LINE_COLOR}" stroke="{LINE_COLOR}" stroke-width="1"/>"#,
                x_to_pixel(idx as f64),
                y_to_pixel(*weight)
            ));
        }
    }

    svg.push_str("</g>");

    // Distance annotations, reading bottom to top from the annotation line
    let annotation_y = y_to_pixel(config.annotation_y);
    for annotation in annotations {
        let x = x_to_pixel(points.day_offset(annotation.date));
        svg.push_str(&format!(
            r#"<text class="annotation" x="{x}" y="{annotation_y}" text-anchor="start" dominant-baseline="central" font-size="9" fill="{ANNOTATION_COLOR}" transform="rotate(-90 {x} {annotation_y})">{}</text>"#,
            annotation.text
        ));
    }

    svg.push_str("</svg>");
    svg
}

// ============================================================================
// Layer 3: Rendering
// ============================================================================

/// Turns the weight history and workout summary into a graph texture.
pub struct ChartRenderer {
    config: ChartConfig,
    rasterizer: Rasterizer,
}

impl ChartRenderer {
    pub fn new(config: ChartConfig, rasterizer: Rasterizer) -> Self {
        Self { config, rasterizer }
    }

    pub fn config(&self) -> &ChartConfig {
        &self.config
    }

    /// Width of the rendered graph in pixels.
    pub fn width(&self) -> u32 {
        self.config
            .show_last_days
            .max(1)
            .saturating_mul(self.config.px_per_day.max(1))
    }

    pub fn render(
        &self,
        today: NaiveDate,
        measurements: &[Measurement],
        workouts: Option<&WorkoutSummary>,
        height: u32,
    ) -> Result<Texture, RenderError> {
        let points = GraphPoints::build(today, self.config.show_last_days, measurements);
        let annotations = workouts
            .map(|summary| workout_annotations(&points, summary))
            .unwrap_or_default();

        let width = self.width();
        let height = height.max(1);

        tracing::debug!(
            "Rendering {}x{} weight graph: {} measured days, {} annotations",
            width,
            height,
            points.measured_days(),
            annotations.len()
        );

        let svg = generate_weight_svg(&points, &annotations, width, height, &self.config);
        self.rasterizer.render(&svg, width, height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;
    use std::collections::BTreeMap;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn measured(s: &str, value: f64) -> Measurement {
        Measurement::new(
            NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap(),
            value,
        )
    }

    fn workouts(total: f64, days: &[(&str, f64)]) -> WorkoutSummary {
        WorkoutSummary {
            total_distance: total,
            distance_by_day: days
                .iter()
                .map(|(d, v)| (d.to_string(), serde_json::Number::from_f64(*v).unwrap()))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    fn renderer() -> ChartRenderer {
        ChartRenderer::new(ChartConfig::default(), Rasterizer::without_fonts())
    }

    #[test]
    fn test_window_has_thirty_consecutive_days() {
        let today = day("2024-03-15");
        for measurements in [
            vec![],
            vec![measured("2024-03-15 07:00", 84.0)],
            (0..60)
                .map(|i| Measurement::new(
                    (today - Duration::days(i)).and_hms_opt(7, 0, 0).unwrap(),
                    80.0 + i as f64 / 10.0,
                ))
                .collect(),
        ] {
            let points = GraphPoints::build(today, 30, &measurements);
            assert_eq!(points.len(), 30);
            assert_eq!(points.first_day(), day("2024-02-15"));
            assert_eq!(points.last_day(), today);

            let dates: Vec<NaiveDate> = points.iter().map(|(d, _)| *d).collect();
            for pair in dates.windows(2) {
                assert_eq!(pair[1] - pair[0], Duration::days(1));
            }
        }
    }

    #[test]
    fn test_gaps_and_out_of_window_measurements() {
        let points = GraphPoints::build(
            day("2024-03-15"),
            30,
            &[
                measured("2024-02-14 07:00", 90.0),
                measured("2024-02-15 07:00", 86.0),
                measured("2024-03-15 07:00", 84.0),
                measured("2024-03-16 07:00", 70.0),
            ],
        );

        assert_eq!(points.len(), 30);
        assert_eq!(points.measured_days(), 2);
        let values: Vec<Option<f64>> = points.iter().map(|(_, v)| *v).collect();
        assert_eq!(values[0], Some(86.0));
        assert_eq!(values[1], None);
        assert_eq!(values[29], Some(84.0));
    }

    #[test]
    fn test_same_day_last_write_wins() {
        let points = GraphPoints::build(
            day("2024-03-15"),
            30,
            &[
                measured("2024-03-10 21:00", 85.0),
                measured("2024-03-10 07:00", 84.2),
            ],
        );
        let value = points
            .iter()
            .find(|(d, _)| *d == day("2024-03-10"))
            .and_then(|(_, v)| *v);
        assert_eq!(value, Some(84.2));
    }

    #[test]
    fn test_annotations_inside_window_plus_total() {
        let points = GraphPoints::build(day("2024-03-15"), 30, &[]);
        let annotations = workout_annotations(
            &points,
            &workouts(
                42.345,
                &[
                    ("2024-01-01", 5.0),
                    ("2024-03-01", 10.0),
                    ("2024-03-14", 3.14159),
                    ("not-a-date", 1.0),
                ],
            ),
        );

        assert_eq!(
            annotations,
            vec![
                Annotation {
                    date: day("2024-03-01"),
                    text: "10.0".to_string()
                },
                Annotation {
                    date: day("2024-03-14"),
                    text: "3.14".to_string()
                },
                Annotation {
                    date: day("2024-03-16"),
                    text: "Total: 42.3".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_format_distance() {
        let number = |v: f64| serde_json::Number::from_f64(v).unwrap();
        assert_eq!(format_distance(&number(5.0)), "5.0");
        assert_eq!(format_distance(&number(2.456)), "2.46");
        assert_eq!(format_distance(&number(0.0)), "0.0");
        assert_eq!(format_distance(&number(12.1)), "12.1");
        assert_eq!(format_distance(&serde_json::Number::from(5)), "5");
    }

    #[test]
    fn test_integer_distance_from_gateway_has_no_fraction() {
        let summary: WorkoutSummary = serde_json::from_str(
            r#"{"total_distance": 8, "distance_by_day": {"2024-03-10": 5, "2024-03-11": 3.0}}"#,
        )
        .unwrap();
        let points = GraphPoints::build(day("2024-03-15"), 30, &[]);
        let texts: Vec<String> = workout_annotations(&points, &summary)
            .into_iter()
            .map(|a| a.text)
            .collect();
        assert_eq!(texts, ["5", "3.0", "Total: 8.0"]);
    }

    #[test]
    fn test_svg_breaks_line_at_gaps() {
        let points = GraphPoints::build(
            day("2024-03-15"),
            30,
            &[
                measured("2024-03-01 07:00", 86.0),
                measured("2024-03-02 07:00", 85.5),
                measured("2024-03-05 07:00", 85.0),
                measured("2024-03-10 07:00", 84.5),
                measured("2024-03-11 07:00", 84.0),
            ],
        );
        let svg = generate_weight_svg(&points, &[], 450, 240, &ChartConfig::default());

        assert_eq!(svg.matches(r#"class="marker""#).count(), 5);
        // 03-01..03-02 and 03-10..03-11; 03-05 stands alone
        assert_eq!(svg.matches(r#"class="weight-line""#).count(), 2);
        assert!(svg.contains("03-15"));
        assert!(svg.contains("03-10"));
        assert!(!svg.contains("03-14<"));
    }

    #[test]
    fn test_svg_annotations() {
        let points = GraphPoints::build(day("2024-03-15"), 30, &[]);
        let annotations = workout_annotations(&points, &workouts(8.0, &[("2024-03-15", 8.0)]));
        let svg = generate_weight_svg(&points, &annotations, 450, 240, &ChartConfig::default());

        assert_eq!(svg.matches(r#"class="annotation""#).count(), 2);
        assert!(svg.contains(">8.0</text>"));
        assert!(svg.contains(">Total: 8.0</text>"));
        assert!(svg.contains("rotate(-90"));
    }

    #[test]
    fn test_render_empty_history() {
        let texture = renderer()
            .render(day("2024-03-15"), &[], None, 240)
            .unwrap();
        assert_eq!(texture.size(), (450, 240));

        let rgba = texture.to_rgba().unwrap();
        assert_eq!(rgba.dimensions(), (450, 240));
        // Transparent outside the axes
        assert_eq!(rgba.get_pixel(449, 0).0[3], 0);
    }

    #[test]
    fn test_render_with_data_draws_opaque_pixels() {
        let measurements = [
            measured("2024-03-13 07:00", 85.0),
            measured("2024-03-14 07:00", 84.5),
            measured("2024-03-15 07:00", 84.0),
        ];
        let opaque = |texture: &Texture| {
            texture
                .to_rgba()
                .unwrap()
                .pixels()
                .filter(|p| p.0[3] == 255)
                .count()
        };

        let empty = renderer()
            .render(day("2024-03-15"), &[], None, 300)
            .unwrap();
        let texture = renderer()
            .render(
                day("2024-03-15"),
                &measurements,
                Some(&workouts(20.0, &[("2024-03-14", 5.0)])),
                300,
            )
            .unwrap();
        assert_eq!(texture.size(), (450, 300));
        assert!(opaque(&texture) > opaque(&empty));
    }

    #[test]
    fn test_render_zero_height_is_raised() {
        let texture = renderer()
            .render(day("2024-03-15"), &[], None, 0)
            .unwrap();
        assert_eq!(texture.size(), (450, 1));
    }
}
