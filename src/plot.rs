//! Score trajectory plots
//!
//! One figure per call, one panel per survey. What is drawn is controlled by a
//! [`PlotConfig`]: panel layout, line style, the x-axis mapping and an optional
//! restriction to a subset of follow-ups. Named [`Preset`]s cover the usual
//! figures.

use clap::ValueEnum;
use plotters::coord::Shift;
use plotters::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::aggregate::{GroupSummary, Granularity, TotalsTable};
use crate::cleaning::{CleanedRecord, FollowUp, Treatment};
use crate::utils::{format_number, AnalysisError};

/// Follow-up index to elapsed months
pub const FOLLOW_UP_MONTHS: [(f64, f64); 5] =
    [(0.0, 0.0), (1.0, 1.0), (2.0, 3.0), (3.0, 6.0), (4.0, 12.0)];

const ORANGE: RGBColor = RGBColor(255, 165, 0);
const DARK_GREEN: RGBColor = RGBColor(0, 128, 0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
pub enum Layout {
    /// Panels stacked top to bottom
    Vertical,
    /// Panels side by side
    Horizontal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
pub enum Style {
    /// One line per patient; solid for FMT, dashed for PLACEBO
    PatientLines,
    /// Per-arm mean with ±1 SD error bars
    MeanSd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
pub enum AxisMapping {
    /// Raw follow-up index
    FollowUp,
    /// Elapsed months via [`FOLLOW_UP_MONTHS`]
    Months,
}

impl AxisMapping {
    /// x coordinate of a follow-up; `None` when the mapping has no entry
    pub fn map(self, follow_up: FollowUp) -> Option<f64> {
        match self {
            AxisMapping::FollowUp => Some(follow_up.value()),
            AxisMapping::Months => FOLLOW_UP_MONTHS
                .iter()
                .find(|(index, _)| *index == follow_up.value())
                .map(|(_, months)| *months),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AxisMapping::FollowUp => "Follow Up Number",
            AxisMapping::Months => "Months",
        }
    }
}

/// Named figure configurations
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Preset {
    /// Patient lines over follow-up index, stacked
    Trajectories,
    /// Patient lines over months, stacked
    TrajectoriesMonths,
    /// Baseline and final visit only, side by side
    StartEnd,
    /// Mean ±1 SD per arm over months, stacked
    MeanSd,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlotConfig {
    pub layout: Layout,
    pub style: Style,
    pub axis: AxisMapping,
    /// Keep only these follow-ups; `None` keeps all
    pub follow_ups: Option<Vec<FollowUp>>,
    pub title: String,
    pub file_name: String,
}

impl Preset {
    pub fn config(self) -> PlotConfig {
        match self {
            Preset::Trajectories => PlotConfig {
                layout: Layout::Vertical,
                style: Style::PatientLines,
                axis: AxisMapping::FollowUp,
                follow_ups: None,
                title: "Patient Scores Over Time by Survey and Treatment".to_string(),
                file_name: "all_surveys_scores_plot_combined.png".to_string(),
            },
            Preset::TrajectoriesMonths => PlotConfig {
                layout: Layout::Vertical,
                style: Style::PatientLines,
                axis: AxisMapping::Months,
                follow_ups: None,
                title: "Patient Scores Over Time by Survey and Treatment".to_string(),
                file_name: "all_surveys_scores_plot_months.png".to_string(),
            },
            Preset::StartEnd => PlotConfig {
                layout: Layout::Horizontal,
                style: Style::PatientLines,
                axis: AxisMapping::Months,
                follow_ups: Some(vec![FollowUp::BASELINE, FollowUp::from_index(4)]),
                title: "Patient Scores: Baseline (0 months) vs. End (12 months) by Survey"
                    .to_string(),
                file_name: "all_surveys_start_end_plot.png".to_string(),
            },
            Preset::MeanSd => PlotConfig {
                layout: Layout::Vertical,
                style: Style::MeanSd,
                axis: AxisMapping::Months,
                follow_ups: None,
                title: "Mean Scores Over Time by Survey and Treatment".to_string(),
                file_name: "all_surveys_scores_lines_only.png".to_string(),
            },
        }
    }
}

/// One patient's total score trajectory
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatientLine {
    pub patient: String,
    pub treatment: Treatment,
    pub points: Vec<(f64, f64)>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeanSdPoint {
    pub x: f64,
    pub summary: GroupSummary,
}

/// Per-arm mean trajectory
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArmTrajectory {
    pub treatment: Treatment,
    pub points: Vec<MeanSdPoint>,
}

/// Everything drawn in one survey panel
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Panel {
    pub survey: String,
    pub lines: Vec<PatientLine>,
    pub arms: Vec<ArmTrajectory>,
}

impl Panel {
    pub fn is_empty(&self) -> bool {
        self.lines.iter().all(|l| l.points.is_empty())
            && self.arms.iter().all(|a| a.points.is_empty())
    }

    fn x_values(&self) -> impl Iterator<Item = f64> + '_ {
        self.lines
            .iter()
            .flat_map(|l| l.points.iter().map(|(x, _)| *x))
            .chain(self.arms.iter().flat_map(|a| a.points.iter().map(|p| p.x)))
    }

    fn y_values(&self) -> impl Iterator<Item = f64> + '_ {
        let line_ys = self
            .lines
            .iter()
            .flat_map(|l| l.points.iter().map(|(_, y)| *y));
        let bar_ys = self.arms.iter().flat_map(|a| {
            a.points.iter().flat_map(|p| {
                let spread = if p.summary.std.is_nan() { 0.0 } else { p.summary.std };
                [p.summary.mean - spread, p.summary.mean + spread]
            })
        });
        line_ys.chain(bar_ys).filter(|y| y.is_finite())
    }
}

fn padded_range(values: impl Iterator<Item = f64>, min_pad: f64) -> std::ops::Range<f64> {
    let (lo, hi) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if !lo.is_finite() || !hi.is_finite() {
        return 0.0..1.0;
    }
    let pad = ((hi - lo) * 0.1).max(min_pad);
    (lo - pad)..(hi + pad)
}

/// Prepare the panels for a figure without drawing anything
pub fn build_panels(records: &[CleanedRecord], config: &PlotConfig) -> Vec<Panel> {
    let selected: Vec<CleanedRecord> = match &config.follow_ups {
        Some(keep) => records
            .iter()
            .filter(|r| keep.contains(&r.follow_up))
            .cloned()
            .collect(),
        None => records.to_vec(),
    };
    let totals = TotalsTable::build(&selected, Granularity::Total);

    totals
        .surveys()
        .into_iter()
        .map(|survey| {
            let (lines, arms) = match config.style {
                Style::PatientLines => (patient_lines(&totals, &survey, config.axis), Vec::new()),
                Style::MeanSd => (Vec::new(), arm_trajectories(&totals, &survey, config.axis)),
            };
            Panel {
                survey,
                lines,
                arms,
            }
        })
        .collect()
}

fn patient_lines(totals: &TotalsTable, survey: &str, axis: AxisMapping) -> Vec<PatientLine> {
    let mut lines: BTreeMap<(Treatment, String), Vec<(f64, f64)>> = BTreeMap::new();
    for (key, total) in totals.iter() {
        if key.survey != survey || !key.treatment.is_arm() {
            continue;
        }
        if let Some(x) = axis.map(key.follow_up) {
            lines
                .entry((key.treatment.clone(), key.patient.clone()))
                .or_default()
                .push((x, total));
        }
    }

    lines
        .into_iter()
        .map(|((treatment, patient), mut points)| {
            points.sort_by(|a, b| a.0.total_cmp(&b.0));
            PatientLine {
                patient,
                treatment,
                points,
            }
        })
        .collect()
}

fn arm_trajectories(totals: &TotalsTable, survey: &str, axis: AxisMapping) -> Vec<ArmTrajectory> {
    Treatment::ARMS
        .into_iter()
        .map(|treatment| {
            let points = totals
                .follow_ups_for(survey, &treatment)
                .into_iter()
                .filter_map(|follow_up| {
                    let x = axis.map(follow_up)?;
                    let values: Vec<f64> = totals
                        .by_patient(survey, &treatment, follow_up, None)
                        .into_values()
                        .collect();
                    Some(MeanSdPoint {
                        x,
                        summary: GroupSummary::of(&values),
                    })
                })
                .collect();
            ArmTrajectory { treatment, points }
        })
        .collect()
}

fn plot_err<E: std::fmt::Display>(e: E) -> AnalysisError {
    AnalysisError::Plot(e.to_string())
}

fn arm_color(treatment: &Treatment) -> RGBColor {
    match treatment {
        Treatment::Fmt => DARK_GREEN,
        _ => ORANGE,
    }
}

fn draw_panel<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    panel: &Panel,
    config: &PlotConfig,
) -> Result<(), AnalysisError> {
    if panel.is_empty() {
        ChartBuilder::on(area)
            .caption(format!("{} (No Data)", panel.survey), ("sans-serif", 20))
            .build_cartesian_2d(0.0..1.0, 0.0..1.0)
            .map_err(plot_err)?;
        return Ok(());
    }

    let x_range = padded_range(panel.x_values(), 0.5);
    let y_range = padded_range(panel.y_values(), 1.0);

    let mut chart = ChartBuilder::on(area)
        .caption(format!("Scores for {}", panel.survey), ("sans-serif", 20))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(x_range, y_range)
        .map_err(plot_err)?;

    chart
        .configure_mesh()
        .x_desc(config.axis.label())
        .y_desc("Total Score")
        .x_label_formatter(&|x| format_number((*x * 10.0).round() / 10.0))
        .draw()
        .map_err(plot_err)?;

    for (i, line) in panel.lines.iter().enumerate() {
        let color = Palette99::pick(i).to_rgba();
        let stroke = color.stroke_width(2);
        match line.treatment {
            Treatment::Placebo => {
                chart
                    .draw_series(DashedLineSeries::new(line.points.clone(), 6, 4, stroke))
                    .map_err(plot_err)?;
            }
            _ => {
                chart
                    .draw_series(LineSeries::new(line.points.clone(), stroke))
                    .map_err(plot_err)?;
            }
        }
        chart
            .draw_series(
                line.points
                    .iter()
                    .map(|&point| Circle::new(point, 3, color.filled())),
            )
            .map_err(plot_err)?;
    }

    if !panel.lines.is_empty() {
        // style legend: one entry per arm
        for treatment in Treatment::ARMS {
            let dashed = treatment == Treatment::Placebo;
            chart
                .draw_series(std::iter::empty::<PathElement<(f64, f64)>>())
                .map_err(plot_err)?
                .label(treatment.to_string())
                .legend(move |(x, y)| {
                    let end = if dashed { x + 8 } else { x + 20 };
                    PathElement::new(vec![(x, y), (end, y)], BLACK.stroke_width(2))
                });
        }
    }

    for arm in &panel.arms {
        let color = arm_color(&arm.treatment);
        let means: Vec<(f64, f64)> = arm.points.iter().map(|p| (p.x, p.summary.mean)).collect();
        chart
            .draw_series(LineSeries::new(means, color.stroke_width(2)))
            .map_err(plot_err)?
            .label(format!("{} Mean ±1 SD", arm.treatment))
            .legend(move |(x, y)| {
                PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2))
            });
        chart
            .draw_series(arm.points.iter().filter(|p| !p.summary.std.is_nan()).map(|p| {
                ErrorBar::new_vertical(
                    p.x,
                    p.summary.mean - p.summary.std,
                    p.summary.mean,
                    p.summary.mean + p.summary.std,
                    color.stroke_width(2),
                    10,
                )
            }))
            .map_err(plot_err)?;
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(plot_err)?;

    Ok(())
}

/// Figure size in pixels for `panels` panels
pub fn figure_size(layout: Layout, panels: usize) -> (u32, u32) {
    let panels = panels.max(1) as u32;
    match layout {
        Layout::Vertical => (1200, 500 * panels),
        Layout::Horizontal => (360 * panels, 700),
    }
}

/// Draw the figure described by `config` into `results_dir`
///
/// # Returns
/// * `Ok(path)` of the written PNG
/// * `Err(AnalysisError::NoData)` when no survey has anything to draw
pub fn render(
    records: &[CleanedRecord],
    config: &PlotConfig,
    results_dir: &Path,
) -> Result<PathBuf, AnalysisError> {
    let panels = build_panels(records, config);
    if panels.iter().all(Panel::is_empty) {
        return Err(AnalysisError::NoData(format!(
            "nothing to plot for '{}'",
            config.file_name
        )));
    }

    std::fs::create_dir_all(results_dir)?;
    let path = results_dir.join(&config.file_name);
    let size = figure_size(config.layout, panels.len());

    {
        let root = BitMapBackend::new(&path, size).into_drawing_area();
        root.fill(&WHITE).map_err(plot_err)?;
        let root = root
            .titled(&config.title, ("sans-serif", 28))
            .map_err(plot_err)?;
        let areas = match config.layout {
            Layout::Vertical => root.split_evenly((panels.len(), 1)),
            Layout::Horizontal => root.split_evenly((1, panels.len())),
        };

        for (area, panel) in areas.iter().zip(&panels) {
            if panel.is_empty() {
                tracing::info!(survey = %panel.survey, "no data to plot, skipping panel content");
            }
            draw_panel(area, panel, config)?;
        }
        root.present().map_err(plot_err)?;
    }

    tracing::info!(path = %path.display(), panels = panels.len(), "plot written");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(
        survey: &str,
        patient: &str,
        treatment: Treatment,
        follow_up: f64,
        score: f64,
    ) -> CleanedRecord {
        CleanedRecord {
            survey_name: survey.to_string(),
            q_category: "Pain".to_string(),
            patient: patient.to_string(),
            treatment,
            follow_up: FollowUp::new(follow_up).unwrap(),
            score,
        }
    }

    fn sample_records() -> Vec<CleanedRecord> {
        vec![
            record("S1", "1", Treatment::Fmt, 0.0, 10.0),
            record("S1", "1", Treatment::Fmt, 2.0, 6.0),
            record("S1", "1", Treatment::Fmt, 4.0, 4.0),
            record("S1", "2", Treatment::Fmt, 0.0, 12.0),
            record("S1", "2", Treatment::Fmt, 2.0, 8.0),
            record("S1", "3", Treatment::Placebo, 0.0, 9.0),
            record("S1", "3", Treatment::Placebo, 5.0, 9.0),
            record("S2", "1", Treatment::Fmt, 1.0, 3.0),
            record("S2", "9", Treatment::Other("SHAM".to_string()), 1.0, 3.0),
        ]
    }

    #[test]
    fn test_months_mapping() {
        let months: Vec<Option<f64>> = [0.0, 1.0, 2.0, 3.0, 4.0, 5.0]
            .iter()
            .map(|&f| AxisMapping::Months.map(FollowUp::new(f).unwrap()))
            .collect();
        assert_eq!(
            months,
            vec![Some(0.0), Some(1.0), Some(3.0), Some(6.0), Some(12.0), None]
        );
        assert_eq!(AxisMapping::FollowUp.map(FollowUp::new(5.0).unwrap()), Some(5.0));
    }

    #[test]
    fn test_patient_lines_over_months() {
        let config = Preset::TrajectoriesMonths.config();
        let panels = build_panels(&sample_records(), &config);
        assert_eq!(panels.len(), 2);

        let s1 = &panels[0];
        assert_eq!(s1.lines.len(), 3);
        assert_eq!(s1.lines[0].patient, "1");
        assert_eq!(s1.lines[0].points, vec![(0.0, 10.0), (3.0, 6.0), (12.0, 4.0)]);
        // follow-up 5 has no month mapping
        assert_eq!(s1.lines[2].treatment, Treatment::Placebo);
        assert_eq!(s1.lines[2].points, vec![(0.0, 9.0)]);

        // unrecognised arms are not drawn
        assert_eq!(panels[1].lines.len(), 1);
    }

    #[test]
    fn test_start_end_restriction() {
        let config = Preset::StartEnd.config();
        assert_eq!(config.layout, Layout::Horizontal);
        let panels = build_panels(&sample_records(), &config);

        // S2 only has follow-up 1 and disappears entirely
        assert_eq!(panels.len(), 1);
        let first = &panels[0].lines[0];
        assert_eq!(first.points, vec![(0.0, 10.0), (12.0, 4.0)]);
    }

    #[test]
    fn test_mean_sd_trajectories() {
        let config = Preset::MeanSd.config();
        let panels = build_panels(&sample_records(), &config);
        let fmt = &panels[0].arms[0];
        assert_eq!(fmt.treatment, Treatment::Fmt);

        let xs: Vec<f64> = fmt.points.iter().map(|p| p.x).collect();
        assert_eq!(xs, vec![0.0, 3.0, 12.0]);
        assert_eq!(fmt.points[0].summary.mean, 11.0);
        assert!((fmt.points[0].summary.std - std::f64::consts::SQRT_2).abs() < 1e-12);
        assert!(fmt.points[2].summary.std.is_nan());
        assert!(panels[0].lines.is_empty());
    }

    #[test]
    fn test_render_without_data() {
        let dir = tempfile::tempdir().unwrap();
        let config = Preset::StartEnd.config();
        let records = vec![record("S1", "1", Treatment::Fmt, 1.0, 3.0)];
        let result = render(&records, &config, dir.path());
        assert!(matches!(result, Err(AnalysisError::NoData(_))));
    }

    #[test]
    fn test_render_every_preset() {
        let dir = tempfile::tempdir().unwrap();
        let presets = [
            Preset::Trajectories,
            Preset::TrajectoriesMonths,
            Preset::StartEnd,
            Preset::MeanSd,
        ];
        for preset in presets {
            let config = preset.config();
            let path = render(&sample_records(), &config, dir.path()).unwrap();
            assert_eq!(path, dir.path().join(&config.file_name));
            let written = std::fs::metadata(&path).unwrap();
            assert!(written.len() > 0, "{:?} wrote an empty file", preset);
        }
    }

    #[test]
    fn test_figure_size() {
        assert_eq!(figure_size(Layout::Vertical, 3), (1200, 1500));
        assert_eq!(figure_size(Layout::Horizontal, 4), (1440, 700));
        assert_eq!(figure_size(Layout::Vertical, 0), (1200, 500));
    }
}
