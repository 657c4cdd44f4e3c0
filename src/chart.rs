use crate::structures::ReasonCount;
use anyhow::Result;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};

const CHART_WIDTH: u32 = 900;
const CHART_BASE_HEIGHT: u32 = 140;
const ROW_HEIGHT: u32 = 36;
const EMPTY_CHART_HEIGHT: u32 = 480;
const BAR_COLOR: RGBColor = RGBColor(31, 119, 180);

pub const CHART_TITLE: &str = "Mismatches by SI reason code";
pub const EMPTY_CHART_TEXT: &str = "No mismatches detected";

/// Horizontal bar chart of mismatch counts per reason code, as an SVG string.
///
/// Rows are drawn in the given order from the top, so a count-descending
/// input puts the largest bar first.
pub fn render_reason_chart(by_reason: &[ReasonCount]) -> Result<String> {
    if by_reason.is_empty() {
        return render_empty_chart();
    }

    let rows = by_reason.len() as i32;
    let max_count = by_reason.iter().map(|r| r.count).max().unwrap_or(0);
    // headroom so the longest bar does not touch the frame
    let x_max = max_count + max_count / 10 + 1;
    let height = CHART_BASE_HEIGHT + ROW_HEIGHT * by_reason.len() as u32;

    // row k (from the top) sits in segment rows - 1 - k
    let label = |v: &SegmentValue<i32>| match v {
        SegmentValue::Exact(i) | SegmentValue::CenterOf(i) => usize::try_from(rows - 1 - *i)
            .ok()
            .and_then(|k| by_reason.get(k))
            .map(|r| r.si_reason_code.clone())
            .unwrap_or_default(),
        SegmentValue::Last => String::new(),
    };

    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (CHART_WIDTH, height)).into_drawing_area();
        root.fill(&WHITE)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(CHART_TITLE, ("sans-serif", 22))
            .margin(10)
            .x_label_area_size(50)
            .y_label_area_size(160)
            .build_cartesian_2d(0u64..x_max, (0..rows).into_segmented())?;

        chart
            .configure_mesh()
            .disable_y_mesh()
            .y_labels(by_reason.len() + 1)
            .y_label_formatter(&label)
            .x_desc("Count")
            .y_desc("SI reason code")
            .draw()?;

        chart.draw_series(by_reason.iter().enumerate().map(|(k, r)| {
            let y = rows - 1 - k as i32;
            let mut bar = Rectangle::new(
                [(0, SegmentValue::Exact(y)), (r.count, SegmentValue::Exact(y + 1))],
                BAR_COLOR.filled(),
            );
            bar.set_margin(4, 4, 0, 0);
            bar
        }))?;

        let count_style = TextStyle::from(("sans-serif", 14).into_font())
            .pos(Pos::new(HPos::Left, VPos::Center));
        chart.draw_series(by_reason.iter().enumerate().map(|(k, r)| {
            let y = rows - 1 - k as i32;
            Text::new(
                format!(" {}", r.count),
                (r.count, SegmentValue::CenterOf(y)),
                count_style.clone(),
            )
        }))?;

        root.present()?;
    }
    Ok(svg)
}

/// Placeholder drawn when the file has no mismatches.
pub fn render_empty_chart() -> Result<String> {
    let mut svg = String::new();
    {
        let root =
            SVGBackend::with_string(&mut svg, (CHART_WIDTH, EMPTY_CHART_HEIGHT)).into_drawing_area();
        root.fill(&WHITE)?;

        let style = TextStyle::from(("sans-serif", 24).into_font())
            .pos(Pos::new(HPos::Center, VPos::Center));
        let centre = ((CHART_WIDTH / 2) as i32, (EMPTY_CHART_HEIGHT / 2) as i32);
        root.draw(&Text::new(EMPTY_CHART_TEXT, centre, style))?;

        root.present()?;
    }
    Ok(svg)
}

pub fn looks_like_svg(svg: &str) -> bool {
    let trimmed = svg.trim();
    trimmed.contains("<svg")
        && trimmed.ends_with("</svg>")
        && trimmed.contains("<rect")
        && trimmed.contains("<text")
}
