//! Text rendering of wealth snapshots.
//!
//! Each frame is a status line followed by a bar chart of every agent's
//! wealth and, when history is recorded, a chart of the current leader's
//! wealth over time. Populations wider than the chart are downsampled by
//! taking the maximum of each bucket, so the leader is always visible.
//!
//! The chart's y-axis does not start at total wealth. It steps through
//! total/8, total/4, total/2 and total, picking the smallest step that
//! still fits the tallest bar, so early rounds are not a flat line.

use tokio::sync::mpsc;
use tracing::{debug, info};
use yardsale_core::config::RenderConfig;
use yardsale_types::{Wealth, WealthSnapshot};

/// Smallest axis step that fits `peak`, out of total/8, total/4, total/2
/// and total. Never zero.
#[allow(clippy::arithmetic_side_effects)]
pub fn axis_max(total: Wealth, peak: Wealth) -> Wealth {
    [total / 8, total / 4, total / 2]
        .into_iter()
        .find(|&step| step >= peak)
        .unwrap_or(total)
        .max(1)
}

/// Downsample `values` to at most `width` columns, keeping each bucket's
/// maximum.
fn columns(values: &[Wealth], width: usize) -> Vec<Wealth> {
    if width == 0 || values.is_empty() {
        return Vec::new();
    }
    let bucket = values.len().div_ceil(width);
    values
        .chunks(bucket)
        .map(|chunk| chunk.iter().copied().max().unwrap_or(0))
        .collect()
}

/// Height in rows of a bar for `value` on an axis topping out at `axis`.
fn bar_height(value: Wealth, axis: Wealth, height: usize) -> usize {
    let rows = u128::try_from(height).unwrap_or(u128::MAX);
    let scaled = u128::from(value)
        .saturating_mul(rows)
        .checked_div(u128::from(axis))
        .unwrap_or(0);
    usize::try_from(scaled).unwrap_or(height).min(height)
}

/// Value represented by the top of `row` on an axis of `height` rows.
fn row_value(row: usize, axis: Wealth, height: usize) -> Wealth {
    let row = u128::try_from(row).unwrap_or(u128::MAX);
    let rows = u128::try_from(height).unwrap_or(u128::MAX);
    let value = u128::from(axis)
        .saturating_mul(row)
        .checked_div(rows)
        .unwrap_or(0);
    Wealth::try_from(value).unwrap_or(axis)
}

/// Render `values` as a bar chart `height` rows tall, with a labelled
/// y-axis and a baseline.
pub fn bar_chart(values: &[Wealth], axis: Wealth, width: usize, height: usize) -> Vec<String> {
    let bars: Vec<usize> = columns(values, width)
        .into_iter()
        .map(|value| bar_height(value, axis, height))
        .collect();
    let middle_row = height.div_ceil(2);
    let top = axis.to_string();
    let middle = row_value(middle_row, axis, height).to_string();
    let label_width = top.len();

    let mut lines = Vec::with_capacity(height.saturating_add(1));
    for row in (1..=height).rev() {
        let label = if row == height {
            top.as_str()
        } else if row == middle_row {
            middle.as_str()
        } else {
            ""
        };
        let cells: String = bars
            .iter()
            .map(|&bar| if bar >= row { '#' } else { ' ' })
            .collect();
        lines.push(format!("{label:>label_width$} |{cells}"));
    }
    lines.push(format!("{:>label_width$} +{}", 0, "-".repeat(bars.len())));
    lines
}

/// One-line summary of a snapshot.
pub fn status_line(snapshot: &WealthSnapshot) -> String {
    format!(
        "round {} | plays {} ({} per round) | population {} | total ${} | richest ${} | {} ms",
        snapshot.round,
        snapshot.total_plays,
        snapshot.plays_per_round,
        snapshot.population,
        snapshot.total_wealth,
        snapshot.max_wealth(),
        snapshot.elapsed_ms,
    )
}

/// Render a full frame: status line, population chart, and leader chart.
pub fn render_frame(snapshot: &WealthSnapshot, config: &RenderConfig) -> String {
    let mut lines = vec![status_line(snapshot)];
    let axis = axis_max(snapshot.total_wealth, snapshot.max_wealth());
    lines.extend(bar_chart(
        &snapshot.wealth,
        axis,
        config.chart_width,
        config.chart_height,
    ));

    if let Some(leader) = &snapshot.leader {
        let peak = leader.history.iter().copied().max().unwrap_or(0);
        lines.push(format!(
            "agent {} wealth over {} exchanges",
            leader.agent,
            leader.history.len().saturating_sub(1)
        ));
        lines.extend(bar_chart(
            &leader.history,
            axis_max(snapshot.total_wealth, peak),
            config.chart_width,
            config.chart_height,
        ));
    }
    lines.join("\n")
}

/// Draw frames until the sending side closes. Returns the number of frames
/// drawn.
///
/// Status lines go to the log; charts go to stderr so that stdout carries
/// only the final report.
pub async fn run_renderer(mut frames: mpsc::Receiver<WealthSnapshot>, config: &RenderConfig) -> u64 {
    let mut drawn: u64 = 0;
    while let Some(snapshot) = frames.recv().await {
        info!(
            round = snapshot.round,
            total_plays = snapshot.total_plays,
            richest = snapshot.max_wealth(),
            elapsed_ms = snapshot.elapsed_ms,
            "Round complete"
        );
        eprintln!("{}", render_frame(&snapshot, config));
        drawn = drawn.saturating_add(1);
    }
    debug!(drawn, "Renderer finished");
    drawn
}

/// Draw the frame of the halting round. Returns the text drawn.
pub fn draw_final(snapshot: &WealthSnapshot, config: &RenderConfig) -> String {
    let frame = render_frame(snapshot, config);
    info!(round = snapshot.round, richest = snapshot.max_wealth(), "Final frame");
    eprintln!("{frame}");
    frame
}
