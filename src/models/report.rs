/////////////////////////////////////////////////////////////////////////////////////////////\
//
// Plain-text tables for a finished workload-risk analysis.
//
/////////////////////////////////////////////////////////////////////////////////////////////

//! # Report rendering
//!
//! Renders parameter summaries, derived effects, the risk curve and sampler
//! diagnostics as `comfy_table` strings. Intervals that exclude the null value
//! are highlighted.

use comfy_table::{
    Attribute, Cell, Color, ContentArrangement, Table, presets::UTF8_FULL_CONDENSED,
};

use super::logistic::{
    IntervalSummary, ParameterSummary, SamplerKind, ScalarPosterior, summarize_posterior,
};
use crate::workflow::RiskAnalysis;

/// Rendered tables, one string per section.
#[derive(Debug, Clone)]
pub struct RiskTables {
    pub parameters: String,
    pub effects: String,
    pub risk_curve: String,
    pub diagnostics: String,
}

#[must_use]
pub fn render_risk_tables(analysis: &RiskAnalysis) -> RiskTables {
    let posterior = &analysis.posterior;
    let summary = posterior
        .report
        .posterior_summary
        .unwrap_or_else(|| summarize_posterior(&posterior.draws));
    let convergence = posterior.report.diagnostics.convergence;

    let mut parameter_table =
        make_table(&["parameter", "mean", "sd", "2.5%", "50%", "97.5%", "rhat", "ess"]);
    let rows = [
        (
            "intercept",
            summary.intercept,
            convergence.map(|c| (c.intercept_split_rhat, c.intercept_ess)),
        ),
        (
            "slope",
            summary.slope,
            convergence.map(|c| (c.slope_split_rhat, c.slope_ess)),
        ),
    ];
    for (name, parameter, mixing) in rows {
        add_parameter_row(&mut parameter_table, name, &parameter, mixing);
    }

    let result = &analysis.summary;
    let mut effect_table = make_table(&["quantity", "mean", "2.5%", "50%", "97.5%", "P(> null)"]);
    add_effect_row(
        &mut effect_table,
        &format!("odds ratio per +{}", result.odds_ratio_increment),
        &result.odds_ratio,
        1.0,
    );
    add_effect_row(
        &mut effect_table,
        &format!(
            "risk difference {} vs {}",
            result.high_workload, result.low_workload
        ),
        &result.risk_difference,
        0.0,
    );

    let mut curve_table = make_table(&["workload", "mean risk", "2.5%", "97.5%"]);
    for point in &result.risk_curve {
        curve_table.add_row(vec![
            Cell::new(format!("{:.1}", point.workload)),
            Cell::new(format!("{:.4}", point.mean_risk)),
            Cell::new(format!("{:.4}", point.lower_ci)),
            Cell::new(format!("{:.4}", point.upper_ci)),
        ]);
    }

    let diagnostics = &posterior.report.diagnostics;
    let mut diagnostics_table = make_table(&["diagnostic", "value"]);
    let backend = match diagnostics.backend {
        SamplerKind::Nuts => "nuts",
        SamplerKind::Laplace => "laplace",
    };
    diagnostics_table.add_row(vec![Cell::new("backend"), Cell::new(backend)]);
    diagnostics_table.add_row(vec![
        Cell::new("draws"),
        Cell::new(format!(
            "{} chains x {}",
            diagnostics.chains, diagnostics.draws_per_chain
        )),
    ]);
    diagnostics_table.add_row(vec![
        Cell::new("observations"),
        Cell::new(format!(
            "{} ({} injured)",
            analysis.data.n_observations, analysis.data.n_events
        )),
    ]);
    if diagnostics.backend == SamplerKind::Nuts {
        let transitions = diagnostics.transitions;
        diagnostics_table.add_row(vec![
            Cell::new("divergent transitions"),
            Cell::new(format!(
                "{} / {}",
                transitions.divergent, transitions.transitions
            )),
        ]);
        diagnostics_table.add_row(vec![
            Cell::new("mean accept prob"),
            Cell::new(format!("{:.3}", transitions.mean_accept_prob())),
        ]);
        diagnostics_table.add_row(vec![
            Cell::new("mean tree depth"),
            Cell::new(format!("{:.2}", transitions.mean_tree_depth())),
        ]);
        let steps = diagnostics
            .step_sizes
            .iter()
            .map(|step| format!("{step:.4}"))
            .collect::<Vec<_>>()
            .join(", ");
        diagnostics_table.add_row(vec![Cell::new("step sizes"), Cell::new(steps)]);
    }
    if let Some(convergence) = convergence {
        diagnostics_table.add_row(vec![
            Cell::new("max split-R-hat"),
            Cell::new(format!("{:.4}", convergence.max_split_rhat)),
        ]);
    }
    for warning in &analysis.warnings {
        diagnostics_table.add_row(vec![
            Cell::new("warning").fg(Color::Yellow),
            Cell::new(warning.to_string()),
        ]);
    }

    RiskTables {
        parameters: parameter_table.to_string(),
        effects: effect_table.to_string(),
        risk_curve: curve_table.to_string(),
        diagnostics: diagnostics_table.to_string(),
    }
}

fn add_parameter_row(
    table: &mut Table,
    name: &str,
    parameter: &ParameterSummary,
    mixing: Option<(f64, f64)>,
) {
    let excludes_zero = parameter.q025 > 0.0 || parameter.q975 < 0.0;
    let (rhat, ess) = mixing.map_or_else(
        || ("-".to_string(), "-".to_string()),
        |(rhat, ess)| (format!("{rhat:.3}"), format!("{ess:.0}")),
    );
    table.add_row(vec![
        Cell::new(name),
        highlight_cell(parameter.mean, 4, excludes_zero),
        Cell::new(format!("{:.4}", parameter.std_dev)),
        Cell::new(format!("{:.4}", parameter.q025)),
        Cell::new(format!("{:.4}", parameter.q50)),
        Cell::new(format!("{:.4}", parameter.q975)),
        Cell::new(rhat),
        Cell::new(ess),
    ]);
}

fn add_effect_row(table: &mut Table, name: &str, posterior: &ScalarPosterior, null_value: f64) {
    let IntervalSummary {
        mean,
        q025,
        q50,
        q975,
    } = posterior.summary();
    let excludes_null = q025 > null_value || q975 < null_value;
    table.add_row(vec![
        Cell::new(name),
        highlight_cell(mean, 4, excludes_null),
        Cell::new(format!("{q025:.4}")),
        Cell::new(format!("{q50:.4}")),
        Cell::new(format!("{q975:.4}")),
        Cell::new(format!("{:.3}", posterior.probability_above(null_value))),
    ]);
}

fn make_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(headers.iter().map(|h| Cell::new(*h)).collect::<Vec<_>>());
    table
}

fn highlight_cell(value: f64, precision: usize, highlight: bool) -> Cell {
    if highlight {
        Cell::new(format!("{value:.precision$}"))
            .fg(Color::Green)
            .add_attribute(Attribute::Bold)
    } else {
        Cell::new(format!("{value:.precision$}"))
    }
}
