use workload_risk::{
    GroupSummary, McmcConfig, RiskRequest, fit_and_summarize, render_risk_tables,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let request = RiskRequest {
        mcmc: McmcConfig {
            seed: 2_026,
            ..McmcConfig::default()
        },
        ..RiskRequest::new(
            GroupSummary::new(100, 15, 75.0),
            GroupSummary::new(100, 30, 95.0),
            0.30,
        )
    };

    let analysis = fit_and_summarize(&request)?;
    let tables = render_risk_tables(&analysis);

    println!(
        "Workload risk fit: {} observations, {} injured, centering point {}",
        analysis.data.n_observations,
        analysis.data.n_events,
        analysis.posterior.prior.centering_point()
    );
    println!("\nPosterior parameters\n{}", tables.parameters);
    println!("\nDerived effects\n{}", tables.effects);
    println!("\nRisk curve\n{}", tables.risk_curve);
    println!("\nSampler diagnostics\n{}", tables.diagnostics);

    let odds = &analysis.summary.odds_ratio;
    println!(
        "\nP(odds ratio per +{} > 1) = {:.3}",
        analysis.summary.odds_ratio_increment,
        odds.probability_above(1.0)
    );
    for bin in odds.histogram(12)? {
        println!(
            "[{:.3}, {:.3}) {}",
            bin.lower,
            bin.upper,
            "#".repeat(bin.count / 20)
        );
    }

    Ok(())
}
