use workload_risk::{
    GroupSummary, LaplaceSampler, McmcConfig, NutsSampler, PosteriorSampler, ReliabilityWarning,
    RiskModelError, RiskRequest, SamplerFailure, SamplerKind, WorkloadGroup, build_observations,
    fit_and_summarize, render_risk_tables, specify, summarize_convergence,
};

fn scenario_observations() -> Vec<workload_risk::Observation> {
    build_observations(
        GroupSummary::new(100, 15, 75.0),
        GroupSummary::new(100, 30, 95.0),
    )
    .expect("counts are valid")
}

fn short_config(seed: u64) -> McmcConfig {
    McmcConfig {
        warmup: 300,
        draws: 300,
        seed,
        ..McmcConfig::default()
    }
}

#[test]
fn dataset_construction_is_deterministic() {
    assert_eq!(scenario_observations(), scenario_observations());
}

#[test]
fn seeded_fits_are_reproducible() {
    let observations = scenario_observations();
    let prior = specify(0.30, 85.0, 1.0, 1.0).expect("prior is valid");

    let first = NutsSampler::new(short_config(7))
        .sample(&observations, &prior)
        .expect("sampling works");
    let second = NutsSampler::new(short_config(7))
        .sample(&observations, &prior)
        .expect("sampling works");
    let other = NutsSampler::new(short_config(8))
        .sample(&observations, &prior)
        .expect("sampling works");

    assert_eq!(first.draws, second.draws);
    assert_ne!(first.draws, other.draws);
    assert_eq!(first.diagnostics.step_sizes, second.diagnostics.step_sizes);
}

#[test]
fn laplace_backend_satisfies_scenario() {
    let request = RiskRequest {
        backend: SamplerKind::Laplace,
        mcmc: short_config(11),
        ..RiskRequest::new(
            GroupSummary::new(100, 15, 75.0),
            GroupSummary::new(100, 30, 95.0),
            0.30,
        )
    };
    let analysis = fit_and_summarize(&request).expect("laplace fit works");
    let slope = analysis
        .posterior
        .report
        .posterior_summary
        .expect("summary exists")
        .slope;
    assert!(slope.mean > 0.02);
    assert!(analysis.summary.risk_difference.summary().mean > 0.0);
    assert_eq!(
        analysis.posterior.report.diagnostics.backend,
        SamplerKind::Laplace
    );
}

#[test]
fn nuts_and_laplace_agree_on_scenario() {
    let observations = scenario_observations();
    let prior = specify(0.30, 85.0, 1.0, 1.0).expect("prior is valid");
    let config = McmcConfig {
        warmup: 500,
        draws: 1_000,
        ..McmcConfig::default()
    };

    let nuts = NutsSampler::new(config)
        .sample(&observations, &prior)
        .expect("nuts works");
    let laplace = LaplaceSampler::new(config)
        .sample(&observations, &prior)
        .expect("laplace works");

    let nuts_slope = workload_risk::summarize_posterior(&nuts.draws).slope;
    let laplace_slope = workload_risk::summarize_posterior(&laplace.draws).slope;
    assert!((nuts_slope.mean - laplace_slope.mean).abs() < 0.005);
    assert!((nuts_slope.std_dev - laplace_slope.std_dev).abs() < 0.004);
}

#[test]
fn histogram_and_convergence_cover_all_draws() {
    let request = RiskRequest {
        mcmc: short_config(5),
        ..RiskRequest::new(
            GroupSummary::new(60, 9, 70.0),
            GroupSummary::new(60, 21, 100.0),
            0.20,
        )
    };
    let analysis = fit_and_summarize(&request).expect("fit works");
    let bins = analysis
        .summary
        .odds_ratio
        .histogram(20)
        .expect("histogram works");
    assert_eq!(bins.len(), 20);
    assert_eq!(
        bins.iter().map(|bin| bin.count).sum::<usize>(),
        analysis.posterior.draws.len()
    );

    let convergence = summarize_convergence(&analysis.posterior.draws).expect("convergence works");
    assert!(convergence.max_split_rhat < 1.1);
    assert!(convergence.intercept_ess <= 600.0);
    assert!(convergence.slope_ess <= 600.0);
}

#[test]
fn reliability_warnings_do_not_block_fit() {
    let request = RiskRequest {
        mcmc: short_config(3),
        ..RiskRequest::new(
            GroupSummary::new(40, 0, 75.0),
            GroupSummary::new(40, 6, 95.0),
            0.10,
        )
    };
    let analysis = fit_and_summarize(&request).expect("fit works with warnings");
    assert_eq!(
        analysis.warnings,
        vec![ReliabilityWarning::NoEventsInGroup {
            group: WorkloadGroup::Low
        }]
    );
    let tables = render_risk_tables(&analysis);
    assert!(tables.diagnostics.contains("warning"));
}

#[test]
fn invalid_schedule_is_rejected() {
    let request = RiskRequest {
        mcmc: McmcConfig {
            target_accept: 1.5,
            ..McmcConfig::default()
        },
        ..RiskRequest::new(
            GroupSummary::new(100, 15, 75.0),
            GroupSummary::new(100, 30, 95.0),
            0.30,
        )
    };
    assert!(matches!(
        fit_and_summarize(&request),
        Err(RiskModelError::InvalidConfig(_))
    ));
}

#[test]
fn untuned_sampler_reports_excessive_divergences() {
    let request = RiskRequest {
        mcmc: McmcConfig {
            warmup: 1,
            draws: 4,
            ..McmcConfig::default()
        },
        ..RiskRequest::new(
            GroupSummary::new(100, 15, 75.0),
            GroupSummary::new(100, 30, 95.0),
            0.30,
        )
    };
    let err = fit_and_summarize(&request).expect_err("untuned sampler should diverge");
    assert!(
        matches!(
            err,
            RiskModelError::SamplerDivergence(SamplerFailure::ExcessiveDivergences {
                transitions: 8,
                ..
            })
        ),
        "unexpected error {err:?}"
    );
}
