use anyhow::{Context, Result};
use std::time::Instant;
use tracing::info;
use voltset_cli::common::open_oracle;
use voltset_cli::SampleArgs;
use voltset_scenarios::{
    load_config_from_path, manifest_path_for, write_manifest, CsvSink, SampleManifest, Sampler,
    SamplerConfig,
};

/// Run the sampler into `args.out`.
///
/// Rows reach the CSV as they are produced, so an interrupted run leaves a
/// valid dataset prefix behind. The summary and manifest are written only
/// after the run completes.
pub fn handle(args: &SampleArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => load_config_from_path(path)?,
        None => SamplerConfig::default(),
    };
    if let Some(out) = &args.out {
        config.output = out.clone();
    }
    if let Some(scenarios) = args.scenarios {
        config.scenarios = scenarios;
    }
    if let Some(seed) = args.seed {
        config.seed = Some(seed);
    }

    let mut sampler = Sampler::new(config).context("invalid sampler configuration")?;
    let mut oracle = open_oracle(&args.oracle)?;

    let output = sampler.config().output.clone();
    let mut sink = CsvSink::create(&output)
        .with_context(|| format!("creating dataset '{}'", output.display()))?;
    let start = Instant::now();
    let summary = sampler
        .run(oracle.as_mut(), &mut sink)
        .context("sampling scenarios")?;
    sink.finish()
        .with_context(|| format!("finalizing dataset '{}'", output.display()))?;
    info!(
        "Sampled {} scenario(s) in {:.2}s",
        summary.attempted,
        start.elapsed().as_secs_f64()
    );

    println!("Dataset written to {}", output.display());
    println!("  requested : {}", summary.requested);
    println!("  attempted : {}", summary.attempted);
    println!("  retained  : {}", summary.retained);
    println!("  skipped   : {}", summary.skipped);
    if summary.interrupted {
        println!("  (interrupted before all scenarios ran)");
    }

    if !args.no_manifest {
        let manifest = SampleManifest::new(&output, sampler.seed(), sampler.config(), &summary);
        let path = manifest_path_for(&output);
        write_manifest(&path, &manifest)?;
        println!("Manifest written to {}", path.display());
    }
    Ok(())
}
