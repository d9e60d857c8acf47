use aq_harvest::{read_extract, HarvestConfig, Harvester};
use std::env;
use std::error::Error;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    configure_polars_display();

    let config = HarvestConfig::from_env()?;
    let harvester = Harvester::new(config)?;

    let targets = ["Bocatoma", "ENAP Price", "JUNJI", "Indura"];
    let report = harvester
        .run()
        .localities(targets.iter().map(|t| t.to_string()).collect())
        .max_records_per_sensor(500)
        .call()
        .await?;

    println!("Resolved localities:");
    for (target, locations) in &report.resolution.matches {
        for location in locations {
            println!("  {:<12} -> {}", target, location.label());
        }
    }
    if !report.resolution.unresolved.is_empty() {
        println!("Unresolved: {:?}", report.resolution.unresolved);
    }
    for failure in &report.failures {
        println!(
            "Skipped {} {} (sensor {:?}): {}",
            failure.stage, failure.location_id, failure.sensor_id, failure.message
        );
    }
    println!("{:#?}", report.export.summary.locality_counts());

    let extract = read_extract(&report.export.paths.records_parquet)?.collect()?;
    println!("{:#?}", extract);

    Ok(())
}

fn configure_polars_display() {
    // show every column
    env::set_var("POLARS_FMT_MAX_COLS", "-1");
    env::set_var("POLARS_FMT_MAX_ROWS", "20");
}
