use agora_core::StockReport;
use agora_runner::{Simulation, SimulationConfig};

#[tokio::main]
async fn main() {
    env_logger::init();

    let simulation = Simulation::new(SimulationConfig::default());
    match simulation.run().await {
        Ok(results) => {
            println!("{}", StockReport::CSV_HEADER);
            for report in &results.reports {
                println!("{report}");
            }
            eprintln!(
                "{} purchases, {} units, {:.2} spent",
                results.purchases.len(),
                results.total_units_sold(),
                results.total_spent()
            );
        }
        Err(e) => {
            eprintln!("simulation failed: {e}");
            std::process::exit(1);
        }
    }
}
