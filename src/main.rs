use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    dataset_pulse::app::run_dashboard(std::env::args().skip(1))
}
