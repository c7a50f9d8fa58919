// The tanoak CLI.
// Validates a prover database and shows what is configured in it.

use clap::Parser;
use serde::Serialize;
use tanoak::provers::load_provers;

#[derive(Parser)]
struct Args {
    // Path to the prover database file.
    #[clap(default_value = "provers.dat")]
    database: String,

    // List the configured provers.
    #[clap(long)]
    list: bool,

    // Dump the configured provers as YAML.
    #[clap(long)]
    yaml: bool,
}

#[derive(Serialize)]
struct ProverInfo {
    name: String,
    label: String,
    path: String,
    format: String,
}

fn main() {
    color_backtrace::install();
    let args = Args::parse();

    let provers = match load_provers(std::path::Path::new(&args.database)) {
        Ok(provers) => provers,
        Err(e) => {
            println!("{}", e);
            std::process::exit(1);
        }
    };

    if args.yaml {
        let info: Vec<ProverInfo> = provers
            .iter()
            .map(|p| ProverInfo {
                name: p.name.clone(),
                label: p.label.clone(),
                path: p.path.clone(),
                format: p.format.to_string(),
            })
            .collect();
        match serde_yaml::to_string(&info) {
            Ok(text) => print!("{}", text),
            Err(e) => {
                println!("Error: {}", e);
                std::process::exit(1);
            }
        }
        return;
    }

    if args.list {
        for p in &provers {
            println!("{}: {} ({}, {})", p.name, p.label, p.path, p.format);
        }
        return;
    }

    println!(
        "{}: {} valid prover{} in {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        provers.len(),
        if provers.len() == 1 { "" } else { "s" },
        args.database
    );
}
