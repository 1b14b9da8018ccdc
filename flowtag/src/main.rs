mod args;
mod classifier;
mod error;
mod lookup;
mod output;
mod pipeline;
mod protocols;
mod records;
mod tests;

use std::{fs::File, path::Path};

use args::{Cli, Commands, ConfigFile};
use clap::Parser;
use env_logger::{Env, Target};
use log::{error, info};
use protocols::ProtocolTable;

fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.log_file.as_deref()) {
        eprintln!("Error opening log file: {:?}", e);
        std::process::exit(1);
    }

    match cli.command {
        Commands::Run { config, output } => {
            // If a config file is provided, it replaces the command line options
            let (config, output) = if let Some(config_path) = cli.config_file {
                match confy::load_path::<ConfigFile>(&config_path) {
                    Ok(cfg_file) => (cfg_file.config, cfg_file.output),
                    Err(e) => {
                        error!("Error loading configuration file: {:?}", e);
                        std::process::exit(1);
                    }
                }
            } else {
                (config, output)
            };

            match pipeline::run(&config, &output) {
                Ok(_) => info!("Program finished execution"),
                Err(e) => {
                    error!("Error: {:#}", e);
                    std::process::exit(1);
                }
            }
        }
        Commands::Protocols { protocols } => {
            let table = match protocols {
                Some(path) => ProtocolTable::from_path(&path),
                None => ProtocolTable::iana(),
            };
            match table {
                Ok(table) => {
                    for (number, name) in table.iter() {
                        println!("{},{}", number, name);
                    }
                }
                Err(e) => {
                    error!("Error: {}", e);
                    std::process::exit(1);
                }
            }
        }
    }
}

/// Logs at `info` unless `RUST_LOG` says otherwise, to stderr or `log_file`.
fn init_logging(log_file: Option<&Path>) -> std::io::Result<()> {
    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or("info"));
    if let Some(path) = log_file {
        let file = File::options().create(true).append(true).open(path)?;
        builder.target(Target::Pipe(Box::new(file)));
    }
    builder.init();
    Ok(())
}
