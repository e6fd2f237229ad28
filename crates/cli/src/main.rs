// CLI modules
mod cli;

use clap::{Parser, Subcommand};
use cli::{
    args::Args, op::Op, Create, Delete, Generate, Get, Grant, Id, Import, Init, List, Transfer,
    Version,
};
use secm_cli::state::{AppState, Config};

command_enum! {
    (Init, Init),
    (Id, Id),
    (Generate, Generate),
    (Create, Create),
    (Get, Get),
    (List, List),
    (Delete, Delete),
    (Grant, Grant),
    (Import, Import),
    (Transfer, Transfer),
    (Version, Version),
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // A profile that does not exist yet still logs with defaults
    let config = AppState::load(args.config_path.clone(), &args.profile)
        .map(|state| state.config)
        .unwrap_or_else(|_| Config::default());
    let guards = secm_cli::process::init_logging(&config);

    let ctx = cli::op::OpContext::new(args.config_path, args.profile);

    let code = match args.command.execute(&ctx).await {
        Ok(output) => {
            let output = output.to_string();
            if !output.is_empty() {
                println!("{}", output);
            }
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    };

    // flush buffered log lines before exiting
    drop(guards);
    std::process::exit(code);
}
