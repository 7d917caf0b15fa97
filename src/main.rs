use clap::Parser;
use dirmirror::cli::Cli;
use dirmirror::cli::commands::{config, run};
use dirmirror::{Settings, logging};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    let mut settings = Settings::load(cli.config.as_deref()).unwrap_or_else(|e| {
        let path = Settings::config_path(cli.config.as_deref());
        eprintln!("Configuration error in {}: {e}", path.display());
        std::process::exit(1);
    });
    if let Err(e) = cli.apply_overrides(&mut settings) {
        e.exit();
    }

    logging::init_with_config(&settings.logging);

    let result = if cli.print_config {
        config::run_config(&settings)
    } else if cli.once {
        run::run_once(&settings).await
    } else {
        run::run_watch(&settings).await
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
