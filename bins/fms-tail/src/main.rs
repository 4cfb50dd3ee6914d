mod cmd;

use clap::Parser;
use cmd::config::{Effective, TailArgs};

#[derive(Parser)]
#[command(name = "fms-tail", about = "Чтение телеметрии из Kafka topic'а в stdout")]
struct Cli {
    #[command(flatten)]
    args: TailArgs,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    let eff = match Effective::new(&cli.args) {
        Ok(e) => e,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = cmd::tail::run(&eff).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
