use std::path::PathBuf;

use clap::Parser;

use service_host::helloworld::HelloWorld;
use service_host::{ConfigLoader, Server, ServerError};

#[derive(Debug, Parser)]
#[command(name = "service-host", version, about = "Microservice host")]
struct Cli {
    /// Directory containing config.<environment>.toml files
    #[arg(long, default_value = "config")]
    config_dir: PathBuf,

    /// Environment name, overrides SERVER_ENV
    #[arg(short, long)]
    environment: Option<String>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let mut loader = ConfigLoader::new().with_config_dir(&cli.config_dir);
    if let Some(environment) = cli.environment {
        loader = loader.with_environment(environment);
    }

    let server = Server::new(loader).with_service(HelloWorld::new());
    let code = match server.start().await {
        Ok(cause) => cause.exit_code(),
        Err(ServerError::Startup(e)) => {
            // The logger may not be installed yet.
            eprintln!("service-host: failed to initialize: {e}");
            tracing::error!(error = %e, "Failed to initialize");
            1
        }
        Err(e) => {
            tracing::error!(error = %e, "Service terminated abnormally");
            1
        }
    };

    std::process::exit(code);
}
