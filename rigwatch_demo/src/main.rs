//! rigwatch_demo: seeded in-memory registry backend for demos.

use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use rigwatch_demo::{sampler::spawn_sampler, serve, AppState, DEFAULT_SECRET};

#[derive(Parser, Debug)]
#[command(name = "rigwatch_demo", version, about = "In-memory device registry for rigwatch demos")]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "RIGWATCH_DEMO_PORT", default_value_t = 3231)]
    port: u16,

    /// Address to bind
    #[arg(long, default_value = "127.0.0.1")]
    bind: std::net::IpAddr,

    /// Token signing secret
    #[arg(long, env = "RIGWATCH_DEMO_SECRET", default_value = DEFAULT_SECRET, hide_env_values = true)]
    secret: String,

    /// Seconds between telemetry updates
    #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(u64).range(1..))]
    sample_secs: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let state = AppState::seeded(&args.secret);
    let _sampler = spawn_sampler(state.clone(), Duration::from_secs(args.sample_secs));

    let addr = SocketAddr::new(args.bind, args.port);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("demo backend listening on http://{addr}/api/ (user demo / demo)");
    serve(listener, state).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_long_short_and_assign() {
        let p = |args: &[&str]| Args::try_parse_from(args).map(|a| a.port);
        assert_eq!(p(&["demo", "--port", "9001"]).unwrap(), 9001);
        assert_eq!(p(&["demo", "-p", "9002"]).unwrap(), 9002);
        assert_eq!(p(&["demo", "--port=9003"]).unwrap(), 9003);
        assert!(p(&["demo", "--port", "nope"]).is_err());
    }
}
