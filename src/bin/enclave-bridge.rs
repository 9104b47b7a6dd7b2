use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use enclave_bridge::{
    AttestationBundle, ClientConfig, Connector, GuardianConfig, GuardianSubmitter,
    TransportClient, UnixConnector,
};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "enclave-bridge",
    about = "Relay requests to an enclave and forward its attestations to guardians"
)]
struct Args {
    /// Unix socket the enclave listens on
    #[arg(long, env = "BRIDGE_SOCKET", default_value = "/run/enclave/enclave.sock")]
    socket: PathBuf,

    /// Enclave vsock CID (takes precedence over --socket)
    #[cfg(feature = "vsock")]
    #[arg(long, env = "BRIDGE_VSOCK_CID", requires = "vsock_port")]
    vsock_cid: Option<u32>,

    /// Enclave vsock port
    #[cfg(feature = "vsock")]
    #[arg(long, env = "BRIDGE_VSOCK_PORT")]
    vsock_port: Option<u32>,

    /// Guardian base URL; repeat or comma-separate, tried in the given order
    #[arg(long = "guardian", env = "BRIDGE_GUARDIANS", value_delimiter = ',')]
    guardians: Vec<String>,

    /// Bound on a single enclave connect attempt
    #[arg(long, env = "BRIDGE_CONNECT_TIMEOUT_MS", default_value_t = 5_000)]
    connect_timeout_ms: u64,

    /// Enclave connect attempts before giving up
    #[arg(long, env = "BRIDGE_RETRY_ATTEMPTS", default_value_t = 3)]
    retry_attempts: u32,

    /// Delay after the first failed connect, doubled on each retry
    #[arg(long, env = "BRIDGE_RETRY_DELAY_MS", default_value_t = 1_000)]
    retry_delay_ms: u64,

    /// Per-request timeout for guardian submit and status calls
    #[arg(long, env = "BRIDGE_GUARDIAN_TIMEOUT_MS", default_value_t = 30_000)]
    guardian_timeout_ms: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Send one request to the enclave and print the response
    Call {
        method: String,
        /// Request params as JSON
        #[arg(default_value = "null")]
        params: String,
    },
    /// Fetch the enclave's attestation and submit it to the guardians
    Attest {
        caller_id: String,
        /// Enclave method that returns the attestation
        #[arg(long, default_value = "get_attestation")]
        method: String,
    },
    /// Query guardian consensus for an attestation
    Status { attestation_id: String },
    /// Probe guardian reachability
    Health,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    #[cfg(feature = "vsock")]
    {
        if let (Some(cid), Some(port)) = (args.vsock_cid, args.vsock_port) {
            return run(enclave_bridge::VsockConnector::new(cid, port), &args).await;
        }
    }

    run(UnixConnector::new(&args.socket), &args).await
}

async fn run<C: Connector>(connector: C, args: &Args) -> Result<()> {
    match &args.command {
        Command::Call { method, params } => {
            let params = serde_json::from_str(params).context("params must be valid JSON")?;
            let mut client = enclave_client(connector, args)?;
            let response = client.call(method, params).await;
            client.disconnect().await;
            print_json(&response?)?;
        }
        Command::Attest { caller_id, method } => {
            let guardians = guardian_submitter(args)?;
            let mut client = enclave_client(connector, args)?;
            let response = client
                .call(method, serde_json::json!({ "caller_id": caller_id }))
                .await;
            client.disconnect().await;

            let response = response?;
            if !response.success {
                bail!(
                    "enclave refused attestation: {}",
                    response.error.unwrap_or_default()
                );
            }
            let data = response
                .data
                .context("attestation response carried no data")?;
            let bundle = AttestationBundle::from_enclave_data(&data, caller_id.as_str())
                .map_err(anyhow::Error::msg)?;
            tracing::info!(
                doc_len = bundle.attestation_doc.len(),
                chain_len = bundle.certificate_chain.len(),
                "submitting attestation"
            );
            print_json(&guardians.submit(&bundle).await?)?;
        }
        Command::Status { attestation_id } => {
            let status = guardian_submitter(args)?.query_status(attestation_id).await?;
            print_json(&status)?;
        }
        Command::Health => {
            let report = guardian_submitter(args)?.check_health().await;
            print_json(&report)?;
            if report.reachable == 0 {
                bail!("no guardian reachable");
            }
        }
    }
    Ok(())
}

fn enclave_client<C: Connector>(connector: C, args: &Args) -> Result<TransportClient<C>> {
    let config = ClientConfig::builder()
        .connect_timeout(Duration::from_millis(args.connect_timeout_ms))
        .retry(args.retry_attempts, Duration::from_millis(args.retry_delay_ms))
        .build()?;
    Ok(TransportClient::new(connector, config))
}

fn guardian_submitter(args: &Args) -> Result<GuardianSubmitter> {
    let config = GuardianConfig::builder()
        .endpoints(args.guardians.iter().cloned())
        .request_timeout(Duration::from_millis(args.guardian_timeout_ms))
        .build()?;
    Ok(GuardianSubmitter::new(config)?)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
