// src/main.rs

use acsfiles::{AcsClient, CensusFrame, Config, Release};
use anyhow::{bail, Context, Result};
use std::{env, io, path::Path, process::exit};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

const USAGE: &str = "usage:
  acsfiles rows <address> [out.parquet]
  acsfiles table <year> <release> <table-id>
  acsfiles geo <geo-address>

ACS_CONFIG may name a YAML config file; ACS_* variables override it.";

fn main() {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,acsfiles=info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .with_writer(io::stderr)
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    if let Err(e) = run(&args) {
        eprintln!("error: {:#}", e);
        exit(1);
    }
}

fn load_config() -> Result<Config> {
    let base = match env::var("ACS_CONFIG") {
        Ok(path) => Config::from_yaml_file(&path).with_context(|| format!("reading config {}", path))?,
        Err(_) => Config::default(),
    };
    Ok(base.with_env_overrides()?)
}

fn run(args: &[String]) -> Result<()> {
    let Some(cmd) = args.first() else {
        eprintln!("{}", USAGE);
        exit(2);
    };
    let client = AcsClient::from_config(load_config()?).context("building client")?;

    match (cmd.as_str(), &args[1..]) {
        ("rows", [address]) => rows_to_csv(&client, address),
        ("rows", [address, out]) => rows_to_parquet(&client, address, Path::new(out)),
        ("table", [year, release, id]) => {
            let year: u16 = year.parse().with_context(|| format!("bad year '{}'", year))?;
            let release: Release = release.parse()?;
            let meta = client.table_meta(year, release, id)?;
            println!("{}", serde_json::to_string_pretty(&meta)?);
            Ok(())
        }
        ("geo", [address]) => {
            let geo = client.geo_address(address)?;
            let loc = client.boundary(&geo)?;
            println!("{}", loc);
            Ok(())
        }
        _ => bail!("unrecognised arguments {:?}\n{}", args, USAGE),
    }
}

fn rows_to_csv(client: &AcsClient, address: &str) -> Result<()> {
    let table = client
        .rows(address)
        .with_context(|| format!("resolving {}", address))?;
    let mut out = csv::Writer::from_writer(io::stdout().lock());
    let mut n = 0usize;
    for row in table.into_string_rows() {
        out.write_record(row.with_context(|| format!("reading {}", address))?)?;
        n += 1;
    }
    out.flush()?;
    info!(address, rows = n.saturating_sub(1), "done");
    Ok(())
}

fn rows_to_parquet(client: &AcsClient, address: &str, out: &Path) -> Result<()> {
    let frame: CensusFrame = client
        .frame(address)
        .with_context(|| format!("assembling {}", address))?;
    frame
        .write_parquet(out)
        .with_context(|| format!("writing {}", out.display()))?;
    info!(address, rows = frame.num_rows(), out = %out.display(), "done");
    Ok(())
}
