use std::io::Write;

use anyhow::{bail, Context as _};
use clap::{Arg, ArgAction, ArgMatches, Command};
use tracing::{info, Instrument};

use objectprovider::{
    util::object::{parse_backend_from_uri, parse_bucket_from_uri, Backend},
    ObjectStore, Provider, ProviderConfig, Value,
};

fn command() -> Command {
    let key = || Arg::new("KEY").required(true).index(1);
    let raw = || {
        Arg::new("raw")
            .long("raw")
            .action(ArgAction::SetTrue)
            .help("Store or fetch the bytes as-is instead of JSON")
    };

    Command::new("objectprovider")
        .arg(Arg::new("BUCKET_URI").required(true).index(1))
        .arg(Arg::new("PREFIX").required(true).index(2))
        .arg(
            Arg::new("read-only")
                .long("read-only")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .subcommand_required(true)
        .subcommand(Command::new("open").about("Print whether the namespace is empty"))
        .subcommand(
            Command::new("put")
                .arg(key())
                .arg(Arg::new("VALUE").required(true).index(2))
                .arg(raw()),
        )
        .subcommand(Command::new("get").arg(key()).arg(raw()))
        .subcommand(Command::new("delete").arg(key()))
        .subcommand(Command::new("clear").about("Delete every key in the namespace"))
}

fn required<'a>(matches: &'a ArgMatches, id: &str) -> anyhow::Result<&'a String> {
    matches
        .get_one::<String>(id)
        .with_context(|| format!("missing {}", id))
}

async fn run<S: ObjectStore>(
    client: S,
    config: ProviderConfig,
    matches: &ArgMatches,
) -> anyhow::Result<()> {
    let provider = Provider::new(client, config);
    let first_access = provider.open().await?;

    let context = if matches.get_flag("read-only") {
        provider.read_only_context()
    } else {
        provider.read_write_context()
    };

    match matches.subcommand() {
        Some(("open", _)) => println!("{}", first_access),
        Some(("put", sub)) => {
            let key = required(sub, "KEY")?;
            let value = required(sub, "VALUE")?;

            if sub.get_flag("raw") {
                context.put_buffer(key, value.as_bytes()).await?;
            } else {
                let json: serde_json::Value = serde_json::from_str(value)
                    .with_context(|| format!("VALUE is not valid JSON: {}", value))?;
                context.put(key, &Value::Json(json)).await?;
            }
        }
        Some(("get", sub)) => {
            let key = required(sub, "KEY")?;

            if sub.get_flag("raw") {
                let Some(bytes) = context.get_buffer(key).await? else {
                    bail!("not found: {}", key);
                };
                std::io::stdout().write_all(&bytes)?;
            } else {
                match context.get(key).await? {
                    Some(Value::Json(json)) => println!("{}", json),
                    Some(Value::Binary(bytes)) => println!("{:?}", bytes),
                    None => bail!("not found: {}", key),
                }
            }
        }
        Some(("delete", sub)) => context.delete(required(sub, "KEY")?).await?,
        Some(("clear", _)) => context.clear().await?,
        Some((name, _)) => bail!("unknown command: {}", name),
        None => bail!("missing command"),
    }

    Ok(())
}

async fn connect(bucket_uri: &str, prefix: &str, matches: &ArgMatches) -> anyhow::Result<()> {
    info!("called");

    let config = ProviderConfig::new(parse_bucket_from_uri(bucket_uri), prefix);

    match parse_backend_from_uri(bucket_uri)? {
        Backend::AWS => {
            let conf = aws_config::load_from_env().await;
            run(aws_sdk_s3::Client::new(&conf), config, matches).await
        }
        Backend::GCS => {
            let conf = google_cloud_storage::client::ClientConfig::default()
                .with_auth()
                .await?;
            run(google_cloud_storage::client::Client::new(conf), config, matches).await
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().json().init();

    let matches = command().get_matches();

    let bucket_uri = required(&matches, "BUCKET_URI")?;
    let prefix = required(&matches, "PREFIX")?;
    let span = tracing::info_span!("main", bucket_uri = %bucket_uri, prefix = %prefix);

    connect(bucket_uri, prefix, &matches).instrument(span).await
}
