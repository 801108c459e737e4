use clap::Parser;
use reqwest::header::ACCEPT;

#[derive(Parser)]
#[command(name = "probe-cli")]
#[command(about = "Query a running probe server", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    /// Response format: text, html, json or yaml.
    #[arg(short, long, default_value = "text")]
    format: String,

    /// Ask for indented JSON.
    #[arg(short, long)]
    pretty: bool,

    /// Probe name; omit to run every probe.
    name: Option<String>,
}

fn media_type(format: &str) -> Result<&'static str, String> {
    match format.to_ascii_lowercase().as_str() {
        "text" => Ok("text/plain"),
        "html" => Ok("text/html"),
        "json" => Ok("application/json"),
        "yaml" | "yml" => Ok("application/yaml"),
        other => Err(format!("unknown format `{other}`")),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let accept = media_type(&cli.format)?;

    let mut url = format!(
        "{}/{}",
        cli.url.trim_end_matches('/'),
        cli.name.as_deref().unwrap_or_default()
    );
    if cli.pretty {
        url.push_str("?pretty=true");
    }

    let res = reqwest::Client::new().get(&url).header(ACCEPT, accept).send().await?;
    let status = res.status();
    let request_id = res
        .headers()
        .get("x-requestid")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();
    let body = res.text().await?;

    if !status.is_success() {
        eprintln!("Error: probe server returned status {} ({})", status, request_id);
        eprint!("{}", body);
        std::process::exit(1);
    }

    print!("{}", body);
    if !body.ends_with('\n') {
        println!();
    }
    Ok(())
}
