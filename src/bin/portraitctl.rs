use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use clap::{Args, Parser, Subcommand};
use portrait_pipeline::Config;
use serde_json::{json, Map, Value};
use std::path::Path;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "portraitctl", about = "CLI for the portrait generation service", version)]
struct Cli {
    /// Base URL of a running service (defaults to http://API_HOST:API_PORT)
    #[arg(global = true, long)]
    service_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Submit a new generation
    Create {
        /// Local image file (sent inline as base64) or an http(s) URL
        #[arg(long)]
        photo: String,
        /// Style id (model_id)
        #[arg(long)]
        style: String,
        /// Aspect ratio, e.g. 1:1, 3:4
        #[arg(long)]
        aspect_ratio: Option<String>,
        #[command(flatten)]
        owner: OwnerArgs,
        /// Keep checking until the task leaves the waiting state
        #[arg(long)]
        wait: bool,
    },
    /// Check a previously submitted task
    Check {
        /// Task id returned by a waiting response
        #[arg(long)]
        task_id: String,
        /// Style id used for the record if the task completes now
        #[arg(long)]
        style: String,
        #[command(flatten)]
        owner: OwnerArgs,
        /// Keep checking until the task leaves the waiting state
        #[arg(long)]
        wait: bool,
    },
}

#[derive(Args, Debug)]
struct OwnerArgs {
    #[arg(long)]
    event_id: Option<String>,
    #[arg(long)]
    guest_id: Option<String>,
    #[arg(long)]
    user_id: Option<String>,
    #[arg(long)]
    email: Option<String>,
    #[arg(long)]
    phone: Option<String>,
}

impl OwnerArgs {
    fn apply(self, body: &mut Map<String, Value>) {
        let fields = [
            ("event_id", self.event_id),
            ("guest_id", self.guest_id),
            ("user_id", self.user_id),
            ("email", self.email),
            ("phone", self.phone),
        ];
        for (key, value) in fields {
            if let Some(v) = value {
                body.insert(key.to_string(), Value::String(v));
            }
        }
    }
}

fn content_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        _ => "image/png",
    }
}

async fn photo_field(photo: &str) -> Result<String, Box<dyn std::error::Error>> {
    if photo.starts_with("http://") || photo.starts_with("https://") {
        return Ok(photo.to_string());
    }
    let path = Path::new(photo);
    let bytes = tokio::fs::read(path).await?;
    Ok(format!(
        "data:{};base64,{}",
        content_type_for(path),
        BASE64.encode(bytes)
    ))
}

async fn post(client: &reqwest::Client, url: &str, body: &Value) -> Result<Value, Box<dyn std::error::Error>> {
    let res = client.post(url).json(body).send().await?;
    Ok(res.json().await?)
}

fn is_waiting(v: &Value) -> bool {
    v.get("state").and_then(Value::as_str) == Some("waiting")
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    Config::dotenv_load();
    let cli = Cli::parse();
    let conf = Config::new().expect("Failed to load config");
    let base = cli
        .service_url
        .unwrap_or_else(|| format!("http://{}", conf.socket_address()));
    let url = format!("{}/generate", base.trim_end_matches('/'));
    let client = reqwest::Client::new();

    let (mut body, wait) = match cli.command {
        Commands::Create {
            photo,
            style,
            aspect_ratio,
            owner,
            wait,
        } => {
            let mut body = Map::new();
            body.insert("action".into(), json!("create"));
            body.insert("user_photo".into(), Value::String(photo_field(&photo).await?));
            body.insert("model_id".into(), Value::String(style));
            if let Some(ar) = aspect_ratio {
                body.insert("aspect_ratio".into(), Value::String(ar));
            }
            owner.apply(&mut body);
            (body, wait)
        }
        Commands::Check {
            task_id,
            style,
            owner,
            wait,
        } => {
            let mut body = Map::new();
            body.insert("action".into(), json!("check"));
            body.insert("taskId".into(), Value::String(task_id));
            body.insert("model_id".into(), Value::String(style));
            owner.apply(&mut body);
            (body, wait)
        }
    };

    let mut res = post(&client, &url, &Value::Object(body.clone())).await?;
    while wait && is_waiting(&res) {
        let task_id = res.get("taskId").cloned().unwrap_or(Value::Null);
        eprintln!("still waiting on task {}", task_id);
        tokio::time::sleep(conf.poll.interval.max(Duration::from_secs(1))).await;
        body.insert("action".into(), json!("check"));
        body.insert("taskId".into(), task_id);
        body.remove("user_photo");
        res = post(&client, &url, &Value::Object(body.clone())).await?;
    }

    println!("{}", serde_json::to_string_pretty(&res)?);
    if res.get("success").and_then(Value::as_bool) == Some(true) {
        Ok(())
    } else {
        std::process::exit(1);
    }
}
