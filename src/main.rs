//! `linguist` CLI: translate text through the cache.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info};

use linguist::deepl::{DeeplClient, DeeplConfig, DEFAULT_BASE_URL};
use linguist::{
    Context, KeyScope, Language, Linguist, LinguistError, MemoryStore, SqliteStore, Store,
    TranslateOption,
};

#[derive(Debug, Parser)]
#[command(name = "linguist", version, about = "Translate text through a TTL cache")]
struct Cli {
    /// Text to translate; each argument is translated separately.
    #[arg(required = true)]
    text: Vec<String>,

    /// Target language code.
    #[arg(short, long, default_value = "DE")]
    to: String,

    /// Source language code (auto-detected when omitted).
    #[arg(short, long)]
    from: Option<String>,

    #[arg(long, conflicts_with = "informal")]
    formal: bool,

    #[arg(long)]
    informal: bool,

    /// DeepL glossary id (requires --from).
    #[arg(long, requires = "from")]
    glossary: Option<String>,

    /// Persist the cache in this SQLite file instead of memory.
    #[arg(long)]
    db: Option<PathBuf>,

    #[arg(long, default_value_t = 24)]
    ttl_hours: u64,

    /// Include options in the cache key.
    #[arg(long)]
    key_options: bool,

    /// Give up after this many seconds.
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Print results as JSON lines.
    #[arg(long)]
    json: bool,

    #[arg(long, env = "DEEPL_AUTH_KEY", hide_env_values = true)]
    auth_key: String,

    #[arg(long, env = "DEEPL_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,
}

impl Cli {
    fn options(&self) -> Vec<TranslateOption> {
        let mut options = Vec::new();
        if let Some(from) = &self.from {
            options.push(TranslateOption::SourceLanguage(language(from)));
        }
        if self.formal {
            options.push(TranslateOption::Formal);
        }
        if self.informal {
            options.push(TranslateOption::Informal);
        }
        if let Some(id) = &self.glossary {
            options.push(TranslateOption::GlossaryId(id.clone()));
        }
        options
    }
}

/// Known codes are normalized; unknown ones pass through for the API to judge.
fn language(code: &str) -> Language {
    Language::lookup(code).unwrap_or_else(|| Language::new(code))
}

fn build(cli: &Cli) -> Result<Linguist, String> {
    let translator = DeeplClient::new(DeeplConfig::new(&cli.auth_key).base_url(&cli.base_url))
        .map_err(|e| format!("DeepL client init failed: {e}"))?;

    let store: Arc<dyn Store> = match &cli.db {
        Some(path) => Arc::new(
            SqliteStore::open(path).map_err(|e| format!("failed to open {}: {e}", path.display()))?,
        ),
        None => Arc::new(MemoryStore::new()),
    };

    let key_scope = if cli.key_options {
        KeyScope::Request
    } else {
        KeyScope::TextAndLanguage
    };

    Linguist::builder(&cli.auth_key)
        .translator(Arc::new(translator))
        .store(store)
        .ttl(Duration::from_secs(cli.ttl_hours.saturating_mul(3600)))
        .key_scope(key_scope)
        .build()
        .map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("linguist=info")),
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let linguist = match build(&cli) {
        Ok(l) => l,
        Err(e) => {
            error!(error = %e, "setup failed");
            return ExitCode::FAILURE;
        }
    };
    info!(?linguist, "linguist ready");

    let ctx = match cli.timeout_secs {
        Some(secs) => Context::with_timeout(Duration::from_secs(secs)),
        None => Context::background(),
    };
    let ctrl_c = ctx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    let target = language(&cli.to);
    let options = cli.options();
    let mut failed = false;

    for text in &cli.text {
        match linguist.translate(&ctx, text, &target, &options).await {
            Ok(translation) if cli.json => {
                let line = serde_json::json!({
                    "text": text,
                    "target_language": target,
                    "source_language": translation.source_language,
                    "translation": translation.translated_text,
                });
                println!("{line}");
            }
            Ok(translation) => println!("{}", translation.translated_text),
            Err(e @ LinguistError::Interrupted(_)) => {
                error!(error = %e, "translation interrupted");
                return ExitCode::FAILURE;
            }
            Err(e) => {
                error!(stage = e.stage(), error = %e, "translation failed");
                failed = true;
            }
        }
    }

    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
