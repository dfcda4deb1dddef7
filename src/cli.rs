use std::error::Error;

use atty::Stream;
use clap::{Parser, Subcommand};
use serde_json::json;
use termimad::{FmtText, MadSkin, terminal_size};
use tokio::runtime::Runtime;
use tracing_subscriber::EnvFilter;
use wordcraft_lexica::{
    Credential, LexicaError, ModelClient, ModelConfig, SuggestionQuery, SuggestionResult, Tone,
    WordQuery, lookup_word, suggest_best_word, validate_api_key, validate_context,
};

#[derive(Parser, Debug)]
#[command(
    name = "wordcraft-lexica",
    about = "Synonyms, antonyms and best-word suggestions from a language model",
    version
)]
pub struct Cli {
    /// Emit JSON instead of human-readable output.
    #[arg(long, global = true)]
    json: bool,

    /// API key for the model provider. Falls back to GOOGLE_API_KEY / GEMINI_API_KEY.
    #[arg(long, global = true)]
    api_key: Option<String>,

    /// Model identifier, overriding WORDCRAFT_MODEL.
    #[arg(long, global = true)]
    model: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List synonyms for a word.
    Synonyms { word: String },
    /// List antonyms for a word.
    Antonyms { word: String },
    /// Fetch synonyms and antonyms together.
    Lookup { word: String },
    /// Pick the best synonym or antonym of a word for a sentence.
    Suggest {
        /// The word the candidates relate to.
        word: String,
        /// Sentence or description of where the word will be used.
        #[arg(short, long)]
        context: String,
        /// Desired tone (Conversational, Formal, Poetic, Technical, Humorous, Concise).
        #[arg(short, long)]
        tone: Option<String>,
        /// Candidate synonyms; when neither list is given they are fetched first.
        #[arg(long, value_delimiter = ',')]
        synonyms: Vec<String>,
        /// Candidate antonyms.
        #[arg(long, value_delimiter = ',')]
        antonyms: Vec<String>,
    },
    /// Run the web interface.
    #[cfg(feature = "web")]
    Serve {
        /// Address to bind.
        #[arg(long, default_value = "127.0.0.1:8080")]
        addr: std::net::SocketAddr,
        /// CSS framework for the rendered pages.
        #[arg(long, value_enum, default_value_t = ThemeArg::Tailwind)]
        theme: ThemeArg,
        /// Public base URL used in canonical links.
        #[arg(long)]
        base_url: Option<String>,
    },
}

#[cfg(feature = "web")]
#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum ThemeArg {
    Tailwind,
    Bootstrap,
}

#[cfg(feature = "web")]
impl From<ThemeArg> for wordcraft_lexica::web::WebTheme {
    fn from(value: ThemeArg) -> Self {
        match value {
            ThemeArg::Tailwind => wordcraft_lexica::web::WebTheme::Tailwind,
            ThemeArg::Bootstrap => wordcraft_lexica::web::WebTheme::Bootstrap,
        }
    }
}

pub fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let mut config = ModelConfig::from_env();
    if let Some(model) = cli.model.clone() {
        config.model = model;
    }

    #[cfg(feature = "web")]
    if let Command::Serve {
        addr,
        theme,
        base_url,
    } = cli.command
    {
        init_tracing("info");
        let web_config = wordcraft_lexica::web::WebConfig {
            addr,
            theme: theme.into(),
            base_url: base_url.unwrap_or_else(|| format!("http://{addr}")),
            model: config,
        };
        let runtime = Runtime::new()?;
        runtime.block_on(wordcraft_lexica::web::serve(web_config))?;
        return Ok(());
    }

    init_tracing("warn");
    let client = ModelClient::gemini(&config);
    let credential = resolve_credential(cli.api_key.as_deref(), &config)?;
    let as_json = cli.json;
    let runtime = Runtime::new()?;
    runtime.block_on(async move {
        match cli.command {
            Command::Synonyms { word } => {
                handle_list(&client, &credential, word, Side::Synonyms, as_json).await
            }
            Command::Antonyms { word } => {
                handle_list(&client, &credential, word, Side::Antonyms, as_json).await
            }
            Command::Lookup { word } => handle_lookup(&client, &credential, word, as_json).await,
            Command::Suggest {
                word,
                context,
                tone,
                synonyms,
                antonyms,
            } => {
                let args = SuggestArgs {
                    word,
                    context,
                    tone,
                    synonyms,
                    antonyms,
                };
                handle_suggest(&client, &credential, args, as_json).await
            }
            #[cfg(feature = "web")]
            Command::Serve { .. } => Ok(()),
        }
    })
}

fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn resolve_credential(
    flag: Option<&str>,
    config: &ModelConfig,
) -> Result<Credential, Box<dyn Error>> {
    let raw = flag
        .map(str::to_string)
        .or_else(|| config.api_key.clone())
        .filter(|key| !key.trim().is_empty())
        .ok_or(LexicaError::MissingCredential)?;
    Ok(validate_api_key(Some(&raw))?)
}

#[derive(Debug, Clone, Copy)]
enum Side {
    Synonyms,
    Antonyms,
}

impl Side {
    fn label(&self) -> &'static str {
        match self {
            Side::Synonyms => "synonyms",
            Side::Antonyms => "antonyms",
        }
    }
}

async fn handle_list(
    client: &ModelClient,
    credential: &Credential,
    word: String,
    side: Side,
    as_json: bool,
) -> Result<(), Box<dyn Error>> {
    let query = WordQuery::parse(Some(&word))?;
    let words = match side {
        Side::Synonyms => {
            wordcraft_lexica::generate_synonyms(client, &query.word, credential)
                .await?
                .synonyms
        }
        Side::Antonyms => {
            wordcraft_lexica::generate_antonyms(client, &query.word, credential)
                .await?
                .antonyms
        }
    };
    if as_json {
        let mut payload = json!({ "word": query.word });
        payload[side.label()] = json!(words);
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        print_word_list(side.label(), &query.word, &words);
    }
    Ok(())
}

async fn handle_lookup(
    client: &ModelClient,
    credential: &Credential,
    word: String,
    as_json: bool,
) -> Result<(), Box<dyn Error>> {
    let query = WordQuery::parse(Some(&word))?;
    let (synonyms, antonyms) = lookup_word(client, &query.word, credential).await?;
    if as_json {
        let payload = json!({
            "word": query.word,
            "synonyms": synonyms.synonyms,
            "antonyms": antonyms.antonyms,
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }
    if synonyms.synonyms.is_empty() && antonyms.antonyms.is_empty() {
        println!("No synonyms or antonyms found for \"{}\".", query.word);
        return Ok(());
    }
    print_word_list("synonyms", &query.word, &synonyms.synonyms);
    print_word_list("antonyms", &query.word, &antonyms.antonyms);
    Ok(())
}

struct SuggestArgs {
    word: String,
    context: String,
    tone: Option<String>,
    synonyms: Vec<String>,
    antonyms: Vec<String>,
}

async fn handle_suggest(
    client: &ModelClient,
    credential: &Credential,
    args: SuggestArgs,
    as_json: bool,
) -> Result<(), Box<dyn Error>> {
    let original = WordQuery::parse(Some(&args.word))?;
    let context = validate_context(Some(&args.context))?;
    let tone = Tone::from_field(args.tone.as_deref())?;
    let (synonyms, antonyms) = if args.synonyms.is_empty() && args.antonyms.is_empty() {
        let (synonyms, antonyms) = lookup_word(client, &original.word, credential).await?;
        (synonyms.synonyms, antonyms.antonyms)
    } else {
        (args.synonyms, args.antonyms)
    };
    let query = SuggestionQuery {
        original_word: original.word,
        context,
        tone,
        synonyms,
        antonyms,
    };
    let result = suggest_best_word(client, &query, credential).await?;
    if as_json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_suggestion(&query, &result);
    }
    Ok(())
}

fn print_word_list(label: &str, word: &str, words: &[String]) {
    if words.is_empty() {
        println!("No {label} found for \"{word}\".");
        return;
    }
    println!("{} for \"{word}\":", capitalize(label));
    for item in words {
        println!("  - {item}");
    }
}

fn print_suggestion(query: &SuggestionQuery, result: &SuggestionResult) {
    match result.suggested_word.as_deref() {
        Some(word) => println!(
            "Suggested {}: {word} ({} tone)",
            result.suggestion_type, query.tone
        ),
        None => println!("No suitable word for \"{}\".", query.original_word),
    }
    render_markdown_block("Explanation", &result.explanation);
}

fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn stdout_is_tty() -> bool {
    atty::is(Stream::Stdout)
}

fn markdown_width() -> usize {
    let (width, _) = terminal_size();
    width.max(60) as usize
}

fn render_markdown_block(title: &str, body: &str) {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return;
    }
    println!("\n{title}:");
    if stdout_is_tty() {
        let skin = MadSkin::default();
        let formatted = FmtText::from(&skin, trimmed, Some(markdown_width()));
        println!("{formatted}");
    } else {
        println!("{trimmed}");
    }
}
