use std::io::{self, Write};

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use weather_relay::config::ForecastConfig;
use weather_relay::session::Session;
use weather_relay::tools::{ForecastQuery, ForecastSource, OpenMeteoClient};
use weather_relay::{ChatRelay, ChatRequest, RelayConfig, RelayError, RelayReply, build_relay};

#[derive(Parser, Debug)]
#[clap(author, version, about = "Chat relay with live weather lookups")]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Send a single prompt and print the reply
    Ask {
        prompt: String,

        #[clap(long, short, default_value = "gpt-4o")]
        model: String,

        #[clap(long, short, default_value_t = 0.7)]
        temperature: f64,

        #[clap(long, help = "Do not offer the weather function to the model")]
        plain: bool,
    },
    /// Interactive conversation; history is sent along with every prompt
    Chat {
        #[clap(long, short, default_value = "gpt-4o")]
        model: String,

        #[clap(long, short, default_value_t = 0.7)]
        temperature: f64,
    },
    /// Print the daily forecast table for a location
    Forecast {
        #[clap(long, allow_hyphen_values = true)]
        latitude: f64,

        #[clap(long, allow_hyphen_values = true)]
        longitude: f64,

        #[clap(long, default_value = "UTC")]
        timezone: String,

        #[clap(long, default_value_t = 7)]
        days: u8,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Ask {
            prompt,
            model,
            temperature,
            plain,
        } => {
            let relay = build_relay(&RelayConfig::from_env()?)?;
            let request = ChatRequest::new(prompt, model, temperature);
            let reply = if plain {
                relay.chat(&request).await
            } else {
                relay.respond_detailed(&request).await.map(|r| {
                    if let RelayReply::Augmented { function, .. } = &r {
                        info!(target: "weather_relay", %function, "Answer used function output");
                    }
                    r.into_content()
                })
            };
            match reply {
                Ok(text) => println!("{}", text),
                Err(e) => return Err(report(e)),
            }
        }
        Commands::Chat { model, temperature } => {
            let relay = build_relay(&RelayConfig::from_env()?)?;
            run_chat_loop(&relay, Session::new(&model, temperature)).await?;
        }
        Commands::Forecast {
            latitude,
            longitude,
            timezone,
            days,
        } => {
            let config = ForecastConfig::from_env()?;
            let client = OpenMeteoClient::new(config.endpoint, config.request_timeout)?;
            let query = ForecastQuery::new(latitude, longitude, &timezone, days)?;
            let forecast = client.fetch(&query).await?;
            println!("{}", forecast.to_markdown());
        }
    }
    Ok(())
}

fn report(e: RelayError) -> anyhow::Error {
    if e.is_user_error() {
        anyhow::anyhow!("invalid request: {}", e)
    } else {
        anyhow::anyhow!("service unavailable: {}", e)
    }
}

async fn run_chat_loop(relay: &ChatRelay, mut session: Session) -> Result<()> {
    println!("\u{001b}[94mWeather relay chat ({}). Type 'quit' to exit, 'clear' to reset.\u{001b}[0m", session.model);
    info!(target: "weather_relay", session = %session.id, "Chat session started");

    loop {
        print!("\u{001b}[93mYou:\u{001b}[0m ");
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            break;
        }

        match input.trim() {
            "" => continue,
            "quit" | "exit" => break,
            "clear" => {
                session.clear();
                println!("\u{001b}[90m(history cleared)\u{001b}[0m");
            }
            prompt => {
                let request = ChatRequest::new(prompt, session.model.clone(), session.temperature)
                    .with_history(session.messages.clone());
                match relay.respond(&request).await {
                    Ok(reply) => {
                        println!("\u{001b}[96mAssistant:\u{001b}[0m {}", reply);
                        session.record_exchange(prompt, &reply);
                    }
                    Err(e) => {
                        error!(target: "weather_relay", error = %e, "Request failed");
                        eprintln!("\u{001b}[91mError:\u{001b}[0m {}", e);
                        if e.is_user_error() {
                            break;
                        }
                    }
                }
            }
        }
    }
    Ok(())
}
