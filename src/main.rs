use log::{error, info, warn};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use vibe_vote::client::HttpBackend;
use vibe_vote::config::Config;
use vibe_vote::db::SqliteFlagStore;
use vibe_vote::handlers::{Dashboard, Interaction, QrPanel, View, VoteManager, Widget};
use vibe_vote::models::Rating;
use vibe_vote::tasks::{PollerSettings, ResultsPoller};

const HELP: &str = "Commands: 1-5 vote | results | back | dismiss | qr | show-qr | reset | quit";

#[tokio::main]
async fn main() {
    // Initialize logging
    dotenvy::dotenv().ok();
    env_logger::init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return;
        }
    };

    // Local "has voted" flag and session id
    let store = match SqliteFlagStore::open(&config.database_url).await {
        Ok(store) => Arc::new(store),
        Err(e) => {
            error!("Failed to open local storage: {}", e);
            return;
        }
    };

    let backend = match HttpBackend::new(&config) {
        Ok(backend) => Arc::new(backend),
        Err(e) => {
            error!("Failed to build HTTP client: {}", e);
            return;
        }
    };

    let qr = match QrPanel::new(&config.app_url, config.qr_size) {
        Ok(qr) => qr,
        Err(e) => {
            error!("Failed to prepare QR code: {}", e);
            return;
        }
    };

    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let poller = ResultsPoller::new(backend.clone(), events_tx, PollerSettings::from(&config));
    let votes = VoteManager::new(backend, store);
    let mut widget = Widget::new(votes, poller, qr);

    if let Err(e) = widget.init().await {
        error!("Failed to read vote status: {}", e);
        return;
    }
    info!("Voting widget ready, results at {}", config.results_url);

    let mut dashboard = Dashboard::new();
    println!("{}", HELP);
    print_widget(&widget, &dashboard);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    if line == "quit" || line == "q" {
                        break;
                    }
                    match line.parse::<Interaction>() {
                        Ok(interaction) => {
                            if let Err(e) = widget.handle(interaction).await {
                                warn!("Interaction {:?} failed: {}", interaction, e);
                                println!("{}", e);
                            }
                        }
                        Err(e) => {
                            println!("{}\n{}", e, HELP);
                            continue;
                        }
                    }
                    print_widget(&widget, &dashboard);
                }
                Ok(None) => break,
                Err(e) => {
                    error!("Failed to read input: {}", e);
                    break;
                }
            },
            Some(event) = events_rx.recv() => {
                dashboard.apply(event);
                if widget.view() == View::Results {
                    print_widget(&widget, &dashboard);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, shutting down");
                break;
            }
        }
    }

    widget.shutdown();
}

fn print_widget(widget: &Widget, dashboard: &Dashboard) {
    println!();
    match widget.view() {
        View::Voting | View::Voted => {
            for rating in Rating::ALL {
                let state = if widget.controls_enabled() { "" } else { " (disabled)" };
                println!("[{}] {}{}", rating, rating.name(), state);
            }
        }
        View::Results => {
            for line in dashboard.lines() {
                println!("{}", line);
            }
        }
    }

    if let Some(notice) = widget.notice() {
        println!("> {}", notice.text());
    }

    let qr = widget.qr();
    println!("(qr) {}", qr.toggle_label());
    if qr.is_visible() {
        println!("Scan to vote: {}", qr.image_url());
        println!("{}", qr.app_url());
    }
}
