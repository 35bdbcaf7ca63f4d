use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use carteira_core::backend::{HttpBackend, IndicesClient, InventoryClient, ValuationClient};
use carteira_core::domain::asset::{normalize_ticker, validate_ticker, AssetClass};
use carteira_core::domain::portfolio::{sort_positions, NewTransaction, TradeKind};
use carteira_core::radar::table::detail_view;
use carteira_core::radar::{
    start_scan, Phase, RadarProfile, RadarSession, ScanEvent, ScanMode, ScanOptions,
    SortDirection,
};

mod render;

#[derive(Debug, Parser)]
#[command(name = "carteira_worker")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Scan every ticker of an asset class and print the radar table.
    Radar(RadarArgs),
    /// Valuation card for one ticker.
    Lookup {
        class: AssetClass,
        ticker: String,
        #[arg(long)]
        no_color: bool,
    },
    /// Categories known to the backend.
    Categories,
    /// Tickers registered under one category.
    Tickers { category: String },
    /// Reference indices (Selic, IPCA and derived benchmarks).
    Indices {
        /// Bypass the backend cache.
        #[arg(long)]
        force: bool,
    },
    /// Register or drop tickers.
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
    /// Buy/sell history.
    Transactions {
        #[command(subcommand)]
        action: TransactionAction,
    },
    /// Current holdings.
    Portfolio(PortfolioArgs),
}

#[derive(Debug, Args)]
struct RadarArgs {
    class: AssetClass,

    /// Keep only tickers the backend flags as buys.
    #[arg(long)]
    buy_only: bool,

    /// Restrict the scan to these categories (repeatable). Defaults to every category of the class.
    #[arg(long = "category")]
    categories: Vec<String>,

    /// Case-insensitive ticker substring.
    #[arg(long)]
    filter: Option<String>,

    /// Column id to sort by (e.g. score, dy_estimado).
    #[arg(long)]
    sort: Option<String>,

    #[arg(long)]
    desc: bool,

    /// Column ids to hide (repeatable).
    #[arg(long = "hide")]
    hidden: Vec<String>,

    /// Redraw the table as records arrive.
    #[arg(long)]
    live: bool,

    #[arg(long)]
    no_color: bool,

    /// Refresh the reference indices before scanning.
    #[arg(long)]
    force_indices: bool,
}

#[derive(Debug, Subcommand)]
enum AdminAction {
    Add { category: String, ticker: String },
    Remove { category: String, ticker: String },
}

#[derive(Debug, Args)]
struct TransactionInput {
    ticker: String,
    #[arg(long)]
    quantidade: f64,
    #[arg(long)]
    preco: f64,
    #[arg(long, default_value = "compra")]
    tipo: TradeKind,
    /// Trade date (YYYY-MM-DD). Defaults to today.
    #[arg(long)]
    data: Option<String>,
}

#[derive(Debug, Subcommand)]
enum TransactionAction {
    List {
        class: AssetClass,
    },
    Add {
        class: AssetClass,
        #[command(flatten)]
        input: TransactionInput,
    },
    Update {
        class: AssetClass,
        id: i64,
        #[command(flatten)]
        input: TransactionInput,
    },
    Delete {
        class: AssetClass,
        id: i64,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PortfolioView {
    Acoes,
    Fii,
    Resumo,
}

#[derive(Debug, Args)]
struct PortfolioArgs {
    view: PortfolioView,

    /// ticker, recomendacao, or any numeric column (saldo, variacao, ...).
    #[arg(long)]
    sort: Option<String>,

    #[arg(long)]
    desc: bool,

    #[arg(long)]
    no_color: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = carteira_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer())
        .init();

    let cli = Cli::parse();
    let backend = Arc::new(HttpBackend::from_settings(&settings)?);

    if let Err(err) = run(cli.command, backend).await {
        sentry_anyhow::capture_anyhow(&err);
        tracing::error!(error = %err, "command failed");
        return Err(err);
    }
    Ok(())
}

async fn run(command: Command, backend: Arc<HttpBackend>) -> anyhow::Result<()> {
    match command {
        Command::Radar(args) => run_radar(args, backend).await,
        Command::Lookup {
            class,
            ticker,
            no_color,
        } => {
            let ticker = normalize_ticker(&ticker);
            anyhow::ensure!(!ticker.is_empty(), "Digite um ticker válido.");

            let record = backend.fetch_valuation(class, &ticker).await?;
            let indices = match backend.fetch_reference_indices(false).await {
                Ok(idx) => Some(idx),
                Err(err) => {
                    tracing::warn!(error = %err, "reference indices unavailable");
                    None
                }
            };
            let view = detail_view(&RadarProfile::for_class(class), &record, indices.as_ref());
            print!("{}", render::detail(&view, !no_color));
            Ok(())
        }
        Command::Categories => {
            for c in backend.list_categories().await? {
                println!("{c}");
            }
            Ok(())
        }
        Command::Tickers { category } => {
            let tickers = backend.list_tickers(&category).await?;
            if tickers.is_empty() {
                println!("Nenhum ativo cadastrado em {category}.");
            }
            for t in tickers {
                println!("{t}");
            }
            Ok(())
        }
        Command::Indices { force } => {
            let indices = backend.fetch_reference_indices(force).await?;
            println!("{}", serde_json::to_string_pretty(&indices)?);
            Ok(())
        }
        Command::Admin { action } => run_admin(action, &backend).await,
        Command::Transactions { action } => run_transactions(action, &backend).await,
        Command::Portfolio(args) => run_portfolio(args, &backend).await,
    }
}

async fn run_radar(args: RadarArgs, backend: Arc<HttpBackend>) -> anyhow::Result<()> {
    let mode = if args.buy_only {
        ScanMode::BuyOnly
    } else {
        ScanMode::Full
    };
    let profile = RadarProfile::for_class(args.class).with_mode(mode);
    let color = !args.no_color;

    let mut session = RadarSession::new(profile.clone());
    {
        let view = session.view_mut();
        if let Some(filter) = &args.filter {
            view.set_filter(filter.clone());
        }
        if let Some(column) = &args.sort {
            anyhow::ensure!(
                profile.column(column).is_some(),
                "unknown column {column:?} for {}",
                profile.title
            );
            let direction = if args.desc {
                SortDirection::Desc
            } else {
                SortDirection::Asc
            };
            view.set_sort(column, direction);
        }
        for column in &args.hidden {
            view.toggle_column(column);
        }
    }

    match backend.fetch_reference_indices(args.force_indices).await {
        Ok(indices) => session.set_indices(indices),
        Err(err) => tracing::warn!(error = %err, "reference indices unavailable; yields compare against 0"),
    }

    let categories = if args.categories.is_empty() {
        None
    } else {
        Some(args.categories.clone())
    };
    let mut handle = start_scan(backend, &profile, categories, ScanOptions::from_env());
    session.begin(handle.session_id());

    let mut screen = if args.live {
        match render::LiveScreen::enter() {
            Ok(screen) => Some(screen),
            Err(err) => {
                tracing::warn!(error = %err, "live view unavailable; printing progress instead");
                None
            }
        }
    } else {
        None
    };

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut interrupted = false;

    loop {
        tokio::select! {
            event = handle.next_event() => {
                let Some(event) = event else { break };
                // Progress ticks alone do not warrant a full redraw.
                let redraw = !matches!(event, ScanEvent::Progress { .. });
                if !session.apply(event) {
                    continue;
                }
                if let Some(screen) = screen.as_mut() {
                    if redraw {
                        screen.draw(&session.render(), color)?;
                    }
                } else {
                    let p = session.progress();
                    render::print_progress(profile.progress_label(), p.processed, p.total)?;
                }
            }
            _ = &mut ctrl_c => {
                handle.cancel();
                interrupted = true;
                break;
            }
        }
    }
    if screen.is_none() {
        eprintln!();
    }
    // Leave the alternate screen before the final table.
    drop(screen);

    let view = session.render();
    session.tear_down();

    print!("{}", render::radar_table(&view, color));

    if interrupted {
        let p = session.progress();
        println!("\nInterrompido em {}/{}.", p.processed, p.total);
        return Ok(());
    }
    if session.failures() > 0 {
        println!("\n{} ativo(s) sem dados.", session.failures());
    }
    if let Phase::Failed { message } = session.phase() {
        anyhow::bail!("{message}");
    }
    Ok(())
}

async fn run_admin(action: AdminAction, backend: &HttpBackend) -> anyhow::Result<()> {
    match action {
        AdminAction::Add { category, ticker } => {
            let ticker = validate_ticker(&category, &ticker)?;
            backend.add_asset(&category, &ticker).await?;
            println!("{ticker} adicionado em {category}.");
        }
        AdminAction::Remove { category, ticker } => {
            let ticker = normalize_ticker(&ticker);
            backend.remove_asset(&category, &ticker).await?;
            println!("{ticker} removido de {category}.");
        }
    }
    Ok(())
}

fn to_new_transaction(input: TransactionInput) -> anyhow::Result<NewTransaction> {
    let data = match input.data.as_deref() {
        Some(s) => chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .with_context(|| format!("invalid --data {s:?} (expected YYYY-MM-DD)"))?,
        None => chrono::Local::now().date_naive(),
    };
    Ok(NewTransaction {
        ticker: input.ticker,
        quantidade: input.quantidade,
        preco: input.preco,
        tipo: input.tipo,
        data,
    })
}

async fn run_transactions(action: TransactionAction, backend: &HttpBackend) -> anyhow::Result<()> {
    match action {
        TransactionAction::List { class } => {
            let txs = backend.list_transactions(class).await?;
            print!("{}", render::transactions(&txs));
        }
        TransactionAction::Add { class, input } => {
            let tx = to_new_transaction(input)?;
            backend.add_transaction(class, &tx).await?;
            println!("Transação adicionada com sucesso!");
        }
        TransactionAction::Update { class, id, input } => {
            let tx = to_new_transaction(input)?;
            backend.update_transaction(class, id, &tx).await?;
            println!("Transação {id} atualizada.");
        }
        TransactionAction::Delete { class, id } => {
            backend.delete_transaction(class, id).await?;
            println!("Transação {id} removida.");
        }
    }
    Ok(())
}

async fn run_portfolio(args: PortfolioArgs, backend: &HttpBackend) -> anyhow::Result<()> {
    let class = match args.view {
        PortfolioView::Acoes => AssetClass::Acoes,
        PortfolioView::Fii => AssetClass::Fii,
        PortfolioView::Resumo => {
            let summary = backend.portfolio_summary().await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
            return Ok(());
        }
    };

    let mut positions = backend.portfolio_positions(class).await?;
    if let Some(key) = &args.sort {
        sort_positions(&mut positions, key, !args.desc)?;
    }
    print!("{}", render::positions(&positions, !args.no_color));
    Ok(())
}

fn init_sentry(settings: &carteira_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
