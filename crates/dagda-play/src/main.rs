//! Dagda Play command line
//!
//! Usage:
//!   dagda-play --wallet 0xabc play --bet 2 --nudge right
//!   dagda-play --wallet 0xabc emerald-flip --call heads --bet 5 --double
//!   dagda-play --fid 42 --username brigid balance
//!   dagda-play simulate --spins 100000 --bet 5

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};

use dagda_cauldron::{BetMultiplier, CoinFace, Position};
use dagda_ledger::{GameId, JsonFileStore, Player, PlayerIdentity, SocialProfile};
use dagda_play::{AppConfig, CauldronTable, FlipReport, draw_probabilities, simulate};

#[derive(Parser)]
#[command(name = "dagda-play", about = "Dagda's Cauldron, stirred from the terminal")]
struct Cli {
    /// YAML or JSON config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Ledger file for balances, limits and history
    #[arg(long, default_value = "dagda-ledger.json")]
    data: PathBuf,

    /// Play as a wallet address
    #[arg(long)]
    wallet: Option<String>,

    /// Play as a Farcaster user
    #[arg(long)]
    fid: Option<u64>,

    /// Farcaster username (with --fid)
    #[arg(long, requires = "fid")]
    username: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stir the cauldron once
    Play {
        /// Bet multiplier: 1, 2 or 5
        #[arg(long, default_value_t = 1)]
        bet: u32,
        /// Reels to nudge in order (left, middle, right)
        #[arg(long, value_delimiter = ',')]
        nudge: Vec<String>,
        /// RNG seed
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Call a coin for the coinflip stake
    Coinflip {
        /// heads or tails
        #[arg(long)]
        call: CoinFace,
        /// RNG seed
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Emerald coin at a bet multiplier, with double-or-nothing on a win
    EmeraldFlip {
        /// heads or tails
        #[arg(long)]
        call: CoinFace,
        /// Bet multiplier: 1, 2 or 5
        #[arg(long, default_value_t = 1)]
        bet: u32,
        /// Go double-or-nothing after a win
        #[arg(long)]
        double: bool,
        /// RNG seed
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Spin the randomizer wheel
    Randomizer {
        /// RNG seed
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Show PIE balance
    Balance,
    /// Show plays left today
    Limits,
    /// Show lifetime statistics
    Stats,
    /// Show recent plays
    History {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Show top players
    Leaderboard {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Run the engine offline and report rates
    Simulate {
        #[arg(long, default_value_t = 100_000)]
        spins: u64,
        /// Bet multiplier: 1, 2 or 5
        #[arg(long, default_value_t = 1)]
        bet: u32,
        /// RNG seed
        #[arg(long)]
        seed: Option<u64>,
    },
}

impl Commands {
    fn seed(&self) -> Option<u64> {
        match self {
            Commands::Play { seed, .. }
            | Commands::Coinflip { seed, .. }
            | Commands::EmeraldFlip { seed, .. }
            | Commands::Randomizer { seed } => *seed,
            _ => None,
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => AppConfig::default(),
    };

    match &cli.command {
        Commands::Simulate { spins, bet, seed } => run_simulation(config, *spins, *bet, *seed),
        Commands::Leaderboard { limit } => {
            let table = open_table(&cli, config)?;
            show_leaderboard(&table, *limit)
        }
        command => {
            let identity = identity(&cli);
            if identity.resolve().is_err() {
                bail!("Connect a wallet (--wallet) or sign in with Farcaster (--fid) first");
            }
            let mut table = open_table(&cli, config)?;
            if let Some(seed) = command.seed() {
                table.seed(seed);
            }
            let seat = table.sit_down(&identity)?;
            if let Some(balance) = seat.bonus_granted {
                println!("Farcaster bonus credited! Balance: {balance} PIE");
            }

            match command {
                Commands::Play { bet, nudge, .. } => {
                    let positions = nudge
                        .iter()
                        .map(|p| p.parse::<Position>())
                        .collect::<std::result::Result<Vec<_>, _>>()?;
                    run_play(&mut table, &seat.player, parse_bet(*bet)?, &positions)
                }
                Commands::Coinflip { call, .. } => {
                    let report = table.coinflip(&seat.player, *call)?;
                    print_flip("Coinflip", &report);
                    Ok(())
                }
                Commands::EmeraldFlip { call, bet, double, .. } => {
                    let report = table.emerald_flip(&seat.player, *call, parse_bet(*bet)?)?;
                    print_flip("Emerald flip", &report);
                    if *double && report.can_double {
                        let report = table.double_or_nothing(&seat.player)?;
                        print_flip("Double or nothing", &report);
                    }
                    Ok(())
                }
                Commands::Randomizer { .. } => {
                    let report = table.randomizer(&seat.player)?;
                    println!(
                        "Randomizer: {} ({:+} PIE). Balance: {} PIE. Plays left today: {}",
                        report.prize.label,
                        report.prize.amount,
                        report.balance,
                        report.remaining_plays
                    );
                    Ok(())
                }
                Commands::Balance => {
                    println!("{}: {} PIE", seat.player.username, seat.balance);
                    Ok(())
                }
                Commands::Limits => {
                    for game in GameId::ALL {
                        let check = table.remaining_plays_of(&seat.player, game)?;
                        println!(
                            "{:<16} {} plays left today (resets in {})",
                            game.as_str(),
                            check.remaining_plays,
                            check.resets_in
                        );
                    }
                    Ok(())
                }
                Commands::Stats => show_stats(&table, &seat.player),
                Commands::History { limit } => show_history(&table, &seat.player, *limit),
                Commands::Simulate { .. } | Commands::Leaderboard { .. } => Ok(()),
            }
        }
    }
}

fn identity(cli: &Cli) -> PlayerIdentity {
    PlayerIdentity {
        wallet_address: cli.wallet.clone(),
        social: cli.fid.map(|fid| SocialProfile {
            fid,
            username: cli.username.clone(),
            display_name: None,
        }),
    }
}

fn open_table(cli: &Cli, config: AppConfig) -> Result<CauldronTable> {
    let store = JsonFileStore::open(&cli.data)
        .with_context(|| format!("opening ledger {}", cli.data.display()))?;
    Ok(CauldronTable::new(config, Arc::new(store))?)
}

fn parse_bet(bet: u32) -> Result<BetMultiplier> {
    Ok(BetMultiplier::try_from(bet)?)
}

fn run_play(
    table: &mut CauldronTable,
    player: &Player,
    multiplier: BetMultiplier,
    nudges: &[Position],
) -> Result<()> {
    let round = table.play_round(player, multiplier, nudges)?;
    let play = &round.play;
    println!(
        "Stirred {} for {} PIE: {} ({} PIE)",
        play.result.symbols, play.bet_amount, play.result.win_type, play.result.amount
    );

    for (report, position) in round.nudges.iter().zip(nudges) {
        if !report.nudge.success {
            println!("No nudges left");
            break;
        }
        if let Some(result) = report.result {
            println!(
                "Nudged {position}: {} → {} (+{} PIE, cost {})",
                result.symbols,
                result.win_type,
                report.nudge.additional_winnings,
                report.nudge.cost
            );
        }
    }
    if let Some(e) = &round.nudge_error {
        println!("Stopped nudging: {e}");
    }

    println!(
        "Net {:+} PIE. Balance: {} PIE. Plays left today: {}",
        round.collected.settlement.net(),
        round.collected.balance,
        play.remaining_plays
    );
    Ok(())
}

fn print_flip(game: &str, report: &FlipReport) {
    let flip = &report.flip;
    let verdict = if flip.won() { "won" } else { "lost" };
    println!(
        "{game}: called {}, landed {}, {verdict} {} PIE. Balance: {} PIE. Plays left today: {}",
        flip.call, flip.landed, flip.stake, report.balance, report.remaining_plays
    );
}

fn show_stats(table: &CauldronTable, player: &Player) -> Result<()> {
    match table.player_stats(player)? {
        Some(stats) => {
            println!("{} ({})", stats.username, stats.user_id);
            println!("  games:          {}", stats.total_games);
            println!("  win rate:       {:.1}%", stats.win_rate());
            println!("  PIE bet / won:  {} / {}", stats.total_pie_bet, stats.total_pie_won);
            println!("  largest win:    {}", stats.largest_win);
            println!("  streak:         {} (best {})", stats.current_streak, stats.longest_streak);
        }
        None => println!("No games played yet"),
    }
    Ok(())
}

fn show_history(table: &CauldronTable, player: &Player, limit: usize) -> Result<()> {
    for entry in table.history().user_history(&player.user_id, limit)? {
        let outcome = entry
            .symbols
            .map(|s| s.to_string())
            .or_else(|| entry.result.clone())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{}  {:<15} {:<24} bet {:>3}  won {:>3}  net {:+}",
            entry
                .played_at()
                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_default(),
            entry.game.as_str(),
            outcome,
            entry.bet_amount,
            entry.winnings,
            entry.net_change
        );
    }
    Ok(())
}

fn show_leaderboard(table: &CauldronTable, limit: usize) -> Result<()> {
    println!("By PIE won:");
    for (rank, stats) in table.history().leaderboard(limit)?.iter().enumerate() {
        println!("  {:>2}. {:<20} {:>6}", rank + 1, stats.username, stats.total_pie_won);
    }
    println!("By balance:");
    for (rank, player) in table.balances().top_players(limit)?.iter().enumerate() {
        println!("  {:>2}. {:<20} {:>6}", rank + 1, player.username, player.balance);
    }
    Ok(())
}

fn run_simulation(config: AppConfig, spins: u64, bet: u32, seed: Option<u64>) -> Result<()> {
    if spins == 0 {
        bail!("--spins must be positive");
    }
    let multiplier = parse_bet(bet)?;

    println!("Symbol draw probabilities:");
    for (symbol, p) in draw_probabilities(&config.cauldron) {
        println!("  {:<10} {:>6.2}%", symbol.name(), p * 100.0);
    }

    let report = simulate(config.cauldron, spins, multiplier, seed)?;
    println!("Simulated {} plays at {}", report.spins, report.bet_multiplier);
    println!("  win rate:   {:.2}%", report.win_rate());
    println!("  two-match:  {:.2}%", report.two_match_rate());
    println!("  jackpot:    {:.2}%", report.jackpot_rate());
    println!("  RTP:        {:.2}%", report.rtp());
    println!("  ROI:        {:+.2}%", report.roi());
    for (symbol, wins) in &report.wins_by_symbol {
        println!("  {symbol:<10} {wins} wins");
    }
    Ok(())
}
