//! Skirmish - headless squad battle runner
//!
//! Runs a seeded two-squad battle through the combat engine and prints the
//! battle log or a JSON summary.

use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use squad_combat::battle::hooks::SpeedRatioDoubleTurns;
use squad_combat::battle::{begin_turn, end_turn, ActionKind, BattleSession, CombatHooks};
use squad_combat::combat::attack::{cone_attack, in_reach, strike, AttackDescriptor};
use squad_combat::combat::combatant::{Combatant, SizeCategory, StatBlock};
use squad_combat::combat::rolling::rolling_attack;
use squad_combat::combat::status::StatusKind;
use squad_combat::core::error::Result;
use squad_combat::core::types::{CombatantId, GridPos, TeamIndex, COMPASS_DIRECTIONS};
use squad_combat::core::CombatConfig;

/// Skirmish - run a seeded squad battle
#[derive(Parser, Debug)]
#[command(name = "skirmish")]
#[command(about = "Run a seeded two-squad battle through the combat engine")]
struct Args {
    /// Random seed for deterministic runs
    #[arg(long)]
    seed: Option<u64>,

    /// Maximum rounds before the battle is called a draw
    #[arg(long, default_value_t = 20)]
    rounds: u32,

    /// TOML file overriding combat tunables
    #[arg(long)]
    config: Option<PathBuf>,

    /// Battlefield width in tiles
    #[arg(long, default_value_t = 12)]
    width: u32,

    /// Battlefield height in tiles
    #[arg(long, default_value_t = 8)]
    height: u32,

    /// Output format: text or json
    #[arg(long, default_value = "text")]
    format: String,

    /// Shrink animation pacing to a few milliseconds
    #[arg(long)]
    fast: bool,

    /// Enable debug logging
    #[arg(long, short = 'v')]
    verbose: bool,
}

/// JSON output structure
#[derive(Serialize)]
struct SkirmishResult {
    seed: u64,
    rounds: u32,
    winner: Option<u8>,
    survivors: Vec<Survivor>,
    log: Vec<String>,
}

#[derive(Serialize)]
struct Survivor {
    name: String,
    team: u8,
    hp: u32,
    max_hp: u32,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let default_filter = if args.verbose {
        "squad_combat=debug"
    } else {
        "squad_combat=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .with_writer(std::io::stderr)
        .init();

    let mut config = match &args.config {
        Some(path) => CombatConfig::load(path)?,
        None => CombatConfig::default(),
    };
    if args.fast {
        config.step_delay_ms = 1;
        config.dodge_window_ms = 3;
    }

    let seed = args.seed.unwrap_or_else(rand::random);
    tracing::info!(seed, width = args.width, height = args.height, "skirmish starting");

    let mut session = BattleSession::new(config, args.width, args.height, seed);
    spawn_squads(&mut session)?;
    let hooks = CombatHooks::default().with_double_turns(SpeedRatioDoubleTurns::default());

    let mut rounds = 0;
    while rounds < args.rounds && session.teams_standing().len() > 1 {
        rounds += 1;
        run_round(&mut session, &hooks).await?;
    }

    let standing = session.teams_standing();
    let winner = match standing.as_slice() {
        [team] => Some(team.0),
        _ => None,
    };

    match args.format.as_str() {
        "json" => {
            let result = SkirmishResult {
                seed,
                rounds,
                winner,
                survivors: session
                    .living()
                    .map(|c| Survivor {
                        name: c.name.clone(),
                        team: c.team.0,
                        hp: c.hp,
                        max_hp: c.max_hp,
                    })
                    .collect(),
                log: session.log.events.iter().map(|e| e.description.clone()).collect(),
            };
            match serde_json::to_string_pretty(&result) {
                Ok(json) => println!("{}", json),
                Err(err) => eprintln!("failed to serialize result: {}", err),
            }
        }
        _ => {
            for event in &session.log.events {
                println!("[round {:>2}] {}", event.round, event.description);
            }
            println!();
            match winner {
                Some(team) => println!("Team {} wins after {} rounds (seed {}).", team, rounds, seed),
                None => println!("Draw after {} rounds (seed {}).", rounds, seed),
            }
            for c in session.living() {
                println!("  {} (team {}) {}/{} HP", c.name, c.team.0, c.hp, c.max_hp);
            }
        }
    }

    Ok(())
}

fn spawn_squads(session: &mut BattleSession) -> Result<()> {
    let (w, h) = (session.field.width as i32, session.field.height as i32);
    let mid = h / 2;

    let squads = [
        (TeamIndex(0), 1, ["Boulder", "Ember", "Thorn"]),
        (TeamIndex(1), w - 2, ["Granite", "Cinder", "Bramble"]),
    ];
    for (team, x, names) in squads {
        let roller = Combatant::new(names[0], team, 60, GridPos::new(x, mid))
            .with_kinds(&["rock"])
            .with_stats(StatBlock {
                accuracy: 4,
                evasion: 2,
                speed: 2,
                power: 1,
                ..StatBlock::default()
            });
        let caster = Combatant::new(names[1], team, 40, GridPos::new(x, (mid - 2).max(0)))
            .with_kinds(&["fire"])
            .with_stats(StatBlock {
                accuracy: 3,
                evasion: 3,
                speed: 4,
                ..StatBlock::default()
            });
        let brute = Combatant::new(names[2], team, 80, GridPos::new(x, (mid + 2).min(h - 1)))
            .with_kinds(&["grass"])
            .with_size(SizeCategory::Small)
            .with_stats(StatBlock {
                accuracy: 3,
                evasion: 1,
                speed: 3,
                power: 2,
                ..StatBlock::default()
            });
        for c in [roller, caster, brute] {
            session.add_combatant(c)?;
        }
    }
    Ok(())
}

async fn run_round(session: &mut BattleSession, hooks: &CombatHooks) -> Result<()> {
    session.start_round(hooks.double_turns.as_ref());
    while let Some(id) = session.next_turn() {
        if !session.combatant(id)?.is_alive() {
            continue;
        }
        let start = begin_turn(session, id)?;
        if !start.skip_turn {
            take_action(session, hooks, id).await?;
        }
        end_turn(session, hooks, id).await?;
        if session.teams_standing().len() <= 1 {
            break;
        }
    }
    session.end_round();
    Ok(())
}

fn nearest_enemy(session: &BattleSession, id: CombatantId) -> Option<Combatant> {
    let me = session.combatant(id).ok()?;
    session
        .living()
        .filter(|c| c.team != me.team)
        .min_by_key(|c| c.position.grid_distance(&me.position))
        .cloned()
}

async fn take_action(session: &mut BattleSession, hooks: &CombatHooks, id: CombatantId) -> Result<()> {
    let Some(enemy) = nearest_enemy(session, id) else {
        return Ok(());
    };
    let me = session.combatant(id)?.clone();
    let reach = session.config.ranged_reach;

    if me.kinds.iter().any(|k| k == "rock") {
        let report = rolling_attack(session, hooks, id, enemy.position, &AttackDescriptor::melee("Walzer", "rock")).await?;
        if report.failed.is_none() {
            return Ok(());
        }
    }

    if me.kinds.iter().any(|k| k == "fire") {
        let cone_reach = session.config.cone_length;
        if me.position.grid_distance(&enemy.position) <= cone_reach {
            let heat = AttackDescriptor::ranged("Heat Wave", "fire").inflicting(StatusKind::Burned, 0.1);
            cone_attack(session, hooks, id, enemy.position, &heat).await?;
            return Ok(());
        }
        let ember = AttackDescriptor::ranged("Ember", "fire").inflicting(StatusKind::Burned, 0.3);
        if in_reach(&me, &enemy, &ember, reach) {
            strike(session, hooks, id, enemy.id, &ember).await?;
            return Ok(());
        }
    }

    let bite = AttackDescriptor::melee("Vine Lash", "grass").inflicting(StatusKind::Seeded, 0.2);
    if in_reach(&me, &enemy, &bite, reach) {
        strike(session, hooks, id, enemy.id, &bite).await?;
        return Ok(());
    }

    step_toward(session, id, enemy.position)
}

fn step_toward(session: &mut BattleSession, id: CombatantId, goal: GridPos) -> Result<()> {
    let me = session.combatant(id)?.clone();
    let mut position = me.position;
    for _ in 0..me.stats.movement {
        let next = COMPASS_DIRECTIONS
            .iter()
            .map(|(dx, dy)| position.offset(*dx, *dy))
            .filter(|cell| session.field.footprint_fits(*cell, me.size, Some(id)))
            .filter(|cell| cell.grid_distance(&goal) < position.grid_distance(&goal))
            .min_by_key(|cell| cell.grid_distance(&goal));
        match next {
            Some(cell) => position = cell,
            None => break,
        }
    }
    if position != me.position {
        session.relocate(id, position)?;
    }
    session.record_action(id, ActionKind::Move)
}
