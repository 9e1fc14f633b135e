//! A small adventure served by the host
//!
//! Title screen, a name, then a menu loop: gather gold in the forest, fight
//! in the cave, rest at the inn (a save point), or quit.

use async_trait::async_trait;
use cellquest_core::{Color, OptionBoxColors};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use crate::engine::GameEngine;
use crate::error::EngineError;
use crate::game::Game;

const MAX_NAME: usize = 20;
const START_HP: i32 = 20;

const MENU: [&str; 4] = [
    "Explore the forest",
    "Enter the cave",
    "Rest at the inn",
    "Quit",
];

/// Persisted player state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hero {
    pub name: String,
    pub hp: i32,
    pub max_hp: i32,
    pub gold: u32,
    pub victories: u32,
}

impl Hero {
    fn new(name: String) -> Self {
        Self {
            name,
            hp: START_HP,
            max_hp: START_HP,
            gold: 0,
            victories: 0,
        }
    }
}

#[derive(Debug, Default)]
pub struct Adventure;

#[async_trait]
impl Game for Adventure {
    async fn run(&self, engine: &mut GameEngine, saved: Option<Value>) -> Result<(), EngineError> {
        let returning = saved
            .and_then(|v| serde_json::from_value::<Hero>(v).ok())
            .filter(|h| h.hp > 0);

        let mut hero = match returning {
            Some(hero) => {
                engine.clear();
                engine.color(Color::LIGHT_GREEN, Color::BLACK);
                engine.print(format!("Welcome back, {}.", hero.name));
                hero
            }
            None => {
                title_screen(engine).await?;
                let hero = Hero::new(ask_name(engine).await?);
                engine.print(format!("Good luck, {}.", hero.name));
                hero
            }
        };

        loop {
            engine.checkpoint(serde_json::to_value(&hero)?);
            status(engine, &hero);

            match engine.option_box("What now?", &MENU, OptionBoxColors::default(), 0).await? {
                0 => forest(engine, &mut hero),
                1 => {
                    cave(engine, &mut hero).await?;
                    if hero.hp <= 0 {
                        engine.set_player_alive(false);
                        engine.color(Color::LIGHT_RED, Color::BLACK);
                        engine.print("You have died. Your tale ends here.");
                        engine.pause(Duration::from_secs(2)).await;
                        return Ok(());
                    }
                }
                2 => {
                    hero.hp = hero.max_hp;
                    engine.print("You sleep soundly. Your progress is saved.");
                    engine.save(serde_json::to_value(&hero)?).await;
                }
                _ => {
                    engine.checkpoint(serde_json::to_value(&hero)?);
                    engine.print("Farewell, traveller.");
                    return Ok(());
                }
            }
        }
    }
}

async fn title_screen(engine: &mut GameEngine) -> Result<(), EngineError> {
    engine.color(Color::YELLOW, Color::BLUE);
    engine.clear();
    engine.locate(31, 10);
    engine.print("C E L L Q U E S T");
    engine.pause(Duration::from_millis(1500)).await;
    engine.locate(28, 14);
    engine.print("Press any key to begin");
    engine.get_key(None).await?;
    engine.color(Color::LIGHT_GRAY, Color::BLACK);
    engine.clear();
    Ok(())
}

async fn ask_name(engine: &mut GameEngine) -> Result<String, EngineError> {
    let raw = engine.query("What is your name, traveller? ").await?;
    let name: String = raw.trim().chars().take(MAX_NAME).collect();
    Ok(if name.is_empty() {
        "Stranger".to_string()
    } else {
        name
    })
}

fn status(engine: &mut GameEngine, hero: &Hero) {
    engine.color(Color::LIGHT_CYAN, Color::BLACK);
    engine.print(format!(
        "{}  HP {}/{}  Gold {}  Victories {}",
        hero.name, hero.hp, hero.max_hp, hero.gold, hero.victories
    ));
    engine.color(Color::LIGHT_GRAY, Color::BLACK);
}

fn forest(engine: &mut GameEngine, hero: &mut Hero) {
    let found = roll(1, 10);
    hero.gold += found;
    engine.print(format!("You wander the forest and find {} gold.", found));
}

async fn cave(engine: &mut GameEngine, hero: &mut Hero) -> Result<(), EngineError> {
    let mut goblin = roll(6, 12) as i32;
    engine.color(Color::BROWN, Color::BLACK);
    engine.print("A goblin leaps from the shadows!");
    engine.color(Color::LIGHT_GRAY, Color::BLACK);

    while goblin > 0 && hero.hp > 0 {
        engine.print(format!("Goblin HP {}. Your HP {}. [A]ttack or [R]un? ", goblin, hero.hp));
        let key = engine.get_key(Some(&['a', 'A', 'r', 'R'])).await?;
        if key.eq_ignore_ascii_case(&'r') {
            engine.print("You flee back to the daylight.");
            return Ok(());
        }

        let hit = roll(2, 6) as i32;
        goblin -= hit;
        engine.print(format!("You strike for {}.", hit));
        if goblin <= 0 {
            break;
        }
        let bite = roll(1, 5) as i32;
        hero.hp -= bite;
        engine.print(format!("The goblin bites for {}.", bite));
    }

    if hero.hp > 0 {
        let loot = roll(5, 15);
        hero.gold += loot;
        hero.victories += 1;
        engine.print(format!("The goblin falls. You take {} gold.", loot));
    }
    Ok(())
}

fn roll(lo: u32, hi: u32) -> u32 {
    rand::thread_rng().gen_range(lo..=hi)
}
