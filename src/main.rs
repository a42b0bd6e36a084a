use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use macrocoach::clock::{Clock, SystemClock};
use macrocoach::coach::{ChatCoach, CoachSettings};
use macrocoach::config::{CoachConfig, ConfigManager};
use macrocoach::context::{ContextAggregator, format_for_prompt};
use macrocoach::memory::{MemoryManager, NewPlan, PlanType, SearchOptions};
use macrocoach::providers::OpenRouterClient;
use macrocoach::state::{GroceryStore, Macros, MealType, StoreItem, UserStore};
use macrocoach::storage::{FileBlobStore, KvStore};
use macrocoach::tools::{
    DebouncedSearch, FoodFilters, InMemoryFoodDatabase, ToolExecutor, rank_foods,
};
use std::sync::Arc;

// ============================================================================
// CLI Argument Parsing
// ============================================================================

#[derive(Parser)]
#[command(name = "macrocoach", version, about = "MacroCoach - AI nutrition coach")]
struct Cli {
    /// Output JSON instead of human-readable text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a message to the coach
    Chat {
        /// The message to send
        message: String,
    },
    /// Print the context block the coach sees
    Context {
        /// Profile, today and goals only
        #[arg(long)]
        light: bool,
    },
    /// Today's progress against targets
    Status,
    /// Set daily macro targets
    SetTargets {
        calories: f64,
        protein: f64,
        carbs: f64,
        fat: f64,
    },
    /// Search the food database
    Foods {
        query: String,
        #[arg(long)]
        verified_only: bool,
        #[arg(long)]
        min_protein: Option<f64>,
        #[arg(long)]
        max_calories: Option<f64>,
        #[arg(long)]
        category: Option<String>,
    },
    /// Log a food from the database
    LogFood {
        food_id: String,
        /// Portion in grams (default from config)
        #[arg(long)]
        grams: Option<f64>,
        /// breakfast, lunch, dinner or snack
        #[arg(long)]
        meal: Option<String>,
    },
    /// Search past conversations
    Recall {
        query: String,
        #[arg(long)]
        topic: Option<String>,
    },
    /// List saved plans
    Plans {
        /// Only plans of this type
        #[arg(long = "type")]
        plan_type: Option<String>,
        /// Only plans valid today
        #[arg(long)]
        active: bool,
    },
    /// Save a plan
    SavePlan {
        plan_type: String,
        name: String,
        details: String,
        #[arg(long)]
        from: Option<NaiveDate>,
        #[arg(long)]
        until: Option<NaiveDate>,
    },
    /// Buy an item with MacroCoins
    Purchase {
        name: String,
        price: u64,
        #[arg(long, default_value = "general")]
        category: String,
    },
    /// Update and show the logging streak
    Streak,
    /// Manage the grocery list
    Grocery {
        #[command(subcommand)]
        action: GroceryCommand,
    },
    /// Remove conversations past the retention window
    Cleanup,
    /// Show version, paths and memory statistics
    Info,
}

#[derive(Subcommand)]
enum GroceryCommand {
    /// Show the list
    List,
    /// Add an item
    Add {
        name: String,
        #[arg(long, default_value = "other")]
        category: String,
    },
    /// Check or uncheck an item
    Toggle { id: String },
    /// Drop checked items
    ClearChecked,
}

/// JSON envelope for non-interactive output
fn json_output(success: bool, data: serde_json::Value, error: Option<&str>) -> String {
    serde_json::json!({
        "success": success,
        "data": data,
        "error": error,
    })
    .to_string()
}

fn init_logging(json_mode: bool) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("macrocoach=info"));

    if json_mode {
        // Keep stdout clean for the JSON envelope
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_ansi(false)
            .with_writer(std::io::stderr)
            .compact()
            .init();
    } else if std::env::var("MACROCOACH_LOG_JSON").is_ok() {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .compact()
            .init();
    }
}

/// Everything a command needs, opened from the configured data dir
struct App {
    config: CoachConfig,
    clock: Arc<dyn Clock>,
    kv: KvStore,
    store: Arc<UserStore>,
    memory: MemoryManager,
    foods: Arc<InMemoryFoodDatabase>,
}

impl App {
    async fn open() -> Result<Self> {
        let manager = ConfigManager::new()?;
        let data_dir = manager.data_dir()?;
        let config = manager.get().clone();

        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let kv = KvStore::new(Arc::new(FileBlobStore::new(data_dir)?));
        let store = Arc::new(UserStore::open(&kv, clock.clone()).await);
        let memory = MemoryManager::new(kv.clone(), clock.clone(), config.memory.settings());
        let foods = Arc::new(InMemoryFoodDatabase::builtin()?);

        Ok(Self {
            config,
            clock,
            kv,
            store,
            memory,
            foods,
        })
    }

    fn tools(&self) -> ToolExecutor {
        ToolExecutor::new(self.foods.clone(), self.store.clone(), self.config.tools.settings())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.json);

    let app = App::open().await?;
    let result = run_command(&app, cli.command, cli.json).await;
    app.store.flush().await;

    if let Err(e) = result {
        if cli.json {
            println!("{}", json_output(false, serde_json::Value::Null, Some(&e.to_string())));
        } else {
            eprintln!("Error: {}", e);
        }
        std::process::exit(1);
    }
    Ok(())
}

// ============================================================================
// Command Runner
// ============================================================================

async fn run_command(app: &App, command: Commands, json_mode: bool) -> Result<()> {
    match command {
        Commands::Chat { message } => {
            let client = Arc::new(OpenRouterClient::new(&app.config.provider)?);
            let coach = ChatCoach::new(
                client,
                app.store.clone(),
                app.memory.clone(),
                app.tools(),
                CoachSettings::from_config(&app.config),
            );
            let cleanup = coach.spawn_cleanup();
            let reply = coach.send(&message).await;
            let _ = cleanup.await;

            if json_mode {
                println!("{}", json_output(true, serde_json::json!({
                    "reply": reply.message.content,
                    "offline": reply.offline,
                    "tool_results": reply.tool_results,
                    "blocks": reply.message.blocks,
                }), None));
            } else {
                println!("{}", reply.message.content);
            }
        }
        Commands::Context { light } => {
            let aggregator = ContextAggregator::new(app.store.clone());
            let context = if light {
                aggregator.build_light_context().await
            } else {
                aggregator.build_context().await
            };
            if json_mode {
                println!("{}", json_output(true, serde_json::to_value(&context)?, None));
            } else {
                print!("{}", format_for_prompt(&context));
            }
        }
        Commands::Status => {
            let status = app.tools().get_user_status();
            if json_mode {
                println!("{}", json_output(true, serde_json::to_value(&status)?, None));
            } else {
                println!("{} ({:?})", status.date, status.time_of_day);
                println!(
                    "  Calories: {:.0} / {:.0} kcal ({:.0} remaining){}",
                    status.consumed.calories,
                    status.targets.calories,
                    status.remaining.calories,
                    if status.targets_estimated { " [default targets]" } else { "" }
                );
                println!(
                    "  Protein: {:.0} / {:.0} g, Carbs: {:.0} / {:.0} g, Fat: {:.0} / {:.0} g",
                    status.consumed.protein,
                    status.targets.protein,
                    status.consumed.carbs,
                    status.targets.carbs,
                    status.consumed.fat,
                    status.targets.fat
                );
                println!("  Steps: {}", status.steps);
            }
        }
        Commands::SetTargets {
            calories,
            protein,
            carbs,
            fat,
        } => {
            let targets = Macros::new(calories, protein, carbs, fat);
            let applied = app.store.set_daily_targets(targets);
            if json_mode {
                println!("{}", json_output(applied, serde_json::to_value(targets)?, None));
            } else {
                println!("Daily targets set: {:.0} kcal, {:.0} P / {:.0} C / {:.0} F", calories, protein, carbs, fat);
            }
        }
        Commands::Foods {
            query,
            verified_only,
            min_protein,
            max_calories,
            category,
        } => {
            let filters = FoodFilters {
                verified_only,
                min_protein,
                max_calories,
                category,
                ..Default::default()
            };
            let search = DebouncedSearch::new(app.foods.clone(), app.config.tools.debounce());
            let candidates = search.search(&query).await.transpose()?.unwrap_or_default();
            let foods = rank_foods(candidates, &filters, app.config.tools.max_results);

            if json_mode {
                println!("{}", json_output(true, serde_json::to_value(&foods)?, None));
            } else if foods.is_empty() {
                println!("No foods match '{}'", query);
            } else {
                for food in &foods {
                    println!(
                        "{:<22} {} ({:.0} g): {:.0} kcal, {:.1} g protein [{}{}]",
                        food.id,
                        food.name,
                        food.serving_size_g,
                        food.macros.calories,
                        food.macros.protein,
                        food.source.label(),
                        if food.verified { ", verified" } else { "" }
                    );
                }
            }
        }
        Commands::LogFood { food_id, grams, meal } => {
            let meal_type = meal
                .as_deref()
                .map(|m| MealType::parse(m).ok_or_else(|| anyhow::anyhow!("unknown meal type '{}'", m)))
                .transpose()?;
            let entry = app.tools().log_verified_food(&food_id, grams, meal_type).await?;
            if json_mode {
                println!("{}", json_output(true, serde_json::to_value(&entry)?, None));
            } else {
                println!(
                    "Logged {:.0} g {} to {}: {:.0} kcal, {:.1} g protein",
                    entry.portion_grams,
                    entry.name,
                    entry.meal_type.label(),
                    entry.macros.calories,
                    entry.macros.protein
                );
            }
        }
        Commands::Recall { query, topic } => {
            let options = SearchOptions {
                limit: app.config.memory.search_limit,
                topic,
                ..Default::default()
            };
            let hits = app.memory.search_memory(&query, &options).await;
            if json_mode {
                println!("{}", json_output(true, serde_json::to_value(&hits)?, None));
            } else if hits.is_empty() {
                println!("Nothing found for '{}'", query);
            } else {
                for hit in &hits {
                    println!(
                        "[{}] ({}) {}: {}",
                        hit.date,
                        hit.score,
                        hit.message.role.label(),
                        hit.message.content
                    );
                }
            }
        }
        Commands::Plans { plan_type, active } => {
            let mut plans = match plan_type {
                Some(t) => app.memory.get_plans_by_type(PlanType::parse(&t)).await,
                None => app.memory.get_plans().await,
            };
            if active {
                let today = app.clock.today();
                plans.retain(|p| p.is_active_on(today));
            }
            if json_mode {
                println!("{}", json_output(true, serde_json::to_value(&plans)?, None));
            } else if plans.is_empty() {
                println!("No saved plans");
            } else {
                for plan in &plans {
                    println!("{} [{:?}] {}", plan.id, plan.plan_type, plan.name);
                    println!("    {}", plan.details);
                }
            }
        }
        Commands::SavePlan {
            plan_type,
            name,
            details,
            from,
            until,
        } => {
            let plan = app
                .memory
                .save_plan(NewPlan {
                    plan_type: PlanType::parse(&plan_type),
                    name,
                    details,
                    valid_from: from,
                    valid_until: until,
                })
                .await;
            if json_mode {
                println!("{}", json_output(true, serde_json::to_value(&plan)?, None));
            } else {
                println!("Saved plan '{}' ({})", plan.name, plan.id);
            }
        }
        Commands::Purchase {
            name,
            price,
            category,
        } => {
            let item = StoreItem {
                id: uuid::Uuid::new_v4().to_string(),
                name: name.clone(),
                category,
                price,
                purchased_at: None,
            };
            let purchased = app.store.purchase_item(item);
            let balance = app.store.balance();
            if json_mode {
                let error = (!purchased).then_some("insufficient balance");
                println!("{}", json_output(purchased, serde_json::json!({ "balance": balance }), error));
            } else if purchased {
                println!("Purchased {} for {} coins. Balance: {}", name, price, balance);
            } else {
                println!("Not enough coins for {} ({} needed, {} available)", name, price, balance);
            }
        }
        Commands::Streak => {
            app.store.update_streak();
            app.store.update_consistency_metrics();
            let metrics = app.store.snapshot().consistency;
            if json_mode {
                println!("{}", json_output(true, serde_json::to_value(&metrics)?, None));
            } else {
                println!("Streak: {} day(s)", metrics.streak);
                println!("Weekly compliance: {:.0}%", metrics.weekly_compliance);
                println!("Consistency score: {}/100", metrics.score);
            }
        }
        Commands::Grocery { action } => {
            let groceries = GroceryStore::open(&app.kv).await;
            match action {
                GroceryCommand::List => {}
                GroceryCommand::Add { name, category } => {
                    groceries.add_item(&name, &category);
                }
                GroceryCommand::Toggle { id } => {
                    if !groceries.toggle_item(&id) {
                        anyhow::bail!("no grocery item with id {}", id);
                    }
                }
                GroceryCommand::ClearChecked => {
                    groceries.clear_checked();
                }
            }
            groceries.flush().await;

            let items = groceries.items();
            if json_mode {
                println!("{}", json_output(true, serde_json::to_value(&items)?, None));
            } else {
                println!("Grocery list ({} to buy)", groceries.unchecked_count());
                for item in &items {
                    println!(
                        "  [{}] {} ({}) {}",
                        if item.checked { "x" } else { " " },
                        item.name,
                        item.category,
                        item.id
                    );
                }
            }
        }
        Commands::Cleanup => {
            let report = app.memory.cleanup_old_conversations().await;
            if json_mode {
                println!("{}", json_output(true, serde_json::to_value(&report)?, None));
            } else if report.ran {
                println!(
                    "Removed {} conversation(s) and {} summary(ies)",
                    report.conversations_removed, report.summaries_removed
                );
            } else {
                println!("Cleanup already ran today");
            }
        }
        Commands::Info => {
            let version = env!("CARGO_PKG_VERSION");
            let platform = std::env::consts::OS;
            let stats = app.memory.stats().await;
            if json_mode {
                println!("{}", json_output(true, serde_json::json!({
                    "version": version,
                    "platform": platform,
                    "name": "macrocoach",
                    "model": app.config.provider.model,
                    "memory": stats,
                }), None));
            } else {
                println!("MacroCoach v{}", version);
                println!("Platform: {}", platform);
                println!("Model: {}", app.config.provider.model);
                println!("{}", stats.format());
            }
        }
    }
    Ok(())
}
