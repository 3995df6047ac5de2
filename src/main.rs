use anyhow::{bail, Result};
use std::env;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use pet_intake::pricing::format_amount;
use pet_intake::{
    CheckoutOrchestrator, CheckoutOutcome, CheckoutSelection, FlowConfig, FlowEvent, InMemoryBackend, IntakeFlow,
    PricingEngine, ProgressStore, SqliteProgressStore, StepTag, Tier,
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pet_intake=info")))
        .with_target(false)
        .init();

    let args: Vec<String> = env::args().collect();
    let config = FlowConfig::from_env()?;

    match args.get(1).map(String::as_str) {
        Some("demo") => {
            let pets = match args.get(2) {
                Some(n) => n.parse::<usize>()?,
                None => 2,
            };
            run_demo(config, pets).await?;
        }
        Some("quote") => run_quote(&config, &args[2..])?,
        Some("status") => run_status(config)?,
        Some("reset") => run_reset(&config)?,
        _ => print_usage(),
    }

    Ok(())
}

fn print_usage() {
    println!("🐾 Pet Intake v{}", pet_intake::VERSION);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Usage:");
    println!("  pet-intake demo [pets]                 Test flow end to end (payment bypassed)");
    println!("  pet-intake quote <tier>... [--addons] [--gift <tier>]");
    println!("  pet-intake status                      Show saved progress");
    println!("  pet-intake reset                       Discard saved progress and owner");
}

async fn run_demo(mut config: FlowConfig, pets: usize) -> Result<()> {
    println!("🧪 Test flow demo - {} pet(s)", pets);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    config.dev_mode = true;
    let store: Arc<dyn ProgressStore> = Arc::new(SqliteProgressStore::open(&config.storage_path)?);
    let backend = Arc::new(InMemoryBackend::new());

    // 1. Declare pets, jump straight to checkout
    let mut flow = IntakeFlow::start_test(store.clone(), config.clone())?;
    flow.dispatch(FlowEvent::SetPetCount { count: pets })?;
    flow.dispatch(FlowEvent::DevJump { target: StepTag::Checkout })?;
    let progress = flow.progress();
    println!(
        "✓ At checkout: step {}/{} ({}%)",
        progress.global_step, progress.total_steps, progress.percent
    );
    for (i, pet) in flow.state().pets.iter().enumerate() {
        println!("  • {}: {}", pet.display_name(i), pet.species.map(|s| s.as_str()).unwrap_or("?"));
    }

    // 2. Quote
    let selection = flow.checkout_selection();
    let quote = PricingEngine::new().quote(&selection);
    println!("\n💰 {}", quote.summary());
    for item in &quote.line_items {
        println!("  • {:<32} {}", item.label, format_amount(item.amount));
    }

    // 3. Submit
    let orchestrator = CheckoutOrchestrator::with_backend(backend.clone(), store, config);
    match orchestrator.submit_flow(&mut flow, selection).await? {
        CheckoutOutcome::DevBypass(dest) => {
            println!("\n✅ Submitted (test mode)");
            println!("✓ Session: {}", dest.session_id.unwrap_or_default());
            println!("✓ Reports: {}", dest.report_ids.join(", "));
        }
        other => println!("\n⚠️  Unexpected outcome: {:?}", other),
    }
    println!("✓ Reports created by backend: {}", backend.created_reports().len());

    Ok(())
}

fn run_quote(config: &FlowConfig, args: &[String]) -> Result<()> {
    let mut tiers = Vec::new();
    let mut addons = false;
    let mut gift = None;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--addons" => addons = true,
            "--gift" => match iter.next().and_then(|t| Tier::parse(t)) {
                Some(tier) => gift = Some(tier),
                None => bail!("--gift needs a tier (basic, mid, top)"),
            },
            other => match Tier::parse(other) {
                Some(tier) => tiers.push(tier),
                None => bail!("unknown tier {:?}", other),
            },
        }
    }
    if tiers.is_empty() {
        tiers.push(config.default_tier);
    }
    if tiers.len() > pet_intake::MAX_PETS {
        bail!("at most {} pets per order", pet_intake::MAX_PETS);
    }

    let mut selection = CheckoutSelection::new(tiers.len(), config.default_tier);
    for (i, tier) in tiers.iter().enumerate() {
        selection.set_tier(i, *tier);
        selection.set_addon(i, addons);
    }
    selection.set_gift_upsell(gift);

    let quote = PricingEngine::new().quote(&selection);
    println!("💰 Quote for {} pet(s)", tiers.len());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    for item in &quote.line_items {
        println!("  • {:<32} {}", item.label, format_amount(item.amount));
    }
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("{}", quote.summary());

    Ok(())
}

fn run_status(config: FlowConfig) -> Result<()> {
    let store: Arc<dyn ProgressStore> = Arc::new(SqliteProgressStore::open(&config.storage_path)?);
    let flow = IntakeFlow::resume(store, config);
    let progress = flow.progress();

    println!("📊 Saved progress");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("✓ Topology: {}", flow.state().topology.name());
    println!("✓ Pets: {}", flow.state().entity_count);
    println!(
        "✓ Step {}/{} ({}%) - {:?} for pet {}",
        progress.global_step,
        progress.total_steps,
        progress.percent,
        flow.position().step,
        flow.position().entity_index + 1
    );
    if let Some(owner) = flow.owner() {
        println!("✓ Owner: {}", if owner.name.is_empty() { "(unnamed)" } else { owner.name.as_str() });
    }

    Ok(())
}

fn run_reset(config: &FlowConfig) -> Result<()> {
    let store = SqliteProgressStore::open(&config.storage_path)?;
    store.clear_progress()?;
    store.clear_owner()?;
    println!("🗑️  Saved progress and owner discarded ({:?})", config.storage_path);
    Ok(())
}
