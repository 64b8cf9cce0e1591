use crate::cli::Commands;
use crate::snippets::{duplicate_commands, load_snippets, SnippetWatcher};
use keysnip_core::config::{get_config_file_path, get_snippets_file_path};
use keysnip_core::resolver::{default_values, uses_clipboard};
use keysnip_core::{
    extract_metafields, load_config, resolve, AppContextClassifier, ClipboardAccess,
    KeysnipError, KeywordContext, PlatformFocusSource, Result, SystemClipboard,
};
use keysnip_daemon::permissions::permission_instructions;
use keysnip_daemon::{
    Engine, EngineParts, ObservationStatus, PermissionProbe, SystemPermissionProbe, UsageCounter,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// How often `start` checks the snippet file and observation health.
const POLL_INTERVAL: Duration = Duration::from_secs(2);

const PREVIEW_CHARS: usize = 50;

pub fn handle_command(command: Commands) -> Result<()> {
    match command {
        Commands::Start { snippets, config } => handle_start(snippets, config),
        Commands::Check { request } => handle_check(request),
        Commands::List { snippets } => handle_list(snippets),
        Commands::Resolve { text } => handle_resolve(&text),
        Commands::Classify => handle_classify(),
    }
}

fn handle_start(snippets: Option<PathBuf>, config: Option<PathBuf>) -> Result<()> {
    let config_path = config.unwrap_or_else(get_config_file_path);
    let config = load_config(&config_path)?;
    tracing::debug!(path = %config_path.display(), ?config, "Loaded engine config");

    let usage = Arc::new(UsageCounter::new());
    let mut engine = Engine::new(config.clone(), EngineParts::system(&config, usage.clone()))?;

    let mut watcher = SnippetWatcher::new(snippets.unwrap_or_else(get_snippets_file_path));
    if let Some(snippets) = watcher.poll()? {
        engine.update_snippets(snippets);
    }

    if let Err(err) = engine.start() {
        if matches!(err, KeysnipError::PermissionDenied(_)) {
            print_instructions();
        }
        return Err(err);
    }

    println!(
        "keysnip is running with {} snippets from {}",
        engine.snippet_count(),
        watcher.path().display()
    );
    println!("Press Ctrl-C to stop.");

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let result = runtime.block_on(async {
        let mut ticker = tokio::time::interval(POLL_INTERVAL);
        let mut last_status = engine.observation_status();

        loop {
            tokio::select! {
                signal = tokio::signal::ctrl_c() => {
                    signal?;
                    break;
                }
                _ = ticker.tick() => {
                    match watcher.poll() {
                        Ok(Some(snippets)) => {
                            tracing::info!(count = snippets.len(), "Snippet file changed; reloading");
                            engine.update_snippets(snippets);
                        }
                        Ok(None) => {}
                        Err(err) => tracing::warn!(error = %err, "Could not reload snippets"),
                    }

                    let status = engine.observation_status();
                    if status != last_status {
                        if status == ObservationStatus::Fallback {
                            eprintln!("⚠️  Keystroke observation keeps failing and was stopped.");
                            eprintln!("Check permissions with 'keysnip check', then restart keysnip.");
                        }
                        last_status = status;
                    }
                }
            }
        }
        Ok::<(), KeysnipError>(())
    });

    engine.stop();
    for (id, count) in usage.snapshot() {
        tracing::info!(snippet = %id, count, "Expansions this session");
    }
    println!("keysnip stopped.");
    result
}

fn handle_check(request: bool) -> Result<()> {
    let probe = SystemPermissionProbe;
    if probe.is_permitted() {
        println!("✅ Keystroke observation is permitted");
        return Ok(());
    }

    println!("❌ Keystroke observation is not permitted");
    print_instructions();
    if request {
        probe.request()?;
    }
    Ok(())
}

fn print_instructions() {
    println!();
    for line in permission_instructions() {
        println!("{}", line);
    }
}

fn handle_list(snippets: Option<PathBuf>) -> Result<()> {
    let path = snippets.unwrap_or_else(get_snippets_file_path);
    let snippets = load_snippets(&path)?;

    if snippets.is_empty() {
        println!("No snippets found in {}", path.display());
        return Ok(());
    }

    println!("{} snippets in {}", snippets.len(), path.display());
    println!();
    for snippet in &snippets {
        if snippet.command.is_empty() {
            println!("  (empty command, skipped)  {}", snippet.preview(PREVIEW_CHARS));
            continue;
        }
        println!("  {:<16} {}", snippet.command, snippet.preview(PREVIEW_CHARS));

        let fields = extract_metafields(&snippet.content);
        if !fields.is_empty() {
            let keys: Vec<&str> = fields.iter().map(|field| field.key.as_str()).collect();
            println!("  {:<16} fields: {}", "", keys.join(", "));
        }
    }

    let duplicates = duplicate_commands(&snippets);
    if !duplicates.is_empty() {
        println!();
        for command in duplicates {
            println!(
                "⚠️  '{}' is defined more than once; the last definition wins",
                command
            );
        }
    }
    Ok(())
}

fn handle_resolve(text: &str) -> Result<()> {
    let clipboard = if uses_clipboard(text) {
        SystemClipboard::new().get_text().unwrap_or_else(|err| {
            tracing::warn!(error = %err, "Could not read clipboard");
            None
        })
    } else {
        None
    };

    let fields = extract_metafields(text);
    let values = default_values(&fields);
    let resolved = resolve(text, &KeywordContext::new(clipboard), Some(&values));

    println!("{}", resolved.text);
    match resolved.cursor_offset {
        Some(offset) => println!(
            "\ncursor at character {} ({} left from the end)",
            offset,
            resolved.cursor_moves_left()
        ),
        None => println!("\ncursor at end"),
    }
    for field in &fields {
        println!(
            "field '{}' default '{}'",
            field.key,
            field.default_value.as_deref().unwrap_or("")
        );
    }
    Ok(())
}

fn handle_classify() -> Result<()> {
    let classifier = AppContextClassifier::new(Arc::new(PlatformFocusSource::default()));
    let classification = classifier.classify();
    let profile = classification.context.timing_profile();

    match &classification.app {
        Some(app) => println!(
            "Focused app: {} ({})",
            app.name.as_deref().unwrap_or("unknown"),
            app.id
        ),
        None => println!("Focused app: unknown"),
    }
    println!("Context: {}", classification.context);
    println!(
        "Expansion: {}",
        if classification.context.should_suppress_expansion() {
            "suppressed"
        } else {
            "allowed"
        }
    );
    println!(
        "Deletion: {:?} between keys{}",
        profile.deletion_inter_key_delay,
        if profile.use_simple_deletion {
            ", one at a time"
        } else {
            ", chunked"
        }
    );
    println!("Settle after paste: {:?}", profile.injection_settle_delay);
    Ok(())
}
