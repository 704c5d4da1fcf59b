use webpilot_commands::registry;

/// Reads the registry directly; listing commands is not an invocation.
pub async fn run(filter: Option<&str>) -> anyhow::Result<()> {
    let matches = registry::matching(filter.unwrap_or(""));
    if matches.is_empty() {
        println!("No actions match '{}'", filter.unwrap_or(""));
        return Ok(());
    }
    println!("Available actions:");
    for cmd in matches {
        println!("  /{:<14} {}", cmd.id, cmd.description);
        println!("  {:15} input: {}", "", cmd.input_placeholder);
    }
    Ok(())
}
