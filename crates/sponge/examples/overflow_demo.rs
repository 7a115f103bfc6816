use sponge::logging::LogConfig;
use sponge::{frame, SpongeConfig, SpongeService};
use std::collections::VecDeque;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Debug level shows every batch the flush thread writes
    let _guard = LogConfig::debug().init()?;

    println!("=== Sponge Overflow Demo ===\n");

    let dir = std::env::temp_dir().join("sponge-demo");
    let service = SpongeService::builder()
        .config(SpongeConfig::new(&dir).with_queue(4, 3).with_batch_write_count(2))
        .build()?;

    if service.has_backlog() {
        println!("Found records left over from a previous run");
    }

    // A full queue hands us the tasks it had no room for
    let mut pending: VecDeque<Vec<u8>> = VecDeque::new();
    for i in 0..10 {
        pending.push_back(frame::encode([0, 1], format!("task-{}", i).as_bytes())?);
    }

    println!("1. Spilling {} tasks...", pending.len());
    while !pending.is_empty() {
        let report = service.spill(&mut pending);
        println!(
            "   accepted {}, dropped {}, waiting {}",
            report.accepted,
            report.dropped,
            pending.len()
        );
    }

    println!("\n2. Refilling as workers free up...");
    loop {
        let batch = service.refill(service.capacity())?;
        if batch.is_empty() {
            break;
        }
        for record in batch {
            let payload = frame::payload(&record).unwrap_or_default();
            println!("   {}", String::from_utf8_lossy(payload));
        }
    }

    println!("\n=== Demo Complete ===");
    println!("Spool directory: {}", dir.display());

    Ok(())
}
