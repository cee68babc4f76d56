//! Scenario A: a one-word "Fine" reply.
//!
//! The reply reports no symptoms at all, so every category decodes to none
//! rather than "not mentioned", the rule table grades the round Low, and the
//! care instructions carry no escalation.

use aftercare_contracts::{error::AftercareResult, interaction::InteractionRecord};

use super::{print_record, Harness};
use crate::mock_data::FINE_REPLY;

/// Check in, receive "Fine", run to the clinic summary.
pub fn walk(harness: &mut Harness) -> AftercareResult<InteractionRecord> {
    let record = harness.start_round()?;
    harness.respond(record, FINE_REPLY)
}

pub fn run_scenario() -> AftercareResult<()> {
    println!("=== Scenario A: Fine ===");
    println!();

    let mut harness = Harness::offline()?;
    let record = walk(&mut harness)?;

    println!();
    print_record(&record);
    println!();
    harness.print_journal(&record);
    println!();
    println!("  Scenario A complete.");
    println!();
    Ok(())
}
