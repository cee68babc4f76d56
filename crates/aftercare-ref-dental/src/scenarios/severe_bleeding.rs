//! Scenario B: significant bleeding with pain.
//!
//! "significant" escalates bleeding to severe, which the rule table grades
//! High. The care instructions must tell the patient to contact the clinic,
//! and they are then delivered by SMS through `DeliveryService`.

use aftercare_contracts::{
    error::{AftercareError, AftercareResult},
    intake::DeliveryReceipt,
    interaction::InteractionRecord,
};
use aftercare_core::DeliveryService;

use super::{print_record, Harness};
use crate::mock_data::{ConsoleDelivery, SEVERE_BLEEDING_REPLY};

/// Run the round to the summary, then deliver the care instructions.
pub fn walk(
    harness: &mut Harness,
    delivery: &DeliveryService,
) -> AftercareResult<(InteractionRecord, DeliveryReceipt)> {
    let record = harness.start_round()?;
    let record = harness.respond(record, SEVERE_BLEEDING_REPLY)?;

    let care = record.care_instructions().ok_or_else(|| AftercareError::StateMachineError {
        reason: "round finished without care instructions".to_string(),
    })?;
    let destination = harness.patient.phone_number.clone().unwrap_or_default();
    let receipt = delivery.deliver(&destination, care)?;
    Ok((record, receipt))
}

pub fn run_scenario() -> AftercareResult<()> {
    println!("=== Scenario B: Severe bleeding ===");
    println!();

    let mut harness = Harness::offline()?;
    let delivery = DeliveryService::new(Box::new(ConsoleDelivery::new(153)));
    let (record, receipt) = walk(&mut harness, &delivery)?;

    println!();
    print_record(&record);
    println!();
    println!(
        "  Delivery:           {} segment(s) to {}",
        receipt.segments.len(),
        receipt.destination
    );
    harness.print_journal(&record);
    println!();
    println!("  Scenario B complete.");
    println!();
    Ok(())
}
