//! Scenario D: care instructions addressed to a malformed phone number.
//!
//! The round completes normally, but delivery refuses the destination
//! before the gateway is touched: the caller gets `InvalidDestination` and
//! no segment is sent.

use aftercare_contracts::{
    error::{AftercareError, AftercareResult},
    intake::DeliveryReceipt,
};
use aftercare_core::DeliveryService;

use super::Harness;
use crate::mock_data::{ConsoleDelivery, MIXED_RECOVERY_REPLY};

pub const MALFORMED_PHONE: &str = "555-1234";

/// Run a round for a patient whose phone number is `MALFORMED_PHONE`, then
/// attempt delivery.
pub fn walk(harness: &mut Harness, delivery: &DeliveryService) -> AftercareResult<DeliveryReceipt> {
    harness.patient.phone_number = Some(MALFORMED_PHONE.to_string());
    let record = harness.start_round()?;
    let record = harness.respond(record, MIXED_RECOVERY_REPLY)?;

    let care = record.care_instructions().ok_or_else(|| AftercareError::StateMachineError {
        reason: "round finished without care instructions".to_string(),
    })?;
    delivery.deliver(MALFORMED_PHONE, care)
}

pub fn run_scenario() -> AftercareResult<()> {
    println!("=== Scenario D: Invalid destination ===");
    println!();

    let mut harness = Harness::offline()?;
    let console = ConsoleDelivery::new(153);
    let delivery = DeliveryService::new(Box::new(console.clone()));

    println!();
    match walk(&mut harness, &delivery) {
        Err(AftercareError::InvalidDestination { destination }) => {
            println!("  Delivery refused:   '{destination}' is not a valid phone number");
            println!("  Segments sent:      {}", console.sent().len());
        }
        Err(other) => return Err(other),
        Ok(receipt) => println!(
            "  Unexpected delivery of {} segment(s) to {}",
            receipt.segments.len(),
            receipt.destination
        ),
    }
    println!();
    println!("  Scenario D complete.");
    println!();
    Ok(())
}
