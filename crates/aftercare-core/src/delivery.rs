//! Validated outbound delivery.

use tracing::{info, warn};

use aftercare_contracts::{
    error::{AftercareError, AftercareResult},
    intake::DeliveryReceipt,
};

use crate::traits::DeliveryGateway;

/// Wraps a `DeliveryGateway` so that `send` is only reachable after the
/// destination passes `validate_destination`.
pub struct DeliveryService {
    gateway: Box<dyn DeliveryGateway>,
}

impl DeliveryService {
    pub fn new(gateway: Box<dyn DeliveryGateway>) -> Self {
        Self { gateway }
    }

    /// Validate `destination`, then send `text`.
    ///
    /// # Errors
    ///
    /// `InvalidDestination` when validation fails; the gateway's `send` is
    /// never invoked in that case. A gateway that fails to deliver yields
    /// `Ok` with an empty receipt.
    pub fn deliver(&self, destination: &str, text: &str) -> AftercareResult<DeliveryReceipt> {
        if !self.gateway.validate_destination(destination) {
            warn!(destination = %destination, "destination failed validation, nothing sent");
            return Err(AftercareError::InvalidDestination {
                destination: destination.to_string(),
            });
        }

        let segments = self.gateway.send(destination, text);
        if segments.is_empty() {
            warn!(destination = %destination, "delivery gateway reported no segments sent");
        } else {
            info!(destination = %destination, segments = segments.len(), "message delivered");
        }

        Ok(DeliveryReceipt {
            destination: destination.to_string(),
            segments,
        })
    }
}
