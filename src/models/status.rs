use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};
use utoipa::ToSchema;

/// Payment leg of the status pair. Stored in the database as the display
/// label, tracked independently from fulfillment.
///
/// Transitions: Pending → Completed, Pending → Failed, Completed → Refunded.
/// Failed and Refunded are terminal.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, EnumIter, ToSchema,
)]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Failed | Self::Refunded)
    }

    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Completed)
                | (Self::Pending, Self::Failed)
                | (Self::Completed, Self::Refunded)
        )
    }
}

/// Fulfillment leg of the status pair.
///
/// Pending → Processing → In Progress → Completed, with forward jumps
/// allowed (an admin may complete straight from Processing) and Cancelled
/// reachable from any non-terminal state. Completed and Cancelled are
/// terminal, so an order can never be un-completed.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, EnumIter, ToSchema,
)]
pub enum OrderStatus {
    Pending,
    Processing,
    #[serde(rename = "In Progress")]
    #[strum(serialize = "In Progress")]
    InProgress,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    fn rank(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Processing => 1,
            Self::InProgress => 2,
            Self::Completed => 3,
            Self::Cancelled => 4,
        }
    }

    pub fn can_transition_to(self, next: Self) -> bool {
        if self.is_terminal() || self == next {
            return false;
        }
        match next {
            Self::Cancelled => true,
            Self::Pending => false,
            _ => next.rank() > self.rank(),
        }
    }
}

/// Platform a service is delivered on.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
pub enum Platform {
    #[strum(serialize = "PC")]
    #[serde(rename = "PC")]
    Pc,
    Xbox,
    PlayStation,
}
