//! # Plexus Aggregation Errors
//!
//! Errors raised by structural changes to an [`Aggregate`](super::Aggregate).
//! Queries never fail; a missing capability is reported as `None`.
use thiserror::Error;

use crate::aggregation::aggregate::AggregateId;
use crate::aggregation::component::ComponentId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AggregationError {
    #[error("Component '{component}' ({id}) already belongs to aggregate {owner}")]
    AlreadyOwned {
        component: String,
        id: ComponentId,
        owner: AggregateId,
    },

    #[error("Aggregate {0} is not registered")]
    UnknownAggregate(AggregateId),
}
