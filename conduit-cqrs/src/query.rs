//! Query handling for CQRS

use async_trait::async_trait;
use conduit_events::{HandlerError, short_type_name};
use conduit_validation::Validate;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::any::Any;
use std::marker::PhantomData;

/// Query trait
///
/// Queries represent read operations.
pub trait Query: Validate + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Query result type
    type Output: Send + 'static;

    /// Name the handler is registered under
    fn name() -> &'static str {
        short_type_name::<Self>()
    }
}

/// Query handler trait
#[async_trait]
pub trait QueryHandler<Q: Query>: Send + Sync {
    /// Handle the query
    async fn handle(&self, query: Q) -> Result<Q::Output, HandlerError>;
}

/// Type-erased query handler
#[async_trait]
pub trait ErasedQueryHandler: Send + Sync {
    async fn handle_any(
        &self,
        query: Box<dyn Any + Send>,
    ) -> Result<Box<dyn Any + Send>, HandlerError>;

    fn query_name(&self) -> &'static str;
}

/// Wrapper for typed query handlers
pub struct TypedQueryHandler<Q: Query, H: QueryHandler<Q>> {
    handler: H,
    _phantom: PhantomData<fn(Q)>,
}

impl<Q: Query, H: QueryHandler<Q>> TypedQueryHandler<Q, H> {
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            _phantom: PhantomData,
        }
    }
}

#[async_trait]
impl<Q: Query, H: QueryHandler<Q>> ErasedQueryHandler for TypedQueryHandler<Q, H> {
    async fn handle_any(
        &self,
        query: Box<dyn Any + Send>,
    ) -> Result<Box<dyn Any + Send>, HandlerError> {
        match query.downcast::<Q>() {
            Ok(qry) => {
                let output = self.handler.handle(*qry).await?;
                Ok(Box::new(output))
            }
            Err(_) => Err(HandlerError::failed(format!(
                "Type mismatch: handler for {} received another query",
                Q::name()
            ))),
        }
    }

    fn query_name(&self) -> &'static str {
        Q::name()
    }
}
