//! Command handling for CQRS

use async_trait::async_trait;
use conduit_events::{HandlerError, short_type_name};
use conduit_validation::Validate;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::any::Any;
use std::marker::PhantomData;

/// Command trait
///
/// Commands represent write operations. They are validated through their JSON
/// form before their handler runs.
pub trait Command: Validate + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Command result type
    type Output: Send + 'static;

    /// Name the handler is registered under
    fn name() -> &'static str {
        short_type_name::<Self>()
    }
}

/// Command handler trait
#[async_trait]
pub trait CommandHandler<C: Command>: Send + Sync {
    /// Handle the command
    async fn handle(&self, command: C) -> Result<C::Output, HandlerError>;
}

/// Type-erased command handler, as stored in the registry
#[async_trait]
pub trait ErasedCommandHandler: Send + Sync {
    async fn handle_any(
        &self,
        command: Box<dyn Any + Send>,
    ) -> Result<Box<dyn Any + Send>, HandlerError>;

    /// Name of the command this handler accepts
    fn command_name(&self) -> &'static str;
}

/// Wrapper for typed command handlers
pub struct TypedCommandHandler<C: Command, H: CommandHandler<C>> {
    handler: H,
    _phantom: PhantomData<fn(C)>,
}

impl<C: Command, H: CommandHandler<C>> TypedCommandHandler<C, H> {
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            _phantom: PhantomData,
        }
    }
}

#[async_trait]
impl<C: Command, H: CommandHandler<C>> ErasedCommandHandler for TypedCommandHandler<C, H> {
    async fn handle_any(
        &self,
        command: Box<dyn Any + Send>,
    ) -> Result<Box<dyn Any + Send>, HandlerError> {
        match command.downcast::<C>() {
            Ok(cmd) => {
                let output = self.handler.handle(*cmd).await?;
                Ok(Box::new(output))
            }
            Err(_) => Err(HandlerError::failed(format!(
                "Type mismatch: handler for {} received another command",
                C::name()
            ))),
        }
    }

    fn command_name(&self) -> &'static str {
        C::name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_validation::ValidationDescriptor;
    use serde::Deserialize;

    #[derive(Serialize, Deserialize)]
    struct CreateUser {
        email: String,
    }

    impl Validate for CreateUser {
        fn validation() -> ValidationDescriptor {
            ValidationDescriptor::new()
        }
    }

    impl Command for CreateUser {
        type Output = String;
    }

    #[derive(Serialize, Deserialize)]
    struct DeleteUser {
        id: String,
    }

    impl Validate for DeleteUser {
        fn validation() -> ValidationDescriptor {
            ValidationDescriptor::new()
        }
    }

    impl Command for DeleteUser {
        type Output = bool;
    }

    struct CreateUserHandler;

    #[async_trait]
    impl CommandHandler<CreateUser> for CreateUserHandler {
        async fn handle(&self, command: CreateUser) -> Result<String, HandlerError> {
            Ok(format!("user-{}", command.email))
        }
    }

    #[test]
    fn test_command_name() {
        assert_eq!(CreateUser::name(), "CreateUser");
    }

    #[tokio::test]
    async fn test_erased_round_trip() {
        let handler = TypedCommandHandler::new(CreateUserHandler);
        assert_eq!(handler.command_name(), "CreateUser");

        let output = handler
            .handle_any(Box::new(CreateUser {
                email: "alice@example.com".into(),
            }))
            .await
            .unwrap();
        assert_eq!(
            *output.downcast::<String>().unwrap(),
            "user-alice@example.com"
        );
    }

    #[tokio::test]
    async fn test_wrong_command_type() {
        let handler = TypedCommandHandler::new(CreateUserHandler);
        let result = handler
            .handle_any(Box::new(DeleteUser { id: "1".into() }))
            .await;
        assert!(matches!(result, Err(HandlerError::Failed(_))));
    }
}
