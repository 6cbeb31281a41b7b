//! `UserComponent`: the `User` namespace handler.

use std::any::Any;
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use parking_lot::Mutex;
use parley_component::{Component, ComponentError, HandleError, RemoteClient, ServerBinding, ServerContext};
use parley_protocol::{ComponentType, TypedBuffer, UserMessageType, UserResult};
use parley_transport::ClientId;
use rand::Rng;

use crate::{Authenticator, ChatUser, UserConfig, UserRegistry};

/// Length of the random suffix in guest names.
const GUEST_SUFFIX_LEN: usize = 6;

/// Tracks every connected client's [`ChatUser`] and handles `Identify`.
pub struct UserComponent {
    server: ServerBinding,
    users: Mutex<UserRegistry>,
    auth: Arc<dyn Authenticator>,
    config: UserConfig,
}

impl UserComponent {
    pub fn new(config: UserConfig, auth: impl Authenticator) -> Self {
        Self {
            server: ServerBinding::new(),
            users: Mutex::new(UserRegistry::new()),
            auth: Arc::new(auth),
            config,
        }
    }

    /// Resolves a client to its user record (`GetChatUser`).
    pub fn chat_user(&self, client_id: ClientId) -> Option<Arc<ChatUser>> {
        self.users.lock().get(client_id)
    }

    /// Number of registered users.
    pub fn user_count(&self) -> usize {
        self.users.lock().len()
    }

    fn guest_name(&self) -> String {
        let suffix: String = rand::rng()
            .sample_iter(rand::distr::Alphanumeric)
            .take(GUEST_SUFFIX_LEN)
            .map(char::from)
            .collect();
        format!("{}-{}", self.config.guest_prefix, suffix.to_lowercase())
    }

    async fn handle_identify(
        &self,
        server: &dyn ServerContext,
        client: &RemoteClient,
        buffer: &mut TypedBuffer,
    ) -> Result<(), HandleError> {
        let username = buffer.read_string()?;
        let password = buffer.read_string()?;

        let user = self
            .chat_user(client.id)
            .ok_or(HandleError::UnknownUser(client.id))?;

        let result = if user.is_identified() {
            UserResult::AlreadyIdentified
        } else if !self.config.is_valid_username(&username) {
            UserResult::InvalidUsername
        } else if let Err(e) = self.auth.authenticate(&username, &password).await {
            tracing::info!(client_id = %client.id, %username, error = %e, "identify rejected");
            UserResult::AuthFailed
        } else {
            // The name check and the claim happen under one lock so two
            // clients can't both win the same name.
            let users = self.users.lock();
            if users.is_name_taken(&username, client.id) {
                UserResult::UsernameTaken
            } else {
                user.identify(username.clone());
                UserResult::Ok
            }
        };

        let mut reply = server.create_buffer();
        reply.write_u16(result.into());
        if result == UserResult::Ok {
            reply.write_string(&username);
            tracing::info!(client_id = %client.id, %username, "user identified");
        } else {
            tracing::debug!(client_id = %client.id, %username, %result, "identify refused");
        }
        server.send_unicast(
            client.id,
            ComponentType::User,
            UserMessageType::IdentifyComplete.into(),
            &reply,
        );
        Ok(())
    }
}

#[async_trait]
impl Component for UserComponent {
    fn component_type(&self) -> ComponentType {
        ComponentType::User
    }

    fn initialize(&self, server: Weak<dyn ServerContext>) -> Result<(), ComponentError> {
        self.server.bind(ComponentType::User, server)
    }

    fn shutdown(&self) {
        self.server.clear();
        *self.users.lock() = UserRegistry::new();
    }

    fn on_client_connected(&self, client: &RemoteClient) {
        let user = Arc::new(ChatUser::new(
            client.id,
            self.guest_name(),
            client.endpoint.ip().to_string(),
        ));
        tracing::debug!(client_id = %client.id, username = %user.username(), "user registered");
        self.users.lock().insert(user);
    }

    fn on_client_disconnected(&self, client: &RemoteClient) {
        if let Some(user) = self.users.lock().remove(client.id) {
            user.disable();
            tracing::debug!(client_id = %client.id, username = %user.username(), "user removed");
        }
    }

    async fn handle(
        &self,
        client: &RemoteClient,
        message_type: u16,
        buffer: &mut TypedBuffer,
    ) -> Result<(), HandleError> {
        let server = self.server.get()?;
        match UserMessageType::try_from(message_type) {
            Ok(UserMessageType::Identify) => {
                self.handle_identify(server.as_ref(), client, buffer).await
            }
            _ => Err(HandleError::UnknownMessageType(ComponentType::User, message_type)),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
