pub mod secrets;
pub mod manager;


pub use secrets::{FileSecretStore, InMemorySecretStore, SecretStore, SecretStoreError};
pub use manager::{
    AuthEvent, CredentialManager, RefreshError, ServiceTokenProbe, TokenProbe,
};
